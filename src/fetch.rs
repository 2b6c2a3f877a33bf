//! HTTP retrieval collaborators.
//!
//! Thin wrappers around `reqwest` used by the refresh orchestrator: plain
//! document fetches for network OpenAPI sources and the fixed introspection
//! POST for network GraphQL sources. A 30-second timeout is applied at the
//! client level so one unreachable endpoint cannot stall a refresh cycle.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::SourceMethod;
use crate::error::SourceError;

/// Per-request timeout applied to every schema fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// The introspection query sent to GraphQL endpoints. Fixed; sources cannot
/// override it.
pub const INTROSPECTION_QUERY: &str = r#"
query IntrospectionQuery {
  __schema {
    queryType { name }
    mutationType { name }
    subscriptionType { name }
    types {
      kind
      name
      description
      fields(includeDeprecated: true) {
        name
        description
        args {
          name
          description
          type { ...TypeRef }
        }
        type { ...TypeRef }
      }
      inputFields {
        name
        description
        type { ...TypeRef }
      }
      enumValues(includeDeprecated: true) {
        name
      }
    }
  }
}
fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
          ofType {
            kind
            name
            ofType {
              kind
              name
              ofType {
                kind
                name
              }
            }
          }
        }
      }
    }
  }
}
"#;

/// Builds the shared HTTP client with the fetch timeout applied.
pub fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .expect("default reqwest client")
}

/// Fetches a raw schema document from a network endpoint.
pub async fn fetch_document(
    client: &reqwest::Client,
    url: &str,
    method: SourceMethod,
    headers: &HashMap<String, String>,
) -> Result<String, SourceError> {
    let mut request = match method {
        SourceMethod::Get => client.get(url),
        SourceMethod::Post => client.post(url),
    };
    for (key, value) in headers {
        request = request.header(key.as_str(), value.as_str());
    }

    let response = request
        .send()
        .await
        .map_err(|e| SourceError::fetch(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::fetch(url, format!("status {status}")));
    }

    response.text().await.map_err(|e| SourceError::fetch(url, e))
}

/// Sends the fixed introspection query to a GraphQL endpoint and returns the
/// `data` payload. A GraphQL-level `errors` array is treated as a fetch
/// failure.
pub async fn fetch_introspection(
    client: &reqwest::Client,
    url: &str,
    headers: &HashMap<String, String>,
) -> Result<serde_json::Value, SourceError> {
    let mut request = client
        .post(url)
        .header("content-type", "application/json")
        .json(&serde_json::json!({ "query": INTROSPECTION_QUERY }));
    for (key, value) in headers {
        request = request.header(key.as_str(), value.as_str());
    }

    let response = request
        .send()
        .await
        .map_err(|e| SourceError::fetch(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::fetch(url, format!("status {status}")));
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| SourceError::fetch(url, e))?;

    if let Some(errors) = body.get("errors") {
        if errors.as_array().map_or(false, |a| !a.is_empty()) {
            return Err(SourceError::fetch(url, format!("GraphQL errors: {errors}")));
        }
    }

    body.get("data")
        .cloned()
        .ok_or_else(|| SourceError::fetch(url, "introspection response had no data"))
}
