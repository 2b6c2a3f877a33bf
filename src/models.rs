//! Core data models for the schema cache.
//!
//! These types represent the normalized resources extracted from OpenAPI,
//! GraphQL, and gRPC schema sources, and the cache entries that hold them.

use serde::{Deserialize, Serialize};

use crate::config::SchemaSource;

/// The kind of callable unit a [`ResourceDescriptor`] describes.
///
/// A closed enumeration: HTTP verbs for REST operations, the three GraphQL
/// root operation kinds, and `grpc` for service methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "PATCH")]
    Patch,
    #[serde(rename = "query")]
    Query,
    #[serde(rename = "mutation")]
    Mutation,
    #[serde(rename = "subscription")]
    Subscription,
    #[serde(rename = "grpc")]
    Grpc,
}

impl ResourceKind {
    /// The wire name (`"GET"`, `"query"`, `"grpc"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
            Self::Grpc => "grpc",
        }
    }
}

/// The structured shape bundle attached to one resource.
///
/// Each populated field holds a serialized JSON structural description.
/// `error` is set only when extraction of this one resource failed; in that
/// case `request`/`response` are normally absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetailEntry {
    /// A detail bundle carrying only an extraction error.
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// One node of a recursively extracted field tree.
///
/// Serialized (inside [`DetailEntry`] strings) with the field names the tool
/// layer expects: `type` and `enumValues`. Flags that do not apply to a
/// dialect are left `None` and omitted from the output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDetail {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldDetail>>,
    #[serde(rename = "enumValues", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl FieldDetail {
    /// A bare field node with a name and rendered type.
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            description: None,
            required: None,
            repeated: None,
            fields: None,
            enum_values: None,
        }
    }
}

/// One normalized, queryable unit extracted from a schema: an HTTP
/// operation, a GraphQL root field, or a gRPC method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Stable identifier, unique within its source (`"GET /users"`,
    /// `"user"`, `"UserService.GetUser"`).
    pub name: String,
    pub resource_kind: ResourceKind,
    /// Short human-readable description; empty when the schema has none.
    pub summary: String,
    pub detail: DetailEntry,
}

/// One cached snapshot for a configured source.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    /// The source name this entry was captured for.
    pub name: String,
    /// The originating source configuration, retained for re-fetch.
    pub source: SchemaSource,
    /// Discovery-ordered resources. Never mutated after the entry is
    /// stored; a refresh replaces the whole entry.
    pub resources: Vec<ResourceDescriptor>,
    /// Capture time, epoch milliseconds.
    pub timestamp: i64,
}

/// Listing projection returned by `list_docs`: resource names and summaries
/// without the detail payloads.
#[derive(Debug, Clone, Serialize)]
pub struct DocListing {
    pub name: String,
    pub resources: Vec<ResourceSummary>,
}

/// A single resource in a [`DocListing`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub name: String,
    pub resource_kind: ResourceKind,
    pub summary: String,
}

impl From<&CacheEntry> for DocListing {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            name: entry.name.clone(),
            resources: entry
                .resources
                .iter()
                .map(|r| ResourceSummary {
                    name: r.name.clone(),
                    resource_kind: r.resource_kind,
                    summary: r.summary.clone(),
                })
                .collect(),
        }
    }
}
