//! Refresh orchestration.
//!
//! Bridges configuration, raw retrieval, extraction, and the cache store.
//! Each configured source refreshes as an isolated unit of work: retrieval
//! strategy is chosen by origin × dialect (no fallback between strategies),
//! the matching extractor normalizes the document, and the result lands in
//! the shared [`SchemaCache`]. A failing source still produces a cache entry
//! (with zero resources) so read paths stay total; its error is reported in
//! the [`RefreshReport`] and logged, never propagated.

use std::path::Path;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::SchemaCache;
use crate::config::{Dialect, SchemaSource, SourceOrigin};
use crate::error::SourceError;
use crate::fetch;
use crate::graphql;
use crate::grpc;
use crate::models::{CacheEntry, DocListing, ResourceDescriptor};
use crate::openapi;

/// Outcome of one source's refresh.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRefresh {
    pub source: String,
    pub resources: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-source outcomes of a full refresh cycle, in configuration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    pub sources: Vec<SourceRefresh>,
}

impl RefreshReport {
    pub fn has_failures(&self) -> bool {
        self.sources.iter().any(|s| s.error.is_some())
    }
}

/// Coordinates fetching, extraction, and cache population for the
/// configured sources. Constructed once and shared by reference with the
/// read handlers; the cache instance is injected so tests can use
/// independent ones.
pub struct CacheManager {
    sources: Vec<SchemaSource>,
    cache: Arc<SchemaCache>,
    http: reqwest::Client,
}

impl CacheManager {
    pub fn new(sources: Vec<SchemaSource>, cache: Arc<SchemaCache>) -> Self {
        Self {
            sources,
            cache,
            http: fetch::build_client(),
        }
    }

    /// The shared cache store (administrative access).
    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Refreshes every configured source concurrently. Sources fail
    /// independently; the report carries each outcome.
    pub async fn refresh_all(&self) -> RefreshReport {
        let sources = join_all(self.sources.iter().map(|s| self.refresh_source(s))).await;
        RefreshReport { sources }
    }

    /// Listing read path. With a source name, lazily refreshes that entry
    /// when expired and returns it alone; without one, refreshes all
    /// expired entries concurrently and returns everything.
    pub async fn list_docs(&self, source_name: Option<&str>) -> Vec<DocListing> {
        match source_name {
            Some(name) => {
                if let Some(entry) = self.cache.entry_for_source(name) {
                    if self.cache.is_expired(&entry) {
                        self.refresh_source(&entry.source).await;
                    }
                }
                self.cache
                    .entry_for_source(name)
                    .iter()
                    .map(DocListing::from)
                    .collect()
            }
            None => {
                let expired: Vec<SchemaSource> = self
                    .cache
                    .all_entries()
                    .iter()
                    .filter(|e| self.cache.is_expired(e))
                    .map(|e| e.source.clone())
                    .collect();
                join_all(expired.iter().map(|s| self.refresh_source(s))).await;

                self.cache
                    .all_entries()
                    .iter()
                    .map(DocListing::from)
                    .collect()
            }
        }
    }

    /// Detail read path: a direct store lookup. Deliberately does not
    /// refresh expired entries (asymmetric with [`list_docs`](Self::list_docs)).
    pub fn find_details(&self, resource_name: &str, source_name: Option<&str>) -> Vec<CacheEntry> {
        self.cache.find_resources_by_name(resource_name, source_name)
    }

    /// Administrative clear-all.
    pub fn clear(&self) {
        self.cache.clear();
    }

    async fn refresh_source(&self, source: &SchemaSource) -> SourceRefresh {
        match self.load_resources(source).await {
            Ok(resources) => {
                debug!(source = %source.name, resources = resources.len(), "schema refreshed");
                let count = resources.len();
                self.store(source, resources);
                SourceRefresh {
                    source: source.name.clone(),
                    resources: count,
                    error: None,
                }
            }
            Err(e) => {
                warn!(source = %source.name, error = %e, "schema refresh failed");
                self.store(source, Vec::new());
                SourceRefresh {
                    source: source.name.clone(),
                    resources: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn store(&self, source: &SchemaSource, resources: Vec<ResourceDescriptor>) {
        self.cache.put(CacheEntry {
            name: source.name.clone(),
            source: source.clone(),
            resources,
            timestamp: SchemaCache::now_ms(),
        });
    }

    /// Origin × dialect dispatch. The combination fully determines the
    /// retrieval path.
    async fn load_resources(
        &self,
        source: &SchemaSource,
    ) -> Result<Vec<ResourceDescriptor>, SourceError> {
        match (&source.origin, source.dialect) {
            (SourceOrigin::File { path }, Dialect::Rest) => {
                let text = read_file(path).await?;
                let doc = openapi::parse_document(&text)?;
                Ok(openapi::extract_resources(&doc))
            }
            (SourceOrigin::File { path }, Dialect::GraphQl) => {
                let text = read_file(path).await?;
                let schema = if has_extension(path, &["json"]) {
                    let value: serde_json::Value = serde_json::from_str(&text)
                        .map_err(|e| SourceError::parse(Dialect::GraphQl, e))?;
                    graphql::schema_from_introspection(&value)?
                } else {
                    graphql::schema_from_sdl(&text)?
                };
                Ok(graphql::extract_resources(&schema))
            }
            (SourceOrigin::File { path }, Dialect::Grpc) => {
                let set = grpc::compile_proto_file(path)?;
                Ok(grpc::extract_resources(&set))
            }
            (
                SourceOrigin::Url {
                    method,
                    url,
                    headers,
                },
                Dialect::Rest,
            ) => {
                let text = fetch::fetch_document(&self.http, url, *method, headers).await?;
                let doc = openapi::parse_document(&text)?;
                Ok(openapi::extract_resources(&doc))
            }
            (SourceOrigin::Url { url, headers, .. }, Dialect::GraphQl) => {
                let data = fetch::fetch_introspection(&self.http, url, headers).await?;
                let schema = graphql::schema_from_introspection(&data)?;
                Ok(graphql::extract_resources(&schema))
            }
            (SourceOrigin::Url { url, headers, .. }, Dialect::Grpc) => {
                let set = grpc::load_reflection_descriptors(url, headers).await?;
                Ok(grpc::extract_resources(&set))
            }
        }
    }
}

async fn read_file(path: &Path) -> Result<String, SourceError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SourceError::Read {
            path: path.to_path_buf(),
            source: e,
        })
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| {
            extensions.iter().any(|e| ext.eq_ignore_ascii_case(e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CACHE_TTL_MS;
    use std::io::Write;

    fn file_source(name: &str, dialect: Dialect, path: &Path) -> SchemaSource {
        SchemaSource {
            name: name.to_string(),
            dialect,
            origin: SourceOrigin::File {
                path: path.to_path_buf(),
            },
        }
    }

    fn write_openapi(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("users.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(
            serde_json::json!({
                "openapi": "3.0.0",
                "paths": {
                    "/users": {
                        "get": { "summary": "Get all users" },
                        "post": { "summary": "Create a user" }
                    }
                }
            })
            .to_string()
            .as_bytes(),
        )
        .unwrap();
        path
    }

    fn write_sdl(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("bff.graphql");
        std::fs::write(&path, "type Query { user(id: ID!): String }").unwrap();
        path
    }

    #[tokio::test]
    async fn refresh_all_isolates_source_failures() {
        let dir = tempfile::tempdir().unwrap();
        let sources = vec![
            file_source("rest", Dialect::Rest, &write_openapi(dir.path())),
            file_source("gone", Dialect::Rest, &dir.path().join("missing.json")),
            file_source("bff", Dialect::GraphQl, &write_sdl(dir.path())),
        ];

        let manager = CacheManager::new(sources, Arc::new(SchemaCache::new()));
        let report = manager.refresh_all().await;

        assert_eq!(report.sources.len(), 3);
        assert!(report.has_failures());

        let by_name: std::collections::HashMap<&str, &SourceRefresh> = report
            .sources
            .iter()
            .map(|s| (s.source.as_str(), s))
            .collect();
        assert_eq!(by_name["rest"].resources, 2);
        assert!(by_name["rest"].error.is_none());
        assert_eq!(by_name["bff"].resources, 1);
        assert_eq!(by_name["gone"].resources, 0);
        assert!(by_name["gone"].error.is_some());

        // The failed source still has a (zero-resource) entry.
        let entry = manager.cache().entry_for_source("gone").unwrap();
        assert!(entry.resources.is_empty());
    }

    #[tokio::test]
    async fn list_docs_refreshes_expired_entries_only() {
        let dir = tempfile::tempdir().unwrap();
        let source = file_source("rest", Dialect::Rest, &write_openapi(dir.path()));

        let cache = Arc::new(SchemaCache::new());
        let manager = CacheManager::new(vec![source.clone()], cache.clone());
        manager.refresh_all().await;

        // Backdate past the TTL, then read: the entry must be re-fetched.
        let mut entry = cache.entry_for_source("rest").unwrap();
        let stale_ts = SchemaCache::now_ms() - CACHE_TTL_MS - 60_000;
        entry.timestamp = stale_ts;
        cache.put(entry);

        let listings = manager.list_docs(Some("rest")).await;
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].resources.len(), 2);
        assert!(cache.entry_for_source("rest").unwrap().timestamp > stale_ts);

        // A fresh entry is not re-fetched on read.
        let ts = cache.entry_for_source("rest").unwrap().timestamp;
        manager.list_docs(Some("rest")).await;
        assert_eq!(cache.entry_for_source("rest").unwrap().timestamp, ts);
    }

    #[tokio::test]
    async fn list_docs_with_unknown_source_is_empty() {
        let manager = CacheManager::new(Vec::new(), Arc::new(SchemaCache::new()));
        assert!(manager.list_docs(Some("nope")).await.is_empty());
    }

    #[tokio::test]
    async fn find_details_does_not_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let source = file_source("rest", Dialect::Rest, &write_openapi(dir.path()));

        let cache = Arc::new(SchemaCache::new());
        let manager = CacheManager::new(vec![source], cache.clone());
        manager.refresh_all().await;

        let mut entry = cache.entry_for_source("rest").unwrap();
        let stale_ts = SchemaCache::now_ms() - CACHE_TTL_MS - 60_000;
        entry.timestamp = stale_ts;
        cache.put(entry);

        let details = manager.find_details("GET /users", None);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].resources[0].summary, "Get all users");
        // Still stale: the detail path never triggers a re-fetch.
        assert_eq!(cache.entry_for_source("rest").unwrap().timestamp, stale_ts);
    }
}
