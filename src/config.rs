//! Source configuration: which schemas to ingest and where they live.
//!
//! The source list is supplied externally as JSON — either through the
//! `API_SOURCES` environment variable or a file passed on the command line.
//! A malformed list is fatal: it is rejected before any source is fetched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable holding the JSON source list.
pub const SOURCES_ENV: &str = "API_SOURCES";

/// The schema description format of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(alias = "api")]
    Rest,
    #[serde(alias = "gql")]
    GraphQl,
    Grpc,
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Rest => write!(f, "rest"),
            Dialect::GraphQl => write!(f, "graphql"),
            Dialect::Grpc => write!(f, "grpc"),
        }
    }
}

/// HTTP method for network-origin fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceMethod {
    #[default]
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
}

/// Where a schema comes from: a local file or a network endpoint.
///
/// Exactly one form is present per source; `path` in the configured record
/// selects the file origin, `url` the network origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceOrigin {
    File {
        path: PathBuf,
    },
    Url {
        #[serde(default)]
        method: SourceMethod,
        url: String,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        headers: HashMap<String, String>,
    },
}

/// One configured schema source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSource {
    /// Unique identifier; used as the cache key and as the filter key on
    /// read operations.
    pub name: String,
    /// `type` is the legacy key for this field in existing source lists.
    #[serde(alias = "type")]
    pub dialect: Dialect,
    #[serde(flatten)]
    pub origin: SourceOrigin,
}

/// Loads the source list from a JSON file, or from `API_SOURCES` when no
/// file is given.
pub fn load_sources(path: Option<&Path>) -> Result<Vec<SchemaSource>> {
    let (raw, what) = match path {
        Some(p) => (
            std::fs::read_to_string(p)
                .with_context(|| format!("failed to read source list {}", p.display()))?,
            p.display().to_string(),
        ),
        None => (
            std::env::var(SOURCES_ENV)
                .with_context(|| format!("{SOURCES_ENV} is not set and no --sources file given"))?,
            SOURCES_ENV.to_string(),
        ),
    };

    parse_sources(&raw).with_context(|| format!("failed to parse {what}"))
}

/// Parses a JSON array of source records.
pub fn parse_sources(raw: &str) -> Result<Vec<SchemaSource>> {
    let sources: Vec<SchemaSource> = serde_json::from_str(raw)?;
    Ok(sources)
}
