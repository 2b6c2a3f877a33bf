//! Per-source error taxonomy.
//!
//! These errors are isolated at the per-source boundary by the refresh
//! orchestrator: a failing source yields an empty resource list and its
//! error is reported, never propagated past `refresh_all`.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::Dialect;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read schema file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch schema from {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("failed to parse {dialect} schema: {reason}")]
    Parse { dialect: Dialect, reason: String },
}

impl SourceError {
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(dialect: Dialect, reason: impl ToString) -> Self {
        Self::Parse {
            dialect,
            reason: reason.to_string(),
        }
    }
}
