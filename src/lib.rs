//! # apidex
//!
//! A schema-aggregation cache for API documentation tooling.
//!
//! apidex ingests API schema descriptions — OpenAPI documents, GraphQL
//! schemas, and gRPC/protobuf definitions — from local files or network
//! endpoints, normalizes them into a uniform resource model, and serves
//! read-only lookups ("list all methods", "get full detail for one method")
//! to a calling tool layer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │   Sources    │──▶│  Extractors   │──▶│ SchemaCache │
//! │ file / HTTP  │   │ REST/GQL/gRPC │   │  (12h TTL)  │
//! │ / reflection │   └──────────────┘   └──────┬──────┘
//! └──────────────┘                             │
//!                              ┌───────────────┤
//!                              ▼               ▼
//!                        ┌──────────┐    ┌───────────┐
//!                        │ list_docs │    │find_details│
//!                        └──────────┘    └───────────┘
//! ```
//!
//! Each configured source refreshes as an isolated unit of work: one
//! unreachable endpoint or malformed document never affects its siblings.
//! Cached entries go stale after 12 hours and are lazily re-fetched by the
//! listing read path.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Source list configuration (JSON, env or file) |
//! | [`models`] | Normalized resource model and cache entry types |
//! | [`cache`] | In-memory TTL cache store |
//! | [`manager`] | Refresh orchestration and read paths |
//! | [`openapi`] | REST/OpenAPI extractor |
//! | [`graphql`] | GraphQL extractor (introspection JSON and SDL) |
//! | [`grpc`] | gRPC extractor (proto files and server reflection) |
//! | [`fetch`] | HTTP retrieval collaborators |
//! | [`error`] | Per-source error taxonomy |

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod graphql;
pub mod grpc;
pub mod manager;
pub mod models;
pub mod openapi;
