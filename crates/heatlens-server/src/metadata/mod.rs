//! Site registry and API-key storage used by the route handlers.
//!
//! Handlers only see [`MetadataStore`]; the DuckDB adapter lives in
//! [`duckdb`] and shares the tracking database connection.

pub use heatlens_metadata::{ApiKeyRecord, CreateSiteParams, MetadataStore, Site};

pub mod duckdb;
