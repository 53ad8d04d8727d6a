pub mod analytics_impl;
pub mod api_keys;
pub mod backend;
pub mod ingest;
pub mod queries;
pub mod schema;
pub mod site;

pub use backend::DuckDbBackend;

/// Re-export the `duckdb` crate so tests can use `heatlens_duckdb::duckdb::params!`
/// without an extra dependency.
pub use duckdb;
