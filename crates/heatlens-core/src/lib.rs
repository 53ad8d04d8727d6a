pub mod analytics;
pub mod config;
pub mod enrich;
pub mod error;
pub mod event;
pub mod funnel;
pub mod heatmap;
pub mod rollup;
pub mod scroll;
pub mod selector;
pub mod session;
