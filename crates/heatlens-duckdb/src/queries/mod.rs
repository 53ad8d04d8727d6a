pub mod clicks;
pub mod funnel_results;
pub mod funnels;
pub mod heatmap;
pub mod pointer;
pub mod realtime;
pub mod rollup;
pub(crate) mod rows;
pub mod sessions;
