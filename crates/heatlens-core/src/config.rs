use crate::heatmap::{HeatmapConfig, DEFAULT_CELL_PX, DEFAULT_MAX_ROWS, DEFAULT_TOP_CELLS};

pub const DEFAULT_INGEST_RATE_LIMIT: usize = 600;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    pub duckdb_memory_limit: String,
    pub rate_limit_disabled: bool,
    /// Ingestion requests allowed per client IP per minute.
    pub ingest_rate_limit: usize,
    pub heatmap: HeatmapConfig,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("invalid {key}: {raw}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let heatmap = HeatmapConfig {
            cell_px: parse_or("HEATLENS_GRID_CELL_PX", DEFAULT_CELL_PX)?,
            top_cells: parse_or("HEATLENS_TOP_CELLS", DEFAULT_TOP_CELLS)?,
            max_rows: parse_or("HEATLENS_MAX_ROWS", DEFAULT_MAX_ROWS)?,
        };
        if heatmap.cell_px <= 0 {
            return Err("HEATLENS_GRID_CELL_PX must be positive".to_string());
        }

        Ok(Self {
            port: parse_or("HEATLENS_PORT", 3000)?,
            data_dir: std::env::var("HEATLENS_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            duckdb_memory_limit: std::env::var("HEATLENS_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            rate_limit_disabled: std::env::var("HEATLENS_RATE_LIMIT_DISABLE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            ingest_rate_limit: parse_or("HEATLENS_INGEST_RATE_LIMIT", DEFAULT_INGEST_RATE_LIMIT)?,
            heatmap,
        })
    }
}
