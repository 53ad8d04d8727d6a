pub mod analytics;
pub mod clicks;
pub mod funnels;
pub mod health;
pub mod heatmap;
pub mod pointer;
pub mod realtime;
pub mod sessions;
pub mod sites;
pub mod track;

use chrono::Utc;
use serde::Deserialize;

use heatlens_core::analytics::TimeWindow;

use crate::{auth::AuthContext, error::AppError, metadata::Site, state::AppState};

/// `?days=` shared by every windowed query route.
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub days: Option<u32>,
}

impl WindowQuery {
    pub fn window(&self) -> Result<TimeWindow, AppError> {
        window(self.days)
    }
}

pub(crate) fn window(days: Option<u32>) -> Result<TimeWindow, AppError> {
    Ok(TimeWindow::last_days(days, Utc::now())?)
}

/// Load `site_id` if it belongs to the caller's account.
///
/// A site owned by someone else is reported exactly like a missing one.
pub(crate) async fn owned_site(
    state: &AppState,
    auth: &AuthContext,
    site_id: &str,
) -> Result<Site, AppError> {
    match state.metadata.get_site(site_id).await? {
        Some(site) if site.account_id == auth.account_id => Ok(site),
        _ => Err(AppError::NotFound("Site not found".to_string())),
    }
}

/// Clamp an optional `limit` query parameter into `1..=max`.
pub(crate) fn page_limit(limit: Option<u32>, default: u32, max: u32) -> Result<u32, AppError> {
    match limit {
        None => Ok(default),
        Some(l) if (1..=max).contains(&l) => Ok(l),
        Some(_) => Err(AppError::bad_request(
            format!("limit must be between 1 and {max}"),
            "limit",
        )),
    }
}
