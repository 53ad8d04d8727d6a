use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::PayloadError;
use crate::scroll::ScrollSample;
use crate::selector::MAX_SELECTOR_LEN;

/// Number of equal vertical bands a page is split into for attention scoring.
pub const ZONE_COUNT: usize = 10;

/// Seconds of visibility per 10%-of-page band, top to bottom.
pub type ZoneVector = [u32; ZONE_COUNT];

pub const MAX_CLICKS_PER_BATCH: usize = 50;
pub const MAX_POINTER_SAMPLES: usize = 500;

/// Maximum stored lengths (in characters) for free-text fields.
pub mod limits {
    pub const SESSION_ID: usize = 100;
    pub const URL: usize = 2000;
    pub const PATH: usize = 500;
    pub const TITLE: usize = 500;
    pub const REFERRER: usize = 2000;
    pub const USER_AGENT: usize = 500;
    pub const UTM: usize = 200;
    pub const CLICK_TEXT: usize = 100;
    pub const HREF: usize = 500;
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => value[..byte_idx].to_string(),
        None => value.to_string(),
    }
}

/// Trim, drop empty strings, and truncate an optional free-text field.
fn clean_optional(value: Option<String>, max_chars: usize) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| truncate(&v, max_chars))
}

fn require(field: &'static str, value: &str, max_chars: usize) -> Result<String, PayloadError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PayloadError::MissingField(field));
    }
    Ok(truncate(trimmed, max_chars))
}

/// Decode a request body regardless of the declared content type.
///
/// Beacon deliveries arrive as `text/plain`, so handlers read raw bytes and
/// decode here instead of relying on the `Json` extractor.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, PayloadError> {
    Ok(serde_json::from_slice(body)?)
}

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

/// Body of `POST /api/track/pageview`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageviewPayload {
    pub site_key: String,
    pub session_id: String,
    pub url: String,
    pub path: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub screen_w: Option<u32>,
    #[serde(default)]
    pub screen_h: Option<u32>,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
}

impl PageviewPayload {
    pub fn site_key(&self) -> Result<&str, PayloadError> {
        let key = self.site_key.trim();
        if key.is_empty() {
            return Err(PayloadError::MissingField("siteKey"));
        }
        Ok(key)
    }

    /// Validate and truncate every field, producing the row to persist.
    pub fn into_pageview(
        self,
        site_id: &str,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<NewPageview, PayloadError> {
        Ok(NewPageview {
            site_id: site_id.to_string(),
            session_id: require("sessionId", &self.session_id, limits::SESSION_ID)?,
            url: require("url", &self.url, limits::URL)?,
            path: require("path", &self.path, limits::PATH)?,
            title: clean_optional(self.title, limits::TITLE),
            referrer: clean_optional(self.referrer, limits::REFERRER),
            user_agent: clean_optional(user_agent.map(str::to_string), limits::USER_AGENT),
            screen_w: self.screen_w,
            screen_h: self.screen_h,
            utm_source: clean_optional(self.utm_source, limits::UTM),
            utm_medium: clean_optional(self.utm_medium, limits::UTM),
            utm_campaign: clean_optional(self.utm_campaign, limits::UTM),
            created_at: now,
        })
    }
}

/// Body of `POST /api/track/scroll`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollPayload {
    pub pageview_id: String,
    pub max_depth: u32,
    #[serde(default)]
    pub dwell_ms: Option<u64>,
    /// Exactly [`ZONE_COUNT`] entries; any other length fails decoding.
    #[serde(default)]
    pub zones: Option<ZoneVector>,
}

impl ScrollPayload {
    pub fn validate(self) -> Result<(String, ScrollSample), PayloadError> {
        let pageview_id = require("pageviewId", &self.pageview_id, 64)?;
        if self.max_depth > crate::scroll::MAX_DEPTH {
            return Err(PayloadError::Invalid {
                field: "maxDepth",
                reason: "must be between 0 and 100",
            });
        }
        Ok((
            pageview_id,
            ScrollSample {
                max_depth: self.max_depth,
                dwell_ms: self.dwell_ms,
                zones: self.zones,
            },
        ))
    }
}

/// One element of the `POST /api/track/clicks` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickPayload {
    pub pageview_id: String,
    pub x: i64,
    pub y: i64,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub is_rage: bool,
    #[serde(default)]
    pub is_dead: bool,
}

/// Validate a click batch: 1..=50 entries, each with a pageview id.
pub fn validate_clicks(
    payloads: Vec<ClickPayload>,
    now: DateTime<Utc>,
) -> Result<Vec<NewClick>, PayloadError> {
    if payloads.is_empty() {
        return Err(PayloadError::EmptyBatch);
    }
    if payloads.len() > MAX_CLICKS_PER_BATCH {
        return Err(PayloadError::BatchTooLarge {
            len: payloads.len(),
            max: MAX_CLICKS_PER_BATCH,
        });
    }
    payloads
        .into_iter()
        .map(|p| {
            Ok(NewClick {
                pageview_id: require("pageviewId", &p.pageview_id, 64)?,
                x: p.x,
                y: p.y,
                selector: clean_optional(p.selector, MAX_SELECTOR_LEN),
                text: clean_optional(p.text, limits::CLICK_TEXT),
                href: clean_optional(p.href, limits::HREF),
                is_rage: p.is_rage,
                is_dead: p.is_dead,
                created_at: now,
            })
        })
        .collect()
}

/// Body of `POST /api/track/pointer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerBatchPayload {
    pub pageview_id: String,
    pub samples: Vec<PointerSample>,
}

impl PointerBatchPayload {
    pub fn validate(self) -> Result<(String, Vec<PointerSample>), PayloadError> {
        let pageview_id = require("pageviewId", &self.pageview_id, 64)?;
        if self.samples.is_empty() {
            return Err(PayloadError::EmptyBatch);
        }
        if self.samples.len() > MAX_POINTER_SAMPLES {
            return Err(PayloadError::BatchTooLarge {
                len: self.samples.len(),
                max: MAX_POINTER_SAMPLES,
            });
        }
        Ok((pageview_id, self.samples))
    }
}

/// Body of `POST /api/track/height`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageHeightPayload {
    pub pageview_id: String,
    pub height: u32,
}

impl PageHeightPayload {
    pub fn validate(self) -> Result<(String, u32), PayloadError> {
        Ok((require("pageviewId", &self.pageview_id, 64)?, self.height))
    }
}

// ---------------------------------------------------------------------------
// Stored rows
// ---------------------------------------------------------------------------

/// A pageview ready to be inserted; the backend assigns the id.
#[derive(Debug, Clone)]
pub struct NewPageview {
    pub site_id: String,
    pub session_id: String,
    pub url: String,
    pub path: String,
    pub title: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub screen_w: Option<u32>,
    pub screen_h: Option<u32>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageviewRow {
    pub id: String,
    pub site_id: String,
    pub session_id: String,
    pub path: String,
    pub url: String,
    pub title: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub screen_w: Option<u32>,
    pub screen_h: Option<u32>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub page_height: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewClick {
    pub pageview_id: String,
    pub x: i64,
    pub y: i64,
    pub selector: Option<String>,
    pub text: Option<String>,
    pub href: Option<String>,
    pub is_rage: bool,
    pub is_dead: bool,
    pub created_at: DateTime<Utc>,
}

/// A stored click joined with the path of its pageview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickRow {
    pub id: String,
    pub pageview_id: String,
    pub path: String,
    pub x: i64,
    pub y: i64,
    pub selector: Option<String>,
    pub text: Option<String>,
    pub href: Option<String>,
    pub is_rage: bool,
    pub is_dead: bool,
    pub created_at: DateTime<Utc>,
}

/// A stored scroll record for one pageview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollRow {
    pub pageview_id: String,
    pub max_depth: u32,
    pub dwell_ms: u64,
    pub zones: Option<ZoneVector>,
    pub updated_at: DateTime<Utc>,
}

/// One pointer position, `t` milliseconds after page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerSample {
    pub t: u64,
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointerBatch {
    pub id: String,
    pub pageview_id: String,
    pub samples: Vec<PointerSample>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pageview_payload() -> PageviewPayload {
        PageviewPayload {
            site_key: "key_1".to_string(),
            session_id: "s1".to_string(),
            url: "https://example.com/pricing".to_string(),
            path: "/pricing".to_string(),
            title: Some("  ".to_string()),
            referrer: None,
            screen_w: Some(1920),
            screen_h: Some(1080),
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn pageview_blank_title_becomes_none() {
        let pv = pageview_payload()
            .into_pageview("site_1", Some("Mozilla/5.0"), Utc::now())
            .expect("valid");
        assert_eq!(pv.title, None);
        assert_eq!(pv.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[test]
    fn pageview_long_fields_are_truncated() {
        let mut payload = pageview_payload();
        payload.title = Some("t".repeat(5000));
        payload.url = format!("https://example.com/{}", "a".repeat(5000));
        let pv = payload
            .into_pageview("site_1", None, Utc::now())
            .expect("valid");
        assert_eq!(pv.title.map(|t| t.len()), Some(limits::TITLE));
        assert_eq!(pv.url.len(), limits::URL);
    }

    #[test]
    fn pageview_missing_session_is_rejected() {
        let mut payload = pageview_payload();
        payload.session_id = " ".to_string();
        let err = payload
            .into_pageview("site_1", None, Utc::now())
            .expect_err("blank session");
        assert_eq!(err.field(), Some("sessionId"));
    }

    #[test]
    fn scroll_zones_must_have_ten_entries() {
        let bad = br#"{"pageviewId":"pv_1","maxDepth":40,"zones":[1,2,3]}"#;
        assert!(matches!(
            parse_json::<ScrollPayload>(bad),
            Err(PayloadError::Malformed(_))
        ));

        let good = br#"{"pageviewId":"pv_1","maxDepth":40,"zones":[0,0,2,2,0,0,0,0,0,0]}"#;
        let payload = parse_json::<ScrollPayload>(good).expect("ten zones");
        assert_eq!(payload.zones, Some([0, 0, 2, 2, 0, 0, 0, 0, 0, 0]));
    }

    #[test]
    fn scroll_negative_depth_is_malformed() {
        let body = br#"{"pageviewId":"pv_1","maxDepth":-5}"#;
        assert!(parse_json::<ScrollPayload>(body).is_err());

        let over = parse_json::<ScrollPayload>(br#"{"pageviewId":"pv_1","maxDepth":101}"#)
            .expect("decodes");
        assert_eq!(over.validate().expect_err("depth").field(), Some("maxDepth"));
    }

    #[test]
    fn click_batch_limits() {
        let click = ClickPayload {
            pageview_id: "pv_1".to_string(),
            x: 10,
            y: 20,
            selector: Some("button#buy".to_string()),
            text: Some("x".repeat(300)),
            href: None,
            is_rage: false,
            is_dead: false,
        };
        assert!(matches!(
            validate_clicks(vec![], Utc::now()),
            Err(PayloadError::EmptyBatch)
        ));
        assert!(matches!(
            validate_clicks(vec![click.clone(); 51], Utc::now()),
            Err(PayloadError::BatchTooLarge { len: 51, max: 50 })
        ));
        let clicks = validate_clicks(vec![click], Utc::now()).expect("one click");
        assert_eq!(clicks[0].text.as_ref().map(|t| t.len()), Some(100));
    }

    #[test]
    fn pointer_batch_limits() {
        let empty = PointerBatchPayload {
            pageview_id: "pv_1".to_string(),
            samples: vec![],
        };
        assert!(matches!(empty.validate(), Err(PayloadError::EmptyBatch)));

        let oversized = PointerBatchPayload {
            pageview_id: "pv_1".to_string(),
            samples: vec![PointerSample { t: 0, x: 0, y: 0 }; 501],
        };
        assert!(matches!(
            oversized.validate(),
            Err(PayloadError::BatchTooLarge { .. })
        ));
    }
}
