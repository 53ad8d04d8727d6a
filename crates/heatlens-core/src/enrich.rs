//! Attribution helpers used by the analytics roll-up.

use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "Unknown";
pub const DIRECT: &str = "(direct)";

/// Device, browser and OS derived from a `User-Agent` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UaInfo {
    pub device: String,
    pub browser: String,
    pub os: String,
}

impl UaInfo {
    fn unknown() -> Self {
        Self {
            device: UNKNOWN.to_string(),
            browser: UNKNOWN.to_string(),
            os: UNKNOWN.to_string(),
        }
    }
}

fn known(value: &str) -> String {
    if value.is_empty() || value == "UNKNOWN" {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}

/// Parse a `User-Agent` string via `woothee`. Missing or unrecognised agents
/// map every field to `Unknown`.
pub fn parse_user_agent(user_agent: Option<&str>) -> UaInfo {
    let Some(user_agent) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
        return UaInfo::unknown();
    };
    let Some(result) = woothee::parser::Parser::new().parse(user_agent) else {
        return UaInfo::unknown();
    };

    // woothee category → device bucket; anything unclassified counts as desktop.
    let device = match result.category {
        "smartphone" | "mobilephone" => "mobile",
        "tablet" => "tablet",
        "crawler" => "bot",
        _ => "desktop",
    };

    UaInfo {
        device: device.to_string(),
        browser: known(result.name),
        os: known(result.os),
    }
}

/// Host part of a referrer URL. Empty referrers are `(direct)`; anything
/// that does not parse as an absolute URL with a host is returned as-is.
pub fn referrer_host(referrer: Option<&str>) -> String {
    let Some(raw) = referrer.map(str::trim).filter(|r| !r.is_empty()) else {
        return DIRECT.to_string();
    };
    match url::Url::parse(raw) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) if !host.is_empty() => host.to_ascii_lowercase(),
            _ => raw.to_string(),
        },
        Err(_) => raw.to_string(),
    }
}

/// `{w}x{h}` when both dimensions are known.
pub fn screen_label(width: Option<u32>, height: Option<u32>) -> String {
    match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => format!("{w}x{h}"),
        _ => UNKNOWN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_desktop_chrome() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        let info = parse_user_agent(Some(ua));
        assert_eq!(info.device, "desktop");
        assert_eq!(info.browser, "Chrome");
        assert!(info.os.starts_with("Windows"));
    }

    #[test]
    fn parses_mobile_safari() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
        assert_eq!(parse_user_agent(Some(ua)).device, "mobile");
    }

    #[test]
    fn missing_agent_is_unknown() {
        assert_eq!(parse_user_agent(None), UaInfo::unknown());
        assert_eq!(parse_user_agent(Some("   ")).browser, UNKNOWN);
    }

    #[test]
    fn referrer_host_falls_back_to_raw_string() {
        assert_eq!(
            referrer_host(Some("https://News.Ycombinator.com/item?id=1")),
            "news.ycombinator.com"
        );
        assert_eq!(referrer_host(Some("not a url")), "not a url");
        assert_eq!(referrer_host(Some("")), DIRECT);
        assert_eq!(referrer_host(None), DIRECT);
    }

    #[test]
    fn screen_labels() {
        assert_eq!(screen_label(Some(1920), Some(1080)), "1920x1080");
        assert_eq!(screen_label(Some(1920), None), UNKNOWN);
    }
}
