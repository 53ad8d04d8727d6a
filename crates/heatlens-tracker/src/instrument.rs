use std::sync::Arc;

use heatlens_core::event::PageviewPayload;

use crate::config::TrackerConfig;
use crate::context::InstrumentContext;
use crate::event::{TrackerEvent, Viewport};
use crate::handler::handle;
use crate::session::{resolve_session, SessionStore};
use crate::transport::{DeliveryChannel, DeliveryMode, Outbound, OutboundBatch};

/// What the host page knows about itself at load time.
#[derive(Debug, Clone, Default)]
pub struct PageInfo {
    pub url: String,
    pub title: Option<String>,
    pub referrer: Option<String>,
    pub screen_w: Option<u32>,
    pub screen_h: Option<u32>,
    /// Geometry at load. A zero `document_h` means unknown.
    pub viewport: Viewport,
}

impl PageInfo {
    /// Build the pageview body, taking path and UTM tags from the URL.
    pub fn to_payload(&self, site_key: &str, session_id: &str) -> PageviewPayload {
        let parsed = url::Url::parse(&self.url).ok();
        let path = parsed
            .as_ref()
            .map(|u| u.path().to_string())
            .unwrap_or_else(|| "/".to_string());
        let utm = |name: &str| {
            parsed.as_ref().and_then(|u| {
                u.query_pairs()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v.into_owned())
            })
        };
        PageviewPayload {
            site_key: site_key.to_string(),
            session_id: session_id.to_string(),
            url: self.url.clone(),
            path,
            title: self.title.clone(),
            referrer: self.referrer.clone(),
            screen_w: self.screen_w,
            screen_h: self.screen_h,
            utm_source: utm("utm_source"),
            utm_medium: utm("utm_medium"),
            utm_campaign: utm("utm_campaign"),
        }
    }
}

/// Drives one page load: owns the context, feeds events through
/// [`handle`], and hands every resulting batch to the channel.
///
/// No method returns an error. Transport failures are logged at `debug` and
/// otherwise dropped.
pub struct Instrument<C: DeliveryChannel> {
    channel: Arc<C>,
    ctx: Option<InstrumentContext>,
}

impl<C: DeliveryChannel> Instrument<C> {
    pub fn new(channel: Arc<C>) -> Self {
        Self { channel, ctx: None }
    }

    pub fn context(&self) -> Option<&InstrumentContext> {
        self.ctx.as_ref()
    }

    pub fn pageview_id(&self) -> Option<&str> {
        self.ctx.as_ref().and_then(|c| c.pageview_id.as_deref())
    }

    /// Resolve the session and create the pageview.
    ///
    /// If creation fails the pageview is re-sent without waiting and the
    /// instrument stays without an id, so later events are ignored.
    pub async fn start(
        &mut self,
        config: TrackerConfig,
        store: &dyn SessionStore,
        page: &PageInfo,
        at_ms: u64,
    ) {
        let session_id = resolve_session(store);
        let payload = page.to_payload(&config.site_key, &session_id);
        self.ctx = Some(InstrumentContext::new(config, session_id));

        match self.channel.create_pageview(&payload).await {
            Ok(pageview_id) => {
                self.dispatch(TrackerEvent::PageviewLoaded {
                    pageview_id,
                    at_ms,
                    viewport: page.viewport,
                })
                .await;
            }
            Err(e) => {
                tracing::debug!(error = %e, "pageview create failed; falling back to fire-and-forget");
                let mut batch = OutboundBatch::new(DeliveryMode::Fetch);
                batch.items.push(Outbound::Pageview(payload));
                self.channel.deliver(batch).await;
            }
        }
    }

    pub async fn dispatch(&mut self, event: TrackerEvent) {
        let Some(ctx) = self.ctx.take() else {
            return;
        };
        let (ctx, batch) = handle(ctx, &event);
        self.ctx = Some(ctx);
        if let Some(batch) = batch {
            self.channel.deliver(batch).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_takes_path_and_utm_from_url() {
        let page = PageInfo {
            url: "https://shop.example/pricing?utm_source=news&utm_campaign=spring".to_string(),
            ..PageInfo::default()
        };
        let payload = page.to_payload("key", "sess");
        assert_eq!(payload.path, "/pricing");
        assert_eq!(payload.utm_source.as_deref(), Some("news"));
        assert_eq!(payload.utm_medium, None);
        assert_eq!(payload.utm_campaign.as_deref(), Some("spring"));
    }

    #[test]
    fn unparsable_url_falls_back_to_root() {
        let page = PageInfo {
            url: "not a url".to_string(),
            ..PageInfo::default()
        };
        assert_eq!(page.to_payload("key", "sess").path, "/");
    }
}
