//! Outbound batches and the at-most-once delivery channel.

use async_trait::async_trait;
use serde::Deserialize;

use heatlens_core::event::{
    ClickPayload, PageHeightPayload, PageviewPayload, PointerBatchPayload, ScrollPayload,
};

/// How a batch should leave the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Ordinary asynchronous request.
    Fetch,
    /// Best-effort send that must not hold up navigation (page hide).
    Beacon,
}

/// One request body bound for one ingestion route.
#[derive(Debug, Clone)]
pub enum Outbound {
    Pageview(PageviewPayload),
    Scroll(ScrollPayload),
    Clicks(Vec<ClickPayload>),
    Pointer(PointerBatchPayload),
    Height(PageHeightPayload),
}

impl Outbound {
    pub fn route(&self) -> &'static str {
        match self {
            Outbound::Pageview(_) => "/api/track/pageview",
            Outbound::Scroll(_) => "/api/track/scroll",
            Outbound::Clicks(_) => "/api/track/clicks",
            Outbound::Pointer(_) => "/api/track/pointer",
            Outbound::Height(_) => "/api/track/height",
        }
    }

    pub fn to_body(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Outbound::Pageview(p) => serde_json::to_vec(p),
            Outbound::Scroll(p) => serde_json::to_vec(p),
            Outbound::Clicks(p) => serde_json::to_vec(p),
            Outbound::Pointer(p) => serde_json::to_vec(p),
            Outbound::Height(p) => serde_json::to_vec(p),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboundBatch {
    pub mode: DeliveryMode,
    pub items: Vec<Outbound>,
}

impl OutboundBatch {
    pub fn new(mode: DeliveryMode) -> Self {
        Self {
            mode,
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Transport between the instrument and the ingestion server.
///
/// `deliver` has no result: a failed send is lost, never retried, and never
/// reported to the caller.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Create the pageview and return its id. The only awaited round trip.
    async fn create_pageview(&self, payload: &PageviewPayload) -> anyhow::Result<String>;

    async fn deliver(&self, batch: OutboundBatch);
}

#[derive(Debug, Deserialize)]
struct PageviewCreated {
    id: String,
}

/// [`DeliveryChannel`] over HTTP. Deliveries run on spawned tasks so the
/// caller never waits on the network.
#[derive(Debug, Clone)]
pub struct HttpChannel {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChannel {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.endpoint, route)
    }
}

#[async_trait]
impl DeliveryChannel for HttpChannel {
    async fn create_pageview(&self, payload: &PageviewPayload) -> anyhow::Result<String> {
        let created: PageviewCreated = self
            .client
            .post(self.url("/api/track/pageview"))
            .json(payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(created.id)
    }

    async fn deliver(&self, batch: OutboundBatch) {
        // Beacon sends go out as text/plain, like navigator.sendBeacon.
        let content_type = match batch.mode {
            DeliveryMode::Fetch => "application/json",
            DeliveryMode::Beacon => "text/plain;charset=UTF-8",
        };
        for item in batch.items {
            let body = match item.to_body() {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(error = %e, route = item.route(), "encode failed");
                    continue;
                }
            };
            let request = self
                .client
                .post(self.url(item.route()))
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body);
            let route = item.route();
            tokio::spawn(async move {
                match request.send().await {
                    Ok(resp) if !resp.status().is_success() => {
                        tracing::debug!(status = %resp.status(), route, "delivery rejected");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!(error = %e, route, "delivery failed"),
                }
            });
        }
    }
}
