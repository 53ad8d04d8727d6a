use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use heatlens_core::event::PageviewPayload;
use heatlens_tracker::{
    DeliveryChannel, DeliveryMode, Instrument, MemorySessionStore, Outbound, OutboundBatch,
    PageInfo, Timer, TrackerConfig, TrackerEvent, Viewport,
};

#[derive(Default)]
struct RecordingChannel {
    fail_create: bool,
    created: Mutex<Vec<PageviewPayload>>,
    delivered: Mutex<Vec<OutboundBatch>>,
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn create_pageview(&self, payload: &PageviewPayload) -> anyhow::Result<String> {
        self.created.lock().expect("lock").push(payload.clone());
        if self.fail_create {
            anyhow::bail!("connection refused");
        }
        Ok("pv_test".to_string())
    }

    async fn deliver(&self, batch: OutboundBatch) {
        self.delivered.lock().expect("lock").push(batch);
    }
}

fn page() -> PageInfo {
    PageInfo {
        url: "https://example.com/landing".to_string(),
        title: Some("Landing".to_string()),
        viewport: Viewport {
            scroll_y: 0,
            viewport_h: 1000,
            document_h: 2000,
        },
        ..PageInfo::default()
    }
}

#[tokio::test]
async fn test_start_creates_pageview_and_reports_height() {
    let channel = Arc::new(RecordingChannel::default());
    let store = MemorySessionStore::default();
    let mut instrument = Instrument::new(Arc::clone(&channel));

    instrument
        .start(TrackerConfig::new("http://localhost", "hl_key"), &store, &page(), 0)
        .await;

    assert_eq!(instrument.pageview_id(), Some("pv_test"));
    let created = channel.created.lock().expect("lock");
    assert_eq!(created[0].site_key, "hl_key");
    assert_eq!(created[0].path, "/landing");
    let delivered = channel.delivered.lock().expect("lock");
    assert!(matches!(&delivered[0].items[..], [Outbound::Height(_)]));
}

#[tokio::test]
async fn test_page_loads_in_one_tab_share_a_session() {
    let channel = Arc::new(RecordingChannel::default());
    let store = MemorySessionStore::default();
    for _ in 0..2 {
        let mut instrument = Instrument::new(Arc::clone(&channel));
        instrument
            .start(TrackerConfig::new("http://localhost", "hl_key"), &store, &page(), 0)
            .await;
    }
    let created = channel.created.lock().expect("lock");
    assert_eq!(created[0].session_id, created[1].session_id);
}

#[tokio::test]
async fn test_failed_create_falls_back_and_goes_quiet() {
    let channel = Arc::new(RecordingChannel {
        fail_create: true,
        ..RecordingChannel::default()
    });
    let store = MemorySessionStore::default();
    let mut instrument = Instrument::new(Arc::clone(&channel));
    instrument
        .start(TrackerConfig::new("http://localhost", "hl_key"), &store, &page(), 0)
        .await;

    assert!(instrument.pageview_id().is_none());
    instrument
        .dispatch(TrackerEvent::ScrollTick {
            viewport: Viewport {
                scroll_y: 1000,
                viewport_h: 500,
                document_h: 2000,
            },
            at_ms: 100,
        })
        .await;
    instrument
        .dispatch(TrackerEvent::PageHidden { at_ms: 500 })
        .await;

    let delivered = channel.delivered.lock().expect("lock");
    assert_eq!(delivered.len(), 1);
    assert!(matches!(&delivered[0].items[..], [Outbound::Pageview(_)]));
}

#[tokio::test]
async fn test_page_hide_flushes_over_beacon() {
    let channel = Arc::new(RecordingChannel::default());
    let store = MemorySessionStore::default();
    let mut instrument = Instrument::new(Arc::clone(&channel));
    instrument
        .start(TrackerConfig::new("http://localhost", "hl_key"), &store, &page(), 0)
        .await;

    instrument
        .dispatch(TrackerEvent::ScrollTick {
            viewport: Viewport {
                scroll_y: 0,
                viewport_h: 1000,
                document_h: 2000,
            },
            at_ms: 100,
        })
        .await;
    instrument
        .dispatch(TrackerEvent::TimerFired {
            timer: Timer::ZoneSample,
            at_ms: 2000,
        })
        .await;
    instrument
        .dispatch(TrackerEvent::PageHidden { at_ms: 3000 })
        .await;

    let delivered = channel.delivered.lock().expect("lock");
    let last = delivered.last().expect("beacon batch");
    assert_eq!(last.mode, DeliveryMode::Beacon);
    match &last.items[0] {
        Outbound::Scroll(scroll) => {
            assert_eq!(scroll.max_depth, 50);
            assert_eq!(scroll.dwell_ms, Some(3000));
            assert_eq!(scroll.zones, Some([2, 2, 2, 2, 2, 0, 0, 0, 0, 0]));
        }
        other => panic!("expected scroll, got {other:?}"),
    }
}
