//! The instrument's state transitions. [`handle`] is pure: it consumes the
//! context and an event and returns the next context plus, at most, one
//! batch for the delivery channel.

use heatlens_core::event::{
    limits, truncate, ClickPayload, PageHeightPayload, PointerBatchPayload, PointerSample,
    ScrollPayload, ZONE_COUNT,
};
use heatlens_core::selector::{classify_click, ClickTarget};

use crate::context::InstrumentContext;
use crate::event::{Timer, TrackerEvent, Viewport};
use crate::transport::{DeliveryMode, Outbound, OutboundBatch};

pub fn handle(
    mut ctx: InstrumentContext,
    event: &TrackerEvent,
) -> (InstrumentContext, Option<OutboundBatch>) {
    if let TrackerEvent::PageviewLoaded {
        pageview_id,
        at_ms,
        viewport,
    } = event
    {
        return on_loaded(ctx, pageview_id, *at_ms, *viewport);
    }
    let Some(pageview_id) = ctx.pageview_id.clone() else {
        return (ctx, None);
    };

    let batch = match event {
        TrackerEvent::PageviewLoaded { .. } => None,
        TrackerEvent::ScrollTick { viewport, .. } => {
            ctx.max_scroll_depth = ctx.max_scroll_depth.max(viewport.depth_percent());
            ctx.viewport = Some(*viewport);
            None
        }
        TrackerEvent::ClickObserved {
            x,
            y,
            target,
            text,
            at_ms,
        } => on_click(&mut ctx, &pageview_id, *x, *y, target, text.as_deref(), *at_ms),
        TrackerEvent::PointerSampled { x, y, at_ms } => {
            on_pointer(&mut ctx, *x, *y, *at_ms);
            None
        }
        TrackerEvent::PageHidden { at_ms } => {
            Some(drain_all(&mut ctx, &pageview_id, *at_ms, DeliveryMode::Beacon))
        }
        TrackerEvent::TimerFired { timer, at_ms } => match timer {
            Timer::ZoneSample => {
                sample_zones(&mut ctx);
                None
            }
            Timer::PeriodicFlush => {
                Some(drain_all(&mut ctx, &pageview_id, *at_ms, DeliveryMode::Fetch))
            }
            Timer::ClickDebounce => match ctx.click_flush_at_ms {
                Some(deadline) if *at_ms >= deadline => drain_clicks(&mut ctx),
                _ => None,
            },
        },
    };

    (ctx, batch.filter(|b| !b.is_empty()))
}

fn on_loaded(
    mut ctx: InstrumentContext,
    pageview_id: &str,
    at_ms: u64,
    viewport: Viewport,
) -> (InstrumentContext, Option<OutboundBatch>) {
    if ctx.pageview_id.is_some() {
        return (ctx, None);
    }
    ctx.pageview_id = Some(pageview_id.to_string());
    ctx.loaded_at_ms = at_ms;
    if viewport.document_h == 0 {
        return (ctx, None);
    }
    // A page that never scrolls is still seen down to the first fold.
    ctx.viewport = Some(viewport);
    ctx.max_scroll_depth = ctx.max_scroll_depth.max(viewport.depth_percent());
    let mut batch = OutboundBatch::new(DeliveryMode::Fetch);
    batch.items.push(Outbound::Height(PageHeightPayload {
        pageview_id: pageview_id.to_string(),
        height: viewport.document_h,
    }));
    (ctx, Some(batch))
}

fn on_click(
    ctx: &mut InstrumentContext,
    pageview_id: &str,
    x: i64,
    y: i64,
    target: &ClickTarget,
    text: Option<&str>,
    at_ms: u64,
) -> Option<OutboundBatch> {
    let labels = classify_click(&mut ctx.rage, target, at_ms);
    let selector = target.selector();
    ctx.clicks.push(ClickPayload {
        pageview_id: pageview_id.to_string(),
        x,
        y,
        selector: (!selector.is_empty()).then_some(selector),
        text: text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| truncate(t, limits::CLICK_TEXT)),
        href: target.resolved_href().map(|h| truncate(h, limits::HREF)),
        is_rage: labels.is_rage,
        is_dead: labels.is_dead,
    });

    if ctx.clicks.len() >= ctx.config.click_buffer_limit {
        return drain_clicks(ctx);
    }
    ctx.click_flush_at_ms = Some(at_ms + ctx.config.click_debounce_ms);
    None
}

fn on_pointer(ctx: &mut InstrumentContext, x: i64, y: i64, at_ms: u64) {
    if ctx.pointer_total >= ctx.config.max_pointer_samples {
        return;
    }
    if let Some(last) = ctx.last_pointer_at_ms {
        if at_ms.saturating_sub(last) < ctx.config.pointer_throttle_ms {
            return;
        }
    }
    ctx.pointer.push(PointerSample { t: at_ms, x, y });
    ctx.pointer_total += 1;
    ctx.last_pointer_at_ms = Some(at_ms);
}

/// Credit one sampling interval to every zone the viewport overlaps.
fn sample_zones(ctx: &mut InstrumentContext) {
    let Some(viewport) = ctx.viewport else {
        return;
    };
    if viewport.document_h == 0 {
        return;
    }
    let seconds = u32::try_from(ctx.config.zone_sample_interval_ms / 1000).unwrap_or(u32::MAX);
    for (idx, zone) in ctx.attention_zones.iter_mut().enumerate() {
        let (top, bottom) = zone_band(&viewport, idx);
        if viewport.intersects(top, bottom) {
            *zone = zone.saturating_add(seconds);
        }
    }
    ctx.zones_sampled = true;
}

fn zone_band(viewport: &Viewport, idx: usize) -> (f64, f64) {
    let band = f64::from(viewport.document_h) / ZONE_COUNT as f64;
    (band * idx as f64, band * (idx + 1) as f64)
}

fn drain_clicks(ctx: &mut InstrumentContext) -> Option<OutboundBatch> {
    ctx.click_flush_at_ms = None;
    if ctx.clicks.is_empty() {
        return None;
    }
    let mut batch = OutboundBatch::new(DeliveryMode::Fetch);
    batch
        .items
        .push(Outbound::Clicks(std::mem::take(&mut ctx.clicks)));
    Some(batch)
}

fn drain_all(
    ctx: &mut InstrumentContext,
    pageview_id: &str,
    at_ms: u64,
    mode: DeliveryMode,
) -> OutboundBatch {
    let mut batch = OutboundBatch::new(mode);
    batch.items.push(Outbound::Scroll(ScrollPayload {
        pageview_id: pageview_id.to_string(),
        max_depth: ctx.max_scroll_depth,
        dwell_ms: Some(ctx.dwell_ms(at_ms)),
        zones: ctx.zones_sampled.then_some(ctx.attention_zones),
    }));
    if !ctx.clicks.is_empty() {
        batch
            .items
            .push(Outbound::Clicks(std::mem::take(&mut ctx.clicks)));
    }
    ctx.click_flush_at_ms = None;
    if !ctx.pointer.is_empty() {
        batch.items.push(Outbound::Pointer(PointerBatchPayload {
            pageview_id: pageview_id.to_string(),
            samples: std::mem::take(&mut ctx.pointer),
        }));
    }
    batch
}

#[cfg(test)]
mod tests {
    use heatlens_core::selector::ElementSnapshot;
    use proptest::prelude::*;

    use super::*;
    use crate::config::TrackerConfig;

    fn loaded() -> InstrumentContext {
        let ctx = InstrumentContext::new(TrackerConfig::default(), "sess");
        let (ctx, _) = handle(
            ctx,
            &TrackerEvent::PageviewLoaded {
                pageview_id: "pv_1".to_string(),
                at_ms: 100,
                viewport: viewport(0),
            },
        );
        ctx
    }

    fn button_click(at_ms: u64) -> TrackerEvent {
        TrackerEvent::ClickObserved {
            x: 10,
            y: 20,
            target: ClickTarget {
                element: ElementSnapshot {
                    id: Some("buy".to_string()),
                    ..ElementSnapshot::new("button")
                },
                ancestors: vec![],
            },
            text: Some("Buy now".to_string()),
            at_ms,
        }
    }

    fn viewport(scroll_y: u32) -> Viewport {
        Viewport {
            scroll_y,
            viewport_h: 400,
            document_h: 2000,
        }
    }

    #[test]
    fn events_before_pageview_id_are_ignored() {
        let ctx = InstrumentContext::new(TrackerConfig::default(), "sess");
        let (ctx, batch) = handle(ctx, &button_click(10));
        assert!(batch.is_none());
        assert!(ctx.clicks.is_empty());

        let (ctx, batch) = handle(ctx, &TrackerEvent::PageHidden { at_ms: 20 });
        assert!(batch.is_none());
        assert!(ctx.pageview_id.is_none());
    }

    #[test]
    fn load_reports_page_height() {
        let ctx = InstrumentContext::new(TrackerConfig::default(), "sess");
        let (_, batch) = handle(
            ctx,
            &TrackerEvent::PageviewLoaded {
                pageview_id: "pv_1".to_string(),
                at_ms: 0,
                viewport: Viewport {
                    scroll_y: 0,
                    viewport_h: 800,
                    document_h: 3200,
                },
            },
        );
        let batch = batch.expect("height batch");
        assert!(matches!(
            &batch.items[..],
            [Outbound::Height(PageHeightPayload { height: 3200, .. })]
        ));
    }

    #[test]
    fn unscrolled_page_records_first_fold() {
        let ctx = loaded();
        assert_eq!(ctx.max_scroll_depth, 20);

        let (ctx, batch) = handle(
            ctx,
            &TrackerEvent::TimerFired {
                timer: Timer::ZoneSample,
                at_ms: 2000,
            },
        );
        assert!(batch.is_none());
        assert_eq!(ctx.attention_zones, [2, 2, 0, 0, 0, 0, 0, 0, 0, 0]);

        let (_, batch) = handle(ctx, &TrackerEvent::PageHidden { at_ms: 3000 });
        let batch = batch.expect("flush");
        let scroll = batch
            .items
            .iter()
            .find_map(|item| match item {
                Outbound::Scroll(payload) => Some(payload),
                _ => None,
            })
            .expect("scroll payload");
        assert_eq!(scroll.max_depth, 20);
        assert_eq!(scroll.zones, Some([2, 2, 0, 0, 0, 0, 0, 0, 0, 0]));
    }

    #[test]
    fn scroll_ticks_raise_depth_without_sending() {
        let ctx = loaded();
        let (ctx, batch) = handle(
            ctx,
            &TrackerEvent::ScrollTick {
                viewport: viewport(800),
                at_ms: 200,
            },
        );
        assert!(batch.is_none());
        assert_eq!(ctx.max_scroll_depth, 60);

        let (ctx, _) = handle(
            ctx,
            &TrackerEvent::ScrollTick {
                viewport: viewport(0),
                at_ms: 300,
            },
        );
        assert_eq!(ctx.max_scroll_depth, 60);
    }

    #[test]
    fn zone_sampling_credits_visible_bands() {
        let ctx = loaded();
        let (ctx, _) = handle(
            ctx,
            &TrackerEvent::ScrollTick {
                viewport: viewport(400),
                at_ms: 200,
            },
        );
        let (ctx, batch) = handle(
            ctx,
            &TrackerEvent::TimerFired {
                timer: Timer::ZoneSample,
                at_ms: 2000,
            },
        );
        assert!(batch.is_none());
        assert_eq!(ctx.attention_zones, [0, 0, 2, 2, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn periodic_flush_sends_scroll_clicks_and_pointer() {
        let ctx = loaded();
        let (ctx, _) = handle(ctx, &button_click(500));
        let (ctx, _) = handle(ctx, &TrackerEvent::PointerSampled { x: 1, y: 2, at_ms: 600 });
        let (ctx, batch) = handle(
            ctx,
            &TrackerEvent::TimerFired {
                timer: Timer::PeriodicFlush,
                at_ms: 5100,
            },
        );
        let batch = batch.expect("flush");
        assert_eq!(batch.mode, DeliveryMode::Fetch);
        assert_eq!(batch.items.len(), 3);
        match &batch.items[0] {
            Outbound::Scroll(scroll) => {
                assert_eq!(scroll.dwell_ms, Some(5000));
                assert_eq!(scroll.zones, None);
            }
            other => panic!("expected scroll, got {other:?}"),
        }
        assert!(ctx.clicks.is_empty());
        assert!(ctx.pointer.is_empty());
    }

    #[test]
    fn page_hide_uses_beacon() {
        let ctx = loaded();
        let (_, batch) = handle(ctx, &TrackerEvent::PageHidden { at_ms: 900 });
        assert_eq!(batch.expect("beacon").mode, DeliveryMode::Beacon);
    }

    #[test]
    fn click_debounce_waits_for_deadline() {
        let ctx = loaded();
        let (ctx, _) = handle(ctx, &button_click(1000));
        let (ctx, early) = handle(
            ctx,
            &TrackerEvent::TimerFired {
                timer: Timer::ClickDebounce,
                at_ms: 1500,
            },
        );
        assert!(early.is_none());
        assert_eq!(ctx.clicks.len(), 1);

        let (ctx, due) = handle(
            ctx,
            &TrackerEvent::TimerFired {
                timer: Timer::ClickDebounce,
                at_ms: 2000,
            },
        );
        let due = due.expect("debounced clicks");
        assert!(matches!(&due.items[..], [Outbound::Clicks(c)] if c.len() == 1));
        assert!(ctx.clicks.is_empty());
    }

    #[test]
    fn third_quick_click_is_rage() {
        let mut ctx = loaded();
        for at in [1000, 1400, 1800] {
            ctx = handle(ctx, &button_click(at)).0;
        }
        let flags: Vec<bool> = ctx.clicks.iter().map(|c| c.is_rage).collect();
        assert_eq!(flags, vec![false, false, true]);
        assert!(ctx.clicks.iter().all(|c| !c.is_dead));
        assert_eq!(ctx.clicks[0].selector.as_deref(), Some("button#buy"));
    }

    #[test]
    fn full_click_buffer_flushes_immediately() {
        let mut ctx = loaded();
        let mut flushed = None;
        for i in 0..50u64 {
            let (next, batch) = handle(ctx, &button_click(10_000 * (i + 1)));
            ctx = next;
            if batch.is_some() {
                flushed = batch;
            }
        }
        let batch = flushed.expect("buffer limit reached");
        assert!(matches!(&batch.items[..], [Outbound::Clicks(c)] if c.len() == 50));
    }

    #[test]
    fn pointer_is_throttled() {
        let mut ctx = loaded();
        for at in [1000, 1050, 1100, 1150, 1300] {
            ctx = handle(ctx, &TrackerEvent::PointerSampled { x: 0, y: 0, at_ms: at }).0;
        }
        let times: Vec<u64> = ctx.pointer.iter().map(|s| s.t).collect();
        assert_eq!(times, vec![1000, 1100, 1300]);
    }

    proptest! {
        #[test]
        fn pointer_total_never_exceeds_cap(n in 0usize..1200) {
            let mut ctx = loaded();
            for i in 0..n {
                ctx = handle(ctx, &TrackerEvent::PointerSampled {
                    x: 0,
                    y: 0,
                    at_ms: 1000 + (i as u64) * 100,
                }).0;
                if i % 97 == 0 {
                    ctx = handle(ctx, &TrackerEvent::TimerFired {
                        timer: Timer::PeriodicFlush,
                        at_ms: 1000 + (i as u64) * 100,
                    }).0;
                }
            }
            prop_assert!(ctx.pointer_total <= MAX_POINTER_CAP);
            prop_assert_eq!(ctx.pointer_total, n.min(MAX_POINTER_CAP));
        }
    }

    const MAX_POINTER_CAP: usize = crate::config::MAX_POINTER_SAMPLES;
}
