//! The page-side tracking instrument.
//!
//! One [`Instrument`] runs per page load. The host feeds it
//! [`TrackerEvent`]s (scroll ticks, clicks, pointer moves, timers, page
//! hide); the instrument folds them into an [`InstrumentContext`] and hands
//! any resulting [`OutboundBatch`] to a [`DeliveryChannel`].

pub mod config;
pub mod context;
pub mod event;
pub mod handler;
pub mod instrument;
pub mod session;
pub mod transport;

pub use config::TrackerConfig;
pub use context::InstrumentContext;
pub use event::{Timer, TrackerEvent, Viewport};
pub use handler::handle;
pub use instrument::{Instrument, PageInfo};
pub use session::{resolve_session, MemorySessionStore, SessionStore};
pub use transport::{DeliveryChannel, DeliveryMode, HttpChannel, Outbound, OutboundBatch};
