//! The generic event queue.
//!
//! Provides:
//! - typed events carrying opaque payloads, partitioned by target
//! - a pluggable low-level buffer with an in-memory default
//! - repeating and one-shot countdown timers
//! - handler registration by (type, target) with per-target catch-all
//! - the get/dispatch loop and the process-wide instance

pub mod buffer;
mod clock;
pub mod dispatcher;
pub mod event;
pub mod handler;
mod interrupt;
pub mod metrics;
mod store;
pub mod timer;

pub use buffer::{BufferRead, EventBuffer, SimpleEventBuffer};
pub use dispatcher::{EventQueue, QueueHandle};
pub use event::{Event, EventType, EventTypeSlot, Target};
pub use handler::EventHandler;
pub use metrics::QueueMetrics;
pub use timer::{TimerFired, TimerHandle};
