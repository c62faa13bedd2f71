#![forbid(unsafe_code)]

//! Event dispatch core for the deskspan keyboard/mouse sharing utility.
//!
//! Every asynchronous action in the product flows through one
//! [`EventQueue`](queue::EventQueue): key and pointer events translated by
//! platform code, screen-saver polls, deferred retries, and the quit signal
//! injected by the process interrupt watcher. Producers post events from any
//! thread; a single consumer drives the get/dispatch loop, interleaving
//! buffer events with countdown timers.
//!
//! ```no_run
//! use std::time::Duration;
//! use deskspan_queue::{Event, EventQueue, Target};
//!
//! let queue = EventQueue::new()?;
//! let ping = queue.register_type("ping");
//! let target = Target::new();
//! queue.adopt_handler(ping, target, |event: &Event| {
//!     println!("got {:?}", event.event_type());
//! });
//! queue.post(Event::new(ping, target));
//! while let Some(event) = queue.next_event(Some(Duration::from_millis(100))) {
//!     queue.dispatch(&event);
//! }
//! # Ok::<(), deskspan_queue::QueueError>(())
//! ```

pub mod config;
pub mod error;
pub mod queue;
pub mod telemetry;

pub use config::{LoggingConfig, QueueConfig, QueueLimits};
pub use error::QueueError;
pub use queue::{
    BufferRead, Event, EventBuffer, EventHandler, EventQueue, EventType, EventTypeSlot,
    QueueHandle, QueueMetrics, SimpleEventBuffer, Target, TimerFired, TimerHandle,
};

pub type Result<T> = std::result::Result<T, QueueError>;
