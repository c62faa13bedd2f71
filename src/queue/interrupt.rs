//! Process interrupt integration.
//!
//! A watcher thread turns SIGINT/SIGTERM into a posted QUIT event, so
//! consumers drain the queue and observe termination in order with
//! everything posted before it.

use std::io;
use std::thread::{self, JoinHandle};

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};

use super::dispatcher::EventQueue;
use super::event::{Event, EventType, Target};

/// Owns the signal iterator thread. Dropping closes the iterator and
/// joins the thread.
pub(crate) struct InterruptWatcher {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl InterruptWatcher {
    pub(crate) fn spawn() -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name("deskspan-interrupt".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    tracing::warn!(signal, "interrupt received, posting quit");
                    if let Some(queue) = EventQueue::global() {
                        queue.post(Event::new(EventType::QUIT, Target::none()));
                    }
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for InterruptWatcher {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
