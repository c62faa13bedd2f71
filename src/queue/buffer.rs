//! Pluggable low-level event buffer.
//!
//! Provides:
//! - `EventBuffer` - the capability set a buffer implementation exposes
//! - `BufferRead` - outcome of a non-blocking read
//! - `SimpleEventBuffer` - the default in-memory implementation

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};

use super::event::Event;
use super::timer::TimerHandle;
use crate::config::QueueLimits;

/// Outcome of [`EventBuffer::get_event`].
#[derive(Debug)]
pub enum BufferRead {
    /// The wait produced nothing useful; the caller decides whether to
    /// retry or give up.
    None,
    /// A fully populated event synthesised by the buffer itself, such as
    /// a platform wake.
    System(Event),
    /// The id of an event previously enqueued via
    /// [`EventBuffer::add_event`].
    User(u32),
}

/// The low-level queue and timer-handle factory the dispatcher drives.
///
/// Platform backends (an X11 connection, a message pump) implement this to
/// merge OS events into the queue; [`SimpleEventBuffer`] is the in-memory
/// default. `wait_for_event` is the only operation allowed to block and is
/// always invoked with no queue locks held. Both the wait and the read may
/// be spurious; the dispatcher loop tolerates that.
pub trait EventBuffer: Send + Sync {
    /// Cheap emptiness probe; must not block.
    fn is_empty(&self) -> bool;

    /// Block until an event may be ready or the timeout lapses.
    ///
    /// `None` waits indefinitely; `Some(Duration::ZERO)` polls.
    fn wait_for_event(&self, timeout: Option<Duration>);

    /// Non-blocking read of the next ready event.
    fn get_event(&self) -> BufferRead;

    /// Enqueue a stored event's id. Returns false when the buffer refuses
    /// under resource pressure, in which case the caller reclaims the id.
    fn add_event(&self, id: u32) -> bool;

    /// Mint a platform timer handle. The dispatcher passes it back on
    /// [`EventBuffer::delete_timer`] and embeds it in timer payloads; it
    /// never drives scheduling off it.
    fn new_timer(&self, period: Duration, one_shot: bool) -> TimerHandle;

    /// Release a handle minted by [`EventBuffer::new_timer`].
    fn delete_timer(&self, handle: TimerHandle);
}

/// Default in-memory buffer: a bounded FIFO of event ids.
///
/// Posts go through a bounded channel so a full buffer refuses enqueue
/// instead of growing without limit. A wait that receives an entry parks
/// it in a pending cell for the following read, since waiting and reading
/// are separate operations.
pub struct SimpleEventBuffer {
    tx: Sender<u32>,
    rx: Receiver<u32>,
    pending: Mutex<VecDeque<u32>>,
    next_timer: AtomicU64,
}

impl SimpleEventBuffer {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            pending: Mutex::new(VecDeque::new()),
            next_timer: AtomicU64::new(1),
        }
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, VecDeque<u32>> {
        self.pending.lock().expect("event buffer pending lock poisoned")
    }
}

impl Default for SimpleEventBuffer {
    fn default() -> Self {
        Self::new(QueueLimits::default().max_pending_events)
    }
}

impl EventBuffer for SimpleEventBuffer {
    fn is_empty(&self) -> bool {
        self.pending().is_empty() && self.rx.is_empty()
    }

    fn wait_for_event(&self, timeout: Option<Duration>) {
        if !self.is_empty() {
            return;
        }
        let received = match timeout {
            None => self.rx.recv().ok(),
            Some(limit) if limit.is_zero() => self.rx.try_recv().ok(),
            Some(limit) => match self.rx.recv_timeout(limit) {
                Ok(id) => Some(id),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
            },
        };
        if let Some(id) = received {
            self.pending().push_back(id);
        }
    }

    fn get_event(&self) -> BufferRead {
        if let Some(id) = self.pending().pop_front() {
            return BufferRead::User(id);
        }
        match self.rx.try_recv() {
            Ok(id) => BufferRead::User(id),
            Err(_) => BufferRead::None,
        }
    }

    fn add_event(&self, id: u32) -> bool {
        match self.tx.try_send(id) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    fn new_timer(&self, _period: Duration, _one_shot: bool) -> TimerHandle {
        // The in-memory buffer has no platform timer facility; it only
        // mints identities.
        TimerHandle::from_raw(self.next_timer.fetch_add(1, Ordering::Relaxed))
    }

    fn delete_timer(&self, _handle: TimerHandle) {}
}
