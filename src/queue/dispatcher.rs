//! The top-level event queue: type registration, handler registration,
//! the get/dispatch loop, and the process-wide instance.

use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::buffer::{BufferRead, EventBuffer, SimpleEventBuffer};
use super::clock::Stopwatch;
use super::event::{Event, EventType, EventTypeSlot, Target, TypeRegistry};
use super::handler::{EventHandler, HandlerRegistry};
use super::interrupt::InterruptWatcher;
use super::metrics::QueueMetrics;
use super::store::EventStore;
use super::timer::{TimerFired, TimerHandle, TimerHint, TimerQueue};
use crate::config::QueueConfig;
use crate::{QueueError, Result};

/// The one process-wide instance, installed at construction and removed
/// at teardown. The interrupt watcher reaches the queue through here.
static GLOBAL: Mutex<Option<QueueHandle>> = Mutex::new(None);

/// Everything mutable lives behind one mutex: the type registry, the
/// event store, the handler registry, and the timer scheduler. Public
/// operations take the lock on entry; the only blocking call
/// (`EventBuffer::wait_for_event`) always runs with the lock released.
struct QueueState {
    buffer: Arc<dyn EventBuffer>,
    types: TypeRegistry,
    store: EventStore,
    handlers: HandlerRegistry,
    timers: TimerQueue,
    metrics: QueueMetrics,
}

struct QueueInner {
    state: Mutex<QueueState>,
}

/// Cloneable accessor to a queue instance.
///
/// This is the surface producers use from any thread, and what
/// [`EventQueue::global`] returns. The owning [`EventQueue`] derefs to it,
/// so every operation below is available on both.
#[derive(Clone)]
pub struct QueueHandle {
    inner: Arc<QueueInner>,
}

impl QueueHandle {
    pub(crate) fn detached(buffer: Arc<dyn EventBuffer>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    buffer,
                    types: TypeRegistry::new(),
                    store: EventStore::new(),
                    handlers: HandlerRegistry::new(),
                    timers: TimerQueue::new(),
                    metrics: QueueMetrics::default(),
                }),
            }),
        }
    }

    // Handlers run with the lock released and no queue operation can
    // panic while holding it, so poisoning here is a programming error.
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .expect("event queue state lock poisoned")
    }

    /// Allocate a fresh event type id under the given name.
    pub fn register_type(&self, name: &str) -> EventType {
        self.state().types.alloc(name)
    }

    /// Allocate a type id into `slot` the first time, returning the
    /// stable id on every call. Idempotent across threads.
    pub fn register_type_once(&self, slot: &EventTypeSlot, name: &str) -> EventType {
        let mut state = self.state();
        let current = slot.get();
        if current != EventType::UNKNOWN {
            return current;
        }
        let id = state.types.alloc(name);
        slot.set(id);
        id
    }

    /// Human-readable name for a type id, for logs and diagnostics.
    pub fn type_name(&self, event_type: EventType) -> String {
        self.state().types.name(event_type)
    }

    /// Post an event from any thread.
    ///
    /// Types the queue itself synthesises (`UNKNOWN`, `SYSTEM`, `TIMER`)
    /// are discarded, payload included. When the buffer refuses the
    /// enqueue the payload is dropped and the `dropped` counter bumped;
    /// the poster is not notified.
    pub fn post(&self, event: Event) {
        match event.event_type() {
            EventType::UNKNOWN | EventType::SYSTEM | EventType::TIMER => {
                tracing::debug!(
                    event_type = ?event.event_type(),
                    "discarding posted event of a queue-synthesised type"
                );
                self.state().metrics.record_discarded();
                return;
            }
            _ => {}
        }

        let mut state = self.state();
        let id = state.store.save(event);
        if state.buffer.add_event(id) {
            state.metrics.record_posted();
        } else {
            let _ = state.store.remove(id);
            state.metrics.record_dropped();
            tracing::debug!(id, "buffer refused event, payload dropped");
        }
    }

    /// Wait for the next event.
    ///
    /// `None` waits indefinitely; `Some(Duration::ZERO)` polls. Returns
    /// `None` once the timeout lapses with nothing to deliver. Due timers
    /// are checked before every wait slice and after every wake, so
    /// neither timers nor buffer events can starve the other.
    pub fn next_event(&self, timeout: Option<Duration>) -> Option<Event> {
        let budget = timeout.map(|t| t.as_secs_f64());
        let stopwatch = Stopwatch::new();

        loop {
            // While the buffer has nothing: fire due timers, then wait
            // for the shorter of the caller's remaining budget and the
            // nearest timer.
            let buffer = loop {
                enum Step {
                    Ready(Arc<dyn EventBuffer>),
                    Wait(Arc<dyn EventBuffer>, Option<Duration>),
                }

                let step = {
                    let mut state = self.state();
                    if !state.buffer.is_empty() {
                        Step::Ready(state.buffer.clone())
                    } else if let Some(event) = state.timers.sweep() {
                        let missed = event.data::<TimerFired>().map_or(0, |fired| fired.count);
                        state.metrics.record_timer_fired(missed);
                        return Some(event);
                    } else {
                        let time_left = match budget {
                            Some(total) => {
                                let left = total - stopwatch.elapsed_secs();
                                if left <= 0.0 {
                                    return None;
                                }
                                Some(left)
                            }
                            None => None,
                        };
                        Step::Wait(state.buffer.clone(), wait_slice(state.timers.hint(), time_left))
                    }
                };

                match step {
                    Step::Ready(buffer) => break buffer,
                    Step::Wait(buffer, slice) => buffer.wait_for_event(slice),
                }
            };

            match buffer.get_event() {
                BufferRead::System(event) => return Some(event),
                BufferRead::User(id) => return Some(self.state().store.remove(id)),
                BufferRead::None => match budget {
                    // A spurious wake: retry while the budget allows.
                    None => continue,
                    Some(total) if stopwatch.elapsed_secs() < total => continue,
                    Some(_) => return None,
                },
            }
        }
    }

    /// Run the handler registered for the event.
    ///
    /// Exact (type, target) lookup wins; the target's catch-all is
    /// consulted on a miss. Returns false when neither exists. The
    /// handler runs with no locks held and may re-enter the queue.
    pub fn dispatch(&self, event: &Event) -> bool {
        let handler = {
            let mut state = self.state();
            let handler = state.handlers.lookup(event.event_type(), event.target());
            if handler.is_none() {
                state.metrics.record_unhandled();
            }
            handler
        };
        match handler {
            Some(handler) => {
                handler.handle(event);
                true
            }
            None => false,
        }
    }

    /// Install a handler for (type, target), dropping any previous one.
    ///
    /// Passing `EventType::UNKNOWN` installs the target's catch-all, the
    /// same slot [`QueueHandle::adopt_catch_all`] writes.
    pub fn adopt_handler(
        &self,
        event_type: EventType,
        target: Target,
        handler: impl EventHandler + 'static,
    ) {
        self.state()
            .handlers
            .adopt(event_type, target, Arc::new(handler));
    }

    /// Install the catch-all handler for a target.
    pub fn adopt_catch_all(&self, target: Target, handler: impl EventHandler + 'static) {
        self.adopt_handler(EventType::UNKNOWN, target, handler);
    }

    /// Detach a handler, transferring ownership to the caller.
    pub fn orphan_handler(
        &self,
        event_type: EventType,
        target: Target,
    ) -> Option<Arc<dyn EventHandler>> {
        self.state().handlers.orphan(event_type, target)
    }

    /// Detach a target's catch-all handler.
    pub fn orphan_catch_all(&self, target: Target) -> Option<Arc<dyn EventHandler>> {
        self.orphan_handler(EventType::UNKNOWN, target)
    }

    /// Remove and drop a handler. A no-op when none is installed.
    pub fn remove_handler(&self, event_type: EventType, target: Target) {
        drop(self.orphan_handler(event_type, target));
    }

    /// Remove and drop a target's catch-all handler.
    pub fn remove_catch_all(&self, target: Target) {
        drop(self.orphan_catch_all(target));
    }

    /// Create a repeating timer. Delivers a TIMER event every `period`.
    ///
    /// With no target, the minted handle serves as the event target, so
    /// the caller gets identifiable events without pre-allocating one.
    /// `period` must be strictly positive.
    pub fn new_timer(&self, period: Duration, target: Option<Target>) -> TimerHandle {
        self.create_timer(period, target, false)
    }

    /// Create a timer that fires once and unregisters itself.
    pub fn new_one_shot_timer(&self, period: Duration, target: Option<Target>) -> TimerHandle {
        self.create_timer(period, target, true)
    }

    fn create_timer(&self, period: Duration, target: Option<Target>, one_shot: bool) -> TimerHandle {
        assert!(!period.is_zero(), "timer period must be positive");
        let mut state = self.state();
        let handle = state.buffer.new_timer(period, one_shot);
        let target = target.unwrap_or_else(|| Target::from(handle));
        state.timers.insert(handle, period, target, one_shot);
        handle
    }

    /// Delete a timer. Safe while one of its events is in flight; the
    /// handle inside an already-delivered payload stays comparable but
    /// must not be passed back to the queue afterwards.
    pub fn delete_timer(&self, handle: TimerHandle) {
        let mut state = self.state();
        state.timers.remove(handle);
        state.buffer.delete_timer(handle);
    }

    /// Replace the underlying buffer.
    ///
    /// Payloads of posted-but-unretrieved events are dropped: the ids the
    /// old buffer held no longer mean anything.
    pub fn adopt_buffer(&self, buffer: impl EventBuffer + 'static) {
        let mut state = self.state();
        state.buffer = Arc::new(buffer);
        state.store.clear();
        state.metrics.record_buffer_swapped();
        tracing::info!("event buffer replaced, pending events dropped");
    }

    /// Snapshot of this instance's operational counters.
    pub fn metrics(&self) -> QueueMetrics {
        self.state().metrics
    }

    /// True when nothing is buffered and no timer is currently due.
    ///
    /// NOTE: an already-due timer marks the queue as non-empty even
    /// though nothing is buffered yet; callers use this to decide whether
    /// another get/dispatch pass is owed before idling.
    pub fn is_empty(&self) -> bool {
        let state = self.state();
        state.buffer.is_empty() && state.timers.hint() != TimerHint::Due
    }
}

/// Pick the wait slice: the nearest timer bounds the caller's remaining
/// budget; with neither, wait for a post.
fn wait_slice(hint: TimerHint, time_left: Option<f64>) -> Option<Duration> {
    let seconds = match (hint, time_left) {
        (TimerHint::Idle, None) => return None,
        (TimerHint::Idle, Some(left)) => left,
        (TimerHint::Due, _) => 0.0,
        (TimerHint::In(remaining), None) => remaining,
        (TimerHint::In(remaining), Some(left)) => remaining.min(left),
    };
    Some(Duration::from_secs_f64(seconds.max(0.0)))
}

/// The owning queue object.
///
/// Construction installs the process-wide instance and the interrupt
/// watcher; drop uninstalls both. At most one may exist at a time.
/// Derefs to [`QueueHandle`], so the full operation set is available
/// directly on it.
pub struct EventQueue {
    handle: QueueHandle,
    interrupt: Option<InterruptWatcher>,
}

impl EventQueue {
    /// Build a queue with the default in-memory buffer and limits.
    pub fn new() -> Result<Self> {
        Self::with_config(QueueConfig::default())
    }

    /// Build a queue with explicit limits.
    pub fn with_config(config: QueueConfig) -> Result<Self> {
        let buffer = SimpleEventBuffer::new(config.limits.max_pending_events);
        let handle = QueueHandle::detached(Arc::new(buffer));
        install(&handle)?;
        let interrupt = match InterruptWatcher::spawn() {
            Ok(watcher) => watcher,
            Err(err) => {
                uninstall();
                return Err(QueueError::Interrupt(err));
            }
        };
        tracing::info!("event queue installed");
        Ok(Self {
            handle,
            interrupt: Some(interrupt),
        })
    }

    /// A cloneable accessor for producer threads.
    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// The installed instance, if any. This is how code without a
    /// reference to the queue (the interrupt watcher, platform glue)
    /// reaches it.
    pub fn global() -> Option<QueueHandle> {
        GLOBAL
            .lock()
            .expect("global queue slot poisoned")
            .clone()
    }
}

impl Deref for EventQueue {
    type Target = QueueHandle;

    fn deref(&self) -> &QueueHandle {
        &self.handle
    }
}

impl Drop for EventQueue {
    fn drop(&mut self) {
        // Uninstall first so a late signal finds no queue to post into,
        // then stop the watcher.
        uninstall();
        self.interrupt.take();
        tracing::info!("event queue uninstalled");
    }
}

fn install(handle: &QueueHandle) -> Result<()> {
    let mut slot = GLOBAL.lock().expect("global queue slot poisoned");
    if slot.is_some() {
        return Err(QueueError::AlreadyInstalled);
    }
    *slot = Some(handle.clone());
    Ok(())
}

fn uninstall() {
    *GLOBAL.lock().expect("global queue slot poisoned") = None;
}
