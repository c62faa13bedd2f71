//! Event values and the event-type id space.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::timer::TimerHandle;

/// Integer identifier for a kind of event.
///
/// Four ids are reserved: [`EventType::UNKNOWN`] (the catch-all handler
/// key), [`EventType::QUIT`] (injected by the interrupt watcher),
/// [`EventType::SYSTEM`] (synthesised by a buffer) and
/// [`EventType::TIMER`] (synthesised by the timer scheduler). Client types
/// are allocated via [`QueueHandle::register_type`] starting strictly
/// after the [`EventType::LAST`] sentinel.
///
/// [`QueueHandle::register_type`]: super::QueueHandle::register_type
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EventType(pub(crate) u32);

impl EventType {
    /// Sentinel / catch-all key; never delivered as a posted event.
    pub const UNKNOWN: EventType = EventType(0);
    /// Termination request, posted by the interrupt watcher.
    pub const QUIT: EventType = EventType(1);
    /// Synthesised by a buffer implementation (e.g. a platform wake).
    pub const SYSTEM: EventType = EventType(2);
    /// Synthesised by the timer scheduler; payload is [`TimerFired`].
    ///
    /// [`TimerFired`]: super::TimerFired
    pub const TIMER: EventType = EventType(3);
    /// Sentinel; the first client-allocatable id is its successor.
    pub const LAST: EventType = EventType(4);

    /// True for the reserved ids up to and including the sentinel.
    pub fn is_reserved(self) -> bool {
        self.0 <= Self::LAST.0
    }

    /// The raw integer id, for logs and wire encodings.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// Caller-held slot for idempotent type registration.
///
/// Declare one as a `static` next to the code that owns the event type:
///
/// ```
/// use deskspan_queue::EventTypeSlot;
/// static CLIPBOARD_CHANGED: EventTypeSlot = EventTypeSlot::new();
/// ```
///
/// [`QueueHandle::register_type_once`] writes the slot on first use and
/// returns the stable id on every later call, from any thread.
///
/// [`QueueHandle::register_type_once`]: super::QueueHandle::register_type_once
pub struct EventTypeSlot(AtomicU32);

impl EventTypeSlot {
    pub const fn new() -> Self {
        Self(AtomicU32::new(EventType::UNKNOWN.0))
    }

    // Loads and stores happen under the queue state mutex, which provides
    // the ordering; the atomic only makes the static shareable.
    pub(crate) fn get(&self) -> EventType {
        EventType(self.0.load(Ordering::Relaxed))
    }

    pub(crate) fn set(&self, value: EventType) {
        self.0.store(value.0, Ordering::Relaxed);
    }
}

impl Default for EventTypeSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventTypeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventTypeSlot").field(&self.get().0).finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum TargetId {
    None,
    App(u64),
    Timer(u64),
}

/// Opaque identity that partitions handler lookup.
///
/// Targets are only ever compared and hashed; the queue attaches no other
/// meaning to them. [`Target::none`] is the null target carried by quit and
/// default events; [`Target::new`] mints a process-unique application
/// target; a [`TimerHandle`] converts into the target its timer events use
/// when no explicit target was supplied. The three spaces never collide.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Target(TargetId);

impl Target {
    /// The null target.
    pub const fn none() -> Self {
        Target(TargetId::None)
    }

    /// Mint a fresh process-unique target.
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Target(TargetId::App(NEXT.fetch_add(1, Ordering::Relaxed)))
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::none()
    }
}

impl From<TimerHandle> for Target {
    fn from(handle: TimerHandle) -> Self {
        Target(TargetId::Timer(handle.as_raw()))
    }
}

/// An immutable (type, target, data) tuple delivered by the queue.
///
/// The data payload is an opaque owned blob: ownership transfers into the
/// queue on post and back out on retrieval, and dropping the event drops
/// the payload. The queue never inspects payloads except for timer events,
/// whose payload is [`TimerFired`].
///
/// [`TimerFired`]: super::TimerFired
pub struct Event {
    event_type: EventType,
    target: Target,
    data: Option<Box<dyn Any + Send>>,
}

impl Event {
    /// An event with no payload.
    pub fn new(event_type: EventType, target: Target) -> Self {
        Self {
            event_type,
            target,
            data: None,
        }
    }

    /// An event carrying an owned payload.
    pub fn with_data<T: Any + Send>(event_type: EventType, target: Target, data: T) -> Self {
        Self {
            event_type,
            target,
            data: Some(Box::new(data)),
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Borrow the payload, if present and of the expected type.
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.as_ref()?.downcast_ref()
    }

    /// Take ownership of the payload, if present and of the expected type.
    pub fn into_data<T: Any>(self) -> Option<T> {
        let data = self.data?;
        match data.downcast::<T>() {
            Ok(boxed) => Some(*boxed),
            Err(_) => None,
        }
    }
}

impl Default for Event {
    /// The `(UNKNOWN, none, no data)` value returned for unknown store ids.
    fn default() -> Self {
        Self::new(EventType::UNKNOWN, Target::none())
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("target", &self.target)
            .field("has_data", &self.data.is_some())
            .finish()
    }
}

/// Mapping from type id to human-readable name.
///
/// Ids grow monotonically and are never reused; the reserved ids are never
/// inserted and resolve by constant lookup.
pub(crate) struct TypeRegistry {
    next: u32,
    names: HashMap<u32, String>,
}

impl TypeRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next: EventType::LAST.0 + 1,
            names: HashMap::new(),
        }
    }

    pub(crate) fn alloc(&mut self, name: &str) -> EventType {
        let id = self.next;
        self.next += 1;
        self.names.insert(id, name.to_owned());
        tracing::debug!(name, id, "registered event type");
        EventType(id)
    }

    pub(crate) fn name(&self, event_type: EventType) -> String {
        match event_type {
            EventType::UNKNOWN => "nil".to_string(),
            EventType::QUIT => "quit".to_string(),
            EventType::SYSTEM => "system".to_string(),
            EventType::TIMER => "timer".to_string(),
            other => self
                .names
                .get(&other.0)
                .cloned()
                .unwrap_or_else(|| "<unknown>".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_ids_start_after_the_sentinel() {
        let mut registry = TypeRegistry::new();
        let first = registry.alloc("foo");
        let second = registry.alloc("bar");
        assert_eq!(first, EventType(5));
        assert_eq!(second, EventType(6));
        assert!(!first.is_reserved());
    }

    #[test]
    fn reserved_names_resolve_without_registration() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.name(EventType::UNKNOWN), "nil");
        assert_eq!(registry.name(EventType::QUIT), "quit");
        assert_eq!(registry.name(EventType::SYSTEM), "system");
        assert_eq!(registry.name(EventType::TIMER), "timer");
        assert_eq!(registry.name(EventType(99)), "<unknown>");
    }

    #[test]
    fn registered_name_round_trips() {
        let mut registry = TypeRegistry::new();
        let ty = registry.alloc("clipboard changed");
        assert_eq!(registry.name(ty), "clipboard changed");
    }

    #[test]
    fn targets_are_distinct_identities() {
        let a = Target::new();
        let b = Target::new();
        assert_ne!(a, b);
        assert_ne!(a, Target::none());
        assert_ne!(Target::from(TimerHandle::from_raw(1)), a);
        assert_eq!(
            Target::from(TimerHandle::from_raw(7)),
            Target::from(TimerHandle::from_raw(7))
        );
    }

    #[test]
    fn payload_downcasts_by_type() {
        let event = Event::with_data(EventType(5), Target::none(), "payload".to_string());
        assert_eq!(event.data::<String>().map(String::as_str), Some("payload"));
        assert!(event.data::<u32>().is_none());
        assert_eq!(event.into_data::<String>().as_deref(), Some("payload"));
    }

    #[test]
    fn default_event_is_the_unknown_sentinel() {
        let event = Event::default();
        assert_eq!(event.event_type(), EventType::UNKNOWN);
        assert_eq!(event.target(), Target::none());
        assert!(event.data::<()>().is_none());
    }
}
