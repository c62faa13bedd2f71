//! Handler registration keyed by (event type, target).

use std::collections::HashMap;
use std::sync::Arc;

use super::event::{Event, EventType, Target};

/// A callback installed for (type, target) or as a per-target catch-all.
///
/// Handlers run on the consumer thread with no queue locks held, so they
/// may freely re-enter the queue to post follow-up events, install or
/// remove handlers, and manage timers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
}

impl<F> EventHandler for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn handle(&self, event: &Event) {
        self(event)
    }
}

/// Owned handler table with exact and catch-all lookup.
///
/// The catch-all slot for a target is the entry keyed by
/// `EventType::UNKNOWN`; it is consulted only when the exact (type,
/// target) lookup misses.
pub(crate) struct HandlerRegistry {
    handlers: HashMap<(EventType, Target), Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Install a handler, dropping any prior one for the same key.
    pub(crate) fn adopt(
        &mut self,
        event_type: EventType,
        target: Target,
        handler: Arc<dyn EventHandler>,
    ) {
        self.handlers.insert((event_type, target), handler);
    }

    /// Detach a handler, transferring ownership to the caller.
    pub(crate) fn orphan(
        &mut self,
        event_type: EventType,
        target: Target,
    ) -> Option<Arc<dyn EventHandler>> {
        self.handlers.remove(&(event_type, target))
    }

    /// Exact lookup, falling through to the target's catch-all.
    pub(crate) fn lookup(
        &self,
        event_type: EventType,
        target: Target,
    ) -> Option<Arc<dyn EventHandler>> {
        self.handlers
            .get(&(event_type, target))
            .or_else(|| self.handlers.get(&(EventType::UNKNOWN, target)))
            .cloned()
    }
}
