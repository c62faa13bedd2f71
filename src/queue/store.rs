//! Dense id-indexed storage for posted event payloads.

use std::collections::HashMap;

use super::event::Event;

/// Maps a recyclable integer id to an owned event.
///
/// Ids handed to the buffer stay dense: removal pushes the id onto a free
/// list and the next save pops it back before a fresh id is minted. An id
/// is always in exactly one of: the store, the free list, or the
/// never-allocated range.
pub(crate) struct EventStore {
    events: HashMap<u32, Event>,
    free: Vec<u32>,
}

impl EventStore {
    pub(crate) fn new() -> Self {
        Self {
            events: HashMap::new(),
            free: Vec::new(),
        }
    }

    /// Store an event, returning the id the buffer will carry.
    pub(crate) fn save(&mut self, event: Event) -> u32 {
        let id = match self.free.pop() {
            Some(recycled) => recycled,
            // Fresh ids equal the live count, which keeps the id range
            // dense under the free-list discipline.
            None => self.events.len() as u32,
        };
        self.events.insert(id, event);
        id
    }

    /// Extract the event for an id, recycling the id.
    ///
    /// Unknown ids yield the default (unknown) event and recycle nothing.
    pub(crate) fn remove(&mut self, id: u32) -> Event {
        match self.events.remove(&id) {
            Some(event) => {
                self.free.push(id);
                event
            }
            None => Event::default(),
        }
    }

    /// Drop every stored payload and the free list.
    ///
    /// Used when the buffer is swapped: the ids the old buffer held no
    /// longer mean anything.
    pub(crate) fn clear(&mut self) {
        self.events.clear();
        self.free.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }
}
