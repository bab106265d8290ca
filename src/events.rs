//! In-process notifications about student changes.

use crate::data::student::Student;
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    StudentCreated,
    StudentUpdated,
    StudentDeleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentEvent {
    Created(Student),
    Updated(Student),
    Deleted { id: i32 },
}

impl StudentEvent {
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Created(_) => EventKind::StudentCreated,
            Self::Updated(_) => EventKind::StudentUpdated,
            Self::Deleted { .. } => EventKind::StudentDeleted,
        }
    }

    pub const fn student_id(&self) -> i32 {
        match self {
            Self::Created(s) | Self::Updated(s) => s.id,
            Self::Deleted { id } => *id,
        }
    }
}

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type Handler = Arc<dyn Fn(&StudentEvent) -> Result<(), HandlerError> + Send + Sync>;

/// Synchronous publish/subscribe keyed by [`EventKind`].
///
/// Handlers run on the publishing thread in the order they subscribed. A handler that errors or
/// panics gets logged and skipped, the rest still run and the publisher never sees the failure.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: EventKind, handler: Handler) {
        self.handlers.write().entry(kind).or_default().push(handler);
    }

    /// Removes `handler` from `kind` by pointer identity. Returns whether it was registered.
    pub fn unsubscribe(&self, kind: EventKind, handler: &Handler) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };

        let before = list.len();
        list.retain(|h| !Arc::ptr_eq(h, handler));
        before != list.len()
    }

    pub fn publish(&self, event: &StudentEvent) {
        let kind = event.kind();
        //clone out so handlers can (un)subscribe without deadlocking
        let handlers = self.handlers.read().get(&kind).cloned().unwrap_or_default();

        for (i, handler) in handlers.into_iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(?kind, handler = i, %e, "Event handler failed"),
                Err(_) => error!(?kind, handler = i, "Event handler panicked"),
            }
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let counts: HashMap<_, _> = handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}
