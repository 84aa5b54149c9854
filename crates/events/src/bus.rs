use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::event::{Event, EventKind};

type Handler = Rc<RefCell<Box<dyn FnMut(&Event)>>>;

struct Entry {
    kind: EventKind,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: BTreeMap<u64, Entry>,
}

/// Synchronous, single-threaded event bus.
///
/// Cloning the bus yields another handle to the same subscriber table.
/// Handlers run inline on `publish`, in subscription order.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every event of `kind`.
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// disposed or dropped.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: FnMut(&Event) + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.insert(
            id,
            Entry {
                kind,
                handler: Rc::new(RefCell::new(Box::new(handler))),
            },
        );
        tracing::trace!(subscription = id, ?kind, "subscribed");
        Subscription {
            id,
            kind,
            registry: Rc::downgrade(&self.registry),
            active: true,
        }
    }

    /// Deliver `event` to every live handler of its kind.
    ///
    /// Returns the number of handlers invoked. Handlers may subscribe,
    /// dispose or publish while running.
    pub fn publish(&self, event: impl Into<Event>) -> usize {
        let event = event.into();
        let kind = event.kind();
        let targets: Vec<(u64, Handler)> = self
            .registry
            .borrow()
            .entries
            .iter()
            .filter(|(_, entry)| entry.kind == kind)
            .map(|(id, entry)| (*id, Rc::clone(&entry.handler)))
            .collect();

        let mut delivered = 0;
        for (id, handler) in targets {
            if !self.registry.borrow().entries.contains_key(&id) {
                continue;
            }
            match handler.try_borrow_mut() {
                Ok(mut handler) => {
                    (&mut **handler)(&event);
                    delivered += 1;
                }
                Err(_) => {
                    tracing::warn!(
                        subscription = id,
                        ?kind,
                        "handler is already running, skipping re-entrant delivery"
                    );
                }
            }
        }
        tracing::trace!(?kind, delivered, "published");
        delivered
    }

    /// Number of live subscriptions for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.registry
            .borrow()
            .entries
            .values()
            .filter(|entry| entry.kind == kind)
            .count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.borrow();
        f.debug_struct("EventBus")
            .field("subscriptions", &registry.entries.len())
            .finish()
    }
}

/// Handle to one registered handler.
///
/// `dispose` is idempotent and safe after the bus is gone. Dropping the
/// handle disposes it.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    registry: Weak<RefCell<Registry>>,
    active: bool,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Unregister the handler. Later calls do nothing.
    pub fn dispose(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        // The removed handler is dropped after the borrow ends, so a handler
        // that owns subscriptions of its own can dispose them safely.
        let removed = registry.borrow_mut().entries.remove(&self.id);
        tracing::trace!(subscription = self.id, kind = ?self.kind, "disposed");
        drop(removed);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("active", &self.active)
            .finish()
    }
}
