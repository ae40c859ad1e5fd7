//! Bounded, synchronous publish/subscribe registry.
//!
//! Each component owns one [`EventRegistry`]: a fixed grid of
//! `KINDS` rows (one per event kind) by `SLOTS` listener handles.
//! Registering past capacity fails instead of growing, and the registry
//! itself never allocates.
//!
//! ```text
//! ┌──────────────┐ publish(ev) ┌──────────────────────────────┐
//! │  Adapter /   │────────────▶│ row[kind(ev)]: [l0, l1, ..]  │──▶ l0(&ev), l1(&ev), ..
//! │  Updater     │             │  (heapless, SLOTS entries)   │
//! └──────────────┘             └──────────────────────────────┘
//! ```
//!
//! Dispatch runs on the publishing thread, in registration order. The row
//! is snapshotted before dispatch, so a listener may subscribe or
//! unsubscribe while being called; the change applies to later publishes.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

/// Listener slots per event kind unless a registry asks for more.
pub const DEFAULT_LISTENER_SLOTS: usize = 4;

/// Closed set of event kinds, each mapped to a row of the registry.
pub trait EventKind: Copy + fmt::Debug {
    /// Number of kinds; row indices are `0..COUNT`.
    const COUNT: usize;

    fn index(self) -> usize;
}

/// A tagged event whose tag selects the listener row.
pub trait Event {
    type Kind: EventKind;

    fn kind(&self) -> Self::Kind;
}

/// Shared callback handle. Identity is the allocation, so cloning a handle
/// and subscribing the clone counts as the same listener.
pub type Listener<E> = Rc<dyn Fn(&E)>;

/// Wrap a closure as a [`Listener`].
pub fn listener<E, F>(f: F) -> Listener<E>
where
    F: Fn(&E) + 'static,
{
    Rc::new(f)
}

/// Every slot for the requested kind is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryFull;

impl fmt::Display for RegistryFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no free listener slot")
    }
}

/// Fixed-capacity listener table.
pub struct EventRegistry<E: Event, const KINDS: usize, const SLOTS: usize = DEFAULT_LISTENER_SLOTS>
{
    rows: RefCell<[heapless::Vec<Listener<E>, SLOTS>; KINDS]>,
}

impl<E: Event, const KINDS: usize, const SLOTS: usize> EventRegistry<E, KINDS, SLOTS> {
    pub fn new() -> Self {
        const { assert!(KINDS > 0 && SLOTS > 0) };
        debug_assert!(KINDS >= E::Kind::COUNT, "registry has fewer rows than event kinds");
        Self {
            rows: RefCell::new(core::array::from_fn(|_| heapless::Vec::new())),
        }
    }

    /// Register `listener` for `kind`.
    ///
    /// Already-registered handles are accepted without taking a second slot.
    pub fn subscribe(&self, kind: E::Kind, listener: &Listener<E>) -> Result<(), RegistryFull> {
        let mut rows = self.rows.borrow_mut();
        let Some(row) = rows.get_mut(kind.index()) else {
            return Err(RegistryFull);
        };
        if row.iter().any(|l| Rc::ptr_eq(l, listener)) {
            return Ok(());
        }
        row.push(Rc::clone(listener)).map_err(|_| RegistryFull)
    }

    /// Remove `listener` from `kind`. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, kind: E::Kind, listener: &Listener<E>) -> bool {
        let mut rows = self.rows.borrow_mut();
        let Some(row) = rows.get_mut(kind.index()) else {
            return false;
        };
        match row.iter().position(|l| Rc::ptr_eq(l, listener)) {
            Some(pos) => {
                row.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Call every listener registered for the event's kind.
    pub fn publish(&self, event: &E) {
        let snapshot = self.rows.borrow().get(event.kind().index()).cloned();
        if let Some(row) = snapshot {
            for l in &row {
                l(event);
            }
        }
    }

    pub fn listener_count(&self, kind: E::Kind) -> usize {
        self.rows.borrow().get(kind.index()).map_or(0, |row| row.len())
    }

    /// Drop every registration.
    pub fn clear(&self) {
        for row in self.rows.borrow_mut().iter_mut() {
            row.clear();
        }
    }
}

impl<E: Event, const KINDS: usize, const SLOTS: usize> Default for EventRegistry<E, KINDS, SLOTS> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────
