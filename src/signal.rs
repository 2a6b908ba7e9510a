// Typed single-threaded observer with scoped connections.
use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Handler<T> = Rc<dyn Fn(T)>;

struct Slots<T> {
    next_id: u64,
    handlers: Vec<(u64, Handler<T>)>,
}

impl<T> Slots<T> {
    fn contains(&self, id: u64) -> bool {
        self.handlers.iter().any(|(slot, _)| *slot == id)
    }
}

/// Notifies connected handlers with a copyable value.
pub struct Signal<T> {
    slots: Rc<RefCell<Slots<T>>>,
}

impl<T: Copy + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    /// Connect a handler; it stays connected until the returned guard is dropped.
    #[must_use = "dropping the connection disconnects the handler"]
    pub fn connect(&self, handler: impl Fn(T) + 'static) -> Connection {
        let id = {
            let mut slots = self.slots.borrow_mut();
            let id = slots.next_id;
            slots.next_id = slots.next_id.wrapping_add(1);
            slots.handlers.push((id, Rc::new(handler)));
            id
        };
        let weak: Weak<RefCell<Slots<T>>> = Rc::downgrade(&self.slots);
        Connection {
            release: Some(Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    slots.borrow_mut().handlers.retain(|(slot, _)| *slot != id);
                }
            })),
        }
    }

    pub fn emit(&self, value: T) {
        // Snapshot so handlers may connect or disconnect while we iterate.
        let handlers: Vec<(u64, Handler<T>)> = self.slots.borrow().handlers.clone();
        for (id, handler) in handlers {
            if self.slots.borrow().contains(id) {
                handler(value);
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.slots.borrow().handlers.len()
    }
}

/// Scoped subscription; disconnects its handler when dropped.
pub struct Connection {
    release: Option<Box<dyn FnOnce()>>,
}

impl Connection {
    pub fn disconnect(mut self) {
        self.release_now();
    }

    pub fn is_connected(&self) -> bool {
        self.release.is_some()
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.release_now();
    }
}
