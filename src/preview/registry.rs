// Single-active-overlay coordination across every icon's state machine.
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::debug;

use crate::preview::callbacks::ForceIdleReason;
use crate::preview::state_machine::PreviewStateMachine;

/// Tracks the one machine whose overlay may be on screen.
///
/// Constructed once per session and injected into every machine. Holds only a weak reference,
/// so a dropped machine never keeps the slot alive.
#[derive(Default)]
pub struct PreviewRegistry {
    active: RefCell<Option<Weak<PreviewStateMachine>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `machine`, forcing a different visible machine back to idle first.
    pub fn register(&self, machine: &Rc<PreviewStateMachine>) {
        let previous = self.active();
        if let Some(previous) = previous.filter(|previous| !Rc::ptr_eq(previous, machine)) {
            if previous.state().is_visible() {
                debug!(
                    "preview registry: {} replaces {}",
                    machine.label(),
                    previous.label()
                );
                previous.force_idle(ForceIdleReason::PreviewElsewhere);
            }
        }
        *self.active.borrow_mut() = Some(Rc::downgrade(machine));
    }

    /// Release the slot if `machine` holds it. Returns whether it did.
    pub fn unregister(&self, machine: &PreviewStateMachine) -> bool {
        let mut active = self.active.borrow_mut();
        let holds_slot = active
            .as_ref()
            .is_some_and(|current| std::ptr::eq(current.as_ptr(), machine));
        if holds_slot {
            *active = None;
        }
        holds_slot
    }

    pub fn active(&self) -> Option<Rc<PreviewStateMachine>> {
        self.active.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn is_active(&self, machine: &PreviewStateMachine) -> bool {
        self.active
            .borrow()
            .as_ref()
            .is_some_and(|current| std::ptr::eq(current.as_ptr(), machine))
    }
}
