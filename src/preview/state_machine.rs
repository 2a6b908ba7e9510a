// Per-icon hover-preview lifecycle: debounce, modifier poll, cleanup grace period.
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use log::{debug, info};

use crate::modifier::{ModifierKeyPoller, ModifierKeySource, TrackedModifiers};
use crate::preview::callbacks::{ForceIdleReason, PreviewCallbacks};
use crate::preview::config::PreviewConfig;
use crate::preview::registry::PreviewRegistry;
use crate::preview::state::PreviewState;
use crate::settings::Settings;
use crate::timer::{ClockSource, Repeat, TimerHandle};

/// Shared services injected into every state machine.
#[derive(Clone)]
pub struct PreviewServices {
    pub config: PreviewConfig,
    pub clock: Rc<dyn ClockSource>,
    pub modifier: Rc<dyn ModifierKeySource>,
    pub registry: Rc<PreviewRegistry>,
}

impl PreviewServices {
    /// Services whose modifier query follows `config.modifier`. The host pushes keyboard
    /// snapshots into the returned tracker.
    pub fn with_tracked_modifiers(
        config: PreviewConfig,
        clock: Rc<dyn ClockSource>,
        registry: Rc<PreviewRegistry>,
    ) -> (Self, Rc<TrackedModifiers>) {
        let tracked = Rc::new(TrackedModifiers::from_config(&config));
        let services = Self {
            config,
            clock,
            modifier: tracked.clone(),
            registry,
        };
        (services, tracked)
    }

    pub fn from_settings(
        settings: &Settings,
        clock: Rc<dyn ClockSource>,
        registry: Rc<PreviewRegistry>,
    ) -> (Self, Rc<TrackedModifiers>) {
        Self::with_tracked_modifiers(PreviewConfig::from_settings(settings), clock, registry)
    }
}

/// Lifecycle controller for one icon's overlays.
///
/// All state lives in `Cell`s so no borrow is held while callbacks run; callbacks may re-enter
/// the machine. Timer callbacks hold only a weak reference and check liveness first.
pub struct PreviewStateMachine {
    label: String,
    config: PreviewConfig,
    state: Cell<PreviewState>,
    modifier: ModifierKeyPoller,
    debounce_timer: Cell<Option<TimerHandle>>,
    // Non-empty only while showing.
    poll_timer: Cell<Option<TimerHandle>>,
    // Non-empty only during CleanupDelay.
    cleanup_timer: Cell<Option<TimerHandle>>,
    destroyed: Cell<bool>,
    clock: Rc<dyn ClockSource>,
    registry: Rc<PreviewRegistry>,
    callbacks: RefCell<Option<Rc<dyn PreviewCallbacks>>>,
    this: Weak<PreviewStateMachine>,
}

impl PreviewStateMachine {
    pub fn new(
        label: impl Into<String>,
        services: &PreviewServices,
        callbacks: Rc<dyn PreviewCallbacks>,
    ) -> Rc<Self> {
        let label = label.into();
        Rc::new_cyclic(|this| Self {
            label,
            config: services.config,
            state: Cell::new(PreviewState::Idle),
            modifier: ModifierKeyPoller::new(Rc::clone(&services.modifier)),
            debounce_timer: Cell::new(None),
            poll_timer: Cell::new(None),
            cleanup_timer: Cell::new(None),
            destroyed: Cell::new(false),
            clock: Rc::clone(&services.clock),
            registry: Rc::clone(&services.registry),
            callbacks: RefCell::new(Some(callbacks)),
            this: this.clone(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> PreviewState {
        self.state.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn is_debounce_pending(&self) -> bool {
        self.debounce_timer.get().is_some()
    }

    pub fn is_polling(&self) -> bool {
        self.poll_timer.get().is_some()
    }

    pub fn is_cleanup_pending(&self) -> bool {
        self.cleanup_timer.get().is_some()
    }

    /// Number of timers this machine currently owns.
    pub fn active_timers(&self) -> usize {
        [
            self.debounce_timer.get(),
            self.poll_timer.get(),
            self.cleanup_timer.get(),
        ]
        .iter()
        .filter(|handle| handle.is_some())
        .count()
    }

    pub fn on_icon_hover_enter(&self) {
        if self.destroyed.get() {
            return;
        }
        match self.state.get() {
            PreviewState::Idle => self.start_debounce(),
            PreviewState::CleanupDelay => self.reenter_showing(),
            PreviewState::ShowingPreview | PreviewState::ShowingTitle => {}
        }
    }

    pub fn on_icon_hover_leave(&self) {
        if self.destroyed.get() {
            return;
        }
        match self.state.get() {
            PreviewState::Idle => {
                if self.cancel_timer(&self.debounce_timer) {
                    debug!("{}: hover left before debounce elapsed", self.subject());
                }
            }
            PreviewState::ShowingPreview | PreviewState::ShowingTitle => {
                self.transition(PreviewState::CleanupDelay);
            }
            PreviewState::CleanupDelay => self.rearm_aborted_cleanup(),
        }
    }

    pub fn on_overlay_hover_enter(&self) {
        if self.destroyed.get() {
            return;
        }
        if self.state.get() == PreviewState::CleanupDelay {
            self.reenter_showing();
        }
    }

    pub fn on_overlay_hover_leave(&self, icon_still_hovered: bool) {
        if self.destroyed.get() || icon_still_hovered {
            return;
        }
        match self.state.get() {
            PreviewState::ShowingPreview | PreviewState::ShowingTitle => {
                self.transition(PreviewState::CleanupDelay);
            }
            PreviewState::CleanupDelay => self.rearm_aborted_cleanup(),
            PreviewState::Idle => {}
        }
    }

    /// Return to `Idle` from any state, leaving no timer behind.
    pub fn force_idle(&self, reason: ForceIdleReason) {
        if self.destroyed.get() {
            return;
        }
        debug!("{}: forced idle ({reason})", self.subject());
        self.cancel_timer(&self.debounce_timer);
        self.transition(PreviewState::Idle);
        // Covers a strict-policy refusal or a timer re-armed by a re-entrant callback.
        self.cancel_all_timers();
        self.registry.unregister(self);
        if let Some(callbacks) = self.callbacks() {
            callbacks.on_forced_idle(reason);
        }
    }

    /// Hide overlays, cancel timers and detach the callback table. Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.get() {
            return;
        }
        if self.state.get() != PreviewState::Idle {
            self.force_idle(ForceIdleReason::Destroyed);
        }
        self.cancel_all_timers();
        self.state.set(PreviewState::Idle);
        self.registry.unregister(self);
        self.destroyed.set(true);
        let _ = self.callbacks.borrow_mut().take();
        debug!("{}: destroyed", self.subject());
    }

    fn subject(&self) -> String {
        format!("preview {}", self.label)
    }

    fn callbacks(&self) -> Option<Rc<dyn PreviewCallbacks>> {
        self.callbacks.borrow().clone()
    }

    fn start_debounce(&self) {
        if self.debounce_timer.get().is_some() {
            return;
        }
        let weak = self.this.clone();
        let handle = self.clock.schedule(
            self.config.debounce,
            Repeat::Once,
            Box::new(move || {
                if let Some(machine) = weak.upgrade() {
                    machine.debounce_elapsed();
                }
            }),
        );
        self.debounce_timer.set(Some(handle));
    }

    fn debounce_elapsed(&self) {
        if self.destroyed.get() {
            return;
        }
        self.debounce_timer.set(None);
        if self.state.get() != PreviewState::Idle {
            debug!(
                "{}: state moved to {} during debounce, skipping",
                self.subject(),
                self.state.get()
            );
            return;
        }
        let pressed = self.modifier.query();
        self.transition(PreviewState::showing_for(pressed));
    }

    fn reenter_showing(&self) {
        let pressed = self.modifier.query();
        self.transition(PreviewState::showing_for(pressed));
    }

    fn start_poll(&self) {
        if self.poll_timer.get().is_some() {
            return;
        }
        let weak = self.this.clone();
        let handle = self.clock.schedule(
            self.config.poll_interval,
            Repeat::Every,
            Box::new(move || {
                if let Some(machine) = weak.upgrade() {
                    machine.poll_tick();
                }
            }),
        );
        self.poll_timer.set(Some(handle));
    }

    fn poll_tick(&self) {
        if self.destroyed.get() {
            return;
        }
        let state = self.state.get();
        let Some(callbacks) = self.callbacks() else {
            return;
        };
        let content_present = match state {
            PreviewState::ShowingPreview => callbacks.has_preview_content(),
            PreviewState::ShowingTitle => callbacks.has_title_content(),
            PreviewState::Idle | PreviewState::CleanupDelay => {
                self.cancel_timer(&self.poll_timer);
                return;
            }
        };
        drop(callbacks);

        if !content_present {
            info!(
                "{}: overlay for {state} disappeared without notice, going idle",
                self.subject()
            );
            self.force_idle(ForceIdleReason::ContentLost);
            return;
        }

        if self.modifier.sample_edge().is_some() {
            let next = match state {
                PreviewState::ShowingPreview => PreviewState::ShowingTitle,
                _ => PreviewState::ShowingPreview,
            };
            self.transition(next);
        }
    }

    fn start_cleanup(&self) {
        self.cancel_timer(&self.cleanup_timer);
        let weak = self.this.clone();
        let handle = self.clock.schedule(
            self.config.cleanup_delay,
            Repeat::Once,
            Box::new(move || {
                if let Some(machine) = weak.upgrade() {
                    machine.cleanup_elapsed();
                }
            }),
        );
        self.cleanup_timer.set(Some(handle));
    }

    fn rearm_aborted_cleanup(&self) {
        if self.cleanup_timer.get().is_none() {
            debug!("{}: hover lost after aborted cleanup, re-arming", self.subject());
            self.start_cleanup();
        }
    }

    fn cleanup_elapsed(&self) {
        if self.destroyed.get() {
            return;
        }
        self.cleanup_timer.set(None);
        if self.state.get() != PreviewState::CleanupDelay {
            return;
        }
        let abort = self
            .callbacks()
            .is_some_and(|callbacks| callbacks.should_abort_cleanup());
        if abort {
            debug!("{}: still hovered, keeping overlay", self.subject());
            return;
        }
        self.transition(PreviewState::Idle);
    }

    /// Exit the old state, switch, then enter the new one. Self-transitions do nothing.
    fn transition(&self, next: PreviewState) -> bool {
        let current = self.state.get();
        if current == next {
            return false;
        }
        let subject = self.subject();
        if !self.config.policy.admits(&subject, current, next) {
            return false;
        }

        // Claim the single overlay slot before this machine changes state.
        if current == PreviewState::Idle && next.is_showing() {
            if let Some(this) = self.this.upgrade() {
                self.registry.register(&this);
            }
        }

        self.exit_state(current, next);
        self.state.set(next);
        debug!("{subject}: {current} -> {next}");
        self.enter_state(next);
        true
    }

    fn exit_state(&self, current: PreviewState, next: PreviewState) {
        match current {
            PreviewState::Idle => {
                self.cancel_timer(&self.debounce_timer);
            }
            PreviewState::ShowingPreview | PreviewState::ShowingTitle => {
                // Preview <-> title swaps keep the poll running.
                if !next.is_showing() {
                    self.cancel_timer(&self.poll_timer);
                }
            }
            PreviewState::CleanupDelay => {
                self.cancel_timer(&self.cleanup_timer);
            }
        }
    }

    fn enter_state(&self, next: PreviewState) {
        let callbacks = self.callbacks();
        match next {
            PreviewState::Idle => {
                if let Some(callbacks) = callbacks {
                    callbacks.hide_all();
                }
                self.registry.unregister(self);
            }
            PreviewState::ShowingPreview => {
                if let Some(callbacks) = callbacks {
                    callbacks.show_preview();
                }
                self.start_poll();
            }
            PreviewState::ShowingTitle => {
                if let Some(callbacks) = callbacks {
                    callbacks.show_title();
                }
                self.start_poll();
            }
            PreviewState::CleanupDelay => self.start_cleanup(),
        }
    }

    fn cancel_timer(&self, slot: &Cell<Option<TimerHandle>>) -> bool {
        match slot.take() {
            Some(handle) => {
                self.clock.cancel(handle);
                true
            }
            None => false,
        }
    }

    fn cancel_all_timers(&self) {
        self.cancel_timer(&self.debounce_timer);
        self.cancel_timer(&self.poll_timer);
        self.cancel_timer(&self.cleanup_timer);
    }
}

impl Drop for PreviewStateMachine {
    fn drop(&mut self) {
        self.cancel_all_timers();
    }
}
