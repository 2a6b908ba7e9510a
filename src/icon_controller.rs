// Headless icon controller: owns one window icon's overlays and feeds its preview machine.
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{debug, warn};

use crate::hover::{HoverAggregator, HoverSurface};
use crate::preview::{
    ForceIdleReason, PreviewCallbacks, PreviewServices, PreviewState, PreviewStateMachine,
};
use crate::signal::{Connection, Signal};
use crate::timer::{ClockSource, Repeat, TimerHandle};

/// Identity of the window an icon stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub con_id: i64,
    pub app_id: String,
}

impl WindowKey {
    pub fn new(con_id: i64, app_id: impl Into<String>) -> Self {
        Self {
            con_id,
            app_id: app_id.into(),
        }
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.app_id, self.con_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    Preview,
    Title,
}

impl OverlayKind {
    fn surface(self) -> HoverSurface {
        match self {
            OverlayKind::Preview => HoverSurface::Preview,
            OverlayKind::Title => HoverSurface::Title,
        }
    }

    fn other(self) -> Self {
        match self {
            OverlayKind::Preview => OverlayKind::Title,
            OverlayKind::Title => OverlayKind::Preview,
        }
    }
}

/// A materialized overlay. The host reports pointer hover through `hover_signal` and marks the
/// overlay torn down when it goes away on its own.
pub struct Overlay {
    kind: OverlayKind,
    hover: Signal<bool>,
    alive: Cell<bool>,
}

impl Overlay {
    pub fn new(kind: OverlayKind) -> Self {
        Self {
            kind,
            hover: Signal::new(),
            alive: Cell::new(true),
        }
    }

    pub fn kind(&self) -> OverlayKind {
        self.kind
    }

    pub fn hover_signal(&self) -> &Signal<bool> {
        &self.hover
    }

    pub fn set_hovered(&self, hovered: bool) {
        self.hover.emit(hovered);
    }

    pub fn mark_torn_down(&self) {
        self.alive.set(false);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }
}

/// Rendering boundary: creates and destroys overlay surfaces.
pub trait OverlayHost {
    /// `None` when the overlay cannot be built (window gone, no thumbnail).
    fn open_overlay(&self, window: &WindowKey, kind: OverlayKind) -> Option<Rc<Overlay>>;
    /// Must tolerate overlays the host already tore down.
    fn close_overlay(&self, window: &WindowKey, overlay: &Overlay);
}

/// Everything a controller needs from the session.
#[derive(Clone)]
pub struct IconContext {
    pub services: PreviewServices,
    pub host: Rc<dyn OverlayHost>,
}

struct OverlaySlot {
    overlay: Rc<Overlay>,
    connection: Connection,
}

struct IconOverlays {
    window: WindowKey,
    host: Rc<dyn OverlayHost>,
    clock: Rc<dyn ClockSource>,
    hover: Cell<HoverAggregator>,
    // Overlay leave owed to the machine after a hovered overlay was swapped out.
    pending_leave: Cell<Option<TimerHandle>>,
    preview: RefCell<Option<OverlaySlot>>,
    title: RefCell<Option<OverlaySlot>>,
    machine: RefCell<Weak<PreviewStateMachine>>,
    this: Weak<IconOverlays>,
}

impl IconOverlays {
    fn slot(&self, kind: OverlayKind) -> &RefCell<Option<OverlaySlot>> {
        match kind {
            OverlayKind::Preview => &self.preview,
            OverlayKind::Title => &self.title,
        }
    }

    fn machine(&self) -> Option<Rc<PreviewStateMachine>> {
        self.machine.borrow().upgrade()
    }

    fn has_live(&self, kind: OverlayKind) -> bool {
        self.slot(kind)
            .borrow()
            .as_ref()
            .is_some_and(|slot| slot.overlay.is_alive())
    }

    fn set_hover(&self, surface: HoverSurface, hovered: bool) {
        self.hover.set(self.hover.get().with(surface, hovered));
    }

    fn open(&self, kind: OverlayKind) {
        if self.has_live(kind) {
            return;
        }
        if self.close(kind.other()) {
            self.schedule_overlay_leave();
        }
        self.close(kind);

        let Some(overlay) = self.host.open_overlay(&self.window, kind) else {
            warn!("icon {}: host could not open {kind:?} overlay", self.window);
            return;
        };
        let overlays = self.this.clone();
        let connection = overlay.hover_signal().connect(move |hovered| {
            if let Some(overlays) = overlays.upgrade() {
                overlays.overlay_hover_changed(kind, hovered);
            }
        });
        *self.slot(kind).borrow_mut() = Some(OverlaySlot {
            overlay,
            connection,
        });
    }

    /// Close the overlay of `kind`. Returns whether the pointer was on it.
    fn close(&self, kind: OverlayKind) -> bool {
        let Some(OverlaySlot {
            overlay,
            connection,
        }) = self.slot(kind).borrow_mut().take()
        else {
            return false;
        };
        connection.disconnect();
        let hover = self.hover.get();
        let was_hovered = match kind {
            OverlayKind::Preview => hover.preview,
            OverlayKind::Title => hover.title,
        };
        self.set_hover(kind.surface(), false);
        self.host.close_overlay(&self.window, &overlay);
        was_hovered
    }

    // The swap is still running inside the machine's transition, so the leave is delivered
    // from the event loop once it has finished.
    fn schedule_overlay_leave(&self) {
        if self.pending_leave.get().is_some() {
            return;
        }
        let overlays = self.this.clone();
        let handle = self.clock.schedule(
            Duration::ZERO,
            Repeat::Once,
            Box::new(move || {
                if let Some(overlays) = overlays.upgrade() {
                    overlays.deliver_overlay_leave();
                }
            }),
        );
        self.pending_leave.set(Some(handle));
    }

    fn deliver_overlay_leave(&self) {
        self.pending_leave.set(None);
        let hover = self.hover.get();
        if hover.preview || hover.title {
            return;
        }
        if let Some(machine) = self.machine() {
            debug!("icon {}: hovered overlay was swapped out", self.window);
            machine.on_overlay_hover_leave(hover.icon_hovered());
        }
    }

    fn cancel_overlay_leave(&self) {
        if let Some(handle) = self.pending_leave.take() {
            self.clock.cancel(handle);
        }
    }

    fn overlay_hover_changed(&self, kind: OverlayKind, hovered: bool) {
        self.set_hover(kind.surface(), hovered);
        let Some(machine) = self.machine() else {
            return;
        };
        if hovered {
            machine.on_overlay_hover_enter();
        } else {
            machine.on_overlay_hover_leave(self.hover.get().icon_hovered());
        }
    }
}

impl PreviewCallbacks for IconOverlays {
    fn show_preview(&self) {
        self.open(OverlayKind::Preview);
    }

    fn show_title(&self) {
        self.open(OverlayKind::Title);
    }

    fn hide_all(&self) {
        self.cancel_overlay_leave();
        self.close(OverlayKind::Preview);
        self.close(OverlayKind::Title);
        self.hover.set(self.hover.get().without_overlays());
    }

    fn has_preview_content(&self) -> bool {
        self.has_live(OverlayKind::Preview)
    }

    fn has_title_content(&self) -> bool {
        self.has_live(OverlayKind::Title)
    }

    fn should_abort_cleanup(&self) -> bool {
        self.hover.get().any_hovered()
    }

    fn on_forced_idle(&self, reason: ForceIdleReason) {
        debug!("icon {}: preview dismissed ({reason})", self.window);
    }
}

/// One window icon. Dropping the controller destroys its preview machine.
pub struct IconController {
    overlays: Rc<IconOverlays>,
    machine: Rc<PreviewStateMachine>,
}

impl IconController {
    pub fn new(window: WindowKey, context: &IconContext) -> Self {
        let label = window.to_string();
        let overlays = Rc::new_cyclic(|this| IconOverlays {
            window,
            host: Rc::clone(&context.host),
            clock: Rc::clone(&context.services.clock),
            hover: Cell::new(HoverAggregator::default()),
            pending_leave: Cell::new(None),
            preview: RefCell::new(None),
            title: RefCell::new(None),
            machine: RefCell::new(Weak::new()),
            this: this.clone(),
        });
        let machine = PreviewStateMachine::new(label, &context.services, overlays.clone());
        *overlays.machine.borrow_mut() = Rc::downgrade(&machine);
        Self { overlays, machine }
    }

    pub fn window(&self) -> &WindowKey {
        &self.overlays.window
    }

    pub fn state(&self) -> PreviewState {
        self.machine.state()
    }

    pub fn machine(&self) -> &Rc<PreviewStateMachine> {
        &self.machine
    }

    pub fn icon_hover_changed(&self, hovered: bool) {
        self.overlays.set_hover(HoverSurface::Icon, hovered);
        if hovered {
            self.machine.on_icon_hover_enter();
        } else {
            self.machine.on_icon_hover_leave();
        }
    }

    /// The icon was pressed; the host focuses the window separately.
    pub fn clicked(&self) {
        self.machine.force_idle(ForceIdleReason::Click);
    }

    pub fn workspace_changed(&self) {
        self.machine.force_idle(ForceIdleReason::WorkspaceChanged);
    }

    pub fn destroy(&self) {
        self.machine.destroy();
        self.overlays.hide_all();
    }
}

impl Drop for IconController {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::preview::state_machine::tests::Fixture;

    #[derive(Default)]
    pub(crate) struct FakeHost {
        pub opened: RefCell<Vec<(i64, OverlayKind)>>,
        pub closed: RefCell<Vec<(i64, OverlayKind)>>,
        pub overlays: RefCell<Vec<Rc<Overlay>>>,
        pub refuse: Cell<bool>,
    }

    impl FakeHost {
        /// Most recently opened overlay of `kind` that is still on screen.
        pub fn live(&self, kind: OverlayKind) -> Option<Rc<Overlay>> {
            self.overlays
                .borrow()
                .iter()
                .rev()
                .find(|overlay| overlay.kind() == kind && overlay.is_alive())
                .cloned()
        }

        pub fn live_count(&self) -> usize {
            self.overlays
                .borrow()
                .iter()
                .filter(|overlay| overlay.is_alive())
                .count()
        }
    }

    impl OverlayHost for FakeHost {
        fn open_overlay(&self, window: &WindowKey, kind: OverlayKind) -> Option<Rc<Overlay>> {
            if self.refuse.get() {
                return None;
            }
            let overlay = Rc::new(Overlay::new(kind));
            self.opened.borrow_mut().push((window.con_id, kind));
            self.overlays.borrow_mut().push(Rc::clone(&overlay));
            Some(overlay)
        }

        fn close_overlay(&self, window: &WindowKey, overlay: &Overlay) {
            self.closed.borrow_mut().push((window.con_id, overlay.kind()));
            overlay.mark_torn_down();
        }
    }

    pub(crate) fn context(fixture: &Fixture) -> (IconContext, Rc<FakeHost>) {
        let host = Rc::new(FakeHost::default());
        let context = IconContext {
            services: fixture.services(),
            host: host.clone(),
        };
        (context, host)
    }

    fn hover_and_show(fixture: &Fixture, icon: &IconController) {
        icon.icon_hover_changed(true);
        fixture.timers.run_for_ms(30);
    }

    #[test]
    fn hovering_icon_opens_preview_after_debounce() {
        let fixture = Fixture::new();
        let (context, host) = context(&fixture);
        let icon = IconController::new(WindowKey::new(1, "foot"), &context);

        icon.icon_hover_changed(true);
        fixture.timers.run_for_ms(29);
        assert!(host.opened.borrow().is_empty());

        fixture.timers.run_for_ms(1);
        assert_eq!(*host.opened.borrow(), vec![(1, OverlayKind::Preview)]);
        assert_eq!(icon.state(), PreviewState::ShowingPreview);
    }

    #[test]
    fn modifier_swap_replaces_overlay_and_releases_connection() {
        let fixture = Fixture::new();
        let (context, host) = context(&fixture);
        let icon = IconController::new(WindowKey::new(1, "foot"), &context);
        hover_and_show(&fixture, &icon);
        let preview = host.live(OverlayKind::Preview).expect("preview overlay");
        assert_eq!(preview.hover_signal().connection_count(), 1);

        fixture.modifier.set(true);
        fixture.timers.run_for_ms(200);

        assert_eq!(icon.state(), PreviewState::ShowingTitle);
        assert_eq!(
            *host.opened.borrow(),
            vec![(1, OverlayKind::Preview), (1, OverlayKind::Title)]
        );
        assert_eq!(*host.closed.borrow(), vec![(1, OverlayKind::Preview)]);
        assert_eq!(preview.hover_signal().connection_count(), 0);
        assert_eq!(host.live_count(), 1);
    }

    #[test]
    fn swap_while_overlay_hovered_still_cleans_up() {
        let fixture = Fixture::new();
        let (context, host) = context(&fixture);
        let icon = IconController::new(WindowKey::new(1, "foot"), &context);
        hover_and_show(&fixture, &icon);
        let preview = host.live(OverlayKind::Preview).expect("preview overlay");
        icon.icon_hover_changed(false);
        preview.set_hovered(true);
        assert_eq!(icon.state(), PreviewState::ShowingPreview);

        fixture.modifier.set(true);
        fixture.timers.run_for_ms(200);
        assert_eq!(icon.state(), PreviewState::CleanupDelay);
        assert!(host.live(OverlayKind::Title).is_some());

        fixture.timers.run_for_ms(10_000);
        assert_eq!(icon.state(), PreviewState::Idle);
        assert_eq!(host.live_count(), 0);
        assert_eq!(fixture.timers.pending(), 0);
    }

    #[test]
    fn swap_under_pointer_then_hovering_new_overlay_keeps_it() {
        let fixture = Fixture::new();
        let (context, host) = context(&fixture);
        let icon = IconController::new(WindowKey::new(1, "foot"), &context);
        hover_and_show(&fixture, &icon);
        let preview = host.live(OverlayKind::Preview).expect("preview overlay");
        icon.icon_hover_changed(false);
        preview.set_hovered(true);
        fixture.modifier.set(true);
        fixture.timers.run_for_ms(200);

        let title = host.live(OverlayKind::Title).expect("title overlay");
        title.set_hovered(true);
        assert_eq!(icon.state(), PreviewState::ShowingTitle);

        fixture.timers.run_for_ms(10_000);
        assert_eq!(icon.state(), PreviewState::ShowingTitle);
        assert_eq!(host.live_count(), 1);
    }

    #[test]
    fn moving_pointer_onto_overlay_keeps_it_open() {
        let fixture = Fixture::new();
        let (context, host) = context(&fixture);
        let icon = IconController::new(WindowKey::new(1, "foot"), &context);
        hover_and_show(&fixture, &icon);
        let preview = host.live(OverlayKind::Preview).expect("preview overlay");

        icon.icon_hover_changed(false);
        assert_eq!(icon.state(), PreviewState::CleanupDelay);
        preview.set_hovered(true);
        assert_eq!(icon.state(), PreviewState::ShowingPreview);

        fixture.timers.run_for_ms(500);
        assert_eq!(icon.state(), PreviewState::ShowingPreview);
        assert_eq!(host.opened.borrow().len(), 1);
        assert!(host.closed.borrow().is_empty());
    }

    #[test]
    fn leaving_overlay_tears_down_after_cleanup_delay() {
        let fixture = Fixture::new();
        let (context, host) = context(&fixture);
        let icon = IconController::new(WindowKey::new(1, "foot"), &context);
        hover_and_show(&fixture, &icon);
        let preview = host.live(OverlayKind::Preview).expect("preview overlay");
        icon.icon_hover_changed(false);
        preview.set_hovered(true);

        preview.set_hovered(false);
        assert_eq!(icon.state(), PreviewState::CleanupDelay);
        fixture.timers.run_for_ms(199);
        assert_eq!(icon.state(), PreviewState::CleanupDelay);
        fixture.timers.run_for_ms(1);

        assert_eq!(icon.state(), PreviewState::Idle);
        assert_eq!(*host.closed.borrow(), vec![(1, OverlayKind::Preview)]);
        assert_eq!(fixture.timers.pending(), 0);
    }

    #[test]
    fn overlay_leave_back_onto_icon_keeps_showing() {
        let fixture = Fixture::new();
        let (context, host) = context(&fixture);
        let icon = IconController::new(WindowKey::new(1, "foot"), &context);
        hover_and_show(&fixture, &icon);
        let preview = host.live(OverlayKind::Preview).expect("preview overlay");

        preview.set_hovered(true);
        preview.set_hovered(false);
        assert_eq!(icon.state(), PreviewState::ShowingPreview);
    }

    #[test]
    fn click_dismisses_overlay() {
        let fixture = Fixture::new();
        let (context, host) = context(&fixture);
        let icon = IconController::new(WindowKey::new(1, "foot"), &context);
        hover_and_show(&fixture, &icon);

        icon.clicked();
        assert_eq!(icon.state(), PreviewState::Idle);
        assert_eq!(host.live_count(), 0);
        assert_eq!(fixture.timers.pending(), 0);
        assert!(fixture.registry.active().is_none());
    }

    #[test]
    fn overlay_torn_down_by_host_is_noticed_by_poll() {
        let fixture = Fixture::new();
        let (context, host) = context(&fixture);
        let icon = IconController::new(WindowKey::new(1, "foot"), &context);
        hover_and_show(&fixture, &icon);

        host.live(OverlayKind::Preview)
            .expect("preview overlay")
            .mark_torn_down();
        fixture.timers.run_for_ms(200);

        assert_eq!(icon.state(), PreviewState::Idle);
        assert_eq!(fixture.timers.pending(), 0);
    }

    #[test]
    fn refused_overlay_returns_to_idle_on_next_poll() {
        let fixture = Fixture::new();
        let (context, host) = context(&fixture);
        let icon = IconController::new(WindowKey::new(1, "foot"), &context);
        host.refuse.set(true);

        hover_and_show(&fixture, &icon);
        assert_eq!(icon.state(), PreviewState::ShowingPreview);
        fixture.timers.run_for_ms(200);
        assert_eq!(icon.state(), PreviewState::Idle);
    }

    #[test]
    fn hovering_second_icon_closes_first_overlay() {
        let fixture = Fixture::new();
        let (context, host) = context(&fixture);
        let first = IconController::new(WindowKey::new(1, "foot"), &context);
        let second = IconController::new(WindowKey::new(2, "firefox"), &context);

        hover_and_show(&fixture, &first);
        first.icon_hover_changed(false);
        hover_and_show(&fixture, &second);

        assert_eq!(first.state(), PreviewState::Idle);
        assert_eq!(second.state(), PreviewState::ShowingPreview);
        assert_eq!(*host.closed.borrow(), vec![(1, OverlayKind::Preview)]);
        assert_eq!(host.live_count(), 1);
    }

    #[test]
    fn dropping_controller_closes_overlay_and_frees_registry() {
        let fixture = Fixture::new();
        let (context, host) = context(&fixture);
        let icon = IconController::new(WindowKey::new(1, "foot"), &context);
        hover_and_show(&fixture, &icon);
        let machine = Rc::downgrade(icon.machine());

        drop(icon);
        assert_eq!(*host.closed.borrow(), vec![(1, OverlayKind::Preview)]);
        assert!(fixture.registry.active().is_none());
        assert_eq!(fixture.timers.pending(), 0);
        assert!(machine.upgrade().is_none());
    }

    #[test]
    fn window_key_display_names_app_and_container() {
        assert_eq!(WindowKey::new(42, "foot").to_string(), "foot#42");
    }
}
