// Callback table through which a state machine drives its owner's overlays.
use std::fmt;

/// Why a machine was forced back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForceIdleReason {
    /// The icon was clicked.
    Click,
    /// The active workspace changed.
    WorkspaceChanged,
    /// Another icon claimed the single overlay slot.
    PreviewElsewhere,
    /// A poll found the overlay torn down behind the machine's back.
    ContentLost,
    /// The icon is being destroyed.
    Destroyed,
}

impl fmt::Display for ForceIdleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ForceIdleReason::Click => "click",
            ForceIdleReason::WorkspaceChanged => "workspace changed",
            ForceIdleReason::PreviewElsewhere => "preview shown elsewhere",
            ForceIdleReason::ContentLost => "overlay content lost",
            ForceIdleReason::Destroyed => "destroyed",
        };
        f.write_str(text)
    }
}

/// Implemented by the icon controller that owns the overlay widgets.
///
/// Calls arrive on the event loop with no machine state borrowed, so implementations may call
/// back into the machine.
pub trait PreviewCallbacks {
    /// Materialize the live preview, replacing a title overlay if one is up.
    fn show_preview(&self);
    /// Materialize the title label, replacing a preview overlay if one is up.
    fn show_title(&self);
    fn hide_all(&self);
    fn has_preview_content(&self) -> bool;
    fn has_title_content(&self) -> bool;
    /// True while the icon or either overlay is hovered.
    fn should_abort_cleanup(&self) -> bool;
    fn on_forced_idle(&self, reason: ForceIdleReason);
}
