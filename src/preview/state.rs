// Preview lifecycle states and the table of expected moves between them.
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of one icon's hover preview. `Idle` is both initial and resting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PreviewState {
    #[default]
    Idle,
    ShowingPreview,
    ShowingTitle,
    CleanupDelay,
}

impl PreviewState {
    /// Showing state selected by the modifier key.
    pub fn showing_for(modifier_pressed: bool) -> Self {
        if modifier_pressed {
            PreviewState::ShowingTitle
        } else {
            PreviewState::ShowingPreview
        }
    }

    pub fn is_showing(self) -> bool {
        matches!(
            self,
            PreviewState::ShowingPreview | PreviewState::ShowingTitle
        )
    }

    /// Whether an overlay is on screen in this state.
    pub fn is_visible(self) -> bool {
        self != PreviewState::Idle
    }

    pub fn allowed_targets(self) -> &'static [PreviewState] {
        use PreviewState::*;
        match self {
            Idle => &[ShowingPreview, ShowingTitle],
            ShowingPreview => &[ShowingTitle, CleanupDelay, Idle],
            ShowingTitle => &[ShowingPreview, CleanupDelay, Idle],
            CleanupDelay => &[ShowingPreview, ShowingTitle, Idle],
        }
    }

    pub fn can_transition_to(self, next: PreviewState) -> bool {
        self.allowed_targets().contains(&next)
    }
}

impl fmt::Display for PreviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What to do with a move that is not in the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Log a warning and perform the move anyway.
    #[default]
    Permissive,
    /// Log and refuse the move. The machine only requests table moves, so this refuses
    /// something only after the table is narrowed.
    Strict,
}

impl TransitionPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            TransitionPolicy::Strict
        } else {
            TransitionPolicy::Permissive
        }
    }

    /// Decide whether `current -> next` proceeds, logging table violations.
    pub fn admits(self, subject: &str, current: PreviewState, next: PreviewState) -> bool {
        if current.can_transition_to(next) {
            return true;
        }
        match self {
            TransitionPolicy::Permissive => {
                log::warn!("{subject}: unexpected transition {current} -> {next}, performing it");
                true
            }
            TransitionPolicy::Strict => {
                log::warn!("{subject}: rejected transition {current} -> {next}");
                false
            }
        }
    }
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(TransitionPolicy::Permissive),
            "strict" => Ok(TransitionPolicy::Strict),
            other => Err(format!(
                "Invalid transition policy '{other}', expected 'permissive' or 'strict'"
            )),
        }
    }
}
