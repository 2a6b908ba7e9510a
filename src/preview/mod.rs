// Hover-preview lifecycle core: per-icon state machine and the single-active registry.
pub mod callbacks;
pub mod config;
pub mod registry;
pub mod state;
pub mod state_machine;

pub use callbacks::{ForceIdleReason, PreviewCallbacks};
pub use config::PreviewConfig;
pub use registry::PreviewRegistry;
pub use state::{PreviewState, TransitionPolicy};
pub use state_machine::{PreviewServices, PreviewStateMachine};
