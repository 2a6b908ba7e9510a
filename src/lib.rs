pub mod hover;
pub mod icon_controller;
pub mod logging;
pub mod modifier;
pub mod preview;
pub mod settings;
pub mod settings_storage;
pub mod signal;
pub mod timer;
pub mod workspace_icons;
