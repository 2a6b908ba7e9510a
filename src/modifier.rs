// Modifier-key sampling: there is no change event, only a synchronous query.
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use iced_core::keyboard::Modifiers;

use crate::preview::config::PreviewConfig;

/// Synchronous query for the modifier that selects the title overlay.
pub trait ModifierKeySource {
    fn is_modifier_pressed(&self) -> bool;
}

impl<F> ModifierKeySource for F
where
    F: Fn() -> bool,
{
    fn is_modifier_pressed(&self) -> bool {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModifierKey {
    #[default]
    Control,
    Shift,
    Alt,
    Super,
}

impl ModifierKey {
    pub fn is_held(self, modifiers: Modifiers) -> bool {
        match self {
            ModifierKey::Control => modifiers.control(),
            ModifierKey::Shift => modifiers.shift(),
            ModifierKey::Alt => modifiers.alt(),
            ModifierKey::Super => modifiers.logo(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModifierKey::Control => "control",
            ModifierKey::Shift => "shift",
            ModifierKey::Alt => "alt",
            ModifierKey::Super => "super",
        }
    }
}

impl fmt::Display for ModifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModifierKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "control" | "ctrl" => Ok(ModifierKey::Control),
            "shift" => Ok(ModifierKey::Shift),
            "alt" => Ok(ModifierKey::Alt),
            "super" | "logo" => Ok(ModifierKey::Super),
            other => Err(format!(
                "Invalid modifier '{other}', expected control, shift, alt or super"
            )),
        }
    }
}

/// Latest modifier snapshot pushed by the host's keyboard event stream.
#[derive(Debug)]
pub struct TrackedModifiers {
    key: ModifierKey,
    current: Cell<Modifiers>,
}

impl TrackedModifiers {
    pub fn new(key: ModifierKey) -> Self {
        Self {
            key,
            current: Cell::new(Modifiers::empty()),
        }
    }

    /// Tracker for the key selected by `hoverpeek.preview.modifier`.
    pub fn from_config(config: &PreviewConfig) -> Self {
        Self::new(config.modifier)
    }

    pub fn key(&self) -> ModifierKey {
        self.key
    }

    pub fn update(&self, modifiers: Modifiers) {
        self.current.set(modifiers);
    }
}

impl ModifierKeySource for TrackedModifiers {
    fn is_modifier_pressed(&self) -> bool {
        self.key.is_held(self.current.get())
    }
}

/// Remembers the last sampled value so polls only report edges.
pub struct ModifierKeyPoller {
    source: Rc<dyn ModifierKeySource>,
    last: Cell<bool>,
}

impl ModifierKeyPoller {
    pub fn new(source: Rc<dyn ModifierKeySource>) -> Self {
        Self {
            source,
            last: Cell::new(false),
        }
    }

    /// Sample and adopt the value as the new baseline.
    pub fn query(&self) -> bool {
        let pressed = self.source.is_modifier_pressed();
        self.last.set(pressed);
        pressed
    }

    /// Sample and return the new value only when it differs from the baseline.
    pub fn sample_edge(&self) -> Option<bool> {
        let pressed = self.source.is_modifier_pressed();
        if pressed == self.last.get() {
            return None;
        }
        self.last.set(pressed);
        Some(pressed)
    }

    pub fn last_known(&self) -> bool {
        self.last.get()
    }
}
