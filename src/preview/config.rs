// Timing and policy knobs for the preview lifecycle, loaded from settings.
// Consumes Settings: hoverpeek.preview.*.
use std::time::Duration;

use crate::modifier::ModifierKey;
use crate::preview::state::TransitionPolicy;
use crate::settings::{SettingSpec, Settings};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_millis(200);

const SETTINGS: &[SettingSpec] = &[
    SettingSpec {
        key: "hoverpeek.preview.debounce_ms",
        default: "30",
    },
    SettingSpec {
        key: "hoverpeek.preview.poll_interval_ms",
        default: "200",
    },
    SettingSpec {
        key: "hoverpeek.preview.cleanup_delay_ms",
        default: "200",
    },
    SettingSpec {
        key: "hoverpeek.preview.strict_transitions",
        default: "false",
    },
    SettingSpec {
        key: "hoverpeek.preview.modifier",
        default: "control",
    },
];

pub fn setting_specs() -> &'static [SettingSpec] {
    SETTINGS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewConfig {
    /// Quiet period between icon hover-enter and showing an overlay.
    pub debounce: Duration,
    /// Modifier-key sampling interval while an overlay is showing.
    pub poll_interval: Duration,
    /// Grace period after hover is lost before overlays are torn down.
    pub cleanup_delay: Duration,
    pub policy: TransitionPolicy,
    /// Modifier that selects the title overlay instead of the live preview.
    pub modifier: ModifierKey,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cleanup_delay: DEFAULT_CLEANUP_DELAY,
            policy: TransitionPolicy::Permissive,
            modifier: ModifierKey::Control,
        }
    }
}

impl PreviewConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let debounce_ms = settings.get_parsed_or("hoverpeek.preview.debounce_ms", 30u64);
        let poll_interval_ms = settings
            .get_parsed_or("hoverpeek.preview.poll_interval_ms", 200u64)
            .max(1);
        let cleanup_delay_ms = settings.get_parsed_or("hoverpeek.preview.cleanup_delay_ms", 200u64);
        let strict = settings.get_bool_or("hoverpeek.preview.strict_transitions", false);
        let modifier = settings.get_parsed_or("hoverpeek.preview.modifier", ModifierKey::Control);

        Self {
            debounce: Duration::from_millis(debounce_ms),
            poll_interval: Duration::from_millis(poll_interval_ms),
            cleanup_delay: Duration::from_millis(cleanup_delay_ms),
            policy: TransitionPolicy::from_strict(strict),
            modifier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::state::PreviewState;
    use crate::preview::state_machine::tests::Recorder;
    use crate::preview::{PreviewRegistry, PreviewServices, PreviewStateMachine};
    use crate::settings_storage::SettingsStorage;
    use crate::timer::{FakeClock, TimerQueue};
    use iced_core::keyboard::Modifiers;
    use std::collections::HashMap;
    use std::fs;
    use std::rc::Rc;
    use std::time::Instant;

    fn settings_with(name: &str, entries: &[(&str, &str)]) -> Settings {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "hoverpeek_config_test_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&path);
        path.push("Settings.xresources");
        let storage = SettingsStorage::new(path);
        let map: HashMap<String, String> = entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        storage.save(&map).expect("save settings storage");
        Settings::new(storage)
    }

    #[test]
    fn defaults_match_setting_specs() {
        let settings = settings_with("defaults", &[]);
        settings.ensure_defaults(setting_specs());
        assert_eq!(PreviewConfig::from_settings(&settings), PreviewConfig::default());
    }

    #[test]
    fn reads_overridden_values() {
        let settings = settings_with(
            "overrides",
            &[
                ("hoverpeek.preview.debounce_ms", "50"),
                ("hoverpeek.preview.poll_interval_ms", "100"),
                ("hoverpeek.preview.cleanup_delay_ms", "400"),
                ("hoverpeek.preview.strict_transitions", "true"),
                ("hoverpeek.preview.modifier", "shift"),
            ],
        );
        let config = PreviewConfig::from_settings(&settings);

        assert_eq!(config.debounce, Duration::from_millis(50));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.cleanup_delay, Duration::from_millis(400));
        assert_eq!(config.policy, TransitionPolicy::Strict);
        assert_eq!(config.modifier, ModifierKey::Shift);
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let settings = settings_with("clamp", &[("hoverpeek.preview.poll_interval_ms", "0")]);
        let config = PreviewConfig::from_settings(&settings);
        assert_eq!(config.poll_interval, Duration::from_millis(1));
    }

    fn state_after_hover(settings: &Settings, snapshot: Modifiers) -> PreviewState {
        let timers = TimerQueue::new(FakeClock::new(Instant::now()));
        let (services, tracked) = PreviewServices::from_settings(
            settings,
            Rc::new(timers.clone()),
            Rc::new(PreviewRegistry::new()),
        );
        tracked.update(snapshot);
        let machine =
            PreviewStateMachine::new("config", &services, Rc::new(Recorder::default()));

        machine.on_icon_hover_enter();
        timers.run_for(services.config.debounce);
        machine.state()
    }

    #[test]
    fn configured_modifier_selects_title_overlay() {
        let settings = settings_with("modifier_shift", &[("hoverpeek.preview.modifier", "shift")]);

        assert_eq!(
            state_after_hover(&settings, Modifiers::SHIFT),
            PreviewState::ShowingTitle
        );
        assert_eq!(
            state_after_hover(&settings, Modifiers::CTRL),
            PreviewState::ShowingPreview
        );
    }

    #[test]
    fn default_modifier_is_control() {
        let settings = settings_with("modifier_default", &[]);

        assert_eq!(
            state_after_hover(&settings, Modifiers::CTRL),
            PreviewState::ShowingTitle
        );
        assert_eq!(
            state_after_hover(&settings, Modifiers::SHIFT),
            PreviewState::ShowingPreview
        );
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let settings = settings_with(
            "invalid",
            &[
                ("hoverpeek.preview.debounce_ms", "soon"),
                ("hoverpeek.preview.modifier", "hyper"),
            ],
        );
        let config = PreviewConfig::from_settings(&settings);
        assert_eq!(config.debounce, DEFAULT_DEBOUNCE);
        assert_eq!(config.modifier, ModifierKey::Control);
    }
}
