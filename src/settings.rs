// Settings store with parsing helpers and runtime updates persisted to storage.
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::settings_storage::SettingsStorage;

/// Static settings metadata for defaults.
#[derive(Debug, Clone, Copy)]
pub struct SettingSpec {
    pub key: &'static str,
    pub default: &'static str,
}

pub const LOG_LEVEL_KEY: &str = "hoverpeek.log.level";

/// Every setting hoverpeek reads, with its default.
pub fn base_setting_specs() -> Vec<SettingSpec> {
    let mut specs = vec![SettingSpec {
        key: LOG_LEVEL_KEY,
        default: "info",
    }];
    specs.extend_from_slice(crate::preview::config::setting_specs());
    specs
}

#[derive(Debug)]
pub struct Settings {
    map: RwLock<HashMap<String, String>>,
    storage: SettingsStorage,
}

impl Settings {
    pub fn new(storage: SettingsStorage) -> Self {
        let map = match storage.load() {
            Ok(map) => map,
            Err(err) => {
                log::warn!("Failed to load settings storage: {err}");
                HashMap::new()
            }
        };
        Self {
            map: RwLock::new(map),
            storage,
        }
    }

    /// Settings backed by the default storage path.
    pub fn load_default() -> Self {
        Self::new(SettingsStorage::new(SettingsStorage::default_path()))
    }

    // Poisoned locks are recovered; the map only holds strings.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.map.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.map.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Parsed value for `key`. Unparseable values are logged and treated as absent.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        parse_or_warn::<T>(key, &value)
    }

    pub fn get_parsed_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get_parsed(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_parsed::<bool>(key)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    pub fn update(&self, key: &str, value: &str) {
        let mut map = self.write();
        if map.get(key).is_some_and(|current| current == value) {
            return;
        }
        map.insert(key.to_string(), value.to_string());
        let snapshot = map.clone();
        drop(map);
        self.persist(&snapshot);
    }

    pub fn ensure_defaults(&self, specs: &[SettingSpec]) {
        let mut map = self.write();
        let mut changed = false;
        for spec in specs {
            if !map.contains_key(spec.key) {
                map.insert(spec.key.to_string(), spec.default.to_string());
                changed = true;
            }
        }
        if !changed {
            return;
        }
        let snapshot = map.clone();
        drop(map);
        self.persist(&snapshot);
    }

    fn persist(&self, snapshot: &HashMap<String, String>) {
        if let Err(err) = self.storage.save(snapshot) {
            log::warn!("Failed to save settings storage: {err}");
        }
    }
}

fn parse_or_warn<T: FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            log::warn!(
                "Invalid setting '{key}': cannot parse '{value}' as {}. Using default.",
                std::any::type_name::<T>()
            );
            None
        }
    }
}
