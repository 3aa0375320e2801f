use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::hotkey::Hotkey;
use crate::surface::MAX_OPACITY;

const SELECTION_DELIMITER: char = '|';
const DEFAULT_OPACITY: u8 = 100;

/// On-disk settings, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `|`-separated stable monitor keys. Empty means default policy.
    pub selected_monitors: String,
    pub opacity: i32,
    pub click_through: bool,
    pub hotkey_toggle: String,
    pub game_mode_auto_blackout: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            selected_monitors: String::new(),
            opacity: i32::from(DEFAULT_OPACITY),
            click_through: false,
            hotkey_toggle: Hotkey::default().to_string(),
            game_mode_auto_blackout: false,
        }
    }
}

/// Which monitors to occlude and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlackoutConfiguration {
    /// `None` selects the default policy: every non-primary monitor.
    pub selected_monitor_keys: Option<BTreeSet<String>>,
    pub opacity_percent: u8,
    pub click_through: bool,
}

impl Default for BlackoutConfiguration {
    fn default() -> Self {
        Self {
            selected_monitor_keys: None,
            opacity_percent: DEFAULT_OPACITY,
            click_through: false,
        }
    }
}

impl BlackoutConfiguration {
    pub fn load(settings: &dyn SettingsStore) -> Self {
        Self {
            selected_monitor_keys: settings.load_selection(),
            opacity_percent: settings.load_opacity(),
            click_through: settings.load_click_through(),
        }
    }
}

/// Persistence collaborator for the controller.
///
/// Reads never fail: missing or malformed data yields the default.
pub trait SettingsStore {
    fn load_selection(&self) -> Option<BTreeSet<String>>;
    fn save_selection(&self, keys: Option<&BTreeSet<String>>);
    fn load_opacity(&self) -> u8;
    fn save_opacity(&self, percent: u8);
    fn load_click_through(&self) -> bool;
    fn save_click_through(&self, click_through: bool);
    fn load_game_mode_auto(&self) -> bool;
    fn save_game_mode_auto(&self, enabled: bool);
    fn reset(&self);
}

pub fn parse_selection(raw: &str) -> Option<BTreeSet<String>> {
    let keys: BTreeSet<String> = raw
        .split(SELECTION_DELIMITER)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect();
    (!keys.is_empty()).then_some(keys)
}

pub fn format_selection(keys: Option<&BTreeSet<String>>) -> String {
    keys.map(|keys| {
        keys.iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(&SELECTION_DELIMITER.to_string())
    })
    .unwrap_or_default()
}

pub fn config_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("DisplayBlackout").join("config.json")
}

/// JSON file backed [`SettingsStore`].
pub struct JsonSettings {
    path: PathBuf,
}

impl JsonSettings {
    pub fn open_default() -> Self {
        Self::at(config_path())
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> AppConfig {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) => {
                debug!("no settings at {}: {e}", self.path.display());
                return AppConfig::default();
            }
        };
        serde_json::from_str(&data).unwrap_or_else(|e| {
            warn!("ignoring malformed settings in {}: {e}", self.path.display());
            AppConfig::default()
        })
    }

    pub fn save(&self, config: &AppConfig) {
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let data = match serde_json::to_string_pretty(config) {
            Ok(data) => data,
            Err(e) => {
                warn!("could not serialize settings: {e}");
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, data) {
            warn!("could not write settings to {}: {e}", self.path.display());
        }
    }

    fn update(&self, f: impl FnOnce(&mut AppConfig)) {
        let mut config = self.load();
        f(&mut config);
        self.save(&config);
    }

    /// Toggle binding, falling back to the default when the stored text
    /// does not parse.
    pub fn load_hotkey(&self) -> Hotkey {
        let raw = self.load().hotkey_toggle;
        raw.parse().unwrap_or_else(|e| {
            warn!("{e}; using {}", Hotkey::default());
            Hotkey::default()
        })
    }
}

impl SettingsStore for JsonSettings {
    fn load_selection(&self) -> Option<BTreeSet<String>> {
        parse_selection(&self.load().selected_monitors)
    }

    fn save_selection(&self, keys: Option<&BTreeSet<String>>) {
        self.update(|c| c.selected_monitors = format_selection(keys));
    }

    fn load_opacity(&self) -> u8 {
        let raw = self.load().opacity;
        match u8::try_from(raw) {
            Ok(percent) if percent <= MAX_OPACITY => percent,
            _ => {
                warn!("stored opacity {raw} out of range, using {DEFAULT_OPACITY}");
                DEFAULT_OPACITY
            }
        }
    }

    fn save_opacity(&self, percent: u8) {
        self.update(|c| c.opacity = i32::from(percent.min(MAX_OPACITY)));
    }

    fn load_click_through(&self) -> bool {
        self.load().click_through
    }

    fn save_click_through(&self, click_through: bool) {
        self.update(|c| c.click_through = click_through);
    }

    fn load_game_mode_auto(&self) -> bool {
        self.load().game_mode_auto_blackout
    }

    fn save_game_mode_auto(&self, enabled: bool) {
        self.update(|c| c.game_mode_auto_blackout = enabled);
    }

    fn reset(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("removed {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not reset settings at {}: {e}", self.path.display()),
        }
    }
}

/// Settings kept in memory; nothing touches disk.
#[derive(Debug, Default)]
pub struct MemorySettings {
    config: RefCell<AppConfig>,
}

impl MemorySettings {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: RefCell::new(config),
        }
    }

    pub fn snapshot(&self) -> AppConfig {
        self.config.borrow().clone()
    }
}

impl SettingsStore for MemorySettings {
    fn load_selection(&self) -> Option<BTreeSet<String>> {
        parse_selection(&self.config.borrow().selected_monitors)
    }

    fn save_selection(&self, keys: Option<&BTreeSet<String>>) {
        self.config.borrow_mut().selected_monitors = format_selection(keys);
    }

    fn load_opacity(&self) -> u8 {
        u8::try_from(self.config.borrow().opacity)
            .ok()
            .filter(|p| *p <= MAX_OPACITY)
            .unwrap_or(DEFAULT_OPACITY)
    }

    fn save_opacity(&self, percent: u8) {
        self.config.borrow_mut().opacity = i32::from(percent.min(MAX_OPACITY));
    }

    fn load_click_through(&self) -> bool {
        self.config.borrow().click_through
    }

    fn save_click_through(&self, click_through: bool) {
        self.config.borrow_mut().click_through = click_through;
    }

    fn load_game_mode_auto(&self) -> bool {
        self.config.borrow().game_mode_auto_blackout
    }

    fn save_game_mode_auto(&self, enabled: bool) {
        self.config.borrow_mut().game_mode_auto_blackout = enabled;
    }

    fn reset(&self) {
        *self.config.borrow_mut() = AppConfig::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> JsonSettings {
        let dir = std::env::temp_dir().join(format!(
            "display-blackout-test-{}-{name}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        JsonSettings::at(dir.join("config.json"))
    }

    fn keys(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = scratch("missing");
        assert_eq!(settings.load(), AppConfig::default());
        assert_eq!(settings.load_opacity(), 100);
        assert_eq!(settings.load_selection(), None);
        assert!(!settings.load_click_through());
    }

    #[test]
    fn selection_round_trips_through_file() {
        let settings = scratch("selection");
        let selected = keys(&["0,0,1920,1080", "1920,0,2560,1440"]);
        settings.save_selection(Some(&selected));
        assert_eq!(settings.load_selection(), Some(selected));

        settings.save_selection(None);
        assert_eq!(settings.load_selection(), None);
        assert_eq!(settings.load().selected_monitors, "");
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let settings = scratch("malformed");
        fs::create_dir_all(settings.path().parent().unwrap()).unwrap();
        fs::write(settings.path(), "{ not json").unwrap();
        assert_eq!(settings.load(), AppConfig::default());
        assert_eq!(settings.load_opacity(), 100);
    }

    #[test]
    fn out_of_range_opacity_uses_default() {
        let settings = scratch("range");
        settings.save(&AppConfig {
            opacity: 140,
            ..AppConfig::default()
        });
        assert_eq!(settings.load_opacity(), 100);

        settings.save_opacity(35);
        assert_eq!(settings.load_opacity(), 35);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = scratch("partial");
        fs::create_dir_all(settings.path().parent().unwrap()).unwrap();
        fs::write(settings.path(), r#"{ "opacity": 60 }"#).unwrap();
        let config = settings.load();
        assert_eq!(config.opacity, 60);
        assert_eq!(config.hotkey_toggle, "Win+Shift+B");
    }

    #[test]
    fn bad_hotkey_falls_back_to_default() {
        let settings = scratch("hotkey");
        settings.save(&AppConfig {
            hotkey_toggle: "Ctrl+Banana".into(),
            ..AppConfig::default()
        });
        assert_eq!(settings.load_hotkey(), Hotkey::default());
    }

    #[test]
    fn reset_removes_stored_values() {
        let settings = scratch("reset");
        settings.save_opacity(20);
        settings.save_game_mode_auto(true);
        settings.reset();
        assert_eq!(settings.load_opacity(), 100);
        assert!(!settings.load_game_mode_auto());
        settings.reset();
    }

    #[test]
    fn selection_parsing_ignores_empty_parts() {
        assert_eq!(parse_selection(""), None);
        assert_eq!(parse_selection("||"), None);
        assert_eq!(
            parse_selection("0,0,1920,1080||"),
            Some(keys(&["0,0,1920,1080"]))
        );
    }
}
