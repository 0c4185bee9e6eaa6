//! Persisted panel settings, keyed by subsystem.
//!
//! Each subsystem owns a flat JSON object. Saving a form only touches the
//! fields registered for the subsystem named by the form, so a `save=gui`
//! request can never rewrite MQTT or Wi-Fi values.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Shown instead of a stored secret; posting it back keeps the old value.
pub const PASSWORD_MASK: &str = "********";

/// Number of configurable GPIO slots.
pub const GPIO_SLOTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subsystem {
    Hasp,
    Http,
    Gui,
    Debug,
    Mqtt,
    Wifi,
    Gpio,
}

impl Subsystem {
    pub const ALL: [Subsystem; 7] = [
        Subsystem::Hasp,
        Subsystem::Http,
        Subsystem::Gui,
        Subsystem::Debug,
        Subsystem::Mqtt,
        Subsystem::Wifi,
        Subsystem::Gpio,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Subsystem::Hasp => "hasp",
            Subsystem::Http => "http",
            Subsystem::Gui => "gui",
            Subsystem::Debug => "debug",
            Subsystem::Mqtt => "mqtt",
            Subsystem::Wifi => "wifi",
            Subsystem::Gpio => "gpio",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subsystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subsystem::ALL
            .into_iter()
            .find(|sub| sub.as_str() == s)
            .ok_or_else(|| format!("unknown settings subsystem: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text { max_len: usize },
    Int { min: i64, max: i64 },
    Flag,
    Secret { max_len: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: DefaultValue,
}

#[derive(Debug, Clone, Copy)]
pub enum DefaultValue {
    Text(&'static str),
    Int(i64),
    Flag(bool),
}

impl DefaultValue {
    fn to_value(self) -> Value {
        match self {
            DefaultValue::Text(s) => Value::from(s),
            DefaultValue::Int(i) => Value::from(i),
            DefaultValue::Flag(b) => Value::from(b),
        }
    }
}

const fn text(name: &'static str, max_len: usize, default: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text { max_len },
        default: DefaultValue::Text(default),
    }
}

const fn int(name: &'static str, min: i64, max: i64, default: i64) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Int { min, max },
        default: DefaultValue::Int(default),
    }
}

const fn flag(name: &'static str, default: bool) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Flag,
        default: DefaultValue::Flag(default),
    }
}

const fn secret(name: &'static str, max_len: usize) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Secret { max_len },
        default: DefaultValue::Text(""),
    }
}

const HASP_FIELDS: &[FieldSpec] = &[
    int("theme", 0, 7, 2),
    int("hue", 0, 360, 200),
    text("font", 31, ""),
    text("pages", 31, "/pages.jsonl"),
    int("startpage", 1, 12, 1),
    int("startdim", 0, 100, 100),
];

const HTTP_FIELDS: &[FieldSpec] = &[
    text("user", 31, "admin"),
    secret("pass", 63),
    int("port", 1, 65535, 80),
];

const GUI_FIELDS: &[FieldSpec] = &[
    int("idle1", 0, 32400, 10),
    int("idle2", 0, 32400, 60),
    int("rotate", 0, 7, 0),
    flag("cursor", false),
    flag("invert", false),
    int("bckl", -1, 39, -1),
];

const DEBUG_FIELDS: &[FieldSpec] = &[
    int("baud", 0, 11520, 11520),
    int("teleperiod", 0, 65535, 300),
];

const MQTT_FIELDS: &[FieldSpec] = &[
    text("name", 15, "plate01"),
    text("group", 15, "plates"),
    text("host", 63, ""),
    int("port", 1, 65535, 1883),
    text("user", 31, ""),
    secret("pass", 31),
];

const WIFI_FIELDS: &[FieldSpec] = &[text("ssid", 31, ""), secret("pass", 63)];

/// Field table of a subsystem. GPIO slots are stored separately.
#[must_use]
pub fn fields(subsystem: Subsystem) -> &'static [FieldSpec] {
    match subsystem {
        Subsystem::Hasp => HASP_FIELDS,
        Subsystem::Http => HTTP_FIELDS,
        Subsystem::Gui => GUI_FIELDS,
        Subsystem::Debug => DEBUG_FIELDS,
        Subsystem::Mqtt => MQTT_FIELDS,
        Subsystem::Wifi => WIFI_FIELDS,
        Subsystem::Gpio => &[],
    }
}

/// GPIO function codes. Odd values are the inverted (default high) variant.
pub mod gpio_kind {
    pub const FREE: u8 = 0x00;
    pub const SWITCH: u8 = 0x02;
    pub const BUTTON: u8 = 0x04;
    pub const LED: u8 = 0x06;
    pub const LED_R: u8 = 0x08;
    pub const LED_G: u8 = 0x0A;
    pub const LED_B: u8 = 0x0C;
    pub const RELAY: u8 = 0x0E;
    pub const PWM: u8 = 0x10;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioSlot {
    pub pin: u8,
    pub kind: u8,
    pub group: u8,
    pub func: u8,
}

impl GpioSlot {
    #[must_use]
    pub fn in_use(&self) -> bool {
        self.kind & 0xFE != gpio_kind::FREE
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self.kind & 0xFE {
            gpio_kind::SWITCH => "Switch",
            gpio_kind::BUTTON => "Button",
            gpio_kind::LED => "Led",
            gpio_kind::LED_R => "Mood Red",
            gpio_kind::LED_G => "Mood Green",
            gpio_kind::LED_B => "Mood Blue",
            gpio_kind::RELAY => "Relay",
            gpio_kind::PWM => "PWM",
            _ => "Unknown",
        }
    }

    #[must_use]
    pub fn default_high(&self) -> bool {
        self.kind & 0x01 == 0x01
    }
}

/// Subsystem-keyed settings, optionally backed by a JSON file.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: BTreeMap<String, Map<String, Value>>,
}

impl SettingsStore {
    /// Store that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut store = Self {
            path: Some(path.to_path_buf()),
            data: BTreeMap::new(),
        };
        match fs::read_to_string(path) {
            Ok(text) => {
                store.data = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
                    path: path.display().to_string(),
                    detail: e.to_string(),
                })?;
                info!(path = %path.display(), "settings loaded");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        }
        Ok(store)
    }

    /// Current value of a field, falling back to its default.
    #[must_use]
    pub fn value(&self, subsystem: Subsystem, key: &str) -> Value {
        if let Some(v) = self
            .data
            .get(subsystem.as_str())
            .and_then(|m| m.get(key))
        {
            return v.clone();
        }
        fields(subsystem)
            .iter()
            .find(|f| f.name == key)
            .map_or(Value::Null, |f| f.default.to_value())
    }

    #[must_use]
    pub fn text(&self, subsystem: Subsystem, key: &str) -> String {
        match self.value(subsystem, key) {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    #[must_use]
    pub fn int(&self, subsystem: Subsystem, key: &str) -> i64 {
        match self.value(subsystem, key) {
            Value::Number(n) => n.as_i64().unwrap_or(0),
            Value::String(s) => s.trim().parse().unwrap_or(0),
            Value::Bool(b) => i64::from(b),
            _ => 0,
        }
    }

    #[must_use]
    pub fn flag(&self, subsystem: Subsystem, key: &str) -> bool {
        match self.value(subsystem, key) {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
            Value::String(s) => parse_flag(&s),
            _ => false,
        }
    }

    /// Snapshot of a subsystem with defaults filled in.
    #[must_use]
    pub fn subsystem(&self, subsystem: Subsystem) -> Map<String, Value> {
        fields(subsystem)
            .iter()
            .map(|f| (f.name.to_string(), self.value(subsystem, f.name)))
            .collect()
    }

    /// Apply posted form arguments to one subsystem.
    ///
    /// Unknown names are ignored, integers are clamped to their range, text
    /// is cut to its length limit and a posted [`PASSWORD_MASK`] leaves the
    /// stored secret alone. Returns whether anything changed.
    pub fn apply<'a, I>(&mut self, subsystem: Subsystem, args: I) -> bool
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let table = fields(subsystem);
        let mut changed = false;
        for (name, raw) in args {
            let Some(spec) = table.iter().find(|f| f.name == name) else {
                continue;
            };
            let value = match spec.kind {
                FieldKind::Text { max_len } => Value::from(truncate(raw, max_len)),
                FieldKind::Secret { max_len } => {
                    if raw == PASSWORD_MASK {
                        continue;
                    }
                    Value::from(truncate(raw, max_len))
                }
                FieldKind::Int { min, max } => match raw.trim().parse::<i64>() {
                    Ok(i) => Value::from(i.clamp(min, max)),
                    Err(_) => {
                        warn!(%subsystem, field = name, value = raw, "ignoring non-numeric value");
                        continue;
                    }
                },
                FieldKind::Flag => Value::from(parse_flag(raw)),
            };
            if self.value(subsystem, name) != value {
                self.data
                    .entry(subsystem.as_str().to_string())
                    .or_default()
                    .insert(name.to_string(), value);
                changed = true;
            }
        }
        if changed {
            info!(%subsystem, "settings changed");
        }
        changed
    }

    #[must_use]
    pub fn gpio_slots(&self) -> [GpioSlot; GPIO_SLOTS] {
        let mut slots = [GpioSlot::default(); GPIO_SLOTS];
        if let Some(Value::Array(stored)) = self
            .data
            .get(Subsystem::Gpio.as_str())
            .and_then(|m| m.get("slots"))
        {
            for (slot, v) in slots.iter_mut().zip(stored) {
                if let Ok(parsed) = serde_json::from_value::<GpioSlot>(v.clone()) {
                    *slot = parsed;
                }
            }
        }
        slots
    }

    /// Store one GPIO slot. Returns false for an id out of range.
    pub fn set_gpio_slot(&mut self, id: usize, slot: GpioSlot) -> bool {
        if id >= GPIO_SLOTS {
            return false;
        }
        let mut slots = self.gpio_slots();
        slots[id] = slot;
        let encoded: Vec<Value> = slots
            .iter()
            .map(|s| serde_json::to_value(s).unwrap_or(Value::Null))
            .collect();
        self.data
            .entry(Subsystem::Gpio.as_str().to_string())
            .or_default()
            .insert("slots".to_string(), Value::Array(encoded));
        true
    }

    /// First unused GPIO slot.
    #[must_use]
    pub fn free_gpio_slot(&self) -> Option<usize> {
        self.gpio_slots().iter().position(|s| !s.in_use())
    }

    /// Write the store to its file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Write`] when the file cannot be written.
    pub fn save(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = serde_json::to_string_pretty(&self.data).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Drop every stored value and delete the file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Write`] when the file exists but cannot be removed.
    pub fn clear(&mut self) -> Result<(), ConfigError> {
        self.data.clear();
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(ConfigError::Write {
                        path: path.display().to_string(),
                        source,
                    })
                }
            }
        }
        warn!("all settings erased");
        Ok(())
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

fn truncate(raw: &str, max_len: usize) -> String {
    raw.chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_reported() {
        let s = SettingsStore::in_memory();
        assert_eq!(s.int(Subsystem::Gui, "idle2"), 60);
        assert_eq!(s.text(Subsystem::Http, "user"), "admin");
        assert_eq!(s.text(Subsystem::Http, "pass"), "");
    }

    #[test]
    fn test_apply_touches_only_named_subsystem() {
        let mut s = SettingsStore::in_memory();
        s.apply(Subsystem::Mqtt, [("host", "broker"), ("port", "1884")]);
        let mqtt_before = s.subsystem(Subsystem::Mqtt);
        let changed = s.apply(
            Subsystem::Gui,
            [("save", "gui"), ("idle1", "30"), ("host", "evil"), ("port", "1")],
        );
        assert!(changed);
        assert_eq!(s.int(Subsystem::Gui, "idle1"), 30);
        assert_eq!(s.subsystem(Subsystem::Mqtt), mqtt_before);
    }

    #[test]
    fn test_mask_keeps_secret() {
        let mut s = SettingsStore::in_memory();
        s.apply(Subsystem::Wifi, [("pass", "hunter22")]);
        assert!(!s.apply(Subsystem::Wifi, [("pass", PASSWORD_MASK)]));
        assert_eq!(s.text(Subsystem::Wifi, "pass"), "hunter22");
    }

    #[test]
    fn test_int_fields_are_clamped() {
        let mut s = SettingsStore::in_memory();
        s.apply(Subsystem::Hasp, [("startdim", "250"), ("hue", "abc")]);
        assert_eq!(s.int(Subsystem::Hasp, "startdim"), 100);
        assert_eq!(s.int(Subsystem::Hasp, "hue"), 200);
    }

    #[test]
    fn test_gpio_slots_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut s = SettingsStore::load(&path).unwrap();
        let slot = GpioSlot {
            pin: 12,
            kind: gpio_kind::RELAY | 1,
            group: 3,
            func: 0,
        };
        assert!(s.set_gpio_slot(2, slot));
        assert!(!s.set_gpio_slot(GPIO_SLOTS, slot));
        s.save().unwrap();

        let reloaded = SettingsStore::load(&path).unwrap();
        assert_eq!(reloaded.gpio_slots()[2], slot);
        assert_eq!(reloaded.free_gpio_slot(), Some(0));
        assert!(reloaded.gpio_slots()[2].default_high());
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut s = SettingsStore::load(&path).unwrap();
        s.apply(Subsystem::Gui, [("idle1", "5")]);
        s.save().unwrap();
        s.clear().unwrap();
        assert!(!path.exists());
        assert_eq!(s.int(Subsystem::Gui, "idle1"), 10);
    }
}
