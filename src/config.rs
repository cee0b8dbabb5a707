use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;

use crate::errors::{BrewError, BrewResult};

pub const DEFAULT_CONFIG_FILE: &str = "pour_it.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub coffee_weight: String,
    pub ratio: String,
    pub bind_addr: String,
    pub notifications: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            coffee_weight: "20".into(),
            ratio: "16".into(),
            bind_addr: "127.0.0.1:8765".into(),
            notifications: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    #[serde(deserialize_with = "optional_text_or_number")]
    coffee_weight: Option<String>,
    #[serde(deserialize_with = "optional_text_or_number")]
    ratio: Option<String>,
    bind_addr: Option<String>,
    notifications: Option<bool>,
}

/// A field that may be written as `20` or `"20"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl From<FieldValue> for String {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Text(s) => s,
            FieldValue::Integer(n) => n.to_string(),
            FieldValue::Float(n) => n.to_string(),
        }
    }
}

pub(crate) fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    FieldValue::deserialize(deserializer).map(String::from)
}

fn optional_text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    text_or_number(deserializer).map(Some)
}

/// Defaults, then the TOML file, then `POUR_IT_*` environment variables.
///
/// An explicit `path` must exist; the default `pour_it.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> BrewResult<Settings> {
    let mut settings = Settings::default();

    let raw = match path {
        Some(path) => Some(fs::read_to_string(path).map_err(|e| {
            BrewError::Config(format!("cannot read {}: {}", path.display(), e))
        })?),
        None => fs::read_to_string(DEFAULT_CONFIG_FILE).ok(),
    };
    if let Some(raw) = raw {
        apply_file(&mut settings, &raw)?;
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> BrewResult<()> {
    let file: FileSettings =
        toml::from_str(raw).map_err(|e| BrewError::Config(e.to_string()))?;

    if let Some(v) = file.coffee_weight {
        settings.coffee_weight = v;
    }
    if let Some(v) = file.ratio {
        settings.ratio = v;
    }
    if let Some(v) = file.bind_addr {
        settings.bind_addr = v;
    }
    if let Some(v) = file.notifications {
        settings.notifications = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("POUR_IT_COFFEE") {
        settings.coffee_weight = v;
    }
    if let Some(v) = var("POUR_IT_RATIO") {
        settings.ratio = v;
    }
    if let Some(v) = var("POUR_IT_BIND") {
        settings.bind_addr = v;
    }
    if let Some(v) = var("POUR_IT_NOTIFY") {
        match v.trim().to_ascii_lowercase().as_str() {
            "0" | "false" | "off" | "no" => settings.notifications = false,
            "1" | "true" | "on" | "yes" => settings.notifications = true,
            _ => {}
        }
    }
}
