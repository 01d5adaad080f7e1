use crate::provider_kind::{ProviderChoice, ProviderKind};
use anyhow::{Context, Result, anyhow};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_OUTPUT_FILE: &str = "~/intentions.md";

/// The persisted settings record.
///
/// The maps are keyed by provider name (see [`ProviderKind::as_str`]) so that
/// files written by other versions still deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub provider: ProviderChoice,
    pub models: BTreeMap<String, String>,
    pub hosts: BTreeMap<String, String>,
    pub api_keys: BTreeMap<String, String>,
    pub output_file: String,
    pub system_prompt: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let models = ProviderKind::PRIORITY
            .iter()
            .map(|k| (k.as_str().to_string(), k.default_model().to_string()))
            .collect();
        let hosts = ProviderKind::PRIORITY
            .iter()
            .filter_map(|k| k.default_host().map(|h| (k.as_str().to_string(), h.to_string())))
            .collect();
        let api_keys = ProviderKind::PRIORITY
            .iter()
            .filter(|k| k.requires_api_key())
            .map(|k| (k.as_str().to_string(), String::new()))
            .collect();

        Self {
            provider: ProviderChoice::Auto,
            models,
            hosts,
            api_keys,
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            system_prompt: None,
        }
    }
}

impl Settings {
    /// Model for `kind`, falling back to the compiled-in default.
    pub fn model_for(&self, kind: ProviderKind) -> &str {
        self.models
            .get(kind.as_str())
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .unwrap_or(kind.default_model())
    }

    /// Base URL for a host-based provider, without a trailing slash.
    pub fn host_for(&self, kind: ProviderKind) -> Option<&str> {
        self.hosts
            .get(kind.as_str())
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .or(kind.default_host())
            .map(|h| h.trim_end_matches('/'))
    }

    /// Non-empty API key for a key-based provider.
    pub fn api_key_for(&self, kind: ProviderKind) -> Option<&str> {
        self.api_keys
            .get(kind.as_str())
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
    }

    pub fn set_model(&mut self, kind: ProviderKind, model: impl Into<String>) {
        self.models.insert(kind.as_str().to_string(), model.into());
    }

    pub fn set_host(&mut self, kind: ProviderKind, host: impl Into<String>) {
        self.hosts.insert(kind.as_str().to_string(), host.into());
    }

    pub fn set_api_key(&mut self, kind: ProviderKind, key: impl Into<String>) {
        self.api_keys.insert(kind.as_str().to_string(), key.into());
    }

    /// Output file path with a leading `~` expanded to the home directory.
    pub fn output_path(&self) -> Result<PathBuf> {
        expand_home(&self.output_file)
    }

    /// Shallow-merges the top-level keys of `raw` over the defaults.
    pub fn merged_over_defaults(raw: Value) -> Result<Self> {
        let Value::Object(overrides) = raw else {
            return Err(anyhow!("settings must be a JSON object"));
        };
        let mut merged = serde_json::to_value(Self::default())?;
        if let Value::Object(base) = &mut merged {
            for (key, value) in overrides {
                base.insert(key, value);
            }
        }
        Ok(serde_json::from_value(merged)?)
    }
}

/// Applies environment overrides in memory. Never persisted.
pub fn apply_env_overrides<F>(settings: &Settings, lookup: F) -> Settings
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = settings.clone();
    for kind in ProviderKind::PRIORITY {
        let Some(value) = lookup(kind.env_var()).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        debug!("Using {} from environment", kind.env_var());
        if kind.requires_api_key() {
            settings.set_api_key(kind, value);
        } else {
            settings.set_host(kind, value);
        }
    }
    settings
}

pub fn expand_home(path: &str) -> Result<PathBuf> {
    if path == "~" || path.starts_with("~/") {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        let rest = path.trim_start_matches('~').trim_start_matches('/');
        return Ok(if rest.is_empty() { home } else { home.join(rest) });
    }
    Ok(PathBuf::from(path))
}

/// Replaces `path` with `contents` via a sibling temp file and rename.
///
/// A symlink at `path` is followed so the link itself survives, and an
/// existing file keeps its permissions. New files are created owner-only.
pub(crate) fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    let target = match fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(_) => path.to_path_buf(),
    };
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .with_context(|| format!("Failed to create directory {}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    if let Ok(existing) = fs::metadata(&target) {
        tmp.as_file().set_permissions(existing.permissions())?;
    }
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    tmp.persist(&target)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Reads and writes the settings file.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.intention/config.json`.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(Self::get_config_dir()?.join("config.json")))
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".intention"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads settings, backfilling missing fields from defaults.
    ///
    /// A missing file yields the defaults. Malformed JSON also yields the
    /// defaults, with a warning.
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            info!("No settings file at {}, using defaults", self.path.display());
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let parsed = serde_json::from_str::<Value>(&content)
            .map_err(anyhow::Error::from)
            .and_then(Settings::merged_over_defaults);

        match parsed {
            Ok(settings) => {
                info!("Loaded settings from: {}", self.path.display());
                Ok(settings)
            }
            Err(e) => {
                warn!(
                    "Ignoring malformed settings file {}: {}. Using defaults.",
                    self.path.display(),
                    e
                );
                Ok(Settings::default())
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;
        write_atomically(&self.path, &content)?;
        info!("Saved settings to: {}", self.path.display());
        Ok(())
    }
}
