//! Loads `~/.roomforge/settings.toml`, resolves `$VAR` references in
//! `storage.data_dir`, and persists dot-path edits.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::RwLock;

use super::schema::RoomforgeSettings;

const TEMPLATE: &str = include_str!("template.toml");

fn settings_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".roomforge")
        .join("settings.toml")
}

/// Cached settings backed by one TOML file.
pub struct SettingsManager {
    settings: RwLock<RoomforgeSettings>,
    path: PathBuf,
}

impl SettingsManager {
    pub async fn new() -> Result<Self> {
        Self::with_path(settings_path()).await
    }

    pub async fn with_path(path: PathBuf) -> Result<Self> {
        let settings = Self::load_from_path(&path).await?;

        Ok(Self {
            settings: RwLock::new(settings),
            path,
        })
    }

    async fn load_from_path(path: &Path) -> Result<RoomforgeSettings> {
        if !path.exists() {
            tracing::debug!("Settings file not found at {:?}, using defaults", path);
            return Ok(RoomforgeSettings::default());
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .context("Failed to read settings file")?;

        let mut settings: RoomforgeSettings =
            toml::from_str(&contents).context("Failed to deserialize settings")?;

        Self::resolve_env_vars(&mut settings);

        tracing::info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    fn resolve_env_vars(settings: &mut RoomforgeSettings) {
        if let Some(resolved) = resolve_env_path(&settings.storage.data_dir) {
            settings.storage.data_dir = resolved;
        }
    }

    pub async fn get(&self) -> RoomforgeSettings {
        self.settings.read().await.clone()
    }

    async fn persist(&self, settings: &RoomforgeSettings) -> Result<()> {
        let toml_string =
            toml::to_string_pretty(settings).context("Failed to serialize settings")?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write a sibling temp file, then rename over the original
        let temp_path = self.path.with_extension("toml.tmp");
        tokio::fs::write(&temp_path, &toml_string).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        tracing::info!("Saved settings to {:?}", self.path);
        Ok(())
    }

    /// Read one setting by dot-path, e.g. `merge.stitch_distance`.
    pub async fn get_value(&self, key: &str) -> Result<serde_json::Value> {
        let settings = self.settings.read().await;
        let json = serde_json::to_value(&*settings)?;

        let mut current = &json;
        for part in key.split('.') {
            current = current
                .get(part)
                .ok_or_else(|| anyhow::anyhow!("Setting '{}' not found", key))?;
        }

        Ok(current.clone())
    }

    /// Set one existing setting by dot-path and save the file.
    pub async fn set_value(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut settings = self.settings.write().await;
        let mut json = serde_json::to_value(&*settings)?;

        let parts: Vec<&str> = key.split('.').collect();
        set_nested_value(&mut json, &parts, value)?;

        let updated: RoomforgeSettings = serde_json::from_value(json)?;
        self.persist(&updated).await?;
        *settings = updated;
        Ok(())
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Write the commented template if no settings file exists yet.
    /// Returns `true` if a file was created.
    pub async fn ensure_settings_file(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, TEMPLATE).await?;
        tracing::info!("Generated settings template at {:?}", self.path);
        Ok(true)
    }
}

fn set_nested_value(
    json: &mut serde_json::Value,
    parts: &[&str],
    value: serde_json::Value,
) -> Result<()> {
    if parts.is_empty() {
        return Err(anyhow::anyhow!("Empty key path"));
    }

    let mut current = json;
    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            if let Some(obj) = current.as_object_mut() {
                if !obj.contains_key(*part) {
                    return Err(anyhow::anyhow!("Setting '{}' not found", parts.join(".")));
                }
                obj.insert((*part).to_string(), value);
                return Ok(());
            } else {
                return Err(anyhow::anyhow!("Cannot set value on non-object"));
            }
        } else {
            current = current
                .get_mut(*part)
                .ok_or_else(|| anyhow::anyhow!("Setting path '{}' not found", parts.join(".")))?;
        }
    }

    Ok(())
}

/// `$VAR` or `${VAR}` to the variable's value, if set.
fn resolve_env_ref(value: &str) -> Option<String> {
    let trimmed = value.trim();

    if let Some(rest) = trimmed.strip_prefix('$') {
        let var_name = rest
            .strip_prefix('{')
            .and_then(|r| r.strip_suffix('}'))
            .unwrap_or(rest);

        return std::env::var(var_name).ok();
    }

    None
}

/// Resolve an env reference in the first component of a path
/// (`$HOME/scans` -> `/home/me/scans`).
fn resolve_env_path(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    let first = match components.next()? {
        Component::Normal(first) => first.to_str()?,
        _ => return None,
    };
    let resolved = resolve_env_ref(first)?;
    Some(PathBuf::from(resolved).join(components.as_path()))
}

/// The setting if non-empty, else the first non-empty env var, else `default`.
pub fn get_with_env_fallback(
    setting: &Option<String>,
    env_vars: &[&str],
    default: Option<String>,
) -> Option<String> {
    if let Some(v) = setting {
        if !v.is_empty() {
            return Some(v.clone());
        }
    }

    for env_var in env_vars {
        if let Ok(v) = std::env::var(env_var) {
            if !v.is_empty() {
                return Some(v);
            }
        }
    }

    default
}
