use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use crate::models::Position;

pub const DEFAULT_API_BASE: &str = "http://localhost:8081/api";
const SETTINGS_ENV: &str = "FALLWATCH_SETTINGS";
const API_BASE_ENV: &str = "FALLWATCH_API_BASE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientSettings {
    pub api_base: String,
    /// Fixed coordinates sent instead of the device position.
    pub location_override: Option<Position>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            location_override: None,
        }
    }
}

/// User preferences persisted as JSON across sessions.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ClientSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring unreadable settings at {}: {err}",
                    path.display()
                );
                ClientSettings::default()
            })
        } else {
            ClientSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// `$FALLWATCH_SETTINGS`, else `<config dir>/fallwatch/settings.json`.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(SETTINGS_ENV) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fallwatch")
            .join("settings.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> ClientSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stored API base, unless `$FALLWATCH_API_BASE` overrides it for this run.
    pub fn effective_api_base(&self) -> String {
        match std::env::var(API_BASE_ENV) {
            Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => self.settings().api_base,
        }
    }

    pub fn set_api_base(&self, api_base: &str) -> Result<()> {
        let api_base = api_base.trim().trim_end_matches('/');
        if api_base.is_empty() {
            bail!("API base must not be empty");
        }
        if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
            bail!("API base must be an http(s) URL, got '{api_base}'");
        }
        self.update(|data| data.api_base = api_base.to_string())
    }

    pub fn set_location_override(&self, position: Option<Position>) -> Result<()> {
        if let Some(p) = position {
            if !(-90.0..=90.0).contains(&p.lat) || !(-180.0..=180.0).contains(&p.lng) {
                bail!("coordinates out of range: {}, {}", p.lat, p.lng);
            }
        }
        self.update(|data| data.location_override = position)
    }

    fn update(&self, f: impl FnOnce(&mut ClientSettings)) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
        self.persist(&guard)
    }

    fn persist(&self, data: &ClientSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create settings dir {}", parent.display())
                })?;
            }
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
