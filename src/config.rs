use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::watch;

use crate::translate::EngineKind;

// ─── Persisted settings ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayPosition {
    Below,
    Above,
    Overlay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub enabled: bool,
    /// Empty string = auto-detect.
    pub source_language: String,
    pub target_language: String,
    pub translation_engine: EngineKind,
    pub show_original: bool,
    pub font_size: u32,
    pub position: OverlayPosition,
    pub deepl_api_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            source_language: "NB".into(),
            target_language: "EN-US".into(),
            translation_engine: EngineKind::Deepl,
            show_original: true,
            font_size: 16,
            position: OverlayPosition::Below,
            deepl_api_key: String::new(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Settings {
    /// Load from a toml file. Any failure falls back to defaults so the
    /// engine stays functional with a broken or missing config.
    pub fn load(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => {
                    info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    warn!("Settings file unreadable ({}), using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No settings file at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &std::path::Path) {
        match toml::to_string_pretty(self) {
            Ok(content) => {
                if let Err(e) = std::fs::write(path, content) {
                    error!("Failed to save settings: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize settings: {}", e),
        }
    }
}

// ─── Store with change notification ──────────────────────────────────

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unknown or mismatched setting: {0}")]
    Invalid(String),
}

/// Owns the settings file and publishes every change to subscribers.
/// The lifecycle controller treats any published change as a full
/// dispose-then-restart, so a store update never mutates a live session.
pub struct SettingsStore {
    path: PathBuf,
    tx: watch::Sender<Settings>,
}

impl SettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = Settings::load(&path);
        let (tx, _) = watch::channel(settings);
        Self { path, tx }
    }

    /// In-memory store with no backing file (tests, demos).
    pub fn ephemeral(settings: Settings) -> Self {
        let (tx, _) = watch::channel(settings);
        Self {
            path: PathBuf::new(),
            tx,
        }
    }

    pub fn get_all(&self) -> Settings {
        self.tx.borrow().clone()
    }

    /// Receiver that resolves whenever any setting changes.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    /// Update one key by name, toml-typed. The merged result must still
    /// deserialize as a whole `Settings`.
    pub fn set(&self, key: &str, value: toml::Value) -> Result<(), SettingsError> {
        let current = self.get_all();
        let mut table = match toml::Value::try_from(&current) {
            Ok(toml::Value::Table(t)) => t,
            _ => return Err(SettingsError::Invalid(key.to_string())),
        };
        if !table.contains_key(key) {
            return Err(SettingsError::Invalid(key.to_string()));
        }
        table.insert(key.to_string(), value);
        let updated: Settings = toml::Value::Table(table)
            .try_into()
            .map_err(|_| SettingsError::Invalid(key.to_string()))?;
        self.replace(updated);
        Ok(())
    }

    /// Replace the whole settings value, persist it, notify subscribers.
    pub fn replace(&self, settings: Settings) {
        if settings == self.get_all() {
            return;
        }
        if !self.path.as_os_str().is_empty() {
            settings.save(&self.path);
        }
        self.tx.send_replace(settings);
    }
}
