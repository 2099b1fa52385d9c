//! Settings-source adapters.
//!
//! `FileSettings` reads the routing keys from a configuration file via the
//! `config` crate (YAML, JSON, TOML or INI, picked by extension).
//! `MemorySettings` backs tests and embedders that already hold the values.
use std::{collections::HashMap, path::Path};

use config::{Config, File, FileFormat};
use eyre::{Context, Result};

use crate::ports::settings::Settings;

/// File-backed settings source.
pub struct FileSettings {
    config: Config,
}

impl FileSettings {
    /// Load the file at `path`. The format is inferred from the extension,
    /// defaulting to TOML.
    pub fn load(path: &str) -> Result<Self> {
        let format = match Path::new(path).extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            Some("ini") => FileFormat::Ini,
            _ => FileFormat::Toml,
        };

        let config = Config::builder()
            .add_source(File::new(path, format))
            .build()
            .with_context(|| format!("Failed to load settings from {path}"))?;

        Ok(Self { config })
    }
}

impl Settings for FileSettings {
    fn get(&self, key: &str) -> Option<String> {
        // The config crate treats keys case-insensitively, matching the
        // behaviour of the application-settings stores this replaces.
        self.config.get_string(key).ok()
    }
}

/// In-memory settings source.
#[derive(Debug, Default, Clone)]
pub struct MemorySettings {
    values: HashMap<String, String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut settings = Self::new();
        for (key, value) in pairs {
            settings.set(key, value);
        }
        settings
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values
            .insert(key.to_ascii_lowercase(), value.to_string());
    }
}

impl Settings for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(&key.to_ascii_lowercase()).cloned()
    }
}
