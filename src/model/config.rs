use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StencilError};

const DEFAULTS: &str = include_str!("../../config/default.conf");

pub const SCRIPT_DIR: &str = "SCRIPT_DIR";
pub const BASE_MODULE: &str = "BASE_MODULE";
pub const VAULT_PATH: &str = "VAULT_PATH";
pub const LOG_FILTER: &str = "LOG_FILTER";
pub const PROTOCOL_SCHEME: &str = "PROTOCOL_SCHEME";

const KNOWN_KEYS: [&str; 5] = [SCRIPT_DIR, BASE_MODULE, VAULT_PATH, LOG_FILTER, PROTOCOL_SCHEME];

/// Engine configuration, persisted as a line-based `KEY=VALUE` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub script_dir: String,
    pub base_module: String,
    pub vault_path: String,
    pub log_filter: String,
    pub protocol_scheme: String,
    /// Keys this build does not understand, kept so a rewrite does not drop them.
    extra: Vec<(String, String)>,
    source: Option<PathBuf>,
}

impl AppConfig {
    fn empty() -> Self {
        Self {
            script_dir: String::new(),
            base_module: String::new(),
            vault_path: String::new(),
            log_filter: String::new(),
            protocol_scheme: String::new(),
            extra: Vec::new(),
            source: None,
        }
    }

    /// Load configuration with layering: defaults → user record.
    pub fn load() -> Result<Self> {
        let path = default_record_path()
            .ok_or_else(|| StencilError::Config("cannot determine config directory".into()))?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::from_record(DEFAULTS)?;

        if path.exists() {
            let raw = fs::read_to_string(path)?;
            config.apply_record(&raw)?;
        }

        config.source = Some(path.to_path_buf());
        config.expand_home();
        Ok(config)
    }

    pub fn from_record(raw: &str) -> Result<Self> {
        let mut config = Self::empty();
        config.apply_record(raw)?;
        Ok(config)
    }

    fn apply_record(&mut self, raw: &str) -> Result<()> {
        for (idx, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(StencilError::Config(format!(
                    "line {}: expected KEY=VALUE, got {line:?}",
                    idx + 1
                )));
            };

            self.set(key.trim(), value.trim());
        }

        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) {
        let value = value.to_string();
        match key {
            SCRIPT_DIR => self.script_dir = value,
            BASE_MODULE => self.base_module = value,
            VAULT_PATH => self.vault_path = value,
            LOG_FILTER => self.log_filter = value,
            PROTOCOL_SCHEME => self.protocol_scheme = value,
            _ => {
                tracing::warn!("config: unknown key {key}, keeping as-is");
                match self.extra.iter_mut().find(|(k, _)| k == key) {
                    Some(entry) => entry.1 = value,
                    None => self.extra.push((key.to_string(), value)),
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            SCRIPT_DIR => Some(&self.script_dir),
            BASE_MODULE => Some(&self.base_module),
            VAULT_PATH => Some(&self.vault_path),
            LOG_FILTER => Some(&self.log_filter),
            PROTOCOL_SCHEME => Some(&self.protocol_scheme),
            _ => self
                .extra
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
        }
    }

    /// Render the record in its on-disk form.
    pub fn to_record(&self) -> String {
        let mut out = String::from("# stencil settings\n");
        for key in KNOWN_KEYS {
            let value = self.get(key).unwrap_or_default();
            out.push_str(&format!("{key}={value}\n"));
        }
        for (key, value) in &self.extra {
            out.push_str(&format!("{key}={value}\n"));
        }
        out
    }

    /// The only way settings change after startup: update one key and rewrite
    /// the record file.
    pub fn reconfigure(&mut self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() || key.contains(['=', '\n']) {
            return Err(StencilError::Config(format!("invalid key {key:?}")));
        }
        if value.contains('\n') {
            return Err(StencilError::Config("values cannot span lines".into()));
        }

        self.set(key, value);
        self.expand_home();
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = self.source.as_ref() else {
            return Err(StencilError::Config("config has no backing file".into()));
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_record())?;
        tracing::info!("config written to {}", path.display());
        Ok(())
    }

    pub fn record_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn script_dir(&self) -> PathBuf {
        PathBuf::from(&self.script_dir)
    }

    pub fn vault_path(&self) -> PathBuf {
        PathBuf::from(&self.vault_path)
    }

    fn expand_home(&mut self) {
        let Some(home) = dirs_home() else {
            return;
        };
        let home = home.to_string_lossy();

        for path in [&mut self.script_dir, &mut self.vault_path] {
            if path.starts_with('~') {
                *path = path.replacen('~', &home, 1);
            }
        }
    }
}

pub fn default_record_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "stencil")
        .map(|dirs| dirs.config_dir().join("stencil.conf"))
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
