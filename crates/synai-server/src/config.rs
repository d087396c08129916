use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use synai_store::FileStore;
use synai_wallet::DEFAULT_MASTER_SECRET;

/// Relay settings read from `<state_dir>/config.toml`, then environment.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Socket address the HTTP server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Write a snapshot to `state.json` after every mutation.
    #[serde(default = "default_persist")]
    pub persist: bool,

    /// `EnvFilter` directives.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Rows per leaderboard.
    #[serde(default = "default_ranking_limit")]
    pub ranking_limit: usize,

    /// Wallet master secret. Only ever taken from `SYNAI_MASTER_KEY`.
    #[serde(skip)]
    pub master_secret: Option<String>,

    #[serde(skip)]
    pub state_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_bind_addr() -> String {
    "127.0.0.1:5005".to_string()
}

fn default_persist() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_ranking_limit() -> usize {
    10
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            persist: default_persist(),
            log_filter: default_log_filter(),
            log_format: LogFormat::default(),
            ranking_limit: default_ranking_limit(),
            master_secret: None,
            state_dir: PathBuf::new(),
        }
    }
}

impl RelayConfig {
    pub fn config_path(state_dir: &Path) -> PathBuf {
        state_dir.join("config.toml")
    }

    /// Load config from disk. Returns defaults if the file is absent.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = Self::config_path(state_dir);
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str::<Self>(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Self::default()
        };
        config.state_dir = state_dir.to_path_buf();
        Ok(config)
    }

    /// Resolve the state directory, load its config file and apply `SYNAI_*` overrides.
    pub fn from_env() -> Result<Self> {
        let state_dir = FileStore::default_state_dir();
        let mut config = Self::load(&state_dir)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup("SYNAI_BIND") {
            self.bind_addr = bind;
        }
        if let Some(filter) = lookup("SYNAI_LOG") {
            self.log_filter = filter;
        }
        if let Some(secret) = lookup("SYNAI_MASTER_KEY").filter(|s| !s.is_empty()) {
            self.master_secret = Some(secret);
        }
    }

    pub fn master_secret(&self) -> &str {
        self.master_secret.as_deref().unwrap_or(DEFAULT_MASTER_SECRET)
    }
}
