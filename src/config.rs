//! Configuration loaded from `fedappeal.toml`.
//!
//! Every field has a default, so a missing file is fine. `ADMIN_ID` and
//! `FEDAPPEAL_DB` from the environment take precedence over the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::appeal::{SubmissionPolicy, UserId};

pub const DEFAULT_CONFIG_FILE: &str = "fedappeal.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// The single administrator allowed to list and resolve appeals.
    #[serde(default)]
    pub admin_id: Option<UserId>,

    /// Location of the appeal database.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Appeals shown per `/pending` page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Allow a new appeal after a rejection of the same kind. Approved
    /// appeals never block a new one.
    #[serde(default)]
    pub allow_resubmission: bool,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("appeals.json")
}

fn default_page_size() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            admin_id: None,
            database_path: default_database_path(),
            page_size: default_page_size(),
            allow_resubmission: false,
        }
    }
}

impl AppConfig {
    /// Load from `fedappeal.toml` in the current directory, then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config.normalized())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = var("ADMIN_ID") {
            let raw = raw.trim();
            if !raw.is_empty() {
                let id = raw
                    .parse::<UserId>()
                    .with_context(|| format!("ADMIN_ID must be an integer, got {raw:?}"))?;
                self.admin_id = Some(id);
            }
        }
        if let Some(db) = var("FEDAPPEAL_DB").filter(|v| !v.trim().is_empty()) {
            self.database_path = PathBuf::from(db);
        }
        *self = self.clone().normalized();
        Ok(())
    }

    // `0` was the historical "unset" value for the admin id.
    fn normalized(mut self) -> Self {
        if self.admin_id == Some(0) {
            self.admin_id = None;
        }
        if self.page_size == 0 {
            self.page_size = default_page_size();
        }
        self
    }

    pub fn submission_policy(&self) -> SubmissionPolicy {
        SubmissionPolicy {
            allow_resubmission: self.allow_resubmission,
        }
    }
}
