//! Where the settings document lives. Environment first, CLI flags override.

use std::env;
use std::path::PathBuf;

use crate::data::saved_state::settings_path;

pub const SETTINGS_DIR_ENV: &str = "BUBBLEBUFF_SETTINGS_DIR";
pub const SESSION_ENV: &str = "BUBBLEBUFF_SESSION";
pub const DEFAULT_SETTINGS_DIR: &str = "UserSettings";
pub const DEFAULT_SESSION_ID: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub settings_dir: PathBuf,
    pub session_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settings_dir: PathBuf::from(DEFAULT_SETTINGS_DIR),
            session_id: DEFAULT_SESSION_ID.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            settings_dir: env::var(SETTINGS_DIR_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.settings_dir),
            session_id: env::var(SESSION_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.session_id),
        }
    }

    pub fn with_overrides(mut self, settings_dir: Option<&str>, session_id: Option<&str>) -> Self {
        if let Some(dir) = settings_dir {
            self.settings_dir = PathBuf::from(dir);
        }
        if let Some(session) = session_id {
            self.session_id = session.to_string();
        }
        self
    }

    pub fn settings_path(&self) -> PathBuf {
        settings_path(&self.settings_dir, &self.session_id)
    }
}
