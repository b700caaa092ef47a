//! Roadmap configuration loaded from `<store>/roadmap.toml`.
//!
//! A missing file means defaults: no admins, admin-list permissions,
//! a 300 second decision cache, and the 100/1000 character limits.
//!
//! ```toml
//! admin_users = ["user:default/alice"]
//!
//! [permissions]
//! mode = "policy"
//! cache_ttl_secs = 300
//!
//! [limits]
//! max_title_len = 100
//! max_comment_len = 1000
//!
//! [store]
//! busy_timeout_secs = 5
//! ```

use crate::core::error::RoadmapError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RoadmapConfig {
    /// Users granted every roadmap permission regardless of mode.
    pub admin_users: Vec<String>,
    pub permissions: PermissionsConfig,
    pub limits: LimitsConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionMode {
    /// Deny everything except users listed in `admin_users`.
    #[default]
    AdminList,
    /// Delegate non-admin decisions to an external policy engine.
    Policy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub mode: PermissionMode,
    /// Seconds a decision stays cached per (user, permission). 0 disables caching.
    pub cache_ttl_secs: u64,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            mode: PermissionMode::AdminList,
            cache_ttl_secs: 300,
        }
    }
}

impl PermissionsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Length limits in characters. A limit of 0 disables that check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_title_len: usize,
    pub max_comment_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_title_len: 100,
            max_comment_len: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub busy_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_secs: 5,
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

pub fn load_config(config_path: &Path) -> Result<RoadmapConfig, RoadmapError> {
    if !config_path.exists() {
        return Ok(RoadmapConfig::default());
    }
    let content = fs::read_to_string(config_path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<RoadmapConfig, RoadmapError> {
    toml::from_str(content).map_err(|e| RoadmapError::ConfigError(e.to_string()))
}
