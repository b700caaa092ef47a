//! Permission gate.
//!
//! Identity and policy decisions belong to the host; this module only decides
//! *which* authority answers. The choice is made once, at construction:
//! - admin list: configured admins are allowed, everyone else is denied;
//! - policy: configured admins are allowed, everyone else is asked of a
//!   [`PolicyEngine`].
//!
//! Decisions are cached per (user, permission) for the configured TTL.

use crate::core::config::{PermissionMode, RoadmapConfig};
use crate::core::error::RoadmapError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Change feature status, delete features.
    Admin,
    /// Submit new suggestions.
    Create,
}

impl Permission {
    pub const ALL: [Permission; 2] = [Permission::Admin, Permission::Create];

    pub fn name(&self) -> &'static str {
        match self {
            Permission::Admin => "roadmap.admin",
            Permission::Create => "roadmap.create",
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Permission::Admin => "update",
            Permission::Create => "create",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// External policy service consulted in [`PermissionMode::Policy`].
pub trait PolicyEngine: Send + Sync {
    fn authorize(&self, user: &str, permission: Permission) -> Result<Decision, RoadmapError>;
}

enum Authority {
    AdminList,
    Delegated(Box<dyn PolicyEngine>),
}

pub struct PermissionGate {
    admin_users: HashSet<String>,
    authority: Authority,
    cache_ttl: Duration,
    cache: Mutex<HashMap<(String, Permission), (bool, Instant)>>,
}

impl PermissionGate {
    pub fn admin_list(admin_users: impl IntoIterator<Item = String>, cache_ttl: Duration) -> Self {
        Self::build(admin_users, Authority::AdminList, cache_ttl)
    }

    pub fn delegated(
        admin_users: impl IntoIterator<Item = String>,
        engine: Box<dyn PolicyEngine>,
        cache_ttl: Duration,
    ) -> Self {
        Self::build(admin_users, Authority::Delegated(engine), cache_ttl)
    }

    /// Builds the gate the configuration asks for. Policy mode without an
    /// engine is rejected here rather than failing on every request.
    pub fn from_config(
        config: &RoadmapConfig,
        engine: Option<Box<dyn PolicyEngine>>,
    ) -> Result<Self, RoadmapError> {
        let admins = config.admin_users.iter().cloned();
        let ttl = config.permissions.cache_ttl();
        match (config.permissions.mode, engine) {
            (PermissionMode::AdminList, _) => Ok(Self::admin_list(admins, ttl)),
            (PermissionMode::Policy, Some(engine)) => Ok(Self::delegated(admins, engine, ttl)),
            (PermissionMode::Policy, None) => Err(RoadmapError::ConfigError(
                "permissions.mode = \"policy\" requires a policy engine".to_string(),
            )),
        }
    }

    fn build(
        admin_users: impl IntoIterator<Item = String>,
        authority: Authority,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            admin_users: admin_users.into_iter().collect(),
            authority,
            cache_ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> PermissionMode {
        match self.authority {
            Authority::AdminList => PermissionMode::AdminList,
            Authority::Delegated(_) => PermissionMode::Policy,
        }
    }

    /// Resolves the caller's user reference; a missing or blank one is unauthenticated.
    pub fn identify(&self, caller: Option<&str>) -> Result<String, RoadmapError> {
        match caller.map(str::trim) {
            Some(user) if !user.is_empty() => Ok(user.to_string()),
            _ => Err(RoadmapError::Unauthenticated(
                "Unauthorized access".to_string(),
            )),
        }
    }

    pub fn check(&self, user: &str, permission: Permission) -> Result<bool, RoadmapError> {
        if let Some(allowed) = self.cached(user, permission) {
            return Ok(allowed);
        }

        let allowed = if self.admin_users.contains(user) {
            true
        } else {
            match &self.authority {
                Authority::AdminList => false,
                Authority::Delegated(engine) => match engine.authorize(user, permission) {
                    Ok(decision) => decision == Decision::Allow,
                    Err(e) => {
                        // Not cached, so the next request asks again.
                        eprintln!(
                            "roadmap: policy engine failed for {} on {}: {}",
                            user,
                            permission.name(),
                            e
                        );
                        return Err(RoadmapError::NotAllowed(
                            "Permission check failed".to_string(),
                        ));
                    }
                },
            }
        };

        self.remember(user, permission, allowed);
        Ok(allowed)
    }

    pub fn is_admin(&self, user: &str) -> Result<bool, RoadmapError> {
        self.check(user, Permission::Admin)
    }

    /// Like [`check`](Self::check) but a denial becomes `NotAllowed`.
    pub fn require(&self, user: &str, permission: Permission) -> Result<(), RoadmapError> {
        if self.check(user, permission)? {
            Ok(())
        } else {
            Err(RoadmapError::NotAllowed(format!(
                "{} lacks permission {}",
                user,
                permission.name()
            )))
        }
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }

    fn cached(&self, user: &str, permission: Permission) -> Option<bool> {
        if self.cache_ttl.is_zero() {
            return None;
        }
        let cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        match cache.get(&(user.to_string(), permission)) {
            Some((allowed, at)) if at.elapsed() < self.cache_ttl => Some(*allowed),
            _ => None,
        }
    }

    fn remember(&self, user: &str, permission: Permission, allowed: bool) {
        if self.cache_ttl.is_zero() {
            return;
        }
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        cache.insert((user.to_string(), permission), (allowed, Instant::now()));
    }
}
