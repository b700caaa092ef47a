use roadmap::core::config::{PermissionMode, RoadmapConfig};
use roadmap::core::error::RoadmapError;
use roadmap::services::permissions::{Decision, Permission, PermissionGate, PolicyEngine};
use std::collections::HashSet;
use std::time::Duration;

struct StaticPolicy {
    allowed: HashSet<(String, Permission)>,
}

impl PolicyEngine for StaticPolicy {
    fn authorize(&self, user: &str, permission: Permission) -> Result<Decision, RoadmapError> {
        if self.allowed.contains(&(user.to_string(), permission)) {
            Ok(Decision::Allow)
        } else {
            Ok(Decision::Deny)
        }
    }
}

struct BrokenPolicy;

impl PolicyEngine for BrokenPolicy {
    fn authorize(&self, _user: &str, _permission: Permission) -> Result<Decision, RoadmapError> {
        Err(RoadmapError::ConfigError("policy backend unreachable".to_string()))
    }
}

fn policy_config() -> RoadmapConfig {
    let mut config = RoadmapConfig::default();
    config.admin_users = vec!["user:default/root".to_string()];
    config.permissions.mode = PermissionMode::Policy;
    config
}

#[test]
fn test_admin_list_mode() {
    let gate = PermissionGate::admin_list(vec!["user:default/root".to_string()], Duration::from_secs(60));
    assert_eq!(gate.mode(), PermissionMode::AdminList);
    assert!(gate.is_admin("user:default/root").unwrap());
    assert!(!gate.is_admin("user:default/alice").unwrap());
    assert!(gate.require("user:default/root", Permission::Admin).is_ok());

    let err = gate.require("user:default/alice", Permission::Admin).unwrap_err();
    assert!(matches!(err, RoadmapError::NotAllowed(_)));
    assert_eq!(err.status_code(), 403);
}

#[test]
fn test_identify() {
    let gate = PermissionGate::admin_list(Vec::new(), Duration::ZERO);
    assert_eq!(gate.identify(Some(" user:default/alice ")).unwrap(), "user:default/alice");
    for missing in [None, Some(""), Some("   ")] {
        let err = gate.identify(missing).unwrap_err();
        assert!(matches!(err, RoadmapError::Unauthenticated(_)));
        assert_eq!(err.status_code(), 401);
    }
}

#[test]
fn test_policy_mode_delegates_non_admins() {
    let engine = StaticPolicy {
        allowed: [("user:default/pm".to_string(), Permission::Admin)].into_iter().collect(),
    };
    let gate = PermissionGate::from_config(&policy_config(), Some(Box::new(engine))).unwrap();
    assert_eq!(gate.mode(), PermissionMode::Policy);
    assert!(gate.is_admin("user:default/root").unwrap());
    assert!(gate.is_admin("user:default/pm").unwrap());
    assert!(!gate.is_admin("user:default/alice").unwrap());
    assert!(!gate.check("user:default/pm", Permission::Create).unwrap());
}

#[test]
fn test_policy_mode_requires_engine() {
    let err = PermissionGate::from_config(&policy_config(), None).err().unwrap();
    assert!(matches!(err, RoadmapError::ConfigError(_)));

    let gate = PermissionGate::from_config(&RoadmapConfig::default(), None).unwrap();
    assert_eq!(gate.mode(), PermissionMode::AdminList);
}

#[test]
fn test_engine_failure_denies() {
    let gate = PermissionGate::from_config(&policy_config(), Some(Box::new(BrokenPolicy))).unwrap();
    let err = gate.check("user:default/alice", Permission::Admin).unwrap_err();
    assert!(matches!(err, RoadmapError::NotAllowed(ref m) if m == "Permission check failed"));
    assert!(gate.check("user:default/alice", Permission::Admin).is_err());
    // configured admins never reach the engine
    assert!(gate.is_admin("user:default/root").unwrap());
}
