//! The roadmap application context.
//!
//! Bundles the store, configuration, vote ledger and permission gate, and
//! exposes every operation with the identity and permission checks applied.
//! Both the CLI and the request router go through here.

use crate::core::config::{RoadmapConfig, load_config};
use crate::core::db::initialize_roadmap_db;
use crate::core::error::RoadmapError;
use crate::core::schemas;
use crate::core::store::Store;
use crate::services::comments::{self, Comment, NewComment};
use crate::services::features::{self, BoardColumn, Feature, FeatureId, FeatureStatus, NewFeature};
use crate::services::permissions::{Permission, PermissionGate, PolicyEngine};
use crate::services::votes::{VoteLedger, VoteToggle};
use std::collections::BTreeMap;
use std::path::Path;

pub struct RoadmapApp {
    store: Store,
    config: RoadmapConfig,
    ledger: VoteLedger,
    gate: PermissionGate,
}

impl RoadmapApp {
    /// Opens (and initializes if needed) the store at `root`, reading
    /// `roadmap.toml` from the same directory.
    pub fn open(root: &Path, engine: Option<Box<dyn PolicyEngine>>) -> Result<Self, RoadmapError> {
        let config = load_config(&root.join(schemas::ROADMAP_CONFIG_NAME))?;
        Self::with_config(root, config, engine)
    }

    pub fn with_config(
        root: &Path,
        config: RoadmapConfig,
        engine: Option<Box<dyn PolicyEngine>>,
    ) -> Result<Self, RoadmapError> {
        let gate = PermissionGate::from_config(&config, engine)?;
        let store = Store::new(root).with_busy_timeout(config.store.busy_timeout());
        initialize_roadmap_db(&store)?;
        let ledger = VoteLedger::new(&store);
        Ok(Self {
            store,
            config,
            ledger,
            gate,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &RoadmapConfig {
        &self.config
    }

    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    // --- features ---

    pub fn suggest_feature(&self, caller: Option<&str>, feature: &NewFeature) -> Result<Feature, RoadmapError> {
        let author = self.gate.identify(caller)?;
        features::add_feature(&self.store, &self.config.limits, feature, &author)
    }

    pub fn features(&self) -> Result<Vec<Feature>, RoadmapError> {
        features::list_features(&self.store)
    }

    pub fn feature(&self, id: FeatureId) -> Result<Feature, RoadmapError> {
        features::get_feature(&self.store, id)
    }

    pub fn board(&self) -> Result<Vec<BoardColumn>, RoadmapError> {
        Ok(features::board(features::list_features(&self.store)?))
    }

    pub fn set_feature_status(
        &self,
        caller: Option<&str>,
        id: FeatureId,
        status: FeatureStatus,
    ) -> Result<Feature, RoadmapError> {
        let user = self.gate.identify(caller)?;
        self.gate.require(&user, Permission::Admin)?;
        features::update_feature_status(&self.store, id, status, &user)
    }

    pub fn delete_feature(&self, caller: Option<&str>, id: FeatureId) -> Result<(), RoadmapError> {
        let user = self.gate.identify(caller)?;
        self.gate.require(&user, Permission::Admin)?;
        features::delete_feature(&self.store, id, &user)
    }

    // --- comments ---

    pub fn add_comment(&self, caller: Option<&str>, comment: &NewComment) -> Result<Comment, RoadmapError> {
        let author = self.gate.identify(caller)?;
        comments::add_comment(&self.store, &self.config.limits, comment, &author)
    }

    pub fn comments(&self, feature_id: FeatureId) -> Result<Vec<Comment>, RoadmapError> {
        comments::comments_for_feature(&self.store, feature_id)
    }

    // --- votes ---

    pub fn toggle_vote(&self, caller: Option<&str>, feature_id: FeatureId) -> Result<VoteToggle, RoadmapError> {
        let voter = self.gate.identify(caller)?;
        self.ledger.toggle_vote(feature_id, &voter)
    }

    pub fn vote_count(&self, feature_id: FeatureId) -> Result<i64, RoadmapError> {
        self.ledger.get_vote_count(feature_id)
    }

    pub fn vote_counts(&self, feature_ids: &[FeatureId]) -> Result<BTreeMap<FeatureId, i64>, RoadmapError> {
        self.ledger.get_vote_counts(feature_ids)
    }

    pub fn has_voted(&self, caller: Option<&str>, feature_id: FeatureId) -> Result<bool, RoadmapError> {
        let voter = self.gate.identify(caller)?;
        self.ledger.has_voted(feature_id, &voter)
    }

    pub fn has_voted_batch(
        &self,
        caller: Option<&str>,
        feature_ids: &[FeatureId],
    ) -> Result<BTreeMap<FeatureId, bool>, RoadmapError> {
        let voter = self.gate.identify(caller)?;
        self.ledger.has_voted_batch(feature_ids, &voter)
    }

    // --- permissions ---

    pub fn check_admin(&self, caller: Option<&str>) -> Result<bool, RoadmapError> {
        let user = self.gate.identify(caller)?;
        self.gate.is_admin(&user)
    }
}
