use roadmap::core::config::LimitsConfig;
use roadmap::core::db::initialize_roadmap_db;
use roadmap::core::error::RoadmapError;
use roadmap::core::store::Store;
use roadmap::services::features::{
    FeatureId, FeatureStatus, NewFeature, add_feature, board, delete_feature, get_feature,
    list_features, update_feature_status,
};
use roadmap::services::votes::VoteLedger;
use tempfile::tempdir;

fn setup() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::new(tmp.path().join(".roadmap"));
    initialize_roadmap_db(&store).unwrap();
    (tmp, store)
}

fn suggestion(title: &str, description: &str) -> NewFeature {
    NewFeature {
        title: title.to_string(),
        description: description.to_string(),
    }
}

#[test]
fn test_feature_lifecycle() {
    let (_tmp, store) = setup();
    let limits = LimitsConfig::default();

    let created = add_feature(&store, &limits, &suggestion("  Dark mode ", "Easier on the eyes"), "alice").unwrap();
    assert_eq!(created.id, FeatureId(1));
    assert_eq!(created.title, "Dark mode");
    assert_eq!(created.status, FeatureStatus::Suggested);
    assert_eq!(created.votes, 0);
    assert_eq!(created.author, "alice");

    let updated = update_feature_status(&store, created.id, FeatureStatus::InProgress, "admin").unwrap();
    assert_eq!(updated.status, FeatureStatus::InProgress);
    assert_eq!(get_feature(&store, created.id).unwrap().status, FeatureStatus::InProgress);

    delete_feature(&store, created.id, "admin").unwrap();
    assert!(matches!(get_feature(&store, created.id), Err(RoadmapError::NotFound(_))));
    assert!(list_features(&store).unwrap().is_empty());
}

#[test]
fn test_validation() {
    let (_tmp, store) = setup();
    let limits = LimitsConfig::default();

    for bad in [suggestion("", "d"), suggestion("t", "   "), suggestion(&"x".repeat(101), "d")] {
        let err = add_feature(&store, &limits, &bad, "alice").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
    assert!(add_feature(&store, &limits, &suggestion(&"x".repeat(100), "d"), "alice").is_ok());

    let unlimited = LimitsConfig {
        max_title_len: 0,
        ..LimitsConfig::default()
    };
    assert!(add_feature(&store, &unlimited, &suggestion(&"x".repeat(500), "d"), "alice").is_ok());
    assert_eq!(list_features(&store).unwrap().len(), 2);
}

#[test]
fn test_missing_features_are_not_found() {
    let (_tmp, store) = setup();
    assert!(matches!(
        update_feature_status(&store, FeatureId(3), FeatureStatus::Completed, "admin"),
        Err(RoadmapError::NotFound(_))
    ));
    assert!(matches!(
        delete_feature(&store, FeatureId(3), "admin"),
        Err(RoadmapError::NotFound(_))
    ));
}

#[test]
fn test_board_orders_by_votes() {
    let (_tmp, store) = setup();
    let limits = LimitsConfig::default();
    let ledger = VoteLedger::new(&store);
    let a = add_feature(&store, &limits, &suggestion("A", "d"), "alice").unwrap().id;
    let b = add_feature(&store, &limits, &suggestion("B", "d"), "alice").unwrap().id;
    let c = add_feature(&store, &limits, &suggestion("C", "d"), "alice").unwrap().id;
    ledger.toggle_vote(b, "u1").unwrap();
    ledger.toggle_vote(b, "u2").unwrap();
    ledger.toggle_vote(a, "u1").unwrap();
    update_feature_status(&store, c, FeatureStatus::Planned, "admin").unwrap();

    let columns = board(list_features(&store).unwrap());
    assert_eq!(columns.len(), FeatureStatus::ALL.len());
    assert_eq!(columns[0].status, FeatureStatus::Suggested);
    let ids: Vec<FeatureId> = columns[0].features.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![b, a]);
    assert_eq!(columns[1].features.len(), 1);
    assert_eq!(columns[1].features[0].id, c);
}
