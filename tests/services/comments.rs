use roadmap::core::config::LimitsConfig;
use roadmap::core::db::initialize_roadmap_db;
use roadmap::core::error::RoadmapError;
use roadmap::core::store::Store;
use roadmap::services::comments::{NewComment, add_comment, comments_for_feature};
use roadmap::services::features::{FeatureId, NewFeature, add_feature, delete_feature};
use tempfile::tempdir;

fn setup() -> (tempfile::TempDir, Store, FeatureId) {
    let tmp = tempdir().unwrap();
    let store = Store::new(tmp.path().join(".roadmap"));
    initialize_roadmap_db(&store).unwrap();
    let id = add_feature(
        &store,
        &LimitsConfig::default(),
        &NewFeature {
            title: "Export".to_string(),
            description: "CSV export".to_string(),
        },
        "alice",
    )
    .unwrap()
    .id;
    (tmp, store, id)
}

fn comment(feature_id: FeatureId, text: &str) -> NewComment {
    NewComment {
        feature_id,
        text: text.to_string(),
    }
}

#[test]
fn test_comments_in_order() {
    let (_tmp, store, id) = setup();
    let limits = LimitsConfig::default();
    add_comment(&store, &limits, &comment(id, "first"), "alice").unwrap();
    let second = add_comment(&store, &limits, &comment(id, "second"), "bob").unwrap();
    assert_eq!(second.feature_id, id);
    assert_eq!(second.author, "bob");

    let listed = comments_for_feature(&store, id).unwrap();
    let texts: Vec<&str> = listed.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert!(comments_for_feature(&store, FeatureId(99)).unwrap().is_empty());
}

#[test]
fn test_comment_validation() {
    let (_tmp, store, id) = setup();
    let limits = LimitsConfig::default();

    let err = add_comment(&store, &limits, &comment(id, "  "), "alice").unwrap_err();
    assert!(matches!(err, RoadmapError::InputError(_)));
    let err = add_comment(&store, &limits, &comment(id, &"y".repeat(1001)), "alice").unwrap_err();
    assert!(matches!(err, RoadmapError::InputError(_)));
    assert!(add_comment(&store, &limits, &comment(id, &"y".repeat(1000)), "alice").is_ok());

    let err = add_comment(&store, &limits, &comment(FeatureId(42), "hi"), "alice").unwrap_err();
    assert!(matches!(err, RoadmapError::NotFound(_)));
}

#[test]
fn test_comments_removed_with_feature() {
    let (_tmp, store, id) = setup();
    add_comment(&store, &LimitsConfig::default(), &comment(id, "bye"), "alice").unwrap();
    delete_feature(&store, id, "admin").unwrap();
    assert!(comments_for_feature(&store, id).unwrap().is_empty());
}

#[test]
fn test_comment_json_uses_feature_id_key() {
    let (_tmp, store, id) = setup();
    let saved = add_comment(&store, &LimitsConfig::default(), &comment(id, "json"), "alice").unwrap();
    let value = serde_json::to_value(&saved).unwrap();
    assert_eq!(value["featureId"], serde_json::json!(id.0));
    assert_eq!(value["text"], "json");
}
