use roadmap::core::config::LimitsConfig;
use roadmap::core::db::initialize_roadmap_db;
use roadmap::core::error::RoadmapError;
use roadmap::core::store::Store;
use roadmap::services::features::{FeatureId, NewFeature, add_feature, delete_feature, get_feature};
use roadmap::services::votes::{VoteLedger, VoteToggle};
use rusqlite::Connection;
use tempfile::tempdir;

fn setup() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::new(tmp.path().join(".roadmap"));
    initialize_roadmap_db(&store).unwrap();
    (tmp, store)
}

fn feature(store: &Store, title: &str) -> FeatureId {
    add_feature(
        store,
        &LimitsConfig::default(),
        &NewFeature {
            title: title.to_string(),
            description: "details".to_string(),
        },
        "user:default/author",
    )
    .unwrap()
    .id
}

fn vote_rows(store: &Store, id: FeatureId) -> i64 {
    let conn = Connection::open(store.db_path()).unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM votes WHERE feature_id = ?1",
        [id.0],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn test_toggle_lifecycle() {
    let (_tmp, store) = setup();
    let ledger = VoteLedger::new(&store);
    let id = feature(&store, "Dark mode");

    assert_eq!(
        ledger.toggle_vote(id, "alice").unwrap(),
        VoteToggle { vote_added: true, vote_count: 1 }
    );
    assert_eq!(
        ledger.toggle_vote(id, "bob").unwrap(),
        VoteToggle { vote_added: true, vote_count: 2 }
    );
    assert_eq!(
        ledger.toggle_vote(id, "alice").unwrap(),
        VoteToggle { vote_added: false, vote_count: 1 }
    );

    assert!(!ledger.has_voted(id, "alice").unwrap());
    assert!(ledger.has_voted(id, "bob").unwrap());
    assert_eq!(ledger.get_vote_count(id).unwrap(), 1);
    assert_eq!(get_feature(&store, id).unwrap().votes, 1);
    assert_eq!(vote_rows(&store, id), 1);
}

#[test]
fn test_toggle_parity() {
    let (_tmp, store) = setup();
    let ledger = VoteLedger::new(&store);
    let id = feature(&store, "Parity");

    for n in 1..=7 {
        let out = ledger.toggle_vote(id, "carol").unwrap();
        assert_eq!(out.vote_added, n % 2 == 1);
        assert_eq!(ledger.has_voted(id, "carol").unwrap(), n % 2 == 1);
    }
    assert_eq!(ledger.get_vote_count(id).unwrap(), 1);
    assert!(ledger.audit_counters().unwrap().is_empty());
}

#[test]
fn test_toggle_missing_feature_writes_nothing() {
    let (_tmp, store) = setup();
    let ledger = VoteLedger::new(&store);

    let err = ledger.toggle_vote(FeatureId(999), "alice").unwrap_err();
    assert!(matches!(err, RoadmapError::NotFound(_)));
    assert_eq!(err.status_code(), 404);
    assert_eq!(vote_rows(&store, FeatureId(999)), 0);
    assert!(!ledger.has_voted(FeatureId(999), "alice").unwrap());
}

#[test]
fn test_counts_batch() {
    let (_tmp, store) = setup();
    let ledger = VoteLedger::new(&store);
    let a = feature(&store, "A");
    let b = feature(&store, "B");
    for voter in ["u1", "u2", "u3"] {
        ledger.toggle_vote(a, voter).unwrap();
    }
    ledger.toggle_vote(b, "u1").unwrap();

    assert!(ledger.get_vote_counts(&[]).unwrap().is_empty());

    let counts = ledger.get_vote_counts(&[a, b, FeatureId(404), a]).unwrap();
    assert_eq!(counts.len(), 3);
    assert_eq!(counts[&a], 3);
    assert_eq!(counts[&b], 1);
    assert_eq!(counts[&FeatureId(404)], 0);
    assert_eq!(ledger.get_vote_count(FeatureId(404)).unwrap(), 0);
}

#[test]
fn test_has_voted_batch() {
    let (_tmp, store) = setup();
    let ledger = VoteLedger::new(&store);
    let a = feature(&store, "A");
    let b = feature(&store, "B");
    ledger.toggle_vote(b, "dave").unwrap();

    let voted = ledger.has_voted_batch(&[a, b, FeatureId(77)], "dave").unwrap();
    assert_eq!(voted.len(), 3);
    assert!(!voted[&a]);
    assert!(voted[&b]);
    assert!(!voted[&FeatureId(77)]);

    assert!(ledger.has_voted_batch(&[], "dave").unwrap().is_empty());
}

#[test]
fn test_delete_cascades_votes() {
    let (_tmp, store) = setup();
    let ledger = VoteLedger::new(&store);
    let id = feature(&store, "Doomed");
    ledger.toggle_vote(id, "alice").unwrap();
    ledger.toggle_vote(id, "bob").unwrap();

    delete_feature(&store, id, "admin").unwrap();
    assert_eq!(vote_rows(&store, id), 0);
    assert_eq!(ledger.get_vote_count(id).unwrap(), 0);
    assert!(matches!(
        ledger.toggle_vote(id, "alice"),
        Err(RoadmapError::NotFound(_))
    ));
}

#[test]
fn test_audit_reports_drift() {
    let (_tmp, store) = setup();
    let ledger = VoteLedger::new(&store);
    let id = feature(&store, "Drift");
    ledger.toggle_vote(id, "alice").unwrap();
    assert!(ledger.audit_counters().unwrap().is_empty());

    let conn = Connection::open(store.db_path()).unwrap();
    conn.execute("UPDATE features SET votes = 5 WHERE id = ?1", [id.0])
        .unwrap();
    assert_eq!(ledger.audit_counters().unwrap(), vec![(id, 5, 1)]);
}

#[test]
fn test_duplicate_vote_row_is_rejected() {
    let (_tmp, store) = setup();
    let ledger = VoteLedger::new(&store);
    let id = feature(&store, "Unique");
    ledger.toggle_vote(id, "alice").unwrap();

    let conn = Connection::open(store.db_path()).unwrap();
    let err = conn
        .execute(
            "INSERT INTO votes(feature_id, voter, created_at, updated_at) VALUES(?1, 'alice', 'x', 'x')",
            [id.0],
        )
        .unwrap_err();
    assert!(RoadmapError::from(err).is_constraint_violation());
    assert_eq!(vote_rows(&store, id), 1);
}

#[test]
fn test_toggle_is_audited() {
    let (_tmp, store) = setup();
    let ledger = VoteLedger::new(&store);
    let id = feature(&store, "Audited");
    ledger.toggle_vote(id, "alice").unwrap();
    let _ = ledger.toggle_vote(FeatureId(999), "alice");

    let events = roadmap::core::broker::read_events(&store.events_path()).unwrap();
    let toggles: Vec<_> = events.iter().filter(|e| e.op == "votes.toggle").collect();
    assert_eq!(toggles.len(), 2);
    assert_eq!(toggles[0].status, "success");
    assert_eq!(toggles[0].actor, "alice");
    assert_ne!(toggles[1].status, "success");
}
