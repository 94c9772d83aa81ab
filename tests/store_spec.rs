use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use campus_connect::auth::{AuthSignal, AuthState};
use campus_connect::client::ClientError;
use campus_connect::db::Database;
use campus_connect::notify::{NotificationKind, RecordingSink, Severity};
use campus_connect::store::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    id: String,
    title: String,
}

impl Record for Note {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

fn note(title: &str) -> Note {
    Note {
        id: String::new(),
        title: title.to_string(),
    }
}

fn seeded(id: &str, title: &str) -> Note {
    Note {
        id: id.to_string(),
        title: title.to_string(),
    }
}

fn notes(ids: IdScheme) -> CollectionDef<Note> {
    CollectionDef {
        name: "notes",
        seed: vec![seeded("N001", "Seeded")],
        ids,
    }
}

fn sequential() -> IdScheme {
    IdScheme::Sequential {
        prefix: "N",
        width: 3,
    }
}

fn setup() -> (Store<Note>, Database, RecordingSink) {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let sink = RecordingSink::new();
    let store = local_store(&db, &sink);
    (store, db, sink)
}

fn local_store(db: &Database, sink: &RecordingSink) -> Store<Note> {
    Store::new(
        notes(sequential()),
        Arc::new(LocalSource::new(Arc::new(db.clone()), "notes")),
        Arc::new(sink.clone()),
    )
}

fn with_source(source: impl Source<Note> + 'static) -> (Store<Note>, RecordingSink) {
    let sink = RecordingSink::new();
    let store = Store::new(notes(sequential()), Arc::new(source), Arc::new(sink.clone()));
    (store, sink)
}

/// First load is slow and returns `slow`; every later load returns `fast` at once.
struct ScriptedSource {
    calls: Arc<AtomicUsize>,
    delay: Duration,
    slow: Vec<Note>,
    fast: Vec<Note>,
}

impl ScriptedSource {
    fn new(delay: Duration, slow: Vec<Note>, fast: Vec<Note>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            delay,
            slow,
            fast,
        }
    }
}

#[async_trait]
impl Source<Note> for ScriptedSource {
    async fn load(&self) -> Result<Option<Vec<Note>>, SourceError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(self.delay).await;
            Ok(Some(self.slow.clone()))
        } else {
            Ok(Some(self.fast.clone()))
        }
    }

    fn persist(&self, _records: &[Note]) -> Result<(), SourceError> {
        Ok(())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }
}

/// Every load fails; reports itself as the given kind of source.
struct FailingSource(SourceKind);

#[async_trait]
impl Source<Note> for FailingSource {
    async fn load(&self) -> Result<Option<Vec<Note>>, SourceError> {
        Err(SourceError::Storage("disk unavailable".to_string()))
    }

    fn persist(&self, _records: &[Note]) -> Result<(), SourceError> {
        Ok(())
    }

    fn kind(&self) -> SourceKind {
        self.0
    }
}

async fn wait_for_state(store: &Store<Note>, state: HydrationState) {
    for _ in 0..200 {
        if store.state() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("store never reached {:?}, stuck in {:?}", state, store.state());
}

fn titles(store: &Store<Note>) -> Vec<String> {
    store.records().into_iter().map(|n| n.title).collect()
}

mod hydration {
    use super::*;

    #[tokio::test]
    async fn starts_uninitialized_and_loading() {
        let (store, _db, _sink) = setup();

        assert_eq!(store.state(), HydrationState::Uninitialized);
        assert!(store.is_loading());
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_seed_when_nothing_is_persisted() {
        let (store, _db, sink) = setup();

        let outcome = store.hydrate(AuthState::Authenticated).await;

        assert_eq!(outcome, Hydration::Ready { count: 1 });
        assert_eq!(store.state(), HydrationState::Ready);
        assert!(!store.is_loading());
        assert_eq!(store.records(), vec![seeded("N001", "Seeded")]);

        let loaded = sink.all();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].kind, NotificationKind::Loaded);
        assert_eq!(loaded[0].severity, Severity::Info);
        assert_eq!(loaded[0].title, "Loaded notes");
        assert_eq!(loaded[0].description.as_deref(), Some("1 records"));
    }

    #[tokio::test]
    async fn reads_the_persisted_snapshot() {
        let (store, db, _sink) = setup();
        let persisted = vec![seeded("N007", "Kept"), seeded("N009", "Also kept")];
        db.put(
            &snapshot_key("notes"),
            &serde_json::to_string(&persisted).expect("Failed to encode"),
        )
        .expect("Failed to put");

        let outcome = store.hydrate(AuthState::Authenticated).await;

        assert_eq!(outcome, Hydration::Ready { count: 2 });
        assert_eq!(store.records(), persisted);
    }

    #[tokio::test]
    async fn an_empty_snapshot_is_ready_not_seeded() {
        let (store, db, _sink) = setup();
        db.put(&snapshot_key("notes"), "[]").expect("Failed to put");

        let outcome = store.hydrate(AuthState::Authenticated).await;

        assert_eq!(outcome, Hydration::Ready { count: 0 });
        assert_eq!(store.state(), HydrationState::Ready);
    }

    #[tokio::test]
    async fn skips_when_unauthenticated() {
        let (store, _db, sink) = setup();

        let outcome = store.hydrate(AuthState::Unauthenticated).await;

        assert_eq!(outcome, Hydration::Skipped);
        assert_eq!(store.state(), HydrationState::Empty);
        assert!(store.records().is_empty());
        assert!(sink.all().is_empty());
    }

    #[tokio::test]
    async fn skips_while_mfa_is_pending() {
        let source = ScriptedSource::new(Duration::ZERO, vec![note("never")], vec![]);
        let calls = source.calls.clone();
        let (store, _sink) = with_source(source);

        let outcome = store.hydrate(AuthState::MfaPending).await;

        assert_eq!(outcome, Hydration::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn signing_out_clears_the_collection() {
        let (store, _db, _sink) = setup();
        store.hydrate(AuthState::Authenticated).await;
        assert_eq!(store.len(), 1);

        store.hydrate(AuthState::Unauthenticated).await;

        assert!(store.is_empty());
        assert_eq!(store.state(), HydrationState::Empty);
    }

    #[tokio::test]
    async fn failure_leaves_store_empty_and_notifies() {
        let (store, sink) = with_source(FailingSource(SourceKind::Local));

        let outcome = store.hydrate(AuthState::Authenticated).await;

        assert_eq!(outcome, Hydration::Failed);
        assert_eq!(store.state(), HydrationState::Empty);
        assert!(store.records().is_empty());

        let failures = sink.of_kind(NotificationKind::Failed);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].severity, Severity::Destructive);
        assert_eq!(failures[0].title, "Could not load notes");
        assert!(failures[0]
            .description
            .as_deref()
            .is_some_and(|d| d.contains("disk unavailable")));
    }

    #[tokio::test]
    async fn a_corrupt_snapshot_is_a_failed_load() {
        let (store, db, sink) = setup();
        db.put(&snapshot_key("notes"), "not json").expect("Failed to put");

        let outcome = store.hydrate(AuthState::Authenticated).await;

        assert_eq!(outcome, Hydration::Failed);
        assert_eq!(store.state(), HydrationState::Empty);
        assert_eq!(sink.of_kind(NotificationKind::Failed).len(), 1);
    }

    #[tokio::test]
    async fn a_failed_local_load_blocks_writes_and_keeps_the_snapshot() {
        let (store, db, sink) = setup();
        db.put(&snapshot_key("notes"), "not json").expect("Failed to put");
        store.hydrate(AuthState::Authenticated).await;

        let result = store
            .mutate("Add note", |c| Ok(c.insert(note("After failure")).clone()))
            .await;

        assert!(matches!(result, Err(StoreError::NotReady { collection: "notes" })));
        assert!(store.is_empty());
        assert_eq!(
            db.get(&snapshot_key("notes")).expect("Query failed"),
            Some("not json".to_string())
        );
        assert_eq!(sink.of_kind(NotificationKind::Blocked).len(), 1);
    }

    #[tokio::test]
    async fn a_failed_remote_load_still_accepts_writes() {
        let (store, sink) = with_source(FailingSource(SourceKind::Remote));
        store.hydrate(AuthState::Authenticated).await;

        let added = store
            .mutate("Add note", |c| Ok(c.insert(note("After failure")).clone()))
            .await
            .expect("Mutation failed");

        assert_eq!(added.id, "N001");
        assert_eq!(store.len(), 1);
        assert_eq!(sink.of_kind(NotificationKind::Success).len(), 1);
    }
}

mod cancellation {
    use super::*;

    #[tokio::test]
    async fn the_last_hydration_wins() {
        let source = ScriptedSource::new(
            Duration::from_millis(200),
            vec![seeded("A1", "stale")],
            vec![seeded("B1", "fresh")],
        );
        let (store, sink) = with_source(source);

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.hydrate(AuthState::Authenticated).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = store.hydrate(AuthState::Authenticated).await;
        let first = first.await.expect("hydration task panicked");

        assert_eq!(first, Hydration::Cancelled);
        assert_eq!(second, Hydration::Ready { count: 1 });
        assert_eq!(titles(&store), vec!["fresh"]);
        assert_eq!(sink.of_kind(NotificationKind::Loaded).len(), 1);
        assert!(sink.of_kind(NotificationKind::Failed).is_empty());
    }

    #[tokio::test]
    async fn signing_out_discards_an_in_flight_load() {
        let source = ScriptedSource::new(
            Duration::from_millis(200),
            vec![seeded("A1", "private")],
            vec![],
        );
        let (store, sink) = with_source(source);

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.hydrate(AuthState::Authenticated).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.state(), HydrationState::Loading);

        let skipped = store.hydrate(AuthState::Unauthenticated).await;
        let pending = pending.await.expect("hydration task panicked");

        assert_eq!(skipped, Hydration::Skipped);
        assert_eq!(pending, Hydration::Cancelled);
        assert_eq!(store.state(), HydrationState::Empty);
        assert!(store.records().is_empty());
        assert!(sink.all().is_empty());
    }

    #[tokio::test]
    async fn cancel_discards_without_notifying() {
        let source = ScriptedSource::new(
            Duration::from_millis(200),
            vec![seeded("A1", "late")],
            vec![],
        );
        let (store, sink) = with_source(source);

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.hydrate(AuthState::Authenticated).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.cancel_hydration();

        assert_eq!(pending.await.expect("hydration task panicked"), Hydration::Cancelled);
        assert_eq!(store.state(), HydrationState::Uninitialized);
        assert!(store.records().is_empty());
        assert!(sink.all().is_empty());
    }

    #[tokio::test]
    async fn cancel_after_ready_keeps_the_collection() {
        let (store, _db, _sink) = setup();
        store.hydrate(AuthState::Authenticated).await;

        store.cancel_hydration();

        assert_eq!(store.state(), HydrationState::Ready);
        assert_eq!(store.len(), 1);
    }
}

mod following_auth {
    use super::*;

    #[tokio::test]
    async fn rehydrates_on_every_auth_change() {
        let (store, _db, _sink) = setup();
        let signal = AuthSignal::new(AuthState::Unauthenticated);

        let handle = store.follow(&signal);
        wait_for_state(&store, HydrationState::Empty).await;

        signal.set(AuthState::Authenticated);
        wait_for_state(&store, HydrationState::Ready).await;
        assert_eq!(titles(&store), vec!["Seeded"]);

        signal.set(AuthState::Unauthenticated);
        wait_for_state(&store, HydrationState::Empty).await;
        assert!(store.records().is_empty());

        handle.abort();
    }

    #[tokio::test]
    async fn quick_toggles_settle_on_the_latest_state() {
        let source = ScriptedSource::new(
            Duration::from_millis(200),
            vec![seeded("A1", "stale")],
            vec![seeded("B1", "fresh")],
        );
        let (store, sink) = with_source(source);
        let signal = AuthSignal::new(AuthState::Authenticated);

        let handle = store.follow(&signal);
        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.set(AuthState::Unauthenticated);
        signal.set(AuthState::Authenticated);

        wait_for_state(&store, HydrationState::Ready).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(titles(&store), vec!["fresh"]);
        assert!(sink.of_kind(NotificationKind::Failed).is_empty());
        handle.abort();
    }
}

mod mutations {
    use super::*;

    #[tokio::test]
    async fn persists_a_snapshot_that_rehydrates_identically() {
        let (store, db, sink) = setup();
        store.hydrate(AuthState::Authenticated).await;

        store
            .mutate("Add note", |c| Ok(c.insert(note("Second")).clone()))
            .await
            .expect("Mutation failed");
        store
            .mutate("Edit note", |c| {
                let n = c
                    .get_mut("N001")
                    .ok_or_else(|| StoreError::blocked("missing"))?;
                n.title = "Renamed".to_string();
                Ok(())
            })
            .await
            .expect("Mutation failed");

        let raw = db
            .get(&snapshot_key("notes"))
            .expect("Query failed")
            .expect("Snapshot missing");
        let persisted: Vec<Note> = serde_json::from_str(&raw).expect("Failed to decode");
        assert_eq!(persisted, store.records());

        let reopened = local_store(&db, &sink);
        reopened.hydrate(AuthState::Authenticated).await;
        assert_eq!(reopened.records(), store.records());
    }

    #[tokio::test]
    async fn success_is_announced_under_the_action_title() {
        let (store, _db, sink) = setup();
        store.hydrate(AuthState::Authenticated).await;
        sink.clear();

        store
            .mutate("Add note", |c| Ok(c.insert(note("x")).clone()))
            .await
            .expect("Mutation failed");

        let all = sink.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].kind, NotificationKind::Success);
        assert_eq!(all[0].severity, Severity::Info);
        assert_eq!(all[0].title, "Add note");
    }

    #[tokio::test]
    async fn concurrent_mutations_both_land() {
        let (store, _db, _sink) = setup();
        store.hydrate(AuthState::Authenticated).await;

        let (a, b) = tokio::join!(
            store.mutate("Add note", |c| Ok(c.insert(note("a")).clone())),
            store.mutate("Add note", |c| Ok(c.insert(note("b")).clone())),
        );
        let (a, b) = (a.expect("first add failed"), b.expect("second add failed"));

        assert_ne!(a.id, b.id);
        assert_eq!(store.len(), 3);
        assert!(store.get(&a.id).is_some());
        assert!(store.get(&b.id).is_some());
    }

    #[tokio::test]
    async fn concurrent_mutations_from_tasks_both_land() {
        let (store, _db, _sink) = setup();
        store.hydrate(AuthState::Authenticated).await;

        let tasks: Vec<_> = (0..10)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .mutate("Add note", move |c| {
                            Ok(c.insert(note(&format!("note {}", i))).clone())
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.expect("task panicked").expect("Mutation failed");
        }

        assert_eq!(store.len(), 11);
    }

    #[tokio::test]
    async fn get_is_idempotent() {
        let (store, _db, _sink) = setup();
        store.hydrate(AuthState::Authenticated).await;

        let first = store.get("N001");
        let second = store.get("N001");

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert!(store.get("N404").is_none());
    }

    #[tokio::test]
    async fn a_blocked_mutation_changes_nothing() {
        let (store, db, sink) = setup();
        store.hydrate(AuthState::Authenticated).await;
        let before = store.records();

        let result: Result<(), StoreError> = store
            .mutate("Add note", |c| {
                c.insert(note("half-done"));
                Err(StoreError::blocked("Titles must be unique"))
            })
            .await;

        assert!(result.as_ref().is_err_and(|e| e.is_blocked()));
        assert_eq!(store.records(), before);
        assert!(db.get(&snapshot_key("notes")).expect("Query failed").is_none());

        let blocked = sink.of_kind(NotificationKind::Blocked);
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].title, "Add note");
        assert_eq!(blocked[0].severity, Severity::Destructive);
        assert_eq!(blocked[0].description.as_deref(), Some("Titles must be unique"));
    }

    #[tokio::test]
    async fn a_blocked_mutation_does_not_consume_an_id() {
        let (store, _db, _sink) = setup();
        store.hydrate(AuthState::Authenticated).await;

        let _ = store
            .mutate("Add note", |c| -> Result<(), StoreError> {
                c.insert(note("discarded"));
                Err(StoreError::blocked("no"))
            })
            .await;
        let added = store
            .mutate("Add note", |c| Ok(c.insert(note("kept")).clone()))
            .await
            .expect("Mutation failed");

        assert_eq!(added.id, "N002");
    }

    #[tokio::test]
    async fn mutating_before_hydration_is_not_ready() {
        let (store, _db, sink) = setup();

        let result = store
            .mutate("Add note", |c| Ok(c.insert(note("early")).clone()))
            .await;

        assert!(matches!(result, Err(StoreError::NotReady { collection: "notes" })));
        assert!(store.records().is_empty());
        assert_eq!(sink.of_kind(NotificationKind::Blocked).len(), 1);
    }

    #[tokio::test]
    async fn a_signed_out_store_rejects_writes_and_keeps_the_snapshot() {
        let (store, db, sink) = setup();
        store.hydrate(AuthState::Authenticated).await;
        store
            .mutate("Add note", |c| Ok(c.insert(note("Second")).clone()))
            .await
            .expect("Mutation failed");
        let persisted = db.get(&snapshot_key("notes")).expect("Query failed");

        store.hydrate(AuthState::Unauthenticated).await;
        let result = store
            .mutate("Add note", |c| Ok(c.insert(note("While signed out")).clone()))
            .await;

        assert!(matches!(result, Err(StoreError::NotReady { collection: "notes" })));
        assert!(store.ensure_ready("Add note").is_err());
        assert_eq!(db.get(&snapshot_key("notes")).expect("Query failed"), persisted);
        assert_eq!(sink.of_kind(NotificationKind::Blocked).len(), 2);

        store.hydrate(AuthState::Authenticated).await;
        assert_eq!(titles(&store), vec!["Seeded", "Second"]);
        let added = store
            .mutate("Add note", |c| Ok(c.insert(note("Third")).clone()))
            .await
            .expect("Mutation failed");
        assert_eq!(added.id, "N003");
    }

    #[tokio::test]
    async fn signing_out_rejects_optimistic_inserts() {
        let (store, _db, sink) = setup();
        store.hydrate(AuthState::Authenticated).await;
        store.hydrate(AuthState::Unauthenticated).await;

        let result = store
            .insert_optimistic("Send note", note("nobody home"), |_| async { Ok(()) })
            .await;

        assert!(matches!(result, Err(StoreError::NotReady { .. })));
        assert!(store.is_empty());
        assert_eq!(sink.of_kind(NotificationKind::Blocked).len(), 1);
    }

    #[tokio::test]
    async fn update_is_silent() {
        let (store, _db, sink) = setup();
        store.hydrate(AuthState::Authenticated).await;
        sink.clear();

        store
            .update(|c| Ok(c.insert(note("quiet")).clone()))
            .await
            .expect("Update failed");
        let _ = store
            .update(|_| -> Result<(), StoreError> { Err(StoreError::blocked("no")) })
            .await;

        assert_eq!(store.len(), 2);
        assert!(sink.all().is_empty());
    }

    #[tokio::test]
    async fn reject_notifies_without_touching_state() {
        let (store, _db, sink) = setup();
        store.hydrate(AuthState::Authenticated).await;

        let e = store.reject("Add note", "Title is empty");

        assert!(e.is_blocked());
        assert_eq!(store.len(), 1);
        assert_eq!(sink.of_kind(NotificationKind::Blocked).len(), 1);
    }
}

mod identifiers {
    use super::*;

    #[tokio::test]
    async fn sequential_ids_are_distinct_and_increasing() {
        let (store, _db, _sink) = setup();
        store.hydrate(AuthState::Authenticated).await;

        let mut ids = Vec::new();
        for i in 0..50 {
            let added = store
                .mutate("Add note", |c| Ok(c.insert(note(&format!("n{}", i))).clone()))
                .await
                .expect("Mutation failed");
            ids.push(added.id);
        }

        assert_eq!(ids.first().map(String::as_str), Some("N002"));
        assert_eq!(ids.last().map(String::as_str), Some("N051"));
        let numbers: Vec<u32> = ids
            .iter()
            .map(|id| id.trim_start_matches('N').parse().expect("numeric suffix"))
            .collect();
        assert!(numbers.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn sequential_ids_grow_past_their_width() {
        let (store, db, _sink) = setup();
        db.put(
            &snapshot_key("notes"),
            &serde_json::to_string(&vec![seeded("N999", "last three-digit")]).expect("encode"),
        )
        .expect("Failed to put");
        store.hydrate(AuthState::Authenticated).await;

        let added = store
            .mutate("Add note", |c| Ok(c.insert(note("wide")).clone()))
            .await
            .expect("Mutation failed");

        assert_eq!(added.id, "N1000");
    }

    #[tokio::test]
    async fn removed_ids_are_not_reissued() {
        let (store, _db, _sink) = setup();
        store.hydrate(AuthState::Authenticated).await;

        let added = store
            .mutate("Add note", |c| Ok(c.insert(note("temporary")).clone()))
            .await
            .expect("Mutation failed");
        store
            .mutate("Remove note", |c| {
                c.remove(&added.id)
                    .ok_or_else(|| StoreError::blocked("missing"))
            })
            .await
            .expect("Mutation failed");
        let next = store
            .mutate("Add note", |c| Ok(c.insert(note("next")).clone()))
            .await
            .expect("Mutation failed");

        assert_eq!(added.id, "N002");
        assert_eq!(next.id, "N003");
    }

    #[tokio::test]
    async fn ids_seen_before_signing_out_are_not_reissued() {
        let (store, db, _sink) = setup();
        db.put(
            &snapshot_key("notes"),
            &serde_json::to_string(&vec![seeded("N007", "Loaded")]).expect("encode"),
        )
        .expect("Failed to put");
        store.hydrate(AuthState::Authenticated).await;
        store
            .mutate("Remove note", |c| {
                c.remove("N007").ok_or_else(|| StoreError::blocked("missing"))
            })
            .await
            .expect("Mutation failed");

        store.hydrate(AuthState::Unauthenticated).await;
        assert_eq!(
            store.hydrate(AuthState::Authenticated).await,
            Hydration::Ready { count: 0 }
        );
        let added = store
            .mutate("Add note", |c| Ok(c.insert(note("after")).clone()))
            .await
            .expect("Mutation failed");

        assert_eq!(added.id, "N008");
    }

    #[tokio::test]
    async fn timestamp_ids_are_unique_in_a_tight_loop() {
        let sink = RecordingSink::new();
        let db = Database::open_memory().expect("Failed to create database");
        db.migrate().expect("Failed to migrate");
        let store = Store::new(
            notes(IdScheme::Timestamp),
            Arc::new(LocalSource::new(Arc::new(db), "notes")),
            Arc::new(sink),
        );
        store.hydrate(AuthState::Authenticated).await;

        store
            .update(|c| {
                for i in 0..200 {
                    c.insert(note(&format!("n{}", i)));
                }
                Ok(())
            })
            .await
            .expect("Update failed");

        let ids: HashSet<String> = store.records().into_iter().map(|n| n.id).collect();
        assert_eq!(ids.len(), 201);
    }
}

mod optimistic_inserts {
    use super::*;

    #[tokio::test]
    async fn a_confirmed_insert_keeps_the_local_copy() {
        let (store, _db, sink) = setup();
        store.hydrate(AuthState::Authenticated).await;

        let sent = store
            .insert_optimistic("Send note", note("hello"), |_| async { Ok(()) })
            .await
            .expect("Insert failed");

        assert_eq!(sent.id, "N002");
        assert_eq!(store.get("N002"), Some(sent));
        assert_eq!(sink.of_kind(NotificationKind::Success).len(), 1);
    }

    #[tokio::test]
    async fn the_record_is_visible_before_the_write_completes() {
        let (store, _db, _sink) = setup();
        store.hydrate(AuthState::Authenticated).await;

        let observer = store.clone();
        store
            .insert_optimistic("Send note", note("pending"), |record| async move {
                assert_eq!(observer.get(&record.id).map(|n| n.title), Some("pending".to_string()));
                Ok(())
            })
            .await
            .expect("Insert failed");
    }

    #[tokio::test]
    async fn a_failed_write_rolls_back_and_notifies() {
        let (store, _db, sink) = setup();
        store.hydrate(AuthState::Authenticated).await;

        let result = store
            .insert_optimistic("Send note", note("doomed"), |_| async {
                Err(ClientError::Server("503: unavailable".to_string()))
            })
            .await;

        assert!(matches!(result, Err(StoreError::Remote(_))));
        assert_eq!(titles(&store), vec!["Seeded"]);

        let failures = sink.of_kind(NotificationKind::Failed);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].title, "Send note");
        assert_eq!(failures[0].severity, Severity::Destructive);
    }

    #[tokio::test]
    async fn rollback_removes_only_the_failed_record() {
        let (store, _db, _sink) = setup();
        store.hydrate(AuthState::Authenticated).await;
        let (release, released) = tokio::sync::oneshot::channel::<()>();

        let failing = store.insert_optimistic("Send note", note("x"), |_| async move {
            let _ = released.await;
            Err(ClientError::Server("500: boom".to_string()))
        });
        let succeeding = async {
            let result = store
                .insert_optimistic("Send note", note("y"), |_| async { Ok(()) })
                .await;
            let _ = release.send(());
            result
        };
        let (x, y) = tokio::join!(failing, succeeding);

        assert!(x.is_err());
        assert!(y.is_ok());
        assert_eq!(titles(&store), vec!["Seeded", "y"]);
    }

    #[tokio::test]
    async fn inserting_before_hydration_is_not_ready() {
        let (store, _db, sink) = setup();

        let result = store
            .insert_optimistic("Send note", note("early"), |_| async { Ok(()) })
            .await;

        assert!(matches!(result, Err(StoreError::NotReady { .. })));
        assert!(store.records().is_empty());
        assert_eq!(sink.of_kind(NotificationKind::Blocked).len(), 1);
    }
}
