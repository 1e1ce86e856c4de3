use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use futures::{stream, StreamExt};
use ulid::Ulid;

use popslot::clock::FixedClock;
use popslot::config::Settings;
use popslot::engine::{Backends, Engine, EngineError};
use popslot::model::{PopupStore, ScrapStatus};
use popslot::store::{DurableStore, MemoryCache, MemoryLockService, PopupRepository, ScrapRepository};

// ── Test infrastructure ──────────────────────────────────────

fn data_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("popslot_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn clock() -> Arc<FixedClock> {
    let now = NaiveDate::from_ymd_opt(2026, 6, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    Arc::new(FixedClock::new(now))
}

fn popup() -> PopupStore {
    PopupStore::new(
        "Shared Pop",
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2026, 6, 7).unwrap(),
        NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        500,
    )
}

/// Two engines standing in for two service replicas: one durable store, one
/// cache, one lock service between them.
fn replicas(db: Arc<DurableStore>) -> (Arc<Engine>, Arc<Engine>) {
    let backends = Backends::durable(
        db,
        Arc::new(MemoryCache::new()),
        Arc::new(MemoryLockService::new()),
    );
    let settings = Settings::default();
    let clock = clock();
    let a = Arc::new(Engine::new(backends.clone(), clock.clone(), &settings));
    let b = Arc::new(Engine::new(backends, clock, &settings));
    (a, b)
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn toggles_across_replicas_count_every_present_scrap() {
    let dir = data_dir();
    let db = Arc::new(DurableStore::open(&dir.join("popslot.wal")).unwrap());
    let (a, b) = replicas(db.clone());
    let store_id = a.register_store(popup()).await.unwrap();

    let users: Vec<Ulid> = (0..20).map(|_| Ulid::new()).collect();
    // Every user toggles on both replicas; users with an odd index toggle a third time.
    let mut calls = Vec::new();
    for (i, user) in users.iter().copied().enumerate() {
        calls.push((a.clone(), user));
        calls.push((b.clone(), user));
        if i % 2 == 1 {
            calls.push((a.clone(), user));
        }
    }

    let results: Vec<Result<ScrapStatus, EngineError>> = stream::iter(calls)
        .map(|(engine, user)| async move { engine.toggle_scrap(store_id, user).await })
        .buffer_unordered(8)
        .collect()
        .await;
    assert!(results.iter().all(Result::is_ok), "no toggle should conflict: {results:?}");

    let present = users.len() / 2;
    for (i, user) in users.iter().enumerate() {
        let exists = db.find_scrap(*user, store_id).await.unwrap().is_some();
        assert_eq!(exists, i % 2 == 1, "user {i}");
    }

    let seen_by_a = a.scrap_status(store_id, users[0]).await.unwrap();
    let seen_by_b = b.scrap_status(store_id, users[1]).await.unwrap();
    assert_eq!(seen_by_a, ScrapStatus { scrapped: false, count: present as i64 });
    assert_eq!(seen_by_b, ScrapStatus { scrapped: true, count: present as i64 });
    assert_eq!(
        db.load_store(store_id).await.unwrap().unwrap().scrap_count,
        present as i64
    );
}

#[tokio::test]
async fn restart_with_cold_cache_keeps_count() {
    let dir = data_dir();
    let path = dir.join("popslot.wal");
    let user = Ulid::new();

    let store_id = {
        let db = Arc::new(DurableStore::open(&path).unwrap());
        let (a, b) = replicas(db);
        let id = a.register_store(popup()).await.unwrap();
        a.toggle_scrap(id, user).await.unwrap();
        b.toggle_scrap(id, Ulid::new()).await.unwrap();
        id
    };

    // Fresh process: the WAL is replayed, the counter cache starts empty.
    let db = Arc::new(DurableStore::open(&path).unwrap());
    let (a, _) = replicas(db);
    assert_eq!(
        a.scrap_status(store_id, user).await.unwrap(),
        ScrapStatus { scrapped: true, count: 2 }
    );
    assert_eq!(
        a.toggle_scrap(store_id, user).await.unwrap(),
        ScrapStatus { scrapped: false, count: 1 }
    );
}
