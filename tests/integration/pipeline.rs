//! End-to-end runs against the mock upstream.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use sodex_crawler::engine::pipeline::Crawler;
use sodex_crawler::engine::scanner::ProbeOutcome;
use sodex_crawler::storage;
use sodex_crawler::types::{AccountId, AccountRecord, Snapshot};

use crate::mock_api::{test_config, MockApi};

struct TempSnapshot(PathBuf);

impl TempSnapshot {
    fn new() -> Self {
        let mut p = std::env::temp_dir();
        p.push(format!("sodex_it_snapshot_{}.json", Uuid::new_v4()));
        Self(p)
    }

    fn path_str(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }

    fn seed(&self, records: Vec<AccountRecord>) {
        storage::save_snapshot(&Snapshot::from_sorted(records), &self.0).unwrap();
    }

    fn read(&self) -> Snapshot {
        storage::load_snapshot(&self.0).unwrap().unwrap()
    }
}

impl Drop for TempSnapshot {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

fn known(id: AccountId, address: &str) -> AccountRecord {
    AccountRecord {
        id,
        address: address.to_string(),
        volume: "1".to_string(),
        pnl: "1".to_string(),
    }
}

fn ids(snapshot: &Snapshot) -> Vec<AccountId> {
    snapshot.users.iter().map(|u| u.id).collect()
}

fn assert_well_formed(snapshot: &Snapshot) {
    assert_eq!(snapshot.total_users, snapshot.users.len());
    assert!(
        snapshot.users.windows(2).all(|w| w[0].id < w[1].id),
        "users must be strictly ascending by id"
    );
}

#[tokio::test]
async fn test_incremental_run_uses_cache_and_extends_frontier() {
    let file = TempSnapshot::new();
    file.seed(vec![
        known(1000, "0xcached1000"),
        known(1001, "0xcached1001"),
        known(1002, "0xcached1002"),
    ]);

    // 1003..=1007 exist upstream, 1008 does not.
    let api = Arc::new(
        MockApi::new()
            .with_accounts(1000..=1007)
            .with_stats(1000, "250.75", "-3.5")
            .with_stats(1003, "10", "2"),
    );
    let crawler = Crawler::new(test_config(&file.path_str()), api.clone());

    let report = crawler.run().await.unwrap();
    assert_eq!(report.range, 1000..=1003);
    assert_eq!(report.total_users, 4);
    assert_eq!(report.added, 1);
    assert_eq!(report.refreshed, 3);
    assert_eq!(report.address_cache_hits, 3);

    let snap = file.read();
    assert_well_formed(&snap);
    assert_eq!(ids(&snap), vec![1000, 1001, 1002, 1003]);
    assert_eq!(snap.total_users, 4);

    // Cached addresses are reused without a lookup; statistics are refreshed.
    for id in 1000..=1002 {
        assert_eq!(api.address_calls(id), 0, "address re-fetched for {id}");
        assert_eq!(api.stats_calls(id), 1);
    }
    assert_eq!(snap.users[0].address, "0xcached1000");
    assert_eq!(snap.users[0].volume, "250.75");
    assert_eq!(snap.users[0].pnl, "-3.5");

    // 1003: one probe plus one enrichment lookup.
    assert_eq!(api.address_calls(1003), 2);
    assert_eq!(snap.users[3].address, MockApi::address_for(1003));
    assert_eq!(snap.users[3].volume, "10");

    // The stride skipped past 1004..=1007.
    assert_eq!(api.address_calls(1004), 0);
    assert_eq!(api.address_calls(1008), 1);
}

#[tokio::test]
async fn test_missing_snapshot_starts_from_floor() {
    let file = TempSnapshot::new();
    let api = Arc::new(MockApi::new().with_accounts(1000..=1012));
    let crawler = Crawler::new(test_config(&file.path_str()), api.clone());

    let report = crawler.run().await.unwrap();
    // Probes 1001, 1006, 1011 succeed; 1016 does not.
    assert_eq!(report.range, 1000..=1011);
    assert_eq!(report.probes, 4);
    assert_eq!(report.previous_total, 0);

    let snap = file.read();
    assert_well_formed(&snap);
    assert_eq!(ids(&snap), (1000..=1011).collect::<Vec<_>>());
    assert_eq!(api.address_calls(1012), 0);
}

#[tokio::test]
async fn test_non_zero_code_emits_no_record() {
    let file = TempSnapshot::new();
    let api = Arc::new(
        MockApi::new()
            .with_accounts(1000..=1049)
            .with_accounts(1051..=1055),
    );
    let crawler = Crawler::new(test_config(&file.path_str()), api.clone());

    let report = crawler.run().await.unwrap();
    assert_eq!(report.range, 1000..=1051);
    assert_eq!(report.skipped, 1);

    let snap = file.read();
    assert_well_formed(&snap);
    assert!(!ids(&snap).contains(&1050));
    assert_eq!(snap.total_users, 51);
    assert_eq!(api.stats_calls(1050), 0);
}

#[tokio::test]
async fn test_stats_failure_still_emits_zeroed_record() {
    let file = TempSnapshot::new();
    let api = Arc::new(
        MockApi::new()
            .with_accounts(1000..=1001)
            .with_stats(1000, "99", "9")
            .with_stats_down(1001),
    );
    let crawler = Crawler::new(test_config(&file.path_str()), api.clone());

    let report = crawler.run().await.unwrap();
    assert_eq!(report.stats_defaulted, 1);

    let snap = file.read();
    let rec = snap.users.iter().find(|u| u.id == 1001).unwrap();
    assert_eq!(rec.volume, "0");
    assert_eq!(rec.pnl, "0");
    // First attempt plus two retries.
    assert_eq!(api.stats_calls(1001), 3);
}

#[tokio::test]
async fn test_unreachable_address_skips_uncached_id() {
    let file = TempSnapshot::new();
    file.seed(vec![known(1000, "0xa"), known(1002, "0xc")]);

    let api = Arc::new(
        MockApi::new()
            .with_accounts(1000..=1002)
            .with_address_down(1001),
    );
    let crawler = Crawler::new(test_config(&file.path_str()), api.clone());

    let report = crawler.run().await.unwrap();
    assert_eq!(report.range, 1000..=1002);

    let snap = file.read();
    assert_eq!(ids(&snap), vec![1000, 1002]);
    // Every attempt of the retry budget was spent on the lookup.
    assert_eq!(api.address_calls(1001), 3);
    assert_eq!(api.stats_calls(1001), 0);
}

#[tokio::test]
async fn test_unreachable_probe_stops_scan() {
    let file = TempSnapshot::new();
    let api = Arc::new(
        MockApi::new()
            .with_accounts(1000..=1020)
            .with_address_down(1006),
    );
    let crawler = Crawler::new(test_config(&file.path_str()), api);

    let report = crawler.run().await.unwrap();
    assert_eq!(report.range, 1000..=1001);
    assert_eq!(report.frontier_stopped_on, ProbeOutcome::Unreachable);
}

#[tokio::test]
async fn test_numeric_statistics_in_snapshot_keep_history_and_cache() {
    let file = TempSnapshot::new();
    fs::write(
        &file.0,
        r#"{
  "updated_at": "2024-01-01T00:00:00Z",
  "total_users": 3,
  "users": [
    {"id": 1000, "address": "0xa", "volume": "5", "pnl": "1"},
    {"id": 1001, "address": "0xb", "volume": 12.5, "pnl": -3},
    {"id": 1002, "address": "0xc", "volume": "7", "pnl": "0"}
  ]
}"#,
    )
    .unwrap();

    let api = Arc::new(MockApi::new().with_accounts(1000..=1002));
    let crawler = Crawler::new(test_config(&file.path_str()), api.clone());

    let report = crawler.run().await.unwrap();
    assert_eq!(report.previous_total, 3);
    assert_eq!(report.address_cache_hits, 3);

    let snap = file.read();
    assert_well_formed(&snap);
    assert_eq!(ids(&snap), vec![1000, 1001, 1002]);
    for id in 1000..=1002 {
        assert_eq!(api.address_calls(id), 0, "address re-fetched for {id}");
    }
    assert_eq!(snap.users[0].address, "0xa");
    assert_eq!(snap.users[1].address, "0xb");
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_fresh() {
    let file = TempSnapshot::new();
    fs::write(&file.0, "{\"users\": [ this is not json").unwrap();

    let api = Arc::new(MockApi::new().with_accounts(1000..=1001));
    let crawler = Crawler::new(test_config(&file.path_str()), api);

    let report = crawler.run().await.unwrap();
    assert_eq!(report.previous_total, 0);

    let snap = file.read();
    assert_well_formed(&snap);
    assert_eq!(ids(&snap), vec![1000, 1001]);
}

#[tokio::test]
async fn test_history_below_floor_is_preserved() {
    let file = TempSnapshot::new();
    file.seed(vec![known(900, "0xold"), known(1000, "0xa")]);

    let api = Arc::new(MockApi::new().with_accounts(1000..=1001));
    let crawler = Crawler::new(test_config(&file.path_str()), api.clone());

    let report = crawler.run().await.unwrap();
    assert_eq!(report.carried_over, 1);

    let snap = file.read();
    assert_eq!(ids(&snap), vec![900, 1000, 1001]);
    assert_eq!(snap.users[0].address, "0xold");
    assert_eq!(api.stats_calls(900), 0);
}

#[tokio::test]
async fn test_per_id_panic_is_isolated() {
    let file = TempSnapshot::new();
    let api = Arc::new(
        MockApi::new()
            .with_accounts(1000..=1006)
            .with_stats_panic(1003),
    );
    let crawler = Crawler::new(test_config(&file.path_str()), api);

    let report = crawler.run().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.range, 1000..=1006);

    let snap = file.read();
    assert_well_formed(&snap);
    assert_eq!(ids(&snap), vec![1000, 1001, 1002, 1004, 1005, 1006]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pool_processes_each_id_once() {
    let file = TempSnapshot::new();
    let api = Arc::new(MockApi::new().with_accounts(1000..=1500));
    let mut cfg = test_config(&file.path_str());
    cfg.pool.concurrency = 10;
    cfg.pool.progress_every = 100;
    let crawler = Crawler::new(cfg, api.clone());

    let report = crawler.run().await.unwrap();
    // 1001 + 5k up to 1496 valid, 1501 not.
    assert_eq!(report.range, 1000..=1496);

    let snap = file.read();
    assert_well_formed(&snap);
    assert_eq!(snap.total_users, 497);
    for id in [1000, 1250, 1496] {
        assert_eq!(api.stats_calls(id), 1);
    }
}

#[tokio::test]
async fn test_second_run_is_a_superset_and_cache_only() {
    let file = TempSnapshot::new();

    let first = Arc::new(MockApi::new().with_accounts(1000..=1006));
    Crawler::new(test_config(&file.path_str()), first)
        .run()
        .await
        .unwrap();
    let before = file.read();

    let second = Arc::new(MockApi::new().with_accounts(1000..=1011));
    let report = Crawler::new(test_config(&file.path_str()), second.clone())
        .run()
        .await
        .unwrap();
    let after = file.read();

    assert!(report.range.end() >= &before.max_id().unwrap());
    assert_well_formed(&after);
    for id in ids(&before) {
        assert!(ids(&after).contains(&id), "lost {id}");
        // Probes never touch already-known IDs and the cache covers enrichment.
        assert_eq!(second.address_calls(id), 0);
    }
}

#[tokio::test]
async fn test_unwritable_snapshot_is_fatal() {
    let dir = std::env::temp_dir().join(format!("sodex_missing_{}", Uuid::new_v4()));
    let path = dir.join("snapshot.json");
    let api = Arc::new(MockApi::new().with_accounts(1000..=1001));
    let crawler = Crawler::new(test_config(&path.to_string_lossy()), api);

    assert!(crawler.run().await.is_err());
}
