use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use rx_scoreboard::cache::{ContentType, KeyValueStore, LocalCache, StoredEntry};
use rx_scoreboard::config::Config;
use rx_scoreboard::model::{Dataset, NationalContext, Provenance};
use rx_scoreboard::registry::{DatasetRegistry, ForgetOutcome, UploadOutcome};
use rx_scoreboard::remote::{DatasetSource, NullSource};

const DATASET_2023: &str = r#"[
  {"year": 2023, "part": "D", "display_name": "Eliquis", "is_glp1": false,
   "spend_total_usd": 18000000000, "claims": 25000000, "beneficiaries": 4000000,
   "prev_year": 2022, "prev_spend_total_usd": 16000000000},
  {"year": 2023, "part": "D", "display_name": "Ozempic", "is_glp1": true,
   "spend_total_usd": 9000000000, "claims": 8000000, "beneficiaries": 1200000}
]"#;

const CONTEXT: &str = r#"{"latest_year": 2022, "value_usd": 405900000000,
  "series": [{"year": 2021, "value_usd": 378000000000}, {"year": 2022, "value_usd": 405900000000}]}"#;

#[derive(Default)]
struct Calls {
    fetches: AtomicUsize,
    saves: AtomicUsize,
    removes: AtomicUsize,
    clears: AtomicUsize,
}

struct FakeSource {
    years: HashMap<i32, Dataset>,
    context: Option<NationalContext>,
    calls: Arc<Calls>,
}

#[async_trait]
impl DatasetSource for FakeSource {
    async fn fetch_year(&self, year: i32) -> Option<Dataset> {
        self.calls.fetches.fetch_add(1, Ordering::SeqCst);
        self.years.get(&year).cloned()
    }

    async fn fetch_context(&self) -> Option<NationalContext> {
        self.context.clone()
    }
}

struct RecordingStore {
    supported: bool,
    clear_ok: bool,
    entries: Mutex<BTreeMap<String, StoredEntry>>,
    calls: Arc<Calls>,
}

#[async_trait]
impl KeyValueStore for RecordingStore {
    async fn is_supported(&self) -> bool {
        self.supported
    }

    async fn save(&self, name: &str, contents: &str, content_type: ContentType) -> bool {
        self.calls.saves.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(name.to_string(), StoredEntry::new(name, contents, content_type));
        true
    }

    async fn load(&self, name: &str) -> Option<StoredEntry> {
        self.entries.lock().unwrap().get(name).cloned()
    }

    async fn list(&self) -> Vec<StoredEntry> {
        self.entries.lock().unwrap().values().cloned().collect()
    }

    async fn remove(&self, name: &str) -> bool {
        self.calls.removes.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().remove(name);
        true
    }

    async fn clear(&self) -> bool {
        self.calls.clears.fetch_add(1, Ordering::SeqCst);
        if !self.clear_ok {
            return false;
        }
        self.entries.lock().unwrap().clear();
        true
    }
}

fn remote_with(years: &[i32], calls: &Arc<Calls>) -> Box<dyn DatasetSource> {
    let years = years
        .iter()
        .map(|&y| (y, Dataset::from_json(y, DATASET_2023).unwrap()))
        .collect();
    Box::new(FakeSource {
        years,
        context: Some(NationalContext::from_json(CONTEXT).unwrap()),
        calls: Arc::clone(calls),
    })
}

fn store(supported: bool, calls: &Arc<Calls>) -> Box<dyn KeyValueStore> {
    Box::new(RecordingStore {
        supported,
        clear_ok: true,
        entries: Mutex::new(BTreeMap::new()),
        calls: Arc::clone(calls),
    })
}

fn stubborn_store(calls: &Arc<Calls>) -> Box<dyn KeyValueStore> {
    Box::new(RecordingStore {
        supported: true,
        clear_ok: false,
        entries: Mutex::new(BTreeMap::new()),
        calls: Arc::clone(calls),
    })
}

#[tokio::test]
async fn discovery_collects_available_years_and_skips_gaps() {
    let calls = Arc::new(Calls::default());
    let mut reg = DatasetRegistry::new(Config::offline(), store(true, &calls), remote_with(&[2021, 2023], &calls));

    let years = reg.discover(2024).await;
    assert_eq!(years, vec![2023, 2021]);
    // 2019..=2024
    assert_eq!(calls.fetches.load(Ordering::SeqCst), 6);
    assert_eq!(reg.provenance(2023), Some(Provenance::Remote));
    assert_eq!(reg.latest_year(), Some(2023));
    assert_eq!(reg.context_provenance(), Some(Provenance::Remote));

    // known years are not fetched again
    reg.discover(2024).await;
    assert_eq!(calls.fetches.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn upload_is_visible_and_saved_and_wins_over_remote() {
    let calls = Arc::new(Calls::default());
    let mut reg = DatasetRegistry::new(Config::offline(), store(true, &calls), remote_with(&[2023], &calls));

    let outcome = reg.ingest_upload("Medicare_Drugs_2023(1).json", DATASET_2023.as_bytes()).await;
    assert_eq!(outcome, UploadOutcome::Imported { year: 2023, provenance: Provenance::Cached });
    assert_eq!(reg.dataset(2023).unwrap().len(), 2);

    reg.discover(2024).await;
    assert_eq!(reg.provenance(2023), Some(Provenance::Cached));
    assert!(reg.status_text().contains("Saved locally: 2023."));
}

#[tokio::test]
async fn identical_reupload_skips_the_write() {
    let calls = Arc::new(Calls::default());
    let mut reg = DatasetRegistry::new(Config::offline(), store(true, &calls), Box::new(NullSource));

    reg.ingest_upload("medicare_drugs_2023.json", DATASET_2023.as_bytes()).await;
    reg.ingest_upload("medicare_drugs_2023 (2).json", DATASET_2023.as_bytes()).await;
    assert_eq!(calls.saves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_payload_leaves_other_years_intact() {
    let calls = Arc::new(Calls::default());
    let mut reg = DatasetRegistry::new(Config::offline(), store(true, &calls), Box::new(NullSource));
    reg.ingest_upload("medicare_drugs_2023.json", DATASET_2023.as_bytes()).await;

    let report = reg
        .ingest_batch(&[
            ("medicare_drugs_2021.json".to_string(), br#"{"not": "an array"}"#.to_vec()),
            ("medicare_drugs_2020.json".to_string(), vec![0xff, 0xfe]),
            ("summary.csv".to_string(), b"a,b".to_vec()),
        ])
        .await;

    assert!(matches!(report.outcomes[0], UploadOutcome::Failed { .. }));
    assert!(matches!(report.outcomes[1], UploadOutcome::Failed { .. }));
    assert_eq!(report.outcomes[2], UploadOutcome::Unrecognized { name: "summary.csv".to_string() });
    assert_eq!(reg.years(), vec![2023]);
    assert!(reg.dataset(2021).is_none());
    assert!(report.message.starts_with("2 failed to import"));
    assert!(reg.status_text().starts_with(&report.message));
}

#[tokio::test]
async fn unsupported_store_keeps_uploads_for_the_session_only() {
    let calls = Arc::new(Calls::default());
    let mut reg = DatasetRegistry::new(Config::offline(), store(false, &calls), Box::new(NullSource));

    let report = reg
        .ingest_batch(&[
            ("medicare_drugs_2023.json".to_string(), DATASET_2023.as_bytes().to_vec()),
            ("NHE Retail Rx.json".to_string(), CONTEXT.as_bytes().to_vec()),
        ])
        .await;
    assert_eq!(
        report.message,
        "Imported 2 files (2023, context). Not saved for next visit: 2023, context."
    );
    assert_eq!(reg.provenance(2023), Some(Provenance::SessionOnly));
    assert_eq!(calls.saves.load(Ordering::SeqCst), 0);
    assert!(reg
        .status_text()
        .ends_with("No datasets saved locally. Session only (will not survive a reload): 2023, context."));
}

#[tokio::test]
async fn forget_with_nothing_local_touches_nothing() {
    let calls = Arc::new(Calls::default());
    let mut reg = DatasetRegistry::new(Config::offline(), store(true, &calls), remote_with(&[2022], &calls));
    reg.discover(2024).await;

    assert_eq!(reg.forget(2024).await, ForgetOutcome::NothingToClear);
    assert_eq!(calls.clears.load(Ordering::SeqCst), 0);
    assert_eq!(calls.removes.load(Ordering::SeqCst), 0);
    assert_eq!(reg.years(), vec![2022]);
    assert!(reg.status_text().starts_with("Nothing to clear."));
}

#[tokio::test]
async fn forget_drops_local_data_and_rediscovers_remote() {
    let calls = Arc::new(Calls::default());
    let mut reg = DatasetRegistry::new(Config::offline(), store(true, &calls), remote_with(&[2023], &calls));
    reg.ingest_upload("medicare_drugs_2023.json", DATASET_2023.as_bytes()).await;
    reg.ingest_upload("medicare_drugs_2021.json", DATASET_2023.as_bytes()).await;

    let outcome = reg.forget(2024).await;
    assert_eq!(outcome, ForgetOutcome::Cleared { years: vec![2021, 2023], context: false });
    assert_eq!(calls.clears.load(Ordering::SeqCst), 1);
    assert_eq!(reg.years(), vec![2023]);
    assert_eq!(reg.provenance(2023), Some(Provenance::Remote));
    assert!(reg.status_text().starts_with("Cleared saved data for 2021, 2023."));
}

#[tokio::test]
async fn sqlite_cache_restores_uploads_and_drops_corrupt_entries() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rx.sqlite");
    let path = path.to_str().unwrap();

    {
        let mut reg = DatasetRegistry::new(Config::offline(), Box::new(LocalCache::new(path)), Box::new(NullSource));
        let outcome = reg.ingest_upload("medicare_drugs_2022.json", DATASET_2023.as_bytes()).await;
        assert_eq!(outcome, UploadOutcome::Imported { year: 2022, provenance: Provenance::Cached });
        reg.ingest_upload("nhe_retail_rx.json", CONTEXT.as_bytes()).await;
    }
    let raw = LocalCache::new(path);
    raw.save("medicare_drugs_2020.json", "{\"broken\": true}", ContentType::Dataset).await;
    drop(raw);

    let cache = LocalCache::new(path);
    let mut reg = DatasetRegistry::new(Config::offline(), Box::new(cache), Box::new(NullSource));
    assert_eq!(reg.hydrate().await, 2);
    assert_eq!(reg.years(), vec![2022]);
    assert_eq!(reg.provenance(2022), Some(Provenance::Cached));
    assert_eq!(reg.context().map(|c| c.latest_year), Some(2022));
    assert_eq!(reg.status_text(), "Saved locally: 2022 · context saved.");

    let check = LocalCache::new(path);
    assert!(check.load("medicare_drugs_2020.json").await.is_none());
}

#[tokio::test]
async fn failed_clear_keeps_local_data_and_says_so() {
    let calls = Arc::new(Calls::default());
    let mut reg = DatasetRegistry::new(Config::offline(), stubborn_store(&calls), Box::new(NullSource));
    reg.ingest_upload("medicare_drugs_2023.json", DATASET_2023.as_bytes()).await;

    assert_eq!(reg.forget(2024).await, ForgetOutcome::ClearFailed);
    assert_eq!(calls.clears.load(Ordering::SeqCst), 1);
    assert_eq!(reg.years(), vec![2023]);
    assert_eq!(reg.provenance(2023), Some(Provenance::Cached));
    assert!(reg.status_text().starts_with("Could not clear saved data. Saved locally: 2023."));
}

#[tokio::test]
async fn hydrate_keeps_entries_named_for_another_prefix() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rx.sqlite");
    let path = path.to_str().unwrap();

    {
        let mut reg = DatasetRegistry::new(Config::offline(), Box::new(LocalCache::new(path)), Box::new(NullSource));
        reg.ingest_upload("medicare_drugs_2022.json", DATASET_2023.as_bytes()).await;
    }

    let mut cfg = Config::offline();
    cfg.dataset_prefix = "partd_".to_string();
    let mut reg = DatasetRegistry::new(cfg, Box::new(LocalCache::new(path)), Box::new(NullSource));
    assert_eq!(reg.hydrate().await, 0);
    assert!(reg.years().is_empty());

    let check = LocalCache::new(path);
    assert!(check.load("medicare_drugs_2022.json").await.is_some());

    // back on the original prefix the upload is restored
    let mut reg = DatasetRegistry::new(Config::offline(), Box::new(LocalCache::new(path)), Box::new(NullSource));
    assert_eq!(reg.hydrate().await, 1);
    assert_eq!(reg.years(), vec![2022]);
}
