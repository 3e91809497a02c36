#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL the per-year datasets and the context file are served from.
    pub data_base: String,
    pub dataset_prefix: String,
    pub context_file: String,
    /// Oldest year discovery will try to fetch.
    pub floor_year: i32,
    /// SQLite file backing the local cache. Empty means in-memory only.
    pub cache_path: String,
    pub fetch_timeout_secs: u64,
    pub frame_ms: u64,
    pub reduced_motion: bool,
    pub run_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            data_base: std::env::var("RX_DATA_BASE").unwrap_or_else(|_| "http://localhost:8000/data/".to_string()),
            dataset_prefix: std::env::var("RX_DATASET_PREFIX").unwrap_or_else(|_| "medicare_drugs_".to_string()),
            context_file: std::env::var("RX_CONTEXT_FILE").unwrap_or_else(|_| "nhe_retail_rx.json".to_string()),
            floor_year: std::env::var("RX_FLOOR_YEAR").ok().and_then(|v| v.parse().ok()).unwrap_or(2019),
            cache_path: std::env::var("RX_CACHE_PATH").unwrap_or_else(|_| "./rx_scoreboard.sqlite".to_string()),
            fetch_timeout_secs: std::env::var("RX_FETCH_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
            frame_ms: std::env::var("RX_FRAME_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(100),
            reduced_motion: std::env::var("RX_REDUCED_MOTION").map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes")).unwrap_or(false),
            run_secs: std::env::var("RX_RUN_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
        }
    }

    /// File name a dataset for `year` is published and uploaded under.
    pub fn dataset_file(&self, year: i32) -> String {
        format!("{}{}.json", self.dataset_prefix, year)
    }

    /// Config for tests and embedding: no network base, in-memory cache.
    pub fn offline() -> Self {
        Self {
            data_base: String::new(),
            dataset_prefix: "medicare_drugs_".to_string(),
            context_file: "nhe_retail_rx.json".to_string(),
            floor_year: 2019,
            cache_path: String::new(),
            fetch_timeout_secs: 10,
            frame_ms: 100,
            reduced_motion: false,
            run_secs: 0,
        }
    }
}
