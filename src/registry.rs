//! Year → dataset mapping merged from three places: the local cache, files
//! uploaded this session, and the remote publisher.
//!
//! All mutation goes through `&mut self`, and every awaited I/O step for an
//! operation finishes before the maps are touched, so a reader never sees a
//! half-applied change.

use futures_util::future::{join, join_all};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::{content_digest, ContentType, KeyValueStore};
use crate::config::Config;
use crate::logging::{log, log_discovery, log_ingest, obj, v_str, Domain, Level, ProfileScope};
use crate::model::{Dataset, NationalContext, Provenance};
use crate::remote::DatasetSource;
use crate::upload::{canonicalize, classify, UploadKind};

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Imported { year: i32, provenance: Provenance },
    ContextImported { provenance: Provenance },
    Unrecognized { name: String },
    Failed { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<UploadOutcome>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForgetOutcome {
    NothingToClear,
    /// The store refused to clear; nothing was dropped.
    ClearFailed,
    Cleared { years: Vec<i32>, context: bool },
}

pub struct DatasetRegistry {
    cfg: Config,
    cache: Box<dyn KeyValueStore>,
    source: Box<dyn DatasetSource>,
    datasets: BTreeMap<i32, Arc<Dataset>>,
    provenance: BTreeMap<i32, Provenance>,
    context: Option<(NationalContext, Provenance)>,
    feedback: Option<String>,
}

fn is_local(p: Provenance) -> bool {
    matches!(p, Provenance::Cached | Provenance::SessionOnly)
}

fn join_years(years: &[i32]) -> String {
    years.iter().map(|y| y.to_string()).collect::<Vec<_>>().join(", ")
}

impl DatasetRegistry {
    pub fn new(cfg: Config, cache: Box<dyn KeyValueStore>, source: Box<dyn DatasetSource>) -> Self {
        Self {
            cfg,
            cache,
            source,
            datasets: BTreeMap::new(),
            provenance: BTreeMap::new(),
            context: None,
            feedback: None,
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Known years, newest first.
    pub fn years(&self) -> Vec<i32> {
        self.datasets.keys().rev().copied().collect()
    }

    pub fn latest_year(&self) -> Option<i32> {
        self.datasets.keys().next_back().copied()
    }

    pub fn dataset(&self, year: i32) -> Option<Arc<Dataset>> {
        self.datasets.get(&year).cloned()
    }

    pub fn provenance(&self, year: i32) -> Option<Provenance> {
        self.provenance.get(&year).copied()
    }

    pub fn context(&self) -> Option<&NationalContext> {
        self.context.as_ref().map(|(ctx, _)| ctx)
    }

    pub fn context_provenance(&self) -> Option<Provenance> {
        self.context.as_ref().map(|(_, p)| *p)
    }

    fn years_with(&self, wanted: Provenance) -> Vec<i32> {
        self.provenance
            .iter()
            .filter(|(_, p)| **p == wanted)
            .map(|(y, _)| *y)
            .collect()
    }

    /// One-line summary of what is saved locally, prefixed by the outcome of
    /// the last upload or clear.
    pub fn status_text(&self) -> String {
        let cached = self.years_with(Provenance::Cached);
        let session = self.years_with(Provenance::SessionOnly);
        let mut parts = Vec::new();
        if let Some(msg) = &self.feedback {
            parts.push(msg.clone());
        }
        let context_saved = self.context_provenance() == Some(Provenance::Cached);
        if cached.is_empty() {
            let suffix = if context_saved { " Context saved." } else { "" };
            parts.push(format!("No datasets saved locally.{}", suffix));
        } else {
            let suffix = if context_saved { " · context saved" } else { "" };
            parts.push(format!("Saved locally: {}{}.", join_years(&cached), suffix));
        }
        if !session.is_empty() || self.context_provenance() == Some(Provenance::SessionOnly) {
            let mut items: Vec<String> = session.iter().map(|y| y.to_string()).collect();
            if self.context_provenance() == Some(Provenance::SessionOnly) {
                items.push("context".to_string());
            }
            parts.push(format!("Session only (will not survive a reload): {}.", items.join(", ")));
        }
        parts.join(" ")
    }

    pub fn clear_feedback(&mut self) {
        self.feedback = None;
    }

    // -------------------------------------------------------------------------
    // Hydration and discovery
    // -------------------------------------------------------------------------

    /// Load everything previously cached. Entries that fail to parse are
    /// deleted; entries whose name no longer matches the configured file
    /// names are left in place. Returns the number of entries restored.
    pub async fn hydrate(&mut self) -> usize {
        let _scope = ProfileScope::new("hydrate");
        let entries = self.cache.list().await;
        let mut restored_years = Vec::new();
        let mut restored_context = None;
        let mut corrupt = Vec::new();

        for entry in entries {
            match classify(&entry.name, &self.cfg) {
                UploadKind::Dataset(year) => match Dataset::from_json(year, &entry.contents) {
                    Ok(ds) => restored_years.push(ds),
                    Err(err) => corrupt.push((entry.name, format!("{:#}", err))),
                },
                UploadKind::Context => match NationalContext::from_json(&entry.contents) {
                    Ok(ctx) => restored_context = Some(ctx),
                    Err(err) => corrupt.push((entry.name, format!("{:#}", err))),
                },
                UploadKind::Unrecognized => log(
                    Level::Warn,
                    Domain::Registry,
                    "hydrate_skipped",
                    obj(&[("name", v_str(&entry.name)), ("content_type", v_str(entry.content_type.as_str()))]),
                ),
            }
        }

        for (name, reason) in &corrupt {
            self.cache.remove(name).await;
            log(
                Level::Warn,
                Domain::Registry,
                "hydrate_dropped",
                obj(&[("name", v_str(name)), ("reason", v_str(reason))]),
            );
        }

        let restored = restored_years.len() + usize::from(restored_context.is_some());
        for ds in restored_years {
            self.provenance.insert(ds.year, Provenance::Cached);
            self.datasets.insert(ds.year, Arc::new(ds));
        }
        if let Some(ctx) = restored_context {
            self.context = Some((ctx, Provenance::Cached));
        }
        log(
            Level::Info,
            Domain::Registry,
            "hydrated",
            obj(&[("restored", json!(restored)), ("dropped", json!(corrupt.len()))]),
        );
        restored
    }

    /// Fetch every year from `current_year` down to the floor year that is
    /// not already known, plus the context if none is known. Misses never
    /// stop the scan. Returns all known years, newest first.
    pub async fn discover(&mut self, current_year: i32) -> Vec<i32> {
        let wanted: Vec<i32> = (self.cfg.floor_year..=current_year)
            .rev()
            .filter(|y| !self.datasets.contains_key(y))
            .collect();
        let need_context = self.context.is_none();

        let source = &self.source;
        let years_fut = join_all(wanted.iter().map(|&year| async move { (year, source.fetch_year(year).await) }));
        let ctx_fut = async move {
            if need_context {
                source.fetch_context().await
            } else {
                None
            }
        };
        let (fetched, ctx) = join(years_fut, ctx_fut).await;

        let mut found = 0;
        for (year, ds) in fetched {
            if let Some(ds) = ds {
                found += 1;
                self.provenance.insert(year, Provenance::Remote);
                self.datasets.insert(year, Arc::new(ds));
            }
        }
        if let Some(ctx) = ctx {
            if self.context.is_none() {
                self.context = Some((ctx, Provenance::Remote));
            }
        }
        let known = self.years();
        log_discovery(wanted.len(), found, &known);
        known
    }

    // -------------------------------------------------------------------------
    // Uploads
    // -------------------------------------------------------------------------

    /// Validate and ingest one uploaded file.
    pub async fn ingest_upload(&mut self, name: &str, bytes: &[u8]) -> UploadOutcome {
        let canonical = canonicalize(name);
        let kind = classify(&canonical, &self.cfg);
        if kind == UploadKind::Unrecognized {
            log_ingest(name, "unrecognized", &canonical);
            return UploadOutcome::Unrecognized { name: name.to_string() };
        }
        let text = match std::str::from_utf8(bytes) {
            Ok(t) => t,
            Err(_) => return self.failed(name, "file is not UTF-8 text".to_string()),
        };

        match kind {
            UploadKind::Dataset(year) => match Dataset::from_json(year, text) {
                Ok(ds) => {
                    let provenance = self.store_dataset(&canonical, text, ds).await;
                    log_ingest(name, "imported", &format!("{} ({:?})", year, provenance));
                    UploadOutcome::Imported { year, provenance }
                }
                Err(err) => self.failed(name, format!("{:#}", err)),
            },
            UploadKind::Context => match NationalContext::from_json(text) {
                Ok(ctx) => {
                    let provenance = self.persist(&canonical, text, ContentType::Context).await;
                    self.context = Some((ctx, provenance));
                    log_ingest(name, "imported", &format!("context ({:?})", provenance));
                    UploadOutcome::ContextImported { provenance }
                }
                Err(err) => self.failed(name, format!("{:#}", err)),
            },
            UploadKind::Unrecognized => UploadOutcome::Unrecognized { name: name.to_string() },
        }
    }

    fn failed(&self, name: &str, reason: String) -> UploadOutcome {
        log_ingest(name, "failed", &reason);
        UploadOutcome::Failed { name: name.to_string(), reason }
    }

    async fn store_dataset(&mut self, canonical: &str, text: &str, ds: Dataset) -> Provenance {
        let year = ds.year;
        // Visible for this session straight away; persistence may upgrade it.
        self.datasets.insert(year, Arc::new(ds));
        self.provenance.insert(year, Provenance::SessionOnly);

        let provenance = self.persist(canonical, text, ContentType::Dataset).await;
        self.provenance.insert(year, provenance);
        provenance
    }

    /// Write through to the cache, skipping byte-identical content that is
    /// already stored. Cached only when the store is durable.
    async fn persist(&self, canonical: &str, text: &str, content_type: ContentType) -> Provenance {
        if !self.cache.is_supported().await {
            return Provenance::SessionOnly;
        }
        if let Some(existing) = self.cache.load(canonical).await {
            if existing.digest == content_digest(text) {
                log(
                    Level::Debug,
                    Domain::Upload,
                    "unchanged",
                    obj(&[("name", v_str(canonical))]),
                );
                return Provenance::Cached;
            }
        }
        if self.cache.save(canonical, text, content_type).await {
            Provenance::Cached
        } else {
            Provenance::SessionOnly
        }
    }

    /// Ingest several files independently and record a summary message that
    /// prefixes the status text.
    pub async fn ingest_batch(&mut self, files: &[(String, Vec<u8>)]) -> BatchReport {
        let mut outcomes = Vec::with_capacity(files.len());
        for (name, bytes) in files {
            outcomes.push(self.ingest_upload(name, bytes).await);
        }
        let message = summarize(&outcomes);
        self.feedback = Some(message.clone());
        BatchReport { outcomes, message }
    }

    // -------------------------------------------------------------------------
    // Forget
    // -------------------------------------------------------------------------

    /// Drop every cached and session-only dataset and context, clear the
    /// store, then rediscover remote years. Does nothing when nothing local
    /// exists.
    pub async fn forget(&mut self, current_year: i32) -> ForgetOutcome {
        let local_years: Vec<i32> = self
            .provenance
            .iter()
            .filter(|(_, p)| is_local(**p))
            .map(|(y, _)| *y)
            .collect();
        let local_context = self.context_provenance().map(is_local).unwrap_or(false);
        let stored = self.cache.list().await;

        if local_years.is_empty() && !local_context && stored.is_empty() {
            self.feedback = Some("Nothing to clear.".to_string());
            return ForgetOutcome::NothingToClear;
        }

        if !stored.is_empty() && !self.cache.clear().await {
            log(
                Level::Warn,
                Domain::Registry,
                "forget_clear_failed",
                obj(&[("entries", json!(stored.len()))]),
            );
            self.feedback = Some("Could not clear saved data.".to_string());
            return ForgetOutcome::ClearFailed;
        }
        for year in &local_years {
            self.datasets.remove(year);
            self.provenance.remove(year);
        }
        if local_context {
            self.context = None;
        }

        let mut msg = if local_years.is_empty() {
            "Cleared saved data".to_string()
        } else {
            format!("Cleared saved data for {}", join_years(&local_years))
        };
        if local_context {
            msg.push_str(if local_years.is_empty() { " (context)" } else { " and context" });
        }
        msg.push('.');
        self.feedback = Some(msg);

        self.discover(current_year).await;
        ForgetOutcome::Cleared { years: local_years, context: local_context }
    }
}

fn summarize(outcomes: &[UploadOutcome]) -> String {
    if outcomes.is_empty() {
        return "No files selected.".to_string();
    }
    let mut imported = Vec::new();
    let mut session_only = Vec::new();
    let mut failed = Vec::new();
    let mut unrecognized = Vec::new();
    for o in outcomes {
        match o {
            UploadOutcome::Imported { year, provenance } => {
                imported.push(year.to_string());
                if *provenance == Provenance::SessionOnly {
                    session_only.push(year.to_string());
                }
            }
            UploadOutcome::ContextImported { provenance } => {
                imported.push("context".to_string());
                if *provenance == Provenance::SessionOnly {
                    session_only.push("context".to_string());
                }
            }
            UploadOutcome::Failed { name, .. } => failed.push(name.clone()),
            UploadOutcome::Unrecognized { name } => unrecognized.push(name.clone()),
        }
    }

    let plural = |n: usize| if n == 1 { "file" } else { "files" };
    let mut parts = Vec::new();
    if !imported.is_empty() {
        parts.push(format!("Imported {} {} ({}).", imported.len(), plural(imported.len()), imported.join(", ")));
    }
    if !session_only.is_empty() {
        parts.push(format!("Not saved for next visit: {}.", session_only.join(", ")));
    }
    if !failed.is_empty() {
        parts.push(format!("{} failed to import: {}.", failed.len(), failed.join(", ")));
    }
    if !unrecognized.is_empty() {
        parts.push(format!("{} unrecognized: {}.", unrecognized.len(), unrecognized.join(", ")));
    }
    parts.join(" ")
}
