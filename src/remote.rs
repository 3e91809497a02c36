use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::logging::log_fetch;
use crate::model::{Dataset, NationalContext};

/// Where published datasets come from. A miss is `None`, never an error.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn fetch_year(&self, year: i32) -> Option<Dataset>;
    async fn fetch_context(&self) -> Option<NationalContext>;
}

/// Source used when no remote base is configured: every year is absent.
pub struct NullSource;

#[async_trait]
impl DatasetSource for NullSource {
    async fn fetch_year(&self, _year: i32) -> Option<Dataset> {
        None
    }

    async fn fetch_context(&self) -> Option<NationalContext> {
        None
    }
}

/// Fetches `<base><prefix><year>.json` and `<base><context_file>` over HTTP.
pub struct HttpSource {
    client: Client,
    base: Url,
    cfg: Config,
}

impl HttpSource {
    pub fn new(cfg: &Config) -> Result<Self> {
        let mut base = cfg.data_base.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).with_context(|| format!("invalid data base url {}", cfg.data_base))?;
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(cfg.fetch_timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base,
            cfg: cfg.clone(),
        })
    }

    fn url_for(&self, file: &str) -> Result<Url> {
        self.base.join(file).with_context(|| format!("cannot join {}", file))
    }

    fn dataset_url(&self, year: i32) -> Result<Url> {
        self.url_for(&self.cfg.dataset_file(year))
    }

    /// Body text of a successful response, `None` for a non-2xx status.
    async fn get_text(&self, url: Url) -> Result<Option<String>> {
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            log_fetch(url.as_str(), "absent", Some(status.as_u16()));
            return Ok(None);
        }
        let text = resp.text().await?;
        log_fetch(url.as_str(), "ok", Some(status.as_u16()));
        Ok(Some(text))
    }

    async fn try_fetch_year(&self, year: i32) -> Result<Option<Dataset>> {
        let url = self.dataset_url(year)?;
        match self.get_text(url).await? {
            Some(text) => Ok(Some(Dataset::from_json(year, &text)?)),
            None => Ok(None),
        }
    }

    async fn try_fetch_context(&self) -> Result<Option<NationalContext>> {
        let url = self.url_for(&self.cfg.context_file)?;
        match self.get_text(url).await? {
            Some(text) => Ok(Some(NationalContext::from_json(&text)?)),
            None => Ok(None),
        }
    }
}

fn swallow<T>(what: &str, result: Result<Option<T>>) -> Option<T> {
    match result {
        Ok(v) => v,
        Err(err) => {
            log_fetch(what, &format!("error: {:#}", err), None);
            None
        }
    }
}

#[async_trait]
impl DatasetSource for HttpSource {
    async fn fetch_year(&self, year: i32) -> Option<Dataset> {
        swallow(&self.cfg.dataset_file(year), self.try_fetch_year(year).await)
    }

    async fn fetch_context(&self) -> Option<NationalContext> {
        swallow(&self.cfg.context_file, self.try_fetch_context().await)
    }
}

/// Pick the HTTP source when a base URL is configured, otherwise the null one.
pub fn source_from_config(cfg: &Config) -> Result<Box<dyn DatasetSource>> {
    if cfg.data_base.trim().is_empty() {
        return Ok(Box::new(NullSource));
    }
    let source = HttpSource::new(cfg)?;
    if source.base.cannot_be_a_base() {
        return Err(anyhow!("data base url {} cannot be a base", cfg.data_base));
    }
    Ok(Box::new(source))
}
