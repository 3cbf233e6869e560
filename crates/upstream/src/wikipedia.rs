//! MediaWiki action-API client.
//!
//! Pagination is hidden behind the `continue` token loop; callers always see
//! a complete (capped) neighbor set. A semaphore caps concurrent outstanding
//! requests so a wide BFS layer queues instead of stampeding the API.

use crate::{CounterSnapshot, LinkSource, Result, UpstreamCounters, UpstreamError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use wikigraph_core::Title;

const DEFAULT_API_URL: &str = "https://en.wikipedia.org/w/api.php";
const USER_AGENT: &str = "wikigraph/0.1 (path search engine)";

/// Configuration for [`WikipediaClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
  /// Endpoint of the action API.
  pub api_url: String,
  /// Maximum concurrent outstanding requests; excess callers queue.
  pub concurrency_cap: usize,
  /// Maximum neighbors returned for a single title.
  pub neighbor_cap: usize,
  /// Connect timeout for the underlying pool.
  pub connect_timeout: Duration,
  /// Total per-request timeout at the transport level. The retry layer
  /// usually enforces a tighter one.
  pub request_timeout: Duration,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      api_url: DEFAULT_API_URL.to_string(),
      concurrency_cap: 50,
      neighbor_cap: 500,
      connect_timeout: Duration::from_secs(5),
      request_timeout: Duration::from_secs(30),
    }
  }
}

/// Pooled, rate-capped client for the upstream encyclopedia.
#[derive(Debug, Clone)]
pub struct WikipediaClient {
  client: reqwest::Client,
  api_url: String,
  neighbor_cap: usize,
  semaphore: Arc<Semaphore>,
  counters: Arc<UpstreamCounters>,
}

// ---- wire types (formatversion=2) ----

#[derive(Debug, Deserialize)]
struct ApiResponse {
  #[serde(rename = "continue")]
  cont: Option<ContinueToken>,
  query: Option<QueryBlock>,
  error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ContinueToken {
  plcontinue: Option<String>,
  blcontinue: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct QueryBlock {
  #[serde(default)]
  pages: Vec<PageBlock>,
  #[serde(default)]
  backlinks: Vec<LinkEntry>,
}

#[derive(Debug, Deserialize, Default)]
struct PageBlock {
  #[serde(default)]
  missing: bool,
  #[serde(default)]
  links: Vec<LinkEntry>,
}

#[derive(Debug, Deserialize)]
struct LinkEntry {
  title: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
  code: String,
  info: Option<String>,
}

impl WikipediaClient {
  pub fn new() -> Self {
    Self::with_config(ClientConfig::default())
  }

  pub fn with_config(config: ClientConfig) -> Self {
    let client = reqwest::Client::builder()
      .user_agent(USER_AGENT)
      .connect_timeout(config.connect_timeout)
      .timeout(config.request_timeout)
      .build()
      .unwrap_or_default();

    Self {
      client,
      api_url: config.api_url,
      neighbor_cap: config.neighbor_cap,
      semaphore: Arc::new(Semaphore::new(config.concurrency_cap)),
      counters: Arc::new(UpstreamCounters::default()),
    }
  }

  pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
    self.api_url = url.into();
    self
  }

  /// One capped, counted GET against the action API.
  async fn get_json(&self, params: &[(&str, &str)], context: &str) -> Result<serde_json::Value> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .map_err(|_| UpstreamError::Network("client shut down".to_string()))?;

    self.counters.requests.fetch_add(1, Ordering::Relaxed);

    let result = async {
      let response = self.client.get(&self.api_url).query(params).send().await?;
      let status = response.status();
      if status == reqwest::StatusCode::NOT_FOUND {
        return Err(UpstreamError::TitleUnknown(context.to_string()));
      }
      if !status.is_success() {
        return Err(UpstreamError::Status(status.as_u16()));
      }
      Ok(response.json::<serde_json::Value>().await?)
    }
    .await;

    if result.is_err() {
      self.counters.failures.fetch_add(1, Ordering::Relaxed);
    }
    result
  }

  /// Keep a returned neighbor if it normalizes and is not a self-loop.
  fn collect_neighbor(&self, raw: &str, subject: &Title, into: &mut HashSet<Title>) {
    match Title::normalize(raw) {
      Ok(neighbor) if &neighbor != subject => {
        into.insert(neighbor);
      }
      Ok(_) => {}
      Err(err) => debug!(title = raw, %err, "dropping unparseable neighbor title"),
    }
  }

  fn parse_response(&self, value: serde_json::Value, context: &str) -> Result<Option<ApiResponse>> {
    let response: ApiResponse = match serde_json::from_value(value) {
      Ok(response) => response,
      Err(err) => {
        // Malformed payloads are treated as "no neighbors", never fatal.
        warn!(title = context, %err, "malformed upstream payload");
        return Ok(None);
      }
    };
    if let Some(error) = response.error {
      if error.code.contains("missing") || error.code.contains("invalidtitle") {
        return Err(UpstreamError::TitleUnknown(context.to_string()));
      }
      warn!(title = context, code = %error.code, info = ?error.info, "upstream api error");
      return Ok(None);
    }
    Ok(Some(response))
  }
}

impl Default for WikipediaClient {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl LinkSource for WikipediaClient {
  async fn forward_links(&self, title: &Title) -> Result<HashSet<Title>> {
    let mut links = HashSet::new();
    let mut cont: Option<String> = None;

    loop {
      let mut params = vec![
        ("action", "query"),
        ("titles", title.as_str()),
        ("prop", "links"),
        ("pllimit", "max"),
        ("plnamespace", "0"),
        ("format", "json"),
        ("formatversion", "2"),
      ];
      if let Some(token) = cont.as_deref() {
        params.push(("plcontinue", token));
      }

      let value = self.get_json(&params, title.as_str()).await?;
      let Some(response) = self.parse_response(value, title.as_str())? else {
        return Ok(links);
      };

      if let Some(query) = response.query {
        for page in query.pages {
          if page.missing {
            return Err(UpstreamError::TitleUnknown(title.to_string()));
          }
          for entry in page.links {
            self.collect_neighbor(&entry.title, title, &mut links);
            if links.len() >= self.neighbor_cap {
              debug!(%title, cap = self.neighbor_cap, "neighbor cap reached");
              return Ok(links);
            }
          }
        }
      }

      match response.cont.and_then(|c| c.plcontinue) {
        Some(token) => cont = Some(token),
        None => return Ok(links),
      }
    }
  }

  async fn backward_links(&self, title: &Title) -> Result<HashSet<Title>> {
    let mut links = HashSet::new();
    let mut cont: Option<String> = None;

    loop {
      let mut params = vec![
        ("action", "query"),
        ("list", "backlinks"),
        ("bltitle", title.as_str()),
        ("bllimit", "max"),
        ("blnamespace", "0"),
        ("format", "json"),
        ("formatversion", "2"),
      ];
      if let Some(token) = cont.as_deref() {
        params.push(("blcontinue", token));
      }

      let value = self.get_json(&params, title.as_str()).await?;
      let Some(response) = self.parse_response(value, title.as_str())? else {
        return Ok(links);
      };

      if let Some(query) = response.query {
        for entry in query.backlinks {
          self.collect_neighbor(&entry.title, title, &mut links);
          if links.len() >= self.neighbor_cap {
            debug!(%title, cap = self.neighbor_cap, "back-link cap reached");
            return Ok(links);
          }
        }
      }

      match response.cont.and_then(|c| c.blcontinue) {
        Some(token) => cont = Some(token),
        None => return Ok(links),
      }
    }
  }

  async fn resolve(&self, term: &str) -> Result<Title> {
    let params = [
      ("action", "opensearch"),
      ("search", term),
      ("limit", "1"),
      ("namespace", "0"),
      ("format", "json"),
    ];

    let value = self.get_json(&params, term).await?;

    // opensearch returns [query, [titles], [descriptions], [urls]]
    let resolved = value
      .get(1)
      .and_then(|titles| titles.get(0))
      .and_then(|title| title.as_str())
      .and_then(|raw| Title::normalize(raw).ok());

    match resolved {
      Some(title) => {
        debug!(term, %title, "resolved search term");
        Ok(title)
      }
      None => Err(UpstreamError::TitleUnknown(term.to_string())),
    }
  }

  fn counters(&self) -> CounterSnapshot {
    self.counters.snapshot()
  }
}
