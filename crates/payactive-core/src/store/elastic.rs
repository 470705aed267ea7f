//! Elasticsearch-compatible search store client
//!
//! Serves as both the payment store (scroll over every document id in the
//! paying-users index) and the output store (`PUT /{index}/_doc/{id}`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{OutputStore, PaymentStore};
use crate::config::ElasticSettings;
use crate::error::StoreError;

const STORE_NAME: &str = "payment";
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 200;
const SCROLL_KEEP_ALIVE: &str = "1m";
const PAGE_SIZE: usize = 1000;
const MAX_ERROR_BODY: usize = 512;

#[derive(Deserialize)]
struct ScrollPage {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    hits: HitList,
}

#[derive(Deserialize)]
struct HitList {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
}

pub struct ElasticClient {
    http: reqwest::Client,
    base: Url,
    username: Option<String>,
    password: Option<String>,
    backoff_ms: u64,
}

impl ElasticClient {
    pub fn new(settings: &ElasticSettings) -> Result<Self, StoreError> {
        let base = Url::parse(&settings.url)
            .map_err(|e| StoreError::unavailable(STORE_NAME, format!("invalid ES_HOST '{}': {}", settings.url, e)))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::unavailable(
                STORE_NAME,
                format!("invalid ES_HOST '{}': not a base url", settings.url),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StoreError::unavailable(STORE_NAME, e))?;

        Ok(Self {
            http,
            base,
            username: settings.username.clone(),
            password: settings.password.clone(),
            backoff_ms: INITIAL_BACKOFF_MS,
        })
    }

    /// Override the base retry backoff (milliseconds).
    pub fn with_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.backoff_ms = backoff_ms;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // new() rejects cannot-be-a-base urls, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }

    /// Send a request, retrying connection errors, 5xx and 429 with exponential backoff.
    async fn send_with_retry<F>(&self, store: &'static str, build: F) -> Result<reqwest::Response, StoreError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_error = String::new();

        for attempt in 0..MAX_RETRIES {
            match self.authorize(build()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !(status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS) {
                        return Ok(response);
                    }
                    last_error = format!("HTTP {}", status);
                    let _ = response.bytes().await;
                }
                Err(e) => {
                    last_error = format!("network error: {}", e);
                }
            }

            if attempt < MAX_RETRIES - 1 {
                debug!(attempt, error = %last_error, "retrying search store request");
                tokio::time::sleep(Duration::from_millis(self.backoff_ms * (1 << attempt))).await;
            }
        }

        Err(StoreError::unavailable(
            store,
            format!("{} after {} attempts", last_error, MAX_RETRIES),
        ))
    }

    async fn decode_page(response: reqwest::Response) -> Result<ScrollPage, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::read(
                STORE_NAME,
                format!("HTTP {}: {}", status, truncate(&body)),
            ));
        }
        response
            .json::<ScrollPage>()
            .await
            .map_err(|e| StoreError::decode(STORE_NAME, e))
    }

    async fn clear_scroll(&self, scroll_id: &str) {
        let url = self.endpoint(&["_search", "scroll"]);
        let body = json!({ "scroll_id": [scroll_id] });
        let result = self
            .authorize(self.http.delete(url).json(&body))
            .send()
            .await;
        if let Err(e) = result {
            debug!(error = %e, "failed to clear scroll context");
        }
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl PaymentStore for ElasticClient {
    async fn query_all(&self, index: &str) -> Result<Vec<String>, StoreError> {
        let mut url = self.endpoint(&[index, "_search"]);
        url.query_pairs_mut().append_pair("scroll", SCROLL_KEEP_ALIVE);
        let query = json!({
            "query": { "match_all": {} },
            "_source": false,
            "size": PAGE_SIZE,
            "sort": ["_doc"],
        });

        let response = self
            .send_with_retry(STORE_NAME, || self.http.post(url.clone()).json(&query))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            warn!(index, "paying-users index not found, treating as empty");
            return Ok(Vec::new());
        }

        let mut page = Self::decode_page(response).await?;
        let mut ids = Vec::new();
        let mut scroll_id: Option<String> = None;

        loop {
            if page.scroll_id.is_some() {
                scroll_id = page.scroll_id.take();
            }
            if page.hits.hits.is_empty() {
                break;
            }
            ids.extend(page.hits.hits.into_iter().map(|hit| hit.id));

            let Some(current) = scroll_id.as_deref() else {
                break;
            };
            let next_url = self.endpoint(&["_search", "scroll"]);
            let next = json!({ "scroll": SCROLL_KEEP_ALIVE, "scroll_id": current });
            let response = self
                .send_with_retry(STORE_NAME, || self.http.post(next_url.clone()).json(&next))
                .await?;
            page = Self::decode_page(response).await?;
            debug!(fetched = ids.len(), "scrolled paying-users page");
        }

        if let Some(id) = scroll_id.as_deref() {
            self.clear_scroll(id).await;
        }

        Ok(ids)
    }
}

#[async_trait]
impl OutputStore for ElasticClient {
    async fn write(
        &self,
        index: &str,
        doc_id: &str,
        document: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let path = format!("{}/_doc/{}", index, doc_id);
        let url = self.endpoint(&[index, "_doc", doc_id]);

        let response = self
            .send_with_retry("output", || self.http.put(url.clone()).json(document))
            .await
            .map_err(|e| StoreError::Write {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Write {
            path,
            message: format!("HTTP {}: {}", status, truncate(&body)),
        })
    }
}
