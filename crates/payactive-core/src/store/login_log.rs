//! Login log reader over object storage
//!
//! Logs are JSON lines partitioned by day:
//! `{key_prefix}/{event_type}/{YYYY}/{MM}/{DD}/<any object>`.
//! Backed by S3 in production and a local directory for development.

use std::path::Path as FsPath;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::ObjectStore;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{DayLogs, LoginEvent, LoginLogStore};
use crate::config::{LoginSource, S3Settings};
use crate::day::DayWindow;
use crate::error::StoreError;

const STORE_NAME: &str = "login log";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    UInt(u64),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Int(n) => n.to_string(),
            Scalar::UInt(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLogin {
    player_id: Option<Scalar>,
    platform: Option<String>,
    channel: Option<String>,
}

impl RawLogin {
    fn validate(self) -> Option<LoginEvent> {
        let player_id = self.player_id?.into_string();
        let platform = self.platform?;
        let channel = self.channel?;
        if player_id.is_empty() || platform.is_empty() || channel.is_empty() {
            return None;
        }
        Some(LoginEvent {
            player_id,
            platform,
            channel,
        })
    }
}

pub struct ObjectLoginLog {
    store: Arc<dyn ObjectStore>,
}

impl ObjectLoginLog {
    pub fn from_source(source: &LoginSource) -> Result<Self, StoreError> {
        match source {
            LoginSource::S3(s3) => Self::s3(s3),
            LoginSource::Local(root) => Self::local(root),
        }
    }

    pub fn s3(settings: &S3Settings) -> Result<Self, StoreError> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&settings.bucket);

        if let Some(region) = &settings.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &settings.endpoint {
            // object_store requires an absolute url
            let endpoint_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                endpoint.clone()
            } else {
                format!("https://{}", endpoint)
            };
            builder = builder
                .with_allow_http(endpoint_url.starts_with("http://"))
                .with_endpoint(endpoint_url);
        }

        let store = builder
            .build()
            .map_err(|e| StoreError::unavailable(STORE_NAME, e))?;
        info!("Login logs: s3://{}", settings.bucket);

        Ok(Self {
            store: Arc::new(store),
        })
    }

    pub fn local(root: &FsPath) -> Result<Self, StoreError> {
        let canonical = std::fs::canonicalize(root).map_err(|e| {
            StoreError::unavailable(STORE_NAME, format!("{}: {}", root.display(), e))
        })?;
        let store = LocalFileSystem::new_with_prefix(&canonical)
            .map_err(|e| StoreError::unavailable(STORE_NAME, e))?;
        info!("Login logs: local directory {}", canonical.display());

        Ok(Self {
            store: Arc::new(store),
        })
    }
}

/// `{key_prefix}/{event_type}/{YYYY}/{MM}/{DD}` with empty parts dropped.
pub fn day_prefix(key_prefix: &str, event_type: &str, window: &DayWindow) -> String {
    let partition = window.partition();
    [key_prefix, event_type, partition.as_str()]
        .iter()
        .map(|part| part.trim_matches('/'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse one JSON-lines object into `logs`, counting lines that fail validation.
fn parse_lines(data: &[u8], logs: &mut DayLogs) {
    for line in data.split(|b| *b == b'\n') {
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }

        let mut bytes = trimmed.to_vec();
        match simd_json::from_slice::<RawLogin>(&mut bytes)
            .ok()
            .and_then(RawLogin::validate)
        {
            Some(event) => logs.events.push(event),
            None => logs.skipped += 1,
        }
    }
}

#[async_trait]
impl LoginLogStore for ObjectLoginLog {
    async fn read_day(
        &self,
        key_prefix: &str,
        event_type: &str,
        day: NaiveDate,
    ) -> Result<DayLogs, StoreError> {
        let window = DayWindow::new(day);
        let prefix = Path::from(day_prefix(key_prefix, event_type, &window));

        let mut objects: Vec<Path> = self
            .store
            .list(Some(&prefix))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await?;

        let mut logs = DayLogs::default();
        if objects.is_empty() {
            info!(prefix = %prefix, "no login logs for day");
            return Ok(logs);
        }
        logs.exists = true;
        objects.sort();

        for location in objects {
            let data = self.store.get(&location).await?.bytes().await?;
            let before = logs.events.len();
            parse_lines(&data, &mut logs);
            debug!(object = %location, events = logs.events.len() - before, "read login log object");
        }

        if logs.skipped > 0 {
            warn!(skipped = logs.skipped, prefix = %prefix, "skipped malformed login log lines");
        }

        Ok(logs)
    }
}
