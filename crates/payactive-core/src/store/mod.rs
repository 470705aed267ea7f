//! Store collaborators
//!
//! The pipeline only sees these traits. Concrete clients live in the
//! submodules; tests substitute in-memory fakes.

pub mod elastic;
pub mod login_log;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::StoreError;

pub use elastic::ElasticClient;
pub use login_log::ObjectLoginLog;

/// One login, as written by the login-logging pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginEvent {
    pub player_id: String,
    pub platform: String,
    pub channel: String,
}

impl LoginEvent {
    pub fn new(player_id: &str, platform: &str, channel: &str) -> Self {
        Self {
            player_id: player_id.to_string(),
            platform: platform.to_string(),
            channel: channel.to_string(),
        }
    }
}

/// Result of reading one day of login logs.
#[derive(Debug, Clone, Default)]
pub struct DayLogs {
    pub events: Vec<LoginEvent>,
    /// `false` when no data exists for the day at all.
    pub exists: bool,
    /// Lines that were malformed or missing a required field.
    pub skipped: usize,
}

/// Source of paying-user identifiers.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Full scan of `index`, returning every record id.
    async fn query_all(&self, index: &str) -> Result<Vec<String>, StoreError>;
}

/// Source of raw login events.
#[async_trait]
pub trait LoginLogStore: Send + Sync {
    async fn read_day(
        &self,
        key_prefix: &str,
        event_type: &str,
        day: NaiveDate,
    ) -> Result<DayLogs, StoreError>;
}

/// Destination for per-segment documents. Writes are upserts.
#[async_trait]
pub trait OutputStore: Send + Sync {
    async fn write(
        &self,
        index: &str,
        doc_id: &str,
        document: &serde_json::Value,
    ) -> Result<(), StoreError>;
}
