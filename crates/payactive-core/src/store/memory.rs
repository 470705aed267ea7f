//! In-memory store fakes for pipeline tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{DayLogs, LoginEvent, LoginLogStore, OutputStore, PaymentStore};
use crate::error::StoreError;

#[derive(Default)]
pub struct MemoryPayments {
    pub ids: Vec<String>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl MemoryPayments {
    pub fn with_ids(ids: &[&str]) -> Self {
        Self {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl PaymentStore for MemoryPayments {
    async fn query_all(&self, _index: &str) -> Result<Vec<String>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StoreError::unavailable("payment", "connection refused"));
        }
        Ok(self.ids.clone())
    }
}

#[derive(Default)]
pub struct MemoryLogins {
    pub days: BTreeMap<NaiveDate, Vec<LoginEvent>>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl MemoryLogins {
    pub fn for_day(day: NaiveDate, events: Vec<LoginEvent>) -> Self {
        let mut days = BTreeMap::new();
        days.insert(day, events);
        Self {
            days,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl LoginLogStore for MemoryLogins {
    async fn read_day(
        &self,
        _key_prefix: &str,
        _event_type: &str,
        day: NaiveDate,
    ) -> Result<DayLogs, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StoreError::read("login log", "access denied"));
        }
        Ok(match self.days.get(&day) {
            Some(events) => DayLogs {
                events: events.clone(),
                exists: true,
                skipped: 0,
            },
            None => DayLogs::default(),
        })
    }
}

#[derive(Default)]
pub struct MemoryOutput {
    pub docs: Mutex<BTreeMap<String, serde_json::Value>>,
    pub fail_ids: HashSet<String>,
    pub attempts: AtomicUsize,
}

impl MemoryOutput {
    pub fn failing_on(ids: &[&str]) -> Self {
        Self {
            fail_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, serde_json::Value> {
        self.docs.lock().map(|docs| docs.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OutputStore for MemoryOutput {
    async fn write(
        &self,
        index: &str,
        doc_id: &str,
        document: &serde_json::Value,
    ) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let path = format!("{}/_doc/{}", index, doc_id);
        if self.fail_ids.contains(doc_id) {
            return Err(StoreError::Write {
                path,
                message: "HTTP 503".into(),
            });
        }
        if let Ok(mut docs) = self.docs.lock() {
            docs.insert(path, document.clone());
        }
        Ok(())
    }
}
