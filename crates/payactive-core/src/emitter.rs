//! Per-segment output documents
//!
//! One upsert per segment, keyed `<index>/_doc/<segment_key>`. Writes are
//! independent: a failure is recorded and the next segment is still attempted.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{info, warn};

use crate::channels::resolve_channel;
use crate::day::DayWindow;
use crate::store::{LoginEvent, OutputStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputDocument {
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    pub count: u64,
    pub platform: String,
    pub channel: String,
}

/// Build the document for one segment from its representative login.
pub fn build_document(window: &DayWindow, count: u64, representative: &LoginEvent) -> OutputDocument {
    OutputDocument {
        timestamp: window.timestamp(),
        count,
        platform: representative.platform.to_lowercase(),
        channel: resolve_channel(&representative.channel).to_lowercase(),
    }
}

/// Document id for a segment; optionally suffixed with the day.
pub fn document_id(segment_key: &str, window: &DayWindow, key_by_day: bool) -> String {
    if key_by_day {
        format!("{}_{}", segment_key, window.label())
    } else {
        segment_key.to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EmitReport {
    pub attempted: usize,
    pub written: Vec<String>,
    pub failed: Vec<String>,
}

impl EmitReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Write one document per counted segment.
pub async fn emit(
    store: &dyn OutputStore,
    index: &str,
    window: &DayWindow,
    counts: &BTreeMap<String, u64>,
    representatives: &HashMap<String, LoginEvent>,
    key_by_day: bool,
) -> EmitReport {
    let mut report = EmitReport::default();
    if counts.is_empty() {
        return report;
    }

    for (segment, &count) in counts {
        report.attempted += 1;
        let doc_id = document_id(segment, window, key_by_day);
        let path = format!("{}/_doc/{}", index, doc_id);

        let Some(representative) = representatives.get(segment) else {
            warn!(segment = %segment, "no representative login for segment");
            report.failed.push(path);
            continue;
        };

        let document = match serde_json::to_value(build_document(window, count, representative)) {
            Ok(document) => document,
            Err(e) => {
                warn!(path = %path, error = %e, "Output document could not be encoded");
                report.failed.push(path);
                continue;
            }
        };
        match store.write(index, &doc_id, &document).await {
            Ok(()) => {
                info!(path = %path, data = %document, "Output document written");
                report.written.push(path);
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Output document write failed");
                report.failed.push(path);
            }
        }
    }

    report
}
