//! One day's run: load → aggregate → intersect → emit
//!
//! All stores are passed in at construction; the pipeline holds no global
//! state and owns its in-memory sets only for the duration of a run.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregator::intersect;
use crate::config::JobSettings;
use crate::day::DayWindow;
use crate::emitter::{build_document, document_id, emit, EmitReport};
use crate::error::PipelineError;
use crate::logins::load_logins;
use crate::paying::load_paying_users;
use crate::store::{LoginEvent, LoginLogStore, OutputStore, PaymentStore};

/// Counts for one day, ready to be emitted.
#[derive(Debug, Clone)]
pub struct Computation {
    pub window: DayWindow,
    pub paying_users: usize,
    pub login_events: usize,
    pub skipped_lines: usize,
    pub counts: BTreeMap<String, u64>,
    pub representatives: HashMap<String, LoginEvent>,
}

impl Computation {
    fn empty(window: DayWindow) -> Self {
        Self {
            window,
            paying_users: 0,
            login_events: 0,
            skipped_lines: 0,
            counts: BTreeMap::new(),
            representatives: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Output rows in segment-key order.
    pub fn segments(&self, key_by_day: bool) -> Vec<SegmentCount> {
        self.counts
            .iter()
            .filter_map(|(segment, &count)| {
                let rep = self.representatives.get(segment)?;
                let doc = build_document(&self.window, count, rep);
                Some(SegmentCount {
                    segment: segment.clone(),
                    doc_id: document_id(segment, &self.window, key_by_day),
                    platform: doc.platform,
                    channel: doc.channel,
                    count,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentCount {
    pub segment: String,
    pub doc_id: String,
    pub platform: String,
    pub channel: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub day: String,
    pub timestamp: String,
    pub paying_users: usize,
    pub login_events: usize,
    pub skipped_lines: usize,
    pub segments: Vec<SegmentCount>,
    pub written: usize,
    pub dry_run: bool,
    pub processing_time_ms: u32,
}

pub struct Pipeline<'a> {
    job: &'a JobSettings,
    payments: &'a dyn PaymentStore,
    logins: &'a dyn LoginLogStore,
    output: &'a dyn OutputStore,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        job: &'a JobSettings,
        payments: &'a dyn PaymentStore,
        logins: &'a dyn LoginLogStore,
        output: &'a dyn OutputStore,
    ) -> Self {
        Self {
            job,
            payments,
            logins,
            output,
        }
    }

    /// Load both inputs and count active paying users per segment.
    ///
    /// No paying users means the login log is never read.
    pub async fn compute(&self, day: NaiveDate) -> Result<Computation, PipelineError> {
        let window = DayWindow::new(day);
        let mut computation = Computation::empty(window);

        let paying_users =
            load_paying_users(self.payments, &self.job.paying_users_index).await?;
        computation.paying_users = paying_users.len();
        if paying_users.is_empty() {
            info!("No paying users, nothing to compute");
            return Ok(computation);
        }

        let segments = load_logins(
            self.logins,
            &self.job.key_prefix,
            &self.job.login_event,
            day,
            self.job.id_scheme,
        )
        .await?;
        computation.login_events = segments.events;
        computation.skipped_lines = segments.skipped;
        if segments.is_empty() {
            info!(%day, "No logins for day, nothing to compute");
            return Ok(computation);
        }

        computation.counts = intersect(&paying_users, &segments.ids);
        computation.representatives = segments.representatives;
        if computation.counts.values().all(|&count| count == 0) {
            warn!(
                scheme = %self.job.id_scheme,
                "No login matched a paying user; check PAYING_USER_ID_SCHEME"
            );
        }
        info!(segments = computation.counts.len(), "Computed active paying users");
        Ok(computation)
    }

    /// Write every segment; fails if any single write failed.
    pub async fn emit(&self, computation: &Computation) -> Result<EmitReport, PipelineError> {
        let report = emit(
            self.output,
            &self.job.active_paying_users_index,
            &computation.window,
            &computation.counts,
            &computation.representatives,
            self.job.key_by_day,
        )
        .await;

        if !report.is_success() {
            return Err(PipelineError::Emit {
                failed: report.failed.len(),
                attempted: report.attempted,
            });
        }
        Ok(report)
    }

    /// Compute and, unless `dry_run`, emit.
    pub async fn run(&self, day: NaiveDate, dry_run: bool) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        let computation = self.compute(day).await?;

        let written = if dry_run {
            info!(segments = computation.counts.len(), "Dry run, skipping writes");
            0
        } else {
            self.emit(&computation).await?.written.len()
        };

        info!("Process end.");
        Ok(RunReport {
            day: computation.window.label(),
            timestamp: computation.window.timestamp(),
            paying_users: computation.paying_users,
            login_events: computation.login_events,
            skipped_lines: computation.skipped_lines,
            segments: computation.segments(self.job.key_by_day),
            written,
            dry_run,
            processing_time_ms: start.elapsed().as_millis() as u32,
        })
    }
}
