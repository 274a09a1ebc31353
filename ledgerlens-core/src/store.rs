//! Job store abstraction.
//!
//! The pipeline only talks to `JobStore`, so a durable backend (sqlite, redis)
//! can replace the in-memory one without touching lifecycle logic.
//!
//! A job record and its result live in the same entry and are written by one
//! `transition` call, which makes "completed" and "result available" a single
//! atomic step.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;

use crate::finance::AnalysisResult;
use crate::job::{AnalysisJob, JobId, JobStatus};

/// Requested change for a compare-and-swap on a job's status.
#[derive(Debug, Clone)]
pub struct Transition {
    pub from: JobStatus,
    pub to: JobStatus,
    pub error_message: Option<String>,
    pub result: Option<AnalysisResult>,
}

impl Transition {
    pub fn new(from: JobStatus, to: JobStatus) -> Self {
        Self {
            from,
            to,
            error_message: None,
            result: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_result(mut self, result: AnalysisResult) -> Self {
        self.result = Some(result);
        self
    }
}

/// Outcome of a `transition` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SwapOutcome {
    /// Status matched `from`; the record now holds the new state.
    Applied(AnalysisJob),
    /// Status did not match; nothing was written.
    Rejected { current: JobStatus },
    Missing,
}

pub trait JobStore: Send + Sync {
    fn insert(&self, job: AnalysisJob);

    fn get(&self, id: &JobId) -> Option<AnalysisJob>;

    /// Result for a job, present only once it has been completed.
    fn result(&self, id: &JobId) -> Option<Arc<AnalysisResult>>;

    /// Atomically move `id` from `t.from` to `t.to`.
    fn transition(&self, id: &JobId, t: Transition) -> SwapOutcome;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct Entry {
    job: AnalysisJob,
    result: Option<Arc<AnalysisResult>>,
}

/// Process-local store. Jobs are kept for the lifetime of the process.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    entries: RwLock<HashMap<JobId, Entry>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: AnalysisJob) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(job.job_id, Entry { job, result: None });
    }

    fn get(&self, id: &JobId) -> Option<AnalysisJob> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(id).map(|e| e.job.clone())
    }

    fn result(&self, id: &JobId) -> Option<Arc<AnalysisResult>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(id).and_then(|e| e.result.clone())
    }

    fn transition(&self, id: &JobId, t: Transition) -> SwapOutcome {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = entries.get_mut(id) else {
            return SwapOutcome::Missing;
        };
        if entry.job.status != t.from {
            return SwapOutcome::Rejected {
                current: entry.job.status,
            };
        }

        entry.job.status = t.to;
        entry.job.updated_at = Utc::now();
        if let Some(msg) = t.error_message {
            entry.job.error_message = Some(msg);
        }
        if let Some(result) = t.result {
            entry.result = Some(Arc::new(result));
        }
        SwapOutcome::Applied(entry.job.clone())
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
