//! Job lifecycle manager.
//!
//! States: Queued -> InProgress -> {Completed | Failed}. Terminal states are
//! final and there are no retries. All writes go through `JobStore::transition`,
//! so a transition from the wrong state is rejected without touching the record.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::finance::AnalysisResult;
use crate::job::{AnalysisJob, JobId, JobStatus};
use crate::store::{InMemoryJobStore, JobStore, SwapOutcome, Transition};

const BLANK_FAILURE_MESSAGE: &str = "job failed without an error message";

#[derive(Debug, Error, PartialEq)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("analysis not yet completed for job {job_id} (status: {status})")]
    NotReady { job_id: JobId, status: JobStatus },

    #[error("job {job_id} cannot move from {current} to {requested}")]
    InvalidTransition {
        job_id: JobId,
        current: JobStatus,
        requested: JobStatus,
    },
}

/// Single source of truth for job status and results.
#[derive(Clone)]
pub struct JobManager {
    store: Arc<dyn JobStore>,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryJobStore::new()))
    }
}

impl JobManager {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Register a new queued job. Does no parsing or analysis.
    pub fn create(&self) -> AnalysisJob {
        let job = AnalysisJob::new();
        self.store.insert(job.clone());
        info!(job_id = %job.job_id, "job queued");
        job
    }

    pub fn begin(&self, id: &JobId) -> Result<AnalysisJob, JobError> {
        let job = self.apply(id, Transition::new(JobStatus::Queued, JobStatus::InProgress))?;
        debug!(job_id = %id, "job started");
        Ok(job)
    }

    pub fn complete(&self, id: &JobId, result: AnalysisResult) -> Result<AnalysisJob, JobError> {
        let counts = (
            result.categorized_transactions.len(),
            result.insights.len(),
            result.predictions.len(),
        );
        let t = Transition::new(JobStatus::InProgress, JobStatus::Completed).with_result(result);
        let job = self.apply(id, t)?;
        info!(
            job_id = %id,
            transactions = counts.0,
            insights = counts.1,
            predictions = counts.2,
            "job completed"
        );
        Ok(job)
    }

    pub fn fail(&self, id: &JobId, message: impl Into<String>) -> Result<AnalysisJob, JobError> {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = BLANK_FAILURE_MESSAGE.to_string();
        }
        warn!(job_id = %id, error = %message, "job failed");
        let t = Transition::new(JobStatus::InProgress, JobStatus::Failed).with_error(message);
        self.apply(id, t)
    }

    pub fn get_status(&self, id: &JobId) -> Result<AnalysisJob, JobError> {
        self.store.get(id).ok_or(JobError::NotFound(*id))
    }

    pub fn get_result(&self, id: &JobId) -> Result<Arc<AnalysisResult>, JobError> {
        let job = self.get_status(id)?;
        if job.status != JobStatus::Completed {
            return Err(JobError::NotReady {
                job_id: *id,
                status: job.status,
            });
        }
        // Completed implies the result was stored in the same transition.
        self.store.result(id).ok_or(JobError::NotFound(*id))
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn apply(&self, id: &JobId, t: Transition) -> Result<AnalysisJob, JobError> {
        let requested = t.to;
        match self.store.transition(id, t) {
            SwapOutcome::Applied(job) => Ok(job),
            SwapOutcome::Rejected { current } => Err(JobError::InvalidTransition {
                job_id: *id,
                current,
                requested,
            }),
            SwapOutcome::Missing => Err(JobError::NotFound(*id)),
        }
    }
}
