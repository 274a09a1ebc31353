//! Job pipeline: submission, bounded worker pool, and result queries.
//!
//! `submit` only creates the job and hands the bytes to a spawned task. The
//! task waits for a worker permit (job stays Queued), then runs
//! parse -> analyze -> store in sequence (job is InProgress). Any failure,
//! panics included, ends in `fail` with a message; nothing propagates out of
//! the worker.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ledgerlens_core::{
    AnalysisJob, AnalysisResult, Insight, JobError, JobId, JobManager, JobStore, Prediction,
    Transaction,
};
use ledgerlens_ingest::{FileFormat, ParseError, UnsupportedFormat};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::analysis::AnalysisEngine;
use crate::classifier::Classifier;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Jobs allowed to run at once; the rest wait in Queued.
    pub max_concurrent_jobs: usize,
    /// Upper bound on the categorization call.
    pub classifier_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            classifier_timeout: Duration::from_secs(30),
        }
    }
}

/// Why a running job failed. The Display text becomes the job's error message.
#[derive(Debug, Error)]
enum StageError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unexpected error during file processing: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct Pipeline {
    jobs: JobManager,
    engine: Arc<AnalysisEngine>,
    permits: Arc<Semaphore>,
}

impl Pipeline {
    /// Pipeline backed by the in-memory store.
    pub fn new(classifier: Arc<dyn Classifier>, config: PipelineConfig) -> Self {
        Self::with_manager(JobManager::default(), classifier, config)
    }

    pub fn with_store(
        store: Arc<dyn JobStore>,
        classifier: Arc<dyn Classifier>,
        config: PipelineConfig,
    ) -> Self {
        Self::with_manager(JobManager::new(store), classifier, config)
    }

    fn with_manager(
        jobs: JobManager,
        classifier: Arc<dyn Classifier>,
        config: PipelineConfig,
    ) -> Self {
        let engine = AnalysisEngine::new(classifier).with_timeout(config.classifier_timeout);
        Self {
            jobs,
            engine: Arc::new(engine),
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
        }
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    /// Create a job and schedule it. Returns before any parsing happens.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, bytes: Vec<u8>, format: FileFormat) -> JobId {
        let job = self.jobs.create();
        let id = job.job_id;
        info!(job_id = %id, ?format, size = bytes.len(), "file accepted");

        tokio::spawn(run_job(
            self.jobs.clone(),
            self.engine.clone(),
            self.permits.clone(),
            id,
            bytes,
            format,
        ));
        id
    }

    /// Like `submit`, with the format taken from the file name. Unsupported
    /// extensions are rejected before a job exists.
    pub fn submit_file(&self, filename: &str, bytes: Vec<u8>) -> Result<JobId, UnsupportedFormat> {
        let format = FileFormat::from_filename(filename)?;
        Ok(self.submit(bytes, format))
    }

    pub fn status(&self, id: &JobId) -> Result<AnalysisJob, JobError> {
        self.jobs.get_status(id)
    }

    pub fn categorized_transactions(&self, id: &JobId) -> Result<Vec<Transaction>, JobError> {
        Ok(self.jobs.get_result(id)?.categorized_transactions.clone())
    }

    pub fn insights(&self, id: &JobId) -> Result<Vec<Insight>, JobError> {
        Ok(self.jobs.get_result(id)?.insights.clone())
    }

    pub fn predictions(&self, id: &JobId) -> Result<Vec<Prediction>, JobError> {
        Ok(self.jobs.get_result(id)?.predictions.clone())
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait(&self, id: &JobId, poll_interval: Duration) -> Result<AnalysisJob, JobError> {
        loop {
            let job = self.status(id)?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

async fn run_job(
    jobs: JobManager,
    engine: Arc<AnalysisEngine>,
    permits: Arc<Semaphore>,
    id: JobId,
    bytes: Vec<u8>,
    format: FileFormat,
) {
    // The semaphore is never closed, so acquire only fails if that changes.
    let Ok(_permit) = permits.acquire_owned().await else {
        warn!(job_id = %id, "worker pool closed; job left queued");
        return;
    };

    if let Err(e) = jobs.begin(&id) {
        warn!(job_id = %id, error = %e, "could not start job");
        return;
    }

    let outcome = match process(engine, bytes, format).await {
        Ok(result) => jobs.complete(&id, result),
        Err(e) => jobs.fail(&id, e.to_string()),
    };
    if let Err(e) = outcome {
        warn!(job_id = %id, error = %e, "could not record job outcome");
    }
}

async fn process(
    engine: Arc<AnalysisEngine>,
    bytes: Vec<u8>,
    format: FileFormat,
) -> Result<AnalysisResult, StageError> {
    let transactions = tokio::task::spawn_blocking(move || ledgerlens_ingest::parse(&bytes, format))
        .await
        .context("parser task panicked")??;

    // Own task so a panic inside the classifier surfaces as a JoinError.
    let result = tokio::spawn(async move { engine.analyze(transactions).await })
        .await
        .context("analysis task panicked")??;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use ledgerlens_core::{Category, InMemoryJobStore, InsightType, JobStatus};

    use crate::classifier::KeywordClassifier;

    const POLL: Duration = Duration::from_millis(5);

    fn keyword_pipeline() -> Pipeline {
        Pipeline::new(Arc::new(KeywordClassifier), PipelineConfig::default())
    }

    async fn wait(p: &Pipeline, id: &JobId) -> AnalysisJob {
        tokio::time::timeout(Duration::from_secs(10), p.wait(id, POLL))
            .await
            .expect("job did not finish")
            .unwrap()
    }

    /// Blocks each call until the test releases a permit on `gate`.
    struct Gated {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl Classifier for Gated {
        fn name(&self) -> &str {
            "gated"
        }

        async fn categorize(&self, descriptions: &[String]) -> Result<Vec<Category>> {
            let _p = self.gate.acquire().await?;
            Ok(vec![Category::Shopping; descriptions.len()])
        }
    }

    struct Failing;

    #[async_trait]
    impl Classifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn categorize(&self, _descriptions: &[String]) -> Result<Vec<Category>> {
            anyhow::bail!("service unavailable")
        }
    }

    struct Panicking;

    #[async_trait]
    impl Classifier for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn categorize(&self, _descriptions: &[String]) -> Result<Vec<Category>> {
            panic!("classifier exploded")
        }
    }

    const CSV: &str = "Date,Description,Amount\n\
                       2026-01-02,WHOLE FOODS,30.00\n\
                       2026-01-03,WHOLE FOODS,45.00\n\
                       2026-01-04,PAYROLL ACME,-2500.00\n";

    #[tokio::test]
    async fn test_submit_returns_queued_job_immediately() {
        let p = keyword_pipeline();
        let id = p.submit(CSV.as_bytes().to_vec(), FileFormat::Csv);
        // Current-thread runtime: the worker has not run yet.
        assert_eq!(p.status(&id).unwrap().status, JobStatus::Queued);
        assert!(matches!(
            p.insights(&id),
            Err(JobError::NotReady { status: JobStatus::Queued, .. })
        ));
    }

    #[tokio::test]
    async fn test_completed_job_exposes_all_results() {
        let p = keyword_pipeline();
        let id = p.submit(CSV.as_bytes().to_vec(), FileFormat::Csv);
        let job = wait(&p, &id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error_message.is_none());

        let txns = p.categorized_transactions(&id).unwrap();
        assert_eq!(txns.len(), 3);
        assert_eq!(txns[0].category, Category::Groceries);
        assert_eq!(txns[2].category, Category::Salary);

        let insights = p.insights(&id).unwrap();
        let groceries: Vec<_> = insights
            .iter()
            .filter(|i| i.kind == InsightType::SpendingPattern)
            .collect();
        assert_eq!(groceries.len(), 1);
        assert_eq!(groceries[0].data["total_spent"], serde_json::json!(75.0));

        // January 2026 is never "this month" when the suite runs later.
        assert!(p.predictions(&id).is_ok());
    }

    #[tokio::test]
    async fn test_caller_supplied_store_holds_jobs_and_results() {
        let store = Arc::new(InMemoryJobStore::new());
        let p = Pipeline::with_store(
            store.clone(),
            Arc::new(KeywordClassifier),
            PipelineConfig::default(),
        );
        let id = p.submit(CSV.as_bytes().to_vec(), FileFormat::Csv);
        assert_eq!(store.len(), 1);

        wait(&p, &id).await;
        assert_eq!(store.get(&id).unwrap().status, JobStatus::Completed);
        let result = store.result(&id).unwrap();
        assert_eq!(result.categorized_transactions.len(), 3);
    }

    #[tokio::test]
    async fn test_parse_error_fails_job_with_message() {
        let p = keyword_pipeline();
        let id = p.submit(b"Date,Description\n2026-01-02,Coffee\n".to_vec(), FileFormat::Csv);
        let job = wait(&p, &id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("Amount"));
        assert!(matches!(
            p.categorized_transactions(&id),
            Err(JobError::NotReady { status: JobStatus::Failed, .. })
        ));
    }

    #[tokio::test]
    async fn test_unsupported_extension_creates_no_job() {
        let p = keyword_pipeline();
        let err = p.submit_file("notes.txt", CSV.as_bytes().to_vec()).unwrap_err();
        assert_eq!(err.name, "notes.txt");
        assert!(p.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let p = keyword_pipeline();
        let id = JobId::new();
        assert_eq!(p.status(&id), Err(JobError::NotFound(id)));
        assert!(matches!(p.predictions(&id), Err(JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_classifier_error_is_wrapped() {
        let p = Pipeline::new(Arc::new(Failing), PipelineConfig::default());
        let id = p.submit(CSV.as_bytes().to_vec(), FileFormat::Csv);
        let job = wait(&p, &id).await;
        assert_eq!(job.status, JobStatus::Failed);
        let msg = job.error_message.unwrap();
        assert!(msg.starts_with("unexpected error during file processing"), "{msg}");
        assert!(msg.contains("service unavailable"), "{msg}");
    }

    #[tokio::test]
    async fn test_classifier_panic_fails_job_only() {
        let p = Pipeline::new(Arc::new(Panicking), PipelineConfig::default());
        let id = p.submit(CSV.as_bytes().to_vec(), FileFormat::Csv);
        let job = wait(&p, &id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("panicked"));
    }

    #[tokio::test]
    async fn test_classifier_timeout_fails_job() {
        let gate = Arc::new(Semaphore::new(0));
        let config = PipelineConfig {
            max_concurrent_jobs: 1,
            classifier_timeout: Duration::from_millis(20),
        };
        let p = Pipeline::new(Arc::new(Gated { gate }), config);
        let id = p.submit(CSV.as_bytes().to_vec(), FileFormat::Csv);
        let job = wait(&p, &id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_jobs_wait_for_a_worker_permit() {
        let gate = Arc::new(Semaphore::new(0));
        let config = PipelineConfig {
            max_concurrent_jobs: 1,
            classifier_timeout: Duration::from_secs(10),
        };
        let p = Pipeline::new(Arc::new(Gated { gate: gate.clone() }), config);

        let first = p.submit(CSV.as_bytes().to_vec(), FileFormat::Csv);
        let started = tokio::time::timeout(Duration::from_secs(5), async {
            while p.status(&first).unwrap().status != JobStatus::InProgress {
                tokio::time::sleep(POLL).await;
            }
        })
        .await;
        assert!(started.is_ok(), "first job never started");

        let second = p.submit(CSV.as_bytes().to_vec(), FileFormat::Csv);
        for _ in 0..5 {
            tokio::time::sleep(POLL).await;
        }
        assert_eq!(p.status(&second).unwrap().status, JobStatus::Queued);

        gate.add_permits(2);
        assert_eq!(wait(&p, &first).await.status, JobStatus::Completed);
        assert_eq!(wait(&p, &second).await.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_header_only_file_completes_empty() {
        let p = Pipeline::new(Arc::new(Failing), PipelineConfig::default());
        let id = p.submit(b"Date,Description,Amount\n".to_vec(), FileFormat::Csv);
        let job = wait(&p, &id).await;
        // No rows means no classifier call, so the failing classifier is never hit.
        assert_eq!(job.status, JobStatus::Completed);
        assert!(p.categorized_transactions(&id).unwrap().is_empty());
        assert!(p.insights(&id).unwrap().is_empty());
        assert!(p.predictions(&id).unwrap().is_empty());
    }
}
