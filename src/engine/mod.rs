//! Bounded worker pool that deletes resources and tracks their operations.
//!
//! The producer pushes every job into a queue whose capacity equals the
//! worker count, then closes it. Exactly `workers` long-lived tasks drain the
//! queue; each owns one job at a time, from the delete call until its
//! operation is terminal or the deadline passes. [`DeletionEngine::delete_all`]
//! returns once every worker has exited.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, warn};

use crate::compute::{ComputeError, Operation, OperationStatus};
use crate::deleter::{DeletionJob, StatusQuerier};
use crate::resource::ResourceKind;

/// Default delay between operation status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default time a worker waits for one operation before giving up.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(600);

/// Why a single deletion job did not complete.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum JobFailure {
    /// The delete call itself failed.
    #[error("delete of {kind} {resource} failed: {source}")]
    DeleteIssue {
        /// Resource name.
        resource: String,
        /// Resource kind.
        kind: ResourceKind,
        /// Underlying API error.
        #[source]
        source: ComputeError,
    },
    /// The operation finished with an error status.
    #[error("operation {operation} deleting {kind} {resource} failed: {message}")]
    OperationFailed {
        /// Resource name.
        resource: String,
        /// Resource kind.
        kind: ResourceKind,
        /// Operation id.
        operation: String,
        /// Error summary reported by the API.
        message: String,
    },
    /// Querying the operation status failed.
    #[error("cannot query operation {operation} deleting {kind} {resource}: {source}")]
    OperationQuery {
        /// Resource name.
        resource: String,
        /// Resource kind.
        kind: ResourceKind,
        /// Operation id.
        operation: String,
        /// Underlying API error.
        #[source]
        source: ComputeError,
    },
    /// The operation did not finish before the deadline.
    #[error(
        "operation {operation} deleting {kind} {resource} still {last_status} after {}s",
        .waited.as_secs()
    )]
    TimedOut {
        /// Resource name.
        resource: String,
        /// Resource kind.
        kind: ResourceKind,
        /// Operation id.
        operation: String,
        /// Deadline that elapsed.
        waited: Duration,
        /// Last status observed.
        last_status: OperationStatus,
    },
    /// The delete call did not return before the deadline.
    #[error("delete of {kind} {resource} did not return within {}s", .waited.as_secs())]
    DeleteTimedOut {
        /// Resource name.
        resource: String,
        /// Resource kind.
        kind: ResourceKind,
        /// Deadline that elapsed.
        waited: Duration,
    },
    /// The task running the job panicked.
    #[error("worker panicked{}: {message}", panic_context(.resource.as_deref()))]
    Panicked {
        /// Resource being processed, when known.
        resource: Option<String>,
        /// Panic description.
        message: String,
    },
    /// No worker was left to accept the job.
    #[error("{kind} {resource} was never scheduled: no worker available")]
    Abandoned {
        /// Resource name.
        resource: String,
        /// Resource kind.
        kind: ResourceKind,
    },
}

fn panic_context(resource: Option<&str>) -> String {
    resource.map_or_else(String::new, |name| format!(" while deleting {name}"))
}

/// Resources deleted by a fully successful run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeletionSummary {
    /// Names of deleted resources, in completion order.
    pub deleted: Vec<String>,
}

/// Aggregate error returned when at least one job failed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{} of {} deletions failed", .failures.len(), .failures.len() + .deleted.len())]
pub struct DeletionError {
    /// Resources that were deleted despite the failures.
    pub deleted: Vec<String>,
    /// Per-job failures.
    pub failures: Vec<JobFailure>,
}

/// Bounded-concurrency deletion engine.
#[derive(Clone, Copy, Debug)]
pub struct DeletionEngine {
    workers: NonZeroUsize,
    poll_interval: Duration,
    operation_timeout: Duration,
}

impl DeletionEngine {
    /// Creates an engine running `workers` concurrent jobs.
    #[must_use]
    pub const fn new(workers: NonZeroUsize) -> Self {
        Self {
            workers,
            poll_interval: DEFAULT_POLL_INTERVAL,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Overrides the delay between status queries.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Overrides the per-operation deadline.
    #[must_use]
    pub const fn with_operation_timeout(mut self, operation_timeout: Duration) -> Self {
        self.operation_timeout = operation_timeout;
        self
    }

    /// Number of workers.
    #[must_use]
    pub const fn workers(&self) -> NonZeroUsize {
        self.workers
    }

    /// Runs every job and waits for all workers to exit.
    ///
    /// # Errors
    ///
    /// Returns [`DeletionError`] listing every job that did not complete.
    pub async fn delete_all(
        &self,
        jobs: Vec<DeletionJob>,
    ) -> Result<DeletionSummary, DeletionError> {
        let total = jobs.len();
        let (sender, receiver) = mpsc::channel::<DeletionJob>(self.workers.get());
        let queue = Arc::new(Mutex::new(receiver));

        let mut pool = JoinSet::new();
        for index in 0..self.workers.get() {
            pool.spawn(worker(index, Arc::clone(&queue), *self));
        }
        drop(queue);

        let mut failures = Vec::new();
        for job in jobs {
            if let Err(mpsc::error::SendError(rejected)) = sender.send(job).await {
                let resource = rejected.resource();
                failures.push(JobFailure::Abandoned {
                    resource: resource.name.clone(),
                    kind: resource.kind,
                });
            }
        }
        drop(sender);

        let mut deleted = Vec::new();
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(outcomes) => {
                    for outcome in outcomes {
                        match outcome {
                            Ok(name) => deleted.push(name),
                            Err(failure) => failures.push(failure),
                        }
                    }
                }
                Err(err) => failures.push(JobFailure::Panicked {
                    resource: None,
                    message: err.to_string(),
                }),
            }
        }

        info!(
            event = "janitor.engine.finished",
            total,
            deleted = deleted.len(),
            failed = failures.len(),
        );
        if failures.is_empty() {
            Ok(DeletionSummary { deleted })
        } else {
            Err(DeletionError { deleted, failures })
        }
    }

    async fn run_job(self, job: DeletionJob) -> Result<String, JobFailure> {
        let deadline = Instant::now() + self.operation_timeout;
        let resource = job.resource();
        let (name, kind) = (resource.name.clone(), resource.kind);
        let issued = timeout_at(deadline, job.issue_delete())
            .await
            .map_err(|_elapsed| JobFailure::DeleteTimedOut {
                resource: name.clone(),
                kind,
                waited: self.operation_timeout,
            })?
            .map_err(|source| JobFailure::DeleteIssue {
                resource: name.clone(),
                kind,
                source,
            })?;
        info!(
            event = "janitor.engine.delete_issued",
            kind = %kind,
            project = job.project(),
            scope = %job.scope(),
            resource = %name,
            operation = %issued.id,
            status = %issued.status,
        );

        let finished = if issued.status.is_terminal() {
            issued
        } else {
            let querier = job.status_querier(&issued);
            self.await_operation(&querier, issued, deadline, &name, kind).await?
        };

        if finished.status == OperationStatus::Failed {
            return Err(JobFailure::OperationFailed {
                resource: name,
                kind,
                operation: finished.id,
                message: finished
                    .error
                    .unwrap_or_else(|| String::from("operation reported FAILED")),
            });
        }
        info!(
            event = "janitor.engine.deleted",
            kind = %kind,
            resource = %name,
            operation = %finished.id,
        );
        Ok(name)
    }

    /// Polls until the operation is terminal. The sleep and the status call
    /// both count against `deadline`.
    async fn await_operation(
        self,
        querier: &StatusQuerier,
        issued: Operation,
        deadline: Instant,
        name: &str,
        kind: ResourceKind,
    ) -> Result<Operation, JobFailure> {
        let id = issued.id.clone();
        let mut current = issued;
        loop {
            info!(
                event = "janitor.engine.operation_pending",
                operation = %current.id,
                start_time = current.start_time.as_deref().unwrap_or("unknown"),
                status = %current.status,
                target = %current.target_link,
                endpoint = %querier.endpoint(),
            );
            let poll = async {
                sleep(self.poll_interval).await;
                querier.fetch(&id).await
            };
            let Ok(polled) = timeout_at(deadline, poll).await else {
                return Err(JobFailure::TimedOut {
                    resource: name.to_owned(),
                    kind,
                    operation: id.clone(),
                    waited: self.operation_timeout,
                    last_status: current.status,
                });
            };
            current = polled.map_err(|source| JobFailure::OperationQuery {
                resource: name.to_owned(),
                kind,
                operation: id.clone(),
                source,
            })?;
            if current.status.is_terminal() {
                return Ok(current);
            }
        }
    }
}

async fn worker(
    index: usize,
    queue: Arc<Mutex<mpsc::Receiver<DeletionJob>>>,
    engine: DeletionEngine,
) -> Vec<Result<String, JobFailure>> {
    debug!(event = "janitor.engine.worker_start", worker = index);
    let mut outcomes = Vec::new();
    loop {
        let next = queue.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };
        let name = job.resource().name.clone();
        // A panicking job must not take its worker down with it.
        let outcome = match tokio::spawn(engine.run_job(job)).await {
            Ok(outcome) => outcome,
            Err(err) => Err(JobFailure::Panicked {
                resource: Some(name),
                message: err.to_string(),
            }),
        };
        if let Err(failure) = &outcome {
            warn!(event = "janitor.engine.job_failed", worker = index, error = %failure);
        }
        outcomes.push(outcome);
    }
    debug!(event = "janitor.engine.worker_exit", worker = index, jobs = outcomes.len());
    outcomes
}
