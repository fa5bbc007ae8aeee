//! Install job queue: an in-process queue for asynchronous package
//! installs. Jobs are tracked in a `DashMap` job table and run on a
//! bounded pool of tokio tasks gated by a semaphore sized to
//! `install_workers`, rather than an unbounded `tokio::spawn` per request.
//!
//! State machine: `Queued -> Started -> {Finished | Failed | Stopped}`,
//! plus `Deferred`/`Scheduled` accepted on the wire for forward
//! compatibility with a future distributed queue but never produced by
//! this in-process implementation.

use crate::error::PluginHostError;
use crate::installer::Installer;
use crate::model::{InstallJob, InstallJobRequest, JobStatus, PackageBrief};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

pub struct JobQueue {
    jobs: DashMap<String, InstallJob>,
    cancels: DashMap<String, Arc<Notify>>,
    semaphore: Arc<Semaphore>,
    installer: Arc<Installer>,
    timeout: Duration,
}

pub type SharedJobQueue = Arc<JobQueue>;

impl JobQueue {
    pub fn new(installer: Arc<Installer>, workers: usize, timeout: Duration) -> Arc<Self> {
        Arc::new(JobQueue {
            jobs: DashMap::new(),
            cancels: DashMap::new(),
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            installer,
            timeout,
        })
    }

    /// Enqueue a new install job under a fresh id, returning that id
    /// immediately (§4.2 Enqueue). The job runs on the worker pool in the
    /// background.
    pub fn enqueue(self: &Arc<Self>, req: InstallJobRequest) -> String {
        let job_id = uuid::Uuid::new_v4().to_string();
        self.start(job_id.clone(), req);
        job_id
    }

    /// Re-run a job under its existing id with its original request,
    /// cancelling any in-flight attempt first. The job_id never changes
    /// across a retry, mirroring `RetryInstallPackage`'s "same func/args,
    /// same job_id" re-enqueue.
    pub fn retry(self: &Arc<Self>, job_id: &str) -> Result<(), PluginHostError> {
        let req = self
            .jobs
            .get(job_id)
            .ok_or_else(|| PluginHostError::JobNotFound(job_id.to_string()))?
            .request
            .clone();

        if let Some(cancel) = self.cancels.get(job_id) {
            // `notify_one`, not `notify_waiters`: a still-`QUEUED` job hasn't
            // called `cancel.notified()` yet (it's blocked on the semaphore
            // permit), so only a stored permit — not a broadcast to current
            // waiters — reaches it once it does.
            cancel.notify_one();
        }
        self.start(job_id.to_string(), req);
        Ok(())
    }

    /// Cancel a job that hasn't reached a terminal state yet (§4.2 Cancel).
    pub fn cancel(&self, job_id: &str) -> Result<(), PluginHostError> {
        let status = self
            .jobs
            .get(job_id)
            .ok_or_else(|| PluginHostError::JobNotFound(job_id.to_string()))?
            .status;

        if !status.is_cancellable() {
            return Err(PluginHostError::JobNotCancellable {
                job_id: job_id.to_string(),
                status: format!("{status:?}"),
            });
        }

        if let Some(cancel) = self.cancels.get(job_id) {
            // See the matching comment in `retry`: `notify_one` stores a
            // permit so a job still queued behind the semaphore still
            // observes the cancellation once it reaches `cancel.notified()`.
            cancel.notify_one();
        }
        Ok(())
    }

    /// Current state of a job, or `None` if no job with this id has ever
    /// been enqueued (§4.2 Status).
    pub fn status(&self, job_id: &str) -> Option<InstallJob> {
        self.jobs.get(job_id).map(|j| j.clone())
    }

    fn start(self: &Arc<Self>, job_id: String, req: InstallJobRequest) {
        self.jobs.insert(
            job_id.clone(),
            InstallJob { job_id: job_id.clone(), status: JobStatus::Queued, reason: None, data: None, request: req.clone() },
        );
        let cancel = Arc::new(Notify::new());
        self.cancels.insert(job_id.clone(), cancel.clone());

        let this = self.clone();
        tokio::spawn(async move {
            this.run_job(job_id, req, cancel).await;
        });
    }

    async fn run_job(self: Arc<Self>, job_id: String, req: InstallJobRequest, cancel: Arc<Notify>) {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        self.set_status(&job_id, JobStatus::Started, None, None);

        tokio::select! {
            _ = cancel.notified() => {
                self.set_status(&job_id, JobStatus::Stopped, Some("cancelled".to_string()), None);
            }
            _ = tokio::time::sleep(self.timeout) => {
                tracing::warn!(job_id, "install job timed out");
                self.set_status(&job_id, JobStatus::Failed, Some("worker_job_timeout exceeded".to_string()), None);
            }
            result = self.installer.install(&req.uri, &req.filename, req.force) => {
                match result {
                    Ok(brief) => self.finish(&job_id, brief),
                    Err(e) => self.set_status(&job_id, JobStatus::Failed, Some(e.to_string()), None),
                }
            }
        }

        drop(permit);
        self.cancels.remove(&job_id);
    }

    fn set_status(&self, job_id: &str, status: JobStatus, reason: Option<String>, data: Option<PackageBrief>) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.status = status;
            job.reason = reason;
            job.data = data;
        }
    }

    fn finish(&self, job_id: &str, brief: PackageBrief) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.status = JobStatus::Finished;
            job.reason = None;
            job.data = Some(brief);
        }
    }
}
