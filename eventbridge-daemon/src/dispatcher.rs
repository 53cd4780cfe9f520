//! Worker pool draining the dispatch channel.
//!
//! A fixed number of workers share one receiver. Each worker takes a job,
//! runs it to completion, and pushes the [`JobResult`] onto the result
//! channel. A failed run is turned into an error result, so every job
//! dispatched yields exactly one result.
//!
//! Workers stop on the shutdown broadcast or when either channel closes.
//! A job already running is never interrupted.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;

use eventbridge_core::job::{Job, JobResult};
use eventbridge_core::metrics as m;
use eventbridge_ingest::DispatchReceiver;

/// Spawn `workers` tasks that drain `jobs` into `results`.
pub fn spawn_workers(
    workers: usize,
    jobs: DispatchReceiver,
    results: mpsc::Sender<JobResult>,
    shutdown_tx: &broadcast::Sender<()>,
) -> Vec<JoinHandle<()>> {
    let jobs = Arc::new(Mutex::new(jobs));

    let handles: Vec<_> = (0..workers)
        .map(|worker_id| {
            tokio::spawn(run_worker(
                worker_id,
                Arc::clone(&jobs),
                results.clone(),
                shutdown_tx.subscribe(),
            ))
        })
        .collect();

    tracing::info!(workers = workers, "dispatcher workers started");
    handles
}

async fn run_worker(
    worker_id: usize,
    jobs: Arc<Mutex<DispatchReceiver>>,
    results: mpsc::Sender<JobResult>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        let next = tokio::select! {
            job = async { jobs.lock().await.recv().await } => job,
            _ = shutdown_rx.recv() => {
                tracing::debug!(worker_id = worker_id, "worker shutting down");
                break;
            }
        };

        let Some(mut job) = next else {
            tracing::debug!(worker_id = worker_id, "dispatch channel closed, worker exiting");
            break;
        };

        let job_id = job.id();
        let job_type = job.job_type();
        tracing::debug!(worker_id = worker_id, job_id = %job_id, job_type = job_type, "job started");

        let started = Instant::now();
        let result = job.execute().await;
        let elapsed = started.elapsed();

        let outcome = if result.is_error() { "failure" } else { "success" };
        metrics::counter!(
            m::DISPATCHER_JOBS_RUN_TOTAL,
            m::LABEL_JOB_TYPE => job_type,
            m::LABEL_RESULT => outcome
        )
        .increment(1);
        metrics::histogram!(m::DISPATCHER_JOB_DURATION_SECONDS).record(elapsed.as_secs_f64());

        tracing::debug!(
            worker_id = worker_id,
            job_id = %job_id,
            outcome = outcome,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "job finished"
        );

        if results.send(result).await.is_err() {
            tracing::warn!(worker_id = worker_id, "result channel closed, worker exiting");
            break;
        }
    }
}
