//! Daemon assembly, channel wiring, and lifecycle management.
//!
//! The [`Orchestrator`] owns the loaded configuration, the two bounded
//! channels between the scheduler and the worker pool, and the shutdown
//! broadcast that every background task listens on.
//!
//! # Startup Order
//!
//! 1. Install the Prometheus recorder (when enabled)
//! 2. Create the dispatch and result channels
//! 3. Build the pipeline context and seed the scheduler
//! 4. Spawn dispatcher workers (consumers before the producer)
//! 5. Start the scheduler send and results loops
//! 6. Write the PID file
//!
//! # Shutdown
//!
//! Triggered by `SIGTERM`, `SIGINT`, or the scheduler's own stop request
//! (`delete_schedule`). The shutdown broadcast stops the scheduler loops
//! and the workers; jobs already running finish first.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use eventbridge_core::config::EventBridgeConfig;
use eventbridge_core::job::JobResult;
use eventbridge_ingest::{DispatchReceiver, PipelineContext, S3Connector};
use eventbridge_scheduler::Scheduler;

use crate::{dispatcher, metrics_server};

/// Why the daemon left its main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An OS signal (`SIGTERM` or `SIGINT`).
    Signal(&'static str),
    /// The scheduler was stopped through its administrative surface.
    SchedulerStopped,
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: EventBridgeConfig,
    /// Shared scheduler handle (also the administrative surface).
    scheduler: Scheduler,
    /// Dispatch channel receiver, handed to the worker pool on `run()`.
    job_rx: Option<DispatchReceiver>,
    /// Result channel sender, cloned into every worker.
    result_tx: Option<mpsc::Sender<JobResult>>,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - The pipeline context or scheduler fails to initialize
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = EventBridgeConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: EventBridgeConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_daemon_metrics();
        }

        tracing::debug!(
            job_capacity = config.scheduler.job_channel_capacity,
            result_capacity = config.scheduler.result_channel_capacity,
            "creating scheduler channels"
        );
        let (job_tx, job_rx) = mpsc::channel(config.scheduler.job_channel_capacity);
        let (result_tx, result_rx) = mpsc::channel(config.scheduler.result_channel_capacity);
        let (shutdown_tx, _) = broadcast::channel(16);

        let ctx = PipelineContext::from_config(&config.ingest, Arc::new(S3Connector::new()))
            .map_err(|e| anyhow::anyhow!("failed to build pipeline context: {}", e))?;

        let scheduler = Scheduler::new(&config.scheduler, Arc::new(ctx), job_tx, result_rx);
        scheduler
            .init()
            .await
            .map_err(|e| anyhow::anyhow!("failed to initialize scheduler: {}", e))?;

        tracing::info!(
            workers = config.dispatcher.workers,
            interval_secs = config.scheduler.send_interval_secs,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            scheduler,
            job_rx: Some(job_rx),
            result_tx: Some(result_tx),
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start the worker pool and scheduler, then block until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if called twice, if the scheduler cannot start,
    /// if the PID file cannot be written, or if signal handlers cannot be
    /// installed.
    pub async fn run(&mut self) -> Result<StopReason> {
        let (Some(job_rx), Some(result_tx)) = (self.job_rx.take(), self.result_tx.take()) else {
            return Err(anyhow::anyhow!("orchestrator is already running"));
        };

        let workers = dispatcher::spawn_workers(
            self.config.dispatcher.workers,
            job_rx,
            result_tx,
            &self.shutdown_tx,
        );

        let scheduler_tasks = match self.scheduler.run(&self.shutdown_tx).await {
            Ok(tasks) => tasks,
            Err(e) => {
                self.stop_workers(workers).await;
                return Err(anyhow::anyhow!("failed to start scheduler: {}", e));
            }
        };

        if let Some(path) = self.pid_file() {
            if let Err(e) = write_pid_file(path) {
                tracing::error!(error = %e, "PID file write failed, rolling back startup");
                let _ = self.shutdown_tx.send(());
                scheduler_tasks.join().await;
                self.stop_workers(workers).await;
                return Err(e);
            }
        }

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        tracing::info!("entering main event loop");
        let reason = tokio::select! {
            signal = wait_for_shutdown_signal() => StopReason::Signal(signal?),
            () = self.scheduler.stopped() => StopReason::SchedulerStopped,
        };
        tracing::info!(reason = ?reason, "shutdown requested");

        tracing::info!("broadcasting shutdown signal to all tasks");
        let _ = self.shutdown_tx.send(());

        scheduler_tasks.join().await;
        self.stop_workers(workers).await;
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        if let Some(path) = self.pid_file() {
            remove_pid_file(path);
        }

        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "eventbridge-daemon stopped"
        );
        Ok(reason)
    }

    /// Shared scheduler handle, for binding the administrative surface.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &EventBridgeConfig {
        &self.config
    }

    fn pid_file(&self) -> Option<&Path> {
        let path = self.config.general.pid_file.as_str();
        (!path.is_empty()).then(|| Path::new(path))
    }

    async fn stop_workers(&self, workers: Vec<JoinHandle<()>>) {
        let _ = self.shutdown_tx.send(());
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "dispatcher worker task failed");
            }
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to a file.
///
/// The file is created atomically with `create_new` and must be a regular
/// file. The parent directory is created with mode 0o700 and the file with
/// mode 0o600.
///
/// # Errors
///
/// Returns an error if the file already exists or cannot be written.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .mode(0o700)
                .recursive(true)
                .create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Record the build info gauge. Called once after the recorder is installed.
fn record_daemon_metrics() {
    use eventbridge_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

/// Spawn a background task that refreshes the uptime gauge every 10 seconds.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    use eventbridge_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
