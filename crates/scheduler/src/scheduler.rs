//! 주기 스케줄러 -- 작업 목록을 간격마다 디스패치 채널로 보내고 결과를 수집
//!
//! # 상태
//! ```text
//! Idle → Ticking → (Dispatching ⇄ Awaiting-Results) → Idle
//!   └──────────── done / shutdown ────────────▶ Stopped
//! ```
//!
//! 스케줄러는 두 개의 백그라운드 루프를 소유합니다.
//!
//! - 송신 루프: tick마다 작업 목록 전체를 디스패치 채널로 보내고 스케줄 간격만큼 대기
//! - 결과 루프: 결과 채널에서 [`JobResult`]를 읽어 작업을 복원하고 메트릭을 갱신
//!
//! 두 루프는 스케줄러 자체 정지 신호(`delete_schedule`)와 데몬 종료 broadcast 중
//! 먼저 오는 쪽에서 멈춥니다. 실행 중인 작업은 중단하지 않습니다.
//!
//! 작업 목록과 스케줄 정책은 하나의 잠금으로, 메트릭은 별도 잠금으로 보호합니다.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use metrics::{counter, gauge};
use serde_json::json;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use eventbridge_core::config::SchedulerConfig;
use eventbridge_core::error::JobError;
use eventbridge_core::job::{DISCOVERY_JOB_TYPE, Job, JobResult, META_ORIGINAL_ERROR};
use eventbridge_core::metrics as cm;
use eventbridge_ingest::{DiscoveryJob, DispatchSender, PipelineContext, PipelineJob};

use crate::admin::{AdminResponse, JobRequest, JobSummary};
use crate::error::SchedulerError;
use crate::metrics::{self as m, SchedulerMetrics, compute_average_response_time};
use crate::schedule::{Schedule, ScheduleUpdate, validate_interval};

/// 작업 목록과 활성 스케줄 정책
#[derive(Debug)]
struct JobBook {
    jobs: Vec<DiscoveryJob>,
    schedule: Schedule,
}

struct Inner {
    ctx: Arc<PipelineContext>,
    job_tx: DispatchSender,
    result_rx: Mutex<Option<mpsc::Receiver<JobResult>>>,
    result_capacity: usize,
    defaults: Schedule,
    book: Mutex<JobBook>,
    metrics: SchedulerMetrics,
    done: CancellationToken,
}

/// 주기 스케줄러 핸들
///
/// 복제하면 같은 스케줄러를 공유합니다.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

/// 실행 중인 스케줄러 루프
pub struct SchedulerTasks {
    send: JoinHandle<()>,
    results: JoinHandle<()>,
}

impl SchedulerTasks {
    /// 두 루프가 끝날 때까지 기다립니다.
    pub async fn join(self) {
        if let Err(e) = self.send.await {
            warn!(error = %e, "send loop task failed");
        }
        if let Err(e) = self.results.await {
            warn!(error = %e, "results loop task failed");
        }
    }
}

impl Scheduler {
    /// 스케줄러를 생성합니다. 작업 목록은 `init()`에서 채워집니다.
    pub fn new(
        config: &SchedulerConfig,
        ctx: Arc<PipelineContext>,
        job_tx: DispatchSender,
        result_rx: mpsc::Receiver<JobResult>,
    ) -> Self {
        let defaults = Schedule::from_config(config);
        Self {
            inner: Arc::new(Inner {
                ctx,
                job_tx,
                result_rx: Mutex::new(Some(result_rx)),
                result_capacity: config.result_channel_capacity,
                book: Mutex::new(JobBook {
                    jobs: Vec::new(),
                    schedule: defaults.clone(),
                }),
                defaults,
                metrics: SchedulerMetrics::new(),
                done: CancellationToken::new(),
            }),
        }
    }

    /// 기본 스케줄 정책을 설정하고 Discovery 작업 하나를 등록합니다.
    pub async fn init(&self) -> Result<(), SchedulerError> {
        let job = self.new_discovery_job()?;
        let mut book = self.inner.book.lock().await;
        book.schedule = self.inner.defaults.clone();
        book.jobs = vec![job];
        record_job_list_size(book.jobs.len());
        info!(
            interval_secs = book.schedule.send_interval_seconds,
            jobs = book.jobs.len(),
            "scheduler initialized"
        );
        Ok(())
    }

    /// 송신 루프와 결과 루프를 시작합니다.
    ///
    /// 결과 채널은 한 번만 소비할 수 있으므로 두 번째 호출은 에러입니다.
    pub async fn run(
        &self,
        shutdown_tx: &broadcast::Sender<()>,
    ) -> Result<SchedulerTasks, SchedulerError> {
        let result_rx = self
            .inner
            .result_rx
            .lock()
            .await
            .take()
            .ok_or(SchedulerError::AlreadyRunning)?;

        let send = tokio::spawn(send_loop(Arc::clone(&self.inner), shutdown_tx.subscribe()));
        let results = tokio::spawn(results_loop(
            Arc::clone(&self.inner),
            result_rx,
            shutdown_tx.subscribe(),
        ));

        info!("scheduler loops started");
        Ok(SchedulerTasks { send, results })
    }

    /// 스케줄러 자체 정지 신호가 발생할 때까지 기다립니다.
    pub async fn stopped(&self) {
        self.inner.done.cancelled().await;
    }

    /// 정지 신호 발생 여부
    pub fn is_stopped(&self) -> bool {
        self.inner.done.is_cancelled()
    }

    /// 메트릭 JSON blob
    pub async fn metrics(&self) -> Bytes {
        match self.inner.metrics.to_json().await {
            Ok(blob) => blob,
            Err(_) => Bytes::from_static(b"Marshal metrics failed"),
        }
    }

    // ─── 작업 목록 관리 ────────────────────────────────────────────

    /// 작업 목록 전체를 교체합니다. 각 작업은 컨텍스트와 디스패치 채널로 다시 초기화됩니다.
    pub async fn update_job_list(&self, mut jobs: Vec<DiscoveryJob>) -> Result<(), SchedulerError> {
        for job in &mut jobs {
            job.attach(Arc::clone(&self.inner.ctx));
            job.init(Some(self.inner.job_tx.clone()))?;
        }
        let mut book = self.inner.book.lock().await;
        book.jobs = jobs;
        record_job_list_size(book.jobs.len());
        Ok(())
    }

    /// 등록된 작업 목록
    pub async fn get_jobs(&self) -> AdminResponse {
        let book = self.inner.book.lock().await;
        let jobs: Vec<JobSummary> = book.jobs.iter().map(summary).collect();
        AdminResponse::ok(json!(jobs))
    }

    /// ID로 작업 하나를 조회합니다.
    pub async fn get_job(&self, id: &str) -> AdminResponse {
        let book = self.inner.book.lock().await;
        match book.jobs.iter().find(|job| job.id() == id) {
            Some(job) => AdminResponse::ok(json!(summary(job))),
            None => AdminResponse::not_found(id),
        }
    }

    /// 새 Discovery 작업을 등록합니다.
    pub async fn create_job(&self, body: &[u8]) -> Result<AdminResponse, SchedulerError> {
        let request = decode_job_request(body)?;
        let job = self.new_discovery_job()?;
        let job_id = job.id();

        let mut book = self.inner.book.lock().await;
        book.jobs.push(job);
        record_job_list_size(book.jobs.len());
        info!(job_id = %job_id, requested_type = %request.job_type, "job created");

        Ok(AdminResponse::created(
            json!({ "success": format!("new job {job_id} added") }),
        ))
    }

    /// 요청의 `id`와 같은 작업을 새 작업으로 교체합니다.
    pub async fn update_job(&self, body: &[u8]) -> Result<AdminResponse, SchedulerError> {
        let request = decode_job_request(body)?;

        let mut book = self.inner.book.lock().await;
        let Some(slot) = book.jobs.iter_mut().find(|job| job.id() == request.id) else {
            return Ok(AdminResponse::not_found(&request.id));
        };

        let replacement = self.new_discovery_job()?;
        let new_id = replacement.id();
        *slot = replacement;
        info!(old_job_id = %request.id, new_job_id = %new_id, "job replaced");

        Ok(AdminResponse::ok(json!({
            "success": format!("Old job {} replaced by new job {new_id}", request.id)
        })))
    }

    /// ID로 작업을 삭제합니다.
    pub async fn delete_job(&self, id: &str) -> AdminResponse {
        let mut book = self.inner.book.lock().await;
        let before = book.jobs.len();
        book.jobs.retain(|job| job.id() != id);
        if book.jobs.len() == before {
            return AdminResponse::not_found(id);
        }
        record_job_list_size(book.jobs.len());
        info!(job_id = %id, "job deleted");

        AdminResponse::ok(json!({ "success": format!("Job {id} deleted") }))
    }

    // ─── 스케줄 정책 관리 ──────────────────────────────────────────

    /// 활성 스케줄 정책
    pub async fn get_schedule(&self) -> AdminResponse {
        let book = self.inner.book.lock().await;
        AdminResponse::ok(json!(book.schedule))
    }

    /// 스케줄 정책의 타입과 간격을 교체합니다.
    pub async fn create_schedule(&self, body: &[u8]) -> Result<AdminResponse, SchedulerError> {
        let schedule: Schedule = serde_json::from_slice(body)?;
        schedule.validate()?;

        let mut book = self.inner.book.lock().await;
        book.schedule.schedule_type = schedule.schedule_type;
        book.schedule.send_interval_seconds = schedule.send_interval_seconds;
        info!(interval_secs = schedule.send_interval_seconds, "schedule replaced");

        Ok(AdminResponse::created(json!({
            "Status": "Success",
            "New interval seconds": book.schedule.send_interval_seconds,
        })))
    }

    /// 송신 간격만 변경합니다. 다음 대기부터 적용됩니다.
    pub async fn update_schedule(&self, body: &[u8]) -> Result<AdminResponse, SchedulerError> {
        let update: ScheduleUpdate = serde_json::from_slice(body)?;
        validate_interval(update.send_interval_seconds)?;

        let mut book = self.inner.book.lock().await;
        book.schedule.send_interval_seconds = update.send_interval_seconds;
        info!(interval_secs = update.send_interval_seconds, "schedule interval updated");

        Ok(AdminResponse::ok(json!({
            "Status": "Success",
            "New interval seconds": book.schedule.send_interval_seconds,
        })))
    }

    /// 스케줄러를 정지합니다. 두 루프는 다음 확인 지점에서 종료됩니다.
    pub async fn delete_schedule(&self) -> AdminResponse {
        self.inner.done.cancel();
        info!("scheduler stop requested");
        AdminResponse::ok(json!({ "Status": "Success scheduler stopped" }))
    }

    fn new_discovery_job(&self) -> Result<DiscoveryJob, SchedulerError> {
        let mut job = DiscoveryJob::new(Arc::clone(&self.inner.ctx));
        job.init(Some(self.inner.job_tx.clone()))?;
        Ok(job)
    }
}

fn summary(job: &DiscoveryJob) -> JobSummary {
    JobSummary {
        id: job.id(),
        job_type: job.job_type().to_owned(),
    }
}

fn decode_job_request(body: &[u8]) -> Result<JobRequest, SchedulerError> {
    let request: JobRequest = serde_json::from_slice(body)?;
    if !request.job_type.is_empty() && request.job_type != DISCOVERY_JOB_TYPE {
        return Err(JobError::UnknownType(request.job_type).into());
    }
    Ok(request)
}

fn as_counter(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[allow(clippy::cast_precision_loss)]
fn record_job_list_size(len: usize) {
    gauge!(cm::SCHEDULER_JOB_LIST_SIZE).set(len as f64);
}

async fn send_loop(inner: Arc<Inner>, mut shutdown_rx: broadcast::Receiver<()>) {
    inner.metrics.set_start_time().await;
    let capacity = inner.job_tx.max_capacity();

    'ticks: loop {
        if inner.done.is_cancelled() {
            break;
        }

        inner.metrics.inc(m::SCHEDULER_ITERATIONS).await;
        counter!(cm::SCHEDULER_ITERATIONS_TOTAL).increment(1);

        let jobs = inner.book.lock().await.jobs.clone();
        let job_count = jobs.len();

        for job in jobs {
            tokio::select! {
                sent = inner.job_tx.send(PipelineJob::Discovery(job)) => {
                    if sent.is_err() {
                        warn!("dispatch channel closed, send loop exiting");
                        break 'ticks;
                    }
                }
                _ = inner.done.cancelled() => break 'ticks,
                _ = shutdown_rx.recv() => break 'ticks,
            }

            inner.metrics.inc(m::JOBS_SENT).await;
            counter!(cm::SCHEDULER_JOBS_SENT_TOTAL).increment(1);
            inner
                .metrics
                .set(m::CURRENT_JOB_CHANNEL_CAPACITY, as_counter(capacity))
                .await;
            inner
                .metrics
                .set(
                    m::CURRENT_JOB_CHANNEL_UTILIZATION,
                    as_counter(capacity - inner.job_tx.capacity()),
                )
                .await;
            inner.metrics.set(m::JOB_LIST_SIZE, as_counter(job_count)).await;
        }

        let up_time = inner.metrics.update_up_time().await;
        let interval = inner.book.lock().await.schedule.interval();
        debug!(
            jobs = job_count,
            interval_secs = interval.as_secs(),
            up_time_secs = up_time,
            "scheduler tick complete"
        );

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = inner.done.cancelled() => break,
            _ = shutdown_rx.recv() => break,
        }
    }

    info!("scheduler send loop stopped");
}

async fn results_loop(
    inner: Arc<Inner>,
    mut result_rx: mpsc::Receiver<JobResult>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!("starting result reader");
    let mut window = VecDeque::new();

    loop {
        tokio::select! {
            maybe = result_rx.recv() => match maybe {
                Some(result) => {
                    let queued = result_rx.len();
                    record_result(&inner, &result, queued, &mut window).await;
                }
                None => {
                    info!("result channel closed");
                    break;
                }
            },
            _ = inner.done.cancelled() => break,
            _ = shutdown_rx.recv() => break,
        }
    }

    info!("scheduler results loop stopped");
}

async fn record_result(
    inner: &Inner,
    result: &JobResult,
    queued: usize,
    window: &mut VecDeque<u64>,
) {
    inner.metrics.inc(m::RESULTS_RECEIVED).await;
    counter!(cm::SCHEDULER_RESULTS_RECEIVED_TOTAL).increment(1);
    inner
        .metrics
        .set(m::CURRENT_RESULT_CHANNEL_CAPACITY, as_counter(inner.result_capacity))
        .await;
    inner
        .metrics
        .set(m::CURRENT_RESULT_CHANNEL_UTILIZATION, as_counter(queued))
        .await;

    if let Some(error) = result.metadata().get(META_ORIGINAL_ERROR) {
        warn!(job_type = result.job_type(), error = %error, "job returned an error result");
    }

    let job = match result.decode::<PipelineJob>() {
        Ok(job) => job,
        Err(e) => {
            warn!(job_type = result.job_type(), error = %e, "failed to decode job from result");
            return;
        }
    };

    let stats = job.stats();
    if stats.request_timed_out {
        inner.metrics.inc(m::NUMBER_OF_JOBS_TIMED_OUT).await;
    }

    let window_size = inner.book.lock().await.schedule.response_time_jobs;
    let average = compute_average_response_time(window, window_size, stats.request_time_ms);
    inner
        .metrics
        .set(m::AVERAGE_JOB_PROCESSING_TIME, i64::try_from(average).unwrap_or(i64::MAX))
        .await;
    #[allow(clippy::cast_precision_loss)]
    gauge!(cm::SCHEDULER_AVERAGE_JOB_TIME_MS).set(average as f64);

    debug!(
        job_id = %job.id(),
        job_type = job.job_type(),
        request_time_ms = stats.request_time_ms,
        average_ms = average,
        "processed job result"
    );
}
