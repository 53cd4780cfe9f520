//! Discovery 작업 -- 테넌트/버킷/객체를 탐색하고 Processor 작업을 생성
//!
//! 스케줄러 tick마다 한 번 실행됩니다.
//!
//! 1. 런타임 환경 프로파일을 다시 해석합니다
//! 2. 테넌트 목록을 로드합니다
//! 3. 테넌트마다 원장을 로드하고, 버킷마다 provider를 찾아 객체를 나열합니다
//! 4. 원장에 없는 객체를 내려받아 [`ProcessorJob`]을 만듭니다
//! 5. 만든 작업을 별도 태스크에서 디스패치 채널로 보냅니다
//!
//! 디스패치 채널은 워커가 소비하므로 Discovery는 채널 여유 공간을 기다리지 않습니다.
//! 수신측이 닫히면 전송하지 못한 작업은 버려지고 다음 회차에서 다시 탐색됩니다.
//!
//! 한 테넌트의 스토리지 장애는 그 테넌트만 건너뛰며, 에러는 [`Job::errors`]와
//! 결과 메타데이터 `tenant_errors`로 보고됩니다.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use eventbridge_core::environment::Environment;
use eventbridge_core::error::JobError;
use eventbridge_core::job::{DISCOVERY_JOB_TYPE, Job, JobResult, JobStats};
use eventbridge_core::metrics as m;
use eventbridge_core::types::Customer;

use super::{DispatchSender, PipelineJob, ProcessorJob, stats_blob};
use crate::context::PipelineContext;
use crate::error::IngestError;
use crate::ledger::LedgerConfig;
use crate::queue::LogQueueItem;
use crate::tenant::TenantSource;

/// 결과 메타데이터: 실패한 테넌트 수
pub const META_TENANT_ERRORS: &str = "tenant_errors";
/// 결과 메타데이터: 생성한 Processor 작업 수
pub const META_ITEMS_QUEUED: &str = "items_queued";

/// 테넌트/버킷/객체 탐색 작업
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryJob {
    job_id: Uuid,
    job_type: String,
    #[serde(default)]
    stats: JobStats,
    #[serde(rename = "jobErrors", default)]
    job_errors: Vec<String>,
    #[serde(skip)]
    ctx: Option<Arc<PipelineContext>>,
    #[serde(skip)]
    dispatch: Option<DispatchSender>,
}

impl Default for DiscoveryJob {
    fn default() -> Self {
        Self {
            job_id: Uuid::new_v4(),
            job_type: DISCOVERY_JOB_TYPE.to_owned(),
            stats: JobStats::default(),
            job_errors: Vec::new(),
            ctx: None,
            dispatch: None,
        }
    }
}

impl DiscoveryJob {
    /// 컨텍스트를 가진 새 작업을 생성합니다. 실행 전에 `init()`으로 디스패치 채널을 받아야 합니다.
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx: Some(ctx),
            ..Self::default()
        }
    }

    /// 컨텍스트를 연결합니다. 결과에서 복원한 작업은 컨텍스트가 없습니다.
    pub fn attach(&mut self, ctx: Arc<PipelineContext>) {
        self.ctx = Some(ctx);
    }

    /// 작업 실행 통계
    pub fn stats(&self) -> JobStats {
        self.stats
    }
}

impl Job for DiscoveryJob {
    type Dispatch = DispatchSender;
    type Error = IngestError;

    fn id(&self) -> String {
        self.job_id.to_string()
    }

    fn job_type(&self) -> &'static str {
        DISCOVERY_JOB_TYPE
    }

    fn init(&mut self, dispatch: Option<DispatchSender>) -> Result<(), IngestError> {
        if let Some(dispatch) = dispatch {
            self.dispatch = Some(dispatch);
        }
        self.job_type = DISCOVERY_JOB_TYPE.to_owned();
        self.stats = JobStats::default();
        self.job_errors.clear();
        Ok(())
    }

    async fn run(&mut self) -> Result<JobResult, IngestError> {
        let (ctx, dispatch) = match (&self.ctx, &self.dispatch) {
            (Some(ctx), Some(dispatch)) => (Arc::clone(ctx), dispatch.clone()),
            _ => {
                return Err(JobError::NotInitialized {
                    job_id: self.id(),
                }
                .into());
            }
        };
        if dispatch.is_closed() {
            return Err(IngestError::Channel("dispatch channel closed".to_owned()));
        }

        let started = Instant::now();
        self.job_errors.clear();
        self.stats.request_timed_out = false;

        let env = ctx.environment().await;
        let source = TenantSource::from_environment(&env);
        let customers = match source
            .load(ctx.client(), ctx.tenant_list_count())
            .await
        {
            Ok(customers) => customers,
            Err(e) => {
                warn!(error = %e, "tenant directory unavailable, discovery pass is empty");
                self.stats.request_timed_out = e.is_timeout();
                self.job_errors.push(format!("tenant directory: {e}"));
                Vec::new()
            }
        };

        let mut pass = DiscoveryPass {
            ctx: &ctx,
            env: &env,
            queued: Vec::new(),
            jobs: Vec::new(),
            errors: Vec::new(),
        };

        for customer in &customers {
            if let Err(e) = pass.discover_tenant(customer).await {
                counter!(m::DISCOVERY_TENANT_FAILURES_TOTAL).increment(1);
                warn!(
                    tenant_id = %customer.id,
                    error = %e,
                    "tenant discovery failed, continuing with remaining tenants"
                );
                pass.errors.push(format!("tenant {}: {e}", customer.id));
            }
        }

        let DiscoveryPass {
            queued,
            jobs,
            errors,
            ..
        } = pass;
        self.job_errors.extend(errors);
        if !jobs.is_empty() {
            spawn_forwarder(dispatch, jobs);
        }
        self.stats.request_time_ms = started.elapsed().as_millis().try_into().unwrap_or(u64::MAX);

        info!(
            tenants = customers.len(),
            items_queued = queued.len(),
            tenant_errors = self.job_errors.len(),
            elapsed_ms = self.stats.request_time_ms,
            "discovery pass complete"
        );

        let payload = serde_json::to_vec(&queued)?;
        Ok(JobResult::for_job(self)?
            .with_payload(payload)
            .with_metadata(META_ITEMS_QUEUED, queued.len())
            .with_metadata(META_TENANT_ERRORS, self.job_errors.len()))
    }

    fn pause(&mut self) -> Result<String, IngestError> {
        Ok("paused".to_owned())
    }

    fn shutdown(&mut self) -> Result<(), IngestError> {
        Ok(())
    }

    fn errors(&self) -> Vec<String> {
        self.job_errors.clone()
    }

    fn metrics(&self) -> Bytes {
        stats_blob(&self.stats)
    }
}

/// 탐색 한 회차의 누적 상태
struct DiscoveryPass<'a> {
    ctx: &'a Arc<PipelineContext>,
    env: &'a Environment,
    queued: Vec<LogQueueItem>,
    jobs: Vec<PipelineJob>,
    errors: Vec<String>,
}

/// Processor 작업을 순서대로 디스패치 채널에 보내는 태스크를 띄웁니다.
///
/// 수신측이 닫히면 남은 작업을 버리고 종료합니다.
fn spawn_forwarder(dispatch: DispatchSender, jobs: Vec<PipelineJob>) {
    tokio::spawn(async move {
        let total = jobs.len();
        let mut sent = 0usize;
        for job in jobs {
            if dispatch.send(job).await.is_err() {
                warn!(
                    sent,
                    dropped = total - sent,
                    "dispatch channel closed, remaining processor jobs left for next pass"
                );
                break;
            }
            sent += 1;
        }
        debug!(sent, "processor jobs forwarded");
    });
}

impl DiscoveryPass<'_> {
    /// 테넌트 하나를 탐색합니다.
    ///
    /// 원장 로드, 클라이언트 생성, 목록 조회 실패는 테넌트 전체를 중단합니다.
    /// 객체 다운로드 실패는 그 객체만 건너뜁니다.
    async fn discover_tenant(&mut self, customer: &Customer) -> Result<(), IngestError> {
        let ledger_config = LedgerConfig::for_customer(self.env, customer);
        let ledger = self.ctx.ledger().load(&ledger_config).await?;
        debug!(
            tenant_id = %customer.id,
            ledger_id = %ledger_config.ledger_id(),
            processed = ledger.len(),
            "ledger loaded"
        );

        for bucket in &customer.logs {
            let provider = match customer.find_provider(&bucket.provider) {
                Ok(provider) => provider,
                Err(e) => {
                    warn!(
                        tenant_id = %customer.id,
                        bucket = %bucket.name,
                        error = %e,
                        "provider not found, skipping bucket"
                    );
                    continue;
                }
            };

            let store = self.ctx.connector().connect(provider).await?;
            let objects = store.list_objects(&bucket.name).await?;

            for object in objects {
                if ledger.is_processed(&bucket.name, &object.key) {
                    counter!(m::DISCOVERY_OBJECTS_SKIPPED_TOTAL).increment(1);
                    debug!(bucket = %bucket.name, key = %object.key, "already processed");
                    continue;
                }

                let dest = self.ctx.download_path(customer, &bucket.name, &object.key);
                let location = match store.fetch_object(&bucket.name, &object.key, &dest).await {
                    Ok(location) => location,
                    Err(e) => {
                        warn!(
                            tenant_id = %customer.id,
                            bucket = %bucket.name,
                            key = %object.key,
                            error = %e,
                            "object fetch failed, skipping object"
                        );
                        self.errors.push(format!(
                            "tenant {}: {}/{}: {e}",
                            customer.id, bucket.name, object.key
                        ));
                        continue;
                    }
                };

                let webhook = match self.env.post_host_override() {
                    Some(host) => customer.configuration.hook.with_host(host),
                    None => customer.configuration.hook.clone(),
                };

                let item = LogQueueItem {
                    id: customer.id,
                    bucket: bucket.name.clone(),
                    webhook,
                    filter: bucket.filter.clone(),
                    name: object.key.clone(),
                    created: Utc::now(),
                    location,
                    log_format: bucket.log_format,
                    processed: false,
                    prune: bucket.prune_after_processing,
                    ledger: ledger_config.clone(),
                };

                let mut job = ProcessorJob::new(Arc::clone(self.ctx), item.clone());
                job.init(None)?;
                self.jobs.push(PipelineJob::Processor(job));

                counter!(m::DISCOVERY_ITEMS_QUEUED_TOTAL).increment(1);
                debug!(tenant_id = %customer.id, bucket = %bucket.name, key = %item.name, "processor job queued");
                self.queued.push(item);
            }
        }

        Ok(())
    }
}
