//! Processor 작업 -- 다운로드한 로그 객체 하나를 파싱, 필터링, 전달하고 원장에 기록
//!
//! 전달은 레코드 단위로 순서대로 진행되며, 첫 전달 실패에서 작업 전체가 중단됩니다.
//! 이 경우 원장에 기록하지 않으므로 다음 Discovery 회차에서 객체가 다시 처리됩니다
//! (at-least-once). 로컬 사본 삭제는 원장 저장이 성공한 뒤에만 수행합니다.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use eventbridge_core::error::JobError;
use eventbridge_core::job::{Job, JobResult, JobStats, PROCESSOR_JOB_TYPE};
use eventbridge_core::metrics as m;
use eventbridge_core::types::LogFormat;

use super::{DispatchSender, stats_blob};
use crate::context::PipelineContext;
use crate::error::IngestError;
use crate::filter;
use crate::ledger::ProcessedLogItem;
use crate::parser::S3LogParser;
use crate::queue::LogQueueItem;
use crate::webhook;

/// 결과 메타데이터: 파싱된 레코드 수
pub const META_RECORDS_PARSED: &str = "records_parsed";
/// 결과 메타데이터: 필터를 통과한 레코드 수
pub const META_RECORDS_MATCHED: &str = "records_matched";
/// 결과 메타데이터: 전달한 레코드 수
pub const META_RECORDS_DELIVERED: &str = "records_delivered";

/// 로그 객체 처리 작업
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorJob {
    job_id: Uuid,
    job_type: String,
    #[serde(default)]
    stats: JobStats,
    #[serde(rename = "jobErrors", default)]
    job_errors: Vec<String>,
    #[serde(rename = "Log")]
    log: LogQueueItem,
    #[serde(skip)]
    ctx: Option<Arc<PipelineContext>>,
}

impl ProcessorJob {
    /// 처리 대기 항목으로 새 작업을 생성합니다.
    pub fn new(ctx: Arc<PipelineContext>, log: LogQueueItem) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            job_type: PROCESSOR_JOB_TYPE.to_owned(),
            stats: JobStats::default(),
            job_errors: Vec::new(),
            log,
            ctx: Some(ctx),
        }
    }

    /// 처리 대상 항목
    pub fn item(&self) -> &LogQueueItem {
        &self.log
    }

    /// 작업 실행 통계
    pub fn stats(&self) -> JobStats {
        self.stats
    }

    async fn process(&mut self, ctx: &PipelineContext) -> Result<JobResult, IngestError> {
        if self.log.log_format != LogFormat::S3 {
            return Err(IngestError::UnsupportedFormat(self.log.log_format.to_string()));
        }

        let parser = S3LogParser::new()?;
        let records = parser.parse_file(&self.log.location).await?;
        let url = self.log.webhook.url();

        let mut matched = 0usize;
        let mut delivered = 0usize;
        for record in &records {
            if !filter::matches(record, &self.log.filter) {
                continue;
            }
            matched += 1;

            let started = Instant::now();
            let outcome = webhook::deliver(ctx.client(), &url, record).await;
            self.stats.request_time_ms = started.elapsed().as_millis().try_into().unwrap_or(u64::MAX);

            if let Err(e) = outcome {
                self.stats.request_timed_out = e.is_timeout();
                counter!(m::PROCESSOR_DELIVERY_FAILURES_TOTAL).increment(1);
                self.job_errors.push(e.to_string());
                return Err(e);
            }
            delivered += 1;
            counter!(m::PROCESSOR_EVENTS_DELIVERED_TOTAL).increment(1);
        }

        self.log.processed = true;

        let entry = ProcessedLogItem {
            date: Utc::now(),
            bucket: self.log.bucket.clone(),
            name: self.log.name.clone(),
            file_name: self.log.location.display().to_string(),
            pruned: self.log.prune,
        };

        {
            let lock = ctx.ledger_locks().lock_for(self.log.id).await;
            let _guard = lock.lock().await;
            let mut ledger = ctx.ledger().load(&self.log.ledger).await?;
            let recorded = ctx.ledger().record(&self.log.ledger, &mut ledger, entry).await?;
            debug!(
                tenant_id = %self.log.id,
                bucket = %self.log.bucket,
                key = %self.log.name,
                recorded,
                "ledger updated"
            );
        }

        // 원장 기록이 끝난 뒤에만 로컬 사본을 지웁니다
        if self.log.prune {
            if let Err(e) = tokio::fs::remove_file(&self.log.location).await {
                warn!(
                    path = %self.log.location.display(),
                    error = %e,
                    "failed to prune local log copy"
                );
            }
        }

        info!(
            tenant_id = %self.log.id,
            bucket = %self.log.bucket,
            key = %self.log.name,
            parsed = records.len(),
            matched,
            delivered,
            "log object processed"
        );

        Ok(JobResult::for_job(self)?
            .with_metadata(META_RECORDS_PARSED, records.len())
            .with_metadata(META_RECORDS_MATCHED, matched)
            .with_metadata(META_RECORDS_DELIVERED, delivered))
    }
}

impl Job for ProcessorJob {
    type Dispatch = DispatchSender;
    type Error = IngestError;

    fn id(&self) -> String {
        self.job_id.to_string()
    }

    fn job_type(&self) -> &'static str {
        PROCESSOR_JOB_TYPE
    }

    fn init(&mut self, _dispatch: Option<DispatchSender>) -> Result<(), IngestError> {
        self.job_type = PROCESSOR_JOB_TYPE.to_owned();
        self.stats = JobStats::default();
        self.job_errors.clear();
        Ok(())
    }

    async fn run(&mut self) -> Result<JobResult, IngestError> {
        let Some(ctx) = self.ctx.clone() else {
            return Err(JobError::NotInitialized {
                job_id: self.id(),
            }
            .into());
        };
        self.process(&ctx).await
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use eventbridge_core::config::IngestConfig;
    use eventbridge_core::types::{EventFilter, WebhookTarget};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::ledger::LedgerConfig;
    use crate::storage::S3Connector;

    const TENANT: &str = "6f1c1f4e-3a8e-4c39-9a55-0c1f3bdfa001";

    const LOG: &str = "#Version: 1.0\n\
#Fields: s3 access log\n\
79a5 acme-logs [06/Feb/2019:00:00:38 +0000] 192.0.2.3 arn:aws:iam::1:user/a 3E57427F3EXAMPLE REST.PUT.OBJECT photos/a.jpg \"PUT /photos/a.jpg HTTP/1.1\" 200 - 10 20 5 3 \"-\" \"curl/7.1\" -\n\
79a5 acme-logs [06/Feb/2019:00:00:39 +0000] 192.0.2.3 arn:aws:iam::1:user/a 3E57427F3EXAMPLF REST.GET.OBJECT photos/a.jpg \"GET /photos/a.jpg HTTP/1.1\" 200 - 10 20 5 3 \"-\" \"curl/7.1\" -\n\
79a5 acme-logs [06/Feb/2019:00:00:40 +0000] 192.0.2.3 arn:aws:iam::1:user/a 3E57427F3EXAMPLG REST.DELETE.OBJECT photos/b.jpg \"DELETE /photos/b.jpg HTTP/1.1\" 204 - - - 5 - \"-\" \"curl/7.1\" -\n";

    fn context(dir: &Path) -> Arc<PipelineContext> {
        let config = IngestConfig {
            download_dir: dir.join("downloads").display().to_string(),
            ledger_dir: dir.join("ledger").display().to_string(),
            ..Default::default()
        };
        Arc::new(PipelineContext::from_config(&config, Arc::new(S3Connector::new())).unwrap())
    }

    fn item(dir: &Path, server: &MockServer, prune: bool) -> LogQueueItem {
        let location = dir.join("access.log");
        std::fs::write(&location, LOG).unwrap();
        let address = server.address();
        let tenant_id = TENANT.parse().unwrap();

        LogQueueItem {
            id: tenant_id,
            bucket: "acme-logs".to_owned(),
            webhook: WebhookTarget {
                name: "s3events".to_owned(),
                host: address.ip().to_string(),
                port: address.port().to_string(),
            },
            filter: EventFilter {
                matched_api: vec!["REST".to_owned()],
                matched_http_methods: vec!["PUT".to_owned(), "DELETE".to_owned()],
                matched_resource_types: vec!["OBJECT".to_owned()],
            },
            name: "2019/02/06/access.log".to_owned(),
            created: Utc::now(),
            location,
            log_format: LogFormat::S3,
            processed: false,
            prune,
            ledger: LedgerConfig::disk(tenant_id),
        }
    }

    #[tokio::test]
    async fn delivers_matching_records_and_records_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/s3events"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let ctx = context(dir.path());
        let log = item(dir.path(), &server, false);
        let mut job = ProcessorJob::new(Arc::clone(&ctx), log.clone());
        let result = job.run().await.unwrap();

        assert_eq!(result.metadata()[META_RECORDS_PARSED], "3");
        assert_eq!(result.metadata()[META_RECORDS_DELIVERED], "2");
        assert!(job.item().processed);
        assert!(log.location.exists());

        let ledger = ctx.ledger().load(&log.ledger).await.unwrap();
        assert!(ledger.is_processed("acme-logs", "2019/02/06/access.log"));
        assert!(!ledger.processed_items[0].pruned);
    }

    #[tokio::test]
    async fn prune_removes_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let ctx = context(dir.path());
        let log = item(dir.path(), &server, true);
        let mut job = ProcessorJob::new(Arc::clone(&ctx), log.clone());
        job.run().await.unwrap();

        assert!(!log.location.exists());
        let ledger = ctx.ledger().load(&log.ledger).await.unwrap();
        assert!(ledger.processed_items[0].pruned);
    }

    #[tokio::test]
    async fn ledger_save_failure_keeps_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/s3events"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/plogs/{TENANT}")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("/plogs/{TENANT}")))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let config = IngestConfig {
            download_dir: dir.path().join("downloads").display().to_string(),
            ledger_save_attempts: 1,
            ..Default::default()
        };
        let ctx = Arc::new(
            PipelineContext::from_config(&config, Arc::new(S3Connector::new())).unwrap(),
        );
        let mut log = item(dir.path(), &server, true);
        log.ledger = LedgerConfig::network(&format!("{}/plogs", server.uri()), "", log.id);

        let mut job = ProcessorJob::new(ctx, log.clone());
        let err = job.run().await.unwrap_err();

        assert!(matches!(err, IngestError::LedgerSave { .. }));
        assert!(log.location.exists());
    }

    #[tokio::test]
    async fn webhook_failure_aborts_without_ledger_entry() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = context(dir.path());
        let log = item(dir.path(), &server, true);
        let mut job = ProcessorJob::new(Arc::clone(&ctx), log.clone());
        let err = job.run().await.unwrap_err();

        assert!(matches!(err, IngestError::DeliveryStatus { status: 500, .. }));
        assert_eq!(job.errors().len(), 1);
        assert!(log.location.exists());
        let ledger = ctx.ledger().load(&log.ledger).await.unwrap();
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn w3c_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        let mut log = item(dir.path(), &server, false);
        log.log_format = LogFormat::W3c;

        let mut job = ProcessorJob::new(context(dir.path()), log);
        let err = job.run().await.unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn decoded_job_is_not_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        let job = ProcessorJob::new(context(dir.path()), item(dir.path(), &server, false));
        let result = JobResult::for_job(&job).unwrap();

        let mut decoded: ProcessorJob = serde_json::from_slice(result.job()).unwrap();
        assert_eq!(decoded.item().name, "2019/02/06/access.log");
        let err = decoded.run().await.unwrap_err();
        assert!(matches!(err, IngestError::Job(JobError::NotInitialized { .. })));
    }
}
