//! 파이프라인 작업 -- Discovery와 Processor
//!
//! 디스패치 채널로 흐르는 작업은 닫힌 variant 집합 [`PipelineJob`]입니다.
//! 결과의 타입 태그로 원래 작업을 복원하며 ([`JobCodec`]), 알 수 없는 태그는 에러입니다.
//!
//! # 흐름
//! ```text
//! Scheduler ─▶ dispatch ─▶ DiscoveryJob::run ─▶ dispatch ─▶ ProcessorJob::run ─▶ webhook
//!                  │                                              │
//!                  └──────────── JobResult (result channel) ◀─────┘
//! ```

pub mod discovery;
pub mod processor;

pub use discovery::DiscoveryJob;
pub use processor::ProcessorJob;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::warn;

use eventbridge_core::error::JobError;
use eventbridge_core::job::{
    DISCOVERY_JOB_TYPE, Job, JobCodec, JobResult, JobStats, PROCESSOR_JOB_TYPE,
};

use crate::error::IngestError;

/// 디스패치 채널 송신측
pub type DispatchSender = mpsc::Sender<PipelineJob>;

/// 디스패치 채널 수신측
pub type DispatchReceiver = mpsc::Receiver<PipelineJob>;

/// 디스패치 채널로 전달되는 작업
///
/// 직렬화 형태는 내부 작업의 JSON 그대로입니다 (타입 태그는 [`JobResult`]가 보관).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PipelineJob {
    /// 테넌트/버킷/객체 탐색
    Discovery(DiscoveryJob),
    /// 객체 하나의 파싱/필터링/전달
    Processor(ProcessorJob),
}

impl PipelineJob {
    /// 작업을 실행하고 항상 결과를 반환합니다.
    ///
    /// 실행 에러는 [`JobResult::from_error`]로 변환됩니다.
    pub async fn execute(&mut self) -> JobResult {
        match Job::run(self).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    job_id = %self.id(),
                    job_type = self.job_type(),
                    error = %e,
                    "job failed"
                );
                JobResult::from_error(self, &e)
            }
        }
    }

    /// 작업 실행 통계
    pub fn stats(&self) -> JobStats {
        match self {
            Self::Discovery(job) => job.stats(),
            Self::Processor(job) => job.stats(),
        }
    }
}

impl From<DiscoveryJob> for PipelineJob {
    fn from(job: DiscoveryJob) -> Self {
        Self::Discovery(job)
    }
}

impl From<ProcessorJob> for PipelineJob {
    fn from(job: ProcessorJob) -> Self {
        Self::Processor(job)
    }
}

impl Job for PipelineJob {
    type Dispatch = DispatchSender;
    type Error = IngestError;

    fn id(&self) -> String {
        match self {
            Self::Discovery(job) => job.id(),
            Self::Processor(job) => job.id(),
        }
    }

    fn job_type(&self) -> &'static str {
        match self {
            Self::Discovery(job) => job.job_type(),
            Self::Processor(job) => job.job_type(),
        }
    }

    fn init(&mut self, dispatch: Option<DispatchSender>) -> Result<(), IngestError> {
        match self {
            Self::Discovery(job) => job.init(dispatch),
            Self::Processor(job) => job.init(dispatch),
        }
    }

    async fn run(&mut self) -> Result<JobResult, IngestError> {
        match self {
            Self::Discovery(job) => job.run().await,
            Self::Processor(job) => job.run().await,
        }
    }

    fn pause(&mut self) -> Result<String, IngestError> {
        match self {
            Self::Discovery(job) => job.pause(),
            Self::Processor(job) => job.pause(),
        }
    }

    fn shutdown(&mut self) -> Result<(), IngestError> {
        match self {
            Self::Discovery(job) => job.shutdown(),
            Self::Processor(job) => job.shutdown(),
        }
    }

    fn errors(&self) -> Vec<String> {
        match self {
            Self::Discovery(job) => job.errors(),
            Self::Processor(job) => job.errors(),
        }
    }

    fn metrics(&self) -> Bytes {
        match self {
            Self::Discovery(job) => job.metrics(),
            Self::Processor(job) => job.metrics(),
        }
    }
}

impl JobCodec for PipelineJob {
    fn decode(result: &JobResult) -> Result<Self, JobError> {
        match result.job_type() {
            DISCOVERY_JOB_TYPE => decode_json::<DiscoveryJob>(result).map(Self::Discovery),
            PROCESSOR_JOB_TYPE => decode_json::<ProcessorJob>(result).map(Self::Processor),
            other => Err(JobError::UnknownType(other.to_owned())),
        }
    }
}

fn decode_json<T: DeserializeOwned>(result: &JobResult) -> Result<T, JobError> {
    serde_json::from_slice(result.job()).map_err(|e| JobError::Decode {
        job_type: result.job_type().to_owned(),
        reason: e.to_string(),
    })
}

/// `JobStats`를 메트릭 blob으로 인코딩합니다.
pub(crate) fn stats_blob(stats: &JobStats) -> Bytes {
    match serde_json::to_vec(stats) {
        Ok(blob) => Bytes::from(blob),
        Err(_) => Bytes::from_static(b"Marshal metrics failed"),
    }
}
