//! 스케줄러 에러 타입
//!
//! 관리 API 실패는 [`SchedulerError::to_response`]로 HTTP 스타일 응답으로 변환됩니다.

use serde_json::json;

use eventbridge_core::error::{EventBridgeError, JobError, PipelineError};
use eventbridge_ingest::IngestError;

use crate::admin::AdminResponse;

/// 스케줄러 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// 관리 요청 본문 디코딩 실패
    #[error("json decode failed: {0}")]
    InvalidRequest(#[from] serde_json::Error),

    /// 허용되지 않는 스케줄 정책
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// 관리 API로 만들 수 없는 작업 타입
    #[error(transparent)]
    Job(#[from] JobError),

    /// 작업 초기화 실패
    #[error("job init failed: {0}")]
    JobInit(#[from] IngestError),

    /// 채널이 닫힘
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// 스케줄러 루프가 이미 실행 중
    #[error("scheduler loops already running")]
    AlreadyRunning,
}

impl SchedulerError {
    /// HTTP 상태 코드
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::InvalidSchedule(_) | Self::Job(_) => 400,
            Self::AlreadyRunning => 409,
            Self::JobInit(_) | Self::ChannelClosed(_) => 500,
        }
    }

    /// 외부 요청 처리 레이어에 그대로 돌려줄 응답
    pub fn to_response(&self) -> AdminResponse {
        AdminResponse::new(self.status(), json!({ "error": self.to_string() }))
    }
}

impl From<SchedulerError> for EventBridgeError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Job(e) => EventBridgeError::Job(e),
            SchedulerError::ChannelClosed(reason) => {
                EventBridgeError::Pipeline(PipelineError::ChannelSend(reason))
            }
            other => EventBridgeError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
