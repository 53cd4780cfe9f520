//! 수집 파이프라인 에러 타입
//!
//! [`IngestError`]는 파싱, 원장, 스토리지, 테넌트 디렉토리, 웹훅 전달 등
//! 수집 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<IngestError> for EventBridgeError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use eventbridge_core::error::{ConfigError, EventBridgeError, JobError, PipelineError};

/// 수집 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 로그 파일 읽기 실패
    #[error("parse error: {path}: {reason}")]
    Parse {
        /// 로그 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 처리하지 않는 로그 형식
    #[error("unsupported log format: {0}")]
    UnsupportedFormat(String),

    /// 원장 로드 실패
    #[error("ledger load error: {ledger_id}: {reason}")]
    LedgerLoad {
        /// 원장 ID
        ledger_id: String,
        /// 실패 사유
        reason: String,
    },

    /// 원장 저장 실패 (재시도 소진)
    #[error("ledger save error: {ledger_id} after {attempts} attempt(s): {reason}")]
    LedgerSave {
        /// 원장 ID
        ledger_id: String,
        /// 시도 횟수
        attempts: u32,
        /// 마지막 실패 사유
        reason: String,
    },

    /// 오브젝트 스토리지 에러 (클라이언트 생성, 목록 조회, 다운로드)
    #[error("storage error: {bucket}: {reason}")]
    Storage {
        /// 버킷 이름
        bucket: String,
        /// 실패 사유
        reason: String,
    },

    /// 테넌트 디렉토리 조회 실패
    #[error("tenant directory error: {0}")]
    TenantDirectory(String),

    /// 웹훅 전송 실패 (연결, 타임아웃 등)
    #[error("webhook delivery to {url} failed: {source}")]
    Delivery {
        /// 전달 URL
        url: String,
        /// 원본 HTTP 에러
        #[source]
        source: reqwest::Error,
    },

    /// 웹훅이 2xx가 아닌 응답을 반환
    #[error("webhook {url} returned HTTP {status}")]
    DeliveryStatus {
        /// 전달 URL
        url: String,
        /// HTTP 상태 코드
        status: u16,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 설정 에러
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 작업 계약 에러
    #[error(transparent)]
    Job(#[from] JobError),

    /// HTTP 클라이언트 에러
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON 직렬화 에러
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 직렬화 에러
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// 외부 요청 타임아웃으로 인한 에러인지 여부
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Delivery { source, .. } | Self::Http(source) => source.is_timeout(),
            _ => false,
        }
    }
}

impl From<IngestError> for EventBridgeError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Config(e) => EventBridgeError::Config(e),
            IngestError::Job(e) => EventBridgeError::Job(e),
            IngestError::Io(e) => EventBridgeError::Io(e),
            other => EventBridgeError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
