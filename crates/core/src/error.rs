//! 에러 타입 -- 도메인별 에러 정의

/// EventBridge 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum EventBridgeError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 작업(Job) 실행/복원 에러
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 테넌트의 provider 목록에 없는 provider 참조
    #[error("provider lookup failed for '{provider}'")]
    ProviderNotFound { provider: String },
}

/// 작업 에러
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// 알 수 없는 작업 타입 태그
    #[error("unknown job type: {0}")]
    UnknownType(String),

    /// 작업 인코딩에서 복원 실패
    #[error("failed to decode job '{job_type}': {reason}")]
    Decode { job_type: String, reason: String },

    /// `init()` 없이 실행된 작업
    #[error("job {job_id} is not initialized")]
    NotInitialized { job_id: String },

    /// 작업 실행 실패
    #[error("job run failed: {0}")]
    Run(String),
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널 수신 실패
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}
