//! 작업/결과 계약 -- 스케줄러와 워커 풀 사이의 공통 인터페이스
//!
//! [`Job`] trait은 디스패치 채널로 전달되는 모든 작업이 구현하는 능력 집합이고,
//! [`JobResult`]는 작업 실행 결과를 결과 채널로 돌려보내는 봉투입니다.
//!
//! 결과는 작업 자체를 JSON으로 담고, 타입 태그로 원래 작업을 복원합니다.
//! 복원 대상은 닫힌 variant 집합이어야 하며 [`JobCodec`]으로 구현합니다.
//!
//! # 생명주기
//! ```text
//! new → init(dispatch) → run() → JobResult → (결과 채널) → decode()
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Discovery 작업 타입 태그
pub const DISCOVERY_JOB_TYPE: &str = "io.pavedraod.eventbridge.logQueueJob";
/// Processor 작업 타입 태그
pub const PROCESSOR_JOB_TYPE: &str = "io.pavedraod.eventbridge.logprocessorjob";
/// 작업 직렬화에 실패했을 때 사용하는 타입 태그
pub const UNDEFINED_JOB_TYPE: &str = "UNDEFINED";

/// 에러 결과의 원본 에러 메타데이터 키
pub const META_ORIGINAL_ERROR: &str = "original_error";
/// 작업 직렬화 실패 메타데이터 키
pub const META_MARSHAL_ERROR: &str = "marshal_error";

/// `dyn` 호환 비동기 메서드에서 사용하는 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 작업 실행 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    /// 외부 요청이 타임아웃되었는지 여부
    pub request_timed_out: bool,
    /// 외부 요청 소요 시간 (밀리초)
    pub request_time_ms: u64,
}

/// 디스패치 채널로 전달되는 모든 작업이 구현하는 trait
///
/// `run()`은 한 번 시작되면 중단되지 않습니다.
/// 취소는 스케줄러 루프 경계에서만 확인됩니다.
pub trait Job: Send + Sync {
    /// `init()`에 전달되는 디스패치 채널 송신측
    type Dispatch: Send;
    /// 실행 에러
    type Error: std::error::Error + Send + Sync + 'static;

    /// 작업 고유 ID
    fn id(&self) -> String;

    /// 작업 타입 태그
    fn job_type(&self) -> &'static str;

    /// 작업을 초기화합니다. 후속 작업을 생성하는 작업은 디스패치 채널을 받습니다.
    fn init(&mut self, dispatch: Option<Self::Dispatch>) -> Result<(), Self::Error>;

    /// 작업을 끝까지 실행합니다.
    fn run(&mut self) -> impl Future<Output = Result<JobResult, Self::Error>> + Send;

    /// 작업을 일시 정지하고 상태 문자열을 반환합니다.
    fn pause(&mut self) -> Result<String, Self::Error>;

    /// 작업을 종료합니다.
    fn shutdown(&mut self) -> Result<(), Self::Error>;

    /// 실행 중 누적된 내부 에러
    fn errors(&self) -> Vec<String>;

    /// 작업 메트릭 (불투명 JSON)
    fn metrics(&self) -> Bytes;
}

/// 결과에서 원래 작업을 복원하는 닫힌 variant 집합
pub trait JobCodec: Sized {
    /// 타입 태그에 따라 작업을 복원합니다.
    ///
    /// 알 수 없는 태그는 [`JobError::UnknownType`]을 반환합니다.
    fn decode(result: &JobResult) -> Result<Self, JobError>;
}

/// 작업 실행 결과
#[derive(Debug, Clone, Default)]
pub struct JobResult {
    job: Bytes,
    job_type: String,
    metadata: BTreeMap<String, String>,
    payload: Option<Bytes>,
}

impl JobResult {
    /// 작업 인코딩과 타입 태그로 결과를 생성합니다.
    pub fn new(job_type: impl Into<String>, job: impl Into<Bytes>) -> Self {
        Self {
            job: job.into(),
            job_type: job_type.into(),
            metadata: BTreeMap::new(),
            payload: None,
        }
    }

    /// 작업을 JSON으로 인코딩하여 결과를 생성합니다.
    pub fn for_job<J>(job: &J) -> Result<Self, serde_json::Error>
    where
        J: Job + Serialize,
    {
        let encoded = serde_json::to_vec(job)?;
        Ok(Self::new(job.job_type(), encoded))
    }

    /// 실패한 작업의 에러 결과를 생성합니다.
    ///
    /// 원본 에러는 `original_error` 메타데이터에 기록됩니다.
    /// 작업 JSON 인코딩은 최선 노력이며, 실패하면 `marshal_error`와
    /// `UNDEFINED` 타입으로 대체합니다.
    pub fn from_error<J>(job: &J, error: &dyn fmt::Display) -> Self
    where
        J: Job + Serialize,
    {
        let mut result = match serde_json::to_vec(job) {
            Ok(encoded) => Self::new(job.job_type(), encoded),
            Err(e) => {
                Self::new(UNDEFINED_JOB_TYPE, Bytes::new()).with_metadata(META_MARSHAL_ERROR, e)
            }
        };
        result
            .metadata
            .insert(META_ORIGINAL_ERROR.to_owned(), error.to_string());
        result
    }

    /// 페이로드를 설정합니다.
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// 메타데이터 항목을 추가합니다.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }

    /// 원래 작업의 JSON 인코딩
    pub fn job(&self) -> &[u8] {
        &self.job
    }

    /// 작업 타입 태그
    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    /// 전달 메타데이터
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// 원시 페이로드
    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// 에러 결과 여부
    pub fn is_error(&self) -> bool {
        self.metadata.contains_key(META_ORIGINAL_ERROR)
    }

    /// 결과에서 원래 작업을 복원합니다.
    pub fn decode<T: JobCodec>(&self) -> Result<T, JobError> {
        T::decode(self)
    }
}
