#![doc = include_str!("../README.md")]

pub mod config;
pub mod environment;
pub mod error;
pub mod job;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, EventBridgeError, JobError, PipelineError};

// 설정
pub use config::EventBridgeConfig;
pub use environment::{Environment, LoadSource};

// 작업 계약
pub use job::{BoxFuture, Job, JobCodec, JobResult, JobStats};

// 도메인 타입
pub use types::{
    Customer, EventFilter, LogBucket, LogFormat, Provider, SyncConfiguration, WebhookTarget,
};
