#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`parser`]: S3 서버 접근 로그 디코딩
//! - [`filter`]: 버킷별 API / HTTP 메서드 / 리소스 타입 허용 목록 판정
//! - [`ledger`]: 테넌트별 처리 완료 원장 (디스크, 네트워크)
//! - [`tenant`]: 테넌트 디렉토리 로딩 (파일, REST)
//! - [`storage`]: 오브젝트 스토리지 목록 조회/다운로드 (S3 호환)
//! - [`webhook`]: 레코드 전달
//! - [`job`]: Discovery / Processor 작업과 [`PipelineJob`] 코덱
//! - [`context`]: 작업이 공유하는 자원
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! TenantSource -> DiscoveryJob -> ObjectStore (list, fetch) -> ProcessorJob
//!                      |                                          |
//!                   Ledger (skip processed)       S3LogParser -> filter -> webhook -> Ledger
//! ```

pub mod context;
pub mod error;
pub mod filter;
pub mod job;
pub mod ledger;
pub mod parser;
pub mod queue;
pub mod storage;
pub mod tenant;
pub mod webhook;

// --- 주요 타입 re-export ---

// 작업
pub use job::{DispatchReceiver, DispatchSender, DiscoveryJob, PipelineJob, ProcessorJob};

// 컨텍스트
pub use context::PipelineContext;

// 에러
pub use error::IngestError;

// 파서
pub use parser::{S3LogLine, S3LogParser, S3Operation};

// 원장
pub use ledger::{LedgerConfig, LedgerLocks, LedgerStore, ProcessedLogItem, ProcessedLogs};

// 스토리지
pub use storage::{ObjectInfo, ObjectStore, ObjectStoreConnector, S3Connector};

// 테넌트
pub use tenant::TenantSource;

// 처리 대기 항목
pub use queue::LogQueueItem;
