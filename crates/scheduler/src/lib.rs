#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`scheduler`]: 작업 목록, 송신 루프, 결과 루프, 관리 연산
//! - [`schedule`]: 스케줄 정책 (고정 간격)
//! - [`metrics`]: JSON 메트릭 blob과 이동 평균
//! - [`admin`]: 관리 API 응답 타입
//! - [`error`]: 도메인 에러 타입

pub mod admin;
pub mod error;
pub mod metrics;
pub mod schedule;
pub mod scheduler;

pub use admin::{AdminResponse, JobRequest, JobSummary};
pub use error::SchedulerError;
pub use schedule::{CONSTANT_INTERVAL_SCHEDULER, Schedule, ScheduleUpdate};
pub use scheduler::{Scheduler, SchedulerTasks};
