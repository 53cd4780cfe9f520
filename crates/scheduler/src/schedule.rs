//! 스케줄 정책 -- 현재는 고정 간격 정책 하나만 지원

use std::time::Duration;

use serde::{Deserialize, Serialize};

use eventbridge_core::config::SchedulerConfig;

use crate::error::SchedulerError;

/// 고정 간격 스케줄러 타입 이름
pub const CONSTANT_INTERVAL_SCHEDULER: &str = "Constant interval scheduler";

/// 활성 스케줄 정책
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// 스케줄러 타입
    pub schedule_type: String,
    /// 송신 루프 간격 (초)
    pub send_interval_seconds: i64,
    /// 이동 평균에 사용할 최근 작업 수
    #[serde(default = "default_response_time_jobs")]
    pub response_time_jobs: usize,
}

fn default_response_time_jobs() -> usize {
    SchedulerConfig::default().response_time_jobs
}

impl Schedule {
    /// 데몬 설정에서 기본 정책을 만듭니다.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            schedule_type: CONSTANT_INTERVAL_SCHEDULER.to_owned(),
            send_interval_seconds: i64::try_from(config.send_interval_secs).unwrap_or(i64::MAX),
            response_time_jobs: config.response_time_jobs,
        }
    }

    /// 송신 루프 대기 시간
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.send_interval_seconds.max(1).unsigned_abs())
    }

    /// 정책 타입과 간격을 검증합니다.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.schedule_type != CONSTANT_INTERVAL_SCHEDULER {
            return Err(SchedulerError::InvalidSchedule(format!(
                "unsupported schedule type '{}'",
                self.schedule_type
            )));
        }
        validate_interval(self.send_interval_seconds)
    }
}

/// 간격만 바꾸는 요청
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleUpdate {
    /// 새 송신 간격 (초)
    pub send_interval_seconds: i64,
}

pub(crate) fn validate_interval(seconds: i64) -> Result<(), SchedulerError> {
    if seconds <= 0 {
        return Err(SchedulerError::InvalidSchedule(format!(
            "send_interval_seconds must be positive, got {seconds}"
        )));
    }
    Ok(())
}
