//! 스케줄러 메트릭 blob
//!
//! 카운터 맵과 시작 시각, 가동 시간을 JSON으로 노출합니다.
//! Prometheus 메트릭은 `eventbridge_core::metrics` 상수로 별도 기록합니다.

use std::collections::{BTreeMap, VecDeque};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

/// 송신 루프 반복 수
pub const SCHEDULER_ITERATIONS: &str = "scheduler_iterations";
/// 디스패치 채널로 보낸 작업 수
pub const JOBS_SENT: &str = "jobs_sent";
/// 작업 목록 크기
pub const JOB_LIST_SIZE: &str = "job_list_size";
/// 수신한 결과 수
pub const RESULTS_RECEIVED: &str = "results_received";
/// 디스패치 채널 사용량
pub const CURRENT_JOB_CHANNEL_UTILIZATION: &str = "current_job_channel_utilization";
/// 디스패치 채널 용량
pub const CURRENT_JOB_CHANNEL_CAPACITY: &str = "current_job_channel_capacity";
/// 결과 채널 사용량
pub const CURRENT_RESULT_CHANNEL_UTILIZATION: &str = "current_result_channel_utilization";
/// 결과 채널 용량
pub const CURRENT_RESULT_CHANNEL_CAPACITY: &str = "current_result_channel_capacity";
/// 타임아웃된 작업 수
pub const NUMBER_OF_JOBS_TIMED_OUT: &str = "number_of_jobs_timed_out";
/// 최근 작업 평균 처리 시간 (밀리초)
pub const AVERAGE_JOB_PROCESSING_TIME: &str = "average_job_processing_time";

#[derive(Debug, Serialize)]
struct Snapshot {
    start_time: DateTime<Utc>,
    /// 초 단위
    up_time: i64,
    counters: BTreeMap<String, i64>,
}

/// 스케줄러 카운터 모음
#[derive(Debug)]
pub struct SchedulerMetrics {
    inner: Mutex<Snapshot>,
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerMetrics {
    /// 빈 카운터로 생성합니다. 시작 시각은 현재 시각입니다.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Snapshot {
                start_time: Utc::now(),
                up_time: 0,
                counters: BTreeMap::new(),
            }),
        }
    }

    /// 시작 시각을 현재로 재설정합니다.
    pub async fn set_start_time(&self) {
        self.inner.lock().await.start_time = Utc::now();
    }

    /// 가동 시간을 갱신하고 반환합니다 (초).
    pub async fn update_up_time(&self) -> i64 {
        let mut inner = self.inner.lock().await;
        inner.up_time = (Utc::now() - inner.start_time).num_seconds();
        inner.up_time
    }

    /// 카운터를 1 증가시킵니다.
    pub async fn inc(&self, key: &str) {
        *self.inner.lock().await.counters.entry(key.to_owned()).or_default() += 1;
    }

    /// 카운터 값을 설정합니다.
    pub async fn set(&self, key: &str, value: i64) {
        self.inner.lock().await.counters.insert(key.to_owned(), value);
    }

    /// 카운터 값 (없으면 0)
    pub async fn value(&self, key: &str) -> i64 {
        self.inner
            .lock()
            .await
            .counters
            .get(key)
            .copied()
            .unwrap_or_default()
    }

    /// JSON 메트릭 blob
    pub async fn to_json(&self) -> Result<Bytes, serde_json::Error> {
        let inner = self.inner.lock().await;
        serde_json::to_vec(&*inner).map(Bytes::from)
    }
}

/// 최근 `capacity`개의 처리 시간만 유지하며 평균을 계산합니다.
///
/// `capacity`가 0이면 1로 취급합니다.
pub fn compute_average_response_time(
    window: &mut VecDeque<u64>,
    capacity: usize,
    new_time: u64,
) -> u64 {
    let capacity = capacity.max(1);
    while window.len() >= capacity {
        window.pop_front();
    }
    window.push_back(new_time);

    let total: u64 = window.iter().sum();
    total / window.len() as u64
}
