//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `eventbridge_`
//! - 컴포넌트: `scheduler_`, `dispatcher_`, `discovery_`, `processor_`, `ledger_`, `parser_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(eventbridge_core::metrics::PROCESSOR_EVENTS_DELIVERED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 작업 타입 레이블 키
pub const LABEL_JOB_TYPE: &str = "job_type";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Scheduler 메트릭 ──────────────────────────────────────────────

/// Scheduler: 송신 루프 반복 수 (counter)
pub const SCHEDULER_ITERATIONS_TOTAL: &str = "eventbridge_scheduler_iterations_total";

/// Scheduler: 디스패치 채널로 보낸 작업 수 (counter)
pub const SCHEDULER_JOBS_SENT_TOTAL: &str = "eventbridge_scheduler_jobs_sent_total";

/// Scheduler: 수신한 결과 수 (counter)
pub const SCHEDULER_RESULTS_RECEIVED_TOTAL: &str = "eventbridge_scheduler_results_received_total";

/// Scheduler: 작업 목록 크기 (gauge)
pub const SCHEDULER_JOB_LIST_SIZE: &str = "eventbridge_scheduler_job_list_size";

/// Scheduler: 최근 작업 평균 처리 시간 (gauge, 밀리초)
pub const SCHEDULER_AVERAGE_JOB_TIME_MS: &str = "eventbridge_scheduler_average_job_time_ms";

// ─── Dispatcher 메트릭 ─────────────────────────────────────────────

/// Dispatcher: 실행한 작업 수 (counter, labels: job_type, result)
pub const DISPATCHER_JOBS_RUN_TOTAL: &str = "eventbridge_dispatcher_jobs_run_total";

/// Dispatcher: 작업 실행 시간 (histogram, 초)
pub const DISPATCHER_JOB_DURATION_SECONDS: &str = "eventbridge_dispatcher_job_duration_seconds";

// ─── Discovery 메트릭 ──────────────────────────────────────────────

/// Discovery: 생성한 Processor 작업 수 (counter)
pub const DISCOVERY_ITEMS_QUEUED_TOTAL: &str = "eventbridge_discovery_items_queued_total";

/// Discovery: 이미 처리되어 건너뛴 객체 수 (counter)
pub const DISCOVERY_OBJECTS_SKIPPED_TOTAL: &str = "eventbridge_discovery_objects_skipped_total";

/// Discovery: 테넌트 단위 실패 수 (counter)
pub const DISCOVERY_TENANT_FAILURES_TOTAL: &str = "eventbridge_discovery_tenant_failures_total";

// ─── Processor / Parser 메트릭 ─────────────────────────────────────

/// Parser: 파싱된 레코드 수 (counter)
pub const PARSER_RECORDS_PARSED_TOTAL: &str = "eventbridge_parser_records_parsed_total";

/// Parser: 문법에 맞지 않아 건너뛴 라인 수 (counter)
pub const PARSER_LINES_SKIPPED_TOTAL: &str = "eventbridge_parser_lines_skipped_total";

/// Processor: 웹훅으로 전달한 이벤트 수 (counter)
pub const PROCESSOR_EVENTS_DELIVERED_TOTAL: &str = "eventbridge_processor_events_delivered_total";

/// Processor: 전달 실패 수 (counter)
pub const PROCESSOR_DELIVERY_FAILURES_TOTAL: &str =
    "eventbridge_processor_delivery_failures_total";

// ─── Ledger 메트릭 ─────────────────────────────────────────────────

/// Ledger: 기록된 항목 수 (counter)
pub const LEDGER_ENTRIES_RECORDED_TOTAL: &str = "eventbridge_ledger_entries_recorded_total";

/// Ledger: 네트워크 저장 재시도 수 (counter)
pub const LEDGER_SAVE_RETRIES_TOTAL: &str = "eventbridge_ledger_save_retries_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "eventbridge_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "eventbridge_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 작업 실행 시간 히스토그램 버킷 (초)
///
/// 10ms ~ 300s 범위 (Discovery는 전체 버킷 목록을 포함)
pub const JOB_DURATION_BUCKETS: [f64; 10] =
    [0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Scheduler
    describe_counter!(
        SCHEDULER_ITERATIONS_TOTAL,
        "Number of scheduler send-loop ticks"
    );
    describe_counter!(
        SCHEDULER_JOBS_SENT_TOTAL,
        "Number of jobs pushed onto the dispatch channel by the scheduler"
    );
    describe_counter!(
        SCHEDULER_RESULTS_RECEIVED_TOTAL,
        "Number of job results read by the scheduler"
    );
    describe_gauge!(SCHEDULER_JOB_LIST_SIZE, "Number of jobs in the scheduler job list");
    describe_gauge!(
        SCHEDULER_AVERAGE_JOB_TIME_MS,
        "Moving average of recent job request times in milliseconds"
    );

    // Dispatcher
    describe_counter!(
        DISPATCHER_JOBS_RUN_TOTAL,
        "Number of jobs executed by dispatcher workers"
    );
    describe_histogram!(
        DISPATCHER_JOB_DURATION_SECONDS,
        "Wall-clock time of a single job run in seconds"
    );

    // Discovery
    describe_counter!(
        DISCOVERY_ITEMS_QUEUED_TOTAL,
        "Number of processor jobs emitted by discovery"
    );
    describe_counter!(
        DISCOVERY_OBJECTS_SKIPPED_TOTAL,
        "Number of listed objects skipped because the ledger already holds them"
    );
    describe_counter!(
        DISCOVERY_TENANT_FAILURES_TOTAL,
        "Number of tenant-level failures during discovery"
    );

    // Processor / Parser
    describe_counter!(
        PARSER_RECORDS_PARSED_TOTAL,
        "Number of access-log records decoded"
    );
    describe_counter!(
        PARSER_LINES_SKIPPED_TOTAL,
        "Number of access-log lines skipped because they did not match the grammar"
    );
    describe_counter!(
        PROCESSOR_EVENTS_DELIVERED_TOTAL,
        "Number of filtered records delivered to the webhook"
    );
    describe_counter!(
        PROCESSOR_DELIVERY_FAILURES_TOTAL,
        "Number of processor jobs aborted by a webhook failure"
    );

    // Ledger
    describe_counter!(
        LEDGER_ENTRIES_RECORDED_TOTAL,
        "Number of processed-log entries recorded"
    );
    describe_counter!(
        LEDGER_SAVE_RETRIES_TOTAL,
        "Number of retried network ledger saves"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "EventBridge daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
