//! 설정 관리 -- eventbridge.toml 파싱 및 데몬 설정
//!
//! [`EventBridgeConfig`]는 데몬 전체 설정을 담는 최상위 구조체입니다.
//! 테넌트별 런타임 환경 프로파일은 [`environment`](crate::environment) 모듈을 참고하세요.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`EVENTBRIDGE_SCHEDULER_SEND_INTERVAL_SECS=60` 형식)
//! 3. 설정 파일 (`eventbridge.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), eventbridge_core::error::EventBridgeError> {
//! use eventbridge_core::config::EventBridgeConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = EventBridgeConfig::load("eventbridge.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = EventBridgeConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, EventBridgeError};

/// EventBridge 통합 설정
///
/// `eventbridge.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBridgeConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스케줄러 설정
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// 작업 디스패처(워커 풀) 설정
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// 로그 수집/전달 설정
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl EventBridgeConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, EventBridgeError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, EventBridgeError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EventBridgeError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                EventBridgeError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, EventBridgeError> {
        toml::from_str(toml_str).map_err(|e| {
            EventBridgeError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `EVENTBRIDGE_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "EVENTBRIDGE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "EVENTBRIDGE_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "EVENTBRIDGE_GENERAL_PID_FILE");

        // Scheduler
        override_u64(
            &mut self.scheduler.send_interval_secs,
            "EVENTBRIDGE_SCHEDULER_SEND_INTERVAL_SECS",
        );
        override_usize(
            &mut self.scheduler.response_time_jobs,
            "EVENTBRIDGE_SCHEDULER_RESPONSE_TIME_JOBS",
        );
        override_usize(
            &mut self.scheduler.job_channel_capacity,
            "EVENTBRIDGE_SCHEDULER_JOB_CHANNEL_CAPACITY",
        );
        override_usize(
            &mut self.scheduler.result_channel_capacity,
            "EVENTBRIDGE_SCHEDULER_RESULT_CHANNEL_CAPACITY",
        );

        // Dispatcher
        override_usize(&mut self.dispatcher.workers, "EVENTBRIDGE_DISPATCHER_WORKERS");

        // Ingest
        override_string(
            &mut self.ingest.environments_dir,
            "EVENTBRIDGE_INGEST_ENVIRONMENTS_DIR",
        );
        override_string(&mut self.ingest.download_dir, "EVENTBRIDGE_INGEST_DOWNLOAD_DIR");
        override_string(&mut self.ingest.ledger_dir, "EVENTBRIDGE_INGEST_LEDGER_DIR");
        override_u64(
            &mut self.ingest.client_timeout_secs,
            "EVENTBRIDGE_INGEST_CLIENT_TIMEOUT_SECS",
        );
        override_u32(
            &mut self.ingest.ledger_save_attempts,
            "EVENTBRIDGE_INGEST_LEDGER_SAVE_ATTEMPTS",
        );
        override_u64(
            &mut self.ingest.tenant_list_count,
            "EVENTBRIDGE_INGEST_TENANT_LIST_COUNT",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "EVENTBRIDGE_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "EVENTBRIDGE_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "EVENTBRIDGE_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), EventBridgeError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.scheduler.send_interval_secs == 0 {
            return Err(invalid(
                "scheduler.send_interval_secs",
                "interval must be greater than 0".to_owned(),
            ));
        }

        if self.scheduler.response_time_jobs == 0 {
            return Err(invalid(
                "scheduler.response_time_jobs",
                "window must hold at least one sample".to_owned(),
            ));
        }

        if self.scheduler.job_channel_capacity == 0 || self.scheduler.result_channel_capacity == 0
        {
            return Err(invalid(
                "scheduler.channel_capacity",
                "channel capacity must be greater than 0".to_owned(),
            ));
        }

        if self.dispatcher.workers == 0 {
            return Err(invalid(
                "dispatcher.workers",
                "at least one worker is required".to_owned(),
            ));
        }

        if self.ingest.ledger_save_attempts == 0 {
            return Err(invalid(
                "ingest.ledger_save_attempts",
                "at least one attempt is required".to_owned(),
            ));
        }

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid(
                "metrics.endpoint",
                "only '/metrics' is supported".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> EventBridgeError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 기록하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 스케줄러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Discovery 작업 재주입 간격 (초)
    pub send_interval_secs: u64,
    /// 평균 처리 시간 계산에 사용할 최근 작업 수
    pub response_time_jobs: usize,
    /// 작업 채널 용량
    pub job_channel_capacity: usize,
    /// 결과 채널 용량
    pub result_channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            send_interval_secs: 300, // 5분마다 새 로그 탐색
            response_time_jobs: 10,
            job_channel_capacity: 100,
            result_channel_capacity: 100,
        }
    }
}

/// 디스패처 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// 워커 수
    pub workers: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// 로그 수집/전달 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 런타임 환경 프로파일 디렉토리 (`{dir}/{name}.yaml`)
    pub environments_dir: String,
    /// 다운로드한 로그 객체를 저장할 디렉토리
    pub download_dir: String,
    /// 디스크 원장(`{tenant}processed.yaml`) 디렉토리
    pub ledger_dir: String,
    /// HTTP 클라이언트 타임아웃 (초)
    pub client_timeout_secs: u64,
    /// 네트워크 원장 저장 최대 시도 횟수
    pub ledger_save_attempts: u32,
    /// 테넌트 목록 조회 시 `count` 파라미터
    pub tenant_list_count: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            environments_dir: "environments".to_owned(),
            download_dir: "/var/lib/eventbridge/logs".to_owned(),
            ledger_dir: "/var/lib/eventbridge/ledger".to_owned(),
            client_timeout_secs: 30,
            ledger_save_attempts: 3,
            tenant_list_count: 999_999_999,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리스닝 주소
    pub listen_addr: String,
    /// 리스닝 포트
    pub port: u16,
    /// 스크레이프 엔드포인트
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

pub(crate) fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
