//! 도메인 타입 -- 테넌트, 버킷, provider, 웹훅 대상
//!
//! 외부 설정 로더(디스크/네트워크)가 채우는 읽기 전용 데이터 모델입니다.
//! YAML 키(`id`, `config`)와 JSON 키(`customersuuid`, `configuration`)를 모두 받아들입니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;

/// 테넌트 (원본 데이터에서는 "customer")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// 테넌트 고유 ID
    #[serde(rename = "customersuuid", alias = "id")]
    pub id: Uuid,
    /// 표시 이름
    #[serde(default)]
    pub name: String,
    /// 모니터링 대상 버킷
    #[serde(default)]
    pub logs: Vec<LogBucket>,
    /// 스토리지 provider 목록
    #[serde(default)]
    pub providers: Vec<Provider>,
    /// 전달/원장 설정
    #[serde(default, rename = "configuration", alias = "config")]
    pub configuration: SyncConfiguration,
}

impl Customer {
    /// UUID의 첫 그룹을 사람이 읽기 쉬운 짧은 이름으로 사용합니다.
    pub fn short_name(&self) -> String {
        self.id
            .to_string()
            .split('-')
            .next()
            .unwrap_or_default()
            .to_owned()
    }

    /// 이름으로 provider를 찾습니다.
    pub fn find_provider(&self, name: &str) -> Result<&Provider, ConfigError> {
        self.providers
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ConfigError::ProviderNotFound {
                provider: name.to_owned(),
            })
    }
}

/// 로그 파일 형식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// S3 서버 접근 로그
    #[default]
    S3,
    /// W3C 확장 로그 (인식만 하고 처리하지 않음)
    W3c,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S3 => write!(f, "s3"),
            Self::W3c => write!(f, "w3c"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "w3c" => Ok(Self::W3c),
            other => Err(ConfigError::InvalidValue {
                field: "logFormat".to_owned(),
                reason: format!("unknown log format '{other}'"),
            }),
        }
    }
}

/// 모니터링 대상 버킷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogBucket {
    /// 버킷 이름
    pub name: String,
    /// 로그 형식
    #[serde(rename = "logFormat", default)]
    pub log_format: LogFormat,
    /// provider 이름 (테넌트의 provider 목록에서 조회)
    pub provider: String,
    /// 처리 후 로컬 사본 삭제 여부
    #[serde(rename = "pruneAfterProcessing", default)]
    pub prune_after_processing: bool,
    /// 이벤트 필터 규칙
    #[serde(default)]
    pub filter: EventFilter,
}

/// 이벤트 필터 규칙 -- 세 개의 독립된 허용 목록
///
/// 빈 목록은 제약 없음으로 취급합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventFilter {
    /// 허용 API (예: `REST`)
    #[serde(rename = "matchedAPI")]
    pub matched_api: Vec<String>,
    /// 허용 HTTP 메서드 (예: `PUT`)
    #[serde(rename = "matchedHTTPMethods")]
    pub matched_http_methods: Vec<String>,
    /// 허용 리소스 타입 (예: `OBJECT`)
    #[serde(rename = "matchedResouceTypes", alias = "matchedResourceTypes")]
    pub matched_resource_types: Vec<String>,
}

/// 스토리지 provider 접속 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Provider {
    /// provider 이름 (버킷에서 참조)
    pub name: String,
    /// 액세스 키 ID
    pub credentials: String,
    /// 시크릿 키
    pub key: String,
    /// 리전
    pub region: String,
    /// 엔드포인트 (비어 있으면 기본 AWS 엔드포인트)
    pub endpoint: String,
}

/// 웹훅 전달 대상
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookTarget {
    /// 경로 이름
    pub name: String,
    /// 호스트
    pub host: String,
    /// 포트
    pub port: String,
}

impl WebhookTarget {
    /// `http://{host}:{port}/{name}` 형식의 전달 URL
    pub fn url(&self) -> String {
        format!("http://{}:{}/{}", self.host, self.port, self.name)
    }

    /// 호스트만 바꾼 사본을 반환합니다.
    pub fn with_host(&self, host: &str) -> Self {
        Self {
            host: host.to_owned(),
            ..self.clone()
        }
    }
}

/// 테넌트의 전달/원장 설정
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfiguration {
    /// 설정 이름
    pub name: String,
    /// 배포 환경
    pub environment: String,
    /// 설정 버전
    pub version: String,
    /// 웹훅 대상
    pub hook: WebhookTarget,
    /// 네트워크 원장 상관 ID
    #[serde(rename = "plogConfigID")]
    pub plog_config_id: String,
}
