//! 런타임 환경 프로파일 -- `environments/{name}.yaml`
//!
//! 프로파일 이름은 `PR_BACKEND_END` 환경변수로 선택하며 (기본값 `environment`),
//! 개별 필드는 `EB_*` 환경변수로 덮어쓸 수 있습니다.
//!
//! 프로파일이 없거나 잘못된 경우에도 파이프라인은 멈추지 않습니다.
//! [`Environment::resolve`]는 경고 로그를 남기고 기본값으로 진행합니다.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::override_string;
use crate::error::{ConfigError, EventBridgeError};

/// 프로파일 이름을 선택하는 환경변수
pub const PROFILE_ENV_VAR: &str = "PR_BACKEND_END";
/// 기본 프로파일 이름
pub const DEFAULT_PROFILE: &str = "environment";

/// 테넌트 목록과 원장을 어디서 읽을지 결정합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSource {
    /// REST 엔드포인트
    Network,
    /// 로컬 파일
    #[default]
    Filesystem,
}

impl fmt::Display for LoadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Filesystem => write!(f, "filesystem"),
        }
    }
}

impl FromStr for LoadSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "network" => Ok(Self::Network),
            "filesystem" => Ok(Self::Filesystem),
            other => Err(ConfigError::InvalidValue {
                field: "loadFrom".to_owned(),
                reason: format!("expected 'network' or 'filesystem', got '{other}'"),
            }),
        }
    }
}

/// 런타임 환경 프로파일
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    /// 테넌트/원장 로딩 소스
    #[serde(rename = "loadFrom")]
    pub load_from: LoadSource,
    /// 환경 이름 (dev, test, staging, production)
    #[serde(rename = "environmentName")]
    pub environment_name: String,
    /// 테넌트 디렉토리 REST URL
    #[serde(rename = "eventBridgeConfigURL")]
    pub event_bridge_config_url: String,
    /// 테넌트 YAML 파일 경로
    #[serde(rename = "configFile")]
    pub config_file: String,
    /// 원장 REST 기본 URL
    #[serde(rename = "ledgerURL")]
    pub ledger_url: String,
    /// 웹훅 호스트 덮어쓰기 (비어 있으면 테넌트 설정 사용)
    #[serde(rename = "postHost")]
    pub post_host: String,
}

impl Environment {
    /// 현재 프로세스 환경에서 선택된 프로파일 이름을 반환합니다.
    pub fn profile_name() -> String {
        std::env::var(PROFILE_ENV_VAR)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_owned())
    }

    /// 프로파일 디렉토리와 이름으로 파일 경로를 만듭니다.
    pub fn profile_path(dir: impl AsRef<Path>, name: &str) -> PathBuf {
        dir.as_ref().join(format!("{name}.yaml"))
    }

    /// YAML 파일에서 프로파일을 로드합니다 (환경변수 오버라이드 없음).
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

    /// YAML 문자열에서 프로파일을 파싱합니다.
    pub fn parse(yaml: &str) -> Result<Self, EventBridgeError> {
        serde_yaml::from_str(yaml).map_err(|e| {
            EventBridgeError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// `EB_*` 환경변수로 필드를 덮어씁니다.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("EB_LOAD_FROM") {
            match val.parse::<LoadSource>() {
                Ok(source) => self.load_from = source,
                Err(e) => tracing::warn!(
                    env_key = "EB_LOAD_FROM",
                    value = val.as_str(),
                    error = %e,
                    "invalid load source in env var, ignoring"
                ),
            }
        }
        override_string(&mut self.event_bridge_config_url, "EB_CONFIG_URL");
        override_string(&mut self.config_file, "EB_CONFIG_FILE");
        override_string(&mut self.ledger_url, "EB_LEDGER_URL");
        override_string(&mut self.post_host, "EB_POST_HOST");
    }

    /// 프로파일 디렉토리에서 현재 프로파일을 해석합니다.
    ///
    /// 로드에 실패하면 경고를 남기고 기본값을 사용합니다.
    /// 환경변수 오버라이드는 항상 마지막에 적용됩니다.
    pub async fn resolve(dir: impl AsRef<Path>) -> Self {
        let name = Self::profile_name();
        let path = Self::profile_path(dir, &name);

        let mut env = match Self::from_file(&path).await {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to load environment profile, using defaults"
                );
                Self::default()
            }
        };
        env.apply_env_overrides();
        env
    }

    /// 웹훅 호스트 덮어쓰기 값이 설정되어 있으면 반환합니다.
    pub fn post_host_override(&self) -> Option<&str> {
        let host = self.post_host.trim();
        (!host.is_empty()).then_some(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const PROFILE: &str = r#"
loadFrom: network
environmentName: staging
eventBridgeConfigURL: http://config.local/api/v1/customers
configFile: customers.yaml
ledgerURL: http://config.local/api/v1/plogs
postHost: bridge.internal
"#;

    #[test]
    fn parse_full_profile() {
        let env = Environment::parse(PROFILE).unwrap();
        assert_eq!(env.load_from, LoadSource::Network);
        assert_eq!(env.environment_name, "staging");
        assert_eq!(env.ledger_url, "http://config.local/api/v1/plogs");
        assert_eq!(env.post_host_override(), Some("bridge.internal"));
    }

    #[test]
    fn parse_partial_profile_uses_defaults() {
        let env = Environment::parse("environmentName: dev\n").unwrap();
        assert_eq!(env.load_from, LoadSource::Filesystem);
        assert!(env.post_host_override().is_none());
    }

    #[test]
    fn load_source_from_str_is_case_insensitive() {
        assert_eq!("NETWORK".parse::<LoadSource>().unwrap(), LoadSource::Network);
        assert!("carrier-pigeon".parse::<LoadSource>().is_err());
    }

    #[tokio::test]
    #[serial]
    async fn resolve_missing_profile_degrades_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::resolve(dir.path()).await;
        assert_eq!(env.load_from, LoadSource::Filesystem);
        assert!(env.event_bridge_config_url.is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn resolve_applies_env_overrides_after_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("environment.yaml"), PROFILE).unwrap();

        // SAFETY: serial 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe {
            std::env::set_var("EB_LOAD_FROM", "filesystem");
            std::env::set_var("EB_POST_HOST", "127.0.0.1");
        }
        let env = Environment::resolve(dir.path()).await;
        unsafe {
            std::env::remove_var("EB_LOAD_FROM");
            std::env::remove_var("EB_POST_HOST");
        }

        assert_eq!(env.load_from, LoadSource::Filesystem);
        assert_eq!(env.post_host_override(), Some("127.0.0.1"));
        assert_eq!(env.environment_name, "staging");
    }

    #[tokio::test]
    #[serial]
    async fn resolve_selects_profile_by_env_var() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("prod.yaml"), "environmentName: production\n").unwrap();

        // SAFETY: serial 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var(PROFILE_ENV_VAR, "prod") };
        let env = Environment::resolve(dir.path()).await;
        unsafe { std::env::remove_var(PROFILE_ENV_VAR) };

        assert_eq!(env.environment_name, "production");
    }
}
