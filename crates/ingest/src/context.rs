//! 파이프라인 실행 컨텍스트
//!
//! 작업 실행에 필요한 공유 자원을 묶습니다. 작업은 `Arc<PipelineContext>`로 보관하며
//! 직렬화 대상이 아닙니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use eventbridge_core::config::IngestConfig;
use eventbridge_core::environment::Environment;
use eventbridge_core::types::Customer;

use crate::error::IngestError;
use crate::ledger::{LedgerLocks, LedgerStore};
use crate::storage::{ObjectStoreConnector, flatten_key};

/// 런타임 환경 프로파일을 얻는 방법
#[derive(Debug, Clone)]
enum EnvironmentSource {
    /// 매 탐색마다 프로파일 디렉토리에서 다시 해석
    Profiles(PathBuf),
    /// 고정 프로파일
    Fixed(Environment),
}

/// 작업 공유 자원
pub struct PipelineContext {
    environment: EnvironmentSource,
    client: reqwest::Client,
    connector: Arc<dyn ObjectStoreConnector>,
    download_dir: PathBuf,
    ledger: LedgerStore,
    ledger_locks: LedgerLocks,
    tenant_list_count: u64,
}

impl PipelineContext {
    /// 수집 설정과 스토리지 커넥터로 컨텍스트를 생성합니다.
    pub fn from_config(
        config: &IngestConfig,
        connector: Arc<dyn ObjectStoreConnector>,
    ) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.client_timeout_secs))
            .build()?;

        Ok(Self {
            environment: EnvironmentSource::Profiles(PathBuf::from(&config.environments_dir)),
            ledger: LedgerStore::new(
                client.clone(),
                &config.ledger_dir,
                config.ledger_save_attempts,
            ),
            client,
            connector,
            download_dir: PathBuf::from(&config.download_dir),
            ledger_locks: LedgerLocks::new(),
            tenant_list_count: config.tenant_list_count,
        })
    }

    /// 프로파일 해석 대신 고정된 런타임 환경을 사용합니다.
    pub fn with_environment(mut self, env: Environment) -> Self {
        self.environment = EnvironmentSource::Fixed(env);
        self
    }

    /// 현재 런타임 환경을 반환합니다.
    pub async fn environment(&self) -> Environment {
        match &self.environment {
            EnvironmentSource::Profiles(dir) => Environment::resolve(dir).await,
            EnvironmentSource::Fixed(env) => env.clone(),
        }
    }

    /// 공유 HTTP 클라이언트
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// 오브젝트 스토리지 커넥터
    pub fn connector(&self) -> &dyn ObjectStoreConnector {
        self.connector.as_ref()
    }

    /// 원장 저장소
    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    /// 테넌트별 원장 잠금
    pub fn ledger_locks(&self) -> &LedgerLocks {
        &self.ledger_locks
    }

    /// 테넌트 목록 조회 크기
    pub fn tenant_list_count(&self) -> u64 {
        self.tenant_list_count
    }

    /// 다운로드 디렉토리
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// 객체를 내려받을 로컬 경로: `{download_dir}/{tenant short name}/{bucket}/{flattened key}`
    ///
    /// 버킷과 키는 [`flatten_key`]로 인코딩하므로 항상 버킷 디렉토리 바로 아래의 파일입니다.
    pub fn download_path(&self, customer: &Customer, bucket: &str, key: &str) -> PathBuf {
        self.download_dir
            .join(customer.short_name())
            .join(flatten_key(bucket))
            .join(flatten_key(key))
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("environment", &self.environment)
            .field("download_dir", &self.download_dir)
            .field("ledger", &self.ledger)
            .field("tenant_list_count", &self.tenant_list_count)
            .finish_non_exhaustive()
    }
}
