//! 처리 완료 로그 원장 -- (버킷, 객체 키) 중복 제거
//!
//! 원장은 테넌트별로 이미 전달한 로그 객체 목록을 보관하는 단순 리스트입니다.
//! 백엔드는 디스크(`{tenant}processed.yaml`)와 네트워크(REST GET/PUT) 두 가지입니다.
//!
//! # 동작 규칙
//! - 디스크 파일이 없으면 빈 원장으로 시작합니다 (에러 아님)
//! - [`LedgerStore::record`]는 항목이 없을 때만 추가하고 즉시 저장합니다 (write-through)
//! - 네트워크 저장은 2xx 응답을 요구하며 실패 시 재시도합니다
//! - 같은 테넌트 원장을 갱신하는 작업은 [`LedgerLocks`]로 직렬화해야 합니다

pub mod disk;
pub mod network;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use eventbridge_core::environment::{Environment, LoadSource};
use eventbridge_core::metrics as m;
use eventbridge_core::types::Customer;

use crate::error::IngestError;

pub use network::ledger_id_from_url;

/// 처리 완료된 로그 한 건
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedLogItem {
    /// 처리 시각
    pub date: DateTime<Utc>,
    /// 로그가 들어 있던 버킷
    pub bucket: String,
    /// 버킷 안의 객체 키
    pub name: String,
    /// 다운로드한 로컬 파일 경로
    #[serde(rename = "fileName")]
    pub file_name: String,
    /// 처리 후 로컬 파일 삭제 대상인지 여부 (삭제는 원장 저장 뒤에 수행)
    pub pruned: bool,
}

/// 테넌트별 처리 완료 로그 원장
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedLogs {
    /// 원장 ID (디스크: 테넌트 UUID, 네트워크: URL 마지막 경로 세그먼트)
    #[serde(default)]
    pub id: Uuid,
    /// 처리 완료 항목 (기록 순서)
    #[serde(
        rename = "processedItems",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub processed_items: Vec<ProcessedLogItem>,
    /// 원장 생성 시각
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// 마지막 갱신 시각
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl ProcessedLogs {
    /// 빈 원장을 생성합니다.
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            processed_items: Vec::new(),
            created: Some(Utc::now()),
            updated: None,
        }
    }

    /// (버킷, 키) 쌍이 이미 처리되었는지 확인합니다.
    pub fn is_processed(&self, bucket: &str, key: &str) -> bool {
        self.processed_items
            .iter()
            .any(|item| item.bucket == bucket && item.name == key)
    }

    /// 항목이 없을 때만 추가합니다. 추가했으면 `true`.
    pub fn insert(&mut self, item: ProcessedLogItem) -> bool {
        if self.is_processed(&item.bucket, &item.name) {
            return false;
        }
        self.processed_items.push(item);
        self.updated = Some(Utc::now());
        true
    }

    /// 처리 완료 항목 수
    pub fn len(&self) -> usize {
        self.processed_items.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.processed_items.is_empty()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// 원장 위치 -- 어느 백엔드에서 어떤 ID로 읽고 쓸지
///
/// 처리 대기 항목에 포함되어 Processor 작업으로 전달됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// 백엔드 선택
    #[serde(rename = "loadFrom")]
    pub load_from: LoadSource,
    /// 네트워크 원장 URL (`{ledgerURL}/{ledgerID}`), 디스크 백엔드에서는 빈 값
    #[serde(rename = "loadURL", default)]
    pub load_url: String,
    /// 소유 테넌트 ID
    #[serde(rename = "custID")]
    pub tenant_id: Uuid,
}

impl LedgerConfig {
    /// 디스크 원장 위치
    pub fn disk(tenant_id: Uuid) -> Self {
        Self {
            load_from: LoadSource::Filesystem,
            load_url: String::new(),
            tenant_id,
        }
    }

    /// 네트워크 원장 위치. `ledger_key`가 비어 있으면 테넌트 UUID를 사용합니다.
    pub fn network(base_url: &str, ledger_key: &str, tenant_id: Uuid) -> Self {
        let key = if ledger_key.trim().is_empty() {
            tenant_id.to_string()
        } else {
            ledger_key.trim().to_owned()
        };
        Self {
            load_from: LoadSource::Network,
            load_url: format!("{}/{}", base_url.trim_end_matches('/'), key),
            tenant_id,
        }
    }

    /// 런타임 환경과 테넌트 설정으로 원장 위치를 결정합니다.
    pub fn for_customer(env: &Environment, customer: &Customer) -> Self {
        match env.load_from {
            LoadSource::Filesystem => Self::disk(customer.id),
            LoadSource::Network => Self::network(
                &env.ledger_url,
                &customer.configuration.plog_config_id,
                customer.id,
            ),
        }
    }

    /// 로그와 에러 메시지에 사용하는 원장 식별자
    pub fn ledger_id(&self) -> String {
        match self.load_from {
            LoadSource::Filesystem => self.tenant_id.to_string(),
            LoadSource::Network => self
                .load_url
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_owned(),
        }
    }
}

/// 원장 백엔드 입출력
///
/// 디스크 디렉토리, HTTP 클라이언트, 네트워크 저장 재시도 횟수를 보관합니다.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    client: reqwest::Client,
    dir: PathBuf,
    save_attempts: u32,
}

impl LedgerStore {
    /// 새 원장 저장소를 생성합니다.
    pub fn new(client: reqwest::Client, dir: impl Into<PathBuf>, save_attempts: u32) -> Self {
        Self {
            client,
            dir: dir.into(),
            save_attempts: save_attempts.max(1),
        }
    }

    /// 디스크 원장 디렉토리
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// 원장을 로드합니다.
    pub async fn load(&self, config: &LedgerConfig) -> Result<ProcessedLogs, IngestError> {
        match config.load_from {
            LoadSource::Filesystem => disk::load(&self.dir, config.tenant_id).await,
            LoadSource::Network => {
                network::load(&self.client, &config.load_url, config.tenant_id).await
            }
        }
    }

    /// 원장 전체를 저장합니다.
    pub async fn save(
        &self,
        config: &LedgerConfig,
        ledger: &ProcessedLogs,
    ) -> Result<(), IngestError> {
        match config.load_from {
            LoadSource::Filesystem => disk::save(&self.dir, config.tenant_id, ledger).await,
            LoadSource::Network => {
                network::save(&self.client, &config.load_url, ledger, self.save_attempts).await
            }
        }
    }

    /// 항목을 기록하고 즉시 저장합니다.
    ///
    /// 이미 존재하는 (버킷, 키)는 추가하지 않으며 저장도 생략합니다.
    /// 추가했으면 `true`를 반환합니다.
    pub async fn record(
        &self,
        config: &LedgerConfig,
        ledger: &mut ProcessedLogs,
        item: ProcessedLogItem,
    ) -> Result<bool, IngestError> {
        if !ledger.insert(item) {
            return Ok(false);
        }
        self.save(config, ledger).await?;
        counter!(m::LEDGER_ENTRIES_RECORDED_TOTAL).increment(1);
        Ok(true)
    }
}

/// 테넌트별 원장 잠금 레지스트리
///
/// Processor 작업은 원장 재로드, 기록, 저장 동안 테넌트 잠금을 유지합니다.
#[derive(Debug, Clone, Default)]
pub struct LedgerLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl LedgerLocks {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 테넌트 잠금을 반환합니다. 없으면 새로 만듭니다.
    pub async fn lock_for(&self, tenant_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock().await;
        Arc::clone(locks.entry(tenant_id).or_default())
    }
}
