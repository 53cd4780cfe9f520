//! 테넌트 디렉토리 -- 파일 또는 REST 엔드포인트에서 테넌트 목록 로드
//!
//! - 파일: YAML 테넌트 리스트 (최상위 `customers:` 래퍼도 허용)
//! - 네트워크: `GET {url}LIST?count=n`으로 UUID 목록을 얻고, `GET {url}/{uuid}`로 개별 조회
//!
//! 개별 테넌트 조회 실패와 버킷이 없는 테넌트는 경고 후 건너뜁니다.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use eventbridge_core::environment::{Environment, LoadSource};
use eventbridge_core::types::Customer;

use crate::error::IngestError;

/// 테넌트 목록 소스
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantSource {
    /// 로컬 YAML 파일
    Filesystem(PathBuf),
    /// REST 엔드포인트
    Network {
        /// 테넌트 디렉토리 기본 URL
        url: String,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CustomerFile {
    List(Vec<Customer>),
    Wrapped { customers: Vec<Customer> },
}

#[derive(Deserialize)]
struct ListEntry {
    uuid: String,
}

impl TenantSource {
    /// 런타임 환경 프로파일에서 소스를 결정합니다.
    pub fn from_environment(env: &Environment) -> Self {
        match env.load_from {
            LoadSource::Filesystem => Self::Filesystem(PathBuf::from(&env.config_file)),
            LoadSource::Network => Self::Network {
                url: env.event_bridge_config_url.clone(),
            },
        }
    }

    /// 테넌트 목록을 로드합니다.
    pub async fn load(
        &self,
        client: &reqwest::Client,
        list_count: u64,
    ) -> Result<Vec<Customer>, IngestError> {
        match self {
            Self::Filesystem(path) => load_from_file(path).await,
            Self::Network { url } => load_from_network(client, url, list_count).await,
        }
    }
}

async fn load_from_file(path: &Path) -> Result<Vec<Customer>, IngestError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        IngestError::TenantDirectory(format!("failed to read {}: {e}", path.display()))
    })?;

    let customers = match serde_yaml::from_str::<CustomerFile>(&content) {
        Ok(CustomerFile::List(list)) | Ok(CustomerFile::Wrapped { customers: list }) => list,
        Err(e) => {
            return Err(IngestError::TenantDirectory(format!(
                "failed to parse {}: {e}",
                path.display()
            )));
        }
    };

    debug!(path = %path.display(), tenants = customers.len(), "loaded tenants from file");
    Ok(customers)
}

async fn load_from_network(
    client: &reqwest::Client,
    url: &str,
    list_count: u64,
) -> Result<Vec<Customer>, IngestError> {
    let list_url = format!("{url}LIST");
    let response = client
        .get(&list_url)
        .query(&[("count", list_count)])
        .header("content-type", "application/json")
        .send()
        .await
        .map_err(|e| IngestError::TenantDirectory(format!("GET {list_url} failed: {e}")))?;

    if !response.status().is_success() {
        return Err(IngestError::TenantDirectory(format!(
            "GET {list_url} returned HTTP {}",
            response.status()
        )));
    }

    let entries: Vec<ListEntry> = response
        .json()
        .await
        .map_err(|e| IngestError::TenantDirectory(format!("malformed tenant list: {e}")))?;

    let mut customers = Vec::with_capacity(entries.len());
    for entry in entries {
        match fetch_customer(client, url, &entry.uuid).await {
            Ok(customer) if customer.logs.is_empty() => {
                info!(tenant_id = %entry.uuid, "skipping tenant with no monitored buckets");
            }
            Ok(customer) => {
                let buckets: Vec<&str> = customer.logs.iter().map(|l| l.name.as_str()).collect();
                debug!(tenant_id = %entry.uuid, ?buckets, "adding tenant");
                customers.push(customer);
            }
            Err(e) => {
                warn!(tenant_id = %entry.uuid, error = %e, "failed to load tenant, skipping");
            }
        }
    }

    Ok(customers)
}

async fn fetch_customer(
    client: &reqwest::Client,
    url: &str,
    id: &str,
) -> Result<Customer, IngestError> {
    let response = client
        .get(format!("{url}/{id}"))
        .header("content-type", "application/json")
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json().await?)
}
