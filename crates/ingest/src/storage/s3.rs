//! `aws-sdk-s3` 기반 [`ObjectStore`] 구현
//!
//! 정적 자격 증명과 선택적 커스텀 엔드포인트(path-style)를 사용합니다.
//! 자격 증명이 비어 있으면 기본 AWS 자격 증명 체인을 사용합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use chrono::DateTime;
use tracing::debug;

use eventbridge_core::job::BoxFuture;
use eventbridge_core::types::Provider;

use super::{ObjectInfo, ObjectStore, ObjectStoreConnector};
use crate::error::IngestError;

const DEFAULT_REGION: &str = "us-east-1";

/// S3 호환 스토리지 커넥터
#[derive(Debug, Clone, Default)]
pub struct S3Connector;

impl S3Connector {
    /// 새 커넥터를 생성합니다.
    pub fn new() -> Self {
        Self
    }

    async fn build_client(provider: &Provider) -> Client {
        let region = if provider.region.is_empty() {
            DEFAULT_REGION.to_owned()
        } else {
            provider.region.clone()
        };

        let mut builder = if provider.credentials.is_empty() {
            let shared = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region))
                .load()
                .await;
            aws_sdk_s3::config::Builder::from(&shared)
        } else {
            let credentials = Credentials::new(
                &provider.credentials,
                &provider.key,
                None,
                None,
                "eventbridge-provider",
            );
            aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(credentials)
                .region(Region::new(region))
        };

        if !provider.endpoint.is_empty() {
            builder = builder
                .endpoint_url(&provider.endpoint)
                .force_path_style(true);
        }

        Client::from_conf(builder.build())
    }
}

impl ObjectStoreConnector for S3Connector {
    fn connect<'a>(
        &'a self,
        provider: &'a Provider,
    ) -> BoxFuture<'a, Result<Arc<dyn ObjectStore>, IngestError>> {
        Box::pin(async move {
            let client = Self::build_client(provider).await;
            debug!(
                provider = %provider.name,
                endpoint = %provider.endpoint,
                "object storage client initialized"
            );
            Ok(Arc::new(S3ObjectStore { client }) as Arc<dyn ObjectStore>)
        })
    }
}

/// S3 클라이언트를 감싼 [`ObjectStore`]
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// 이미 구성된 클라이언트로 생성합니다.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn list_all(&self, bucket: &str) -> Result<Vec<ObjectInfo>, IngestError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut req = self.client.list_objects_v2().bucket(bucket);
            if let Some(token) = &continuation_token {
                req = req.continuation_token(token);
            }

            let resp = req.send().await.map_err(|e| IngestError::Storage {
                bucket: bucket.to_owned(),
                reason: format!("list objects failed: {e}"),
            })?;

            for obj in resp.contents() {
                let key = obj.key().unwrap_or_default();

                // 디렉토리 마커와 빈 키는 건너뜁니다
                if key.is_empty() || key.ends_with('/') {
                    continue;
                }

                objects.push(ObjectInfo {
                    key: key.to_owned(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified: obj
                        .last_modified()
                        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
                });
            }

            if resp.is_truncated().unwrap_or(false) {
                continuation_token = resp.next_continuation_token().map(str::to_owned);
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        debug!(bucket, objects = objects.len(), "listed bucket");
        Ok(objects)
    }

    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<PathBuf, IngestError> {
        let storage_error = |reason: String| IngestError::Storage {
            bucket: bucket.to_owned(),
            reason,
        };

        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error(format!("get object '{key}' failed: {e}")))?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| storage_error(format!("read object '{key}' failed: {e}")))?
            .into_bytes();

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &data).await?;

        debug!(bucket, key, bytes = data.len(), dest = %dest.display(), "downloaded object");
        Ok(dest.to_path_buf())
    }
}

impl ObjectStore for S3ObjectStore {
    fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ObjectInfo>, IngestError>> {
        Box::pin(self.list_all(bucket))
    }

    fn fetch_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<PathBuf, IngestError>> {
        Box::pin(self.fetch(bucket, key, dest))
    }
}
