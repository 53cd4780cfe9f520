//! 오브젝트 스토리지 능력 -- 버킷 목록 조회와 객체 다운로드
//!
//! Discovery 작업은 [`ObjectStoreConnector`]로 provider마다 [`ObjectStore`]를 얻고,
//! 버킷 전체를 나열한 뒤 미처리 객체를 로컬로 내려받습니다.
//! trait 객체로 사용하므로 비동기 메서드는 [`BoxFuture`]를 반환합니다.

pub mod s3;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use eventbridge_core::job::BoxFuture;
use eventbridge_core::types::Provider;

use crate::error::IngestError;

pub use s3::{S3Connector, S3ObjectStore};

/// 버킷 목록의 객체 한 건
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// 객체 키
    pub key: String,
    /// 크기 (바이트)
    pub size: u64,
    /// 마지막 수정 시각
    pub last_modified: Option<DateTime<Utc>>,
}

/// 버킷 단위 오브젝트 스토리지 연산
pub trait ObjectStore: Send + Sync {
    /// 버킷의 모든 객체를 나열합니다 (재귀, prefix 없음, 디렉토리 마커 제외).
    fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ObjectInfo>, IngestError>>;

    /// 객체를 `dest`에 내려받고 기록한 경로를 반환합니다.
    fn fetch_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<PathBuf, IngestError>>;
}

/// provider 접속 정보로 [`ObjectStore`]를 생성합니다.
pub trait ObjectStoreConnector: Send + Sync {
    /// provider에 연결합니다.
    fn connect<'a>(
        &'a self,
        provider: &'a Provider,
    ) -> BoxFuture<'a, Result<Arc<dyn ObjectStore>, IngestError>>;
}

/// 객체 키를 로컬 파일 이름 하나로 평탄화합니다.
///
/// `%`와 `_`는 `%25`, `%5F`로 이스케이프한 뒤 `/`를 `_`로 바꾸므로 서로 다른 키는
/// 항상 서로 다른 이름이 됩니다. 첫 글자 `.`은 `%2E`가 되어 `.`이나 `..` 같은
/// 경로 성분이 만들어지지 않습니다.
pub fn flatten_key(key: &str) -> String {
    let mut flat = String::with_capacity(key.len());
    for (i, c) in key.chars().enumerate() {
        match c {
            '%' => flat.push_str("%25"),
            '_' => flat.push_str("%5F"),
            '/' => flat.push('_'),
            '.' if i == 0 => flat.push_str("%2E"),
            c => flat.push(c),
        }
    }
    flat
}
