//! 처리 대기 항목 -- Discovery가 만들고 Processor가 소비하는 작업 단위

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use eventbridge_core::types::{EventFilter, LogFormat, WebhookTarget};

use crate::ledger::LedgerConfig;

/// 미처리 로그 객체 한 건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogQueueItem {
    /// 소유 테넌트 ID
    pub id: Uuid,
    /// 버킷 이름
    pub bucket: String,
    /// 전달 대상 (호스트 덮어쓰기 적용 완료)
    pub webhook: WebhookTarget,
    /// 버킷 필터 규칙
    pub filter: EventFilter,
    /// 객체 키
    pub name: String,
    /// 항목 생성 시각
    pub created: DateTime<Utc>,
    /// 다운로드한 로컬 파일 경로
    pub location: PathBuf,
    /// 로그 형식
    #[serde(rename = "logFormat")]
    pub log_format: LogFormat,
    /// 전달 완료 여부
    pub processed: bool,
    /// 처리 후 로컬 파일 삭제 여부
    pub prune: bool,
    /// 원장 위치
    pub ledger: LedgerConfig,
}
