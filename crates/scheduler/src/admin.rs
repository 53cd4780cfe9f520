//! 관리 API 응답 타입
//!
//! HTTP 라우터 바인딩은 이 크레이트 밖에서 합니다. 각 연산은 상태 코드와 JSON 본문을
//! 돌려주며, 라우터는 이를 그대로 응답으로 쓰면 됩니다.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// 상태 코드와 JSON 본문
#[derive(Debug, Clone, PartialEq)]
pub struct AdminResponse {
    /// HTTP 상태 코드
    pub status: u16,
    /// 응답 본문
    pub body: Value,
}

impl AdminResponse {
    /// 응답을 생성합니다.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// 200 OK
    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    /// 201 Created
    pub fn created(body: Value) -> Self {
        Self::new(201, body)
    }

    /// 404 Not Found
    pub fn not_found(id: &str) -> Self {
        Self::new(404, json!({ "error": "Not found", "UUID": id }))
    }

    /// 2xx 여부
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 작업 목록 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    /// 작업 ID
    pub id: String,
    /// 작업 타입 태그
    #[serde(rename = "type")]
    pub job_type: String,
}

/// 작업 생성/교체 요청
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobRequest {
    /// 교체할 작업 ID (생성 시 무시)
    pub id: String,
    /// 작업 타입 태그 (비어 있으면 Discovery)
    #[serde(rename = "type")]
    pub job_type: String,
}
