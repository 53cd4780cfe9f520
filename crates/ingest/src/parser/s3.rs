//! S3 서버 접근 로그 파서
//!
//! 한 줄은 18개의 위치 기반 필드로 구성됩니다.
//! 따옴표 필드(request URI, referrer, user agent), 대괄호 타임스탬프,
//! 그 외에는 공백으로 구분된 필드입니다.
//!
//! # 형식 예시
//! ```text
//! 79a5 acme-logs [06/Feb/2019:00:00:38 +0000] 192.0.2.3 79a5 3E57 REST.PUT.OBJECT photos/a.jpg "PUT /acme-logs/photos/a.jpg HTTP/1.1" 200 - 1024 1024 70 10 "-" "aws-cli/2.0" -
//! ```
//!
//! 파일의 처음 [`HEADER_LINES`]줄은 헤더로 간주하여 건너뜁니다.
//! 문법에 맞지 않는 줄은 경고 로그를 남기고 건너뛰며, 파일 전체를 중단하지 않습니다.
//! 숫자 필드 변환에 실패하면 (`-` 등) 0으로 처리합니다.

use std::fmt;
use std::path::Path;

use metrics::counter;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use eventbridge_core::metrics as m;

use crate::error::IngestError;

/// 파일 앞부분에서 무조건 건너뛰는 헤더 줄 수
pub const HEADER_LINES: usize = 2;

/// 한 줄 전체를 매칭하는 정규식
///
/// 캡처 그룹 순서는 [`S3LogLine`] 필드 순서와 같습니다.
const S3_LINE_PATTERN: &str = concat!(
    r"^(\S*)\s",          // bucket owner
    r"(\S*)\s",           // bucket
    r"(\[[^\]]*\])\s",    // time
    r"(\S*)\s",           // remote ip
    r"(\S*)\s",           // requester
    r"(\S*)\s",           // request id
    r"(\S*)\s",           // operation
    r"(\S*)\s",           // key
    r#""(.*?)"\s"#,       // request uri
    r"(\S*)\s",           // http status
    r"(\S*)\s",           // error code
    r"(\S*)\s",           // bytes sent
    r"(\S*)\s",           // object size
    r"(\S*)\s",           // total time
    r"(\S*)\s",           // turn-around time
    r#""(.*?)"\s"#,       // referrer
    r#""(.*?)"\s"#,       // user agent
    r"(.*)$",             // version id
);

/// 디코딩된 접근 로그 레코드
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3LogLine {
    #[serde(rename = "bucketOwner")]
    pub bucket_owner: String,
    pub bucket: String,
    /// 대괄호를 포함한 원문 타임스탬프
    pub time: String,
    #[serde(rename = "remoteIP")]
    pub remote_ip: String,
    pub requester: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    /// `API.HTTPMethod.ResourceType` 형식의 복합 필드
    pub operation: String,
    pub key: String,
    #[serde(rename = "requestURI")]
    pub request_uri: String,
    #[serde(rename = "httpStatusCode")]
    pub http_status_code: i64,
    #[serde(rename = "errorCode")]
    pub error_code: String,
    #[serde(rename = "bytesSent")]
    pub bytes_sent: i64,
    #[serde(rename = "objectSize")]
    pub object_size: i64,
    #[serde(rename = "totalTime")]
    pub total_time: i64,
    #[serde(rename = "turnAroundTime")]
    pub turn_around_time: i64,
    pub referrer: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
    #[serde(rename = "versionId")]
    pub version_id: String,
}

impl S3LogLine {
    /// operation 필드를 API / HTTP 메서드 / 리소스 타입으로 분해합니다.
    pub fn operation(&self) -> S3Operation {
        S3Operation::parse(&self.operation)
    }
}

impl fmt::Display for S3LogLine {
    /// 접근 로그 문법으로 다시 인코딩합니다.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {} \"{}\" {} {} {} {} {} {} \"{}\" \"{}\" {}",
            self.bucket_owner,
            self.bucket,
            self.time,
            self.remote_ip,
            self.requester,
            self.request_id,
            self.operation,
            self.key,
            self.request_uri,
            self.http_status_code,
            self.error_code,
            self.bytes_sent,
            self.object_size,
            self.total_time,
            self.turn_around_time,
            self.referrer,
            self.user_agent,
            self.version_id,
        )
    }
}

/// 분해된 operation 필드 (예: `REST.PUT.OBJECT`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Operation {
    pub api: String,
    #[serde(rename = "httpMethod")]
    pub http_method: String,
    #[serde(rename = "resourceType")]
    pub resource_type: String,
}

impl S3Operation {
    /// 정확히 세 부분으로 나뉘는 경우에만 분해하고, 그 외에는 빈 값을 반환합니다.
    pub fn parse(operation: &str) -> Self {
        let parts: Vec<&str> = operation.split('.').collect();
        match parts.as_slice() {
            [api, method, resource] => Self {
                api: (*api).to_owned(),
                http_method: (*method).to_owned(),
                resource_type: (*resource).to_owned(),
            },
            _ => Self::default(),
        }
    }
}

/// S3 접근 로그 파서
///
/// 정규식은 생성 시 한 번만 컴파일됩니다.
pub struct S3LogParser {
    line: Regex,
}

impl S3LogParser {
    /// 새 파서를 생성합니다.
    pub fn new() -> Result<Self, IngestError> {
        Ok(Self {
            line: Regex::new(S3_LINE_PATTERN)?,
        })
    }

    /// 한 줄을 디코딩합니다. 문법에 맞지 않으면 `None`을 반환합니다.
    pub fn parse_line(&self, line: &str) -> Option<S3LogLine> {
        let caps = self.line.captures(line)?;
        let text = |i: usize| caps.get(i).map_or("", |m| m.as_str()).to_owned();
        let number = |i: usize| {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<i64>().ok())
                .unwrap_or(0)
        };

        Some(S3LogLine {
            bucket_owner: text(1),
            bucket: text(2),
            time: text(3),
            remote_ip: text(4),
            requester: text(5),
            request_id: text(6),
            operation: text(7),
            key: text(8),
            request_uri: text(9),
            http_status_code: number(10),
            error_code: text(11),
            bytes_sent: number(12),
            object_size: number(13),
            total_time: number(14),
            turn_around_time: number(15),
            referrer: text(16),
            user_agent: text(17),
            version_id: text(18),
        })
    }

    /// 로그 파일 내용 전체를 디코딩합니다.
    ///
    /// 처음 [`HEADER_LINES`]줄은 건너뛰고, 문법에 맞지 않는 줄은 경고 후 건너뜁니다.
    pub fn parse_content(&self, content: &str) -> Vec<S3LogLine> {
        let mut records = Vec::new();

        for (index, line) in content.lines().enumerate().skip(HEADER_LINES) {
            match self.parse_line(line) {
                Some(record) => records.push(record),
                None => {
                    counter!(m::PARSER_LINES_SKIPPED_TOTAL).increment(1);
                    warn!(
                        line_number = index + 1,
                        line,
                        pattern = S3_LINE_PATTERN,
                        "access log line does not match grammar, skipping"
                    );
                }
            }
        }

        counter!(m::PARSER_RECORDS_PARSED_TOTAL).increment(records.len() as u64);
        records
    }

    /// 로그 파일을 읽어 디코딩합니다.
    ///
    /// 같은 파일에 대해 여러 번 호출해도 같은 결과를 반환합니다.
    pub async fn parse_file(&self, path: impl AsRef<Path>) -> Result<Vec<S3LogLine>, IngestError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| IngestError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let content = String::from_utf8_lossy(&bytes);
        let records = self.parse_content(&content);
        debug!(path = %path.display(), records = records.len(), "parsed access log");
        Ok(records)
    }
}
