//! 접근 로그 파싱 모듈
//!
//! 오브젝트 스토리지 서버 접근 로그(S3 형식)를 [`S3LogLine`] 레코드로 디코딩합니다.
//!
//! # 사용 예시
//! ```ignore
//! use eventbridge_ingest::parser::S3LogParser;
//!
//! let parser = S3LogParser::new()?;
//! let records = parser.parse_file("/var/lib/eventbridge/logs/acme/2024-06-02-01-28-20").await?;
//! ```

pub mod s3;

pub use s3::{HEADER_LINES, S3LogLine, S3LogParser, S3Operation};
