#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use eventbridge_core::types::EventFilter;
use eventbridge_ingest::S3LogLine;
use eventbridge_ingest::filter::matches;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 레코드의 operation 필드 원문
    operation: String,
    matched_api: Vec<String>,
    matched_http_methods: Vec<String>,
    matched_resource_types: Vec<String>,
}

fuzz_target!(|input: FuzzInput| {
    let record = S3LogLine {
        operation: input.operation,
        ..Default::default()
    };
    let filter = EventFilter {
        matched_api: input.matched_api,
        matched_http_methods: input.matched_http_methods,
        matched_resource_types: input.matched_resource_types,
    };

    let matched = matches(&record, &filter);

    // 빈 필터는 모든 레코드를 통과시킨다
    if filter == EventFilter::default() {
        assert!(matched);
    }
});
