//! 이벤트 필터 -- 디코딩된 레코드가 버킷 규칙과 일치하는지 판정
//!
//! 세 허용 목록(API, HTTP 메서드, 리소스 타입)은 서로 독립적으로 검사하며
//! 결과는 AND로 결합합니다. 빈 목록은 제약이 없는 것으로 취급합니다.
//!
//! 목록 항목은 대소문자를 구분하지 않는 부분 문자열로 비교합니다
//! (필드가 항목을 포함하면 일치). 필드가 비어 있으면 비어 있지 않은 목록과
//! 절대 일치하지 않습니다.

use eventbridge_core::types::EventFilter;

use crate::parser::S3LogLine;

/// 레코드가 필터 규칙과 일치하면 `true`
pub fn matches(record: &S3LogLine, filter: &EventFilter) -> bool {
    let op = record.operation();

    let api_ok = list_allows(&filter.matched_api, &op.api);
    let method_ok = list_allows(&filter.matched_http_methods, &op.http_method);
    let resource_ok = list_allows(&filter.matched_resource_types, &op.resource_type);

    api_ok && method_ok && resource_ok
}

fn list_allows(entries: &[String], field: &str) -> bool {
    if entries.is_empty() {
        return true;
    }
    if field.is_empty() {
        return false;
    }

    let field = field.to_lowercase();
    entries
        .iter()
        .any(|entry| field.contains(&entry.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(operation: &str) -> S3LogLine {
        S3LogLine {
            operation: operation.to_owned(),
            ..Default::default()
        }
    }

    fn filter(api: &[&str], methods: &[&str], resources: &[&str]) -> EventFilter {
        let owned = |v: &[&str]| v.iter().map(|s| (*s).to_owned()).collect();
        EventFilter {
            matched_api: owned(api),
            matched_http_methods: owned(methods),
            matched_resource_types: owned(resources),
        }
    }

    #[test]
    fn empty_rule_set_matches_everything() {
        let rule = EventFilter::default();
        assert!(matches(&record("REST.PUT.OBJECT"), &rule));
        assert!(matches(&record("garbage"), &rule));
        assert!(matches(&record(""), &rule));
    }

    #[test]
    fn method_list_selects_put_only() {
        let rule = filter(&[], &["PUT"], &[]);
        assert!(matches(&record("REST.PUT.OBJECT"), &rule));
        assert!(!matches(&record("REST.GET.OBJECT"), &rule));
    }

    #[test]
    fn comparison_is_case_insensitive() {
        let rule = filter(&["rest"], &["put"], &["object"]);
        assert!(matches(&record("REST.PUT.OBJECT"), &rule));
    }

    #[test]
    fn entry_matches_as_substring_of_field() {
        let rule = filter(&[], &[], &["LOCK"]);
        assert!(matches(&record("REST.PUT.OBJECTLOCKING"), &rule));
        assert!(!matches(&record("REST.PUT.OBJECT"), &rule));
    }

    #[test]
    fn malformed_operation_fails_non_empty_lists() {
        let rule = filter(&["REST"], &[], &[]);
        assert!(!matches(&record("REST.PUT"), &rule));
        assert!(!matches(&record(""), &rule));
    }

    #[test]
    fn three_checks_are_independent() {
        // API는 일치하지만 리소스 타입이 불일치하면 거부되어야 합니다
        let rule = filter(&["REST"], &[], &["BUCKET"]);
        assert!(!matches(&record("REST.PUT.OBJECT"), &rule));

        // 리소스 타입은 일치하지만 API가 불일치하면 거부되어야 합니다
        let rule = filter(&["WEBSITE"], &[], &["OBJECT"]);
        assert!(!matches(&record("REST.PUT.OBJECT"), &rule));

        let rule = filter(&["REST"], &["PUT", "DELETE"], &["OBJECT"]);
        assert!(matches(&record("REST.DELETE.OBJECT"), &rule));
        assert!(!matches(&record("REST.GET.OBJECT"), &rule));
    }

    #[test]
    fn any_entry_in_list_is_enough() {
        let rule = filter(&[], &["GET", "HEAD"], &[]);
        assert!(matches(&record("REST.HEAD.OBJECT"), &rule));
    }
}
