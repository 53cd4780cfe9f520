//! 접근 로그 파서 벤치마크
//!
//! 한 줄 디코딩과 파일 단위 디코딩, 필터 판정 처리량을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use eventbridge_core::types::EventFilter;
use eventbridge_ingest::S3LogParser;
use eventbridge_ingest::filter;

/// 짧은 레코드 (referrer 없음)
const LINE_SHORT: &str = r#"79a5 acme-logs [06/Feb/2019:00:00:38 +0000] 192.0.2.3 79a5 3E57427F3EXAMPLE REST.GET.VERSIONING - "GET /acme-logs?versioning HTTP/1.1" 200 - 113 - 7 - "-" "S3Console/0.4" -"#;

/// 긴 레코드 (긴 키, user agent, version id 포함)
const LINE_LONG: &str = r#"79a59df900b949e55d96a1e698fbacedfd6e09d98eacf8f8d5218e7cd47ef2be acme-production-access-logs [06/Feb/2019:00:00:38 +0000] 192.0.2.3 arn:aws:iam::123456789012:user/deploy-bot 891CE47D2EXAMPLE REST.PUT.OBJECT releases/2019/02/06/build-4711/artifacts/server-linux-amd64.tar.gz "PUT /acme-production-access-logs/releases/2019/02/06/build-4711/artifacts/server-linux-amd64.tar.gz?partNumber=3&uploadId=abc HTTP/1.1" 200 - - 52428800 1843 27 "https://console.example.com/s3/buckets/acme" "aws-cli/2.15.0 Python/3.11.6 Linux/6.1.0 exe/x86_64.ubuntu.22 prompt/off command/s3.cp" 3HL4kqtJlcpXroDTDmJ+rmSpXd3dIbrHY+MTRCxf3vjVBH40Nr8X8gdRQBpUMLUo"#;

fn file_content(lines: usize) -> String {
    let mut content = String::from("#Version: 1.0\n#Fields: s3 access log\n");
    for i in 0..lines {
        content.push_str(if i % 2 == 0 { LINE_SHORT } else { LINE_LONG });
        content.push('\n');
    }
    content
}

fn bench_parse_line(c: &mut Criterion) {
    let parser = S3LogParser::new().unwrap();

    let mut group = c.benchmark_group("s3_parse_line");
    group.throughput(Throughput::Elements(1));
    group.bench_function("short", |b| b.iter(|| parser.parse_line(black_box(LINE_SHORT))));
    group.bench_function("long", |b| b.iter(|| parser.parse_line(black_box(LINE_LONG))));
    group.bench_function("malformed", |b| {
        b.iter(|| parser.parse_line(black_box("not an access log line")))
    });
    group.finish();
}

fn bench_parse_content(c: &mut Criterion) {
    let parser = S3LogParser::new().unwrap();

    let mut group = c.benchmark_group("s3_parse_content");
    for size in [100usize, 1_000, 10_000] {
        let content = file_content(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &content, |b, content| {
            b.iter(|| parser.parse_content(black_box(content)))
        });
    }
    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let parser = S3LogParser::new().unwrap();
    let records = parser.parse_content(&file_content(1_000));
    let rules = EventFilter {
        matched_api: vec!["REST".to_owned()],
        matched_http_methods: vec!["PUT".to_owned(), "DELETE".to_owned()],
        matched_resource_types: vec!["OBJECT".to_owned()],
    };

    let mut group = c.benchmark_group("event_filter");
    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("matches_1000", |b| {
        b.iter(|| {
            records
                .iter()
                .filter(|r| filter::matches(black_box(r), &rules))
                .count()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_parse_line, bench_parse_content, bench_filter);
criterion_main!(benches);
