#![no_main]

use eventbridge_ingest::parser::S3LogParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(parser) = S3LogParser::new() else {
        return;
    };
    let content = String::from_utf8_lossy(data);

    // 크래시나 패닉 없이 레코드 목록을 반환해야 한다
    for record in parser.parse_content(&content) {
        let _ = record.operation();
        let _ = parser.parse_line(&record.to_string());
    }
});
