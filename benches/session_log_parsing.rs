use std::hint::black_box;
use std::io::Write;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use folio_agent::parsers::{PREVIEW_CHARS, parse_history, read_history, read_preview};
use folio_agent::session::compose_prompt;
use serde_json::json;
use tempfile::NamedTempFile;

/// Generate a synthetic session log with N user/assistant pairs plus tool noise
fn generate_session_log(num_pairs: usize) -> String {
    let mut log = String::new();
    for i in 0..num_pairs {
        let user = json!({
            "type": "user",
            "message": { "role": "user", "content": compose_prompt(&format!("Question number {}", i), None) },
            "timestamp": format!("2024-01-{:02}T12:00:00Z", (i % 28) + 1),
        });
        let tool = json!({
            "type": "assistant",
            "message": { "role": "assistant", "content": [{ "type": "tool_use", "name": "Read" }] },
        });
        let assistant = json!({
            "type": "assistant",
            "message": { "role": "assistant", "content": [{ "type": "text", "text": format!("Answer {} ", i).repeat(20) }] },
            "timestamp": format!("2024-01-{:02}T12:00:05Z", (i % 28) + 1),
        });
        log.push_str(&format!("{}\n{}\n{}\n", user, tool, assistant));
    }
    log
}

fn bench_parse_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_history");

    for size in [10, 100, 1_000, 10_000].iter() {
        let log = generate_session_log(*size);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| parse_history(black_box(&log)));
        });
    }

    group.finish();
}

fn bench_read_log_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_session_log");

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(generate_session_log(1_000).as_bytes()).unwrap();
    file.flush().unwrap();

    group.bench_function("history_1000_pairs", |b| {
        b.iter(|| read_history(black_box(file.path())).unwrap());
    });
    group.bench_function("preview_1000_pairs", |b| {
        b.iter(|| read_preview(black_box(file.path()), PREVIEW_CHARS).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_parse_history, bench_read_log_file);
criterion_main!(benches);
