//! End-to-end dispatch benchmarks: event in, command resolved, reply out.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use cqbot::{App, AppOptions, CommandConfig, LogSender, MemoryStore};
use cqbot_proto::Event;
use serde_json::json;
use std::sync::Arc;

fn app() -> App {
    let options = AppOptions {
        name: Some("Bot".to_string()),
        self_id: 514,
        default_authority: 1,
    };
    let app = App::new(options, Arc::new(MemoryStore::new()), Arc::new(LogSender)).unwrap();
    app.command_with("echo <text...>", CommandConfig::new().check_arg_count(true))
        .unwrap()
        .action(|inv| async move { inv.reply(&inv.arg(0)).await });
    app
}

fn message(kind: &str, text: &str) -> Event {
    Event::from_value(json!({
        "post_type": "message",
        "message_type": kind,
        "sub_type": "normal",
        "group_id": 20000,
        "user_id": 10000,
        "message": text,
        "self_id": 514,
    }))
    .unwrap()
}

fn dispatch_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let app = app();
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    let command = message("private", "echo hello world");
    group.bench_function("private_command", |b| {
        b.to_async(&runtime)
            .iter(|| app.dispatch_event(command.clone()))
    });

    let chatter = message("group", "just chatting");
    group.bench_function("group_chatter", |b| {
        b.to_async(&runtime)
            .iter(|| app.dispatch_event(chatter.clone()))
    });

    let typo = message("private", "ehco hi");
    group.bench_function("suggestion", |b| {
        b.to_async(&runtime).iter(|| app.dispatch_event(typo.clone()))
    });

    group.finish();
}

fn decode_benchmark(c: &mut Criterion) {
    let raw = br#"{"post_type":"message","message_type":"group","sub_type":"normal","group_id":20000,"user_id":10000,"message":".echo hi","self_id":514}"#;
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(raw.len() as u64));
    group.bench_function("group_message", |b| b.iter(|| Event::from_slice(raw).unwrap()));
    group.finish();
}

criterion_group!(benches, dispatch_benchmark, decode_benchmark);
criterion_main!(benches);
