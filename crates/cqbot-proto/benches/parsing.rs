//! Benchmarks for command-line tokenization and scope checks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cqbot_proto::grammar::{parse_arguments, parse_line, OptionDecl, OptionSettings, OptionTable};
use cqbot_proto::{ContextKind, ScopeSet};

/// Plain positional arguments
const SIMPLE_LINE: &str = "foo bar baz";

/// Mixed options, quotes and a rest section
const COMPLEX_LINE: &str = "-a --beta 10 \"quoted text\" -cd=5 “全角 引号” -- trailing rest";

fn table() -> OptionTable {
    let mut table = OptionTable::default();
    for raw in ["-a, --alpha", "-b, --beta <beta>", "-c [gamma]", "-d, --no-delta"] {
        table
            .insert(OptionDecl::parse(raw, "", OptionSettings::default()).unwrap())
            .unwrap();
    }
    table
}

fn benchmark_parse_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("Line Parsing");
    let args = parse_arguments("cmd <foo> [bar] [...rest]");
    let options = table();

    group.bench_function("simple", |b| {
        b.iter(|| black_box(parse_line(black_box(SIMPLE_LINE), &args, &options)))
    });

    group.bench_function("complex", |b| {
        b.iter(|| black_box(parse_line(black_box(COMPLEX_LINE), &args, &options)))
    });

    group.finish();
}

fn benchmark_scope(c: &mut Criterion) {
    let mut group = c.benchmark_group("Scope Algebra");
    let groups = ScopeSet::of(ContextKind::Group, 0..256);
    let others = ScopeSet::all().difference(&ScopeSet::of(ContextKind::Group, 128..512));

    group.bench_function("union", |b| b.iter(|| black_box(groups.union(&others))));
    group.bench_function("contains", |b| b.iter(|| black_box(others.contains(&groups))));
    group.bench_function("matches", |b| {
        b.iter(|| black_box(others.matches(ContextKind::Group, black_box(300))))
    });

    group.finish();
}

criterion_group!(benches, benchmark_parse_line, benchmark_scope);
criterion_main!(benches);
