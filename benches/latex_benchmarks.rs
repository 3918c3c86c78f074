use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mathjson_latex::lexer::Lexer;
use mathjson_latex::number::{format_number, NumberFormat};
use mathjson_latex::{Decimal, LatexSyntax, Number};

// ============================================================================
// Test Data: Varying Complexity and Size
// ============================================================================

const TINY: &str = "x+1";

const SMALL: &str = "\\frac{-b+\\sqrt{b^{2}-4ac}}{2a}";

const MEDIUM: &str = "\\sin(x)^{2}+\\cos(x)^{2}=1\\land |x-\\pi|\\le\\frac{1}{2}\\sqrt[3]{y_{1}}";

const NUMBERS: &str = "-1\\,234\\,567.89+1,234,567-0.1\\overline{6}+1.2\\times10^{-5}";

fn large_input() -> String {
    (0..200)
        .map(|i| format!("a_{{{i}}}x^{{{i}}}"))
        .collect::<Vec<_>>()
        .join("+")
}

fn nested_input(depth: usize) -> String {
    format!("{}x{}", "(".repeat(depth), ")".repeat(depth))
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");
    let large = large_input();
    for (name, source) in [("tiny", TINY), ("small", SMALL), ("medium", MEDIUM), ("large", large.as_str())] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, source| {
            b.iter(|| Lexer::new(black_box(source)).lex())
        });
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let syntax = LatexSyntax::new();
    let mut group = c.benchmark_group("parse");
    let large = large_input();
    for (name, source) in [
        ("tiny", TINY),
        ("small", SMALL),
        ("medium", MEDIUM),
        ("numbers", NUMBERS),
        ("large", large.as_str()),
    ] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, source| {
            b.iter(|| syntax.parse(black_box(source)))
        });
    }
    group.finish();
}

fn bench_nesting(c: &mut Criterion) {
    let syntax = LatexSyntax::new();
    let mut group = c.benchmark_group("nesting");
    for depth in [10, 30, 60] {
        let source = nested_input(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &source, |b, source| {
            b.iter(|| syntax.parse(black_box(source)))
        });
    }
    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let syntax = LatexSyntax::new();
    let mut group = c.benchmark_group("serialize");
    let large = large_input();
    for (name, source) in [("small", SMALL), ("medium", MEDIUM), ("large", large.as_str())] {
        let expr = match syntax.parse(source) {
            Ok(parsed) => parsed.expression,
            Err(_) => continue,
        };
        group.bench_with_input(BenchmarkId::from_parameter(name), &expr, |b, expr| {
            b.iter(|| syntax.serialize(black_box(expr)))
        });
    }
    group.finish();
}

fn bench_number_format(c: &mut Criterion) {
    let format = NumberFormat::default();
    let repeating = Decimal::parse("3.123456785678567856785678567856785678")
        .map(Number::Decimal)
        .unwrap_or(Number::Machine(0.0));
    let mut group = c.benchmark_group("number_format");
    group.bench_function("machine", |b| {
        b.iter(|| format_number(black_box(&Number::Machine(-1234567.89)), &format))
    });
    group.bench_function("scientific", |b| {
        b.iter(|| format_number(black_box(&Number::Machine(-1234567.89e-123)), &format))
    });
    group.bench_function("repeating", |b| {
        b.iter(|| format_number(black_box(&repeating), &format))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_lexer,
    bench_parse,
    bench_nesting,
    bench_serialize,
    bench_number_format
);
criterion_main!(benches);
