use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use perlre::{compile, Options};

// Representative patterns to benchmark the compile pipeline.
const PATTERNS: &[(&str, &str)] = &[
    ("simple_literal", "/Twain/"),
    ("character_class", "/[a-z]shing/"),
    ("alternation", "/Huck[a-zA-Z]+|Saw[a-zA-Z]+/"),
    ("bounded_repeat", "/.{2,4}(Tom|Sawyer|Huckleberry|Finn)/"),
    ("named_groups", "/(?<y>\\d{4})-(?<m>\\d{2})-(?<d>\\d{2})/"),
    ("lookaround", "/(?<=\\()[^)]*(?=\\))/"),
    ("branch_reset", "/(?|(a)|(b)|(c))(\\1)/"),
    ("utf8_ranges", "/[\\xC2-\\xDF][\\x80-\\xBF]|[\\xE1-\\xEC][\\x80-\\xBF]{2}/"),
    (
        "email_pattern",
        "/[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\\.[a-zA-Z]{2,}/",
    ),
];

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for (name, pattern) in PATTERNS {
        group.bench_with_input(BenchmarkId::new("compile", name), pattern, |b, pattern| {
            b.iter(|| compile(pattern, Options::new()).unwrap())
        });
    }
    group.finish();
}

fn bench_parse_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for (name, pattern) in PATTERNS {
        group.bench_with_input(BenchmarkId::new("parse", name), pattern, |b, pattern| {
            b.iter(|| perlre::parse_pattern(pattern, Options::new()).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_parse_only);
criterion_main!(benches);
