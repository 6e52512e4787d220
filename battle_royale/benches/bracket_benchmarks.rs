use battle_royale::bracket::build_bracket;
use battle_royale::identity::Player;
use battle_royale::evaluator::complexity::estimate;
use battle_royale::evaluator::{ComplexityClass, Language};
use battle_royale::matches::resolution::{Attempt, decide_final};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn players(n: usize) -> Vec<Player> {
    (0..n)
        .map(|i| Player::new(format!("user-{i}"), format!("player{i}")))
        .collect()
}

fn benchmark_bracket_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("bracket_build");

    for n in [2usize, 3, 10, 64, 1000] {
        let roster = players(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &roster, |b, roster| {
            b.iter(|| build_bracket(black_box(roster)))
        });
    }

    group.finish();
}

fn benchmark_final_resolution(c: &mut Criterion) {
    let a = Attempt {
        passed: true,
        passed_count: 3,
        elapsed_ms: 42_000,
        complexity: ComplexityClass::Linear,
        sequence: 1,
    };
    let b = Attempt {
        passed: true,
        passed_count: 3,
        elapsed_ms: 42_000,
        complexity: ComplexityClass::Quadratic,
        sequence: 2,
    };

    c.bench_function("decide_final_tie_break", |bench| {
        bench.iter(|| decide_final(black_box(&a), black_box(&b)))
    });
}

fn benchmark_complexity_heuristic(c: &mut Criterion) {
    let code = r#"
def solve(nums):
    total = 0
    for i in range(len(nums)):
        for j in range(i, len(nums)):
            total += nums[j]
    return total
"#;

    c.bench_function("complexity_nested_loops", |b| {
        b.iter(|| estimate(black_box(code), Language::Python))
    });
}

criterion_group!(
    benches,
    benchmark_bracket_build,
    benchmark_final_resolution,
    benchmark_complexity_heuristic
);
criterion_main!(benches);
