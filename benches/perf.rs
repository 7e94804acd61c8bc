use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use vfl_terminal::odds::compute_odds;
use vfl_terminal::projection::project;
use vfl_terminal::result_gen::{MatchSpec, generate_result};

fn bench_spec() -> MatchSpec {
    MatchSpec {
        match_id: "bench".to_string(),
        home_team_id: 10,
        away_team_id: 20,
        home_strength: 75.0,
        away_strength: 75.0,
        round_hash: format!("0x{}", "a".repeat(64)),
        block_hash: format!("0x{}", "b".repeat(64)),
    }
}

fn bench_generate_result(c: &mut Criterion) {
    let spec = bench_spec();
    let seed = format!("0x{}", "c".repeat(64));
    c.bench_function("generate_result_90min", |b| {
        b.iter(|| generate_result(black_box(&spec), black_box(&seed)).unwrap())
    });
}

fn bench_compute_odds(c: &mut Criterion) {
    c.bench_function("compute_odds", |b| {
        b.iter(|| compute_odds(black_box(85.0), black_box(67.0)).unwrap())
    });
}

fn bench_projection(c: &mut Criterion) {
    let spec = bench_spec();
    let seed = format!("0x{}", "c".repeat(64));
    let result = generate_result(&spec, &seed).unwrap();
    c.bench_function("project_snapshot", |b| {
        b.iter(|| project(black_box(&result), black_box(10), black_box(0.63)))
    });
}

criterion_group!(
    benches,
    bench_generate_result,
    bench_compute_odds,
    bench_projection
);
criterion_main!(benches);
