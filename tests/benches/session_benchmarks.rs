//! # Contest Session Benchmarks
//!
//! | Target | Budget |
//! |--------|--------|
//! | Bracket check, 10k-line source | < 5ms (runs before every run/submit) |
//! | Phase transition | < 100ns |

use contest_session::{check_brackets, PhaseTrigger, SessionPhase};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn sample_source(lines: usize) -> String {
    let mut src = String::with_capacity(lines * 48);
    for i in 0..lines {
        src.push_str(&format!(
            "    xs[{i}] = f({{'k': [{i}, \"(\"]}}, (1 + 2))  # don't\n"
        ));
    }
    src
}

fn bench_bracket_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("bracket-check");

    for lines in [100usize, 1_000, 10_000] {
        let src = sample_source(lines);
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &src, |b, src| {
            b.iter(|| check_brackets(black_box(src)))
        });
    }

    group.finish();
}

fn bench_phase_transitions(c: &mut Criterion) {
    let script = [
        PhaseTrigger::Loaded { closed: false },
        PhaseTrigger::FullscreenAcquired,
        PhaseTrigger::Violation(1),
        PhaseTrigger::FullscreenRequested,
        PhaseTrigger::FullscreenAcquired,
        PhaseTrigger::FinalizeStarted,
        PhaseTrigger::FinalizeCompleted,
    ];

    c.bench_function("phase-script", |b| {
        b.iter(|| {
            script
                .iter()
                .fold(SessionPhase::Loading, |phase, trigger| phase.next(black_box(*trigger)))
        })
    });
}

criterion_group!(benches, bench_bracket_check, bench_phase_transitions);
criterion_main!(benches);
