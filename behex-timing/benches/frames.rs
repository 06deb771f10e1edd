use behex_timing::{TimeSpec, TimeTable, seconds_to_frames};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn harness() -> TimeTable {
    let mut times = TimeTable::new();
    times.insert("fixation", TimeSpec::Range(0.5, 1.5));
    times.insert("cue", TimeSpec::Fixed(0.2));
    times.insert("stim", TimeSpec::Fixed(0.1));
    times.insert("mask", TimeSpec::Fixed(0.05));
    times.insert("delay", TimeSpec::Range(1.0, 2.0));
    times.insert("probe", TimeSpec::Infinite);
    times.insert("feedback", TimeSpec::Fixed(0.7));
    times.insert("after_response", TimeSpec::Range(0.3, 0.6));
    times
}

pub fn bench_seconds_to_frames(c: &mut Criterion) {
    let times = harness();
    let mut g = c.benchmark_group("frames");
    g.bench_function("seconds_to_frames", |b| {
        b.iter(|| seconds_to_frames(black_box(&times), black_box(1.0 / 60.0)))
    });
    g.finish();
}

criterion_group!(benches, bench_seconds_to_frames);
criterion_main!(benches);
