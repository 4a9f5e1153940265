//! Render throughput of the binaural voice.
//!
//! Run with: cargo bench --bench render -p entrain-engine

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use entrain_engine::{EngineConfig, ManualClock, OfflineHost, PlaybackController, Stage};
use std::hint::black_box;

fn bench_render_blocks(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    let host = OfflineHost::new(48_000.0);
    let handle = host.handle();
    let mut ctl = PlaybackController::with_clock(host, ManualClock::new(), EngineConfig::default());
    if ctl.play(vec![Stage::new(200.0, 10.0, 3_600.0)]).is_err() {
        return;
    }

    for frames in [128usize, 512, 4_800].iter() {
        group.throughput(Throughput::Elements(*frames as u64));
        group.bench_with_input(BenchmarkId::from_parameter(frames), frames, |b, &frames| {
            b.iter(|| black_box(handle.render(frames)));
        });
    }

    group.finish();
}

fn bench_glide(c: &mut Criterion) {
    let host = OfflineHost::new(48_000.0);
    let handle = host.handle();
    let clock = ManualClock::new();
    let mut ctl = PlaybackController::with_clock(host, clock.clone(), EngineConfig::default());
    let stages = vec![Stage::new(200.0, 10.0, 0.01), Stage::new(150.0, 4.0, 3_600.0)];
    if ctl.play(stages).is_err() {
        return;
    }
    clock.advance_secs(0.02);
    ctl.tick();

    c.bench_function("render/after_stage_change_512", |b| b.iter(|| black_box(handle.render(512))));
}

criterion_group!(benches, bench_render_blocks, bench_glide);
criterion_main!(benches);
