use chrono::{TimeZone, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tempfile::TempDir;
use whostream::aggregation::{HourlyAggregator, SessionOrder, SessionReconstructor, sort_by_capture};
use whostream::{CategoryId, Observation, UserId};
use whostream_store::ObservationStore;

fn create_observations(streamers: usize, runs: usize) -> Vec<Observation> {
    let base_time = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let mut observations = Vec::with_capacity(streamers * runs);

    for run in 0..runs {
        for i in 0..streamers {
            // Every tenth streamer restarts halfway through
            let restarted = i % 10 == 0 && run >= runs / 2;
            let started_at = if restarted {
                base_time + chrono::Duration::minutes((runs / 2 * 5) as i64)
            } else {
                base_time
            };
            let minutes = (run * 5) as i64 - (started_at - base_time).num_minutes();

            observations.push(Observation::new(
                UserId::new(format!("{i}")),
                format!("streamer-{i}"),
                "en",
                ((i * 37 + run * 11) % 5000) as u64,
                started_at,
                minutes,
                format!("title {}", i % 3),
            ));
        }
    }

    observations
}

fn benchmark_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_reconstruction");

    // One day of five-minute runs over 100 streamers
    group.bench_function("reconstruct_100_streamers_288_runs", |b| {
        let observations = create_observations(100, 288);
        b.iter(|| {
            let mut sessions = SessionReconstructor::reconstruct(black_box(&observations));
            SessionReconstructor::rank(&mut sessions, SessionOrder::Observations);
            sessions
        });
    });

    group.bench_function("sort_by_capture_28800", |b| {
        let mut observations = create_observations(100, 288);
        observations.reverse();
        b.iter(|| {
            let mut shuffled = observations.clone();
            sort_by_capture(&mut shuffled);
            shuffled
        });
    });

    group.finish();
}

fn benchmark_hourly(c: &mut Criterion) {
    let mut group = c.benchmark_group("hourly_aggregation");

    group.bench_function("aggregate_100_streamers_288_runs", |b| {
        let observations = create_observations(100, 288);
        b.iter(|| HourlyAggregator::aggregate(black_box(&observations)));
    });

    group.finish();
}

fn benchmark_window_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_read");
    group.sample_size(10);

    // Pre-write a day of snapshots outside the benchmark
    let dir = TempDir::new().unwrap();
    let store = ObservationStore::new(dir.path());
    let category = CategoryId::new("509658");
    let base_time = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let observations = create_observations(100, 288);
    for (run, chunk) in observations.chunks(100).enumerate() {
        let run_at = base_time + chrono::Duration::minutes(run as i64 * 5);
        store.write(run_at, &category, chunk).unwrap();
    }

    group.bench_function("read_window_one_day", |b| {
        let end = base_time + chrono::Duration::days(1);
        b.iter(|| store.read_window(&category, base_time, end).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_reconstruction,
    benchmark_hourly,
    benchmark_window_read
);
criterion_main!(benches);
