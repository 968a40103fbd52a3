use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use pacekeeper::{Pacer, PacerConfig, session_code};
use std::hint::black_box;
use std::time::{Duration, SystemTime};

fn benchmark_pacer(c: &mut Criterion) {
    let mut group = c.benchmark_group("pacer");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("consuming_admit", |b| {
        let mut pacer = Pacer::new(PacerConfig::default(), SystemTime::now()).unwrap();

        b.iter(|| {
            let admission = pacer
                .admit(black_box(true), black_box(SystemTime::now()))
                .unwrap();
            black_box(admission.wait)
        });
    });

    group.bench_function("peek_admit", |b| {
        let mut pacer = Pacer::new(PacerConfig::default(), SystemTime::now()).unwrap();

        b.iter(|| {
            let admission = pacer
                .admit(black_box(false), black_box(SystemTime::now()))
                .unwrap();
            black_box(admission.wait)
        });
    });

    group.finish();
}

fn benchmark_session_code(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_code");
    group.throughput(Throughput::Elements(1));

    group.bench_function("derive", |b| {
        b.iter(|| black_box(session_code(black_box(SystemTime::now())).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, benchmark_pacer, benchmark_session_code);
criterion_main!(benches);
