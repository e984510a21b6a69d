use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::path::Path;
use std::sync::Arc;

use gridwatch_ai::{DetectError, Detection, DetectorAdapter, ObjectDetector};
use gridwatch_core::{ImageRef, Report, ReportId};
use gridwatch_infra::{
    AnalysisDispatcher, AnalysisOrchestrator, DispatcherConfig, InMemoryReportStore, MediaResolver,
    ReportStore,
};

/// Instant detector so the numbers measure store, lock and queue overhead only.
struct Instant;

impl ObjectDetector for Instant {
    fn name(&self) -> &str {
        "instant"
    }

    fn infer(&self, _image: &Path) -> Result<Vec<Detection>, DetectError> {
        Ok(vec![
            Detection::new("Electric Pole", 0.8),
            Detection::new("Vegetation Overgrowth", 0.6),
        ])
    }
}

fn orchestrator(store: Arc<InMemoryReportStore>) -> AnalysisOrchestrator<Arc<InMemoryReportStore>> {
    AnalysisOrchestrator::new(
        store,
        Arc::new(DetectorAdapter::from_detector(Instant)),
        MediaResolver::new("/srv/media"),
    )
}

fn seed(store: &InMemoryReportStore, n: usize) -> Vec<ReportId> {
    (0..n)
        .map(|i| {
            let image = ImageRef::new(format!("reports/{i}/citizen/photo.jpg")).unwrap();
            store.insert(Report::submitted("bench", Some(image))).unwrap()
        })
        .collect()
}

fn bench_single_analysis(c: &mut Criterion) {
    let store = InMemoryReportStore::arc();
    let ids = seed(&store, 1);
    let orchestrator = orchestrator(store);

    c.bench_function("analyze_one_report", |b| {
        b.iter(|| orchestrator.analyze(black_box(ids[0])))
    });
}

fn bench_dispatch_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_throughput");
    group.sample_size(20);

    for workers in [1usize, 2, 4] {
        let jobs = 256;
        group.throughput(Throughput::Elements(jobs as u64));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.iter(|| {
                let store = InMemoryReportStore::arc();
                let ids = seed(&store, jobs);
                let dispatcher = AnalysisDispatcher::spawn(
                    Arc::new(orchestrator(store)),
                    DispatcherConfig::default()
                        .with_workers(workers)
                        .with_queue_capacity(jobs),
                )
                .unwrap();
                for id in ids {
                    dispatcher.schedule(id);
                }
                dispatcher.shutdown();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_single_analysis, bench_dispatch_throughput);
criterion_main!(benches);
