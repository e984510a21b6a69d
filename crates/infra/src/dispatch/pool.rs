use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use tracing::{debug, error, info, warn};

use gridwatch_core::ReportId;

use crate::analysis::{JobOutcome, ReportAnalyzer};

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of worker threads (and so the max number of concurrent analyses).
    pub workers: usize,
    /// Jobs that may wait for a free worker before new ones are dropped.
    pub queue_capacity: usize,
    /// Name for logging and thread names.
    pub name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
            name: "analysis".to_string(),
        }
    }
}

impl DispatcherConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

/// What happened to a `schedule` call. Callers may ignore it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Queued,
    /// Queue full or dispatcher shut down; the job will not run.
    Dropped,
}

/// Dispatcher runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DispatcherStats {
    pub queued: u64,
    pub dropped: u64,
    pub running: usize,
    pub applied: u64,
    pub degraded: u64,
    pub skipped: u64,
    pub missing: u64,
    pub failed: u64,
    pub panicked: u64,
}

impl DispatcherStats {
    /// Jobs that reached a terminal state.
    pub fn finished(&self) -> u64 {
        self.applied + self.degraded + self.skipped + self.missing + self.failed + self.panicked
    }

    fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Applied(_) => self.applied += 1,
            JobOutcome::Degraded { .. } => self.degraded += 1,
            JobOutcome::SkippedNoImage => self.skipped += 1,
            JobOutcome::ReportMissing => self.missing += 1,
            JobOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Background analysis dispatcher.
///
/// Owns a fixed set of worker threads fed by a bounded channel of report ids.
pub struct AnalysisDispatcher {
    name: String,
    sender: Mutex<Option<SyncSender<ReportId>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    stats: Arc<Mutex<DispatcherStats>>,
}

impl AnalysisDispatcher {
    /// Spawn the worker pool.
    pub fn spawn<A>(analyzer: Arc<A>, config: DispatcherConfig) -> std::io::Result<Self>
    where
        A: ReportAnalyzer,
    {
        let workers = config.workers.max(1);
        let (tx, rx) = mpsc::sync_channel::<ReportId>(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(Mutex::new(DispatcherStats::default()));

        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let worker = format!("{}-{i}", config.name);
            let analyzer = analyzer.clone();
            let rx = rx.clone();
            let stats = stats.clone();
            let handle = thread::Builder::new()
                .name(worker.clone())
                .spawn(move || worker_loop(&worker, analyzer.as_ref(), &rx, &stats))?;
            handles.push(handle);
        }

        info!(dispatcher = %config.name, workers, queue_capacity = config.queue_capacity, "analysis dispatcher started");

        Ok(Self {
            name: config.name,
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
            stats,
        })
    }

    /// Queue analysis for a report and return immediately.
    pub fn schedule(&self, report_id: ReportId) -> DispatchOutcome {
        let sent = match lock(&self.sender).as_ref() {
            Some(tx) => tx.try_send(report_id),
            None => Err(TrySendError::Disconnected(report_id)),
        };

        let outcome = match sent {
            Ok(()) => {
                debug!(dispatcher = %self.name, report_id = %report_id, "analysis queued");
                DispatchOutcome::Queued
            }
            Err(TrySendError::Full(_)) => {
                warn!(dispatcher = %self.name, report_id = %report_id, "analysis queue full; dropping job");
                DispatchOutcome::Dropped
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!(dispatcher = %self.name, report_id = %report_id, "dispatcher stopped; dropping job");
                DispatchOutcome::Dropped
            }
        };

        let mut s = lock(&self.stats);
        match outcome {
            DispatchOutcome::Queued => s.queued += 1,
            DispatchOutcome::Dropped => s.dropped += 1,
        }
        outcome
    }

    /// Get current dispatcher statistics.
    pub fn stats(&self) -> DispatcherStats {
        lock(&self.stats).clone()
    }

    /// Stop accepting jobs, let workers drain the queue, and wait for them.
    pub fn shutdown(&self) {
        drop(lock(&self.sender).take());
        let handles: Vec<_> = lock(&self.workers).drain(..).collect();
        for h in handles {
            if h.join().is_err() {
                error!(dispatcher = %self.name, "analysis worker exited abnormally");
            }
        }
        info!(dispatcher = %self.name, stats = ?self.stats(), "analysis dispatcher stopped");
    }
}

impl Drop for AnalysisDispatcher {
    fn drop(&mut self) {
        // Closing the channel lets detached workers finish the backlog and exit.
        drop(lock(&self.sender).take());
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poison| poison.into_inner())
}

fn worker_loop<A: ReportAnalyzer + ?Sized>(
    worker: &str,
    analyzer: &A,
    rx: &Mutex<Receiver<ReportId>>,
    stats: &Mutex<DispatcherStats>,
) {
    debug!(worker, "analysis worker started");

    loop {
        // Hold the receiver lock only while waiting for the next id.
        let next = lock(rx).recv();
        let Ok(report_id) = next else {
            break;
        };

        lock(stats).running += 1;
        let result = panic::catch_unwind(AssertUnwindSafe(|| analyzer.run(report_id)));

        let mut s = lock(stats);
        s.running = s.running.saturating_sub(1);
        match result {
            Ok(outcome) => {
                debug!(worker, report_id = %report_id, outcome = ?outcome, "analysis job finished");
                s.record(&outcome);
            }
            Err(_) => {
                error!(worker, report_id = %report_id, "analysis job panicked; contained at job boundary");
                s.panicked += 1;
            }
        }
    }

    debug!(worker, "analysis worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Receiver as StdReceiver;
    use std::time::{Duration, Instant};

    struct Recording {
        seen: Mutex<Vec<ReportId>>,
    }

    impl ReportAnalyzer for Recording {
        fn run(&self, report_id: ReportId) -> JobOutcome {
            lock(&self.seen).push(report_id);
            JobOutcome::ReportMissing
        }
    }

    struct Panicking;

    impl ReportAnalyzer for Panicking {
        fn run(&self, _report_id: ReportId) -> JobOutcome {
            panic!("model exploded");
        }
    }

    /// Blocks every job until the test releases it.
    struct Gate {
        release: Mutex<StdReceiver<()>>,
    }

    impl ReportAnalyzer for Gate {
        fn run(&self, _report_id: ReportId) -> JobOutcome {
            let _ = lock(&self.release).recv_timeout(Duration::from_secs(5));
            JobOutcome::SkippedNoImage
        }
    }

    #[test]
    fn schedule_runs_every_job_once() {
        let analyzer = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let dispatcher =
            AnalysisDispatcher::spawn(analyzer.clone(), DispatcherConfig::default().with_workers(3))
                .unwrap();

        let ids: Vec<_> = (0..10).map(|_| ReportId::new()).collect();
        for id in &ids {
            assert_eq!(dispatcher.schedule(*id), DispatchOutcome::Queued);
        }
        dispatcher.shutdown();

        let mut seen = lock(&analyzer.seen).clone();
        let mut expected = ids.clone();
        seen.sort();
        expected.sort();
        assert_eq!(seen, expected);

        let stats = dispatcher.stats();
        assert_eq!(stats.queued, 10);
        assert_eq!(stats.missing, 10);
        assert_eq!(stats.running, 0);
    }

    #[test]
    fn panics_are_contained_and_workers_survive() {
        let dispatcher =
            AnalysisDispatcher::spawn(Arc::new(Panicking), DispatcherConfig::default().with_workers(1))
                .unwrap();

        for _ in 0..3 {
            dispatcher.schedule(ReportId::new());
        }
        dispatcher.shutdown();

        assert_eq!(dispatcher.stats().panicked, 3);
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let (release_tx, release_rx) = mpsc::channel();
        let dispatcher = AnalysisDispatcher::spawn(
            Arc::new(Gate {
                release: Mutex::new(release_rx),
            }),
            DispatcherConfig::default()
                .with_workers(1)
                .with_queue_capacity(1),
        )
        .unwrap();

        // One job occupies the worker, one fills the queue; wait until the worker took the first.
        dispatcher.schedule(ReportId::new());
        let deadline = Instant::now() + Duration::from_secs(5);
        while dispatcher.stats().running == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(dispatcher.schedule(ReportId::new()), DispatchOutcome::Queued);

        let started = Instant::now();
        assert_eq!(dispatcher.schedule(ReportId::new()), DispatchOutcome::Dropped);
        assert!(started.elapsed() < Duration::from_secs(1));

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        dispatcher.shutdown();

        let stats = dispatcher.stats();
        assert_eq!(stats.queued, 2);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.skipped, 2);
    }

    #[test]
    fn schedule_after_shutdown_is_dropped() {
        let dispatcher = AnalysisDispatcher::spawn(
            Arc::new(Recording {
                seen: Mutex::new(Vec::new()),
            }),
            DispatcherConfig::default(),
        )
        .unwrap();
        dispatcher.shutdown();

        assert_eq!(dispatcher.schedule(ReportId::new()), DispatchOutcome::Dropped);
    }
}
