use std::sync::{Arc, PoisonError, RwLock};

use crate::fallback::{FallbackReporter, LoggingFailure};
use crate::record::LogRecord;
use crate::sink::Sink;

type Snapshot = Arc<Vec<Arc<Sink>>>;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Ordered set of sinks attached to one logger.
///
/// The list is copy-on-write: mutations swap in a new vector while
/// `dispatch` keeps iterating the snapshot it started with, so a concurrent
/// `remove` or `clear` never tears a dispatch in half.
#[derive(Debug, Default)]
pub struct SinkManager {
    sinks: RwLock<Snapshot>,
}

impl SinkManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sinks(sinks: Vec<Sink>) -> Self {
        let manager = SinkManager::new();
        manager.replace_all(sinks);
        manager
    }

    /// Consistent view of the current sinks, in insertion order.
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.sinks.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn update(&self, mutate: impl FnOnce(&mut Vec<Arc<Sink>>)) {
        let mut guard = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<Arc<Sink>> = guard.as_ref().clone();
        mutate(&mut next);
        *guard = Arc::new(next);
    }

    /// Append a sink. A sink with the same id is replaced in place.
    pub fn add(&self, sink: Sink) {
        let sink = Arc::new(sink);
        self.update(|sinks| {
            match sinks.iter().position(|s| s.id() == sink.id()) {
                Some(pos) => sinks[pos] = sink,
                None => sinks.push(sink),
            }
        });
    }

    /// Remove the sink with `id`; returns whether one was removed.
    pub fn remove(&self, id: &str) -> bool {
        let mut removed = false;
        self.update(|sinks| {
            let before = sinks.len();
            sinks.retain(|s| s.id() != id);
            removed = sinks.len() != before;
        });
        removed
    }

    pub fn clear(&self) {
        self.update(Vec::clear);
    }

    /// Swap the whole list at once. Later duplicates replace earlier ones.
    pub fn replace_all(&self, sinks: Vec<Sink>) {
        let mut next: Vec<Arc<Sink>> = Vec::with_capacity(sinks.len());
        for sink in sinks {
            match next.iter().position(|s| s.id() == sink.id()) {
                Some(pos) => next[pos] = Arc::new(sink),
                None => next.push(Arc::new(sink)),
            }
        }
        let mut guard = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(next);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<String> {
        self.snapshot().iter().map(|s| s.id().to_string()).collect()
    }

    /// Fan a record out to every sink whose threshold it meets.
    ///
    /// Write failures are reported to `reporter` and never stop the
    /// remaining sinks from receiving the record.
    pub fn dispatch(
        &self,
        logger: &str,
        record: &LogRecord,
        reporter: &dyn FallbackReporter,
    ) -> DispatchReport {
        let sinks = self.snapshot();
        let mut report = DispatchReport::default();

        for sink in sinks.iter() {
            if !sink.accepts(record.level()) {
                report.skipped += 1;
                continue;
            }
            match sink.emit(record) {
                Ok(()) => report.written += 1,
                Err(error) => {
                    report.failed += 1;
                    reporter.report(&LoggingFailure::SinkWrite {
                        logger,
                        sink: sink.id(),
                        error: &error,
                    });
                }
            }
        }

        report
    }

    pub fn flush(&self, logger: &str, reporter: &dyn FallbackReporter) {
        for sink in self.snapshot().iter() {
            if let Err(error) = sink.flush() {
                reporter.report(&LoggingFailure::SinkFlush {
                    logger,
                    sink: sink.id(),
                    error: &error,
                });
            }
        }
    }
}
