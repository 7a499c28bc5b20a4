use crate::outcome::RetrievalOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Running counts for one retrieval run.
///
/// Outcomes may arrive from any task in any order; each one bumps exactly one
/// counter. Counters only ever go up.
#[derive(Debug)]
pub struct RunTally {
    created: AtomicU64,
    duplicate: AtomicU64,
    failed: AtomicU64,
    started: Instant,
}

impl RunTally {
    pub fn new() -> Self {
        Self {
            created: AtomicU64::new(0),
            duplicate: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record(&self, outcome: &RetrievalOutcome) {
        let counter = match outcome {
            RetrievalOutcome::Created => &self.created,
            RetrievalOutcome::Duplicate => &self.duplicate,
            RetrievalOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of outcomes recorded so far.
    pub fn recorded(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
            + self.duplicate.load(Ordering::Relaxed)
            + self.failed.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Freeze the current counts and elapsed time into a report.
    pub fn finish(&self) -> RunSummary {
        RunSummary {
            created: self.created.load(Ordering::Relaxed),
            duplicate: self.duplicate.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            elapsed_seconds: self.elapsed().as_secs_f64(),
        }
    }
}

impl Default for RunTally {
    fn default() -> Self {
        Self::new()
    }
}

/// Final report of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub created: u64,
    pub duplicate: u64,
    pub failed: u64,
    pub elapsed_seconds: f64,
}

impl RunSummary {
    pub fn total(&self) -> u64 {
        self.created + self.duplicate + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} files created with {} duplicate snapshots and {} failures.",
            self.created, self.duplicate, self.failed
        )?;
        write!(f, "Done in {:.2} seconds.", self.elapsed_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::FailureReason;
    use std::sync::Arc;

    #[test]
    fn test_record_each_kind() {
        let tally = RunTally::new();
        tally.record(&RetrievalOutcome::Created);
        tally.record(&RetrievalOutcome::Created);
        tally.record(&RetrievalOutcome::Duplicate);
        tally.record(&RetrievalOutcome::Failed(FailureReason::TimedOut));

        let summary = tally.finish();
        assert_eq!(summary.created, 2);
        assert_eq!(summary.duplicate, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 4);
        assert_eq!(tally.recorded(), 4);
    }

    #[test]
    fn test_concurrent_recording_loses_nothing() {
        let tally = Arc::new(RunTally::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tally = Arc::clone(&tally);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let outcome = match i % 3 {
                            0 => RetrievalOutcome::Created,
                            1 => RetrievalOutcome::Duplicate,
                            _ => RetrievalOutcome::Failed(FailureReason::Status(500)),
                        };
                        tally.record(&outcome);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let summary = tally.finish();
        assert_eq!(summary.total(), 8000);
        assert_eq!(summary.created, 3000);
        assert_eq!(summary.duplicate, 3000);
        assert_eq!(summary.failed, 2000);
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            created: 3,
            duplicate: 1,
            failed: 0,
            elapsed_seconds: 4.5,
        };
        assert_eq!(
            summary.to_string(),
            "3 files created with 1 duplicate snapshots and 0 failures.\nDone in 4.50 seconds."
        );
    }
}
