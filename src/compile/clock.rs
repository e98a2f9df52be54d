//! Per-stage wall-clock bookkeeping.

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

/// One recorded stage invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub name: String,
    pub duration: Duration,
}

impl StageTiming {
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

/// Append-only record of named stage executions.
#[derive(Debug, Default)]
pub struct StageClock {
    timings: Vec<StageTiming>,
}

/// Records its stage into the clock when dropped, on every exit path.
struct StageTimer<'a> {
    timings: &'a mut Vec<StageTiming>,
    name: Option<String>,
    start: Instant,
}

impl Drop for StageTimer<'_> {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        if let Some(name) = self.name.take() {
            info!(stage = %name, duration_ms = duration.as_millis() as u64, "Stage finished");
            self.timings.push(StageTiming { name, duration });
        }
    }
}

impl StageClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `work` as stage `name`. The elapsed time is recorded whether the
    /// work succeeds, fails or unwinds; the work's result is returned unchanged.
    pub fn execute<T, F>(&mut self, name: impl Into<String>, work: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _timer = StageTimer {
            timings: &mut self.timings,
            name: Some(name.into()),
            start: Instant::now(),
        };
        work()
    }

    pub fn timings(&self) -> &[StageTiming] {
        &self.timings
    }

    pub fn into_timings(self) -> Vec<StageTiming> {
        self.timings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_success_and_failure() {
        let mut clock = StageClock::new();

        let ok: Result<u32, String> = clock.execute("first", || Ok(7));
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> = clock.execute("second", || Err("boom".to_string()));
        assert_eq!(err, Err("boom".to_string()));

        let names: Vec<_> = clock.timings().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_records_on_panic() {
        let mut clock = StageClock::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), ()> = clock.execute("panicky", || panic!("stage blew up"));
        }));

        assert!(outcome.is_err());
        assert_eq!(clock.timings().len(), 1);
        assert_eq!(clock.timings()[0].name, "panicky");
    }

    #[test]
    fn test_duration_covers_work() {
        let mut clock = StageClock::new();
        let _: Result<(), ()> = clock.execute("sleep", || {
            std::thread::sleep(Duration::from_millis(5));
            Ok(())
        });

        assert!(clock.into_timings()[0].duration_ms() >= 5);
    }
}
