//! Progress reporting during a run
//!
//! The scheduler only knows about [`ProgressObserver`]; how progress is shown
//! (an in-place console line, nothing at all, a test probe) is up to the
//! implementation.

use std::io::Write;
use std::time::Duration;

use crate::recorder::Counters;
use crate::scheduler::Scenario;

/// Snapshot handed to observers after every recorded sample
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub scenario: Scenario,
    /// Time since run start
    pub elapsed: Duration,
    /// Requested run duration
    pub duration: Duration,
    /// Samples completed so far
    pub completed: u64,
    /// Total planned requests, when the shape has a fixed count
    pub planned: Option<u64>,
    pub counters: Counters,
}

impl ProgressUpdate {
    /// Elapsed share of the requested duration, in percent
    pub fn percent(&self) -> f64 {
        if self.duration.is_zero() {
            return 100.0;
        }
        self.elapsed.as_secs_f64() / self.duration.as_secs_f64() * 100.0
    }
}

pub trait ProgressObserver: Send + Sync {
    fn on_sample(&self, update: &ProgressUpdate);

    /// Called once when the run window closes
    fn on_finish(&self) {}
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn on_sample(&self, _update: &ProgressUpdate) {}
}

/// Console progress: an overwritten single line for paced shapes, a
/// milestone line every `milestone` completions for fixed-count shapes.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleProgress {
    milestone: u64,
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self { milestone: 20 }
    }
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text for one update, or `None` when nothing should be printed
    pub fn line(&self, update: &ProgressUpdate) -> Option<String> {
        let counters = &update.counters;
        match update.planned {
            Some(planned) => {
                if update.completed % self.milestone.max(1) != 0 && update.completed != planned {
                    return None;
                }
                Some(format!(
                    "  Sent: {}/{} | Blocked: {}\n",
                    update.completed, planned, counters.blocked
                ))
            }
            None => {
                let indicator = if update.scenario == Scenario::RateLimit && counters.blocked > 0 {
                    " BLOCKING!"
                } else {
                    ""
                };
                Some(format!(
                    "\rProgress: {:.1}% | Requests: {} | Success: {} | Blocked: {}{}",
                    update.percent(),
                    counters.total,
                    counters.success,
                    counters.blocked,
                    indicator
                ))
            }
        }
    }
}

impl ProgressObserver for ConsoleProgress {
    fn on_sample(&self, update: &ProgressUpdate) {
        if let Some(line) = self.line(update) {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(line.as_bytes());
            let _ = stdout.flush();
        }
    }

    fn on_finish(&self) {
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(scenario: Scenario, completed: u64, planned: Option<u64>, blocked: u64) -> ProgressUpdate {
        ProgressUpdate {
            scenario,
            elapsed: Duration::from_secs(30),
            duration: Duration::from_secs(120),
            completed,
            planned,
            counters: Counters {
                total: completed,
                success: completed - blocked,
                blocked,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_fixed_interval_line() {
        let line = ConsoleProgress::new()
            .line(&update(Scenario::Baseline, 10, None, 0))
            .unwrap();
        assert_eq!(line, "\rProgress: 25.0% | Requests: 10 | Success: 10 | Blocked: 0");
    }

    #[test]
    fn test_rate_limit_shows_blocking() {
        let line = ConsoleProgress::new()
            .line(&update(Scenario::RateLimit, 110, None, 5))
            .unwrap();
        assert!(line.ends_with("Blocked: 5 BLOCKING!"));

        // Other paced shapes never show the indicator
        let line = ConsoleProgress::new()
            .line(&update(Scenario::Sustained, 110, None, 5))
            .unwrap();
        assert!(!line.contains("BLOCKING"));
    }

    #[test]
    fn test_burst_prints_milestones_only() {
        let progress = ConsoleProgress::new();
        assert!(progress.line(&update(Scenario::Burst, 7, Some(200), 0)).is_none());
        assert_eq!(
            progress.line(&update(Scenario::Burst, 40, Some(200), 3)).unwrap(),
            "  Sent: 40/200 | Blocked: 3\n"
        );
    }
}
