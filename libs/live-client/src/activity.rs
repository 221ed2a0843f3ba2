//! Decides when to send "I'm active" reports.

use std::time::{Duration, Instant};

/// Periodic reports plus interaction-driven ones, with interaction reports
/// debounced.
#[derive(Debug)]
pub struct ActivityReporter {
    interval: Duration,
    debounce: Duration,
    last_report: Option<Instant>,
    next_periodic: Instant,
}

impl ActivityReporter {
    /// The first periodic report is due immediately.
    pub fn new(interval: Duration, debounce: Duration, now: Instant) -> Self {
        Self {
            interval,
            debounce,
            last_report: None,
            next_periodic: now,
        }
    }

    /// The user interacted. Returns `true` if a report should be sent now.
    pub fn on_interaction(&mut self, now: Instant) -> bool {
        let due = self
            .last_report
            .map_or(true, |last| now.saturating_duration_since(last) >= self.debounce);
        if due {
            self.record(now);
        }
        due
    }

    /// Returns `true` if the periodic report is due.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.next_periodic <= now {
            self.record(now);
            return true;
        }
        false
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_periodic
    }

    fn record(&mut self, now: Instant) {
        self.last_report = Some(now);
        self.next_periodic = now + self.interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(240);
    const DEBOUNCE: Duration = Duration::from_secs(30);

    #[test]
    fn periodic_report_every_interval() {
        let t0 = Instant::now();
        let mut reporter = ActivityReporter::new(INTERVAL, DEBOUNCE, t0);

        assert!(reporter.tick(t0));
        assert!(!reporter.tick(t0 + Duration::from_secs(239)));
        assert!(reporter.tick(t0 + INTERVAL));
    }

    #[test]
    fn interaction_burst_reports_once_per_debounce_window() {
        let t0 = Instant::now();
        let mut reporter = ActivityReporter::new(INTERVAL, DEBOUNCE, t0);
        reporter.tick(t0);

        let sent: usize = (0..60)
            .map(|s| reporter.on_interaction(t0 + Duration::from_secs(s)))
            .filter(|sent| *sent)
            .count();
        // At 30s only; the burst starting at 0s is inside the window of the
        // periodic report.
        assert_eq!(sent, 1);
    }

    #[test]
    fn interaction_report_pushes_back_periodic() {
        let t0 = Instant::now();
        let mut reporter = ActivityReporter::new(INTERVAL, DEBOUNCE, t0);
        reporter.tick(t0);

        let t1 = t0 + Duration::from_secs(100);
        assert!(reporter.on_interaction(t1));
        assert_eq!(reporter.next_deadline(), t1 + INTERVAL);
    }
}
