use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::ui::info;

/// Run counters. Bumped from the producer thread and the reporting thread.
pub struct Stats {
    started_at: Instant,
    specs: AtomicU64,
    rejected: AtomicU64,
    attempts: AtomicU64,
    matches: AtomicU64,
    failures: AtomicU64,
    cancelled: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub elapsed: Duration,
    pub specs: u64,
    pub rejected: u64,
    pub attempts: u64,
    pub matches: u64,
    pub failures: u64,
    pub cancelled: u64,
}

impl StatsSnapshot {
    pub fn attempts_per_sec(&self) -> f64 {
        self.attempts as f64 / self.elapsed.as_secs_f64().max(0.001)
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            specs: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            matches: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
        }
    }

    pub fn bump_specs(&self) {
        self.specs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bump_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bump_attempts(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bump_matches(&self) {
        self.matches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bump_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bump_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            elapsed: self.started_at.elapsed(),
            specs: self.specs.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }

    pub fn print(&self) {
        let snap = self.snapshot();
        info(
            "STATS",
            format!(
                "{:.1}s elapsed | specs={} | attempts={} | {} | matches={} failures={} rejected={}",
                snap.elapsed.as_secs_f64(),
                snap.specs,
                snap.attempts,
                format_hashrate(snap.attempts_per_sec()),
                snap.matches,
                snap.failures,
                snap.rejected,
            ),
        );
    }
}

/// Prints stats when `interval` has passed since the last print.
pub(super) fn maybe_print_stats(
    stats: &Stats,
    last_stats_print: &mut Instant,
    interval: Option<Duration>,
) {
    let Some(interval) = interval else {
        return;
    };
    if last_stats_print.elapsed() >= interval {
        stats.print();
        *last_stats_print = Instant::now();
    }
}

pub fn format_hashrate(hps: f64) -> String {
    if hps >= 1_000_000.0 {
        return format!("{:.3} MH/s", hps / 1_000_000.0);
    }
    if hps >= 1_000.0 {
        return format!("{:.3} KH/s", hps / 1_000.0);
    }
    format!("{hps:.3} H/s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn format_hashrate_units() {
        assert_eq!(format_hashrate(5.0), "5.000 H/s");
        assert_eq!(format_hashrate(5_000.0), "5.000 KH/s");
        assert_eq!(format_hashrate(5_000_000.0), "5.000 MH/s");
    }

    #[test]
    fn snapshot_reflects_bumps() {
        let stats = Stats::new();
        stats.bump_specs();
        stats.bump_attempts();
        stats.bump_attempts();
        stats.bump_matches();
        stats.bump_failures();
        stats.bump_rejected();
        stats.bump_cancelled();

        let snap = stats.snapshot();
        assert_eq!(snap.specs, 1);
        assert_eq!(snap.attempts, 2);
        assert_eq!(snap.matches, 1);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.rejected, 1);
        assert_eq!(snap.cancelled, 1);
        assert!(snap.attempts_per_sec() > 0.0);
    }

    #[test]
    fn disabled_interval_never_prints() {
        let stats = Stats::new();
        let before = Instant::now();
        let mut last = before;
        thread::sleep(Duration::from_millis(5));
        maybe_print_stats(&stats, &mut last, None);
        assert_eq!(last, before);
    }
}
