use std::io::Write;

use anyhow::{Context, Result};

use crate::hash_spec::{HashSpec, RejectReason};

use super::ui::{cracked, error, success, warn};
use super::RunSummary;

/// A candidate that reproduced a spec's digest.
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub spec: &'a HashSpec,
    pub password: &'a str,
}

impl Match<'_> {
    /// `<normalized hash line>:<password>`
    pub fn record(&self) -> String {
        format!("{}:{}", self.spec.line(), self.password)
    }
}

/// Receives everything a run produces. Calls arrive on one thread, in
/// report order. An error from the sink aborts the run.
pub trait ReportSink {
    fn on_match(&mut self, found: &Match<'_>) -> Result<()>;

    fn on_rejected_line(&mut self, line: &str, reason: RejectReason) -> Result<()>;

    fn on_attempt_failure(
        &mut self,
        spec: &HashSpec,
        candidate: &str,
        err: &anyhow::Error,
    ) -> Result<()>;

    fn on_complete(&mut self, summary: &RunSummary) -> Result<()>;
}

struct FailureRun {
    line: String,
    digest: String,
    repeats: u64,
}

/// Writes match records to `out` and diagnostics to the log.
///
/// A spec with bad parameters fails for every candidate, so only the first
/// failure per spec is logged in full; the rest are counted.
pub struct ConsoleSink<W> {
    out: W,
    failing: Option<FailureRun>,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, failing: None }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn close_failure_run(&mut self) {
        if let Some(run) = self.failing.take() {
            if run.repeats > 0 {
                warn(
                    "KDF",
                    format!(
                        "digest={} | {} further failure(s) not shown",
                        run.digest, run.repeats
                    ),
                );
            }
        }
    }
}

fn failure_message(spec: &HashSpec, err: &anyhow::Error) -> String {
    format!(
        "digest={} tag={} | attempt failed: {err:#}",
        spec.short_digest(),
        spec.algorithm_tag()
    )
}

impl<W: Write> ReportSink for ConsoleSink<W> {
    fn on_match(&mut self, found: &Match<'_>) -> Result<()> {
        writeln!(self.out, "{}", found.record()).context("failed to write match record")?;
        self.out.flush().context("failed to flush match record")?;
        cracked(
            "CRACKED",
            format!("digest={} | password recovered", found.spec.short_digest()),
        );
        Ok(())
    }

    fn on_rejected_line(&mut self, line: &str, reason: RejectReason) -> Result<()> {
        warn("HASH", format!("{reason} | skipping: {line}"));
        Ok(())
    }

    fn on_attempt_failure(
        &mut self,
        spec: &HashSpec,
        _candidate: &str,
        err: &anyhow::Error,
    ) -> Result<()> {
        if let Some(run) = self.failing.as_mut() {
            if run.line == spec.line() {
                run.repeats = run.repeats.saturating_add(1);
                return Ok(());
            }
        }

        self.close_failure_run();
        error("KDF", failure_message(spec, err));
        self.failing = Some(FailureRun {
            line: spec.line().to_string(),
            digest: spec.short_digest(),
            repeats: 0,
        });
        Ok(())
    }

    fn on_complete(&mut self, summary: &RunSummary) -> Result<()> {
        self.close_failure_run();
        let message = format!(
            "specs={} rejected={} attempts={} matches={} failures={} | {:.1}s",
            summary.specs,
            summary.rejected,
            summary.attempts,
            summary.matches,
            summary.failures,
            summary.elapsed_secs,
        );
        if summary.interrupted {
            warn("DONE", format!("interrupted | {message}"));
        } else {
            success("DONE", message);
        }
        writeln!(self.out, "Done").context("failed to write completion line")?;
        self.out.flush().context("failed to flush output")
    }
}
