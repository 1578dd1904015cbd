mod memory_gate;
mod pool;
mod report;
mod resequencer;
mod stats;
mod ui;
mod verify;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};

use crate::backend::KdfBackend;
use crate::config::{human_bytes, Config, MemoryCeiling};
use crate::hash_spec::{decode, HashSpec, RejectReason};
use crate::source::LineSource;

use memory_gate::MemoryGate;
use pool::{Sequenced, Task};
use resequencer::Resequencer;
use stats::{maybe_print_stats, Stats, StatsSnapshot};

pub use report::{ConsoleSink, Match, ReportSink};
use verify::{verify, Attempt, Verdict};

const OUTCOME_POLL_INTERVAL: Duration = Duration::from_millis(200);
const TASKS_QUEUED_PER_WORKER: usize = 2;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub threads: usize,
    pub memory_ceiling_kib: Option<u64>,
    pub ordered: bool,
    pub stats_interval: Option<Duration>,
}

impl RunOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            threads: cfg.threads,
            memory_ceiling_kib: cfg.memory_ceiling.kib(),
            ordered: cfg.ordered,
            stats_interval: cfg.stats_interval,
        }
    }
}

/// Final counters of a run. Carries no candidate text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub specs: u64,
    pub rejected: u64,
    pub attempts: u64,
    pub matches: u64,
    pub failures: u64,
    pub cancelled: u64,
    pub elapsed_secs: f64,
    pub attempts_per_sec: f64,
    pub interrupted: bool,
}

impl RunSummary {
    fn from_snapshot(snap: StatsSnapshot, interrupted: bool) -> Self {
        Self {
            specs: snap.specs,
            rejected: snap.rejected,
            attempts: snap.attempts,
            matches: snap.matches,
            failures: snap.failures,
            cancelled: snap.cancelled,
            elapsed_secs: snap.elapsed.as_secs_f64(),
            attempts_per_sec: snap.attempts_per_sec(),
            interrupted,
        }
    }
}

/// Something the sink has to hear about.
enum Event {
    Rejected {
        line: String,
        reason: RejectReason,
    },
    Attempt {
        spec: Arc<HashSpec>,
        verdict: Verdict,
    },
}

struct Reporter<'a> {
    stats: &'a Stats,
    sink: &'a mut dyn ReportSink,
}

impl Reporter<'_> {
    fn deliver(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Rejected { line, reason } => {
                self.stats.bump_rejected();
                self.sink.on_rejected_line(&line, reason)
            }
            Event::Attempt { spec, verdict } => match verdict.attempt {
                Attempt::Matched => {
                    self.stats.bump_attempts();
                    self.stats.bump_matches();
                    self.sink.on_match(&Match {
                        spec: &spec,
                        password: &verdict.candidate,
                    })
                }
                Attempt::Missed => {
                    self.stats.bump_attempts();
                    Ok(())
                }
                Attempt::Failed(err) => {
                    self.stats.bump_attempts();
                    self.stats.bump_failures();
                    self.sink
                        .on_attempt_failure(&spec, &verdict.candidate, &err)
                }
                Attempt::Cancelled => {
                    self.stats.bump_cancelled();
                    Ok(())
                }
            },
        }
    }
}

/// Verifies every candidate of `wordlist` against every spec read from
/// `hashes`, reporting each event to `sink`.
///
/// Matches do not end a scan. `on_complete` is called once the sources are
/// exhausted or a shutdown was requested; a read error or sink error ends the
/// run with `Err` and skips it.
pub fn run<K>(
    options: &RunOptions,
    hashes: &dyn LineSource,
    wordlist: &dyn LineSource,
    kdf: &K,
    sink: &mut dyn ReportSink,
    shutdown: &AtomicBool,
) -> Result<RunSummary>
where
    K: KdfBackend + ?Sized,
{
    let stats = Stats::new();
    {
        let mut reporter = Reporter {
            stats: &stats,
            sink: &mut *sink,
        };
        if options.threads <= 1 {
            run_sequential(options, hashes, wordlist, kdf, &mut reporter, shutdown)?;
        } else {
            run_pooled(options, hashes, wordlist, kdf, &mut reporter, shutdown)?;
        }
    }

    if options.stats_interval.is_some() {
        stats.print();
    }
    let summary = RunSummary::from_snapshot(stats.snapshot(), shutdown.load(Ordering::Relaxed));
    sink.on_complete(&summary)?;
    Ok(summary)
}

fn run_sequential<K>(
    options: &RunOptions,
    hashes: &dyn LineSource,
    wordlist: &dyn LineSource,
    kdf: &K,
    reporter: &mut Reporter<'_>,
    shutdown: &AtomicBool,
) -> Result<()>
where
    K: KdfBackend + ?Sized,
{
    let mut last_stats_print = Instant::now();

    for line in hashes.open()? {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let line = line?;

        let spec = match admit_spec(&line, reporter.stats, None) {
            Ok(spec) => spec,
            Err(reason) => {
                reporter.deliver(Event::Rejected { line, reason })?;
                continue;
            }
        };

        for verdict in verify(kdf, &spec, wordlist.open()?) {
            reporter.deliver(Event::Attempt {
                spec: Arc::clone(&spec),
                verdict: verdict?,
            })?;
            maybe_print_stats(reporter.stats, &mut last_stats_print, options.stats_interval);
            if shutdown.load(Ordering::Relaxed) {
                return Ok(());
            }
        }
    }

    Ok(())
}

fn run_pooled<K>(
    options: &RunOptions,
    hashes: &dyn LineSource,
    wordlist: &dyn LineSource,
    kdf: &K,
    reporter: &mut Reporter<'_>,
    shutdown: &AtomicBool,
) -> Result<()>
where
    K: KdfBackend + ?Sized,
{
    let threads = options.threads.max(1);
    let gate = MemoryGate::new(options.memory_ceiling_kib);
    let stats = reporter.stats;

    thread::scope(|scope| {
        // Channels live inside the scope so an early return hangs up on the
        // workers before the scope joins them.
        let (task_tx, task_rx) = bounded::<Task>(threads.saturating_mul(TASKS_QUEUED_PER_WORKER));
        let (outcome_tx, outcome_rx) = unbounded::<Sequenced>();

        for worker_idx in 0..threads {
            let task_rx = task_rx.clone();
            let outcome_tx = outcome_tx.clone();
            let gate = &gate;
            thread::Builder::new()
                .name(format!("sieve-worker-{worker_idx}"))
                .spawn_scoped(scope, move || {
                    pool::worker_loop(worker_idx, kdf, gate, shutdown, task_rx, outcome_tx)
                })
                .context("failed to spawn worker thread")?;
        }
        drop(task_rx);

        let producer = {
            let gate = &gate;
            thread::Builder::new()
                .name("sieve-producer".to_string())
                .spawn_scoped(scope, move || {
                    pool::produce(hashes, wordlist, stats, gate, shutdown, task_tx, outcome_tx)
                })
                .context("failed to spawn producer thread")?
        };

        let consumed = consume_outcomes(&outcome_rx, options, reporter);
        drop(outcome_rx);

        let produced = producer
            .join()
            .map_err(|_| anyhow!("producer thread panicked"))?;
        consumed.and(produced)
    })
}

/// Feeds outcomes to the sink until every sender has hung up.
fn consume_outcomes(
    outcome_rx: &Receiver<Sequenced>,
    options: &RunOptions,
    reporter: &mut Reporter<'_>,
) -> Result<()> {
    let mut resequencer = Resequencer::new();
    let mut last_stats_print = Instant::now();

    loop {
        match outcome_rx.recv_timeout(OUTCOME_POLL_INTERVAL) {
            Ok(Sequenced { seq, event }) => {
                if options.ordered {
                    resequencer.push(seq, event);
                    while let Some(event) = resequencer.pop_ready() {
                        reporter.deliver(event)?;
                    }
                } else {
                    reporter.deliver(event)?;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        maybe_print_stats(reporter.stats, &mut last_stats_print, options.stats_interval);
    }

    // Whatever is still parked behind a sequence number that never arrived.
    for event in resequencer.drain_all() {
        reporter.deliver(event)?;
    }
    Ok(())
}

/// Decodes one hash line and counts it. With a gate, warns when the spec
/// alone needs more memory than the ceiling allows.
fn admit_spec(
    line: &str,
    stats: &Stats,
    gate: Option<&MemoryGate>,
) -> Result<Arc<HashSpec>, RejectReason> {
    let spec = decode(line)?;
    stats.bump_specs();

    if let Some(gate) = gate {
        let kib = spec.params().admission_kib();
        if let Some(ceiling) = gate.ceiling_kib().filter(|_| gate.exceeds_ceiling(kib)) {
            ui::warn(
                "MEMORY",
                format!(
                    "digest={} | needs {} per attempt, ceiling is {} | attempts will run one at a time",
                    spec.short_digest(),
                    human_bytes(kib.saturating_mul(1024)),
                    human_bytes(ceiling.saturating_mul(1024)),
                ),
            );
        }
    }

    Ok(Arc::new(spec))
}

pub fn print_startup(cfg: &Config, hashes: &dyn LineSource, wordlist: &dyn LineSource, kdf_name: &str) {
    let mode = if cfg.threads <= 1 {
        "sequential".to_string()
    } else if cfg.ordered {
        format!("{} workers, ordered", cfg.threads)
    } else {
        format!("{} workers, unordered", cfg.threads)
    };
    let stats = cfg
        .stats_interval
        .map(|interval| format!("every {}s", interval.as_secs()))
        .unwrap_or_else(|| "off".to_string());

    ui::startup_banner(&[
        ("Version", crate::version::display_version()),
        ("Hashes", hashes.describe()),
        ("Wordlist", wordlist.describe()),
        ("KDF", kdf_name.to_string()),
        ("Mode", mode),
        ("Memory Cap", cfg.memory_ceiling.describe()),
        ("Stats", stats),
    ]);

    if cfg.threads > 1 && cfg.memory_ceiling == MemoryCeiling::Unlimited {
        ui::warn(
            "MEMORY",
            "could not detect available memory | pool runs without a ceiling, pass --memory-limit-mib to set one",
        );
    }
}

pub fn announce_shutdown() {
    ui::warn(
        "SHUTDOWN",
        "interrupt received | finishing in-flight attempts, press Ctrl-C again to abort",
    );
}
