use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, Sender};

use crate::backend::KdfBackend;
use crate::hash_spec::{trim_line, HashSpec};
use crate::source::LineSource;

use super::memory_gate::MemoryGate;
use super::stats::Stats;
use super::verify::{verify_candidate, Attempt, Verdict};
use super::{admit_spec, Event};

/// One (spec, candidate) pair. `seq` orders tasks and rejections together
/// in the order the inputs were read.
pub(super) struct Task {
    pub seq: u64,
    pub spec: Arc<HashSpec>,
    pub candidate: String,
}

pub(super) struct Sequenced {
    pub seq: u64,
    pub event: Event,
}

/// Reads both sources and feeds the task queue. Rejections skip the queue
/// and go straight to the outcome channel with their own sequence number.
///
/// Returns early without error when the workers or the reporter hang up,
/// since that side owns the error being reported.
pub(super) fn produce(
    hashes: &dyn LineSource,
    wordlist: &dyn LineSource,
    stats: &Stats,
    gate: &MemoryGate,
    shutdown: &AtomicBool,
    task_tx: Sender<Task>,
    outcome_tx: Sender<Sequenced>,
) -> Result<()> {
    let mut seq = 0u64;

    for line in hashes.open()? {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let line = line?;

        let spec = match admit_spec(&line, stats, Some(gate)) {
            Ok(spec) => spec,
            Err(reason) => {
                let rejected = Sequenced {
                    seq,
                    event: Event::Rejected { line, reason },
                };
                if outcome_tx.send(rejected).is_err() {
                    return Ok(());
                }
                seq = seq.wrapping_add(1);
                continue;
            }
        };

        for candidate in wordlist.open()? {
            if shutdown.load(Ordering::Relaxed) {
                return Ok(());
            }
            let candidate = trim_line(&candidate?).to_string();
            let task = Task {
                seq,
                spec: Arc::clone(&spec),
                candidate,
            };
            if task_tx.send(task).is_err() {
                return Ok(());
            }
            seq = seq.wrapping_add(1);
        }
    }

    Ok(())
}

/// Drains the task queue until it closes. Every task gets exactly one
/// outcome, including the ones skipped after a shutdown request.
pub(super) fn worker_loop<K>(
    worker_idx: usize,
    kdf: &K,
    gate: &MemoryGate,
    shutdown: &AtomicBool,
    task_rx: Receiver<Task>,
    outcome_tx: Sender<Sequenced>,
) where
    K: KdfBackend + ?Sized,
{
    while let Ok(task) = task_rx.recv() {
        let attempt = run_task(worker_idx, kdf, gate, shutdown, &task);
        let outcome = Sequenced {
            seq: task.seq,
            event: Event::Attempt {
                spec: task.spec,
                verdict: Verdict {
                    candidate: task.candidate,
                    attempt,
                },
            },
        };
        if outcome_tx.send(outcome).is_err() {
            break;
        }
    }
}

fn run_task<K>(
    worker_idx: usize,
    kdf: &K,
    gate: &MemoryGate,
    shutdown: &AtomicBool,
    task: &Task,
) -> Attempt
where
    K: KdfBackend + ?Sized,
{
    if shutdown.load(Ordering::Relaxed) {
        return Attempt::Cancelled;
    }

    let _lease = match gate.acquire(task.spec.params().admission_kib()) {
        Ok(lease) => lease,
        Err(err) => return Attempt::Failed(err),
    };
    // Admission can take a while under a tight ceiling.
    if shutdown.load(Ordering::Relaxed) {
        return Attempt::Cancelled;
    }

    panic::catch_unwind(AssertUnwindSafe(|| {
        verify_candidate(kdf, &task.spec, &task.candidate)
    }))
    .unwrap_or_else(|_| Attempt::Failed(anyhow!("worker {worker_idx} panicked during derivation")))
}
