use std::sync::{Condvar, Mutex};

use anyhow::{anyhow, Result};

struct GateState {
    committed_kib: u64,
    next_ticket: u64,
    now_serving: u64,
}

/// Admission control for concurrent KDF calls.
///
/// Callers are admitted in arrival order. A caller waits while its cost
/// would push committed memory past the ceiling. A cost larger than the
/// ceiling on its own is admitted once nothing else is committed, so it runs
/// alone instead of waiting forever.
pub(super) struct MemoryGate {
    ceiling_kib: Option<u64>,
    state: Mutex<GateState>,
    changed: Condvar,
}

/// Committed memory held for one running derivation. Released on drop.
pub(super) struct MemoryLease<'a> {
    gate: &'a MemoryGate,
    kib: u64,
}

impl MemoryGate {
    pub(super) fn new(ceiling_kib: Option<u64>) -> Self {
        Self {
            ceiling_kib,
            state: Mutex::new(GateState {
                committed_kib: 0,
                next_ticket: 0,
                now_serving: 0,
            }),
            changed: Condvar::new(),
        }
    }

    pub(super) fn ceiling_kib(&self) -> Option<u64> {
        self.ceiling_kib
    }

    pub(super) fn exceeds_ceiling(&self, kib: u64) -> bool {
        self.ceiling_kib.is_some_and(|ceiling| kib > ceiling)
    }

    pub(super) fn acquire(&self, kib: u64) -> Result<MemoryLease<'_>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("memory gate lock poisoned"))?;

        let ticket = state.next_ticket;
        state.next_ticket = state.next_ticket.wrapping_add(1);

        while state.now_serving != ticket || !self.fits(state.committed_kib, kib) {
            state = self
                .changed
                .wait(state)
                .map_err(|_| anyhow!("memory gate lock poisoned"))?;
        }

        state.now_serving = state.now_serving.wrapping_add(1);
        state.committed_kib = state.committed_kib.saturating_add(kib);
        drop(state);
        // The next ticket holder may fit alongside this lease.
        self.changed.notify_all();

        Ok(MemoryLease { gate: self, kib })
    }

    #[cfg(test)]
    pub(super) fn committed_kib(&self) -> u64 {
        self.state
            .lock()
            .map(|state| state.committed_kib)
            .unwrap_or_else(|poisoned| poisoned.into_inner().committed_kib)
    }

    fn fits(&self, committed_kib: u64, kib: u64) -> bool {
        match self.ceiling_kib {
            None => true,
            Some(_) if committed_kib == 0 => true,
            Some(ceiling) => committed_kib.saturating_add(kib) <= ceiling,
        }
    }

    fn release(&self, kib: u64) {
        match self.state.lock() {
            Ok(mut state) => state.committed_kib = state.committed_kib.saturating_sub(kib),
            Err(poisoned) => {
                let mut state = poisoned.into_inner();
                state.committed_kib = state.committed_kib.saturating_sub(kib);
            }
        }
        self.changed.notify_all();
    }
}

impl MemoryLease<'_> {
    #[cfg(test)]
    pub(super) fn kib(&self) -> u64 {
        self.kib
    }
}

impl Drop for MemoryLease<'_> {
    fn drop(&mut self) {
        self.gate.release(self.kib);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn admits_within_ceiling() {
        let gate = MemoryGate::new(Some(100));
        let first = gate.acquire(40).expect("first lease");
        let second = gate.acquire(40).expect("second lease");
        assert_eq!(gate.committed_kib(), 80);
        assert_eq!(first.kib() + second.kib(), 80);
        drop(first);
        assert_eq!(gate.committed_kib(), 40);
        drop(second);
        assert_eq!(gate.committed_kib(), 0);
    }

    #[test]
    fn unlimited_gate_never_blocks() {
        let gate = MemoryGate::new(None);
        let _a = gate.acquire(u64::MAX / 2).expect("lease");
        let _b = gate.acquire(u64::MAX / 2).expect("lease");
        assert!(!gate.exceeds_ceiling(u64::MAX));
    }

    #[test]
    fn oversized_cost_runs_alone() {
        let gate = MemoryGate::new(Some(10));
        assert!(gate.exceeds_ceiling(50));
        let lease = gate.acquire(50).expect("oversized lease on idle gate");
        assert_eq!(gate.committed_kib(), 50);
        drop(lease);
        assert_eq!(gate.committed_kib(), 0);
    }

    #[test]
    fn waits_until_memory_is_released() {
        let gate = MemoryGate::new(Some(100));
        let held = gate.acquire(60).expect("first lease");
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            let gate = &gate;
            scope.spawn(move || {
                let lease = gate.acquire(60).expect("second lease");
                tx.send(lease.kib()).expect("receiver should be alive");
            });

            assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
            drop(held);
            assert_eq!(
                rx.recv_timeout(Duration::from_secs(5))
                    .expect("waiter should be admitted after release"),
                60
            );
        });
    }

    #[test]
    fn concurrent_leases_stay_under_ceiling() {
        let gate = MemoryGate::new(Some(100));
        let peak = AtomicU64::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..20 {
                        let _lease = gate.acquire(30).expect("lease");
                        peak.fetch_max(gate.committed_kib(), Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(1));
                    }
                });
            }
        });

        assert!(peak.load(Ordering::SeqCst) <= 90);
        assert!(peak.load(Ordering::SeqCst) >= 30);
        assert_eq!(gate.committed_kib(), 0);
    }
}
