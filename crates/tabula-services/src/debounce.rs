//! Per-cell trailing-edge debounce queue
//!
//! Each cell address holds at most one pending payload and one deadline.
//! Scheduling again replaces the payload and pushes the deadline out, so
//! only the last value in a burst is ever flushed. The owner decides when
//! to flush: [`DebounceQueue::take_due`] on a tick, [`DebounceQueue::take`]
//! when the user navigates away, [`DebounceQueue::drain`] on close.

use std::collections::BTreeMap;
use std::time::Duration;

use tabula_core::CellAddress;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Pending<T> {
    deadline: Instant,
    payload: T,
}

#[derive(Debug, Clone)]
pub struct DebounceQueue<T> {
    delay: Duration,
    entries: BTreeMap<CellAddress, Pending<T>>,
}

impl<T> DebounceQueue<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            entries: BTreeMap::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `payload` for `addr`, replacing and returning any pending one.
    pub fn schedule(&mut self, addr: CellAddress, payload: T) -> Option<T> {
        let deadline = Instant::now() + self.delay;
        self.entries
            .insert(addr, Pending { deadline, payload })
            .map(|p| p.payload)
    }

    pub fn get(&self, addr: &CellAddress) -> Option<&T> {
        self.entries.get(addr).map(|p| &p.payload)
    }

    pub fn contains(&self, addr: &CellAddress) -> bool {
        self.entries.contains_key(addr)
    }

    /// Remove a pending payload regardless of its deadline
    pub fn take(&mut self, addr: &CellAddress) -> Option<T> {
        self.entries.remove(addr).map(|p| p.payload)
    }

    /// Remove every payload whose deadline has passed, in address order
    pub fn take_due(&mut self, now: Instant) -> Vec<(CellAddress, T)> {
        let due: Vec<CellAddress> = self
            .entries
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(addr, _)| addr.clone())
            .collect();
        due.into_iter()
            .filter_map(|addr| self.take(&addr).map(|payload| (addr, payload)))
            .collect()
    }

    /// Remove everything, e.g. to flush on close
    pub fn drain(&mut self) -> Vec<(CellAddress, T)> {
        std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(addr, p)| (addr, p.payload))
            .collect()
    }

    /// Drop everything without flushing; returns how many were dropped.
    pub fn discard_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|p| p.deadline).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
