use crate::record::PendingRecord;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Which end of the backlog a drain takes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryOrder {
    /// Newest entries are delivered first; under backlog the oldest wait
    /// the longest. Chunks are taken from the end records are pushed to.
    #[default]
    MostRecentFirst,
    /// Plain FIFO.
    OldestFirst,
}

/// Unbounded, internally synchronized buffer of records awaiting delivery.
///
/// The lock is only held for the push or the drain itself, never across
/// a network call.
#[derive(Debug, Default)]
pub struct BatchQueue {
    records: Mutex<VecDeque<PendingRecord>>,
    order: DeliveryOrder,
}

impl BatchQueue {
    pub fn new(order: DeliveryOrder) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            order,
        }
    }

    pub fn order(&self) -> DeliveryOrder {
        self.order
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PendingRecord>> {
        // A panicking holder cannot leave the deque half-modified.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a record. Never blocks beyond the short critical section and
    /// never rejects.
    pub fn push(&self, record: PendingRecord) {
        let mut records = self.lock();
        match self.order {
            DeliveryOrder::MostRecentFirst => records.push_front(record),
            DeliveryOrder::OldestFirst => records.push_back(record),
        }
    }

    /// Atomically remove up to `max_count` records from the head. Records
    /// left behind keep their relative order.
    pub fn drain(&self, max_count: usize) -> Vec<PendingRecord> {
        let mut records = self.lock();
        let count = max_count.min(records.len());
        records.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
