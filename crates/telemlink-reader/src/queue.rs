use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::error::QueueOverrunError;
use crate::record::Record;

/// Default number of records held before the reader reports an overrun.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Fixed-capacity FIFO between the reader thread and its consumers.
///
/// Cloning yields another handle to the same queue, so a consumer on a
/// different thread can drain without going through the pipeline. Pushes
/// never block: a full queue is an error.
#[derive(Debug, Clone)]
pub struct RecordQueue {
    tx: Sender<Record>,
    rx: Receiver<Record>,
    capacity: usize,
}

impl RecordQueue {
    /// Create a queue holding at most `capacity` records (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Enqueue without blocking.
    pub fn try_push(&self, record: Record) -> Result<(), QueueOverrunError> {
        self.tx.try_send(record).map_err(|_| QueueOverrunError {
            capacity: self.capacity,
        })
    }

    /// Remove and return every record currently queued, oldest first.
    pub fn drain(&self) -> Vec<Record> {
        self.rx.try_iter().collect()
    }

    /// Wait up to `timeout` for the next record.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Record> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.rx.is_full()
    }
}

impl Default for RecordQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
