use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use thiserror::Error;

use crate::{
    config::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE, MIN_BATCH_SIZE},
    domain::{Item, QueueSnapshot},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error(
        "batch size must be between {min} and {max}, got {0}",
        min = MIN_BATCH_SIZE,
        max = MAX_BATCH_SIZE
    )]
    BatchSizeOutOfRange(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued { ready: bool },
    NotRunning,
    Duplicate,
}

impl Enqueued {
    pub fn accepted(self) -> bool {
        matches!(self, Enqueued::Queued { .. })
    }
}

/// Items taken off the queue by one flush. The epoch ties the flight to the
/// queue session it was flushed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    epoch: u64,
    items: Vec<Item>,
}

impl Batch {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug)]
struct QueueState {
    pending: VecDeque<Item>,
    seen: HashSet<String>,
    in_flight: bool,
    running: bool,
    stabilizing: bool,
    refilling: bool,
    batch_size: usize,
    epoch: u64,
    completed_flights: u64,
}

impl QueueState {
    fn reset(&mut self) {
        self.pending.clear();
        self.seen.clear();
        self.in_flight = false;
        self.epoch += 1;
    }
}

#[derive(Debug)]
pub struct BatchQueue {
    state: Mutex<QueueState>,
}

impl BatchQueue {
    pub fn new(batch_size: usize) -> Self {
        let batch_size = if (MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&batch_size) {
            batch_size
        } else {
            DEFAULT_BATCH_SIZE
        };
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                seen: HashSet::new(),
                in_flight: false,
                running: false,
                stabilizing: false,
                refilling: false,
                batch_size,
                epoch: 0,
                completed_flights: 0,
            }),
        }
    }

    pub fn start(&self) {
        let mut state = self.state.lock();
        state.reset();
        state.running = true;
    }

    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.running = false;
        state.reset();
    }

    pub fn enqueue(&self, item: Item) -> Enqueued {
        let mut state = self.state.lock();
        if !state.running {
            return Enqueued::NotRunning;
        }
        if !state.seen.insert(item.id.clone()) {
            return Enqueued::Duplicate;
        }
        state.pending.push_back(item);
        Enqueued::Queued {
            ready: state.pending.len() >= state.batch_size,
        }
    }

    /// Takes up to `batch_size` items off the front and marks them in flight.
    pub fn flush(&self) -> Option<Batch> {
        let mut state = self.state.lock();
        if state.pending.is_empty() || state.in_flight || state.stabilizing || state.refilling {
            return None;
        }
        let take = state.batch_size.min(state.pending.len());
        let items: Vec<Item> = state.pending.drain(..take).collect();
        state.in_flight = true;
        tracing::debug!(
            target: "queue",
            size = items.len(),
            remaining = state.pending.len(),
            epoch = state.epoch,
            "batch flushed"
        );
        Some(Batch {
            epoch: state.epoch,
            items,
        })
    }

    /// Releases the flight taken by `flush`. A flight from an earlier session
    /// is only counted; it must not release the current session's flag.
    pub fn complete_flight(&self, epoch: u64) {
        let mut state = self.state.lock();
        state.completed_flights += 1;
        if state.epoch == epoch {
            state.in_flight = false;
        } else {
            tracing::debug!(
                target: "queue",
                flight_epoch = epoch,
                current_epoch = state.epoch,
                "stale flight completed"
            );
        }
    }

    pub fn set_batch_size(&self, batch_size: usize) -> Result<(), QueueError> {
        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&batch_size) {
            return Err(QueueError::BatchSizeOutOfRange(batch_size));
        }
        self.state.lock().batch_size = batch_size;
        Ok(())
    }

    pub fn set_stabilizing(&self, stabilizing: bool) {
        self.state.lock().stabilizing = stabilizing;
    }

    /// Hold taken by the coordinator while it refills from the discovery
    /// source. Independent of the external stabilizing flag.
    pub fn set_refilling(&self, refilling: bool) {
        self.state.lock().refilling = refilling;
    }

    /// True while verdicts from a flight of `epoch` may still be acted on.
    pub fn is_current(&self, epoch: u64) -> bool {
        let state = self.state.lock();
        state.running && state.epoch == epoch
    }

    pub fn timer_flush_due(&self) -> bool {
        let state = self.state.lock();
        state.running && !state.pending.is_empty() && !state.in_flight
    }

    pub fn has_pending(&self) -> bool {
        !self.state.lock().pending.is_empty()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock();
        QueueSnapshot {
            pending: state.pending.len(),
            in_flight: state.in_flight,
            running: state.running,
            stabilizing: state.stabilizing,
            refilling: state.refilling,
            batch_size: state.batch_size,
            completed_flights: state.completed_flights,
        }
    }
}
