//! Fixed-size sample pool with empty/full hand-off queues.
//!
//! All samples are allocated once at startup and only ever recycled between
//! the two queues. A `Box<Sample>` is owned by exactly one queue or one
//! thread at any instant; moving the box through the guarded operations
//! below is the only synchronization surface between the sampler and the
//! publisher. Backpressure falls out of the fixed size: once the sampler
//! exhausts the empty queue it blocks until the publisher returns buffers.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::debug;

use crate::sample::Sample;

struct Queues {
    empty: VecDeque<Box<Sample>>,
    full: VecDeque<Box<Sample>>,
    stopping: bool,
}

/// Shared pool of preallocated samples.
pub struct SamplePool {
    queues: Mutex<Queues>,
    empty_available: Condvar,
    capacity: usize,
}

impl SamplePool {
    /// Preallocates `capacity` samples of `value_count` values each, all
    /// starting on the empty queue.
    pub fn new(capacity: usize, value_count: usize) -> Self {
        let empty = (0..capacity)
            .map(|_| Box::new(Sample::new(value_count)))
            .collect();

        Self {
            queues: Mutex::new(Queues {
                empty,
                full: VecDeque::new(),
                stopping: false,
            }),
            empty_available: Condvar::new(),
            capacity,
        }
    }

    /// Total number of samples owned by the pool, constant for its lifetime.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        // A panic while holding the lock leaves the queues structurally
        // intact, so recover the guard instead of propagating the poison.
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Takes one sample from the empty queue, blocking while none are
    /// available. Returns `None` if a stop was requested, including while
    /// waiting; the caller must then abort without consuming a sample.
    pub fn acquire_empty(&self) -> Option<Box<Sample>> {
        let mut queues = self.lock();

        while queues.empty.is_empty() {
            if queues.stopping {
                return None;
            }

            debug!("no empty samples available, waiting");
            queues = self
                .empty_available
                .wait(queues)
                .unwrap_or_else(|e| e.into_inner());

            if queues.stopping {
                return None;
            }
        }

        queues.empty.pop_front()
    }

    /// Appends a finished sample to the full queue in arrival order.
    ///
    /// No notification: the publisher polls on a timer, not a condition.
    pub fn release_to_full(&self, sample: Box<Sample>) {
        self.lock().full.push_back(sample);
    }

    /// Splices the entire full queue out in one step, preserving FIFO order.
    /// The sampler never observes a partially drained queue.
    pub fn drain_full(&self) -> Vec<Box<Sample>> {
        self.lock().full.drain(..).collect()
    }

    /// Returns a processed batch to the empty queue in one splice and wakes
    /// at most one waiting producer.
    pub fn release_many_to_empty(&self, batch: Vec<Box<Sample>>) {
        let mut queues = self.lock();
        queues.empty.extend(batch);
        drop(queues);

        self.empty_available.notify_one();
    }

    /// Current empty-queue occupancy, used for the publisher's low-water
    /// retry check.
    pub fn empty_len(&self) -> usize {
        self.lock().empty.len()
    }

    /// Current full-queue occupancy.
    pub fn full_len(&self) -> usize {
        self.lock().full.len()
    }

    /// Requests shutdown and wakes any producer blocked on the empty queue.
    pub fn request_stop(&self) {
        let mut queues = self.lock();
        queues.stopping = true;
        drop(queues);

        self.empty_available.notify_all();
    }

    pub fn stop_requested(&self) -> bool {
        self.lock().stopping
    }
}
