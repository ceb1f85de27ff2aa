//! Bounded, ring-buffered work queues with dedicated worker pools.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex},
    thread::{self, JoinHandle},
};

use tracing::error;

use crate::sync::{lock, wait};

/// Capacities at or above this (or zero) fall back to the default.
const MAX_CAPACITY: usize = 2_000_000_000;
const DEFAULT_CAPACITY: usize = 10_000;

type Handler<T> = Arc<dyn Fn(usize, T) + Send + Sync>;

/// A set of fixed-capacity work queues, each with its own worker thread
/// pool.
///
/// Every queue is a ring buffer protected by one mutex and a pair of
/// condition variables. Producers either block until space is available or
/// get an immediate `false` when the ring is full, depending on the
/// queue's `wait_when_full` mode. Workers drain items one at a time and
/// hand each to the handler given to [`start`](Self::start); a panicking
/// handler is caught and logged without terminating its worker.
///
/// Queues begin in the stopped state. While stopped, enqueued items are
/// silently discarded (the producer is told `true` - there is nobody left
/// to care).
pub struct MultiQueue<T> {
    queues: Vec<Arc<Queue<T>>>,
}

struct Queue<T> {
    ring: Mutex<Ring<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    workers: Mutex<Vec<JoinHandle<()>>>,
    capacity: usize,
}

struct Ring<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
    count: usize,
    wait_when_full: bool,
    stopping: bool,
}

impl<T: Send + 'static> MultiQueue<T> {
    /// Construct `queue_count` stopped queues, each holding up to
    /// `capacity` items.
    pub fn new(queue_count: usize, capacity: usize) -> Self {
        let capacity = if capacity == 0 || capacity >= MAX_CAPACITY {
            DEFAULT_CAPACITY
        } else {
            capacity
        };

        let queues = (0..queue_count)
            .map(|_| {
                Arc::new(Queue {
                    ring: Mutex::new(Ring {
                        slots: Vec::new(),
                        head: 0,
                        tail: 0,
                        count: 0,
                        wait_when_full: false,
                        stopping: true,
                    }),
                    not_empty: Condvar::new(),
                    not_full: Condvar::new(),
                    workers: Mutex::new(Vec::new()),
                    capacity,
                })
            })
            .collect();

        Self { queues }
    }

    /// The number of queues.
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// The per-queue item capacity.
    pub fn capacity(&self) -> usize {
        self.queues.first().map(|q| q.capacity).unwrap_or(0)
    }

    /// Start queue `index` with `worker_count` threads delivering items to
    /// `handler`.
    ///
    /// `wait_when_full` selects the queue-wide behaviour of
    /// [`enqueue`](Self::enqueue) when the ring is full: block the
    /// producer, or reject the item.
    pub fn start<F>(&self, index: usize, wait_when_full: bool, worker_count: usize, handler: F)
    where
        F: Fn(usize, T) + Send + Sync + 'static,
    {
        let Some(queue) = self.queues.get(index) else {
            return;
        };
        let handler: Handler<T> = Arc::new(handler);

        {
            let mut ring = lock(&queue.ring);
            ring.slots = (0..queue.capacity).map(|_| None).collect();
            ring.head = 0;
            ring.tail = 0;
            ring.count = 0;
            ring.wait_when_full = wait_when_full;
            ring.stopping = false;
        }

        let mut workers = lock(&queue.workers);
        for n in 0..worker_count {
            let queue = Arc::clone(queue);
            let handler = Arc::clone(&handler);
            let worker = thread::Builder::new()
                .name(format!("queue-{}-worker-{}", index, n))
                .spawn(move || worker_loop(&queue, index, &handler));
            match worker {
                Ok(handle) => workers.push(handle),
                Err(e) => error!(queue = index, "could not spawn queue worker: {}", e),
            }
        }
    }

    /// Stop queue `index`: wake every waiter, join the workers and discard
    /// any undelivered items. Idempotent.
    pub fn stop(&self, index: usize) {
        let Some(queue) = self.queues.get(index) else {
            return;
        };

        {
            let mut ring = lock(&queue.ring);
            if ring.stopping {
                return;
            }
            ring.stopping = true;
        }
        queue.not_empty.notify_all();
        queue.not_full.notify_all();

        let workers = std::mem::take(&mut *lock(&queue.workers));
        for worker in workers {
            // A worker that panicked past its handler guard is already
            // logged; joining it cannot fail in any way we can act on.
            let _ = worker.join();
        }

        let mut ring = lock(&queue.ring);
        ring.slots.clear();
        ring.head = 0;
        ring.tail = 0;
        ring.count = 0;
    }

    /// Place `item` onto queue `index`, honouring the queue-wide
    /// `wait_when_full` mode.
    ///
    /// Returns `false` only when the item was rejected because the ring is
    /// full and waiting is disabled. A stopped queue accepts (and
    /// discards) everything.
    pub fn enqueue(&self, index: usize, item: T) -> bool {
        self.enqueue_with(index, item, false)
    }

    /// As [`enqueue`](Self::enqueue), but `wait_when_full` forces this
    /// producer to block for space even on a queue configured to drop.
    pub fn enqueue_with(&self, index: usize, item: T, wait_when_full: bool) -> bool {
        let Some(queue) = self.queues.get(index) else {
            return true;
        };

        let mut ring = lock(&queue.ring);
        if ring.stopping {
            return true;
        }

        if ring.wait_when_full || wait_when_full {
            while ring.count >= queue.capacity && !ring.stopping {
                ring = wait(&queue.not_full, ring);
            }
            if ring.stopping {
                return true;
            }
        } else if ring.count >= queue.capacity {
            return false;
        }

        let tail = ring.tail;
        ring.slots[tail] = Some(item);
        ring.tail = (tail + 1) % queue.capacity;
        ring.count += 1;
        drop(ring);

        queue.not_empty.notify_one();
        true
    }
}

impl<T> std::fmt::Debug for MultiQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiQueue")
            .field("queues", &self.queues.len())
            .field("capacity", &self.queues.first().map(|q| q.capacity))
            .finish()
    }
}

impl<T> Drop for MultiQueue<T> {
    fn drop(&mut self) {
        for queue in &self.queues {
            let mut ring = lock(&queue.ring);
            if ring.stopping {
                continue;
            }
            ring.stopping = true;
            drop(ring);
            queue.not_empty.notify_all();
            queue.not_full.notify_all();
            for worker in std::mem::take(&mut *lock(&queue.workers)) {
                let _ = worker.join();
            }
        }
    }
}

fn worker_loop<T>(queue: &Queue<T>, index: usize, handler: &Handler<T>) {
    loop {
        let mut ring = lock(&queue.ring);
        while ring.count == 0 && !ring.stopping {
            ring = wait(&queue.not_empty, ring);
        }
        if ring.stopping {
            return;
        }

        loop {
            let head = ring.head;
            let item = ring.slots[head].take();
            ring.head = (head + 1) % queue.capacity;
            ring.count -= 1;
            drop(ring);

            queue.not_full.notify_one();

            if let Some(item) = item {
                if catch_unwind(AssertUnwindSafe(|| handler(index, item))).is_err() {
                    error!(queue = index, "queue handler panicked; worker continues");
                }
            }

            ring = lock(&queue.ring);
            if ring.count == 0 || ring.stopping {
                break;
            }
        }
        if ring.stopping {
            return;
        }
    }
}
