//! Fixed-size worker pool with typed task handles and cooperative shutdown.
//!
//! Workers are spawned once at construction and sleep on a condition
//! variable between tasks. Submission is FIFO; execution order across
//! workers is unspecified. Shutdown drains: tasks already queued still run
//! before the workers exit.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{info, warn};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Returned by [`ThreadPool::submit`] once shutdown has begun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot submit to a shut-down thread pool")]
pub struct PoolClosed;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    queue: VecDeque<Job>,
    /// Tasks submitted but not yet finished (queued or running).
    active: usize,
    shutdown: bool,
}

struct Shared {
    state: Mutex<PoolState>,
    task_ready: Condvar,
    all_done: Condvar,
}

/// A fixed set of worker threads over one FIFO queue.
///
/// The pool is used by reference; workers hold an `Arc` of the shared state,
/// so the public handle can sit wherever the driver keeps it.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new(threads: usize) -> Self {
        assert!(threads > 0, "thread pool needs at least one worker");
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                active: 0,
                shutdown: false,
            }),
            task_ready: Condvar::new(),
            all_done: Condvar::new(),
        });
        let workers = (0..threads)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || worker_loop(&shared))
            })
            .collect();
        Self { shared, workers }
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a task and hand back a [`TaskHandle`] for its result. The
    /// task's return value, or the payload of a panic inside it, is stored
    /// in the handle and resurfaces on `join`.
    pub fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, PoolClosed>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let slot = Arc::new(TaskSlot {
            result: Mutex::new(None),
            done: Condvar::new(),
        });
        let worker_slot = Arc::clone(&slot);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(task));
            *worker_slot.result.lock() = Some(outcome);
            worker_slot.done.notify_all();
        });
        {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                warn!("rejecting task: pool is shut down");
                return Err(PoolClosed);
            }
            state.queue.push_back(job);
            // Counted before any worker can pick it up, so wait_all never
            // observes a gap between dequeue and completion.
            state.active += 1;
        }
        self.shared.task_ready.notify_one();
        Ok(TaskHandle { slot })
    }

    /// Block until the queue is empty and no task is still running. Both
    /// conditions are required: a task can be dequeued but unfinished, or
    /// queued but not yet picked up.
    ///
    /// Normal return says nothing about task outcomes; callers that care
    /// must join every handle.
    pub fn wait_all(&self) {
        let mut state = self.shared.state.lock();
        while !(state.queue.is_empty() && state.active == 0) {
            self.shared.all_done.wait(&mut state);
        }
    }

    /// Begin cooperative shutdown. Idempotent. Queued tasks still drain;
    /// further submissions fail with [`PoolClosed`].
    pub fn shutdown(&self) {
        let queued = {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            state.queue.len()
        };
        self.shared.task_ready.notify_all();
        info!("thread pool shutting down; {queued} queued tasks will drain");
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let job = {
            let mut state = shared.state.lock();
            while !state.shutdown && state.queue.is_empty() {
                shared.task_ready.wait(&mut state);
            }
            match state.queue.pop_front() {
                Some(job) => job,
                // Shutdown with an empty queue: drain complete, exit.
                None => return,
            }
            // Lock released here; never held across job execution.
        };
        job();
        {
            let mut state = shared.state.lock();
            state.active -= 1;
        }
        // wait_all re-checks its compound predicate, so wake every waiter.
        shared.all_done.notify_all();
    }
}

struct TaskSlot<T> {
    result: Mutex<Option<thread::Result<T>>>,
    done: Condvar,
}

/// A handle to one submitted task's eventual result.
pub struct TaskHandle<T> {
    slot: Arc<TaskSlot<T>>,
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle").finish_non_exhaustive()
    }
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes. A panic inside the task resurfaces
    /// here as `Err`, mirroring `std::thread::JoinHandle::join`.
    pub fn join(self) -> thread::Result<T> {
        let mut guard = self.slot.result.lock();
        loop {
            if let Some(outcome) = guard.take() {
                return outcome;
            }
            self.slot.done.wait(&mut guard);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.slot.result.lock().is_some()
    }
}
