//! Resizable pool of OS worker threads fed by a [`TaskQueue`].
//!
//! Threads are started on demand up to the budget and retire when idle for the
//! keep-alive period or when the budget drops below the number alive. A thread
//! that is running a task when the budget shrinks finishes that task first.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use super::queue::{TaskPriority, TaskQueue};

struct PoolState<T> {
    queue: TaskQueue<T>,
    size: usize,
    alive: usize,
    busy: usize,
    next_id: usize,
    shutdown: bool,
}

struct Shared<T> {
    state: Mutex<PoolState<T>>,
    work: Condvar,
    idle: Condvar,
    keep_alive: Duration,
    handler: Box<dyn Fn(T) + Send + Sync>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, PoolState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct WorkerPool<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub(crate) fn new<F>(size: usize, keep_alive: Duration, handler: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState {
                    queue: TaskQueue::new(),
                    size: size.max(1),
                    alive: 0,
                    busy: 0,
                    next_id: 0,
                    shutdown: false,
                }),
                work: Condvar::new(),
                idle: Condvar::new(),
                keep_alive,
                handler: Box::new(handler),
            }),
        }
    }

    /// Queues `task`. Returns false (and drops the task) after shutdown.
    pub(crate) fn submit(&self, task: T, priority: TaskPriority) -> bool {
        let mut state = self.shared.lock();
        if state.shutdown {
            return false;
        }
        state.queue.push(task, priority);
        self.spawn_for_backlog(&mut state);
        self.shared.work.notify_one();
        true
    }

    /// Sets the budget and returns how many tasks are running right now.
    pub(crate) fn resize(&self, size: usize) -> usize {
        let mut state = self.shared.lock();
        state.size = size.max(1);
        self.spawn_for_backlog(&mut state);
        self.shared.work.notify_all();
        state.busy
    }

    pub(crate) fn size(&self) -> usize {
        self.shared.lock().size
    }

    pub(crate) fn active_count(&self) -> usize {
        self.shared.lock().busy
    }

    pub(crate) fn queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Stops accepting work and discards everything still queued.
    pub(crate) fn shutdown(&self) {
        let mut state = self.shared.lock();
        state.shutdown = true;
        let dropped = state.queue.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "discarded queued tasks on shutdown");
        }
        self.shared.work.notify_all();
    }

    /// Waits up to `timeout` for running tasks to finish. True if none are left.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let state = self.shared.lock();
        let (state, _) = self
            .shared
            .idle
            .wait_timeout_while(state, timeout, |s| s.busy > 0)
            .unwrap_or_else(PoisonError::into_inner);
        state.busy == 0
    }

    /// Starts threads while queued work exceeds idle threads and the budget allows.
    fn spawn_for_backlog(&self, state: &mut PoolState<T>) {
        while state.alive < state.size && state.alive - state.busy < state.queue.len() {
            let id = state.next_id;
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("hdm-worker-{id}"))
                .spawn(move || worker_loop(shared));
            match spawned {
                Ok(_) => {
                    state.alive += 1;
                    state.next_id += 1;
                }
                Err(e) => {
                    tracing::error!("failed to spawn worker thread: {}", e);
                    break;
                }
            }
        }
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<T>(shared: Arc<Shared<T>>) {
    let mut state = shared.lock();
    let mut idle_since = Instant::now();
    loop {
        if state.shutdown || state.alive > state.size {
            break;
        }
        if let Some(task) = state.queue.pop() {
            state.busy += 1;
            drop(state);
            if panic::catch_unwind(AssertUnwindSafe(|| (shared.handler)(task))).is_err() {
                tracing::error!("worker task panicked");
            }
            state = shared.lock();
            state.busy -= 1;
            if state.busy == 0 {
                shared.idle.notify_all();
            }
            idle_since = Instant::now();
            continue;
        }
        let waited = idle_since.elapsed();
        if waited >= shared.keep_alive {
            break;
        }
        let (guard, _) = shared
            .work
            .wait_timeout(state, shared.keep_alive - waited)
            .unwrap_or_else(PoisonError::into_inner);
        state = guard;
    }
    state.alive -= 1;
    if state.busy == 0 {
        shared.idle.notify_all();
    }
}
