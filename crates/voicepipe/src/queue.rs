//! Thread-safe FIFO work queues with drain-wait ("join") support.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A unit of work handed to a background worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job<T> {
    /// Real payload.
    Task(T),
    /// Shutdown sentinel: ends the worker loop. Does not count as
    /// unfinished work, so pending [`TaskQueue::join`] calls are unaffected.
    Stop,
}

#[derive(Debug)]
struct QueueState<T> {
    jobs: VecDeque<Job<T>>,
    /// Tasks pushed but not yet acknowledged via `task_done`. Includes the
    /// in-flight item a worker has popped but not finished.
    unfinished: usize,
}

/// Unbounded thread-safe FIFO of jobs.
///
/// Mirrors the accounting contract of a classic work queue: every
/// [`push_task`](Self::push_task) must eventually be balanced by one
/// [`task_done`](Self::task_done), and [`join`](Self::join) blocks until
/// the balance reaches zero — including work a consumer has dequeued but
/// not yet completed.
#[derive(Debug)]
pub struct TaskQueue<T> {
    state: Mutex<QueueState<T>>,
    job_ready: Condvar,
    all_done: Condvar,
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                unfinished: 0,
            }),
            job_ready: Condvar::new(),
            all_done: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        // A poisoned lock means a worker panicked mid-item; the queue
        // state itself is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a task and account for it as unfinished work.
    pub fn push_task(&self, task: T) {
        let mut state = self.lock();
        state.jobs.push_back(Job::Task(task));
        state.unfinished += 1;
        drop(state);
        self.job_ready.notify_one();
    }

    /// Enqueue a shutdown sentinel.
    pub fn push_stop(&self) {
        let mut state = self.lock();
        state.jobs.push_back(Job::Stop);
        drop(state);
        self.job_ready.notify_one();
    }

    /// Dequeue the next job, blocking while the queue is empty.
    pub fn pop(&self) -> Job<T> {
        let mut state = self.lock();
        loop {
            if let Some(job) = state.jobs.pop_front() {
                return job;
            }
            state = self
                .job_ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Dequeue the next job if one is immediately available.
    pub fn try_pop(&self) -> Option<Job<T>> {
        self.lock().jobs.pop_front()
    }

    /// Acknowledge completion of one previously popped task.
    pub fn task_done(&self) {
        let mut state = self.lock();
        state.unfinished = state.unfinished.saturating_sub(1);
        if state.unfinished == 0 {
            drop(state);
            self.all_done.notify_all();
        }
    }

    /// Drop every queued job and settle the accounting for the removed
    /// tasks. An item a worker is currently processing stays counted until
    /// its `task_done`.
    pub fn clear(&self) {
        let mut state = self.lock();
        let removed_tasks = state
            .jobs
            .iter()
            .filter(|job| matches!(job, Job::Task(_)))
            .count();
        state.jobs.clear();
        state.unfinished = state.unfinished.saturating_sub(removed_tasks);
        let done = state.unfinished == 0;
        drop(state);
        if done {
            self.all_done.notify_all();
        }
    }

    /// Block until every pushed task has been acknowledged.
    pub fn join(&self) {
        let mut state = self.lock();
        while state.unfinished > 0 {
            state = self
                .all_done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`join`](Self::join), but gives up after `timeout`. Returns
    /// true if the queue drained in time.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.unfinished > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .all_done
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        true
    }

    /// Number of jobs currently queued (excludes in-flight work).
    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().jobs.is_empty()
    }

    /// Pushed-but-unacknowledged task count, including in-flight work.
    pub fn unfinished(&self) -> usize {
        self.lock().unfinished
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
