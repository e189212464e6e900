//! Timeout guard (spec.md §4.4).
//!
//! Bounds the wall-clock cost of a single REGEX matcher invocation. The
//! other four matchers are constant-time and evaluated directly in
//! `engine/matchers.rs`; the guard is specialized to REGEX, the only
//! realistic source of a pathological per-message cost.
//!
//! ## Design
//!
//! The teacher crate this engine is built from has no concurrency of its
//! own, so this is new machinery — but it is deliberately the plainest
//! thing that works: a fixed-size pool of `std::thread` workers pulling
//! jobs off an `mpsc` queue (the classic job-queue pool), not an external
//! threadpool crate or an async runtime. Each REGEX evaluation is submitted
//! as a job; the calling thread waits on a one-shot reply channel with
//! `recv_timeout(budget)`. On expiry the call degrades to `false`
//! immediately (spec.md §4.4: "the matcher is treated as returning false");
//! the abandoned worker finishes the match in the background and its
//! result is dropped silently (sending into a channel nobody reads is a
//! no-op, not a panic).
//!
//! `regex::Regex` is intentionally cloned into each job rather than shared
//! by reference — its `Clone` impl is a cheap `Arc` bump, which is what
//! makes moving it across the job boundary free of lifetime gymnastics.
//!
//! Each worker re-locks the queue once per job and drops the guard before
//! calling it, rather than holding the lock across `job()` — a job is only
//! fast in the non-timeout case, and a worker holding the queue mutex while
//! a regex runs long would serialize every other worker behind it.
//!
//! The pool's lifetime is tied to the owning `Engine`: `Drop` closes the
//! job channel and joins every worker, per spec.md §5 ("this pool has a
//! bounded lifetime tied to the Engine; when the Engine is discarded, its
//! workers must be torn down").

use regex::Regex;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Worker {
    #[allow(dead_code)]
    id: usize,
    handle: Option<JoinHandle<()>>,
}

/// Owns the fixed worker pool and the per-rule timeout budget.
pub(crate) struct TimeoutGuard {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<Worker>,
    budget: Duration,
}

impl TimeoutGuard {
    pub(crate) fn new(worker_threads: usize, budget: Duration) -> Self {
        let worker_threads = worker_threads.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..worker_threads)
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                let handle = thread::Builder::new()
                    .name(format!("streamrouter-timeout-{id}"))
                    .spawn(move || {
                        loop {
                            let job = receiver.lock().expect("timeout guard worker mutex poisoned").recv();
                            match job {
                                Ok(job) => job(),
                                Err(_) => break,
                            }
                        }
                    })
                    .expect("failed to spawn timeout guard worker thread");
                Worker { id, handle: Some(handle) }
            })
            .collect();

        TimeoutGuard { sender: Some(sender), workers, budget }
    }

    pub(crate) fn budget(&self) -> Duration {
        self.budget
    }

    /// Run `pattern.is_match(text)` under the timeout budget.
    ///
    /// Distinguishing [`GuardOutcome::TimedOut`] from an ordinary non-match
    /// lets the caller (`engine/state.rs`) log and count the timeout
    /// separately, per spec.md §7's `RuleTimeout` taxonomy entry — the
    /// matcher itself still degrades to non-match either way.
    pub(crate) fn run_regex(&self, pattern: &Regex, text: &str) -> GuardOutcome {
        let pattern = pattern.clone();
        let text = text.to_owned();
        let (tx, rx) = mpsc::channel();

        let job: Job = Box::new(move || {
            let matched = pattern.is_match(&text);
            let _ = tx.send(matched);
        });

        self.sender
            .as_ref()
            .expect("timeout guard used after shutdown")
            .send(job)
            .expect("timeout guard worker pool unexpectedly shut down");

        match rx.recv_timeout(self.budget) {
            Ok(matched) => GuardOutcome::Completed(matched),
            Err(_) => GuardOutcome::TimedOut,
        }
    }
}

/// Result of a guarded regex invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GuardOutcome {
    Completed(bool),
    TimedOut,
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        // Dropping the sender closes the channel; each worker's `recv()`
        // then returns `Err` and the loop exits, so every `join` below
        // completes promptly.
        self.sender.take();
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_regex_returns_true_within_budget() {
        let guard = TimeoutGuard::new(2, Duration::from_millis(50));
        let re = Regex::new("hello").unwrap();
        assert_eq!(guard.run_regex(&re, "say hello there"), GuardOutcome::Completed(true));
    }

    #[test]
    fn non_matching_regex_returns_false() {
        let guard = TimeoutGuard::new(2, Duration::from_millis(50));
        let re = Regex::new("xyz").unwrap();
        assert_eq!(guard.run_regex(&re, "say hello there"), GuardOutcome::Completed(false));
    }

    #[test]
    fn slow_job_past_budget_degrades_to_non_match() {
        // Simulate a pathologically slow matcher without depending on a
        // particular regex engine's backtracking behavior: submit a job
        // directly that sleeps past the budget.
        let guard = TimeoutGuard::new(1, Duration::from_millis(10));
        let (tx, rx) = mpsc::channel();
        guard
            .sender
            .as_ref()
            .unwrap()
            .send(Box::new(move || {
                thread::sleep(Duration::from_millis(200));
                let _ = tx.send(true);
            }))
            .unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)), Err(mpsc::RecvTimeoutError::Timeout));
    }
}
