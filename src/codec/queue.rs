//! FIFO of chunks waiting for the feeder

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

struct Inner<T> {
    jobs: VecDeque<T>,
    closed: bool,
}

/// Result of waiting on the queue
#[derive(Debug, PartialEq, Eq)]
pub enum Next<T> {
    /// The oldest pending job
    Job(T),
    /// Nothing arrived within the wait
    Idle,
    /// The queue was closed and everything has been taken
    Closed,
}

/// Multi-producer, single-consumer job queue.
///
/// Push, pop, the emptiness check and close all happen under one lock, so a
/// consumer that sees `Closed` knows no job can still arrive.
pub struct JobQueue<T> {
    inner: Mutex<Inner<T>>,
    ready: Condvar,
}

impl<T> JobQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Append a job. Hands it back if the queue is closed.
    pub fn push(&self, job: T) -> std::result::Result<usize, T> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(job);
        }
        inner.jobs.push_back(job);
        let pending = inner.jobs.len();
        drop(inner);
        self.ready.notify_one();
        Ok(pending)
    }

    /// Take the oldest job, waiting up to `timeout` for one to arrive.
    pub fn next(&self, timeout: Duration) -> Next<T> {
        let mut inner = self.inner.lock();
        if inner.jobs.is_empty() && !inner.closed {
            self.ready.wait_for(&mut inner, timeout);
        }
        match inner.jobs.pop_front() {
            Some(job) => Next::Job(job),
            None if inner.closed => Next::Closed,
            None => Next::Idle,
        }
    }

    /// Refuse further pushes. Jobs already queued are still handed out.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().jobs.is_empty()
    }
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const WAIT: Duration = Duration::from_millis(5);

    #[test]
    fn test_fifo_order() {
        let queue = JobQueue::new();
        for i in 0..5 {
            queue.push(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(queue.next(WAIT), Next::Job(i));
        }
        assert_eq!(queue.next(WAIT), Next::Idle);
    }

    #[test]
    fn test_close_drains_pending_then_reports_closed() {
        let queue = JobQueue::new();
        queue.push("a").unwrap();
        queue.push("b").unwrap();
        queue.close();
        assert_eq!(queue.push("c"), Err("c"));
        assert_eq!(queue.next(WAIT), Next::Job("a"));
        assert_eq!(queue.next(WAIT), Next::Job("b"));
        assert_eq!(queue.next(WAIT), Next::Closed);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_waiting_consumer_wakes_on_push() {
        let queue = Arc::new(JobQueue::new());
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || loop {
                match queue.next(Duration::from_millis(50)) {
                    Next::Job(v) => return Some(v),
                    Next::Closed => return None,
                    Next::Idle => continue,
                }
            })
        };
        queue.push(42).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(42));
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        let queue = Arc::new(JobQueue::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        queue.push(p * 1000 + i).unwrap();
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        queue.close();

        let mut seen = Vec::new();
        while let Next::Job(v) = queue.next(WAIT) {
            seen.push(v);
        }
        assert_eq!(seen.len(), 400);
        // each producer's jobs keep their relative order
        for p in 0..4 {
            let mine: Vec<_> = seen.iter().filter(|v| *v / 1000 == p).collect();
            assert!(mine.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
