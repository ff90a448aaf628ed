//! Bounded fan-out of lazily produced tasks.
//!
//! A producer pulls tasks from the input sequence only when a worker slot can
//! take one, a fixed set of workers runs them, and every result travels back
//! over a second channel to the single consumer that drives `on_complete`.

use std::future::Future;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, debug_span, Instrument};

/// Default number of tasks allowed in flight.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Runs tasks with a fixed concurrency ceiling.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    concurrency: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl Dispatcher {
    /// A ceiling of zero is treated as one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every task from `tasks`, at most `concurrency` at a time.
    ///
    /// Tasks are started in sequence order and complete in any order;
    /// `on_complete` sees each output as soon as it is ready. Resolves once
    /// the sequence is exhausted and every task has finished, returning the
    /// number of completed tasks.
    pub async fn run<I, T, Fut, C>(&self, tasks: I, mut on_complete: C) -> usize
    where
        I: IntoIterator<Item = T>,
        T: FnOnce() -> Fut,
        Fut: Future,
        C: FnMut(Fut::Output),
    {
        // A single pending slot keeps the producer at most one task ahead.
        let (job_tx, job_rx) = mpsc::channel::<T>(1);
        let job_rx = Mutex::new(job_rx);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Fut::Output>();

        let tasks = tasks.into_iter();
        let producer = async move {
            let mut produced = 0usize;
            for task in tasks {
                if job_tx.send(task).await.is_err() {
                    break;
                }
                produced += 1;
            }
            debug!(produced, "task sequence exhausted");
        };

        let job_rx = &job_rx;
        let workers = join_all((0..self.concurrency).map(|worker| {
            let done_tx = done_tx.clone();
            async move {
                loop {
                    let next = job_rx.lock().await.recv().await;
                    let Some(task) = next else {
                        break;
                    };
                    if done_tx.send(task().await).is_err() {
                        break;
                    }
                }
            }
            .instrument(debug_span!("dispatch_worker", worker))
        }));
        drop(done_tx);

        let consumer = async {
            let mut completed = 0usize;
            while let Some(output) = done_rx.recv().await {
                on_complete(output);
                completed += 1;
            }
            completed
        };

        let ((), _workers, completed) = tokio::join!(producer, workers, consumer);
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_sequence_returns_immediately() {
        let mut seen = 0;
        let tasks: Vec<fn() -> std::future::Ready<()>> = Vec::new();
        let completed = Dispatcher::new(4).run(tasks, |_| seen += 1).await;
        assert_eq!(completed, 0);
        assert_eq!(seen, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_never_exceeds_ceiling() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let tasks = (0..50u64).map(|i| {
            let in_flight = &in_flight;
            let peak = &peak;
            move || async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10 + (i * 7) % 13)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                i
            }
        });

        let mut outputs = Vec::new();
        let completed = Dispatcher::new(3).run(tasks, |i| outputs.push(i)).await;

        assert_eq!(completed, 50);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        outputs.sort_unstable();
        assert_eq!(outputs, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_is_pulled_lazily() {
        let pulled = AtomicUsize::new(0);
        let started = AtomicUsize::new(0);
        let max_lead = AtomicUsize::new(0);

        let tasks = (0..20).map(|_| {
            let n = pulled.fetch_add(1, Ordering::SeqCst) + 1;
            let lead = n.saturating_sub(started.load(Ordering::SeqCst));
            max_lead.fetch_max(lead, Ordering::SeqCst);
            let started = &started;
            move || async move {
                started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        Dispatcher::new(2).run(tasks, |_| {}).await;
        assert_eq!(pulled.load(Ordering::SeqCst), 20);
        // Pulled tasks are either running, in the single pending slot, or in
        // the producer's hand.
        assert!(max_lead.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_order_is_first_ready_first() {
        let order = RefCell::new(Vec::new());
        let delays = [30u64, 1, 15];
        let tasks = delays.iter().enumerate().map(|(i, &ms)| {
            move || async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                i
            }
        });

        Dispatcher::new(3)
            .run(tasks, |i| order.borrow_mut().push(i))
            .await;
        assert_eq!(order.into_inner(), vec![1, 2, 0]);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        assert_eq!(Dispatcher::new(0).concurrency(), 1);
        assert_eq!(Dispatcher::default().concurrency(), DEFAULT_CONCURRENCY);
    }
}
