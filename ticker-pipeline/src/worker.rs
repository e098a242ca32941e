//! Bounded worker pool: `worker_count` lanes pull from a shared ticker queue
//! concurrently while the phase that spawned them awaits completion as a
//! whole (spec.md §5, SPEC_FULL.md §5.1).
//!
//! Grounded on `borsa::core::fetch_single_latency`'s `FuturesUnordered`-based
//! fan-out, generalized into a pull-based lane model: each lane checks the
//! global deadline right before claiming its next item, rather than all
//! items being pre-enqueued up front, so a deadline that fires partway
//! through a phase defers only whatever wasn't claimed yet.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;

/// Result of running a bounded pool of per-item units of work.
pub struct PoolOutcome<I, O> {
    pub completed: Vec<O>,
    /// Items that were never claimed (global deadline already passed) or
    /// whose work exceeded the per-phase backpressure threshold.
    pub deferred: Vec<I>,
    /// True once any item was deferred due to the global deadline.
    pub hit_deadline: bool,
}

/// Run `work` over `items` with at most `worker_count` concurrent lanes,
/// each pulling its next item from a shared queue. An item whose work takes
/// longer than `defer_threshold` is abandoned and reported back via
/// `deferred` rather than awaited forever. A lane checks `deadline` before
/// claiming each item: once it has passed, every item still in the queue is
/// deferred without starting, while lanes already mid-item are left to
/// finish.
pub async fn run_bounded<I, O, F, Fut>(
    items: Vec<I>,
    worker_count: usize,
    defer_threshold: Duration,
    deadline: Instant,
    work: F,
) -> PoolOutcome<I, O>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
{
    let queue = Arc::new(Mutex::new(VecDeque::from(items)));
    let work = Arc::new(work);
    let completed = Arc::new(Mutex::new(Vec::new()));
    let deferred = Arc::new(Mutex::new(Vec::new()));
    let hit_deadline = Arc::new(AtomicBool::new(false));

    let mut lanes = FuturesUnordered::new();
    for _ in 0..worker_count.max(1) {
        let queue = Arc::clone(&queue);
        let work = Arc::clone(&work);
        let completed = Arc::clone(&completed);
        let deferred = Arc::clone(&deferred);
        let hit_deadline = Arc::clone(&hit_deadline);

        lanes.push(async move {
            loop {
                let Some(item) = queue.lock().expect("worker queue mutex poisoned").pop_front() else {
                    break;
                };

                if Instant::now() >= deadline {
                    hit_deadline.store(true, Ordering::SeqCst);
                    deferred.lock().expect("deferred list mutex poisoned").push(item);
                    continue;
                }

                let item_for_defer = item.clone();
                match tokio::time::timeout(defer_threshold, work(item)).await {
                    Ok(out) => completed.lock().expect("completed list mutex poisoned").push(out),
                    Err(_) => deferred.lock().expect("deferred list mutex poisoned").push(item_for_defer),
                }
            }
        });
    }

    while lanes.next().await.is_some() {}

    PoolOutcome {
        completed: Arc::try_unwrap(completed).expect("no lane still holds a reference").into_inner().expect("mutex poisoned"),
        deferred: Arc::try_unwrap(deferred).expect("no lane still holds a reference").into_inner().expect("mutex poisoned"),
        hit_deadline: hit_deadline.load(Ordering::SeqCst),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn processes_every_item_under_no_pressure() {
        let items: Vec<u32> = (0..20).collect();
        let outcome = run_bounded(
            items,
            4,
            Duration::from_secs(5),
            Instant::now() + Duration::from_secs(5),
            |i| async move { i * 2 },
        )
        .await;
        assert_eq!(outcome.completed.len(), 20);
        assert!(outcome.deferred.is_empty());
        assert!(!outcome.hit_deadline);
    }

    #[tokio::test]
    async fn caps_concurrency_at_worker_count() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let items: Vec<u32> = (0..10).collect();
        let a = Arc::clone(&active);
        let m = Arc::clone(&max_seen);
        let outcome = run_bounded(
            items,
            3,
            Duration::from_secs(5),
            Instant::now() + Duration::from_secs(5),
            move |_| {
                let a = Arc::clone(&a);
                let m = Arc::clone(&m);
                async move {
                    let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                    m.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    a.fetch_sub(1, Ordering::SeqCst);
                }
            },
        )
        .await;
        assert_eq!(outcome.completed.len(), 10);
        assert!(max_seen.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn defers_items_past_the_backpressure_threshold() {
        let items = vec![1u32];
        let outcome = run_bounded(
            items,
            1,
            Duration::from_millis(10),
            Instant::now() + Duration::from_secs(5),
            |i| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                i
            },
        )
        .await;
        assert!(outcome.completed.is_empty());
        assert_eq!(outcome.deferred, vec![1]);
    }

    #[tokio::test]
    async fn defers_unstarted_items_once_deadline_has_passed() {
        let items = vec![1u32, 2, 3];
        let outcome = run_bounded(items, 1, Duration::from_secs(5), Instant::now(), |i| async move { i }).await;
        assert!(outcome.hit_deadline);
        assert_eq!(outcome.deferred.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn defers_only_items_unclaimed_when_deadline_fires_mid_phase() {
        let items: Vec<u32> = (0..40).collect();
        let deadline = Instant::now() + Duration::from_millis(105);
        let outcome = run_bounded(items, 4, Duration::from_secs(5), deadline, |i| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            i
        })
        .await;
        assert!(outcome.hit_deadline);
        assert!(!outcome.completed.is_empty());
        assert!(!outcome.deferred.is_empty());
        assert_eq!(outcome.completed.len() + outcome.deferred.len(), 40);
    }
}
