//! A deduplicating work queue with per-key exponential backoff.
//!
//! A key is held at most once while it is pending. A key that is added while a worker is
//! processing it is not handed to another worker; it is requeued when the worker calls
//! [`WorkQueue::done`]. This serializes processing per key without coordinating workers.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use parking_lot::Mutex;
use std::{collections::VecDeque, hash::Hash, sync::Arc};
use tokio::{sync::Notify, time};
use tracing::trace;

/// Computes the delay before a failed key is retried.
///
/// The delay doubles with each consecutive failure, starting at `base` and capped at `max`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Backoff {
    pub base: time::Duration,
    pub max: time::Duration,
}

pub struct WorkQueue<K> {
    inner: Arc<Inner<K>>,
}

struct Inner<K> {
    name: &'static str,
    backoff: Backoff,
    state: Mutex<State<K>>,
    notify: Notify,
}

struct State<K> {
    queue: VecDeque<K>,

    /// Keys that need processing, whether queued or waiting on an in-flight pass.
    dirty: HashSet<K>,

    processing: HashSet<K>,

    /// Consecutive failures by key.
    failures: HashMap<K, u32>,

    shutting_down: bool,
}

// === impl Backoff ===

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: time::Duration::from_millis(5),
            max: time::Duration::from_secs(1000),
        }
    }
}

impl Backoff {
    /// The delay for a key that has already failed `failures` times.
    pub fn delay(&self, failures: u32) -> time::Duration {
        2u32.checked_pow(failures)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

// === impl WorkQueue ===

impl<K> Clone for WorkQueue<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K> std::fmt::Debug for WorkQueue<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("name", &self.inner.name)
            .field("backoff", &self.inner.backoff)
            .finish_non_exhaustive()
    }
}

impl<K> WorkQueue<K>
where
    K: Clone + Eq + Hash + std::fmt::Display + Send + 'static,
{
    pub fn new(name: &'static str, backoff: Backoff) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                backoff,
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    failures: HashMap::new(),
                    shutting_down: false,
                }),
                notify: Notify::new(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Marks `key` for processing. Keys that are already pending are not added again, and adds
    /// are ignored once the queue is shutting down.
    pub fn add(&self, key: K) {
        let mut state = self.inner.state.lock();
        if state.shutting_down || state.dirty.contains(&key) {
            return;
        }
        trace!(queue = self.inner.name, %key, "Adding");
        state.dirty.insert(key.clone());
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Adds `key` after a delay that grows with the number of times it has failed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn add_rate_limited(&self, key: K) {
        let delay = {
            let mut state = self.inner.state.lock();
            let failures = state.failures.entry(key.clone()).or_default();
            let delay = self.inner.backoff.delay(*failures);
            *failures = failures.saturating_add(1);
            delay
        };
        trace!(queue = self.inner.name, %key, ?delay, "Requeueing");

        let queue = self.clone();
        tokio::spawn(async move {
            time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Clears the failure history of `key`.
    pub fn forget(&self, key: &K) {
        self.inner.state.lock().failures.remove(key);
    }

    /// The number of consecutive failures recorded for `key`.
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.inner
            .state
            .lock()
            .failures
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Waits for the next key to process.
    ///
    /// Returns `None` once the queue has been shut down and all queued keys have been handed
    /// out. Every key returned must be passed to [`WorkQueue::done`].
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before inspecting the state so that a shutdown is never missed.
            notified.as_mut().enable();

            {
                let mut state = self.inner.state.lock();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks processing of `key` as finished, requeueing it if it was added in the meantime.
    pub fn done(&self, key: &K) {
        let mut state = self.inner.state.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.queue.push_back(key.clone());
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// The number of keys waiting to be handed out.
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops accepting keys and wakes all waiting workers. Keys that are already queued are
    /// still handed out.
    pub fn shut_down(&self) {
        self.inner.state.lock().shutting_down = true;
        self.inner.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.state.lock().shutting_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> WorkQueue<String> {
        WorkQueue::new("test", Backoff::default())
    }

    #[test]
    fn backoff_doubles_up_to_max() {
        let backoff = Backoff {
            base: time::Duration::from_millis(5),
            max: time::Duration::from_millis(30),
        };
        assert_eq!(backoff.delay(0), time::Duration::from_millis(5));
        assert_eq!(backoff.delay(1), time::Duration::from_millis(10));
        assert_eq!(backoff.delay(2), time::Duration::from_millis(20));
        assert_eq!(backoff.delay(3), time::Duration::from_millis(30));
        assert_eq!(backoff.delay(64), time::Duration::from_millis(30));
    }

    #[tokio::test]
    async fn deduplicates_pending_keys() {
        let q = queue();
        q.add("a".to_string());
        q.add("b".to_string());
        q.add("a".to_string());
        assert_eq!(q.len(), 2);

        assert_eq!(q.get().await.as_deref(), Some("a"));
        assert_eq!(q.get().await.as_deref(), Some("b"));
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn in_flight_keys_are_requeued_on_done() {
        let q = queue();
        q.add("a".to_string());
        let key = q.get().await.unwrap();

        // Not handed out again while it is being processed.
        q.add("a".to_string());
        q.add("a".to_string());
        assert!(q.is_empty());

        q.done(&key);
        assert_eq!(q.len(), 1);
        let key = q.get().await.unwrap();
        q.done(&key);
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn get_waits_for_add() {
        let q = queue();
        let worker = tokio::spawn({
            let q = q.clone();
            async move { q.get().await }
        });
        tokio::task::yield_now().await;
        q.add("a".to_string());
        assert_eq!(worker.await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn shutdown_drains_queued_keys() {
        let q = queue();
        q.add("a".to_string());
        q.shut_down();
        q.add("b".to_string());

        assert_eq!(q.get().await.as_deref(), Some("a"));
        assert_eq!(q.get().await, None);
    }

    #[tokio::test]
    async fn shutdown_wakes_idle_workers() {
        let q = queue();
        let worker = tokio::spawn({
            let q = q.clone();
            async move { q.get().await }
        });
        tokio::task::yield_now().await;
        q.shut_down();
        assert_eq!(worker.await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_adds_back_off() {
        let q = queue();
        let key = "a".to_string();

        for (failures, delay) in [(0, 5), (1, 10), (2, 20)] {
            assert_eq!(q.num_requeues(&key), failures);
            let start = time::Instant::now();
            q.add_rate_limited(key.clone());
            let next = q.get().await.unwrap();
            assert_eq!(start.elapsed(), time::Duration::from_millis(delay));
            q.done(&next);
        }

        q.forget(&key);
        assert_eq!(q.num_requeues(&key), 0);
        let start = time::Instant::now();
        q.add_rate_limited(key.clone());
        q.get().await.unwrap();
        assert_eq!(start.elapsed(), time::Duration::from_millis(5));
    }
}
