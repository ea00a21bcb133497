//! Keyed single-flight with success caching.
//!
//! [`FlightMap::run`] guarantees that, for a given key, at most one
//! operation is in flight at a time and that a successful result is
//! computed once and then served from memory:
//!
//! - no entry: start the operation and record it as in flight
//! - in flight: await the same shared operation
//! - ready: return the cached value without awaiting anything
//!
//! A failed operation clears its entry, so a later call starts over.
//!
//! The map lock is only held for synchronous lookups and inserts, never
//! across an `.await`. Each operation is driven to completion by a spawned
//! tokio task, and waiters await a [`Shared`] clone of it. Dropping every
//! waiter therefore never cancels the operation; its result still settles
//! the entry. `run` must be called from within a tokio runtime.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::trace;

type Flight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

enum Slot<T, E> {
    InFlight { id: u64, flight: Flight<T, E> },
    Ready(T),
}

/// A map of keyed operations, each started at most once per key at a time.
pub struct FlightMap<T, E> {
    slots: Arc<DashMap<String, Slot<T, E>>>,
    next_id: AtomicU64,
}

impl<T, E> FlightMap<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Run `start` for `key` unless it is already running or has succeeded.
    ///
    /// `start` is only invoked when no entry exists for `key`.
    ///
    /// # Errors
    ///
    /// Returns the error of the shared operation. Every waiter of that
    /// operation observes the same error.
    pub async fn run<F, Fut>(&self, key: &str, start: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let flight = match self.slots.entry(key.to_owned()) {
            Entry::Occupied(occupied) => match occupied.get() {
                Slot::Ready(value) => {
                    trace!(key, "flight cache hit");
                    return Ok(value.clone());
                },
                Slot::InFlight { flight, .. } => {
                    trace!(key, "joining in-flight operation");
                    flight.clone()
                },
            },
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let flight = Self::settle(Arc::clone(&self.slots), key.to_owned(), id, start());
                vacant.insert(Slot::InFlight {
                    id,
                    flight: flight.clone(),
                });
                tokio::spawn(flight.clone().map(drop));
                trace!(key, id, "started operation");
                flight
            },
        };

        flight.await
    }

    /// Wrap `operation` so that its completion updates the entry it was
    /// registered under, provided the entry still belongs to this flight.
    fn settle<Fut>(
        slots: Arc<DashMap<String, Slot<T, E>>>,
        key: String,
        id: u64,
        operation: Fut,
    ) -> Flight<T, E>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        async move {
            let result = operation.await;
            match &result {
                Ok(value) => {
                    if let Some(mut slot) = slots.get_mut(&key)
                        && matches!(&*slot, Slot::InFlight { id: current, .. } if *current == id)
                    {
                        *slot = Slot::Ready(value.clone());
                    }
                },
                Err(_) => {
                    slots.remove_if(&key, |_, slot| {
                        matches!(slot, Slot::InFlight { id: current, .. } if *current == id)
                    });
                },
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Cached value for `key`, if its operation has succeeded.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<T> {
        self.slots.get(key).and_then(|slot| match &*slot {
            Slot::Ready(value) => Some(value.clone()),
            Slot::InFlight { .. } => None,
        })
    }

    /// Whether an operation for `key` is currently in flight.
    #[must_use]
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| matches!(&*slot, Slot::InFlight { .. }))
    }

    /// Number of cached successes.
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Ready(_)))
            .count()
    }

    /// Drop every entry. Flights already running finish but are not cached.
    pub fn clear(&self) {
        self.slots.clear();
    }
}

impl<T, E> Default for FlightMap<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for FlightMap<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightMap")
            .field("entries", &self.slots.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn concurrent_callers_share_one_operation() {
        let map: Arc<FlightMap<u32, String>> = Arc::new(FlightMap::new());
        let starts = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let map = Arc::clone(&map);
            let starts = Arc::clone(&starts);
            handles.push(tokio::spawn(async move {
                map.run("k", || {
                    starts.fetch_add(1, Ordering::SeqCst);
                    async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(42)
                    }
                })
                .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(map.get("k"), Some(42));
    }

    #[tokio::test]
    async fn success_is_cached() {
        let map: FlightMap<&'static str, String> = FlightMap::new();
        assert_eq!(map.run("k", || async { Ok("first") }).await, Ok("first"));
        assert_eq!(map.run("k", || async { Ok("second") }).await, Ok("first"));
        assert_eq!(map.ready_count(), 1);
    }

    #[tokio::test]
    async fn failure_clears_entry_for_next_caller() {
        let map: FlightMap<u32, String> = FlightMap::new();
        let err = map.run("k", || async { Err("nope".to_string()) }).await;
        assert_eq!(err, Err("nope".to_string()));
        assert!(!map.is_in_flight("k"));
        assert_eq!(map.get("k"), None);

        assert_eq!(map.run("k", || async { Ok(1) }).await, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_waiter_does_not_cancel_flight() {
        let map: Arc<FlightMap<u32, String>> = Arc::new(FlightMap::new());
        let starts = Arc::new(AtomicU32::new(0));

        let waiter = {
            let map = Arc::clone(&map);
            let starts = Arc::clone(&starts);
            async move {
                map.run("k", || {
                    starts.fetch_add(1, Ordering::SeqCst);
                    async {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(9)
                    }
                })
                .await
            }
        };
        let timed_out = tokio::time::timeout(Duration::from_millis(5), waiter).await;
        assert!(timed_out.is_err());
        assert!(map.is_in_flight("k"));

        // Nobody is waiting, yet the operation still completes and settles.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!map.is_in_flight("k"));
        assert_eq!(map.get("k"), Some(9));

        let value = map.run("k", || async { Ok(0) }).await;
        assert_eq!(value, Ok(9));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_forgets_cached_values() {
        let map: FlightMap<u32, String> = FlightMap::new();
        map.run("k", || async { Ok(1) }).await.unwrap();
        map.clear();
        assert_eq!(map.run("k", || async { Ok(2) }).await, Ok(2));
    }
}
