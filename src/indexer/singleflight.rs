//! Per-key de-duplication of concurrent computations.
//!
//! Concurrent `index` calls for the same digest must collapse into a single
//! backend computation. The first caller for a key becomes the leader and
//! runs the computation; followers await the shared result on a watch
//! channel. The leader holds a guard that frees the slot whether it finishes
//! or is cancelled mid-flight, so a cancelled leader never deadlocks the
//! followers: the next waiter retries and becomes the new leader.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::watch;

type FlightMap<K, V> = Arc<Mutex<HashMap<K, watch::Receiver<Option<V>>>>>;

/// In-flight registry mapping keys to pending shared results.
#[derive(Debug)]
pub struct SingleFlight<K, V> {
    inflight: FlightMap<K, V>,
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of computations currently in flight.
    pub fn len(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Whether no computation is in flight.
    pub fn is_empty(&self) -> bool {
        self.inflight.lock().is_empty()
    }

    /// Run `make` for `key`, sharing one execution among concurrent callers.
    ///
    /// All callers observe the same value, success or failure. `make` is
    /// invoked at most once per call to `run`, and only if this caller ends
    /// up leading the flight.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let mut make = Some(make);
        loop {
            let role = {
                let mut map = self.inflight.lock();
                match map.get(&key) {
                    Some(rx) => Role::Follower(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        map.insert(key.clone(), rx);
                        Role::Leader(tx)
                    }
                }
            };

            match role {
                Role::Leader(tx) => {
                    // Freed on drop, including cancellation at an await point.
                    let _slot = SlotGuard {
                        map: Arc::clone(&self.inflight),
                        key: Some(key.clone()),
                    };
                    let make = make.take().expect("leader elected twice");
                    let value = make().await;
                    let _ = tx.send(Some(value.clone()));
                    return value;
                }
                Role::Follower(mut rx) => {
                    loop {
                        if let Some(value) = rx.borrow_and_update().clone() {
                            return value;
                        }
                        if rx.changed().await.is_err() {
                            // Leader cancelled without a result; contend for
                            // the slot again.
                            break;
                        }
                    }
                }
            }
        }
    }
}

enum Role<V> {
    Leader(watch::Sender<Option<V>>),
    Follower(watch::Receiver<Option<V>>),
}

struct SlotGuard<K: Eq + Hash, V> {
    map: FlightMap<K, V>,
    key: Option<K>,
}

impl<K: Eq + Hash, V> Drop for SlotGuard<K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.map.lock().remove(&key);
        }
    }
}
