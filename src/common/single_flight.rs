use crate::common::{RouteError, RouteResult};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

type Outcome<V> = Option<RouteResult<V>>;

/// Registry of in-flight computations keyed by `K`.
///
/// The first caller for a key becomes the leader and runs the computation;
/// callers arriving while it runs subscribe to the leader's outcome instead of
/// starting their own. Outcomes are not retained: once the leader finishes the
/// key is free again, so a failed computation is retried by the next caller.
/// If the leader is cancelled, waiters wake up and one of them takes over.
pub struct SingleFlight<K, V> {
    flights: Mutex<HashMap<K, watch::Receiver<Outcome<V>>>>,
}

enum Role<V> {
    Leader(watch::Sender<Outcome<V>>),
    Follower(watch::Receiver<Outcome<V>>),
}

/// Releases the key when the leader finishes or is dropped mid-flight.
struct FlightGuard<'a, K: Eq + Hash, V> {
    flights: &'a Mutex<HashMap<K, watch::Receiver<Outcome<V>>>>,
    key: K,
}

impl<K: Eq + Hash, V> Drop for FlightGuard<'_, K, V> {
    fn drop(&mut self) {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self { flights: Mutex::new(HashMap::new()) }
    }

    /// Number of keys currently being computed.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Runs `compute` unless a computation for `key` is already in flight, in
    /// which case the caller waits for and shares that computation's outcome.
    pub async fn run<F, Fut>(&self, key: K, compute: F) -> RouteResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RouteResult<V>>,
    {
        let sender = loop {
            match self.join(&key) {
                Role::Leader(sender) => break sender,
                Role::Follower(mut receiver) => {
                    let outcome = match receiver.wait_for(Option::is_some).await {
                        Ok(outcome) => outcome.clone(),
                        // leader dropped before finishing
                        Err(_) => None,
                    };
                    if let Some(outcome) = outcome {
                        return outcome;
                    }
                }
            }
        };

        let guard = FlightGuard { flights: &self.flights, key };
        let outcome = compute().await;
        drop(guard);
        sender.send_replace(Some(outcome.clone()));
        outcome
    }

    fn join(&self, key: &K) -> Role<V> {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(receiver) = flights.get(key) {
            return Role::Follower(receiver.clone());
        }
        let (sender, receiver) = watch::channel(None);
        flights.insert(key.clone(), receiver);
        Role::Leader(sender)
    }
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

/// Converts a join failure of a blocking task into a route error.
pub fn join_error(e: tokio::task::JoinError) -> RouteError {
    if e.is_cancelled() {
        RouteError::Cancelled
    } else {
        RouteError::Storage(format!("worker task panicked: {}", e))
    }
}
