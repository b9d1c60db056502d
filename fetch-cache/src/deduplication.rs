use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::Future;
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, FetchError};
use crate::key::RequestKey;
use crate::response::Response;

/// What every subscriber of a network attempt receives, shared by reference.
pub type Outcome = Result<Arc<Response>, FetchError>;

/// Callback invoked once with the outcome of the attempt it subscribed to.
pub type Subscriber = Box<dyn FnOnce(&Outcome) + Send + Sync>;

/// Configuration for request deduplication
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeduplicationConfig {
    /// Upper bound for a single transport call
    #[serde(with = "crate::config::millis")]
    pub request_timeout: Duration,
    /// Whether deduplication is enabled
    pub enabled: bool,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::seconds(30),
            enabled: true,
        }
    }
}

struct PendingRequest {
    id: u64,
    started_at: DateTime<Utc>,
    subscribers: Vec<Subscriber>,
}

/// Snapshot of a request currently on the network
#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct InFlightEntry {
    key: RequestKey,
    started_at: DateTime<Utc>,
    subscribers: usize,
}

/// How a caller ended up attached to a network attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new transport call was started for the key.
    Started,
    /// The key was already in flight; the caller joined that call.
    Joined,
}

/// Registry of in-flight requests.
///
/// At most one transport call runs per key. Identical requests arriving while
/// a call is pending subscribe to it and receive the same outcome. The entry
/// is removed before its subscribers are notified, so a request made after
/// settlement always starts a fresh call.
#[derive(Clone)]
pub struct InFlightRegistry {
    pending: Arc<DashMap<RequestKey, PendingRequest>>,
    next_id: Arc<AtomicU64>,
    config: DeduplicationConfig,
}

impl Default for InFlightRegistry {
    fn default() -> Self {
        Self::new(DeduplicationConfig::default())
    }
}

impl InFlightRegistry {
    pub fn new(config: DeduplicationConfig) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    pub fn config(&self) -> &DeduplicationConfig {
        &self.config
    }

    pub fn get(&self, key: &RequestKey) -> Option<InFlightEntry> {
        self.pending.get(key).map(|pending| InFlightEntry {
            key: key.clone(),
            started_at: pending.started_at,
            subscribers: pending.subscribers.len(),
        })
    }

    pub fn is_in_flight(&self, key: &RequestKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Start `call` for a key that has no pending request.
    /// Registering a key twice is a caller bug and fails.
    pub fn register<F>(&self, key: RequestKey, call: F) -> Result<InFlightEntry, Error>
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let id = self.next_id();
        let started_at = match self.pending.entry(key.clone()) {
            Entry::Occupied(_) => return Err(Error::AlreadyInFlight(key)),
            Entry::Vacant(vacant) => {
                let started_at = Utc::now();
                vacant.insert(PendingRequest {
                    id,
                    started_at,
                    subscribers: Vec::new(),
                });
                started_at
            }
        };

        log::debug!("Executing new request for key: {}", key);
        self.spawn(key.clone(), id, call);

        Ok(InFlightEntry {
            key,
            started_at,
            subscribers: 0,
        })
    }

    /// Attach to the pending request for `key`. Fails if nothing is pending.
    pub fn subscribe(&self, key: &RequestKey, subscriber: Subscriber) -> Result<(), Error> {
        match self.pending.get_mut(key) {
            Some(mut pending) => {
                pending.subscribers.push(subscriber);
                Ok(())
            }
            None => Err(Error::NotInFlight(key.clone())),
        }
    }

    /// Join the pending request for `key`, or start `make_call` if there is
    /// none. Check and insert happen under the same map entry, so two callers
    /// can never both start a call for one key.
    pub fn join_or_register<C, F>(&self, key: RequestKey, subscriber: Subscriber, make_call: C) -> Registration
    where
        C: FnOnce() -> F,
        F: Future<Output = Outcome> + Send + 'static,
    {
        if !self.config.enabled {
            let call = make_call();
            let limit = self.config.request_timeout;
            tokio::spawn(async move {
                let outcome = with_timeout(limit, call).await;
                subscriber(&outcome);
            });
            return Registration::Started;
        }

        match self.pending.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                log::debug!("Request already pending for key: {}", key);
                occupied.get_mut().subscribers.push(subscriber);
                Registration::Joined
            }
            Entry::Vacant(vacant) => {
                let id = self.next_id();
                vacant.insert(PendingRequest {
                    id,
                    started_at: Utc::now(),
                    subscribers: vec![subscriber],
                });
                log::debug!("Executing new request for key: {}", key);
                self.spawn(key, id, make_call());
                Registration::Started
            }
        }
    }

    /// Remove the entry for `key` and hand `outcome` to each of its
    /// subscribers in subscription order. Returns how many were notified.
    pub fn resolve(&self, key: &RequestKey, outcome: Outcome) -> usize {
        let Some((_, pending)) = self.pending.remove(key) else {
            log::debug!("Nothing in flight to resolve for key: {}", key);
            return 0;
        };
        notify(key, pending, &outcome)
    }

    /// Like `resolve`, but only if the entry still belongs to call `id`.
    /// A call whose entry was cleared must not settle a newer call for the key.
    fn resolve_call(&self, key: &RequestKey, id: u64, outcome: Outcome) -> usize {
        match self.pending.remove_if(key, |_, pending| pending.id == id) {
            Some((_, pending)) => notify(key, pending, &outcome),
            None => {
                log::debug!("Call {} for key {} is no longer in flight", id, key);
                0
            }
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn spawn<F>(&self, key: RequestKey, id: u64, call: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let registry = self.clone();
        let limit = self.config.request_timeout;
        tokio::spawn(async move {
            let outcome = with_timeout(limit, call).await;
            registry.resolve_call(&key, id, outcome);
        });
    }

    /// Get statistics about pending requests
    pub fn stats(&self) -> DeduplicationStats {
        let pending_count = self.pending.len();
        let total_waiters = self
            .pending
            .iter()
            .map(|entry| entry.value().subscribers.len())
            .sum();

        DeduplicationStats {
            pending_requests: pending_count,
            total_waiters,
        }
    }

    /// Forget every pending request. Their subscribers settle with
    /// `FetchError::Aborted`; the calls themselves finish unobserved.
    pub fn clear(&self) -> usize {
        let keys: Vec<RequestKey> = self.pending.iter().map(|entry| entry.key().clone()).collect();
        let aborted: Outcome = Err(FetchError::Aborted);
        let notified = keys
            .iter()
            .filter_map(|key| self.pending.remove(key))
            .map(|(key, pending)| notify(&key, pending, &aborted))
            .sum();
        log::info!("In-flight registry cleared");
        notified
    }
}

fn notify(key: &RequestKey, pending: PendingRequest, outcome: &Outcome) -> usize {
    let waiters = pending.subscribers.len();
    log::debug!("Notifying {} waiters for key: {}", waiters, key);
    for subscriber in pending.subscribers {
        subscriber(outcome);
    }
    waiters
}

async fn with_timeout<F>(limit: Duration, call: F) -> Outcome
where
    F: Future<Output = Outcome>,
{
    match limit.to_std() {
        Ok(limit) => match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome,
            Err(_) => {
                log::warn!("Request timed out after {:?}", limit);
                Err(FetchError::Timeout)
            }
        },
        Err(_) => call.await,
    }
}

/// Statistics for request deduplication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeduplicationStats {
    pub pending_requests: usize,
    pub total_waiters: usize,
}
