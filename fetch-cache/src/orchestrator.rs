//! Request orchestration: decide between cache and network for one
//! invocation, deduplicate network calls and fan their outcome out.

use std::sync::Arc;
use tokio::sync::oneshot;

use crate::cache::{CacheEntry, ResponseCache};
use crate::config::ClientConfig;
use crate::deduplication::{InFlightRegistry, Outcome, Registration};
use crate::descriptor::RequestDescriptor;
use crate::error::FetchError;
use crate::key::{derive_key, RequestKey};
use crate::options::FetchPolicy;
use crate::policy::{self, Decision};
use crate::transport::{SurfTransport, Transport};

/// One event delivered to `on_settle`.
#[derive(Debug, Clone)]
pub enum Settlement {
    /// Served from the response cache.
    Cached(CacheEntry),
    /// Cache-only policy found nothing. Not an error.
    Missed,
    /// A network call finished, successfully or not.
    Network(Outcome),
}

type StartCallback = Arc<dyn Fn() + Send + Sync>;
type SettleCallback = Arc<dyn Fn(Settlement) + Send + Sync>;

/// Observers of a single invocation.
#[derive(Clone, Default)]
pub struct Callbacks {
    on_start: Option<StartCallback>,
    on_settle: Option<SettleCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(f));
        self
    }

    pub fn on_settle<F>(mut self, f: F) -> Self
    where
        F: Fn(Settlement) + Send + Sync + 'static,
    {
        self.on_settle = Some(Arc::new(f));
        self
    }

    fn start(&self) {
        if let Some(on_start) = &self.on_start {
            on_start();
        }
    }

    fn settle(&self, settlement: Settlement) {
        if let Some(on_settle) = &self.on_settle {
            on_settle(settlement);
        }
    }
}

/// Result of [`FetchContext::execute`].
pub struct FetchHandle {
    key: RequestKey,
    decision: Decision,
    registration: Option<Registration>,
    settled: Option<oneshot::Receiver<Outcome>>,
}

impl FetchHandle {
    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// `None` when the invocation never touched the network.
    pub fn registration(&self) -> Option<Registration> {
        self.registration
    }

    /// Wait for the network outcome this invocation subscribed to.
    /// `None` if it made no network call or the call was dropped unsettled.
    pub async fn settled(self) -> Option<Outcome> {
        match self.settled {
            Some(receiver) => receiver.await.ok(),
            None => None,
        }
    }
}

struct ContextInner {
    cache: ResponseCache,
    registry: InFlightRegistry,
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

/// Owns the response cache and in-flight registry for one scope.
///
/// Everything made from the same context (or its clones) shares cache and
/// deduplication; separate contexts never see each other's state.
///
/// Network calls are spawned onto the current Tokio runtime, so any
/// invocation that reaches the network must happen inside one; outside a
/// runtime it panics. Cache-only deliveries need no runtime.
#[derive(Clone)]
pub struct FetchContext {
    inner: Arc<ContextInner>,
}

impl FetchContext {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        log::info!(
            "Initialized fetch context (cache enabled: {}, deduplication enabled: {})",
            config.cache.enabled,
            config.deduplication.enabled
        );
        Self {
            inner: Arc::new(ContextInner {
                cache: ResponseCache::new(config.cache.clone()),
                registry: InFlightRegistry::new(config.deduplication.clone()),
                transport,
                config,
            }),
        }
    }

    /// A context talking HTTP through surf.
    pub fn with_surf(config: ClientConfig) -> Self {
        let transport = SurfTransport::new(config.base_url.clone());
        Self::new(config, Arc::new(transport))
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    pub fn registry(&self) -> &InFlightRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn key_for(&self, descriptor: &RequestDescriptor) -> RequestKey {
        derive_key(descriptor)
    }

    /// Run one invocation of `descriptor` under `policy`.
    ///
    /// # Panics
    ///
    /// If the decision requires a network call and no Tokio runtime is
    /// running on this thread.
    pub fn execute(&self, descriptor: RequestDescriptor, policy: FetchPolicy, callbacks: Callbacks) -> FetchHandle {
        self.execute_with(descriptor, policy, false, callbacks)
    }

    /// Like [`FetchContext::execute`]; a `manual` invocation skips the cache
    /// short-circuit and always goes to the network, still deduplicated.
    pub fn execute_with(
        &self,
        descriptor: RequestDescriptor,
        policy: FetchPolicy,
        manual: bool,
        callbacks: Callbacks,
    ) -> FetchHandle {
        let key = derive_key(&descriptor);
        let cached = if manual || policy == FetchPolicy::NetworkOnly {
            None
        } else {
            self.inner.cache.read(&key)
        };
        let decision = policy::resolve(policy, cached.is_some(), manual);

        if decision.read_cache {
            if let Some(entry) = cached {
                callbacks.settle(Settlement::Cached(entry));
            }
        }
        if decision.cache_miss {
            log::debug!("No cached data for cache-only request: {}", key);
            callbacks.settle(Settlement::Missed);
        }
        if !decision.network {
            return FetchHandle {
                key,
                decision,
                registration: None,
                settled: None,
            };
        }

        callbacks.start();
        let (sender, receiver) = oneshot::channel();
        let subscriber = Box::new(move |outcome: &Outcome| {
            callbacks.settle(Settlement::Network(outcome.clone()));
            let _ = sender.send(outcome.clone());
        });

        let inner = self.inner.clone();
        let call_key = key.clone();
        let registration = self.inner.registry.join_or_register(key.clone(), subscriber, move || {
            network_call(inner, call_key, descriptor, policy)
        });

        FetchHandle {
            key,
            decision,
            registration: Some(registration),
            settled: Some(receiver),
        }
    }
}

async fn network_call(
    inner: Arc<ContextInner>,
    key: RequestKey,
    descriptor: RequestDescriptor,
    policy: FetchPolicy,
) -> Outcome {
    let raw = match descriptor.abort_signal() {
        Some(signal) => {
            tokio::select! {
                biased;
                _ = signal.aborted() => Err(FetchError::Aborted),
                raw = inner.transport.send(&descriptor) => raw,
            }
        }
        None => inner.transport.send(&descriptor).await,
    };

    let outcome = raw
        .and_then(|raw| raw.into_response(*descriptor.response_type()))
        .map(Arc::new);

    match &outcome {
        Ok(response) => {
            if policy::writes_cache(policy) {
                inner.cache.write(key, response.clone());
            }
        }
        Err(err) if err.is_abort() => log::debug!("Request aborted for key: {}", key),
        Err(err) => log::warn!("Request failed for key {}: {}", key, err),
    }

    outcome
}
