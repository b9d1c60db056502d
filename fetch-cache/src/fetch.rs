//! Subscription contract for consumers of a request: the current
//! [`FetchState`], change notifications, and a manual `fetch`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

use crate::abort::AbortSignal;
use crate::config::RequestDefaults;
use crate::descriptor::{RequestBody, RequestDescriptor};
use crate::error::{Error, FetchError};
use crate::key::RequestKey;
use crate::options::{parse_option, CacheMode, Credentials, FetchPolicy, Redirect, RequestMode, ResponseType};
use crate::orchestrator::{Callbacks, FetchContext, FetchHandle, Settlement};
use crate::response::{Response, ResponseData};

pub const DEFAULT_REQUEST_NAME: &str = "anonymousRequest";

pub type ResponseHook = Arc<dyn Fn(Option<&FetchError>, Option<&Response>) + Send + Sync>;
pub type TransformData = Arc<dyn Fn(ResponseData) -> ResponseData + Send + Sync>;
pub type Listener = Arc<dyn Fn(&FetchState) + Send + Sync>;

/// What a consumer sees of its request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState {
    pub fetching: bool,
    /// Set only for network-level failures, never for HTTP error statuses.
    pub error: Option<FetchError>,
    pub response: Option<Arc<Response>>,
    /// Response data after `transform_data`. Kept across failed refreshes.
    pub data: Option<ResponseData>,
    pub policy: FetchPolicy,
    pub request_name: String,
    pub request_key: Option<RequestKey>,
}

impl FetchState {
    fn initial(policy: FetchPolicy, request_name: String) -> Self {
        Self {
            fetching: false,
            error: None,
            response: None,
            data: None,
            policy,
            request_name,
            request_key: None,
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Everything a consumer can say about its request.
#[derive(Clone)]
pub struct FetchOptions {
    request: RequestDescriptor,
    response_type: Option<ResponseType>,
    fetch_policy: Option<FetchPolicy>,
    lazy: Option<bool>,
    request_name: String,
    on_response: Option<ResponseHook>,
    transform_data: Option<TransformData>,
}

impl FetchOptions {
    pub fn new(request: RequestDescriptor) -> Self {
        Self {
            request,
            response_type: None,
            fetch_policy: None,
            lazy: None,
            request_name: DEFAULT_REQUEST_NAME.to_string(),
            on_response: None,
            transform_data: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(RequestDescriptor::get(url))
    }

    pub fn post(url: impl Into<String>, body: impl Into<RequestBody>) -> Self {
        Self::new(RequestDescriptor::post(url).with_body(body))
    }

    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }

    pub fn map_request<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RequestDescriptor) -> RequestDescriptor,
    {
        self.request = f(self.request);
        self
    }

    pub fn with_fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = Some(policy);
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = Some(lazy);
        self
    }

    pub fn with_request_name(mut self, name: impl Into<String>) -> Self {
        self.request_name = name.into();
        self
    }

    pub fn with_abort_signal(self, signal: AbortSignal) -> Self {
        self.map_request(|request| request.with_abort_signal(signal))
    }

    pub fn on_response<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&FetchError>, Option<&Response>) + Send + Sync + 'static,
    {
        self.on_response = Some(Arc::new(f));
        self
    }

    pub fn transform_data<F>(mut self, f: F) -> Self
    where
        F: Fn(ResponseData) -> ResponseData + Send + Sync + 'static,
    {
        self.transform_data = Some(Arc::new(f));
        self
    }

    /// Set an option by its configuration name, e.g. `("fetchPolicy", "cache-only")`.
    pub fn with_option(self, option: &'static str, value: &str) -> Result<Self, Error> {
        let options = match option {
            "url" => self.map_request(|r| r.with_url(value)),
            "method" => self.map_request(|r| r.with_method(value)),
            "fetchPolicy" => self.with_fetch_policy(parse_option(option, value)?),
            "responseType" => self.with_response_type(parse_option(option, value)?),
            "credentials" => {
                let credentials: Credentials = parse_option(option, value)?;
                self.map_request(|r| r.with_credentials(credentials))
            }
            "mode" => {
                let mode: RequestMode = parse_option(option, value)?;
                self.map_request(|r| r.with_mode(mode))
            }
            "cache" => {
                let cache: CacheMode = parse_option(option, value)?;
                self.map_request(|r| r.with_cache(cache))
            }
            "redirect" => {
                let redirect: Redirect = parse_option(option, value)?;
                self.map_request(|r| r.with_redirect(redirect))
            }
            "referrer" => self.map_request(|r| r.with_referrer(value)),
            "referrerPolicy" => self.map_request(|r| r.with_referrer_policy(value)),
            "integrity" => self.map_request(|r| r.with_integrity(value)),
            "keepalive" => {
                let keepalive = parse_bool(option, value)?;
                self.map_request(|r| r.with_keepalive(keepalive))
            }
            "lazy" => self.with_lazy(parse_bool(option, value)?),
            "requestName" => self.with_request_name(value),
            _ => {
                return Err(Error::InvalidOption {
                    option,
                    value: value.to_string(),
                })
            }
        };
        Ok(options)
    }

    /// Mutating methods wait to be invoked; read methods start on their own.
    pub fn is_lazy(&self) -> bool {
        self.lazy.unwrap_or(!self.request.is_read())
    }

    pub fn fetch_policy(&self, defaults: &RequestDefaults) -> FetchPolicy {
        self.fetch_policy.unwrap_or(defaults.fetch_policy)
    }

    /// The descriptor actually sent: request plus context default headers.
    /// The response type comes from these options, else the context defaults.
    pub fn descriptor(&self, defaults: &RequestDefaults) -> RequestDescriptor {
        let missing: Vec<_> = defaults
            .headers
            .iter()
            .filter(|(name, _)| !self.request.headers().contains_key(&name.to_lowercase()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        self.request
            .clone()
            .with_headers(missing)
            .with_response_type(self.response_type.unwrap_or(defaults.response_type))
    }
}

fn parse_bool(option: &'static str, value: &str) -> Result<bool, Error> {
    value.parse().map_err(|_| Error::InvalidOption {
        option,
        value: value.to_string(),
    })
}

/// The published state together with the invocation allowed to change it.
struct Tracked {
    attempt: u64,
    state: FetchState,
}

struct FetchInner {
    context: FetchContext,
    options: FetchOptions,
    state: watch::Sender<Tracked>,
    listeners: Mutex<Vec<(usize, Listener)>>,
    next_listener: AtomicUsize,
    auto_invoked: AtomicBool,
}

/// A consumer's view of one logical request.
///
/// Read requests are invoked automatically on the first subscription unless
/// the options say `lazy`; any request can be (re-)invoked with
/// [`Fetch::fetch`].
#[derive(Clone)]
pub struct Fetch {
    inner: Arc<FetchInner>,
}

impl Fetch {
    pub fn new(context: &FetchContext, options: FetchOptions) -> Self {
        let policy = options.fetch_policy(&context.config().defaults);
        let (state, _) = watch::channel(Tracked {
            attempt: 0,
            state: FetchState::initial(policy, options.request_name.clone()),
        });
        Self {
            inner: Arc::new(FetchInner {
                context: context.clone(),
                options,
                state,
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicUsize::new(0),
                auto_invoked: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> FetchState {
        self.inner.state.borrow().state.clone()
    }

    pub fn options(&self) -> &FetchOptions {
        &self.inner.options
    }

    /// Register a listener for every state change. The first subscription
    /// triggers the automatic invocation of non-lazy requests.
    pub fn subscribe<F>(&self, listener: F) -> usize
    where
        F: Fn(&FetchState) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));

        if !self.inner.options.is_lazy() && !self.inner.auto_invoked.swap(true, Ordering::SeqCst) {
            self.invoke(self.inner.options.clone(), false);
        }
        id
    }

    pub fn unsubscribe(&self, id: usize) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(listener, _)| *listener != id);
    }

    /// Manually (re-)invoke the request, bypassing cache short-circuits.
    pub fn fetch(&self) -> FetchHandle {
        self.invoke(self.inner.options.clone(), true)
    }

    /// Manually invoke with different options for this invocation only.
    pub fn fetch_with(&self, options: FetchOptions) -> FetchHandle {
        self.invoke(options, true)
    }

    /// Wait until no invocation is fetching and return the state.
    pub async fn settled(&self) -> FetchState {
        let mut receiver = self.inner.state.subscribe();
        let settled = receiver
            .wait_for(|tracked| !tracked.state.fetching)
            .await
            .map(|tracked| tracked.state.clone());
        match settled {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }

    fn invoke(&self, options: FetchOptions, manual: bool) -> FetchHandle {
        let context = &self.inner.context;
        let defaults = &context.config().defaults;
        let descriptor = options.descriptor(defaults);
        let policy = options.fetch_policy(defaults);
        let request_key = context.key_for(&descriptor);

        let mut attempt = 0;
        let snapshot = self.publish(|tracked| {
            tracked.attempt += 1;
            attempt = tracked.attempt;
            tracked.state.policy = policy;
            tracked.state.request_name = options.request_name.clone();
            tracked.state.request_key = Some(request_key);
            true
        });
        if let Some(snapshot) = snapshot {
            self.notify(&snapshot);
        }

        let on_start = {
            let inner = self.inner.clone();
            move || {
                Fetch { inner: inner.clone() }.apply(attempt, |state| state.fetching = true);
            }
        };
        let on_settle = {
            let inner = self.inner.clone();
            let options = options.clone();
            move |settlement: Settlement| {
                Fetch { inner: inner.clone() }.settle(attempt, &options, settlement);
            }
        };

        context.execute_with(
            descriptor,
            policy,
            manual,
            Callbacks::new().on_start(on_start).on_settle(on_settle),
        )
    }

    fn settle(&self, attempt: u64, options: &FetchOptions, settlement: Settlement) {
        let transform = |data: &ResponseData| match &options.transform_data {
            Some(transform) => transform(data.clone()),
            None => data.clone(),
        };

        match &settlement {
            Settlement::Cached(entry) => {
                let response = entry.response().clone();
                self.apply(attempt, |state| {
                    state.fetching = false;
                    state.error = None;
                    state.data = Some(transform(&response.data));
                    state.response = Some(response.clone());
                });
                notify_response(options, None, Some(&*response));
            }
            Settlement::Missed => self.apply(attempt, |state| {
                state.fetching = false;
                state.error = None;
                state.response = None;
                state.data = None;
            }),
            Settlement::Network(Ok(response)) => {
                self.apply(attempt, |state| {
                    state.fetching = false;
                    state.error = None;
                    state.data = Some(transform(&response.data));
                    state.response = Some(response.clone());
                });
                notify_response(options, None, Some(&**response));
            }
            Settlement::Network(Err(err)) => {
                self.apply(attempt, |state| {
                    state.fetching = false;
                    state.error = Some(err.clone());
                    state.response = None;
                });
                notify_response(options, Some(err), None);
            }
        }
    }

    /// Mutate the state on behalf of `attempt` and notify listeners.
    /// Events of superseded attempts are dropped.
    fn apply<F>(&self, attempt: u64, mutate: F)
    where
        F: FnOnce(&mut FetchState),
    {
        let snapshot = self.publish(|tracked| {
            if tracked.attempt != attempt {
                return false;
            }
            mutate(&mut tracked.state);
            true
        });
        match snapshot {
            Some(snapshot) => self.notify(&snapshot),
            None => log::debug!("Ignoring update from superseded attempt {}", attempt),
        }
    }

    /// Run `modify` under the state lock. Returns the new state if it changed.
    fn publish<F>(&self, modify: F) -> Option<FetchState>
    where
        F: FnOnce(&mut Tracked) -> bool,
    {
        let mut snapshot = None;
        self.inner.state.send_if_modified(|tracked| {
            let modified = modify(tracked);
            if modified {
                snapshot = Some(tracked.state.clone());
            }
            modified
        });
        snapshot
    }

    fn notify(&self, snapshot: &FetchState) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }
}

fn notify_response(options: &FetchOptions, error: Option<&FetchError>, response: Option<&Response>) {
    if let Some(on_response) = &options.on_response {
        on_response(error, response);
    }
}

impl FetchContext {
    /// Create the subscription for a request. Nothing is sent until the first
    /// subscription (for non-lazy requests) or an explicit `fetch`.
    pub fn request(&self, options: FetchOptions) -> Fetch {
        Fetch::new(self, options)
    }
}
