pub mod abort;
pub mod cache;
mod compose;
pub mod config;
pub mod deduplication;
mod descriptor;
mod error;
mod fetch;
pub mod key;
mod options;
mod orchestrator;
pub mod policy;
mod response;
pub mod transport;

#[cfg(test)]
mod testing;

pub use abort::{AbortController, AbortSignal};
pub use cache::{CacheConfig, CacheEntry, CacheStats, ResponseCache};
pub use compose::FetchAll;
pub use config::{ClientConfig, RequestDefaults};
pub use deduplication::{
    DeduplicationConfig, DeduplicationStats, InFlightEntry, InFlightRegistry, Outcome, Registration, Subscriber,
};
pub use descriptor::{is_read_method, RequestBody, RequestDescriptor, DEFAULT_REFERRER};
pub use error::{Error, FetchError};
pub use fetch::{Fetch, FetchOptions, FetchState, DEFAULT_REQUEST_NAME};
pub use key::{derive_key, RequestKey};
pub use options::{CacheMode, Credentials, FetchPolicy, Redirect, RequestMode, ResponseType};
pub use orchestrator::{Callbacks, FetchContext, FetchHandle, Settlement};
pub use response::{Response, ResponseData};
pub use transport::{SurfTransport, Transport, TransportResponse};
