use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::cache::CacheConfig;
use crate::deduplication::DeduplicationConfig;
use crate::error::Error;
use crate::options::{FetchPolicy, ResponseType};

pub const ENV_PREFIX: &str = "FETCH_CACHE_";

/// Settings shared by every request made through one [`crate::FetchContext`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relative request URLs are resolved against this by the surf transport.
    pub base_url: Option<String>,
    pub cache: CacheConfig,
    pub deduplication: DeduplicationConfig,
    pub defaults: RequestDefaults,
}

/// Values used when a request leaves them unspecified.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    pub fetch_policy: FetchPolicy,
    pub response_type: ResponseType,
    /// Sent with every request unless the request sets the same header.
    pub headers: BTreeMap<String, String>,
}

impl ClientConfig {
    /// Defaults, then the YAML file, then `FETCH_CACHE_*` environment
    /// variables (`__` separates nested keys).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config = Self::figment()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        log::debug!("Loaded client config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, Error> {
        Ok(Self::figment().merge(Yaml::string(yaml)).extract()?)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(ClientConfig::default()))
    }
}

/// (De)serialize a chrono duration as whole milliseconds.
pub(crate) mod millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        Ok(Duration::milliseconds(millis))
    }
}
