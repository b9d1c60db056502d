//! Enumerated request options, named the way the fetch API names them.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::Error;

/// Strategy governing the interplay between cached data and network calls.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FetchPolicy {
    #[default]
    CacheFirst,
    CacheAndNetwork,
    NetworkOnly,
    CacheOnly,
}

/// How the response body is read.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ResponseType {
    #[default]
    Json,
    Text,
    Binary,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Credentials {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RequestMode {
    #[default]
    Cors,
    NoCors,
    SameOrigin,
    Navigate,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CacheMode {
    #[default]
    Default,
    NoStore,
    Reload,
    NoCache,
    ForceCache,
    OnlyIfCached,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Redirect {
    #[default]
    Follow,
    Error,
    Manual,
}

/// Parse one of the option enums, reporting the option name on failure.
pub fn parse_option<T: FromStr>(option: &'static str, value: &str) -> Result<T, Error> {
    T::from_str(value).map_err(|_| Error::InvalidOption {
        option,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_use_kebab_case_names() {
        assert_eq!(FetchPolicy::CacheAndNetwork.to_string(), "cache-and-network");
        assert_eq!(
            parse_option::<FetchPolicy>("fetchPolicy", "network-only").unwrap(),
            FetchPolicy::NetworkOnly
        );
        assert_eq!(FetchPolicy::default(), FetchPolicy::CacheFirst);
    }

    #[test]
    fn unknown_option_value_is_rejected() {
        let err = parse_option::<ResponseType>("responseType", "xml").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidOption { option: "responseType", ref value } if value == "xml"
        ));
    }

    #[test]
    fn serde_and_strum_agree() {
        let json = serde_json::to_string(&CacheMode::OnlyIfCached).unwrap();
        assert_eq!(json, "\"only-if-cached\"");
        assert_eq!(AsRef::<str>::as_ref(&CacheMode::OnlyIfCached), "only-if-cached");
    }
}
