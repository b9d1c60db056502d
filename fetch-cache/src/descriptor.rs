use getset::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::abort::AbortSignal;
use crate::options::{CacheMode, Credentials, Redirect, RequestMode, ResponseType};

pub const DEFAULT_REFERRER: &str = "about:client";

/// Request payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestBody {
    Json(serde_json::Value),
    Text(String),
    Binary(Vec<u8>),
}

impl RequestBody {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            RequestBody::Json(value) => value.to_string().into_bytes(),
            RequestBody::Text(text) => text.clone().into_bytes(),
            RequestBody::Binary(bytes) => bytes.clone(),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            RequestBody::Json(_) => "application/json",
            RequestBody::Text(_) => "text/plain;charset=UTF-8",
            RequestBody::Binary(_) => "application/octet-stream",
        }
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

/// An immutable description of one HTTP request.
///
/// The method is normalized to upper case and header names to lower case on
/// construction. The abort signal and `keepalive` travel with the request but
/// are not part of its identity (see [`crate::key::derive_key`]).
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct RequestDescriptor {
    method: String,
    url: String,
    body: Option<RequestBody>,
    headers: BTreeMap<String, String>,
    credentials: Credentials,
    mode: RequestMode,
    cache: CacheMode,
    redirect: Redirect,
    referrer: String,
    referrer_policy: String,
    integrity: String,
    keepalive: bool,
    response_type: ResponseType,
    abort_signal: Option<AbortSignal>,
}

impl RequestDescriptor {
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            method: method.to_uppercase(),
            url: url.into(),
            body: None,
            headers: BTreeMap::new(),
            credentials: Credentials::default(),
            mode: RequestMode::default(),
            cache: CacheMode::default(),
            redirect: Redirect::default(),
            referrer: DEFAULT_REFERRER.to_string(),
            referrer_policy: String::new(),
            integrity: String::new(),
            keepalive: false,
            response_type: ResponseType::default(),
            abort_signal: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    /// Safe methods only read; they are the ones invoked without being asked.
    pub fn is_read(&self) -> bool {
        is_read_method(&self.method)
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_uppercase();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.headers.insert(name.as_ref().to_lowercase(), value.into());
        }
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_redirect(mut self, redirect: Redirect) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = referrer.into();
        self
    }

    pub fn with_referrer_policy(mut self, referrer_policy: impl Into<String>) -> Self {
        self.referrer_policy = referrer_policy.into();
        self
    }

    pub fn with_integrity(mut self, integrity: impl Into<String>) -> Self {
        self.integrity = integrity.into();
        self
    }

    pub fn with_keepalive(mut self, keepalive: bool) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort_signal = Some(signal);
        self
    }
}

pub fn is_read_method(method: &str) -> bool {
    matches!(method.to_uppercase().as_str(), "GET" | "HEAD" | "OPTIONS")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_and_header_names_are_normalized() {
        let descriptor = RequestDescriptor::new("post", "/posts").with_header("Content-Type", "text/plain");
        assert_eq!(descriptor.method(), "POST");
        assert_eq!(
            descriptor.headers().get("content-type").map(String::as_str),
            Some("text/plain")
        );
    }

    #[test]
    fn fetch_defaults() {
        let descriptor = RequestDescriptor::get("/posts/1");
        assert_eq!(descriptor.referrer(), DEFAULT_REFERRER);
        assert_eq!(descriptor.referrer_policy(), "");
        assert_eq!(descriptor.integrity(), "");
        assert_eq!(*descriptor.credentials(), Credentials::SameOrigin);
        assert_eq!(*descriptor.response_type(), ResponseType::Json);
        assert!(!descriptor.keepalive());
    }

    #[test]
    fn read_methods() {
        assert!(RequestDescriptor::get("/").is_read());
        assert!(RequestDescriptor::new("head", "/").is_read());
        assert!(RequestDescriptor::new("OPTIONS", "/").is_read());
        assert!(!RequestDescriptor::post("/").is_read());
        assert!(!RequestDescriptor::new("delete", "/").is_read());
    }

    #[test]
    fn json_body_declares_content_type() {
        let body = RequestBody::from(serde_json::json!({ "title": "x" }));
        assert_eq!(body.content_type(), "application/json");
        assert_eq!(body.to_bytes(), br#"{"title":"x"}"#.to_vec());
    }
}
