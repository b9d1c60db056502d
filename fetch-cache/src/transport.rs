//! The network boundary: a transport takes a normalized request and returns
//! the raw response, or a network-level failure.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::str::FromStr;
use surf::http::Method;
use surf::Client;
use utils::surf_logging::SurfLogging;

use crate::descriptor::RequestDescriptor;
use crate::error::FetchError;
use crate::options::ResponseType;
use crate::response::{Response, ResponseData};

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, FetchError>;
}

/// Raw response as handed back by a transport, body not yet read.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn json(&self) -> Result<serde_json::Value, FetchError> {
        serde_json::from_slice(&self.body).map_err(|err| FetchError::Body(err.to_string()))
    }

    pub fn text(&self) -> Result<String, FetchError> {
        String::from_utf8(self.body.clone()).map_err(|err| FetchError::Body(err.to_string()))
    }

    pub fn binary(&self) -> Vec<u8> {
        self.body.clone()
    }

    /// Read the body as the given response type.
    pub fn read(&self, response_type: ResponseType) -> Result<ResponseData, FetchError> {
        Ok(match response_type {
            ResponseType::Json => ResponseData::Json(self.json()?),
            ResponseType::Text => ResponseData::Text(self.text()?),
            ResponseType::Binary => ResponseData::Binary(self.binary()),
        })
    }

    pub fn into_response(self, response_type: ResponseType) -> Result<Response, FetchError> {
        let data = self.read(response_type)?;
        Ok(Response {
            status: self.status,
            status_text: self.status_text,
            url: self.url,
            headers: self.headers,
            data,
        })
    }
}

/// Transport over a surf client.
#[derive(Clone)]
pub struct SurfTransport {
    http: Client,
    base_url: Option<String>,
}

impl Default for SurfTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SurfTransport {
    /// Relative request URLs are resolved against `base_url`.
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            http: Client::new().with(SurfLogging),
            base_url,
        }
    }
}

#[async_trait]
impl Transport for SurfTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, FetchError> {
        let url = utils::base_url::resolve(self.base_url.as_deref(), request.url())
            .map_err(|err| FetchError::Network(format!("invalid url '{}': {}", request.url(), err)))?;
        let method = Method::from_str(request.method())
            .map_err(|err| FetchError::Network(format!("unsupported method '{}': {}", request.method(), err)))?;

        log::trace!(
            "Browser-only options ignored by surf: credentials={} mode={} cache={} referrer={} integrity={}",
            request.credentials(),
            request.mode(),
            request.cache(),
            request.referrer(),
            request.integrity()
        );

        let mut builder = surf::RequestBuilder::new(method, url);
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            if !request.headers().contains_key("content-type") {
                builder = builder.header("content-type", body.content_type());
            }
            builder = builder.body(body.to_bytes());
        }

        let mut response = self
            .http
            .send(builder.build())
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?;

        let status = response.status();
        let headers = response
            .iter()
            .map(|(name, values)| {
                let joined = values.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ");
                (name.as_str().to_lowercase(), joined)
            })
            .collect();
        let body = response
            .body_bytes()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?;

        Ok(TransportResponse {
            status: status.into(),
            status_text: status.canonical_reason().to_string(),
            url: request.url().clone(),
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_is_read_per_response_type() {
        let raw = TransportResponse::new(200, br#"{"id":1}"#.to_vec());
        assert_eq!(
            raw.read(ResponseType::Json).unwrap(),
            ResponseData::Json(serde_json::json!({ "id": 1 }))
        );
        assert_eq!(
            raw.read(ResponseType::Text).unwrap(),
            ResponseData::Text(r#"{"id":1}"#.to_string())
        );
        assert_eq!(
            raw.read(ResponseType::Binary).unwrap(),
            ResponseData::Binary(br#"{"id":1}"#.to_vec())
        );
    }

    #[test]
    fn unparsable_json_is_a_body_error() {
        let raw = TransportResponse::new(500, "internal error");
        assert!(matches!(raw.read(ResponseType::Json), Err(FetchError::Body(_))));
        let response = raw.into_response(ResponseType::Text).unwrap();
        assert_eq!(response.status, 500);
        assert!(!response.ok());
    }
}
