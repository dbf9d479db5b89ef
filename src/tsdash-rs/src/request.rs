//! Generic request description shared by every Typesense operation.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tsdash_core::config::RequestConfig;

use crate::{ClientError, Result};

// Same set as JavaScript's encodeURIComponent
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Timeout and retry policy for upstream calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        RequestOptions::from(&RequestConfig::default())
    }
}

impl From<&RequestConfig> for RequestOptions {
    fn from(config: &RequestConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        }
    }
}

impl RequestOptions {
    /// Delay before retry number `attempt + 1` (exponential)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Newline-delimited JSON, sent as `text/plain`
    Text(String),
}

/// One call against the Typesense REST API
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: Vec<String>,
    pub query: Vec<(&'static str, String)>,
    pub body: RequestBody,
    /// Safe to resend after a transport failure
    pub idempotent: bool,
}

impl ApiRequest {
    pub fn new<S: AsRef<str>>(method: Method, path: &[S]) -> Self {
        let idempotent = method != Method::POST;
        Self {
            method,
            path: path.iter().map(|s| s.as_ref().to_string()).collect(),
            query: Vec::new(),
            body: RequestBody::Empty,
            idempotent,
        }
    }

    pub fn get<S: AsRef<str>>(path: &[S]) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post<S: AsRef<str>>(path: &[S]) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch<S: AsRef<str>>(path: &[S]) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete<S: AsRef<str>>(path: &[S]) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn queries(mut self, pairs: Vec<(&'static str, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn text(mut self, body: String) -> Self {
        self.body = RequestBody::Text(body);
        self
    }

    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// Resolve against `base_url`, encoding every path segment and query value
    pub fn url(&self, base_url: &str) -> Result<Url> {
        let mut url = Url::parse(base_url).map_err(|e| ClientError::Url(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(format!("{} cannot be a base URL", base_url)))?
            .pop_if_empty()
            .extend(&self.path);

        if !self.query.is_empty() {
            let query = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", k, utf8_percent_encode(v, COMPONENT)))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }
        Ok(url)
    }
}
