use std::fmt;
use std::sync::Arc;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};

use crate::error::ConfigError;

/// Produces a fresh request body for every request built from a descriptor.
pub type BodyFactory = Arc<dyn Fn() -> Vec<u8> + Send + Sync>;

/// A fully formed, reusable description of one HTTP request.
///
/// Cloning is cheap. The probe and every chunk worker derive their own
/// request from a clone, so nothing here is consumed by sending.
#[derive(Clone)]
pub struct RequestDescriptor {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<BodyFactory>,
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("body", &self.body.as_ref().map(|_| "<factory>"))
            .finish()
    }
}

impl RequestDescriptor {
    pub fn new(method: Method, url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(url.trim()).map_err(|source| ConfigError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Ok(Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        })
    }

    pub fn get(url: &str) -> Result<Self, ConfigError> {
        Self::new(Method::GET, url)
    }

    /// Sets a header, replacing any previous value with the same name.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidHeader {
            name: name.to_string(),
        };
        let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value.trim()).map_err(|_| invalid())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a cookie; all cookies share one `Cookie` header.
    pub fn cookie(mut self, name: &str, value: &str) -> Result<Self, ConfigError> {
        let pair = format!("{}={}", name.trim(), value.trim());
        let merged = match self.headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.is_empty() => format!("{existing}; {pair}"),
            _ => pair,
        };
        let value = HeaderValue::from_str(&merged).map_err(|_| ConfigError::InvalidHeader {
            name: COOKIE.to_string(),
        })?;
        self.headers.insert(COOKIE, value);
        Ok(self)
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }

    pub fn body_bytes(self, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Arc<[u8]> = Arc::from(bytes.into());
        self.body_with(move || bytes.to_vec())
    }

    pub fn body_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Vec<u8> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(factory));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Builds a request with this descriptor's method.
    pub(crate) fn build(&self, client: &Client) -> RequestBuilder {
        self.build_with_method(client, self.method.clone())
    }

    /// Builds a request with the method overridden, keeping URL, headers
    /// and body.
    pub(crate) fn build_with_method(&self, client: &Client, method: Method) -> RequestBuilder {
        let mut builder = client
            .request(method, self.url.clone())
            .headers(self.headers.clone());
        if let Some(factory) = &self.body {
            builder = builder.body(factory());
        }
        builder
    }
}
