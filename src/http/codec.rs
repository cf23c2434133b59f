//! Request body marshaling and response body unmarshaling
//!
//! Callers plug their own formats in by implementing [`Marshaler`] and
//! [`Unmarshaler`]. JSON adapters over serde are provided.

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serializes a request payload
pub trait Marshaler: Send + Sync {
    fn name(&self) -> &str;

    /// Value for the `Content-Type` header
    fn content_type(&self) -> &str;

    fn marshal(&self) -> anyhow::Result<Vec<u8>>;
}

/// Decodes a response body into caller-owned state
pub trait Unmarshaler: Send {
    fn name(&self) -> &str;

    fn unmarshal(&mut self, status: u16, headers: &HeaderMap, body: &[u8]) -> anyhow::Result<()>;
}

/// JSON request body
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize + Send + Sync> Marshaler for Json<T> {
    fn name(&self) -> &str {
        "json"
    }

    fn content_type(&self) -> &str {
        "application/json"
    }

    fn marshal(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.0)?)
    }
}

/// JSON response body
#[derive(Debug, Clone)]
pub struct JsonBody<T> {
    pub value: Option<T>,
}

impl<T> Default for JsonBody<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JsonBody<T> {
    pub fn new() -> Self {
        Self { value: None }
    }

    pub fn into_inner(self) -> Option<T> {
        self.value
    }
}

impl<T: DeserializeOwned + Send> Unmarshaler for JsonBody<T> {
    fn name(&self) -> &str {
        "json"
    }

    fn unmarshal(&mut self, _status: u16, _headers: &HeaderMap, body: &[u8]) -> anyhow::Result<()> {
        self.value = Some(serde_json::from_slice(body)?);
        Ok(())
    }
}
