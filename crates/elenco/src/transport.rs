//! REST plumbing: where a set lives and how requests reach it.

use reqwest::{Client, Method, Response};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::TransportError;
use crate::resource::ResourceId;

pub type Query = Vec<(String, String)>;

/// Base URL of a collection plus query parameters sent with every list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    static_query: Query,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            static_query: Vec::new(),
        }
    }

    /// Add a parameter such as `course_id` to every list request.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.static_query.push((key.into(), value.into()));
        self
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    pub fn item_url(&self, id: &ResourceId) -> String {
        format!("{}/{}", self.base_url, id)
    }

    pub fn static_query(&self) -> &[(String, String)] {
        &self.static_query
    }
}

/// The four REST calls a set makes.
pub trait Transport: Send + Sync {
    fn list(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;

    fn create(&self, url: &str, body: &Value) -> impl Future<Output = Result<Value, TransportError>> + Send;

    fn update(&self, url: &str, body: &Value) -> impl Future<Output = Result<Value, TransportError>> + Send;

    fn delete(&self, url: &str) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMethod {
    #[default]
    Put,
    Patch,
}

impl std::str::FromStr for UpdateMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "put" => Ok(UpdateMethod::Put),
            "patch" => Ok(UpdateMethod::Patch),
            other => Err(format!("unknown update method: {other}")),
        }
    }
}

/// JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    update_method: UpdateMethod,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            update_method: UpdateMethod::Put,
        }
    }

    pub fn update_method(mut self, method: UpdateMethod) -> Self {
        self.update_method = method;
        self
    }
}

impl Transport for HttpTransport {
    async fn list(&self, url: &str, query: &[(String, String)]) -> Result<Value, TransportError> {
        debug!(url, params = query.len(), "GET");
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;
        read_json(response).await
    }

    async fn create(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        debug!(url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        read_json(response).await
    }

    async fn update(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        let method = match self.update_method {
            UpdateMethod::Put => Method::PUT,
            UpdateMethod::Patch => Method::PATCH,
        };
        debug!(url, method = %method, "Update");
        let response = self.client.request(method, url).json(body).send().await?;
        read_json(response).await
    }

    async fn delete(&self, url: &str) -> Result<(), TransportError> {
        debug!(url, "DELETE");
        let response = self.client.delete(url).send().await?;
        read_json(response).await.map(|_| ())
    }
}

/// Decode a response body. Empty bodies read as `null`.
///
/// Error statuses keep the server payload: parsed JSON when it is JSON,
/// otherwise the raw text as a JSON string.
async fn read_json(response: Response) -> Result<Value, TransportError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        return Err(TransportError::Status {
            status: status.as_u16(),
            body,
        });
    }

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
}
