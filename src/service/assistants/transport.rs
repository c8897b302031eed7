//! Authenticated single-request transport for the Assistants API.

use std::time::Duration;

use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;

use crate::base::types::Res;

/// Beta header value required by the Assistants v2 endpoints.
pub const ASSISTANTS_BETA: &str = "assistants=v2";

/// Executes one request at a time against a fixed base URL.
#[derive(Clone)]
pub struct OpenAiTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiTransport {
    /// Each request is bounded by `timeout`, unless it is zero.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Res<Self> {
        let mut builder = reqwest::Client::builder();
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and return the raw response body.
    ///
    /// Non-2xx responses are errors carrying the server's error message.
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Res<Vec<u8>> {
        let url = format!("{}{path}", self.base_url);
        debug!("{method} {url}");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", ASSISTANTS_BETA);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?.to_vec();

        if !status.is_success() {
            return Err(anyhow::anyhow!("{method} {path} failed with status {status}: {}", error_message(&bytes)));
        }

        Ok(bytes)
    }

    /// Send a request with an optional JSON body and decode the JSON response.
    pub async fn request<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Res<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = body.map(serde_json::to_value).transpose()?;
        let bytes = self.send(method, path, body.as_ref()).await?;

        serde_json::from_slice(&bytes).map_err(|e| anyhow::anyhow!("failed to decode response of {path}: {e}"))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Res<T> {
        self.request::<Value, T>(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Res<T> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// POST without a body (e.g. run cancellation).
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Res<T> {
        self.request::<Value, T>(Method::POST, path, None).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Res<T> {
        self.request::<Value, T>(Method::DELETE, path, None).await
    }
}

/// Pull `error.message` out of an OpenAI error body, or fall back to the raw text.
fn error_message(bytes: &[u8]) -> String {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|value| value.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned())
}

// Tests.
