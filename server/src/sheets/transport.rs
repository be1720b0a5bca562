//! Transports to the spreadsheet script endpoint.
//!
//! [`DirectTransport`] POSTs JSON. [`CallbackTransport`] uses the
//! script-callback style GET (`?callback=<name>&payload=<json>`) whose body
//! comes back wrapped as `<name>(<json>)`; some script hosts only allow that
//! form from a browser-like client. [`FallbackTransport`] tries one, then the
//! other. Every call is bounded by a timeout.

use async_trait::async_trait;
use serde_json::Value;
use std::{sync::Arc, time::Duration};

use super::SheetError;

/// Name of the callback used by [`CallbackTransport`].
pub const CALLBACK_NAME: &str = "custodyCallback";

/// One way of sending a JSON request and getting a JSON response back.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn call(&self, payload: &Value) -> Result<Value, SheetError>;
}

/// JSON POST.
#[derive(Debug, Clone)]
pub struct DirectTransport {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl DirectTransport {
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Transport for DirectTransport {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn call(&self, payload: &Value) -> Result<Value, SheetError> {
        let request = self.client.post(&self.url).json(payload).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| SheetError::Timeout(self.timeout))??;

        let status = response.status();
        if !status.is_success() {
            return Err(SheetError::Status(status.as_u16()));
        }

        let body = tokio::time::timeout(self.timeout, response.text())
            .await
            .map_err(|_| SheetError::Timeout(self.timeout))??;
        serde_json::from_str(&body).map_err(|e| SheetError::Protocol(e.to_string()))
    }
}

/// Script-callback GET.
#[derive(Debug, Clone)]
pub struct CallbackTransport {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    callback: String,
}

impl CallbackTransport {
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
            callback: CALLBACK_NAME.to_string(),
        }
    }

    /// Request URL carrying the payload as a query parameter.
    pub fn request_url(&self, payload: &Value) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}callback={}&payload={}",
            self.url,
            separator,
            urlencoding::encode(&self.callback),
            urlencoding::encode(&payload.to_string())
        )
    }
}

#[async_trait]
impl Transport for CallbackTransport {
    fn name(&self) -> &'static str {
        "callback"
    }

    async fn call(&self, payload: &Value) -> Result<Value, SheetError> {
        let request = self.client.get(self.request_url(payload)).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| SheetError::Timeout(self.timeout))??;

        let status = response.status();
        if !status.is_success() {
            return Err(SheetError::Status(status.as_u16()));
        }

        let body = tokio::time::timeout(self.timeout, response.text())
            .await
            .map_err(|_| SheetError::Timeout(self.timeout))??;
        unwrap_callback(&body, &self.callback)
    }
}

/// Strip `<name>(...)` (optionally followed by `;`) and parse the JSON inside.
pub fn unwrap_callback(body: &str, callback: &str) -> Result<Value, SheetError> {
    let inner = body
        .trim()
        .strip_prefix(callback)
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('('))
        .map(|rest| rest.trim_end().trim_end_matches(';').trim_end())
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| SheetError::Protocol("response is not wrapped in the callback".into()))?;

    serde_json::from_str(inner).map_err(|e| SheetError::Protocol(e.to_string()))
}

/// Try `primary`; if it fails for any reason, try `secondary` with the same
/// payload.
pub struct FallbackTransport {
    primary: Arc<dyn Transport>,
    secondary: Arc<dyn Transport>,
}

impl FallbackTransport {
    pub fn new(primary: Arc<dyn Transport>, secondary: Arc<dyn Transport>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl Transport for FallbackTransport {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn call(&self, payload: &Value) -> Result<Value, SheetError> {
        match self.primary.call(payload).await {
            Ok(value) => Ok(value),
            Err(first) => {
                tracing::debug!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    "primary transport failed, falling back: {}",
                    first
                );
                self.secondary.call(payload).await
            }
        }
    }
}

/// The standard stack: direct POST with callback fallback.
pub fn default_transport(url: &str, timeout: Duration) -> Result<Arc<dyn Transport>, SheetError> {
    let client = reqwest::Client::builder().build()?;
    let direct = Arc::new(DirectTransport::new(client.clone(), url, timeout));
    let callback = Arc::new(CallbackTransport::new(client, url, timeout));
    Ok(Arc::new(FallbackTransport::new(direct, callback)))
}
