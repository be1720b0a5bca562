//! Typed calls on top of a [`Transport`].

use serde_json::Value;
use std::sync::Arc;

use super::{parse_row_count, parse_rows, PushMessage, SheetError, SheetRequest, Transport, DATA_TYPE_ALL};

#[derive(Clone)]
pub struct SheetClient {
    transport: Arc<dyn Transport>,
}

impl SheetClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Cheap probe: how many rows the sheet currently has.
    pub async fn row_count(&self) -> Result<u64, SheetError> {
        let response = self.send(&SheetRequest::row_count()).await?;
        parse_row_count(&response)
    }

    /// Fetch every row.
    pub async fn fetch_rows(&self) -> Result<Vec<Vec<Value>>, SheetError> {
        let response = self.send(&SheetRequest::sync_read()).await?;
        parse_rows(&response, DATA_TYPE_ALL)
    }

    /// Deliver one outbound change.
    pub async fn push(&self, message: &PushMessage) -> Result<(), SheetError> {
        let payload =
            serde_json::to_value(message).map_err(|e| SheetError::Protocol(e.to_string()))?;
        let response = self.transport.call(&payload).await?;
        if response.get("success").and_then(Value::as_bool) == Some(false) {
            let reason = response
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("push rejected");
            return Err(SheetError::Rejected(reason.to_string()));
        }
        Ok(())
    }

    async fn send(&self, request: &SheetRequest) -> Result<Value, SheetError> {
        let payload =
            serde_json::to_value(request).map_err(|e| SheetError::Protocol(e.to_string()))?;
        self.transport.call(&payload).await
    }
}

impl std::fmt::Debug for SheetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetClient")
            .field("transport", &self.transport.name())
            .finish()
    }
}
