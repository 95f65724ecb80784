use std::future::Future;

use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::SourceError;
use crate::models::dto::{InterfaceInfo, RecordDTO};

/// Bulk side of the capture backend.
pub trait RecordSource: Send + Sync {
    fn history(&self) -> impl Future<Output = Result<Vec<RecordDTO>, SourceError>> + Send;

    /// Server-side export of everything the backend holds.
    fn export_all(&self) -> impl Future<Output = Result<Vec<u8>, SourceError>> + Send;
}

pub trait CaptureController: Send + Sync {
    fn list_interfaces(&self) -> impl Future<Output = Result<Vec<InterfaceInfo>, SourceError>> + Send;
    fn start_capture(&self, interface: &str) -> impl Future<Output = Result<(), SourceError>> + Send;
    fn stop_capture(&self) -> impl Future<Output = Result<(), SourceError>> + Send;
}

#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<Response, SourceError> {
        let response = self.client.get(self.url(path)).send().await?;
        check_status(path, response)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Response, SourceError> {
        let response = self.client.post(self.url(path)).json(&body).send().await?;
        check_status(path, response)
    }
}

fn check_status(path: &str, response: Response) -> Result<Response, SourceError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(SourceError::Status {
            path: path.to_string(),
            status: response.status().as_u16(),
        })
    }
}

/// Decodes a `/logs` body. Entries that are not objects become empty records
/// so they are rejected one by one instead of sinking the whole batch.
pub fn decode_batch(body: &[u8]) -> Result<Vec<RecordDTO>, SourceError> {
    let values: Vec<Value> = serde_json::from_slice(body)?;
    Ok(values
        .into_iter()
        .map(|value| serde_json::from_value(value).unwrap_or_default())
        .collect())
}

impl RecordSource for HttpSource {
    async fn history(&self) -> Result<Vec<RecordDTO>, SourceError> {
        let body = self.get("/logs").await?.bytes().await?;
        let batch = decode_batch(&body)?;
        debug!(count = batch.len(), "fetched history");
        Ok(batch)
    }

    async fn export_all(&self) -> Result<Vec<u8>, SourceError> {
        let body = self.get("/export").await?.bytes().await?;
        Ok(body.to_vec())
    }
}

impl CaptureController for HttpSource {
    async fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>, SourceError> {
        let body = self.get("/interfaces").await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn start_capture(&self, interface: &str) -> Result<(), SourceError> {
        self.post("/start", json!({ "interface": interface })).await?;
        Ok(())
    }

    async fn stop_capture(&self) -> Result<(), SourceError> {
        self.post("/stop", json!({})).await?;
        Ok(())
    }
}
