use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::Config;
use crate::error::TransportError;
use crate::util::is_local_endpoint_url;
use anyhow::{anyhow, bail, Context, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use serde_json::json;
use std::path::Path;
use std::pin::Pin;
#[cfg(test)]
use std::sync::Arc;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

const DOCUMENT_FIELD: &str = "file";
const DOCUMENT_MIME: &str = "application/pdf";

#[cfg(test)]
pub trait MockStreamProducer: Send + Sync {
    fn create_mock_stream(&self, question: &str) -> Result<ByteStream>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub file_name: String,
    pub status: u16,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    question_url: String,
    ingest_url: String,
    #[cfg(test)]
    mock_stream_producer: Option<Arc<dyn MockStreamProducer>>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            question_url: config.question_url(),
            ingest_url: config.ingest_url(),
            #[cfg(test)]
            mock_stream_producer: None,
        })
    }

    #[cfg(test)]
    pub fn new_mock(mock_producer: Arc<dyn MockStreamProducer>) -> Self {
        let config = Config::default();
        Self {
            http: reqwest::Client::new(),
            question_url: config.question_url(),
            ingest_url: config.ingest_url(),
            mock_stream_producer: Some(mock_producer),
        }
    }

    pub fn question_url(&self) -> &str {
        &self.question_url
    }

    pub fn ingest_url(&self) -> &str {
        &self.ingest_url
    }

    /// POST `{ "question": ... }` and hand back the NDJSON body as raw chunks.
    pub async fn ask_question_stream(&self, question: &str) -> Result<ByteStream, TransportError> {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                return producer
                    .create_mock_stream(question)
                    .map_err(TransportError::from);
            }
        }

        let request_url = self.question_url.clone();
        let payload = json!({ "question": question });

        if debug_payload_enabled() {
            emit_debug_payload(&request_url, &payload);
        }

        let response = self
            .http
            .post(&request_url)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?;

        let request_url_for_stream = request_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| {
                anyhow::Error::from(map_api_request_error(error, &request_url_for_stream))
            })
        });
        Ok(Box::pin(stream))
    }

    /// Send a PDF to the ingestion endpoint as multipart field `file`.
    pub async fn upload_document(&self, path: &Path) -> Result<UploadReceipt> {
        let file_name = validate_document_path(path)?;
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))?;

        let part = Part::bytes(data)
            .file_name(file_name.clone())
            .mime_str(DOCUMENT_MIME)?;
        let form = Form::new().part(DOCUMENT_FIELD, part);

        let response = self
            .http
            .post(&self.ingest_url)
            .multipart(form)
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &self.ingest_url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("document ingestion failed for '{file_name}': HTTP {status}");
        }

        Ok(UploadReceipt {
            file_name,
            status: status.as_u16(),
        })
    }
}

/// Check that `path` names an existing `.pdf` file and return its file name.
pub fn validate_document_path(path: &Path) -> Result<String> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        bail!("'{}' is not a PDF (expected a .pdf file)", path.display());
    }
    if !path.is_file() {
        bail!("document '{}' not found", path.display());
    }

    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .ok_or_else(|| anyhow!("document path '{}' has no usable file name", path.display()))
}

fn map_api_request_error(error: reqwest::Error, request_url: &str) -> TransportError {
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return TransportError::new(format!(
            "cannot reach local study service '{request_url}': {error}. Start the service or update PADHAI_API_URL."
        ));
    }
    if error.is_connect() {
        return TransportError::new(format!("cannot reach API endpoint '{request_url}': {error}"));
    }
    if error.is_timeout() {
        return TransportError::new(format!("API request to '{request_url}' timed out: {error}"));
    }
    if let Some(status) = error.status() {
        return TransportError::new(format!(
            "API endpoint '{request_url}' returned HTTP {status}"
        ));
    }
    TransportError::new(format!("API request to '{request_url}' failed: {error}"))
}
