//! Remote processing: one multipart upload to the remove.bg API.
//!
//! [`BackgroundRemover`] is the seam between the session and the network.
//! [`RemoveBgClient`] is the production implementation; tests swap in a
//! scripted fake. Whatever goes wrong inside `submit` comes back as a
//! [`ProcessingError`]; nothing else escapes this module.
//!
//! ## At-most-once
//!
//! The client never retries. Background removal is billed per call, and a
//! retry is the user's decision (`Session::retry`), not the transport's.

use crate::config::RemovalConfig;
use crate::error::{BgRemoveError, ProcessingError, Rejection};
use crate::media::{ImageData, ImageFile};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Notified while a submission is in flight.
pub trait UploadProgress: Send + Sync {
    /// The upload finished and the service has answered with a status line.
    fn on_request_sent(&self) {}
}

/// Ignores all progress events.
pub struct NoProgress;

impl UploadProgress for NoProgress {}

/// Removes the background of one image.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    async fn submit(
        &self,
        file: &ImageFile,
        progress: &dyn UploadProgress,
    ) -> Result<ImageData, ProcessingError>;
}

/// remove.bg HTTP client.
pub struct RemoveBgClient {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    output_size: String,
    timeout_secs: u64,
}

impl RemoveBgClient {
    /// Build a client from `config`.
    ///
    /// A missing API key is not an error here. It fails each submission
    /// with [`ProcessingError::Configuration`] instead.
    pub fn new(config: &RemovalConfig) -> Result<Self, BgRemoveError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| BgRemoveError::HttpClient(e.to_string()))?;
        Ok(Self {
            http,
            api_key: config.api_key().map(str::to_string),
            endpoint: config.endpoint.clone(),
            output_size: config.output_size.clone(),
            timeout_secs: config.api_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn network_error(&self, e: reqwest::Error) -> ProcessingError {
        if e.is_timeout() {
            ProcessingError::Network {
                message: format!("request timed out after {}s", self.timeout_secs),
                source: Box::new(e),
            }
        } else {
            ProcessingError::network(e)
        }
    }
}

#[async_trait]
impl BackgroundRemover for RemoveBgClient {
    async fn submit(
        &self,
        file: &ImageFile,
        progress: &dyn UploadProgress,
    ) -> Result<ImageData, ProcessingError> {
        // Checked before building the request so no half-started upload exists.
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("Submission of '{}' refused: no API key configured", file.name);
            return Err(ProcessingError::Configuration);
        };

        // Bytes are shared with the caller, not copied into the body.
        let part = Part::stream_with_length(file.data.bytes.clone(), file.size())
            .file_name(file.name.clone())
            .mime_str(file.mime_type())
            .map_err(|_| {
                ProcessingError::InvalidInput(Rejection::InvalidType {
                    mime: file.mime_type().to_string(),
                })
            })?;
        let form = Form::new()
            .part("image_file", part)
            .text("size", self.output_size.clone());

        let start = Instant::now();
        info!("Uploading '{}' ({} bytes) to {}", file.name, file.size(), self.endpoint);

        let response = self
            .http
            .post(&self.endpoint)
            .header("X-Api-Key", api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        progress.on_request_sent();
        let status = response.status();

        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let message = server_error_message(status.as_u16(), &body);
            warn!("'{}': HTTP {}: {}", file.name, status.as_u16(), message);
            return Err(ProcessingError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|m| m.starts_with("image/"))
            .unwrap_or_else(|| "image/png".to_string());

        let bytes = response.bytes().await.map_err(|e| self.network_error(e))?;
        debug!(
            "'{}': {} bytes of {} in {:?}",
            file.name,
            bytes.len(),
            mime,
            start.elapsed()
        );

        Ok(ImageData::new(bytes, mime))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorItem {
    title: Option<String>,
}

/// Message for a non-2xx response: the first error `title` in the JSON
/// body, or `API Error: {status}` when there is none.
pub fn server_error_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.errors.into_iter().next())
        .and_then(|e| e.title)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("API Error: {status}"))
}
