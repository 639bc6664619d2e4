use crate::engine::UploadService;
use crate::error::{UploadError, GENERIC_SERVICE_ERROR};
use crate::model::{ClientConfig, Dimensions, UploadOutcome, UploadRequest, UploadSuccess};
use crate::validate::MAX_UPLOAD_BYTES;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde_json::Value;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

/// HTTP client for the upscaling service.
#[derive(Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    base_url: String,
}

impl UploadClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.clone(),
        })
    }

    pub fn upload_url(&self) -> String {
        join_base(&self.base_url, "/upload")
    }

    /// Send one upload and map the reply. No retry is attempted.
    pub async fn try_submit(&self, req: &UploadRequest) -> Result<UploadSuccess, UploadError> {
        let file = &req.file;
        let bytes = file
            .payload()
            .load(MAX_UPLOAD_BYTES)
            .await
            .map_err(|source| UploadError::Payload {
                name: file.name().to_string(),
                source,
            })?;

        let len = bytes.len() as u64;
        if len > MAX_UPLOAD_BYTES {
            return Err(UploadError::GrewTooLarge {
                name: file.name().to_string(),
            });
        }
        let part = Part::stream_with_length(bytes, len)
            .file_name(file.name().to_string())
            .mime_str(file.mime_type())?;
        let form = Form::new()
            .part("file", part)
            .text("scale_factor", req.scale_factor.as_form_value());

        let url = self.upload_url();
        debug!(%url, bytes = len, scale = %req.scale_factor, "posting upload");
        let resp = self.http.post(&url).multipart(form).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        // The service reports its own failures as JSON with a 4xx/5xx status, so the
        // body is parsed regardless of status.
        let value: Value = serde_json::from_slice(&body)?;
        if !status.is_success() {
            debug!(%status, "service answered with error status");
        }

        map_response(&value, &self.base_url)
    }

    /// Stream `url` into `dest`, returning the number of bytes written.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("download request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("download from {url} was rejected"))?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("failed to create {}", dest.display()))?;
        let mut written = 0u64;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("download interrupted")?;
            file.write_all(&chunk)
                .await
                .with_context(|| format!("failed to write {}", dest.display()))?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl UploadService for UploadClient {
    async fn submit(&self, request: UploadRequest) -> UploadOutcome {
        match self.try_submit(&request).await {
            Ok(success) => {
                info!(
                    file = request.file.name(),
                    upscaled = %success.upscaled_dimensions,
                    "upload processed"
                );
                UploadOutcome::Success(success)
            }
            Err(e) => {
                match e.kind() {
                    crate::error::UploadErrorKind::Transport => {
                        error!(error = ?e, "upload transport failure");
                    }
                    _ => warn!(error = %e, "upload failed"),
                }
                UploadOutcome::failure(e.to_string())
            }
        }
    }
}

/// Map a parsed service reply into a success payload or a typed failure.
///
/// A reply counts as failed when `success` is not `true` or an `error` field is
/// present. A success reply missing any required field is rejected rather than
/// rendered with holes.
pub fn map_response(value: &Value, base_url: &str) -> Result<UploadSuccess, UploadError> {
    let declared_success = value.get("success").and_then(Value::as_bool) == Some(true);
    let error = value.get("error").filter(|v| !v.is_null());
    if !declared_success || error.is_some() {
        let message = error
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(GENERIC_SERVICE_ERROR);
        return Err(UploadError::Rejected {
            message: message.to_string(),
        });
    }

    Ok(UploadSuccess {
        original_url: resolve_media_url(base_url, required_str(value, "original_url")?),
        upscaled_url: resolve_media_url(base_url, required_str(value, "upscaled_url")?),
        download_url: resolve_media_url(base_url, required_str(value, "download_url")?),
        original_dimensions: required_dimensions(value, "original_dimensions")?,
        upscaled_dimensions: required_dimensions(value, "upscaled_dimensions")?,
        original_size_bytes: required_u64(value, "original_size")?,
        upscaled_size_bytes: required_u64(value, "upscaled_size")?,
        scale_factor: required_number(value, "scale_factor")?,
    })
}

fn required_str<'a>(value: &'a Value, field: &'static str) -> Result<&'a str, UploadError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(UploadError::MalformedResponse { field })
}

fn required_u64(value: &Value, field: &'static str) -> Result<u64, UploadError> {
    value
        .get(field)
        .and_then(Value::as_u64)
        .ok_or(UploadError::MalformedResponse { field })
}

fn required_number(value: &Value, field: &'static str) -> Result<f64, UploadError> {
    let v = value.get(field);
    v.and_then(Value::as_f64)
        .or_else(|| v.and_then(Value::as_str).and_then(|s| s.trim().parse().ok()))
        .filter(|f: &f64| f.is_finite())
        .ok_or(UploadError::MalformedResponse { field })
}

fn required_dimensions(value: &Value, field: &'static str) -> Result<Dimensions, UploadError> {
    value
        .get(field)
        .cloned()
        .and_then(|v| serde_json::from_value::<Dimensions>(v).ok())
        .ok_or(UploadError::MalformedResponse { field })
}

/// Resolve a media reference returned by the service. Absolute URLs pass through;
/// anything else is appended to the base URL.
pub fn resolve_media_url(base_url: &str, reference: &str) -> String {
    if Url::parse(reference).is_ok() {
        reference.to_string()
    } else {
        join_base(base_url, reference)
    }
}

fn join_base(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
