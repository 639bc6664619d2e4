use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub scale_factor: ScaleFactor,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub progress_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub teardown_delay: Duration,
    pub user_agent: String,
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
}

/// Upscaling factor offered to the user. Sent to the service as `"2"` / `"4"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum ScaleFactor {
    #[default]
    #[value(name = "2")]
    X2,
    #[value(name = "4")]
    X4,
}

impl ScaleFactor {
    pub fn as_u8(self) -> u8 {
        match self {
            ScaleFactor::X2 => 2,
            ScaleFactor::X4 => 4,
        }
    }

    /// Value of the `scale_factor` multipart field.
    pub fn as_form_value(self) -> &'static str {
        match self {
            ScaleFactor::X2 => "2",
            ScaleFactor::X4 => "4",
        }
    }

    /// Cycle to the next allowed factor (used by interactive front-ends).
    pub fn next(self) -> Self {
        match self {
            ScaleFactor::X2 => ScaleFactor::X4,
            ScaleFactor::X4 => ScaleFactor::X2,
        }
    }
}

impl From<ScaleFactor> for u8 {
    fn from(value: ScaleFactor) -> Self {
        value.as_u8()
    }
}

impl TryFrom<u8> for ScaleFactor {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(ScaleFactor::X2),
            4 => Ok(ScaleFactor::X4),
            other => Err(format!("unsupported scale factor {other}; expected 2 or 4")),
        }
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.as_u8())
    }
}

/// Handle to the bytes of a chosen file.
///
/// Files picked from disk are read lazily when the upload is built, so a rejected
/// selection never loads its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePayload {
    Memory(Bytes),
    Path(PathBuf),
}

impl FilePayload {
    /// Read the content, stopping one byte past `limit`.
    ///
    /// A result longer than `limit` means the file grew past it since selection.
    pub async fn load(&self, limit: u64) -> std::io::Result<Bytes> {
        match self {
            FilePayload::Memory(bytes) => Ok(bytes.clone()),
            FilePayload::Path(path) => {
                let file = tokio::fs::File::open(path).await?;
                let mut buf = Vec::new();
                file.take(limit.saturating_add(1))
                    .read_to_end(&mut buf)
                    .await?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

/// A candidate file as declared by the user's selection, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFileDescriptor {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub payload: FilePayload,
}

impl RawFileDescriptor {
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes: bytes.len() as u64,
            payload: FilePayload::Memory(bytes),
        }
    }

    /// Describe a file on disk. The MIME type is guessed from the extension only.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        Ok(Self {
            name,
            mime_type,
            size_bytes: metadata.len(),
            payload: FilePayload::Path(path.to_path_buf()),
        })
    }
}

/// A file that passed validation. Only `validate::validate` constructs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub(crate) name: String,
    pub(crate) mime_type: String,
    pub(crate) size_bytes: u64,
    pub(crate) payload: FilePayload,
}

impl SelectedFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn payload(&self) -> &FilePayload {
        &self.payload
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub file: SelectedFile,
    pub scale_factor: ScaleFactor,
}

/// Pixel dimensions, carried on the wire as `[width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl From<Dimensions> for (u32, u32) {
    fn from(d: Dimensions) -> Self {
        (d.width, d.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} × {}", self.width, self.height)
    }
}

/// Fully populated success payload. Media URLs are absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSuccess {
    pub original_url: String,
    pub upscaled_url: String,
    pub download_url: String,
    pub original_dimensions: Dimensions,
    pub upscaled_dimensions: Dimensions,
    pub original_size_bytes: u64,
    pub upscaled_size_bytes: u64,
    pub scale_factor: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Success(UploadSuccess),
    Failure { message: String },
}

impl UploadOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        UploadOutcome::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum LifecycleState {
    #[default]
    Idle,
    FileSelected(SelectedFile),
    Submitting {
        request: UploadRequest,
        progress: f64,
    },
    Resulted(UploadOutcome),
}

impl LifecycleState {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::FileSelected(_) => "file_selected",
            LifecycleState::Submitting { .. } => "submitting",
            LifecycleState::Resulted(_) => "resulted",
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, LifecycleState::Submitting { .. })
    }

    #[cfg(test)]
    pub fn selected_file(&self) -> Option<&SelectedFile> {
        match self {
            LifecycleState::FileSelected(file) => Some(file),
            LifecycleState::Submitting { request, .. } => Some(&request.file),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn progress(&self) -> Option<f64> {
        match self {
            LifecycleState::Submitting { progress, .. } => Some(*progress),
            _ => None,
        }
    }
}
