// Contracts the pipeline needs from the outside world.
// The infra layer implements these against Google's REST APIs; tests
// implement them with in-memory fakes.

use super::pipeline_models::{
    ArchiveRef, CellValue, FileMetadata, FileQuery, LabelAnnotation,
};
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a single external service call.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Credentials are missing, expired or were rejected.
    #[error("authorization failed: {0}")]
    Auth(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Malformed(String),
    /// The service answered but refused this particular input.
    #[error("{0}")]
    Rejected(String),
}

impl ServiceError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ServiceError::Auth(_))
    }
}

/// File-storage service (Google Drive).
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Returns the first match in service order, or `None` when nothing
    /// matched.
    async fn find_first(&self, query: &FileQuery) -> Result<Option<FileMetadata>, ServiceError>;

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Blob-storage service (Google Cloud Storage).
#[async_trait]
pub trait BlobArchive: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        object_name: &str,
        mime_type: &str,
        payload: &[u8],
    ) -> Result<ArchiveRef, ServiceError>;
}

/// Image-analysis service (Cloud Vision label detection).
#[async_trait]
pub trait ImageLabeler: Send + Sync {
    /// Labels come back ordered by descending confidence.
    async fn detect_labels(
        &self,
        payload: &[u8],
        max_labels: usize,
    ) -> Result<Vec<LabelAnnotation>, ServiceError>;
}

/// Generative description of an image (Gemini).
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    async fn describe(&self, payload: &[u8], mime_type: &str) -> Result<String, ServiceError>;
}

// Lets the composition root pick a describer at runtime.
#[async_trait]
impl ImageDescriber for Box<dyn ImageDescriber> {
    async fn describe(&self, payload: &[u8], mime_type: &str) -> Result<String, ServiceError> {
        (**self).describe(payload, mime_type).await
    }
}

/// Tabular-data service (Google Sheets).
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Appends `row` after the existing data and returns the number of cells
    /// the service reports as written.
    async fn append_row(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        row: &[CellValue],
    ) -> Result<u32, ServiceError>;
}
