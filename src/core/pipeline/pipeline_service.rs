// The pipeline service drives one image from Drive through Cloud Storage,
// Vision (and optionally Gemini) into a report sheet. It owns no clients
// itself: every service is handed in by the composition root.

use std::fmt;

use thiserror::Error;

use super::formatting::{self, RowLayout};
use super::pipeline_models::{
    AnalysisResult, ArchiveRef, FileMetadata, FileRecord, PipelineReport, ReportRow, RunRequest,
};
use super::pipeline_ports::{
    BlobArchive, FileSource, ImageDescriber, ImageLabeler, ReportSink, ServiceError,
};

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Locate,
    Fetch,
    Archive,
    Label,
    Describe,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Locate => "locate",
            Stage::Fetch => "fetch",
            Stage::Archive => "archive",
            Stage::Label => "label",
            Stage::Describe => "describe",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

/// Why a run stopped. Every variant names the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("locate stage: no file matched '{query}'")]
    NotFound { query: String },
    #[error("locate stage: file search failed: {0}")]
    Lookup(String),
    #[error("fetch stage: download failed: {0}")]
    Download(String),
    #[error("archive stage: upload failed: {0}")]
    Upload(String),
    #[error("label stage: image analysis failed: {0}")]
    Analysis(String),
    #[error("describe stage: image description failed: {0}")]
    Description(String),
    #[error("report stage: row append failed: {0}")]
    Report(String),
    #[error("{stage} stage: {message}")]
    Auth { stage: Stage, message: String },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::NotFound { .. } | PipelineError::Lookup(_) => Stage::Locate,
            PipelineError::Download(_) => Stage::Fetch,
            PipelineError::Upload(_) => Stage::Archive,
            PipelineError::Analysis(_) => Stage::Label,
            PipelineError::Description(_) => Stage::Describe,
            PipelineError::Report(_) => Stage::Report,
            PipelineError::Auth { stage, .. } => *stage,
        }
    }

    /// Auth failures keep their own variant; anything else becomes the
    /// stage's error.
    fn from_service(stage: Stage, err: ServiceError) -> Self {
        if err.is_auth() {
            return PipelineError::Auth {
                stage,
                message: err.to_string(),
            };
        }

        let message = err.to_string();
        match stage {
            Stage::Locate => PipelineError::Lookup(message),
            Stage::Fetch => PipelineError::Download(message),
            Stage::Archive => PipelineError::Upload(message),
            Stage::Label => PipelineError::Analysis(message),
            Stage::Describe => PipelineError::Description(message),
            Stage::Report => PipelineError::Report(message),
        }
    }
}

pub struct AnalyzePipeline<F, A, L, R>
where
    F: FileSource,
    A: BlobArchive,
    L: ImageLabeler,
    R: ReportSink,
{
    files: F,
    archive: A,
    labeler: L,
    reports: R,
    describer: Option<Box<dyn ImageDescriber>>,
}

impl<F, A, L, R> AnalyzePipeline<F, A, L, R>
where
    F: FileSource,
    A: BlobArchive,
    L: ImageLabeler,
    R: ReportSink,
{
    pub fn new(files: F, archive: A, labeler: L, reports: R) -> Self {
        Self {
            files,
            archive,
            labeler,
            reports,
            describer: None,
        }
    }

    /// Adds the optional description stage (and its report column).
    pub fn with_describer(mut self, describer: Box<dyn ImageDescriber>) -> Self {
        self.describer = Some(describer);
        self
    }

    pub fn row_layout(&self, request: &RunRequest) -> RowLayout {
        RowLayout {
            description: self.describer.is_some(),
            location: request.include_location,
        }
    }

    /// Runs every stage in order. The first failure stops the run; nothing
    /// already written (archived object, etc.) is rolled back.
    pub async fn run(&self, request: &RunRequest) -> Result<PipelineReport, PipelineError> {
        // The row format is checked before anything is uploaded.
        formatting::check_time_format(&request.timestamp_format).map_err(PipelineError::Report)?;

        let metadata = self.locate(request).await?;
        let file = self.fetch(metadata).await?;
        let archive = self.archive(request, &file).await?;
        let analysis = self.label(request, &file).await?;
        let description = self.describe(&file).await?;

        let layout = self.row_layout(request);
        let row = layout.build_row(
            &request.folder,
            &file,
            &request.timestamp_format,
            &archive,
            &analysis,
            description.as_deref(),
        )
        .map_err(PipelineError::Report)?;
        let cells_updated = self.report(request, &row).await?;

        Ok(PipelineReport {
            file: file.metadata(),
            archive,
            analysis,
            description,
            row,
            cells_updated,
        })
    }

    async fn locate(&self, request: &RunRequest) -> Result<FileMetadata, PipelineError> {
        tracing::debug!(query = request.query.as_str(), "Searching for file");

        let found = self
            .files
            .find_first(&request.query)
            .await
            .map_err(|e| PipelineError::from_service(Stage::Locate, e))?;

        let metadata = found.ok_or_else(|| PipelineError::NotFound {
            query: request.query.as_str().to_string(),
        })?;

        tracing::info!(
            file_id = %metadata.id,
            name = %metadata.name,
            mime_type = %metadata.mime_type,
            "Located file"
        );
        Ok(metadata)
    }

    async fn fetch(&self, metadata: FileMetadata) -> Result<FileRecord, PipelineError> {
        let payload = self
            .files
            .download(&metadata.id)
            .await
            .map_err(|e| PipelineError::from_service(Stage::Fetch, e))?;

        if let Some(expected) = metadata.size {
            if expected != payload.len() as u64 {
                return Err(PipelineError::Download(format!(
                    "expected {} bytes for '{}', received {}",
                    expected,
                    metadata.name,
                    payload.len()
                )));
            }
        }

        let record = FileRecord::new(metadata, payload);
        tracing::info!(
            name = %record.name,
            size = record.size,
            modified = %record.modified_time,
            "Downloaded file"
        );
        Ok(record)
    }

    async fn archive(
        &self,
        request: &RunRequest,
        file: &FileRecord,
    ) -> Result<ArchiveRef, PipelineError> {
        let object_name = formatting::object_name(&request.folder, &file.name);

        let archive = self
            .archive
            .upload(&request.bucket, &object_name, &file.mime_type, &file.payload)
            .await
            .map_err(|e| PipelineError::from_service(Stage::Archive, e))?;

        tracing::info!(
            object = %archive.object_name,
            bucket = %archive.bucket,
            "Uploaded to Cloud Storage"
        );
        Ok(archive)
    }

    async fn label(
        &self,
        request: &RunRequest,
        file: &FileRecord,
    ) -> Result<AnalysisResult, PipelineError> {
        if !file.is_image() {
            return Err(PipelineError::Analysis(format!(
                "'{}' is {}, not an image",
                file.name, file.mime_type
            )));
        }

        let labels = self
            .labeler
            .detect_labels(&file.payload, request.max_labels)
            .await
            .map_err(|e| PipelineError::from_service(Stage::Label, e))?;

        let analysis = AnalysisResult::from_service(labels, request.max_labels);
        if analysis.is_empty() {
            return Err(PipelineError::Analysis(format!(
                "no labels returned for '{}'",
                file.name
            )));
        }

        tracing::info!(
            top = request.max_labels,
            labels = %formatting::label_summary(&analysis),
            "Vision labels"
        );
        Ok(analysis)
    }

    async fn describe(&self, file: &FileRecord) -> Result<Option<String>, PipelineError> {
        let Some(describer) = &self.describer else {
            return Ok(None);
        };

        let text = describer
            .describe(&file.payload, &file.mime_type)
            .await
            .map_err(|e| PipelineError::from_service(Stage::Describe, e))?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(PipelineError::Description(format!(
                "empty description for '{}'",
                file.name
            )));
        }

        tracing::info!(chars = text.len(), "Image described");
        Ok(Some(text))
    }

    async fn report(&self, request: &RunRequest, row: &ReportRow) -> Result<u32, PipelineError> {
        let cells = self
            .reports
            .append_row(&request.spreadsheet_id, &request.sheet_name, &row.cells)
            .await
            .map_err(|e| PipelineError::from_service(Stage::Report, e))?;

        tracing::info!(cells, sheet = %request.sheet_name, "Appended report row");
        Ok(cells)
    }
}
