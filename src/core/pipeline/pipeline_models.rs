// Domain models for the backup-analyze-report pipeline.
// Nothing in here knows about HTTP or Google's JSON shapes; the infra layer
// maps API responses into these types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of Vision labels requested per image.
pub const DEFAULT_MAX_LABELS: usize = 5;

/// Default tab that rows are appended to.
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// Default chrono format used for the "modified" cell.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d";

/// How the Locator should search the file store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileQuery {
    /// Exact file name match.
    Name(String),
    /// A query string passed through to the file store untouched.
    Raw(String),
}

impl FileQuery {
    /// The user-facing text of the query, used in logs and errors.
    pub fn as_str(&self) -> &str {
        match self {
            FileQuery::Name(name) => name,
            FileQuery::Raw(query) => query,
        }
    }
}

/// Latitude/longitude recorded in an image's metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    /// A Google Maps link that drops a pin on this location.
    pub fn maps_url(&self) -> String {
        format!(
            "https://www.google.com/maps/search/?api=1&query={},{}",
            self.latitude, self.longitude
        )
    }
}

/// Metadata for a file found by the Locator, before its bytes are fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// Reported size in bytes. Native Google files (Docs, Sheets) have none.
    pub size: Option<u64>,
    pub modified_time: DateTime<Utc>,
    pub location: Option<GeoLocation>,
}

/// A located file together with its fully downloaded payload.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub modified_time: DateTime<Utc>,
    pub location: Option<GeoLocation>,
    pub payload: Vec<u8>,
}

impl FileRecord {
    /// Combines metadata with the downloaded bytes. The size always comes
    /// from the payload itself.
    pub fn new(metadata: FileMetadata, payload: Vec<u8>) -> Self {
        Self {
            id: metadata.id,
            name: metadata.name,
            mime_type: metadata.mime_type,
            size: payload.len() as u64,
            modified_time: metadata.modified_time,
            location: metadata.location,
            payload,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Metadata view of the record without the payload.
    pub fn metadata(&self) -> FileMetadata {
        FileMetadata {
            id: self.id.clone(),
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            size: Some(self.size),
            modified_time: self.modified_time,
            location: self.location,
        }
    }
}

/// One label returned by the image-analysis service.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelAnnotation {
    pub description: String,
    /// Confidence in [0, 1].
    pub score: f32,
}

/// Top-K labels for an image, in the order the service returned them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisResult {
    labels: Vec<LabelAnnotation>,
}

impl AnalysisResult {
    /// Keeps at most `max_labels` labels. The service already orders them by
    /// descending confidence, so truncation keeps the best ones.
    pub fn from_service(mut labels: Vec<LabelAnnotation>, max_labels: usize) -> Self {
        labels.truncate(max_labels);
        Self { labels }
    }

    pub fn labels(&self) -> &[LabelAnnotation] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Where the Archiver stored the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveRef {
    pub bucket: String,
    pub object_name: String,
    pub generation: Option<String>,
    pub media_link: Option<String>,
}

impl ArchiveRef {
    /// Authenticated browser URL for the stored object.
    pub fn browser_url(&self) -> String {
        format!(
            "https://storage.cloud.google.com/{}/{}",
            self.bucket, self.object_name
        )
    }

    pub fn gs_uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.object_name)
    }
}

/// A single spreadsheet cell. Sizes stay numeric so the sheet can sum them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(u64),
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<u64> for CellValue {
    fn from(value: u64) -> Self {
        CellValue::Number(value)
    }
}

/// The row appended to the report sheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportRow {
    pub cells: Vec<CellValue>,
}

/// Everything needed for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub query: FileQuery,
    pub bucket: String,
    /// Cosmetic object prefix; may be empty.
    pub folder: String,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub max_labels: usize,
    /// Adds a location column to every row when set.
    pub include_location: bool,
    pub timestamp_format: String,
}

impl RunRequest {
    pub fn new(
        query: FileQuery,
        bucket: impl Into<String>,
        folder: impl Into<String>,
        spreadsheet_id: impl Into<String>,
    ) -> Self {
        Self {
            query,
            bucket: bucket.into(),
            folder: folder.into(),
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            max_labels: DEFAULT_MAX_LABELS,
            include_location: false,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub file: FileMetadata,
    pub archive: ArchiveRef,
    pub analysis: AnalysisResult,
    pub description: Option<String>,
    pub row: ReportRow,
    pub cells_updated: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn metadata(size: Option<u64>) -> FileMetadata {
        FileMetadata {
            id: "file-1".to_string(),
            name: "vacation.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            size,
            modified_time: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            location: None,
        }
    }

    #[test]
    fn file_record_size_comes_from_payload() {
        let record = FileRecord::new(metadata(None), vec![0u8; 2048]);
        assert_eq!(record.size, 2048);
        assert_eq!(record.metadata().size, Some(2048));
        assert!(record.is_image());
    }

    #[test]
    fn analysis_truncates_without_reordering() {
        let labels = vec![
            LabelAnnotation { description: "Sky".into(), score: 0.9 },
            LabelAnnotation { description: "Beach".into(), score: 0.8 },
            LabelAnnotation { description: "Sand".into(), score: 0.7 },
        ];
        let result = AnalysisResult::from_service(labels, 2);
        assert_eq!(result.len(), 2);
        assert_eq!(result.labels()[0].description, "Sky");
        assert_eq!(result.labels()[1].description, "Beach");
    }

    #[test]
    fn archive_ref_urls() {
        let archive = ArchiveRef {
            bucket: "my-bucket".into(),
            object_name: "backups/vacation.jpg".into(),
            generation: None,
            media_link: None,
        };
        assert_eq!(
            archive.browser_url(),
            "https://storage.cloud.google.com/my-bucket/backups/vacation.jpg"
        );
        assert_eq!(archive.gs_uri(), "gs://my-bucket/backups/vacation.jpg");
    }

    #[test]
    fn cells_serialize_untagged() {
        let row = vec![CellValue::from("backups"), CellValue::from(2048u64)];
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json, serde_json::json!(["backups", 2048]));
    }

    #[test]
    fn maps_url_uses_coordinates() {
        let location = GeoLocation { latitude: 37.42, longitude: -122.08 };
        assert_eq!(
            location.maps_url(),
            "https://www.google.com/maps/search/?api=1&query=37.42,-122.08"
        );
    }
}
