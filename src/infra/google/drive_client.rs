use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;

use super::google_api::GoogleApi;
use crate::core::pipeline::{FileMetadata, FileQuery, FileSource, GeoLocation, ServiceError};

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

/// Fields requested from `files.list`; everything the pipeline records.
const LIST_FIELDS: &str =
    "files(id,name,mimeType,modifiedTime,size,imageMediaMetadata(location))";

/// Google Drive v3 client: name search plus media download.
pub struct DriveClient {
    api: GoogleApi,
}

impl DriveClient {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }

    /// Builds the Drive `q` parameter. Names are quoted with `\` and `'`
    /// escaped; raw queries pass through untouched.
    pub fn drive_query(query: &FileQuery) -> String {
        match query {
            FileQuery::Name(name) => {
                let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
                format!("name = '{}'", escaped)
            }
            FileQuery::Raw(raw) => raw.clone(),
        }
    }

    fn media_url(file_id: &str) -> Result<Url, ServiceError> {
        let mut url = Url::parse(DRIVE_FILES_URL).map_err(|e| ServiceError::Malformed(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Malformed("cannot build Drive URL".to_string()))?
            .push(file_id);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    fn map_file(api: ApiFile) -> Result<FileMetadata, ServiceError> {
        let modified_time = DateTime::parse_from_rfc3339(&api.modified_time)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                ServiceError::Malformed(format!(
                    "bad modifiedTime '{}' for {}: {}",
                    api.modified_time, api.id, e
                ))
            })?;

        // Drive encodes int64 fields as strings.
        let size = match api.size.as_deref() {
            Some(raw) => Some(raw.parse::<u64>().map_err(|e| {
                ServiceError::Malformed(format!("bad size '{}' for {}: {}", raw, api.id, e))
            })?),
            None => None,
        };

        let location = api
            .image_media_metadata
            .and_then(|m| m.location)
            .and_then(|l| match (l.latitude, l.longitude) {
                (Some(latitude), Some(longitude)) => Some(GeoLocation {
                    latitude,
                    longitude,
                }),
                _ => None,
            });

        Ok(FileMetadata {
            id: api.id,
            name: api.name,
            mime_type: api.mime_type,
            size,
            modified_time,
            location,
        })
    }

    /// First file of a `files.list` response, in the order Drive returned them.
    fn first_file(list: FileList) -> Result<Option<FileMetadata>, ServiceError> {
        list.files.into_iter().next().map(Self::map_file).transpose()
    }
}

#[async_trait]
impl FileSource for DriveClient {
    async fn find_first(&self, query: &FileQuery) -> Result<Option<FileMetadata>, ServiceError> {
        let q = Self::drive_query(query);
        tracing::debug!(q = %q, "Drive files.list");

        let request = self
            .api
            .client()
            .get(DRIVE_FILES_URL)
            .query(&[("q", q.as_str()), ("fields", LIST_FIELDS)]);

        let list: FileList = self
            .api
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;

        if list.files.len() > 1 {
            tracing::debug!(matches = list.files.len(), "Multiple matches, using the first");
        }

        Self::first_file(list)
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, ServiceError> {
        let request = self.api.client().get(Self::media_url(file_id)?);

        let bytes = self
            .api
            .send(request)
            .await?
            .bytes()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}

// =============================================================================
// DRIVE API RESPONSE STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<ApiFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFile {
    id: String,
    name: String,
    mime_type: String,
    modified_time: String,
    size: Option<String>,
    image_media_metadata: Option<ImageMediaMetadata>,
}

#[derive(Debug, Deserialize)]
struct ImageMediaMetadata {
    location: Option<ApiLocation>,
}

#[derive(Debug, Deserialize)]
struct ApiLocation {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_query_is_quoted_and_escaped() {
        assert_eq!(
            DriveClient::drive_query(&FileQuery::Name("vacation.jpg".into())),
            "name = 'vacation.jpg'"
        );
        assert_eq!(
            DriveClient::drive_query(&FileQuery::Name("Bob's \\pic.png".into())),
            "name = 'Bob\\'s \\\\pic.png'"
        );
    }

    #[test]
    fn raw_query_passes_through() {
        let raw = "name contains 'beach' and mimeType = 'image/png'";
        assert_eq!(DriveClient::drive_query(&FileQuery::Raw(raw.into())), raw);
    }

    #[test]
    fn media_url_escapes_id() {
        let url = DriveClient::media_url("abc 123").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/drive/v3/files/abc%20123?alt=media"
        );
    }

    #[test]
    fn first_file_maps_metadata() {
        let list: FileList = serde_json::from_str(
            r#"{"files": [
                {"id": "1a", "name": "vacation.jpg", "mimeType": "image/jpeg",
                 "modifiedTime": "2023-01-01T00:00:00.000Z", "size": "2048",
                 "imageMediaMetadata": {"location": {"latitude": 48.85, "longitude": 2.35, "altitude": 35.0}}},
                {"id": "2b", "name": "vacation.jpg", "mimeType": "image/jpeg",
                 "modifiedTime": "2022-06-01T10:00:00.000Z", "size": "10"}
            ]}"#,
        )
        .unwrap();

        let file = DriveClient::first_file(list).unwrap().unwrap();
        assert_eq!(file.id, "1a");
        assert_eq!(file.size, Some(2048));
        assert_eq!(file.modified_time.format("%Y-%m-%d").to_string(), "2023-01-01");
        assert_eq!(
            file.location,
            Some(GeoLocation { latitude: 48.85, longitude: 2.35 })
        );
    }

    #[test]
    fn empty_list_is_none() {
        let list: FileList = serde_json::from_str(r#"{"files": []}"#).unwrap();
        assert!(DriveClient::first_file(list).unwrap().is_none());

        let list: FileList = serde_json::from_str("{}").unwrap();
        assert!(DriveClient::first_file(list).unwrap().is_none());
    }

    #[test]
    fn native_files_have_no_size() {
        let list: FileList = serde_json::from_str(
            r#"{"files": [{"id": "d", "name": "Notes", "mimeType": "application/vnd.google-apps.document",
                 "modifiedTime": "2024-03-05T08:00:00Z"}]}"#,
        )
        .unwrap();

        let file = DriveClient::first_file(list).unwrap().unwrap();
        assert_eq!(file.size, None);
        assert_eq!(file.location, None);
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let list: FileList = serde_json::from_str(
            r#"{"files": [{"id": "x", "name": "a", "mimeType": "image/png", "modifiedTime": "yesterday"}]}"#,
        )
        .unwrap();

        assert!(matches!(
            DriveClient::first_file(list),
            Err(ServiceError::Malformed(_))
        ));
    }
}
