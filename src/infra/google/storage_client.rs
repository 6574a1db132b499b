use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use super::google_api::GoogleApi;
use crate::core::pipeline::{ArchiveRef, BlobArchive, ServiceError};

const UPLOAD_BASE_URL: &str = "https://storage.googleapis.com/upload/storage/v1/b";

/// Cloud Storage JSON API client. Uses simple media uploads: the object
/// name goes in the query string and the body is the raw payload.
pub struct StorageClient {
    api: GoogleApi,
}

impl StorageClient {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }

    fn upload_url(bucket: &str, object_name: &str) -> Result<Url, ServiceError> {
        let mut url =
            Url::parse(UPLOAD_BASE_URL).map_err(|e| ServiceError::Malformed(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Malformed("cannot build upload URL".to_string()))?
            .push(bucket)
            .push("o");
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", object_name);
        Ok(url)
    }

    fn map_object(object: ApiObject) -> ArchiveRef {
        ArchiveRef {
            bucket: object.bucket,
            object_name: object.name,
            generation: object.generation,
            media_link: object.media_link,
        }
    }
}

#[async_trait]
impl BlobArchive for StorageClient {
    async fn upload(
        &self,
        bucket: &str,
        object_name: &str,
        mime_type: &str,
        payload: &[u8],
    ) -> Result<ArchiveRef, ServiceError> {
        tracing::debug!(bucket, object = object_name, bytes = payload.len(), "GCS objects.insert");

        let request = self
            .api
            .client()
            .post(Self::upload_url(bucket, object_name)?)
            .header("Content-Type", mime_type)
            .body(payload.to_vec());

        let object: ApiObject = self
            .api
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;

        Ok(Self::map_object(object))
    }
}

/// The subset of the object resource we keep.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiObject {
    bucket: String,
    name: String,
    generation: Option<String>,
    media_link: Option<String>,
}
