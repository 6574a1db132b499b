use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::google_api::GoogleApi;
use crate::core::pipeline::{ImageLabeler, LabelAnnotation, ServiceError};

const ANNOTATE_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Cloud Vision client limited to label detection.
pub struct VisionClient {
    api: GoogleApi,
}

impl VisionClient {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }

    fn request_body(payload: &[u8], max_labels: usize) -> AnnotateRequest {
        AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: Image {
                    content: STANDARD.encode(payload),
                },
                features: vec![Feature {
                    feature_type: "LABEL_DETECTION",
                    max_results: max_labels,
                }],
            }],
        }
    }

    /// One image in, one response out. A per-image error is a rejection of
    /// that image, not of the whole call.
    fn labels_from(response: AnnotateResponse) -> Result<Vec<LabelAnnotation>, ServiceError> {
        let first = response
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Malformed("empty Vision response".to_string()))?;

        if let Some(error) = first.error {
            return Err(ServiceError::Rejected(error.message));
        }

        Ok(first
            .label_annotations
            .into_iter()
            .map(|label| LabelAnnotation {
                description: label.description,
                score: label.score,
            })
            .collect())
    }
}

#[async_trait]
impl ImageLabeler for VisionClient {
    async fn detect_labels(
        &self,
        payload: &[u8],
        max_labels: usize,
    ) -> Result<Vec<LabelAnnotation>, ServiceError> {
        let body = Self::request_body(payload, max_labels);
        let request = self.api.client().post(ANNOTATE_URL).json(&body);

        let response: AnnotateResponse = self
            .api
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;

        Self::labels_from(response)
    }
}

// =============================================================================
// VISION API DATA STRUCTURES
// =============================================================================

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Debug, Serialize)]
struct AnnotateImageRequest {
    image: Image,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct Image {
    /// Base64 of the raw image bytes.
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature {
    #[serde(rename = "type")]
    feature_type: &'static str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    label_annotations: Vec<EntityAnnotation>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    description: String,
    #[serde(default)]
    score: f32,
}

#[derive(Debug, Deserialize)]
struct Status {
    message: String,
}
