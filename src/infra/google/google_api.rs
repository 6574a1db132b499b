use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::service_account::TokenSource;
use crate::core::pipeline::ServiceError;

/// Authorized HTTP access shared by the Drive, Storage, Vision and Sheets
/// clients. Cloning is cheap: the reqwest client and token source are shared.
#[derive(Clone)]
pub struct GoogleApi {
    client: Client,
    tokens: Arc<dyn TokenSource>,
}

/// Google's standard JSON error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GoogleApi {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "User-Agent",
            HeaderValue::from_static(concat!("gsimg-analyzer/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        Ok(Self { client, tokens })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Attaches a bearer token, sends the request and turns non-2xx
    /// responses into `ServiceError`s.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ServiceError> {
        let token = self.tokens.access_token().await?;

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        check_status(response).await
    }
}

/// Passes successful responses through and maps failures.
pub async fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(error_from_status(status, &body))
}

/// 401 means the credentials are bad; everything else is an API error with
/// Google's message when the body carries one.
pub fn error_from_status(status: StatusCode, body: &str) -> ServiceError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{} ({})", envelope.error.message, code),
            None => envelope.error.message,
        },
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string(),
        Err(_) => body.trim().to_string(),
    };

    if status == StatusCode::UNAUTHORIZED {
        return ServiceError::Auth(message);
    }

    ServiceError::Api {
        status: status.as_u16(),
        message,
    }
}
