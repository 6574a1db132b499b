// =============================================================================
// GOOGLE OAUTH2 ACCESS TOKENS
// =============================================================================
//
// Every Google API call in this tool carries a bearer token. Two sources are
// supported:
//
// 1. **Service account (recommended):** a JSON key signs a JWT which is
//    exchanged for an access token at the key's `token_uri`. Share the Drive
//    file and the Sheet with the service account email, and grant it write
//    access on the bucket.
// 2. **Pre-minted token:** e.g. `gcloud auth print-access-token`. Handy for
//    local runs; it is used as-is and never refreshed.
//
// **Environment Variables:**
// - `GOOGLE_SERVICE_ACCOUNT_KEY` - Path to service account JSON file
// - `GOOGLE_SERVICE_ACCOUNT_JSON` - Service account JSON content (alternative)
// - `GOOGLE_APPLICATION_CREDENTIALS` - Path to service account JSON file (ADC style)
// - `GOOGLE_IMPERSONATE_SUBJECT` - User to impersonate (domain-wide delegation)
// - `GOOGLE_OAUTH_ACCESS_TOKEN` - A ready-made access token

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::core::pipeline::ServiceError;

/// Scopes needed by the four pipeline services.
pub const PIPELINE_SCOPES: [&str; 4] = [
    "https://www.googleapis.com/auth/drive.readonly",
    "https://www.googleapis.com/auth/devstorage.read_write",
    "https://www.googleapis.com/auth/cloud-vision",
    "https://www.googleapis.com/auth/spreadsheets",
];

/// Anything that can hand out a bearer token for Google APIs.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, ServiceError>;
}

/// A token minted elsewhere. Expiry surfaces as a 401 from the API.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, ServiceError> {
        Ok(self.0.clone())
    }
}

// =============================================================================
// SERVICE ACCOUNT AUTHENTICATION
// =============================================================================

/// Service account credentials from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    /// The service account email (used as issuer in JWT).
    client_email: String,

    /// The private key in PEM format.
    private_key: String,

    /// The token URI (where to exchange JWT for access token).
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,

    /// Space-separated scopes.
    scope: String,

    aud: String,

    /// Impersonated user for domain-wide delegation.
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<String>,

    iat: u64,

    /// Max 1 hour after `iat`.
    exp: u64,
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Cached access token with expiration.
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// Authenticator that handles OAuth2 with service account credentials.
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    scopes: Vec<String>,
    subject: Option<String>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountAuth {
    pub async fn from_file(path: &str) -> Result<Self, ServiceError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServiceError::Auth(format!("cannot read key file {}: {}", path, e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ServiceError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)
            .map_err(|e| ServiceError::Auth(format!("invalid service account key: {}", e)))?;
        Ok(Self {
            credentials,
            scopes: PIPELINE_SCOPES.iter().map(|s| s.to_string()).collect(),
            subject: None,
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    #[cfg(test)]
    pub fn with_scopes(mut self, scopes: &[&str]) -> Self {
        self.scopes = scopes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject;
        self
    }

    pub fn client_email(&self) -> &str {
        &self.credentials.client_email
    }

    fn claims(&self, now: u64) -> JwtClaims {
        JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: self.scopes.join(" "),
            aud: self.credentials.token_uri.clone(),
            sub: self.subject.clone(),
            iat: now,
            exp: now + 3600,
        }
    }

    /// Fetches a new access token from Google.
    async fn fetch_new_token(&self) -> Result<CachedToken, ServiceError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ServiceError::Auth(e.to_string()))?
            .as_secs();

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| ServiceError::Auth(format!("invalid private key: {}", e)))?;
        let jwt = encode(&header, &self.claims(now), &key)
            .map_err(|e| ServiceError::Auth(format!("cannot sign JWT: {}", e)))?;

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Auth(format!(
                "token exchange failed ({}): {}",
                status, text
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;

        // Refresh a little early; Google issues 3600s tokens.
        let lifetime = token_response.expires_in.unwrap_or(3600).min(55 * 60);
        tracing::debug!(
            email = %self.credentials.client_email,
            lifetime_secs = lifetime,
            "Obtained service account token"
        );

        Ok(CachedToken {
            token: token_response.access_token,
            expires_at: SystemTime::now() + Duration::from_secs(lifetime),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountAuth {
    /// Gets a valid access token, refreshing if necessary.
    async fn access_token(&self) -> Result<String, ServiceError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + Duration::from_secs(60) {
                    return Ok(token.token.clone());
                }
            }
        }

        let fresh = self.fetch_new_token().await?;
        let token = fresh.token.clone();

        let mut cached = self.cached_token.write().await;
        *cached = Some(fresh);

        Ok(token)
    }
}

/// Outcome of reading an ADC file.
enum AdcCredentials {
    ServiceAccount(ServiceAccountAuth),
    /// Any other `type` (`authorized_user`, `external_account`, ...).
    Unsupported(String),
}

/// Loads `GOOGLE_APPLICATION_CREDENTIALS`. Only service account keys are
/// usable here; other credential types are reported, not parsed.
async fn load_adc_file(path: &str) -> Result<AdcCredentials, ServiceError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ServiceError::Auth(format!("cannot read key file {}: {}", path, e)))?;

    let kind = serde_json::from_str::<serde_json::Value>(&content)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string));

    match kind {
        Some(kind) if kind != "service_account" => Ok(AdcCredentials::Unsupported(kind)),
        _ => Ok(AdcCredentials::ServiceAccount(ServiceAccountAuth::from_json(&content)?)),
    }
}

/// Picks a token source from the environment.
pub async fn token_source_from_env() -> Result<Arc<dyn TokenSource>, ServiceError> {
    let subject = std::env::var("GOOGLE_IMPERSONATE_SUBJECT").ok();
    let mut skipped_adc = None;

    let auth = if let Ok(path) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
        Some(ServiceAccountAuth::from_file(&path).await?)
    } else if let Ok(json) = std::env::var("GOOGLE_SERVICE_ACCOUNT_JSON") {
        Some(ServiceAccountAuth::from_json(&json)?)
    } else if let Ok(path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
        match load_adc_file(&path).await? {
            AdcCredentials::ServiceAccount(auth) => Some(auth),
            AdcCredentials::Unsupported(kind) => {
                tracing::warn!(
                    path = %path,
                    kind = %kind,
                    "Ignoring GOOGLE_APPLICATION_CREDENTIALS: not a service account key"
                );
                skipped_adc = Some(kind);
                None
            }
        }
    } else {
        None
    };

    if let Some(auth) = auth {
        tracing::info!(email = auth.client_email(), "Using service account credentials");
        return Ok(Arc::new(auth.with_subject(subject)));
    }

    if let Ok(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
        tracing::info!("Using access token from GOOGLE_OAUTH_ACCESS_TOKEN");
        return Ok(Arc::new(StaticToken::new(token)));
    }

    if let Some(kind) = skipped_adc {
        return Err(ServiceError::Auth(format!(
            "GOOGLE_APPLICATION_CREDENTIALS holds '{}' credentials, which are not supported; \
             use a service account key or set GOOGLE_OAUTH_ACCESS_TOKEN",
            kind
        )));
    }

    Err(ServiceError::Auth(
        "no credentials: set GOOGLE_SERVICE_ACCOUNT_KEY, GOOGLE_SERVICE_ACCOUNT_JSON, \
         GOOGLE_APPLICATION_CREDENTIALS or GOOGLE_OAUTH_ACCESS_TOKEN"
            .to_string(),
    ))
}
