//! Creates a valid Google session (access token) from a service account key.
//!
//! The key signs a short-lived JWT assertion which is exchanged for a bearer
//! token at the key's `token_uri`. Tokens are cached until shortly before they
//! expire.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::GoogleError;

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Supplies bearer tokens for Calendar API calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, GoogleError>;
}

/// A fixed token, for tests and for tokens minted elsewhere.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, GoogleError> {
        Ok(self.0.clone())
    }
}

/// The fields of a service account key file we use.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, GoogleError> {
        serde_json::from_str(json)
            .map_err(|e| GoogleError::Credentials(format!("invalid service account key: {}", e)))
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct SessionData {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl SessionData {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

pub struct Session {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scope: String,
    http: reqwest::Client,
    data: Mutex<Option<SessionData>>,
}

impl Session {
    pub fn new(key: ServiceAccountKey, http: reqwest::Client) -> Result<Self, GoogleError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| GoogleError::Credentials(format!("invalid private key: {}", e)))?;

        Ok(Session {
            key,
            encoding_key,
            scope: CALENDAR_SCOPE.to_string(),
            http,
            data: Mutex::new(None),
        })
    }

    pub fn from_json(json: &str, http: reqwest::Client) -> Result<Self, GoogleError> {
        Self::new(ServiceAccountKey::from_json(json)?, http)
    }

    pub fn account_email(&self) -> &str {
        &self.key.client_email
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, GoogleError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| GoogleError::Credentials(format!("failed to sign assertion: {}", e)))
    }

    async fn refresh(&self) -> Result<SessionData, GoogleError> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| GoogleError::Auth(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GoogleError::Auth(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| GoogleError::Auth(format!("invalid token response: {}", e)))?;

        tracing::debug!(
            account = %self.key.client_email,
            expires_in = tokens.expires_in,
            "Obtained access token"
        );

        Ok(SessionData {
            access_token: tokens.access_token,
            expires_at: now + Duration::seconds(tokens.expires_in),
        })
    }
}

#[async_trait]
impl TokenSource for Session {
    async fn access_token(&self) -> Result<String, GoogleError> {
        let mut data = self.data.lock().await;

        if let Some(session) = data.as_ref()
            && !session.is_expired(Utc::now())
        {
            return Ok(session.access_token.clone());
        }

        let fresh = self.refresh().await?;
        let token = fresh.access_token.clone();
        *data = Some(fresh);
        Ok(token)
    }
}
