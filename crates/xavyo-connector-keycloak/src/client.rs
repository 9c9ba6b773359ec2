//! Realm-scoped Keycloak admin API client and session handling.
//!
//! An [`AdminClient`] is built for one request's target realm. It holds no
//! credential until [`AdminClient::authenticate`] succeeds, after which every
//! admin call carries the bearer token. Tokens are never refreshed; the engine
//! builds a new client and authenticates again for every request.

use chrono::{DateTime, Duration, Utc};
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::config::AdminCredentials;
use crate::error::{KeycloakError, KeycloakResult};
use crate::models::RealmTarget;

/// Token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Credential obtained for one request.
#[derive(Debug)]
pub struct Session {
    pub access_token: SecretString,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: Option<SecretString>,
    pub token_type: String,
    pub scope: Option<String>,
    pub realm: String,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// HTTP client bound to one realm of one Keycloak server.
#[derive(Debug, Clone)]
pub struct AdminClient {
    target: RealmTarget,
    http: reqwest::Client,
    bearer: Option<Arc<SecretString>>,
}

impl AdminClient {
    /// Create an unauthenticated client for `target`.
    #[must_use]
    pub fn new(target: RealmTarget, http: reqwest::Client) -> Self {
        Self {
            target,
            http,
            bearer: None,
        }
    }

    /// Build the shared `reqwest` client used by every request.
    pub fn http_client(timeout: std::time::Duration) -> KeycloakResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("xavyo-connector-keycloak/1.0")
            .build()
            .map_err(|e| KeycloakError::Config(format!("Failed to build HTTP client: {e}")))
    }

    #[must_use]
    pub fn target(&self) -> &RealmTarget {
        &self.target
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.bearer.is_some()
    }

    /// Exchange admin credentials for a token with the password grant.
    ///
    /// Any previously attached credential is dropped on failure.
    #[instrument(skip(self, credentials), fields(realm = %self.target, username = %credentials.username))]
    pub async fn authenticate(&mut self, credentials: &AdminCredentials) -> KeycloakResult<Session> {
        match self.request_token(credentials).await {
            Ok(session) => {
                self.bearer = Some(Arc::new(SecretString::from(
                    session.access_token.expose_secret().to_string(),
                )));
                debug!(
                    "Authenticated, token expires at {}",
                    session.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                Ok(session)
            }
            Err(e) => {
                self.bearer = None;
                Err(e)
            }
        }
    }

    async fn request_token(&self, credentials: &AdminCredentials) -> KeycloakResult<Session> {
        if self.target.realm.trim().is_empty() {
            return Err(KeycloakError::Config("realm is empty".into()));
        }
        credentials.validate()?;

        let url = format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.target.base_url,
            urlencoding::encode(&self.target.realm)
        );
        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("grant_type", "password"),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.expose_secret()),
        ];

        let response = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| KeycloakError::Auth {
                status: e.status().map(|s| s.as_u16()),
                detail: format!("Token request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_body(response).await;
            return Err(KeycloakError::Auth {
                status: Some(status.as_u16()),
                detail: body,
            });
        }

        // An unusable token body fails the login itself, not a later stage.
        let body = read_body(response).await;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| KeycloakError::Auth {
                status: Some(status.as_u16()),
                detail: format!("Failed to parse token response: {e}"),
            })?;
        if token.access_token.is_empty() {
            return Err(KeycloakError::Auth {
                status: Some(status.as_u16()),
                detail: "Token response has no access token".into(),
            });
        }

        Ok(Session {
            access_token: SecretString::from(token.access_token),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            refresh_token: token.refresh_token.map(SecretString::from),
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: token.scope,
            realm: self.target.realm.clone(),
        })
    }

    /// `{base}/admin/realms/{realm}/{path}`.
    pub(crate) fn admin_url(&self, path: &str) -> String {
        format!(
            "{}/admin/realms/{}/{}",
            self.target.base_url,
            urlencoding::encode(&self.target.realm),
            path.trim_start_matches('/')
        )
    }

    /// Start an authenticated admin request.
    pub(crate) fn request(&self, method: Method, path: &str) -> KeycloakResult<RequestBuilder> {
        let bearer = self.bearer.as_ref().ok_or_else(|| KeycloakError::Auth {
            status: None,
            detail: "no session, authenticate first".into(),
        })?;
        Ok(self
            .http
            .request(method, self.admin_url(path))
            .bearer_auth(bearer.expose_secret()))
    }
}

/// Percent-encode a single path segment.
pub(crate) fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Response body as text, or a placeholder when it cannot be read.
pub(crate) async fn read_body(response: Response) -> String {
    match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Failed to read response body");
            "<no body>".to_string()
        }
    }
}

/// Last path segment of the `Location` header, used as the id of a created resource.
pub(crate) fn location_id(response: &Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim_end_matches('/').rsplit('/').next())
        .filter(|id| !id.is_empty())
        .map(String::from)
}
