// Panel API HTTP client
//
// Wraps `reqwest::Client` with panel URL construction, bearer-token
// session handling and status-code classification. Login and logout
// live in `auth.rs` as inherent methods to keep this module focused on
// transport mechanics.

use std::sync::RwLock;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::panel::models::PanelStatus;
use crate::transport::TransportConfig;

/// Raw HTTP client for a panel cloud service.
///
/// Holds the session token obtained by [`login`](Self::login). Every
/// status request carries it as a bearer token; a request without one
/// fails fast with [`Error::SessionExpired`].
pub struct PanelClient {
    http: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<SecretString>>,
}

impl PanelClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            token: RwLock::new(None),
        }
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The panel service base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether a session token is currently held.
    pub fn has_session(&self) -> bool {
        self.token.read().expect("token lock poisoned").is_some()
    }

    // ── Token management ─────────────────────────────────────────────

    pub(crate) fn set_token(&self, token: SecretString) {
        trace!("storing session token");
        *self.token.write().expect("token lock poisoned") = Some(token);
    }

    pub(crate) fn clear_token(&self) {
        *self.token.write().expect("token lock poisoned") = None;
    }

    pub(crate) fn session_token(&self) -> Option<SecretString> {
        self.token.read().expect("token lock poisoned").clone()
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for an API path: `{base}/api/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/{path}"))?)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Fetch the current panel status (arming state and sensors).
    pub async fn get_status(&self) -> Result<PanelStatus, Error> {
        let token = self.session_token().ok_or(Error::SessionExpired)?;
        let url = self.api_url("panel/status")?;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_response(resp).await
    }
}

/// Classify the status code, then decode the JSON body.
pub(crate) async fn parse_response<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, Error> {
    let status = resp.status();

    match status {
        StatusCode::UNAUTHORIZED => return Err(Error::SessionExpired),
        StatusCode::FORBIDDEN => {
            return Err(Error::Authentication {
                message: "access denied (HTTP 403)".into(),
            });
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            return Err(Error::Timeout {
                status: status.as_u16(),
            });
        }
        _ => {}
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            message: preview(&body),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body,
    })
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
