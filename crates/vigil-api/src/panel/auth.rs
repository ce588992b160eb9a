// Panel session authentication
//
// Token-based login/logout. The login endpoint returns a bearer token
// that the client keeps until logout or until the service rejects it.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::panel::client::{PanelClient, parse_response};
use crate::panel::models::LoginResponse;

impl PanelClient {
    /// Authenticate with the panel service using username/password.
    ///
    /// On success the session token is stored and used for every
    /// subsequent status request. A `401` or `403` from the login
    /// endpoint is reported as [`Error::Authentication`].
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.api_url("login")?;
        debug!("logging in at {}", url);

        let body = json!({
            "username": username,
            "password": password.expose_secret(),
        });

        let resp = self
            .http()
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        let login: LoginResponse = parse_response(resp).await?;
        self.set_token(SecretString::from(login.token));

        debug!("login successful");
        Ok(())
    }

    /// End the current session.
    ///
    /// The local token is dropped even when the logout request fails, so
    /// a released client never reuses a session.
    pub async fn logout(&self) -> Result<(), Error> {
        let Some(token) = self.session_token() else {
            debug!("no session to log out of");
            return Ok(());
        };

        let url = self.api_url("logout")?;
        debug!("logging out at {}", url);

        let result = self
            .http()
            .post(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await;
        self.clear_token();
        result.map_err(Error::Transport)?;

        debug!("logout complete");
        Ok(())
    }
}
