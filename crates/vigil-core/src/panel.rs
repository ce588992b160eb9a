// ── Panel-backed fetch capability ──
//
// Owns an authenticated `vigil_api` session and exposes its status
// endpoint as a `FetchCapability`. The session is an explicit resource:
// `connect()` logs in, `close()` logs out.

use tracing::{debug, info, warn};

use vigil_api::transport::{TlsMode, TransportConfig};
use vigil_api::{PanelClient, PanelStatus};

use crate::config::{PanelConfig, TlsVerification};
use crate::error::{CoreError, FetchError};
use crate::fetch::FetchCapability;

/// An authenticated panel session usable as a coordinator fetcher.
pub struct PanelFetcher {
    client: PanelClient,
    config: PanelConfig,
}

impl PanelFetcher {
    /// Build a client and log in.
    ///
    /// Any failure here is a setup failure: no fetcher is returned, so no
    /// coordinator can be created from it.
    pub async fn connect(config: PanelConfig) -> Result<Self, CoreError> {
        let transport = build_transport(&config);
        let client = PanelClient::new(config.url.clone(), &transport)?;

        debug!(url = %config.url, username = %config.username, "logging in to panel");
        client.login(&config.username, &config.password).await?;
        info!(url = %config.url, "panel session established");

        Ok(Self { client, config })
    }

    /// Wrap an existing client without logging in. `fetch()` reports
    /// `Authentication` until [`reauthenticate()`](Self::reauthenticate)
    /// succeeds.
    pub fn with_client(client: PanelClient, config: PanelConfig) -> Self {
        Self { client, config }
    }

    /// Log in again with the stored credentials.
    pub async fn reauthenticate(&self) -> Result<(), CoreError> {
        debug!(url = %self.config.url, "re-authenticating panel session");
        self.client
            .login(&self.config.username, &self.config.password)
            .await?;
        info!("panel session re-established");
        Ok(())
    }

    /// Release the session. Logout failures are logged, not returned.
    pub async fn close(&self) {
        if let Err(e) = self.client.logout().await {
            warn!(error = %e, "panel logout failed");
        } else {
            debug!("panel session closed");
        }
    }

    pub fn client(&self) -> &PanelClient {
        &self.client
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }
}

impl FetchCapability for PanelFetcher {
    type Snapshot = PanelStatus;

    async fn fetch(&self) -> Result<PanelStatus, FetchError> {
        Ok(self.client.get_status().await?)
    }
}

impl std::fmt::Debug for PanelFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelFetcher")
            .field("url", &self.config.url.as_str())
            .field("username", &self.config.username)
            .field("has_session", &self.client.has_session())
            .finish_non_exhaustive()
    }
}

/// Build a [`TransportConfig`] from the panel configuration.
fn build_transport(config: &PanelConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
