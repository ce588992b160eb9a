// ── Runtime configuration ──
//
// These types describe *how* to poll and *where* the panel lives.
// They carry credential data and tuning, but never touch disk.
// The CLI builds them (via vigil-config) and hands them in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// Poll interval used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Consecutive non-authentication failures before the state flips to
/// `Unavailable`. `1` means the first failure already does.
pub const DEFAULT_UNAVAILABLE_AFTER: u32 = 1;

/// Scheduling and failure policy for a [`PollingCoordinator`](crate::PollingCoordinator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Delay between the end of one cycle and the start of the next.
    pub poll_interval: Duration,
    /// Consecutive transient/timeout/unknown failures tolerated while
    /// `Ready` before reporting `Unavailable`. Authentication failures
    /// always report `Unavailable` immediately.
    pub unavailable_after: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            unavailable_after: DEFAULT_UNAVAILABLE_AFTER,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.poll_interval.is_zero() {
            return Err(CoreError::InvalidConfig {
                message: "poll interval must be greater than zero".into(),
            });
        }
        if self.unavailable_after == 0 {
            return Err(CoreError::InvalidConfig {
                message: "unavailable_after must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict). Default for cloud services.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed local bridges).
    DangerAcceptInvalid,
}

/// Where and how to open a panel session.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Panel service URL (e.g., `https://panel.example.com`).
    pub url: Url,
    pub username: String,
    pub password: SecretString,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
}
