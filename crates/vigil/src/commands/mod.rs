//! Command handlers.

pub mod check;
pub mod config_cmd;
pub mod watch;

use tracing::debug;

use vigil_core::{CoreError, PanelFetcher};

use crate::config::Target;
use crate::error::CliError;

/// Open a panel session for `target`, attributing auth failures to its
/// profile.
pub(crate) async fn connect(target: &Target) -> Result<PanelFetcher, CliError> {
    debug!(profile = %target.profile_name, url = %target.panel.url, "connecting");
    PanelFetcher::connect(target.panel.clone())
        .await
        .map_err(|e| for_profile(e, &target.profile_name))
}

/// Convert a core error, naming the profile in authentication failures.
pub(crate) fn for_profile(err: CoreError, profile_name: &str) -> CliError {
    match CliError::from(err) {
        CliError::AuthFailed { message, .. } => CliError::AuthFailed {
            profile: profile_name.into(),
            message,
        },
        other => other,
    }
}
