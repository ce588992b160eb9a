//! `vigil check`: one connect, one cycle, one report.

use vigil_core::{CoordinatorState, PollingCoordinator};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = vigil_config::load_config()?;
    let target = config::resolve_target(global, &cfg)?;
    let coordinator_config = config::resolve_coordinator(&target, &cfg.defaults, None)?;

    let fetcher = super::connect(&target).await?;
    let coordinator = PollingCoordinator::new(fetcher, coordinator_config)?;

    let state = coordinator.refresh_now().await?;
    coordinator.fetcher().close().await;

    let color = output::should_color(global.color);
    let rendered = output::render_check(global.output, &state, &coordinator.stats(), color)?;
    output::print_output(&rendered, global.quiet);

    match state {
        CoordinatorState::Unavailable(failure) => Err(CliError::Unavailable {
            class: failure.class,
            message: failure.message,
        }),
        CoordinatorState::Ready(_) | CoordinatorState::Unknown => Ok(()),
    }
}
