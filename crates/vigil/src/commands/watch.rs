//! `vigil watch`: continuous polling with per-cycle output.

use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use vigil_core::{CoordinatorState, PanelFetcher, PanelStatus, PollCycle, PollingCoordinator};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

type Published = (CoordinatorState<PanelStatus>, PollCycle<PanelStatus>);

pub async fn handle(args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = vigil_config::load_config()?;
    let target = config::resolve_target(global, &cfg)?;
    let coordinator_config = config::resolve_coordinator(&target, &cfg.defaults, Some(args))?;

    let fetcher = super::connect(&target).await?;
    let coordinator = PollingCoordinator::new(fetcher, coordinator_config)?;

    let (tx, rx) = mpsc::unbounded_channel::<Published>();
    coordinator.add_listener(move |state, cycle| {
        let _ = tx.send((state.clone(), cycle.clone()));
    });
    let reauth = coordinator.subscribe_reauth();

    coordinator.start();
    let result = follow(&coordinator, args, global, &target.profile_name, rx, reauth).await;

    coordinator.shutdown().await;
    coordinator.fetcher().close().await;
    result
}

/// Print cycles until interrupted, the cycle limit is reached, or a
/// reauthorization request cannot be satisfied.
async fn follow(
    coordinator: &PollingCoordinator<PanelFetcher>,
    args: &WatchArgs,
    global: &GlobalOpts,
    profile_name: &str,
    mut cycles: mpsc::UnboundedReceiver<Published>,
    mut reauth: broadcast::Receiver<vigil_core::ReauthRequest>,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let mut seen: u64 = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }

            Some((state, cycle)) = cycles.recv() => {
                let rendered = output::render_cycle(global.output, &state, &cycle, color)?;
                output::print_output(&rendered, global.quiet);

                seen += 1;
                if args.cycles.is_some_and(|limit| seen >= limit) {
                    return Ok(());
                }
            }

            Ok(request) = reauth.recv() => {
                warn!(sequence = request.sequence, "panel rejected the session: {}", request.message);

                if args.exit_on_reauth {
                    return Err(CliError::AuthFailed {
                        profile: profile_name.into(),
                        message: request.message,
                    });
                }

                eprintln!("session rejected at cycle {}; logging in again", request.sequence);
                coordinator
                    .fetcher()
                    .reauthenticate()
                    .await
                    .map_err(|e| super::for_profile(e, profile_name))?;
            }
        }
    }
}
