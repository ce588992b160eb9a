//! Output formatting: table, JSON, plain.
//!
//! Renders coordinator cycles and panel status in the format selected by
//! `--output`. Tables use `tabled`, structured formats use serde, plain
//! emits tab-separated fields.

use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Local, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use vigil_core::{CoordinatorState, PanelStatus, PollCycle, PollStats};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

type PanelState = CoordinatorState<PanelStatus>;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

fn state_label(state: &PanelState, color: bool) -> String {
    let label = state.label().to_uppercase();
    if !color {
        return label;
    }
    match state {
        CoordinatorState::Ready(_) => label.green().bold().to_string(),
        CoordinatorState::Unavailable(_) => label.red().bold().to_string(),
        CoordinatorState::Unknown => label.dimmed().to_string(),
    }
}

// ── Serializable views ───────────────────────────────────────────────

#[derive(Serialize)]
struct CycleReport<'a> {
    sequence: u64,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    duration_ms: i64,
    #[serde(flatten)]
    state: &'a PanelState,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    #[serde(flatten)]
    state: &'a PanelState,
    stats: &'a PollStats,
}

#[derive(Tabled)]
struct DetailRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Active")]
    active: String,
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render one published cycle (used by `watch`).
///
/// Table and plain output are a single line so consecutive cycles read
/// as a log; JSON emits one object per cycle.
pub fn render_cycle(
    format: OutputFormat,
    state: &PanelState,
    cycle: &PollCycle<PanelStatus>,
    color: bool,
) -> Result<String, CliError> {
    let report = CycleReport {
        sequence: cycle.sequence,
        started_at: cycle.started_at,
        finished_at: cycle.finished_at,
        duration_ms: cycle.duration().num_milliseconds(),
        state,
    };

    Ok(match format {
        OutputFormat::Table => {
            let at = cycle.finished_at.with_timezone(&Local).format("%H:%M:%S");
            format!(
                "#{:<4} {at}  {:<11}  {}",
                cycle.sequence,
                state_label(state, color),
                state_summary(state)
            )
        }
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
        OutputFormat::JsonCompact => serde_json::to_string(&report)?,
        OutputFormat::Plain => format!(
            "{}\t{}\t{}",
            cycle.sequence,
            state.label(),
            plain_detail(state)
        ),
    })
}

/// Render the result of a single `check` cycle.
pub fn render_check(
    format: OutputFormat,
    state: &PanelState,
    stats: &PollStats,
    color: bool,
) -> Result<String, CliError> {
    let report = CheckReport { state, stats };

    Ok(match format {
        OutputFormat::Table => render_check_table(state, color),
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
        OutputFormat::JsonCompact => serde_json::to_string(&report)?,
        OutputFormat::Plain => format!("{}\t{}", state.label(), plain_detail(state)),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn state_summary(state: &PanelState) -> String {
    match state {
        CoordinatorState::Unknown => "no data yet".into(),
        CoordinatorState::Ready(status) => format!(
            "{} · {} · {}/{} sensors active",
            status.armed,
            if status.online { "online" } else { "offline" },
            status.active_sensors().count(),
            status.sensors.len()
        ),
        CoordinatorState::Unavailable(failure) => failure.to_string(),
    }
}

fn plain_detail(state: &PanelState) -> String {
    match state {
        CoordinatorState::Unknown => String::new(),
        CoordinatorState::Ready(status) => status.armed.to_string(),
        CoordinatorState::Unavailable(failure) => failure.class.to_string(),
    }
}

fn render_check_table(state: &PanelState, color: bool) -> String {
    let mut rows = vec![DetailRow {
        field: "State",
        value: state_label(state, color),
    }];

    match state {
        CoordinatorState::Unknown => {}
        CoordinatorState::Ready(status) => {
            rows.push(DetailRow {
                field: "Armed",
                value: status.armed.to_string(),
            });
            rows.push(DetailRow {
                field: "Online",
                value: status.online.to_string(),
            });
        }
        CoordinatorState::Unavailable(failure) => {
            rows.push(DetailRow {
                field: "Failure",
                value: failure.class.to_string(),
            });
            rows.push(DetailRow {
                field: "Message",
                value: failure.message.clone(),
            });
        }
    }

    let mut out = Table::new(&rows).with(Style::rounded()).to_string();

    if let Some(status) = state.snapshot().filter(|s| !s.sensors.is_empty()) {
        let sensors: Vec<SensorRow> = status
            .sensors
            .iter()
            .map(|s| SensorRow {
                id: s.id.clone(),
                name: s.name.clone().unwrap_or_default(),
                kind: s.kind.to_string(),
                active: if s.active { "yes".into() } else { "no".into() },
            })
            .collect();
        out.push('\n');
        out.push_str(&Table::new(&sensors).with(Style::rounded()).to_string());
    }

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use vigil_core::{
        ArmState, CoordinatorState, CycleOutcome, Failure, FailureClass, PanelStatus, PollCycle,
        PollStats, Sensor, SensorKind,
    };

    use super::{render_check, render_cycle};
    use crate::cli::OutputFormat;

    fn status() -> Arc<PanelStatus> {
        Arc::new(PanelStatus {
            armed: ArmState::ArmedHome,
            online: true,
            sensors: vec![Sensor {
                id: "hall".into(),
                name: Some("Hallway".into()),
                kind: SensorKind::Motion,
                active: true,
            }],
        })
    }

    fn cycle(outcome: CycleOutcome<PanelStatus>) -> PollCycle<PanelStatus> {
        let now = Utc::now();
        PollCycle {
            sequence: 4,
            started_at: now,
            finished_at: now,
            outcome,
        }
    }

    #[test]
    fn table_line_summarises_ready_state() {
        let snapshot = status();
        let state = CoordinatorState::Ready(Arc::clone(&snapshot));
        let line = render_cycle(
            OutputFormat::Table,
            &state,
            &cycle(CycleOutcome::Success(snapshot)),
            false,
        )
        .unwrap();

        assert!(line.starts_with("#4"));
        assert!(line.contains("READY"));
        assert!(line.contains("armed_home"));
        assert!(line.contains("1/1 sensors active"));
    }

    #[test]
    fn plain_line_reports_failure_class() {
        let failure = Failure {
            class: FailureClass::Timeout,
            message: "gateway timeout".into(),
        };
        let state = CoordinatorState::Unavailable(failure.clone());
        let line = render_cycle(
            OutputFormat::Plain,
            &state,
            &cycle(CycleOutcome::Failure(failure)),
            false,
        )
        .unwrap();

        assert_eq!(line, "4\tunavailable\ttimeout");
    }

    #[test]
    fn json_cycle_carries_state_and_sequence() {
        let snapshot = status();
        let state = CoordinatorState::Ready(Arc::clone(&snapshot));
        let json = render_cycle(
            OutputFormat::JsonCompact,
            &state,
            &cycle(CycleOutcome::Success(snapshot)),
            false,
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["sequence"], 4);
        assert_eq!(value["state"], "ready");
        assert_eq!(value["data"]["armed_status"], "armed_home");
    }

    #[test]
    fn check_table_lists_sensors() {
        let state = CoordinatorState::Ready(status());
        let out = render_check(OutputFormat::Table, &state, &PollStats::default(), false).unwrap();

        assert!(out.contains("Hallway"));
        assert!(out.contains("motion"));
    }
}
