// Panel cloud API
//
// Token-based session (login/logout) plus the status endpoint that the
// coordinator polls.

pub mod auth;
pub mod client;
pub mod models;

pub use client::PanelClient;
pub use models::{ArmState, PanelStatus, Sensor, SensorKind};
