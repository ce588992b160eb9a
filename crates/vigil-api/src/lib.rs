// vigil-api: Async Rust client for alarm-panel cloud services

pub mod error;
pub mod panel;
pub mod transport;

pub use error::Error;
pub use panel::{ArmState, PanelClient, PanelStatus, Sensor, SensorKind};
pub use transport::{TlsMode, TransportConfig};
