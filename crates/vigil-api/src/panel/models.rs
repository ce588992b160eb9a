// Panel API response types
//
// Wire shapes returned by the status and login endpoints. Unknown
// strings map to catch-all variants so a firmware update on the panel
// side never turns into a deserialization failure.

use serde::{Deserialize, Serialize};

/// Response body of `POST /api/login`.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub token: String,
}

/// Arming state reported by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmState {
    Disarmed,
    ArmedHome,
    ArmedAway,
    Triggered,
    #[serde(other)]
    Unknown,
}

impl ArmState {
    pub fn is_armed(self) -> bool {
        matches!(self, Self::ArmedHome | Self::ArmedAway)
    }
}

impl std::fmt::Display for ArmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Disarmed => "disarmed",
            Self::ArmedHome => "armed_home",
            Self::ArmedAway => "armed_away",
            Self::Triggered => "triggered",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Sensor category as reported by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Door,
    Motion,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Door => "door",
            Self::Motion => "motion",
            Self::Other => "other",
        })
    }
}

/// A single sensor attached to the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_sensor_kind")]
    pub kind: SensorKind,
    /// Door open / motion detected.
    #[serde(default)]
    pub active: bool,
}

fn default_sensor_kind() -> SensorKind {
    SensorKind::Other
}

/// Full status payload of `GET /api/panel/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelStatus {
    #[serde(rename = "armed_status")]
    pub armed: ArmState,
    #[serde(default = "default_online")]
    pub online: bool,
    #[serde(default)]
    pub sensors: Vec<Sensor>,
}

fn default_online() -> bool {
    true
}

impl PanelStatus {
    /// Sensors currently reporting open doors or detected motion.
    pub fn active_sensors(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.iter().filter(|s| s.active)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::{ArmState, PanelStatus, SensorKind};

    #[test]
    fn unknown_strings_fall_back() {
        let status: PanelStatus = serde_json::from_value(json!({
            "armed_status": "armed_night",
            "sensors": [{ "id": "s9", "kind": "smoke", "active": true }]
        }))
        .unwrap();

        assert_eq!(status.armed, ArmState::Unknown);
        assert!(status.online);
        assert_eq!(status.sensors[0].kind, SensorKind::Other);
        assert_eq!(status.active_sensors().count(), 1);
    }

    #[test]
    fn arm_state_display_matches_wire_name() {
        assert_eq!(ArmState::ArmedAway.to_string(), "armed_away");
        assert!(ArmState::ArmedHome.is_armed());
        assert!(!ArmState::Triggered.is_armed());
    }
}
