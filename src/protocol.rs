use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::field;
use crate::types::{Activity, FanMode, HoldMode, OperatingMode};
use crate::zone::ZoneState;

pub const DEFAULT_PORT: u16 = 3000;
pub const STATUS_PATH: &str = "/api/status";
pub const CONFIG_PATH: &str = "/api/config";

/// Write-path layout of the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiRevision {
    /// Zones addressed by one-based id, manual activity by name.
    #[default]
    Legacy,
    /// Zones and activities addressed by zero-based list index.
    Indexed,
}

impl ApiRevision {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "legacy" => Some(ApiRevision::Legacy),
            "indexed" => Some(ApiRevision::Indexed),
            _ => None,
        }
    }

    pub fn hold_path(&self, zone_id: u32) -> String {
        match self {
            ApiRevision::Legacy => format!("/api/config/zones/{zone_id}/"),
            ApiRevision::Indexed => format!("/api/config/zones/zone/{}/", zone_index(zone_id)),
        }
    }

    pub fn manual_activity_path(&self, zone_id: u32) -> String {
        match self {
            ApiRevision::Legacy => format!("/api/config/zones/{zone_id}/activities/manual"),
            ApiRevision::Indexed => format!(
                "/api/config/zones/zone/{}/activities/activity/{}/",
                zone_index(zone_id),
                Activity::Manual.index()
            ),
        }
    }
}

/// Zones are listed in ascending id order starting at 1.
fn zone_index(zone_id: u32) -> u32 {
    zone_id.saturating_sub(1)
}

/// Shape of a proxy response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// Document at the top level.
    Direct,
    /// Wrapped as `{"status": ...}`.
    Status,
    /// Wrapped as `{"data": ...}`.
    Data,
}

impl Envelope {
    pub fn detect(body: &Value) -> Self {
        if body.get("zones").is_some() {
            Envelope::Direct
        } else if body.get("data").is_some() {
            Envelope::Data
        } else if body.get("status").is_some() {
            Envelope::Status
        } else {
            Envelope::Direct
        }
    }

    pub fn key(&self) -> Option<&'static str> {
        match self {
            Envelope::Direct => None,
            Envelope::Status => Some("status"),
            Envelope::Data => Some("data"),
        }
    }

    pub fn unwrap(&self, body: Value) -> Value {
        let Some(key) = self.key() else {
            return body;
        };
        match field::get(&body, key, Some(0)) {
            Some(inner) => inner.clone(),
            None => body,
        }
    }
}

/// Detect the envelope and return the inner document.
pub fn unwrap_envelope(body: Value) -> Value {
    Envelope::detect(&body).unwrap(body)
}

pub fn set_mode_data(mode: OperatingMode) -> Value {
    json!({ "mode": mode.as_infinitude_str() })
}

/// Fully resolved hold write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldCommand {
    pub hold: bool,
    pub activity: Option<Activity>,
    pub until: Option<NaiveTime>,
}

impl HoldCommand {
    pub fn resume_schedule() -> Self {
        Self {
            hold: false,
            activity: None,
            until: None,
        }
    }

    pub fn mode(&self) -> HoldMode {
        HoldMode::from_fields(self.hold, self.until.is_some())
    }

    pub fn to_data(&self) -> Value {
        json!({
            "hold": if self.hold { "on" } else { "off" },
            "holdActivity": self.activity.map(|a| a.as_infinitude_str()),
            "otmr": self.until.map(|t| t.format("%H:%M").to_string()),
        })
    }
}

/// Requested hold transition. Fields left `None` are filled from the
/// zone's current state by [`resolve_hold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldRequest {
    pub mode: HoldMode,
    pub activity: Option<Activity>,
    pub until: Option<NaiveTime>,
}

impl HoldRequest {
    pub fn new(mode: HoldMode) -> Self {
        Self {
            mode,
            activity: None,
            until: None,
        }
    }

    pub fn activity(mut self, activity: Activity) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn until(mut self, until: NaiveTime) -> Self {
        self.until = Some(until);
        self
    }
}

/// Resolve defaults for a hold request against the zone's current state.
///
/// - activity defaults to the zone's current activity;
/// - `until` defaults to the start of the next scheduled period;
/// - a bounded hold with no `until` and no next period becomes indefinite.
pub fn resolve_hold(state: &ZoneState, request: HoldRequest) -> HoldCommand {
    let activity = request.activity.or(state.current_activity);
    match request.mode {
        HoldMode::Schedule => HoldCommand::resume_schedule(),
        HoldMode::Hold => HoldCommand {
            hold: true,
            activity,
            until: None,
        },
        HoldMode::HoldUntil => {
            let until = request
                .until
                .or_else(|| state.next_activity_start().map(|t| t.time()));
            if until.is_none() {
                warn!(zone = state.id, "no next program period, holding indefinitely");
            }
            HoldCommand {
                hold: true,
                activity,
                until,
            }
        }
    }
}

/// Body for the manual activity record. Absent values are left out so the
/// thermostat keeps what it has.
pub fn manual_activity_data(heat: Option<f64>, cool: Option<f64>, fan: Option<FanMode>) -> Value {
    let mut data = Map::new();
    if let Some(h) = heat {
        data.insert("htsp".to_string(), json!(h));
    }
    if let Some(c) = cool {
        data.insert("clsp".to_string(), json!(c));
    }
    if let Some(f) = fan {
        data.insert("fan".to_string(), json!(f.as_infinitude_str()));
    }
    Value::Object(data)
}
