//! Typed views over the proxy's status and config documents.

use chrono::{NaiveDateTime, NaiveTime};
use serde_json::Value;
use tracing::{trace, warn};

use crate::field;
use crate::schedule::{Program, parse_local_time};
use crate::types::{Activity, TemperatureUnit};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatus {
    pub local_time: NaiveDateTime,
    pub mode: Option<String>,
    pub zones: Vec<ZoneStatus>,
    pub airflow_cfm: Option<f64>,
    pub outdoor_temperature: Option<f64>,
}

impl SystemStatus {
    pub fn from_json(data: &Value) -> Result<Self> {
        let local_time = parse_local_time(field::required_str(data, "localTime")?)?;
        let mut zones = Vec::new();
        for record in field::records(data, "zones", "zone") {
            match ZoneStatus::from_json(record) {
                Ok(zone) => zones.push(zone),
                // Disabled zones report placeholder readings; they are never exposed.
                Err(e) if field::flag_field(record, "enabled") == Some(false) => {
                    trace!(error = %e, "skipping unreadable disabled zone");
                }
                Err(e) => return Err(e),
            }
        }
        let airflow_cfm = field::get(data, "idu", Some(0)).and_then(|idu| field::f64_field(idu, "cfm"));

        Ok(Self {
            local_time,
            mode: field::str_field(data, "mode").map(str::to_string),
            zones,
            airflow_cfm,
            outdoor_temperature: field::f64_field(data, "oat"),
        })
    }

    pub fn zone(&self, id: u32) -> Option<&ZoneStatus> {
        self.zones.iter().find(|z| z.id == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneStatus {
    pub id: u32,
    pub name: String,
    pub temperature: f64,
    pub humidity: f64,
    pub conditioning: String,
    pub fan: Option<String>,
    pub heat_setpoint: Option<f64>,
    pub cool_setpoint: Option<f64>,
    pub current_activity: Option<String>,
    pub occupancy: Option<String>,
    pub enabled: bool,
}

impl ZoneStatus {
    pub fn from_json(data: &Value) -> Result<Self> {
        let id = zone_id(data)?;
        Ok(Self {
            id,
            name: field::required_str(data, "name")?.to_string(),
            temperature: field::required_f64(data, "rt")?,
            humidity: field::required_f64(data, "rh")?,
            conditioning: field::str_field(data, "zoneconditioning")
                .unwrap_or("idle")
                .to_string(),
            fan: field::str_field(data, "fan").map(str::to_string),
            heat_setpoint: field::f64_field(data, "htsp"),
            cool_setpoint: field::f64_field(data, "clsp"),
            current_activity: field::str_field(data, "currentActivity").map(str::to_string),
            occupancy: field::str_field(data, "occupancy").map(str::to_string),
            enabled: field::flag_field(data, "enabled").unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemConfig {
    pub mode: String,
    pub temperature_unit: TemperatureUnit,
    pub zones: Vec<ZoneConfig>,
}

impl SystemConfig {
    pub fn from_json(data: &Value) -> Result<Self> {
        let temperature_unit = match field::str_field(data, "cfgem") {
            Some(s) => TemperatureUnit::from_infinitude_str(s).unwrap_or_else(|| {
                warn!(unit = s, "unknown temperature unit, assuming F");
                TemperatureUnit::Fahrenheit
            }),
            None => TemperatureUnit::Fahrenheit,
        };
        let zones = field::records(data, "zones", "zone")
            .into_iter()
            .map(ZoneConfig::from_json)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            mode: field::required_str(data, "mode")?.to_string(),
            temperature_unit,
            zones,
        })
    }

    pub fn zone(&self, id: u32) -> Option<&ZoneConfig> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn zone_mut(&mut self, id: u32) -> Option<&mut ZoneConfig> {
        self.zones.iter_mut().find(|z| z.id == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneConfig {
    pub id: u32,
    pub hold: bool,
    pub hold_activity: Option<String>,
    pub hold_until: Option<NaiveTime>,
    pub activities: Vec<ActivityConfig>,
    pub program: Program,
}

impl ZoneConfig {
    pub fn from_json(data: &Value) -> Result<Self> {
        let id = zone_id(data)?;
        // A present `otmr` always means a bounded hold, so it must parse.
        let hold_until = match field::str_field(data, "otmr") {
            Some(s) => Some(
                NaiveTime::parse_from_str(s, "%H:%M")
                    .map_err(|_| Error::InvalidTime(format!("zone {id} otmr {s}")))?,
            ),
            None => None,
        };
        let activities = field::records(data, "activities", "activity")
            .into_iter()
            .filter_map(ActivityConfig::from_json)
            .collect();

        Ok(Self {
            id,
            hold: field::required_flag(data, "hold")?,
            hold_activity: field::str_field(data, "holdActivity").map(str::to_string),
            hold_until,
            activities,
            program: Program::from_zone_config(data),
        })
    }

    pub fn activity(&self, activity: Activity) -> Option<&ActivityConfig> {
        self.activities.iter().find(|a| a.activity == activity)
    }

    /// The manual activity record, created empty if the proxy did not list one.
    pub fn manual_activity_mut(&mut self) -> &mut ActivityConfig {
        let idx = match self.activities.iter().position(|a| a.activity == Activity::Manual) {
            Some(idx) => idx,
            None => {
                self.activities.push(ActivityConfig::empty(Activity::Manual));
                self.activities.len() - 1
            }
        };
        &mut self.activities[idx]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityConfig {
    pub activity: Activity,
    pub heat_setpoint: Option<f64>,
    pub cool_setpoint: Option<f64>,
    pub fan: Option<String>,
}

impl ActivityConfig {
    pub fn empty(activity: Activity) -> Self {
        Self {
            activity,
            heat_setpoint: None,
            cool_setpoint: None,
            fan: None,
        }
    }

    fn from_json(data: &Value) -> Option<Self> {
        let id = field::record_id(data)?;
        let Some(activity) = Activity::from_infinitude_str(&id) else {
            warn!(activity = %id, "skipping unknown activity");
            return None;
        };
        Some(Self {
            activity,
            heat_setpoint: field::f64_field(data, "htsp"),
            cool_setpoint: field::f64_field(data, "clsp"),
            fan: field::str_field(data, "fan").map(str::to_string),
        })
    }
}

fn zone_id(data: &Value) -> Result<u32> {
    let id = field::record_id(data).ok_or_else(|| Error::MissingField("id".to_string()))?;
    id.parse()
        .map_err(|_| Error::Protocol(format!("zone id is not a number: {id}")))
}
