use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::model::{SystemConfig, SystemStatus, ZoneConfig, ZoneStatus};
use crate::schedule::ScheduleLookahead;
use crate::types::*;

/// Live readings for one zone plus the system-wide status around them.
#[derive(Debug, Clone, Copy)]
pub struct StatusView<'a> {
    pub system: &'a SystemStatus,
    pub zone: &'a ZoneStatus,
}

/// Configuration for one zone plus the system-wide config around it.
#[derive(Debug, Clone, Copy)]
pub struct ConfigView<'a> {
    pub system: &'a SystemConfig,
    pub zone: &'a ZoneConfig,
}

/// Effective state of a zone, as exposed to a host automation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneState {
    pub id: u32,
    pub name: String,
    pub unit: TemperatureUnit,
    pub current_temperature: Temperature,
    pub current_humidity: f64,
    /// Raw `zoneconditioning`, e.g. `active_heat`.
    pub conditioning: String,
    pub operating_mode: OperatingMode,
    pub hold: bool,
    pub hold_activity: Option<String>,
    pub hold_until: Option<NaiveTime>,
    pub heat_setpoint: Option<Temperature>,
    pub cool_setpoint: Option<Temperature>,
    pub fan_mode: FanMode,
    pub current_activity: Option<Activity>,
    pub hold_mode: HoldMode,
    pub hvac_action: HvacAction,
    pub preset: Preset,
    pub schedule: ScheduleLookahead,
    pub outdoor_temperature: Option<Temperature>,
    pub airflow_cfm: Option<f64>,
    pub occupancy: Option<String>,
    pub local_time: NaiveDateTime,
}

/// Merge status, config and schedule position into the zone's effective state.
pub fn reconcile(status: &StatusView, config: &ConfigView, schedule: &ScheduleLookahead) -> ZoneState {
    let unit = config.system.temperature_unit;
    let temp = |v: f64| Temperature::new(v, unit);
    let zone_status = status.zone;
    let zone_config = config.zone;

    let operating_mode = OperatingMode::from_infinitude_str(&config.system.mode).unwrap_or_else(|| {
        warn!(mode = %config.system.mode, "unknown operating mode, treating as off");
        OperatingMode::Off
    });

    // Status setpoints and fan lag behind a just-submitted manual override
    // until the thermostat's next cycle.
    let mut heat_setpoint = zone_status.heat_setpoint;
    let mut cool_setpoint = zone_status.cool_setpoint;
    let mut fan = zone_status.fan.clone();
    let mut current_activity = zone_status
        .current_activity
        .as_deref()
        .and_then(Activity::from_infinitude_str);

    let hold_activity = zone_config
        .hold_activity
        .as_deref()
        .and_then(Activity::from_infinitude_str);
    if hold_activity == Some(Activity::Manual)
        && let Some(manual) = zone_config.activity(Activity::Manual)
    {
        current_activity = Some(Activity::Manual);
        heat_setpoint = manual.heat_setpoint.or(heat_setpoint);
        cool_setpoint = manual.cool_setpoint.or(cool_setpoint);
        fan = manual.fan.clone().or(fan);
    }

    let hold_mode = HoldMode::from_fields(zone_config.hold, zone_config.hold_until.is_some());

    // Mode off reports Off even while the conditioning string still names a stage.
    let hvac_action = if operating_mode == OperatingMode::Off {
        HvacAction::Off
    } else {
        HvacAction::from_conditioning(&zone_status.conditioning)
    };

    let scheduled_activity = schedule.scheduled.as_ref().and_then(|p| p.activity());
    let preset = derive_preset(hold_mode, hold_activity, scheduled_activity);

    let fan_mode = match fan.as_deref() {
        Some(s) => FanMode::from_infinitude_str(s).unwrap_or_else(|| {
            warn!(zone = zone_status.id, fan = s, "unknown fan mode, treating as auto");
            FanMode::Auto
        }),
        None => FanMode::Auto,
    };

    ZoneState {
        id: zone_status.id,
        name: zone_status.name.clone(),
        unit,
        current_temperature: temp(zone_status.temperature),
        current_humidity: zone_status.humidity,
        conditioning: zone_status.conditioning.clone(),
        operating_mode,
        hold: zone_config.hold,
        hold_activity: zone_config.hold_activity.clone(),
        hold_until: zone_config.hold_until,
        heat_setpoint: heat_setpoint.map(temp),
        cool_setpoint: cool_setpoint.map(temp),
        fan_mode,
        current_activity,
        hold_mode,
        hvac_action,
        preset,
        schedule: schedule.clone(),
        outdoor_temperature: status.system.outdoor_temperature.map(temp),
        airflow_cfm: status.system.airflow_cfm,
        occupancy: zone_status.occupancy.clone(),
        local_time: status.system.local_time,
    }
}

/// Preset for a hold mode and the activities involved.
///
/// A bounded hold on an activity the crate does not know reads as `Override`.
pub fn derive_preset(
    hold_mode: HoldMode,
    hold_activity: Option<Activity>,
    scheduled_activity: Option<Activity>,
) -> Preset {
    match hold_mode {
        HoldMode::Schedule => scheduled_activity
            .and_then(Preset::from_activity)
            .unwrap_or(Preset::Schedule),
        HoldMode::HoldUntil => hold_activity
            .and_then(Preset::from_activity)
            .unwrap_or(Preset::Override),
        HoldMode::Hold => Preset::Hold,
    }
}

impl ZoneState {
    /// Single target: the active side's setpoint in auto, the mode's setpoint
    /// in heat/cool, and the current temperature when there is no target.
    pub fn target_temperature(&self) -> Temperature {
        let setpoint = match self.operating_mode {
            OperatingMode::Auto => match self.hvac_action {
                HvacAction::Heating => self.heat_setpoint,
                HvacAction::Cooling => self.cool_setpoint,
                _ => None,
            },
            OperatingMode::Heat => self.heat_setpoint,
            OperatingMode::Cool => self.cool_setpoint,
            OperatingMode::Off | OperatingMode::FanOnly => None,
        };
        setpoint.unwrap_or(self.current_temperature)
    }

    pub fn target_temperature_low(&self) -> Option<Temperature> {
        match self.operating_mode {
            OperatingMode::Auto => self.heat_setpoint,
            _ => None,
        }
    }

    pub fn target_temperature_high(&self) -> Option<Temperature> {
        match self.operating_mode {
            OperatingMode::Auto => self.cool_setpoint,
            _ => None,
        }
    }

    pub fn is_on(&self) -> bool {
        self.operating_mode != OperatingMode::Off
    }

    /// Indefinite hold on the away activity. Following an away period of the
    /// program does not count.
    pub fn is_away(&self) -> bool {
        self.hold_mode == HoldMode::Hold && self.hold_activity.as_deref() == Some("away")
    }

    pub fn next_activity_start(&self) -> Option<NaiveDateTime> {
        self.schedule.next.as_ref().map(|p| p.start)
    }

    /// Auxiliary attributes for the host's entity state.
    pub fn attributes(&self) -> Map<String, Value> {
        let fmt_time = |t: &NaiveDateTime| t.format("%Y-%m-%dT%H:%M:%S").to_string();
        let scheduled = self.schedule.scheduled.as_ref();
        let next = self.schedule.next.as_ref();
        let attrs = json!({
            "hvac_state": self.conditioning,
            "current_activity": self.current_activity.map(|a| a.as_infinitude_str()),
            "scheduled_activity": scheduled.map(|p| p.activity.as_str()),
            "scheduled_activity_start": scheduled.map(|p| fmt_time(&p.start)),
            "next_activity": next.map(|p| p.activity.as_str()),
            "next_activity_start": next.map(|p| fmt_time(&p.start)),
            "hold_state": if self.hold { "on" } else { "off" },
            "hold_activity": self.hold_activity,
            "hold_until": self.hold_until.map(|t| t.format("%H:%M").to_string()),
            "hold_mode": self.hold_mode,
            "outdoor_temperature": self.outdoor_temperature.map(|t| t.value()),
            "airflow_cfm": self.airflow_cfm,
            "occupancy": self.occupancy,
        });
        match attrs {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}
