use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::model::{SystemConfig, SystemStatus};
use crate::protocol::{
    manual_activity_data, resolve_hold, set_mode_data, unwrap_envelope, ApiRevision, HoldCommand,
    HoldRequest, CONFIG_PATH, DEFAULT_PORT, STATUS_PATH,
};
use crate::schedule;
use crate::types::*;
use crate::zone::{reconcile, ConfigView, StatusView, ZoneState};
use crate::{Error, Result};

type SnapshotCallback = Box<dyn Fn(&ZoneState) + Send + Sync>;

/// Requested setpoint change. `temperature` is the single target of heat or
/// cool mode; `low`/`high` are the heat and cool setpoints of auto mode.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SetpointRequest {
    pub temperature: Option<Temperature>,
    pub low: Option<Temperature>,
    pub high: Option<Temperature>,
}

impl SetpointRequest {
    pub fn target(temperature: Temperature) -> Self {
        Self {
            temperature: Some(temperature),
            ..Default::default()
        }
    }

    pub fn range(low: Temperature, high: Temperature) -> Self {
        Self {
            temperature: None,
            low: Some(low),
            high: Some(high),
        }
    }
}

pub struct InfinitudeClientBuilder {
    host: String,
    port: u16,
    protocol: String,
    revision: ApiRevision,
    config_path: String,
    snapshot_callbacks: Vec<SnapshotCallback>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl InfinitudeClientBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            protocol: "http".to_string(),
            revision: ApiRevision::default(),
            config_path: CONFIG_PATH.to_string(),
            snapshot_callbacks: Vec::new(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn protocol(mut self, proto: &str) -> Self {
        self.protocol = proto.to_string();
        self
    }

    pub fn revision(mut self, revision: ApiRevision) -> Self {
        self.revision = revision;
        self
    }

    pub fn config_path(mut self, path: &str) -> Self {
        self.config_path = path.to_string();
        self
    }

    /// Called with a zone's state after every refresh and every local update.
    pub fn on_snapshot(mut self, f: impl Fn(&ZoneState) + Send + Sync + 'static) -> Self {
        self.snapshot_callbacks.push(Box::new(f));
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<InfinitudeClient> {
        let http = reqwest::Client::builder().build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, &path)?),
            _ => None,
        };

        Ok(InfinitudeClient {
            http,
            base_url: format!("{}://{}:{}", self.protocol, self.host, self.port),
            revision: self.revision,
            config_path: self.config_path,
            status: None,
            config: None,
            zones: Vec::new(),
            snapshot_callbacks: self.snapshot_callbacks,
            logger,
        })
    }
}

/// Client for one thermostat behind an Infinitude proxy.
///
/// Holds the last successful status/config snapshot and the effective state
/// of every enabled zone derived from it.
pub struct InfinitudeClient {
    http: reqwest::Client,
    base_url: String,
    revision: ApiRevision,
    config_path: String,
    status: Option<SystemStatus>,
    config: Option<SystemConfig>,
    zones: Vec<ZoneState>,
    snapshot_callbacks: Vec<SnapshotCallback>,
    logger: Option<MessageLogger>,
}

impl InfinitudeClient {
    pub fn builder(host: impl Into<String>) -> InfinitudeClientBuilder {
        InfinitudeClientBuilder::new(host)
    }

    pub fn revision(&self) -> ApiRevision {
        self.revision
    }

    pub fn zones(&self) -> &[ZoneState] {
        &self.zones
    }

    pub fn zone(&self, zone_id: u32) -> Option<&ZoneState> {
        self.zones.iter().find(|z| z.id == zone_id)
    }

    pub fn system_status(&self) -> Option<&SystemStatus> {
        self.status.as_ref()
    }

    pub fn system_config(&self) -> Option<&SystemConfig> {
        self.config.as_ref()
    }

    pub async fn fetch_status(&mut self) -> Result<SystemStatus> {
        let data = self.get_json(STATUS_PATH).await?;
        SystemStatus::from_json(&data)
    }

    pub async fn fetch_config(&mut self) -> Result<SystemConfig> {
        let path = self.config_path.clone();
        let data = self.get_json(&path).await?;
        SystemConfig::from_json(&data)
    }

    /// Ids of the zones the thermostat reports as enabled.
    pub async fn discover_zones(&mut self) -> Result<Vec<u32>> {
        let status = self.fetch_status().await?;
        Ok(status.zones.iter().filter(|z| z.enabled).map(|z| z.id).collect())
    }

    /// Fetch status and config and rebuild every enabled zone.
    ///
    /// On a transport or data error the previous snapshot stays in place.
    /// A zone whose config is missing keeps its previous state; the first
    /// such error is returned after the other zones are updated.
    pub async fn refresh(&mut self) -> Result<()> {
        let (status, config) = match self.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping previous state");
                return Err(e);
            }
        };

        let mut zones = Vec::new();
        let mut first_error = None;
        for zone_status in status.zones.iter().filter(|z| z.enabled) {
            match build_zone(&status, &config, zone_status.id) {
                Ok(state) => zones.push(state),
                Err(e) => {
                    warn!(zone = zone_status.id, error = %e, "zone refresh failed");
                    if let Some(prev) = self.zone(zone_status.id) {
                        zones.push(prev.clone());
                    }
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        debug!(zones = zones.len(), local_time = %status.local_time, "refreshed");
        self.status = Some(status);
        self.config = Some(config);
        self.zones = zones;

        for zone in &self.zones {
            for cb in &self.snapshot_callbacks {
                cb(zone);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn fetch_snapshot(&mut self) -> Result<(SystemStatus, SystemConfig)> {
        let status = self.fetch_status().await?;
        let config = self.fetch_config().await?;
        Ok((status, config))
    }

    // -- Command methods --

    /// Set the system-wide operating mode. Does not touch holds.
    pub async fn set_operating_mode(&mut self, mode: OperatingMode) -> Result<()> {
        if let Some(config) = self.config.as_mut() {
            config.mode = mode.as_infinitude_str().to_string();
        }
        let ids: Vec<u32> = self.zones.iter().map(|z| z.id).collect();
        for id in ids {
            self.rebuild_zone_or_warn(id);
        }
        self.post_json("set_operating_mode", CONFIG_PATH, set_mode_data(mode))
            .await
    }

    /// Change setpoints through the manual activity and hold it until the
    /// next program change.
    pub async fn set_temperature(&mut self, zone_id: u32, request: SetpointRequest) -> Result<()> {
        let state = self.find_zone(zone_id)?;
        let unit = state.unit;

        let mut heat = request.low;
        let mut cool = request.high;
        if let Some(target) = request.temperature {
            match (state.operating_mode, state.hvac_action) {
                (OperatingMode::Heat, _) | (OperatingMode::Auto, HvacAction::Heating) => {
                    heat = Some(target)
                }
                (OperatingMode::Cool, _) | (OperatingMode::Auto, HvacAction::Cooling) => {
                    cool = Some(target)
                }
                (mode, action) => {
                    debug!(zone = zone_id, ?mode, ?action, "single target does not apply, ignoring");
                }
            }
        }
        if heat.is_none() && cool.is_none() {
            return Err(Error::InvalidMode(format!(
                "no setpoint applies in {} mode",
                state.operating_mode.as_infinitude_str()
            )));
        }

        let heat = heat.or(state.heat_setpoint).map(|t| t.to_device_value(unit));
        let cool = cool.or(state.cool_setpoint).map(|t| t.to_device_value(unit));
        let fan = state.fan_mode;
        self.write_manual_activity("set_temperature", zone_id, heat, cool, fan)
            .await
    }

    /// Change the fan through the manual activity, keeping current setpoints,
    /// and hold it until the next program change.
    pub async fn set_fan_mode(&mut self, zone_id: u32, fan: FanMode) -> Result<()> {
        let state = self.find_zone(zone_id)?;
        let unit = state.unit;
        let heat = state.heat_setpoint.map(|t| t.to_device_value(unit));
        let cool = state.cool_setpoint.map(|t| t.to_device_value(unit));
        self.write_manual_activity("set_fan_mode", zone_id, heat, cool, fan)
            .await
    }

    /// Apply a hold transition. Omitted request fields default from the
    /// zone's current state.
    pub async fn set_hold_mode(&mut self, zone_id: u32, request: HoldRequest) -> Result<()> {
        let command = resolve_hold(self.find_zone(zone_id)?, request);
        self.write_hold("set_hold_mode", zone_id, command).await
    }

    pub async fn set_preset_mode(&mut self, zone_id: u32, preset: Preset) -> Result<()> {
        let request = match preset {
            Preset::Schedule => HoldRequest::new(HoldMode::Schedule),
            Preset::Hold => HoldRequest::new(HoldMode::Hold),
            other => match other.activity() {
                Some(activity) => HoldRequest::new(HoldMode::HoldUntil).activity(activity),
                None => return Err(Error::InvalidMode(other.to_string())),
            },
        };
        let command = resolve_hold(self.find_zone(zone_id)?, request);
        self.write_hold("set_preset_mode", zone_id, command).await
    }

    /// Away on is an indefinite hold on the away activity; off resumes the program.
    pub async fn set_away(&mut self, zone_id: u32, away: bool) -> Result<()> {
        let request = if away {
            HoldRequest::new(HoldMode::Hold).activity(Activity::Away)
        } else {
            HoldRequest::new(HoldMode::Schedule)
        };
        let command = resolve_hold(self.find_zone(zone_id)?, request);
        self.write_hold("set_away", zone_id, command).await
    }

    // -- Helpers --

    fn find_zone(&self, zone_id: u32) -> Result<&ZoneState> {
        self.zone(zone_id).ok_or(Error::InvalidZone(zone_id))
    }

    async fn write_manual_activity(
        &mut self,
        action: &str,
        zone_id: u32,
        heat: Option<f64>,
        cool: Option<f64>,
        fan: FanMode,
    ) -> Result<()> {
        let hold = resolve_hold(
            self.find_zone(zone_id)?,
            HoldRequest::new(HoldMode::HoldUntil).activity(Activity::Manual),
        );

        if let Some(zone) = self.config.as_mut().and_then(|c| c.zone_mut(zone_id)) {
            let manual = zone.manual_activity_mut();
            manual.heat_setpoint = heat.or(manual.heat_setpoint);
            manual.cool_setpoint = cool.or(manual.cool_setpoint);
            manual.fan = Some(fan.as_infinitude_str().to_string());
        }

        let data = manual_activity_data(heat, cool, Some(fan));
        let path = self.revision.manual_activity_path(zone_id);
        self.apply_hold_locally(zone_id, &hold);
        self.post_json(action, &path, data).await?;

        let path = self.revision.hold_path(zone_id);
        self.post_json(action, &path, hold.to_data()).await
    }

    async fn write_hold(&mut self, action: &str, zone_id: u32, hold: HoldCommand) -> Result<()> {
        self.apply_hold_locally(zone_id, &hold);
        let path = self.revision.hold_path(zone_id);
        self.post_json(action, &path, hold.to_data()).await
    }

    fn apply_hold_locally(&mut self, zone_id: u32, hold: &HoldCommand) {
        if let Some(zone) = self.config.as_mut().and_then(|c| c.zone_mut(zone_id)) {
            zone.hold = hold.hold;
            zone.hold_activity = hold.activity.map(|a| a.as_infinitude_str().to_string());
            zone.hold_until = hold.until;
        }
        self.rebuild_zone_or_warn(zone_id);
    }

    /// Local updates never block the write; a zone that cannot be rebuilt
    /// keeps its previous state until the next refresh.
    fn rebuild_zone_or_warn(&mut self, zone_id: u32) {
        if let Err(e) = self.rebuild_zone(zone_id) {
            warn!(zone = zone_id, error = %e, "local update skipped");
        }
    }

    /// Re-derive a zone from the mirrored status/config after a local update.
    fn rebuild_zone(&mut self, zone_id: u32) -> Result<()> {
        let (Some(status), Some(config)) = (self.status.as_ref(), self.config.as_ref()) else {
            return Err(Error::InvalidZone(zone_id));
        };
        let state = build_zone(status, config, zone_id)?;
        trace!(zone = zone_id, ?state, "local update");

        for cb in &self.snapshot_callbacks {
            cb(&state);
        }
        match self.zones.iter_mut().find(|z| z.id == zone_id) {
            Some(existing) => *existing = state,
            None => self.zones.push(state),
        }
        Ok(())
    }

    async fn get_json(&mut self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "fetching");

        if let Some(ref mut logger) = self.logger {
            logger.log_request("GET", path, None);
        }

        let resp = self.http.get(&url).send().await?.error_for_status()?;
        let status = resp.status().as_u16();
        let body: Value = serde_json::from_str(&resp.text().await?)?;

        if let Some(ref mut logger) = self.logger {
            logger.log_response(path, status, &body);
        }

        Ok(unwrap_envelope(body))
    }

    async fn post_json(&mut self, action: &str, path: &str, data: Value) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, action, "posting");

        if let Some(ref mut logger) = self.logger {
            logger.log_request("POST", path, Some(&data));
        }

        let resp = self
            .http
            .post(&url)
            .json(&data)
            .send()
            .await?
            .error_for_status()?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;

        if let Some(ref mut logger) = self.logger {
            let body = if text.trim().is_empty() {
                Value::Object(Map::new())
            } else {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            };
            logger.log_response(path, status, &body);
        }
        Ok(())
    }
}

fn build_zone(status: &SystemStatus, config: &SystemConfig, zone_id: u32) -> Result<ZoneState> {
    let zone_status = status.zone(zone_id).ok_or(Error::InvalidZone(zone_id))?;
    let zone_config = config
        .zone(zone_id)
        .ok_or_else(|| Error::MissingField(format!("config for zone {zone_id}")))?;
    let lookahead = schedule::resolve(&zone_config.program, status.local_time);
    Ok(reconcile(
        &StatusView {
            system: status,
            zone: zone_status,
        },
        &ConfigView {
            system: config,
            zone: zone_config,
        },
        &lookahead,
    ))
}
