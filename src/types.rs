use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "F")]
    Fahrenheit,
    #[serde(rename = "C")]
    Celsius,
}

impl TemperatureUnit {
    pub fn from_infinitude_str(s: &str) -> Option<Self> {
        match s {
            "F" | "f" => Some(TemperatureUnit::Fahrenheit),
            "C" | "c" => Some(TemperatureUnit::Celsius),
            _ => None,
        }
    }

    pub fn as_infinitude_str(&self) -> &'static str {
        match self {
            TemperatureUnit::Fahrenheit => "F",
            TemperatureUnit::Celsius => "C",
        }
    }
}

/// Temperature in the unit the thermostat is configured for (`cfgem`).
/// Setpoint writes use the thermostat's precision: F to whole degrees,
/// C to 0.5 increments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Temperature {
    value: f64,
    unit: TemperatureUnit,
}

impl Temperature {
    pub fn new(value: f64, unit: TemperatureUnit) -> Self {
        Self { value, unit }
    }

    pub fn from_celsius(c: f64) -> Self {
        Self::new(c, TemperatureUnit::Celsius)
    }

    pub fn from_fahrenheit(f: f64) -> Self {
        Self::new(f, TemperatureUnit::Fahrenheit)
    }

    /// Raw reading in the device unit.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    pub fn celsius(&self) -> f64 {
        match self.unit {
            TemperatureUnit::Celsius => self.value,
            TemperatureUnit::Fahrenheit => (self.value - 32.0) * (5.0 / 9.0),
        }
    }

    pub fn fahrenheit(&self) -> f64 {
        match self.unit {
            TemperatureUnit::Celsius => self.value * (9.0 / 5.0) + 32.0,
            TemperatureUnit::Fahrenheit => self.value,
        }
    }

    /// Convert to `unit`, keeping full precision.
    pub fn to_unit(&self, unit: TemperatureUnit) -> Self {
        match unit {
            TemperatureUnit::Celsius => Self::from_celsius(self.celsius()),
            TemperatureUnit::Fahrenheit => Self::from_fahrenheit(self.fahrenheit()),
        }
    }

    /// Value as written to an activity record in `unit`.
    pub fn to_device_value(&self, unit: TemperatureUnit) -> f64 {
        match unit {
            TemperatureUnit::Celsius => (self.celsius() * 2.0).round() / 2.0,
            TemperatureUnit::Fahrenheit => self.fahrenheit().round(),
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}{}", self.value, self.unit.as_infinitude_str())
    }
}

/// System-wide operating mode (`mode` in the system config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    Auto,
    Heat,
    Cool,
    Off,
    FanOnly,
}

impl OperatingMode {
    pub const ALL: [OperatingMode; 5] = [
        OperatingMode::Auto,
        OperatingMode::Heat,
        OperatingMode::Cool,
        OperatingMode::Off,
        OperatingMode::FanOnly,
    ];

    pub fn as_infinitude_str(&self) -> &'static str {
        match self {
            OperatingMode::Auto => "auto",
            OperatingMode::Heat => "heat",
            OperatingMode::Cool => "cool",
            OperatingMode::Off => "off",
            OperatingMode::FanOnly => "fanonly",
        }
    }

    pub fn from_infinitude_str(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(OperatingMode::Auto),
            "heat" => Some(OperatingMode::Heat),
            "cool" => Some(OperatingMode::Cool),
            "off" => Some(OperatingMode::Off),
            "fanonly" => Some(OperatingMode::FanOnly),
            _ => None,
        }
    }
}

/// Fan setting as displayed. The thermostat stores `Auto` as `"off"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanMode {
    #[default]
    Auto,
    Low,
    Med,
    High,
}

impl FanMode {
    pub const ALL: [FanMode; 4] = [FanMode::Auto, FanMode::High, FanMode::Med, FanMode::Low];

    pub fn as_infinitude_str(&self) -> &'static str {
        match self {
            FanMode::Auto => "off",
            FanMode::Low => "low",
            FanMode::Med => "med",
            FanMode::High => "high",
        }
    }

    pub fn from_infinitude_str(s: &str) -> Option<Self> {
        match s {
            "off" | "auto" => Some(FanMode::Auto),
            "low" => Some(FanMode::Low),
            "med" => Some(FanMode::Med),
            "high" => Some(FanMode::High),
            _ => None,
        }
    }

    pub fn as_display_str(&self) -> &'static str {
        match self {
            FanMode::Auto => "auto",
            other => other.as_infinitude_str(),
        }
    }
}

/// Named activity bundle of setpoints and fan speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Home,
    Away,
    Sleep,
    Wake,
    Manual,
}

impl Activity {
    pub const ALL: [Activity; 5] = [
        Activity::Home,
        Activity::Away,
        Activity::Sleep,
        Activity::Wake,
        Activity::Manual,
    ];

    pub fn as_infinitude_str(&self) -> &'static str {
        match self {
            Activity::Home => "home",
            Activity::Away => "away",
            Activity::Sleep => "sleep",
            Activity::Wake => "wake",
            Activity::Manual => "manual",
        }
    }

    pub fn from_infinitude_str(s: &str) -> Option<Self> {
        match s {
            "home" => Some(Activity::Home),
            "away" => Some(Activity::Away),
            "sleep" => Some(Activity::Sleep),
            "wake" => Some(Activity::Wake),
            "manual" => Some(Activity::Manual),
            _ => None,
        }
    }

    /// Position of the activity in the zone's `activities` list.
    pub fn index(&self) -> usize {
        match self {
            Activity::Home => 0,
            Activity::Away => 1,
            Activity::Sleep => 2,
            Activity::Wake => 3,
            Activity::Manual => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldMode {
    /// No hold, the weekly program governs.
    Schedule,
    /// Hold until `otmr`, then the thermostat resumes the program.
    HoldUntil,
    /// Indefinite hold.
    Hold,
}

impl HoldMode {
    pub fn from_fields(hold: bool, until_present: bool) -> Self {
        match (hold, until_present) {
            (false, _) => HoldMode::Schedule,
            (true, true) => HoldMode::HoldUntil,
            (true, false) => HoldMode::Hold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacAction {
    #[default]
    Idle,
    Heating,
    Cooling,
    Off,
}

impl HvacAction {
    /// Derive from `zoneconditioning` (e.g. `active_heat`, `active_cool`, `idle`).
    pub fn from_conditioning(s: &str) -> Self {
        if s.contains("heat") {
            HvacAction::Heating
        } else if s.contains("cool") {
            HvacAction::Cooling
        } else {
            HvacAction::Idle
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Home,
    Away,
    Sleep,
    Wake,
    /// Following the program, scheduled activity is not a named preset.
    Schedule,
    /// Manual activity held until the next program change.
    Override,
    /// Indefinite hold.
    Hold,
}

impl Preset {
    pub const ALL: [Preset; 7] = [
        Preset::Home,
        Preset::Away,
        Preset::Sleep,
        Preset::Wake,
        Preset::Schedule,
        Preset::Override,
        Preset::Hold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Home => "home",
            Preset::Away => "away",
            Preset::Sleep => "sleep",
            Preset::Wake => "wake",
            Preset::Schedule => "schedule",
            Preset::Override => "override",
            Preset::Hold => "hold",
        }
    }

    pub fn from_str_name(s: &str) -> Option<Self> {
        Preset::ALL.into_iter().find(|p| p.as_str() == s)
    }

    /// Preset mirroring a scheduled or held activity, if it has one.
    pub fn from_activity(activity: Activity) -> Option<Self> {
        match activity {
            Activity::Home => Some(Preset::Home),
            Activity::Away => Some(Preset::Away),
            Activity::Sleep => Some(Preset::Sleep),
            Activity::Wake => Some(Preset::Wake),
            Activity::Manual => None,
        }
    }

    pub fn activity(&self) -> Option<Activity> {
        match self {
            Preset::Home => Some(Activity::Home),
            Preset::Away => Some(Activity::Away),
            Preset::Sleep => Some(Activity::Sleep),
            Preset::Wake => Some(Activity::Wake),
            Preset::Override => Some(Activity::Manual),
            Preset::Schedule | Preset::Hold => None,
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
