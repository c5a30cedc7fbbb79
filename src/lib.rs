mod client;
mod config;
mod error;
pub mod field;
mod logger;
mod model;
mod protocol;
mod schedule;
mod types;
mod zone;

pub use client::{InfinitudeClient, InfinitudeClientBuilder, SetpointRequest};
pub use config::Config;
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use model::*;
pub use protocol::{
    ApiRevision, Envelope, HoldCommand, HoldRequest, manual_activity_data, resolve_hold,
    set_mode_data, unwrap_envelope,
};
pub use schedule::{Period, Program, ScheduleLookahead, ScheduledPeriod, parse_local_time, resolve};
pub use types::*;
pub use zone::{ConfigView, StatusView, ZoneState, derive_preset, reconcile};
