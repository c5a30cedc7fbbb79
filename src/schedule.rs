use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::Serialize;
use serde_json::Value;
use tracing::{trace, warn};

use crate::field;
use crate::types::Activity;
use crate::{Error, Result};

/// Today plus one full week. A program with any enabled period resolves
/// well inside this window.
const MAX_SCAN_DAYS: usize = 8;

/// Length of the `-05:00` style offset the proxy appends to `localTime`.
const TZ_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub time: NaiveTime,
    pub activity: String,
    pub enabled: bool,
}

impl Period {
    pub fn new(time: NaiveTime, activity: impl Into<String>, enabled: bool) -> Self {
        Self {
            time,
            activity: activity.into(),
            enabled,
        }
    }

    fn from_json(data: &Value) -> Option<Self> {
        let time_str = field::str_field(data, "time")?;
        let time = match NaiveTime::parse_from_str(time_str, "%H:%M") {
            Ok(t) => t,
            Err(_) => {
                warn!(time = time_str, "skipping period with unparseable time");
                return None;
            }
        };
        let activity = field::str_field(data, "activity")?.to_string();
        let enabled = field::flag_field(data, "enabled").unwrap_or(false);
        Some(Self::new(time, activity, enabled))
    }
}

/// Weekly program of one zone. Each day's periods are kept ordered by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    days: HashMap<Weekday, Vec<Period>>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_day(mut self, day: Weekday, periods: Vec<Period>) -> Self {
        self.set_day(day, periods);
        self
    }

    pub fn set_day(&mut self, day: Weekday, mut periods: Vec<Period>) {
        periods.sort_by_key(|p| p.time);
        self.days.insert(day, periods);
    }

    pub fn periods(&self, day: Weekday) -> &[Period] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parse `program/day/period` out of a zone config record.
    pub fn from_zone_config(zone_config: &Value) -> Self {
        let mut program = Program::new();
        for day in field::records(zone_config, "program", "day") {
            let Some(id) = field::record_id(day) else {
                warn!("skipping program day without id");
                continue;
            };
            let Ok(weekday) = id.parse::<Weekday>() else {
                warn!(day = %id, "skipping program day with unknown name");
                continue;
            };
            let periods = field::list_field(day, "period")
                .into_iter()
                .filter_map(Period::from_json)
                .collect();
            program.set_day(weekday, periods);
        }
        program
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledPeriod {
    pub activity: String,
    pub start: NaiveDateTime,
}

impl ScheduledPeriod {
    pub fn activity(&self) -> Option<Activity> {
        Activity::from_infinitude_str(&self.activity)
    }
}

/// Program position relative to the device clock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleLookahead {
    /// Most recent enabled period that started strictly before now.
    pub scheduled: Option<ScheduledPeriod>,
    /// Earliest enabled period starting at or after now.
    pub next: Option<ScheduledPeriod>,
}

/// Find the scheduled and next periods of `program` as seen at `now`.
///
/// The scan starts on `now`'s day and moves to midnight of each following
/// day until an enabled period at or after the cursor is found. `scheduled`
/// is only ever taken from the day `now` falls on.
pub fn resolve(program: &Program, now: NaiveDateTime) -> ScheduleLookahead {
    let mut scheduled: Option<ScheduledPeriod> = None;
    let mut cursor = now;

    for _ in 0..MAX_SCAN_DAYS {
        let date = cursor.date();
        for period in program.periods(date.weekday()).iter().filter(|p| p.enabled) {
            let start = date.and_time(period.time);
            if start < cursor {
                scheduled = Some(ScheduledPeriod {
                    activity: period.activity.clone(),
                    start,
                });
            } else {
                let next = ScheduledPeriod {
                    activity: period.activity.clone(),
                    start,
                };
                trace!(?scheduled, ?next, "resolved schedule");
                return ScheduleLookahead {
                    scheduled,
                    next: Some(next),
                };
            }
        }
        let Some(following) = date.succ_opt() else {
            break;
        };
        cursor = following.and_time(NaiveTime::MIN);
    }

    warn!("program has no enabled period within a week");
    ScheduleLookahead {
        scheduled,
        next: None,
    }
}

/// Parse the proxy's `localTime`, e.g. `2024-03-04T09:30:12-05:00` or the
/// hour-truncated `2024-03-04T09-05:00`. The offset is dropped; the stamp is
/// already local.
pub fn parse_local_time(s: &str) -> Result<NaiveDateTime> {
    let stamp = s
        .len()
        .checked_sub(TZ_SUFFIX_LEN)
        .and_then(|end| s.get(..end))
        .ok_or_else(|| Error::InvalidTime(s.to_string()))?;

    if let Ok(dt) = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M") {
        return Ok(dt);
    }
    if let Some((date, hour)) = stamp.split_once('T')
        && let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        && let Ok(hour) = hour.parse::<u32>()
        && let Some(dt) = date.and_hms_opt(hour, 0, 0)
    {
        return Ok(dt);
    }
    Err(Error::InvalidTime(s.to_string()))
}
