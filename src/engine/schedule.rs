//! Rotation schedule: config section, validated form and the timing state
//! the engine loop drives.
//!
//! All arithmetic runs on naive local wall-clock times, the same clock the
//! user configured `daily_time` against.

use crate::error::ConfigError;
use chrono::{Duration as ChronoDuration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Schedule section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_mode")]
    pub mode: ScheduleMode,
    /// Interval value, interpreted through `interval_unit`.
    #[serde(default = "default_interval")]
    pub interval: i64,
    #[serde(default = "default_interval_unit")]
    pub interval_unit: IntervalUnit,
    /// Time of day for daily mode, `HH:MM`.
    #[serde(default = "default_daily_time")]
    pub daily_time: String,
}

fn default_mode() -> ScheduleMode {
    ScheduleMode::Interval
}

fn default_interval() -> i64 {
    20
}

fn default_interval_unit() -> IntervalUnit {
    IntervalUnit::Minutes
}

fn default_daily_time() -> String {
    "12:00".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            interval: default_interval(),
            interval_unit: default_interval_unit(),
            daily_time: default_daily_time(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    /// Rotate every fixed interval.
    Interval,
    /// Rotate once a day at `daily_time`.
    Daily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
}

impl IntervalUnit {
    fn seconds(self) -> u64 {
        match self {
            IntervalUnit::Seconds => 1,
            IntervalUnit::Minutes => 60,
            IntervalUnit::Hours => 3600,
        }
    }

    pub fn to_duration(self, value: u64) -> Duration {
        Duration::from_secs(value.saturating_mul(self.seconds()))
    }
}

/// Validated form of the schedule section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleSpec {
    Interval(Duration),
    FixedTime(NaiveTime),
}

impl ScheduleSpec {
    /// Validates the schedule section. Interval must be a positive whole
    /// number; daily time must parse as `HH:MM` (seconds tolerated).
    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ConfigError> {
        match config.mode {
            ScheduleMode::Interval => {
                if config.interval <= 0 {
                    return Err(ConfigError::InvalidInterval(config.interval.to_string()));
                }
                Ok(ScheduleSpec::Interval(
                    config.interval_unit.to_duration(config.interval as u64),
                ))
            }
            ScheduleMode::Daily => {
                let time = NaiveTime::parse_from_str(&config.daily_time, "%H:%M")
                    .or_else(|_| NaiveTime::parse_from_str(&config.daily_time, "%H:%M:%S"))
                    .map_err(|_| ConfigError::InvalidTime(config.daily_time.clone()))?;
                Ok(ScheduleSpec::FixedTime(time))
            }
        }
    }

    /// First firing instant when armed at `now`. Fixed-time mode picks the
    /// next occurrence strictly after `now`, rolling to the next day when
    /// today's has already passed.
    pub fn first_fire(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self {
            ScheduleSpec::Interval(d) => add_duration(now, *d),
            ScheduleSpec::FixedTime(time) => {
                let today = now.date().and_time(*time);
                if today > now {
                    today
                } else {
                    today + ChronoDuration::days(1)
                }
            }
        }
    }

    /// Next firing instant after a run that completed at `now`. Fixed-time
    /// mode anchors to the next day's occurrence, so a run that overran its
    /// slot never fires again the same day.
    pub fn next_after_run(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self {
            ScheduleSpec::Interval(d) => add_duration(now, *d),
            ScheduleSpec::FixedTime(time) => {
                let mut next = (now.date() + ChronoDuration::days(1)).and_time(*time);
                while next <= now {
                    next += ChronoDuration::days(1);
                }
                next
            }
        }
    }

    /// Interval mode rotates once immediately on start; daily mode waits
    /// for its slot.
    pub fn fires_on_start(&self) -> bool {
        matches!(self, ScheduleSpec::Interval(_))
    }
}

fn add_duration(now: NaiveDateTime, d: Duration) -> NaiveDateTime {
    ChronoDuration::from_std(d)
        .ok()
        .and_then(|cd| now.checked_add_signed(cd))
        .unwrap_or(NaiveDateTime::MAX)
}

/// Timing state owned by the engine loop.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    spec: ScheduleSpec,
    next_fire: Option<NaiveDateTime>,
    armed: bool,
    busy: bool,
}

impl ScheduleState {
    pub fn armed(spec: ScheduleSpec, now: NaiveDateTime) -> Self {
        let next_fire = Some(spec.first_fire(now));
        Self {
            spec,
            next_fire,
            armed: true,
            busy: false,
        }
    }

    pub fn spec(&self) -> &ScheduleSpec {
        &self.spec
    }

    pub fn next_fire(&self) -> Option<NaiveDateTime> {
        self.next_fire
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Claims the run slot. Returns false when a run is already in flight.
    pub fn begin_run(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    /// Releases the run slot and re-arms from the completion instant.
    pub fn complete_run(&mut self, now: NaiveDateTime) {
        self.busy = false;
        if self.armed {
            self.next_fire = Some(self.spec.next_after_run(now));
        }
    }

    /// Disarms the schedule. Safe to call repeatedly.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.next_fire = None;
    }

    /// Time left until the next fire, measured from `now`.
    pub fn wait_from(&self, now: NaiveDateTime) -> Duration {
        match self.next_fire {
            Some(next) if next > now => (next - now).to_std().unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }
}
