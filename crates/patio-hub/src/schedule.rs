//! Device operating schedules and their validation.
//!
//! The stored schedule is the source of truth for the device, so anything
//! that reaches storage must pass [`validate`] first.

use serde::{Deserialize, Serialize};

/// How the device drives its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleType {
    /// Toggle every `interval`.
    TickEvery = 0,
    /// Pulse for `pulsegap` once every `interval`.
    PulseEvery = 1,
    /// Pulse once a day at `tickat`.
    PulseEveryDayAt = 2,
    /// Toggle once a day at `tickat`.
    TickEveryDayAt = 3,
}

impl ScheduleType {
    pub const fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(Self::TickEvery),
            1 => Some(Self::PulseEvery),
            2 => Some(Self::PulseEveryDayAt),
            3 => Some(Self::TickEveryDayAt),
            _ => None,
        }
    }

    pub const fn is_clock_driven(self) -> bool {
        matches!(self, Self::PulseEveryDayAt | Self::TickEveryDayAt)
    }
}

/// Schedule embedded in a device record.
///
/// Field names are the wire names devices and clients use. The schedule type
/// is kept as a raw ordinal so out-of-range input can be represented and
/// rejected. Durations are seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub config: i64,
    #[serde(default)]
    pub tickat: String,
    #[serde(default)]
    pub pulsegap: i64,
    #[serde(default)]
    pub interval: i64,
}

impl Configuration {
    pub const fn schedule_type(&self) -> Option<ScheduleType> {
        ScheduleType::from_ordinal(self.config)
    }

    /// Bytes published to the device.
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Why a configuration is rejected, or `None` when it is consistent.
pub fn rejection_reason(cfg: &Configuration) -> Option<&'static str> {
    let Some(schedule) = cfg.schedule_type() else {
        return Some("schedule type must be between 0 and 3");
    };
    if schedule == ScheduleType::PulseEvery && cfg.interval <= cfg.pulsegap {
        return Some("interval must be greater than pulse gap");
    }
    if schedule.is_clock_driven() && cfg.tickat.is_empty() {
        return Some("clock driven schedules need a tick-at time");
    }
    None
}

/// Check a configuration's internal consistency. Pure, no I/O.
pub fn validate(cfg: &Configuration) -> bool {
    rejection_reason(cfg).is_none()
}
