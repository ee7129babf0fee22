use crate::events::Timestamp;
use chrono::{Duration, Timelike};
use chrono_tz::Tz;

/// Wall-clock cadence of the staleness sweep
///
/// Ticks fall `offset_seconds` past every multiple of `interval_seconds`
/// counted from local midnight in `timezone`. The default (60 s interval,
/// 5 s offset) fires at second 5 of every minute.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchdogSchedule {
    pub interval_seconds: u32,
    pub offset_seconds: u32,
    pub timezone: Tz,
}

impl Default for WatchdogSchedule {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            offset_seconds: 5,
            timezone: chrono_tz::Europe::Paris,
        }
    }
}

impl WatchdogSchedule {
    /// First tick strictly after `now`
    pub fn next_tick_after(&self, now: Timestamp) -> Timestamp {
        let local = now.with_timezone(&self.timezone);
        let elapsed_ms = i64::from(local.num_seconds_from_midnight()) * 1000
            + i64::from(local.timestamp_subsec_millis());
        let interval_ms = i64::from(self.interval_seconds.max(1)) * 1000;
        let offset_ms = i64::from(self.offset_seconds) * 1000;

        let mut candidate = elapsed_ms - elapsed_ms.rem_euclid(interval_ms) + offset_ms;
        if candidate <= elapsed_ms {
            candidate += interval_ms;
        }

        now + Duration::milliseconds(candidate - elapsed_ms)
    }
}
