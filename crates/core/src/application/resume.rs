// Pause clock: computes the next safe admission resume instant
//
// The remote quota resets daily at a fixed wall-clock time in a reference
// timezone. After a rate-limit event the queue pauses until the next
// calendar day at that local time, resolved through the zone database so
// DST transitions cannot produce a resume instant in the past.

use crate::application::constants::{QUOTA_RESET_HOUR, QUOTA_RESET_MINUTE, QUOTA_RESET_TZ};
use crate::domain::DomainError;
use chrono::{DateTime, Days, LocalResult, TimeDelta, TimeZone};
use chrono_tz::Tz;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Recurring daily resume schedule: {timezone, hour, minute}.
#[derive(Debug, Clone)]
pub struct ResumeSchedule {
    tz: Tz,
    hour: u32,
    minute: u32,
}

impl ResumeSchedule {
    pub fn new(tz: Tz, hour: u32, minute: u32) -> Result<Self, DomainError> {
        if hour > 23 || minute > 59 {
            return Err(DomainError::ValidationError(format!(
                "invalid resume time {:02}:{:02}",
                hour, minute
            )));
        }
        Ok(Self { tz, hour, minute })
    }

    /// The remote service's daily quota reset window.
    pub fn quota_reset() -> Self {
        Self {
            tz: QUOTA_RESET_TZ,
            hour: QUOTA_RESET_HOUR,
            minute: QUOTA_RESET_MINUTE,
        }
    }

    /// Next resume instant strictly after `now_millis`: the next calendar
    /// day at the configured local time, as an absolute epoch-ms instant.
    ///
    /// Pure and deterministic given `now_millis` and the configuration.
    pub fn next_resume(&self, now_millis: i64) -> i64 {
        let Some(now_utc) = DateTime::from_timestamp_millis(now_millis) else {
            return now_millis + DAY_MS;
        };
        let local_now = now_utc.with_timezone(&self.tz);

        let Some(next_day) = local_now.date_naive().checked_add_days(Days::new(1)) else {
            return now_millis + DAY_MS;
        };
        let Some(target) = next_day.and_hms_opt(self.hour, self.minute, 0) else {
            return now_millis + DAY_MS;
        };

        let resolved = match self.tz.from_local_datetime(&target) {
            LocalResult::Single(dt) => dt,
            // Clocks rolled back: the wall time occurs twice, resume at
            // the first occurrence
            LocalResult::Ambiguous(earliest, _) => earliest,
            // Clocks rolled forward: the wall time never occurs, resume
            // at the first hour past the gap
            LocalResult::None => {
                match self.tz.from_local_datetime(&(target + TimeDelta::hours(1))) {
                    LocalResult::Single(dt) => dt,
                    LocalResult::Ambiguous(earliest, _) => earliest,
                    LocalResult::None => return now_millis + DAY_MS,
                }
            }
        };

        let resume = resolved.timestamp_millis();
        if resume > now_millis {
            resume
        } else {
            now_millis + DAY_MS
        }
    }
}
