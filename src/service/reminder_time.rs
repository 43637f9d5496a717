use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::errors::BotError;

/// Computes the absolute delivery instant for a reminder: the task's date and
/// local time interpreted in the given IANA timezone, minus the offset.
///
/// DST is handled by the timezone-aware conversion; an ambiguous local time
/// (clocks rolled back) resolves to the earlier mapping, and a local time
/// that does not exist (clocks rolled forward) is an error. Unknown zone
/// names fail with `BotError::Timezone`; the repository catches that and
/// falls back to "now + offset" rather than rejecting the task.
pub fn reminder_instant(
    year: i32,
    month: u32,
    day: u32,
    time: &str,
    offset_minutes: u32,
    tz_name: &str,
) -> Result<DateTime<Utc>, BotError> {
    let tz: Tz = tz_name
        .parse()
        .map_err(|_| BotError::Timezone(tz_name.to_string()))?;
    let local_time = NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| BotError::Validation(format!("bad time of day: {}", time)))?;
    let task_at = tz
        .with_ymd_and_hms(year, month, day, local_time.hour(), local_time.minute(), 0)
        .earliest()
        .ok_or_else(|| {
            BotError::Timezone(format!(
                "{}-{:02}-{:02} {} does not exist in {}",
                year, month, day, time, tz_name
            ))
        })?;
    Ok(task_at.with_timezone(&Utc) - Duration::minutes(i64::from(offset_minutes)))
}

/// Validates a user-supplied IANA zone name.
pub fn validate_timezone(tz_name: &str) -> Result<(), BotError> {
    tz_name
        .parse::<Tz>()
        .map(|_| ())
        .map_err(|_| BotError::Timezone(tz_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn moscow_summer_afternoon() {
        // Moscow is UTC+3 year round: 14:00 local minus 60 min -> 10:00 UTC.
        let instant = reminder_instant(2024, 6, 15, "14:00", 60, "Europe/Moscow").unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap());
    }

    #[test]
    fn new_york_respects_dst() {
        // 2024-01-15 is EST (UTC-5), 2024-07-15 is EDT (UTC-4).
        let winter = reminder_instant(2024, 1, 15, "09:00", 0, "America/New_York").unwrap();
        assert_eq!(winter, Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap());
        let summer = reminder_instant(2024, 7, 15, "09:00", 0, "America/New_York").unwrap();
        assert_eq!(summer, Utc.with_ymd_and_hms(2024, 7, 15, 13, 0, 0).unwrap());
    }

    #[test]
    fn nonexistent_local_time_is_an_error() {
        // US spring-forward: 02:30 on 2024-03-10 never happens in New York.
        let result = reminder_instant(2024, 3, 10, "02:30", 0, "America/New_York");
        assert!(matches!(result, Err(BotError::Timezone(_))));
    }

    #[test]
    fn unknown_zone_is_an_error() {
        let result = reminder_instant(2024, 6, 15, "14:00", 60, "Nowhere/Special");
        assert!(matches!(result, Err(BotError::Timezone(_))));
        assert!(validate_timezone("Nowhere/Special").is_err());
        assert!(validate_timezone("Asia/Tokyo").is_ok());
    }

    #[test]
    fn malformed_time_is_a_validation_error() {
        let result = reminder_instant(2024, 6, 15, "25:99", 60, "Europe/Moscow");
        assert!(matches!(result, Err(BotError::Validation(_))));
    }
}
