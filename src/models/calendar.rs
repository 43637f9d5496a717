use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

/// Per-day occupancy summary. A day is occupied if it carries an explicit
/// busy marker or at least one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DaySummary {
    pub occupied: bool,
    pub task_count: u32,
}

/// day number -> summary, for one (user, year, month). Days with neither a
/// marker nor tasks are absent from the map.
pub type MonthView = BTreeMap<u32, DaySummary>;

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2024, 1), 31);
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 12), 31);
    }

    #[test]
    fn invalid_month_yields_zero() {
        assert_eq!(days_in_month(2024, 13), 0);
    }
}
