//! Interval utilities
//!
//! Engines without an interval type add durations to dates through a
//! `DATEADD(unit, n, date)` style function, which takes a single unit and an
//! integer count. [`interval_increment`] picks that unit for a known
//! duration.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date-part unit accepted by vendor date-add functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
}

impl IntervalUnit {
    pub fn name(self) -> &'static str {
        match self {
            IntervalUnit::Millisecond => "millisecond",
            IntervalUnit::Second => "second",
            IntervalUnit::Minute => "minute",
            IntervalUnit::Hour => "hour",
            IntervalUnit::Day => "day",
        }
    }

    /// Whole number of this unit in `duration`, truncated toward zero.
    pub fn count(self, duration: TimeDelta) -> i64 {
        match self {
            IntervalUnit::Millisecond => duration.num_milliseconds(),
            IntervalUnit::Second => duration.num_seconds(),
            IntervalUnit::Minute => duration.num_minutes(),
            IntervalUnit::Hour => duration.num_hours(),
            IntervalUnit::Day => duration.num_days(),
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Choose the unit and signed count used to add `duration` to a date.
///
/// The finest non-zero component of the duration's magnitude wins, checked
/// in the order millisecond, second, minute, hour. A duration made of whole
/// days (or of nothing) is expressed in days. The count is the whole
/// duration in the chosen unit and carries the duration's sign, so 90
/// minutes is `(Minute, 90)` rather than `(Hour, 1)`.
pub fn interval_increment(duration: TimeDelta) -> (IntervalUnit, i64) {
    let magnitude = duration.abs();

    let unit = if magnitude.num_milliseconds() % 1_000 != 0 {
        IntervalUnit::Millisecond
    } else if magnitude.num_seconds() % 60 != 0 {
        IntervalUnit::Second
    } else if magnitude.num_minutes() % 60 != 0 {
        IntervalUnit::Minute
    } else if magnitude.num_hours() % 24 != 0 {
        IntervalUnit::Hour
    } else {
        IntervalUnit::Day
    };

    (unit, unit.count(duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(n: i64) -> TimeDelta {
        TimeDelta::try_minutes(n).unwrap()
    }

    #[test]
    fn test_finest_component_wins() {
        assert_eq!(interval_increment(minutes(90)), (IntervalUnit::Minute, 90));
        assert_eq!(
            interval_increment(TimeDelta::try_milliseconds(1_500).unwrap()),
            (IntervalUnit::Millisecond, 1_500)
        );
        assert_eq!(
            interval_increment(TimeDelta::try_seconds(3_661).unwrap()),
            (IntervalUnit::Second, 3_661)
        );
    }

    #[test]
    fn test_hours_and_days() {
        assert_eq!(
            interval_increment(TimeDelta::try_hours(26).unwrap()),
            (IntervalUnit::Hour, 26)
        );
        assert_eq!(
            interval_increment(TimeDelta::try_days(3).unwrap()),
            (IntervalUnit::Day, 3)
        );
        assert_eq!(interval_increment(TimeDelta::zero()), (IntervalUnit::Day, 0));
    }

    #[test]
    fn test_negative_duration_keeps_sign() {
        assert_eq!(interval_increment(minutes(-90)), (IntervalUnit::Minute, -90));
        assert_eq!(
            interval_increment(TimeDelta::try_days(-2).unwrap()),
            (IntervalUnit::Day, -2)
        );
    }

    #[test]
    fn test_unit_names() {
        assert_eq!(IntervalUnit::Millisecond.to_string(), "millisecond");
        assert_eq!(IntervalUnit::Day.name(), "day");
    }
}
