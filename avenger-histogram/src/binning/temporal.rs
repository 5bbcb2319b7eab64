use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::{Bin, BinValue};

/// Calendar interval that date values are truncated to before grouping
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DateInterval {
    #[default]
    Day,
    /// Weeks starting on Monday
    Week,
    Month,
    Year,
}

impl DateInterval {
    /// Unit name understood by the query engine's `date_trunc`
    pub fn sql_unit(&self) -> &'static str {
        match self {
            DateInterval::Day => "day",
            DateInterval::Week => "week",
            DateInterval::Month => "month",
            DateInterval::Year => "year",
        }
    }

    /// Start of the interval containing `value`
    pub fn floor(&self, value: NaiveDateTime) -> NaiveDateTime {
        let date = value.date();
        let date = match self {
            DateInterval::Day => date,
            DateInterval::Week => {
                let days = date.weekday().num_days_from_monday();
                date.checked_sub_signed(Duration::days(days as i64))
                    .unwrap_or(date)
            }
            DateInterval::Month => date.with_day(1).unwrap_or(date),
            DateInterval::Year => date.with_ordinal(1).unwrap_or(date),
        };
        date.and_time(chrono::NaiveTime::MIN)
    }

    /// Move `start` forward by `step` intervals. `start` is expected to be floored.
    ///
    /// Returns `None` when the result falls outside the representable calendar.
    pub fn offset(&self, start: NaiveDateTime, step: i32) -> Option<NaiveDateTime> {
        let date = start.date();
        let date = match self {
            DateInterval::Day => date.checked_add_signed(Duration::days(step as i64))?,
            DateInterval::Week => date.checked_add_signed(Duration::weeks(step as i64))?,
            DateInterval::Month => {
                let total_months = (date.year() * 12 + date.month0() as i32).checked_add(step)?;
                NaiveDate::from_ymd_opt(
                    total_months.div_euclid(12),
                    total_months.rem_euclid(12) as u32 + 1,
                    1,
                )?
            }
            DateInterval::Year => NaiveDate::from_ymd_opt(date.year().checked_add(step)?, 1, 1)?,
        };
        Some(date.and_time(start.time()))
    }
}

/// Build contiguous date bins from per-interval counts.
///
/// Keys are interval starts. Intervals between the first and last key that have no
/// values become zero-length bins. An interval whose end lies past the calendar's
/// last instant ends at [`NaiveDateTime::MAX`].
pub fn densify(counts: &BTreeMap<NaiveDateTime, u64>, interval: DateInterval) -> Vec<Bin> {
    let (Some((&first, _)), Some((&last, _))) =
        (counts.first_key_value(), counts.last_key_value())
    else {
        return vec![];
    };

    let mut bins = Vec::new();
    let mut start = interval.floor(first);
    while start <= last {
        let end = interval.offset(start, 1);
        let length = counts.get(&start).copied().unwrap_or(0);
        bins.push(Bin::range(
            BinValue::Date(start),
            BinValue::Date(end.unwrap_or(NaiveDateTime::MAX)),
            length,
        ));
        match end {
            Some(end) => start = end,
            None => break,
        }
    }
    bins
}

/// Count non-null dates per interval
pub fn count_dates(
    values: impl IntoIterator<Item = NaiveDateTime>,
    interval: DateInterval,
) -> BTreeMap<NaiveDateTime, u64> {
    let mut counts = BTreeMap::new();
    for value in values {
        *counts.entry(interval.floor(value)).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_floor() {
        // 2024-03-14 is a Thursday
        let value = dt(2024, 3, 14, 13);
        assert_eq!(DateInterval::Day.floor(value), dt(2024, 3, 14, 0));
        assert_eq!(DateInterval::Week.floor(value), dt(2024, 3, 11, 0));
        assert_eq!(DateInterval::Month.floor(value), dt(2024, 3, 1, 0));
        assert_eq!(DateInterval::Year.floor(value), dt(2024, 1, 1, 0));
    }

    #[test]
    fn test_offset() {
        assert_eq!(
            DateInterval::Day.offset(dt(2024, 2, 28, 0), 2),
            Some(dt(2024, 3, 1, 0))
        );
        assert_eq!(
            DateInterval::Month.offset(dt(2024, 11, 1, 0), 3),
            Some(dt(2025, 2, 1, 0))
        );
        assert_eq!(
            DateInterval::Month.offset(dt(2024, 1, 1, 0), -1),
            Some(dt(2023, 12, 1, 0))
        );
        assert_eq!(
            DateInterval::Year.offset(dt(2024, 1, 1, 0), 1),
            Some(dt(2025, 1, 1, 0))
        );
    }

    #[rstest]
    #[case(DateInterval::Day)]
    #[case(DateInterval::Week)]
    #[case(DateInterval::Month)]
    #[case(DateInterval::Year)]
    fn test_densify_at_calendar_end(#[case] interval: DateInterval) {
        let latest = NaiveDate::MAX.and_hms_opt(12, 0, 0).unwrap();
        let floored = interval.floor(latest);
        assert_eq!(interval.offset(floored, 1), None);

        let counts = count_dates([latest], interval);
        let bins = densify(&counts, interval);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].length, 1);
        assert_eq!(bins[0].x0, BinValue::Date(floored));
        assert_eq!(bins[0].x1, BinValue::Date(NaiveDateTime::MAX));
    }

    #[test]
    fn test_densify_fills_gaps() {
        let counts = count_dates(
            [dt(2024, 1, 1, 5), dt(2024, 1, 1, 9), dt(2024, 1, 3, 0)],
            DateInterval::Day,
        );
        let bins = densify(&counts, DateInterval::Day);
        let lengths: Vec<u64> = bins.iter().map(|b| b.length).collect();
        assert_eq!(lengths, vec![2, 0, 1]);
        assert_eq!(bins[0].x0, BinValue::Date(dt(2024, 1, 1, 0)));
        assert_eq!(bins[2].x1, BinValue::Date(dt(2024, 1, 4, 0)));
        // Contiguous
        for pair in bins.windows(2) {
            assert_eq!(pair[0].x1, pair[1].x0);
        }
    }

    #[test]
    fn test_densify_empty() {
        assert!(densify(&BTreeMap::new(), DateInterval::Month).is_empty());
    }

    #[test]
    fn test_interval_strings() {
        assert_eq!(DateInterval::default(), DateInterval::Day);
        assert_eq!("week".parse::<DateInterval>().unwrap(), DateInterval::Week);
        assert_eq!(DateInterval::Month.sql_unit(), "month");
    }
}
