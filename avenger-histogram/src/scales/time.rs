use chrono::{DateTime, NaiveDateTime};

use super::linear::LinearScale;
use crate::binning::temporal::DateInterval;

/// A scale that maps timestamps to a pixel range, linear in epoch milliseconds
#[derive(Clone, Debug, PartialEq)]
pub struct TimeScale {
    linear: LinearScale,
}

impl TimeScale {
    pub fn new(domain: (NaiveDateTime, NaiveDateTime), range: (f32, f32)) -> Self {
        Self {
            linear: LinearScale::new((to_millis(domain.0), to_millis(domain.1)), range),
        }
    }

    pub fn domain(&self) -> (NaiveDateTime, NaiveDateTime) {
        let (start, end) = self.linear.domain();
        (from_millis(start), from_millis(end))
    }

    pub fn scale(&self, value: NaiveDateTime) -> f32 {
        self.linear.scale(to_millis(value))
    }

    /// Scale an epoch-millisecond position
    pub fn scale_millis(&self, millis: f64) -> f32 {
        self.linear.scale(millis)
    }

    /// Interval starts that fall inside the domain
    pub fn ticks(&self, interval: DateInterval) -> Vec<NaiveDateTime> {
        let (start, end) = self.domain();
        let mut tick = Some(interval.floor(start));
        if tick.is_some_and(|t| t < start) {
            tick = tick.and_then(|t| interval.offset(t, 1));
        }
        let mut ticks = Vec::new();
        while let Some(t) = tick.filter(|t| *t <= end) {
            ticks.push(t);
            tick = interval.offset(t, 1);
        }
        ticks
    }
}

pub fn to_millis(value: NaiveDateTime) -> f64 {
    value.and_utc().timestamp_millis() as f64
}

pub fn from_millis(millis: f64) -> NaiveDateTime {
    DateTime::from_timestamp_millis(millis.round() as i64)
        .unwrap_or_default()
        .naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use float_cmp::assert_approx_eq;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_time_scale() {
        let scale = TimeScale::new((day(1), day(11)), (0.0, 100.0));
        assert_approx_eq!(f32, scale.scale(day(6)), 50.0);
        assert_approx_eq!(f32, scale.scale_millis(to_millis(day(2))), 10.0);
        assert_eq!(scale.domain(), (day(1), day(11)));
    }

    #[test]
    fn test_ticks() {
        let scale = TimeScale::new((day(1), day(4)), (0.0, 100.0));
        assert_eq!(
            scale.ticks(DateInterval::Day),
            vec![day(1), day(2), day(3), day(4)]
        );
        assert_eq!(scale.ticks(DateInterval::Month), vec![day(1)]);
    }

    #[test]
    fn test_ticks_stop_at_calendar_end() {
        let end = NaiveDate::MAX.and_hms_opt(0, 0, 0).unwrap();
        let start = end - chrono::Duration::days(3);
        let scale = TimeScale::new((start, end), (0.0, 100.0));
        assert_eq!(scale.ticks(DateInterval::Day).len(), 4);
        assert_eq!(scale.ticks(DateInterval::Year).len(), 0);
    }
}
