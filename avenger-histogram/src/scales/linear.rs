use super::array;

/// A linear scale that maps numeric input values from a domain to a pixel range.
///
/// Domains are kept in `f64` so epoch-millisecond dates survive without loss; the
/// range is in `f32` pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearScale {
    domain_start: f64,
    domain_end: f64,
    range_start: f32,
    range_end: f32,
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f32, f32)) -> Self {
        Self {
            domain_start: domain.0,
            domain_end: domain.1,
            range_start: range.0,
            range_end: range.1,
        }
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.domain_start, self.domain_end)
    }

    pub fn range(&self) -> (f32, f32) {
        (self.range_start, self.range_end)
    }

    fn is_degenerate(&self) -> bool {
        self.domain_start == self.domain_end
            || self.domain_start.is_nan()
            || self.domain_end.is_nan()
            || self.range_start.is_nan()
            || self.range_end.is_nan()
    }

    /// Extends the domain to nice round numbers for better tick selection
    pub fn nice(mut self, count: Option<usize>) -> Self {
        if self.domain_start == self.domain_end
            || self.domain_start.is_nan()
            || self.domain_end.is_nan()
        {
            return self;
        }

        let ascending = self.domain_start <= self.domain_end;
        let (mut start, mut stop) = if ascending {
            (self.domain_start, self.domain_end)
        } else {
            (self.domain_end, self.domain_start)
        };

        let count = count.unwrap_or(10) as f64;
        let mut prestep = 0.0;
        for _ in 0..10 {
            let step = array::tick_increment(start, stop, count);
            if step == prestep {
                break;
            } else if step > 0.0 {
                start = (start / step).floor() * step;
                stop = (stop / step).ceil() * step;
            } else if step < 0.0 {
                start = (start * step).ceil() / step;
                stop = (stop * step).floor() / step;
            } else {
                break;
            }
            prestep = step;
        }

        if ascending {
            self.domain_start = start;
            self.domain_end = stop;
        } else {
            self.domain_start = stop;
            self.domain_end = start;
        }
        self
    }

    /// Maps a domain value to the range
    pub fn scale(&self, value: f64) -> f32 {
        if self.is_degenerate() {
            return self.range_start;
        }
        let t = (value - self.domain_start) / (self.domain_end - self.domain_start);
        self.range_start + (t as f32) * (self.range_end - self.range_start)
    }

    /// Evenly spaced tick values within the domain
    pub fn ticks(&self, count: Option<usize>) -> Vec<f64> {
        array::ticks(
            self.domain_start,
            self.domain_end,
            count.unwrap_or(10) as f64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_scale() {
        let scale = LinearScale::new((10.0, 30.0), (0.0, 100.0));
        assert_approx_eq!(f32, scale.scale(10.0), 0.0);
        assert_approx_eq!(f32, scale.scale(20.0), 50.0);
        // Values outside the domain extrapolate
        assert_approx_eq!(f32, scale.scale(40.0), 150.0);
    }

    #[test]
    fn test_reversed_range() {
        let scale = LinearScale::new((0.0, 10.0), (400.0, 0.0));
        assert_approx_eq!(f32, scale.scale(0.0), 400.0);
        assert_approx_eq!(f32, scale.scale(10.0), 0.0);
        assert_approx_eq!(f32, scale.scale(2.5), 300.0);
    }

    #[test]
    fn test_degenerate_domain() {
        let scale = LinearScale::new((5.0, 5.0), (0.0, 100.0));
        assert_eq!(scale.scale(5.0), 0.0);
        assert_eq!(scale.scale(50.0), 0.0);
    }

    #[test]
    fn test_nice() {
        let scale = LinearScale::new((0.0, 7.0), (0.0, 1.0)).nice(None);
        assert_eq!(scale.domain(), (0.0, 7.0));

        let scale = LinearScale::new((0.0, 93.0), (0.0, 1.0)).nice(None);
        assert_eq!(scale.domain(), (0.0, 100.0));

        let scale = LinearScale::new((1.1, 10.9), (0.0, 1.0)).nice(Some(10));
        assert_eq!(scale.domain(), (1.0, 11.0));

        let scale = LinearScale::new((0.0, 0.93), (0.0, 1.0)).nice(Some(10));
        assert_eq!(scale.domain(), (0.0, 1.0));
    }

    #[test]
    fn test_ticks() {
        let scale = LinearScale::new((0.0, 4.0), (0.0, 1.0));
        assert_eq!(scale.ticks(Some(4)), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }
}
