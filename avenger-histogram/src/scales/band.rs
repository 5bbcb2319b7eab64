use indexmap::IndexSet;

use crate::types::BinKey;

/// A band scale divides a continuous pixel range into uniform bands, one per
/// ordinal bin.
///
/// Bands are keyed by [`BinKey`] so a category that happens to be named like the
/// synthetic Other bin still gets a band of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct BandScale {
    domain: IndexSet<BinKey>,
    range: (f32, f32),
    padding_inner: f32,
    padding_outer: f32,
    align: f32,
}

impl BandScale {
    /// Creates a new band scale with the given domain.
    ///
    /// # Defaults
    /// - range: (0.0, 1.0)
    /// - padding: 0.0
    /// - align: 0.5
    pub fn new(domain: impl IntoIterator<Item = BinKey>) -> Self {
        Self {
            domain: domain.into_iter().collect(),
            range: (0.0, 1.0),
            padding_inner: 0.0,
            padding_outer: 0.0,
            align: 0.5,
        }
    }

    pub fn range(mut self, range: (f32, f32)) -> Self {
        self.range = range;
        self
    }

    /// Sets both inner and outer padding to the same value
    pub fn padding(mut self, padding: f32) -> Self {
        self.padding_inner = padding.clamp(0.0, 1.0);
        self.padding_outer = padding.max(0.0);
        self
    }

    pub fn align(mut self, align: f32) -> Self {
        self.align = align.clamp(0.0, 1.0);
        self
    }

    fn ordered_range(&self) -> (f32, f32, bool) {
        let reverse = self.range.1 < self.range.0;
        if reverse {
            (self.range.1, self.range.0, true)
        } else {
            (self.range.0, self.range.1, false)
        }
    }

    /// Distance between the starts of adjacent bands. Returns 0 for an empty domain.
    pub fn step(&self) -> f32 {
        let n = self.domain.len();
        if n == 0 {
            return 0.0;
        }
        let (start, stop, _) = self.ordered_range();
        (stop - start) / 1.0_f32.max(bandspace(n, self.padding_inner, self.padding_outer))
    }

    /// Width of each band. Returns 0 for an empty domain.
    pub fn bandwidth(&self) -> f32 {
        self.step() * (1.0 - self.padding_inner)
    }

    /// Start position of the band for `key`, or `None` if the key is not in the domain
    pub fn scale(&self, key: &BinKey) -> Option<f32> {
        let index = self.domain.get_index_of(key)?;
        let n = self.domain.len();
        let (start, stop, reverse) = self.ordered_range();
        let step = self.step();
        let start = start + (stop - start - step * (n as f32 - self.padding_inner)) * self.align;
        let index = if reverse { n - 1 - index } else { index };
        Some(start + step * index as f32)
    }
}

/// Number of steps a band scale spans given its domain count and padding
pub fn bandspace(count: usize, padding_inner: f32, padding_outer: f32) -> f32 {
    let padding_inner = padding_inner.clamp(0.0, 1.0);
    let padding_outer = padding_outer.max(0.0);
    count as f32 - padding_inner + padding_outer * 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn keys(names: &[&str]) -> Vec<BinKey> {
        names.iter().map(|n| BinKey::Category(n.to_string())).collect()
    }

    fn category(name: &str) -> BinKey {
        BinKey::Category(name.to_string())
    }

    #[test]
    fn test_band_scale_basic() {
        let scale = BandScale::new(keys(&["a", "b", "c"]));
        assert_approx_eq!(f32, scale.scale(&category("a")).unwrap(), 0.0);
        assert_approx_eq!(f32, scale.scale(&category("b")).unwrap(), 0.3333333);
        assert_approx_eq!(f32, scale.scale(&category("c")).unwrap(), 0.6666667);
        assert!(scale.scale(&category("f")).is_none());
        assert_approx_eq!(f32, scale.bandwidth(), 0.3333333);
    }

    #[test]
    fn test_band_scale_padding() {
        let scale = BandScale::new(keys(&["a", "b", "c"]))
            .range((0.0, 120.0))
            .padding(0.2);
        assert_approx_eq!(f32, scale.scale(&category("a")).unwrap(), 7.5);
        assert_approx_eq!(f32, scale.scale(&category("b")).unwrap(), 45.0);
        assert_approx_eq!(f32, scale.scale(&category("c")).unwrap(), 82.5);
        assert_approx_eq!(f32, scale.bandwidth(), 30.0);
    }

    #[test]
    fn test_band_scale_reversed() {
        let scale = BandScale::new(keys(&["a", "b"])).range((100.0, 0.0));
        assert_approx_eq!(f32, scale.scale(&category("a")).unwrap(), 50.0);
        assert_approx_eq!(f32, scale.scale(&category("b")).unwrap(), 0.0);
    }

    #[test]
    fn test_other_category_and_other_bin_are_distinct() {
        let scale = BandScale::new([category("Other"), BinKey::Other]).range((0.0, 100.0));
        assert_approx_eq!(f32, scale.scale(&category("Other")).unwrap(), 0.0);
        assert_approx_eq!(f32, scale.scale(&BinKey::Other).unwrap(), 50.0);
    }

    #[test]
    fn test_empty_domain() {
        let scale = BandScale::new(Vec::<BinKey>::new()).range((0.0, 100.0));
        assert_eq!(scale.bandwidth(), 0.0);
        assert!(scale.scale(&category("a")).is_none());
    }
}
