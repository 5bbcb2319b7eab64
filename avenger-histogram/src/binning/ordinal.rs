use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::HistogramError;
use crate::types::Bin;

/// Order ordinal groups by descending count, breaking ties by ascending key
pub fn rank_order(a: &(String, u64), b: &(String, u64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Count values per ordinal key and rank the groups
pub fn rank_keys(keys: impl IntoIterator<Item = String>) -> Vec<(String, u64)> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
    ranked.sort_by(rank_order);
    ranked
}

/// Apply the top-K rule to ranked groups.
///
/// At most `max_bins` groups are kept as-is. Over the cap, the `max_bins - 1` largest
/// groups are kept and the remaining `total - Σkept` values become one trailing
/// "Other" bin.
pub fn collapse(
    ranked: Vec<(String, u64)>,
    total: u64,
    max_bins: usize,
) -> Result<Vec<Bin>, HistogramError> {
    let max_bins = max_bins.max(1);
    if ranked.len() <= max_bins {
        return Ok(ranked
            .into_iter()
            .map(|(key, length)| Bin::category(key, length))
            .collect());
    }

    let kept: Vec<(String, u64)> = ranked.into_iter().take(max_bins - 1).collect();
    let kept_total: u64 = kept.iter().map(|(_, n)| n).sum();
    let other = total.checked_sub(kept_total).ok_or_else(|| {
        HistogramError::InternalError(format!(
            "ordinal groups sum to {kept_total}, more than the {total} non-null values"
        ))
    })?;

    let mut bins: Vec<Bin> = kept
        .into_iter()
        .map(|(key, length)| Bin::category(key, length))
        .collect();
    bins.push(Bin::other(other));
    Ok(bins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OTHER_KEY;

    fn education() -> Vec<String> {
        [
            "HS", "Bachelor", "Master", "PhD", "Bachelor", "Master", "Bachelor", "Master",
            "Bachelor", "Master",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[test]
    fn test_rank_ties_by_key() {
        let ranked = rank_keys(education());
        let keys: Vec<&str> = ranked.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["Bachelor", "Master", "HS", "PhD"]);
    }

    #[test]
    fn test_collapse_over_cap() {
        let bins = collapse(rank_keys(education()), 10, 3).unwrap();
        let summary: Vec<(String, u64, bool)> = bins
            .iter()
            .map(|b| (b.key.clone().unwrap(), b.length, b.other))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Bachelor".to_string(), 4, false),
                ("Master".to_string(), 4, false),
                (OTHER_KEY.to_string(), 2, true),
            ]
        );
    }

    #[test]
    fn test_collapse_under_cap() {
        let bins = collapse(rank_keys(education()), 10, 4).unwrap();
        assert_eq!(bins.len(), 4);
        assert!(bins.iter().all(|b| !b.other));
    }

    #[test]
    fn test_collapse_cap_of_one() {
        let bins = collapse(rank_keys(education()), 10, 1).unwrap();
        assert_eq!(bins.len(), 1);
        assert!(bins[0].other);
        assert_eq!(bins[0].length, 10);
    }

    #[test]
    fn test_inconsistent_total() {
        let result = collapse(rank_keys(education()), 3, 2);
        assert!(matches!(result, Err(HistogramError::InternalError(_))));
    }
}
