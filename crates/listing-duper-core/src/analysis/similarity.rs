use ahash::AHashSet;

use super::normalize::advanced_normalize;

/// Jaccard coefficient over the advanced-normalized word sets of two titles.
///
/// Returns 0.0 when either title normalizes to nothing. This is a scoring aid
/// only; duplicate grouping keys on exact basic-normalized equality.
pub fn similarity(a: &str, b: &str) -> f64 {
    let norm_a = advanced_normalize(a);
    let norm_b = advanced_normalize(b);
    if norm_a.is_empty() || norm_b.is_empty() {
        return 0.0;
    }

    let set_a: AHashSet<&str> = norm_a.split_whitespace().collect();
    let set_b: AHashSet<&str> = norm_b.split_whitespace().collect();

    let intersection_size = set_a.intersection(&set_b).count();
    let union_size = set_a.union(&set_b).count();

    intersection_size as f64 / union_size as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_titles_score_one() {
        assert_eq!(similarity("Vintage Leather Wallet", "Vintage Leather Wallet"), 1.0);
        assert_eq!(similarity("Red Widget Large", "large widget red"), 1.0);
    }

    #[test]
    fn test_empty_after_normalization_scores_zero() {
        assert_eq!(similarity("", "Widget"), 0.0);
        assert_eq!(similarity("the an of", "Widget Large Red"), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        // {large, red, widget} vs {blue, large, widget}
        let score = similarity("Red Widget Large", "Blue Widget Large");
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let titles = [
            "Vintage Leather Wallet Brown",
            "Wallet wallet",
            "USB-C Charger 65W (fast)",
            "Rope 10 feet nylon",
            "10 ft. nylon rope",
            "Completely Unrelated Garden Hose",
        ];
        for a in titles {
            for b in titles {
                let score = similarity(a, b);
                assert!((0.0..=1.0).contains(&score), "{a:?} vs {b:?} = {score}");
            }
            assert_eq!(similarity(a, a), 1.0);
        }
    }

    #[test]
    fn test_abbreviations_increase_overlap() {
        assert_eq!(similarity("Rope 10 feet nylon", "nylon rope 10 ft."), 1.0);
    }
}
