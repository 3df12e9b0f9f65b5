//! Cheap order-insensitive similarity between SKU-like strings

/// Score for one normalized SKU containing the other
pub const CONTAINMENT_SCORE: f64 = 0.9;

/// Lowercase and keep only ASCII letters and digits
pub fn normalize(sku: &str) -> String {
    sku.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Similarity in `[0, 1]`.
///
/// Equal normalized forms score 1.0 and containment scores 0.9. Otherwise
/// each character of the shorter form counts once if it occurs anywhere in
/// the longer one, and the count is divided by the longer length. On equal
/// lengths `a` is taken as the shorter, so the score is not symmetric.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);

    if a == b {
        return 1.0;
    }

    // An empty form is contained in everything; it carries no signal
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    if a.contains(b.as_str()) || b.contains(a.as_str()) {
        return CONTAINMENT_SCORE;
    }

    let (shorter, longer) = if b.len() < a.len() { (&b, &a) } else { (&a, &b) };
    let matches = shorter.chars().filter(|c| longer.contains(*c)).count();

    matches as f64 / longer.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize("HP-26 X"), "hp26x");
        assert_eq!(normalize("cf/226.x"), "cf226x");
        assert_eq!(normalize("--"), "");
    }

    #[test]
    fn test_identical_inputs_score_one() {
        for sku in ["CF226X", "hp 26x", "Q2612A", "a"] {
            assert_eq!(similarity(sku, sku), 1.0);
        }
        assert_eq!(similarity("HP-26-X", "hp26x"), 1.0);
    }

    #[test]
    fn test_containment_scores_point_nine() {
        assert_eq!(similarity("CF226X", "226X"), CONTAINMENT_SCORE);
        assert_eq!(similarity("26x", "CF-226X-R"), CONTAINMENT_SCORE);
    }

    #[test]
    fn test_character_overlap_ratio() {
        // h, p miss; 2, 6, x hit; divided by len("cf226x")
        assert_eq!(similarity("HP26X", "CF226X"), 0.5);
        assert_eq!(similarity("ZZZ999", "CF226X"), 0.0);
    }

    #[test]
    fn test_equal_length_uses_first_argument_as_shorter() {
        // "aab" against "abc": every char of the first is found
        assert_eq!(similarity("aab", "abc"), 1.0);
        // "abc" against "aab": c is missing
        assert!((similarity("abc", "aab") - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_normalized_forms() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("--", "  "), 1.0);
        assert_eq!(similarity("", "CF226X"), 0.0);
        assert_eq!(similarity("CF226X", "***"), 0.0);
    }

    #[test]
    fn test_score_stays_in_unit_interval() {
        let skus = ["CF226X", "HP26X", "Q2612A", "12A", "TN-450", "x", "ZZZ999"];
        for a in skus {
            for b in skus {
                let score = similarity(a, b);
                assert!((0.0..=1.0).contains(&score), "{} vs {} = {}", a, b, score);
            }
        }
    }
}
