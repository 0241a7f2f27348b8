//! Extraction thresholds. Both are configurable through [`crate::AppConfig`].

use rust_decimal::Decimal;

/// Inclusive window a parsed price must fall within to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBounds {
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceBounds {
    /// Returns `None` when `min > max`.
    #[must_use]
    pub fn new(min: Decimal, max: Decimal) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    #[must_use]
    pub fn contains(&self, value: Decimal) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for PriceBounds {
    fn default() -> Self {
        Self {
            min: Decimal::new(50, 2),
            max: Decimal::new(50_000, 0),
        }
    }
}

/// Minimum title-similarity score a search candidate needs to count as a match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityThreshold(f64);

impl SimilarityThreshold {
    /// Returns `None` unless `value` lies in `[0, 1]`.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        (0.0..=1.0).contains(&value).then_some(Self(value))
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn admits(self, score: f64) -> bool {
        score >= self.0
    }
}

impl Default for SimilarityThreshold {
    fn default() -> Self {
        Self(0.6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds_are_inclusive() {
        let bounds = PriceBounds::default();
        assert!(bounds.contains(Decimal::new(50, 2)));
        assert!(bounds.contains(Decimal::new(50_000, 0)));
        assert!(!bounds.contains(Decimal::new(49, 2)));
        assert!(!bounds.contains(Decimal::new(5_000_001, 2)));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        assert!(PriceBounds::new(Decimal::new(10, 0), Decimal::new(1, 0)).is_none());
    }

    #[test]
    fn threshold_rejects_out_of_range() {
        assert!(SimilarityThreshold::new(1.5).is_none());
        assert!(SimilarityThreshold::new(-0.1).is_none());
        assert!(SimilarityThreshold::new(0.0).is_some());
    }

    #[test]
    fn default_threshold_admits_three_of_five() {
        let gate = SimilarityThreshold::default();
        assert!(gate.admits(3.0 / 5.0));
        assert!(!gate.admits(2.0 / 5.0));
    }
}
