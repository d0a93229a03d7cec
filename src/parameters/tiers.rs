//! Discount Tiers

use serde::Deserialize;
use smallvec::SmallVec;

use crate::parameters::ValidationError;

/// A volume band with its own unit price.
///
/// Purchasing `q` units under this band is only allowed when `lower <= q <= upper`.
/// The upper bound doubles as the band's own big-M constant in the model, so it
/// must be finite.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierBand {
    /// Minimum quantity purchasable under this tier
    pub lower: f64,

    /// Maximum quantity purchasable under this tier
    pub upper: f64,
}

impl TierBand {
    /// Create a new tier band.
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Whether `quantity` falls within the band, allowing `tolerance` of slack on both ends.
    pub fn contains(&self, quantity: f64, tolerance: f64) -> bool {
        quantity >= self.lower - tolerance && quantity <= self.upper + tolerance
    }

    fn validate(&self, tier: usize) -> Result<(), ValidationError> {
        if !self.lower.is_finite() || !self.upper.is_finite() {
            return Err(ValidationError::NonFiniteTierBound { tier });
        }

        if self.lower < 0.0 || self.lower > self.upper {
            return Err(ValidationError::InvalidTierBand {
                tier,
                lower: self.lower,
                upper: self.upper,
            });
        }

        Ok(())
    }
}

/// Ordered sequence of tier bands, lowest volume first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierSchedule {
    bands: SmallVec<[TierBand; 4]>,
}

impl TierSchedule {
    /// Create a schedule from bands in tier order.
    pub fn new(bands: impl IntoIterator<Item = TierBand>) -> Self {
        Self {
            bands: bands.into_iter().collect(),
        }
    }

    /// Create a schedule from `(lower, upper)` pairs in tier order.
    pub fn from_bounds(bounds: &[(f64, f64)]) -> Self {
        Self::new(
            bounds
                .iter()
                .map(|&(lower, upper)| TierBand::new(lower, upper)),
        )
    }

    /// Number of tiers
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    /// Whether the schedule has no tiers
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Band at the given tier position
    pub fn get(&self, tier: usize) -> Option<&TierBand> {
        self.bands.get(tier)
    }

    /// Iterate over bands in tier order
    pub fn iter(&self) -> impl Iterator<Item = &TierBand> {
        self.bands.iter()
    }

    /// Check that every band is well formed and, when `monotone` is set, that
    /// bands never shrink from one tier to the next.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] describing the first offending tier.
    pub(crate) fn validate(&self, monotone: bool) -> Result<(), ValidationError> {
        if self.bands.is_empty() {
            return Err(ValidationError::EmptySet(super::SetKind::Tiers));
        }

        for (tier, band) in self.bands.iter().enumerate() {
            band.validate(tier)?;
        }

        if monotone {
            for (tier, pair) in self.bands.windows(2).enumerate() {
                if let [previous, next] = pair
                    && (next.lower < previous.lower || next.upper < previous.upper)
                {
                    return Err(ValidationError::NonMonotoneTierBounds { tier: tier + 1 });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn accepts_increasing_bands() -> TestResult {
        let schedule = TierSchedule::from_bounds(&[(0.0, 49.99), (50.0, 99.99), (100.0, 500.0)]);

        schedule.validate(true)?;

        assert_eq!(schedule.len(), 3);

        Ok(())
    }

    #[test]
    fn rejects_inverted_band() {
        let schedule = TierSchedule::from_bounds(&[(0.0, 10.0), (40.0, 20.0)]);

        assert!(matches!(
            schedule.validate(true),
            Err(ValidationError::InvalidTierBand { tier: 1, .. })
        ));
    }

    #[test]
    fn rejects_negative_lower_bound() {
        let schedule = TierSchedule::from_bounds(&[(-1.0, 10.0)]);

        assert!(matches!(
            schedule.validate(false),
            Err(ValidationError::InvalidTierBand { tier: 0, .. })
        ));
    }

    #[test]
    fn rejects_infinite_upper_bound() {
        let schedule = TierSchedule::from_bounds(&[(0.0, f64::INFINITY)]);

        assert!(matches!(
            schedule.validate(false),
            Err(ValidationError::NonFiniteTierBound { tier: 0 })
        ));
    }

    #[test]
    fn shrinking_bands_only_rejected_when_monotone() -> TestResult {
        let schedule = TierSchedule::from_bounds(&[(50.0, 100.0), (0.0, 49.0)]);

        assert!(matches!(
            schedule.validate(true),
            Err(ValidationError::NonMonotoneTierBounds { tier: 1 })
        ));

        schedule.validate(false)?;

        Ok(())
    }

    #[test]
    fn empty_schedule_is_rejected() {
        assert!(matches!(
            TierSchedule::default().validate(false),
            Err(ValidationError::EmptySet(crate::parameters::SetKind::Tiers))
        ));
    }

    #[test]
    fn band_contains_respects_tolerance() {
        let band = TierBand::new(40.0, 100.0);

        assert!(band.contains(40.0, 0.0));
        assert!(band.contains(39.999_999_9, 1e-6));
        assert!(!band.contains(39.0, 1e-6));
        assert!(!band.contains(100.5, 1e-6));
    }
}
