//! Normalize module - Rounds position vectors to a configured precision
//!
//! Rounding is half-away-from-zero (`f64::round`) on `x * 10^d`, then
//! scaled back. A negative precision disables rounding entirely, and the raw
//! vector is used as key input.

/// Round one component to `decimals` places.
///
/// Negative `decimals` returns `value` unchanged, as does any value whose
/// scaled form is not finite (huge magnitudes or huge precisions).
pub fn round_value(value: f64, decimals: i32) -> f64 {
    if decimals < 0 {
        return value;
    }

    let factor = 10f64.powi(decimals);
    let scaled = value * factor;
    if !factor.is_finite() || !scaled.is_finite() {
        return value;
    }

    let rounded = scaled.round() / factor;
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}

/// Round every component of `vector`.
pub fn round_vector(vector: &[f64], decimals: i32) -> Vec<f64> {
    vector.iter().map(|v| round_value(*v, decimals)).collect()
}

/// Turns extracted positions into canonical-key input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    decimals: i32,
}

impl Normalizer {
    pub fn new(decimals: i32) -> Self {
        Self { decimals }
    }

    pub fn decimals(&self) -> i32 {
        self.decimals
    }

    /// Whether this normalizer rounds at all.
    pub fn is_rounding(&self) -> bool {
        self.decimals >= 0
    }

    /// Produce the rounded vector used for keying, or `None` when the
    /// position is absent or empty and the file belongs in the invalid set.
    pub fn key_input(&self, position: Option<&[f64]>) -> Option<Vec<f64>> {
        match position {
            Some(v) if !v.is_empty() => Some(round_vector(v, self.decimals)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_value(2.5, 0), 3.0);
        assert_eq!(round_value(-2.5, 0), -3.0);
        assert_eq!(round_value(1.25, 1), 1.3);
        assert_eq!(round_value(1.001, 2), 1.0);
        assert_eq!(round_value(5.0, 2), 5.0);
    }

    #[test]
    fn test_negative_decimals_disable_rounding() {
        assert_eq!(round_value(1.23456, -1), 1.23456);
        assert_eq!(round_vector(&[0.1, 0.2], -5), vec![0.1, 0.2]);
        assert!(!Normalizer::new(-1).is_rounding());
    }

    #[test]
    fn test_extreme_precision_leaves_value() {
        assert_eq!(round_value(1.5e300, 20), 1.5e300);
        assert_eq!(round_value(0.125, 400), 0.125);
    }

    #[test]
    fn test_key_input_routes_empty_to_none() {
        let normalizer = Normalizer::new(2);
        assert_eq!(normalizer.key_input(None), None);
        assert_eq!(normalizer.key_input(Some(&[])), None);
        assert_eq!(
            normalizer.key_input(Some(&[1.004, 2.006])),
            Some(vec![1.0, 2.01])
        );
    }
}
