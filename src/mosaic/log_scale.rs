//! Logarithmic intensity compression.

use std::f64::consts::LN_10;

/// `scale * ln(raw * correction / scale + 1)`.
///
/// With the default constants (`scale = correction = 20 / ln 10`) this is
/// `20 * log10(raw + 1)`, i.e. decibels of `raw + 1`. The same value must be
/// used for extrema collection and normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogCompression {
    pub scale: f64,
    pub correction: f64,
}

impl LogCompression {
    #[must_use]
    pub const fn new(scale: f64, correction: f64) -> Self {
        Self { scale, correction }
    }

    /// Compress one sample. Values below `-scale / correction` yield NaN.
    #[inline]
    #[must_use]
    pub fn apply(&self, raw: f64) -> f64 {
        self.scale * (raw * self.correction / self.scale).ln_1p()
    }
}

impl Default for LogCompression {
    fn default() -> Self {
        let db = 20.0 / LN_10;
        Self::new(db, db)
    }
}

/// Apply an optional law, returning `None` for results that are not finite.
#[inline]
#[must_use]
pub fn compress(law: Option<&LogCompression>, raw: f64) -> Option<f64> {
    let value = law.map_or(raw, |law| law.apply(raw));
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_law_is_decibels() {
        let law = LogCompression::default();
        assert!((law.apply(99.0) - 40.0).abs() < 1e-9);
        assert_eq!(law.apply(0.0), 0.0);
    }

    #[test]
    fn test_law_is_monotonic() {
        let law = LogCompression::new(10.0, 2.0);
        let values: Vec<_> = [0.0, 1.0, 5.0, 100.0].iter().map(|&v| law.apply(v)).collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_compress_filters_non_finite() {
        let law = LogCompression::default();
        assert_eq!(compress(Some(&law), -1.0), None);
        assert_eq!(compress(Some(&law), -5.0), None);
        assert_eq!(compress(None, f64::NAN), None);
        assert_eq!(compress(None, 3.0), Some(3.0));
    }
}
