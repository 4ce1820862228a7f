//! Gain <-> decibel conversion, used by the compressor's makeup gain and
//! telemetry reporting instead of ad hoc `log10`/`powf` call sites.

/// A gain value carried in decibels.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Decibels(pub f64);

impl Decibels {
    pub const UNITY: Decibels = Decibels(0.0);

    #[inline]
    pub fn to_linear(self) -> f64 {
        10f64.powf(self.0 / 20.0)
    }

    #[inline]
    pub fn from_linear(linear: f64) -> Self {
        if linear <= 0.0 {
            Decibels(f64::NEG_INFINITY)
        } else {
            Decibels(20.0 * linear.log10())
        }
    }
}

impl From<f64> for Decibels {
    fn from(db: f64) -> Self {
        Decibels(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unity_is_one() {
        assert_relative_eq!(Decibels::UNITY.to_linear(), 1.0);
    }

    #[test]
    fn round_trip() {
        let db = Decibels(-6.0);
        let back = Decibels::from_linear(db.to_linear());
        assert_relative_eq!(back.0, -6.0, epsilon = 1e-9);
    }

    #[test]
    fn plus_six_db_doubles() {
        assert_relative_eq!(Decibels(6.0).to_linear(), 1.9952623, epsilon = 1e-4);
    }
}
