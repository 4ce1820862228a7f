//! Occlusion accumulator: per-band dB-to-occlusion conversion and
//! order-invariant multi-hit composition (spec §4.E).

use dynamis_core::{BandArray, BAND_COUNT, ZERO_BANDS};

/// Converts a transmission loss in dB to an occlusion fraction in `[0,1]`:
/// `0 dB -> 0`, `<= -60 dB -> 1`, otherwise `1 - 10^(dB/20)` clamped.
pub fn db_to_occlusion(db: f64) -> f64 {
    if db >= 0.0 {
        return 0.0;
    }
    if db <= -60.0 {
        return 1.0;
    }
    (1.0 - 10f64.powf(db / 20.0)).clamp(0.0, 1.0)
}

/// Per-band version of [`db_to_occlusion`].
pub fn db_to_occlusion_bands(db: &BandArray) -> BandArray {
    let mut out = ZERO_BANDS;
    for i in 0..BAND_COUNT {
        out[i] = db_to_occlusion(db[i]);
    }
    out
}

/// Composes occlusion fractions from multiple hits along a path by
/// multiplying their *open-path* fractions: `final = 1 - prod(1 - o_i)`.
/// This is commutative and associative, so composition is order-invariant
/// for any ordering of the input hits (spec §8, invariant 4).
pub fn accumulate(occlusions: impl IntoIterator<Item = f64>) -> f64 {
    let open: f64 = occlusions
        .into_iter()
        .map(|o| 1.0 - o.clamp(0.0, 1.0))
        .product();
    (1.0 - open).clamp(0.0, 1.0)
}

/// Per-band version of [`accumulate`], accumulating a sequence of per-band
/// occlusion vectors into a single fused per-band result.
pub fn accumulate_bands<'a>(hits: impl IntoIterator<Item = &'a BandArray>) -> BandArray {
    let mut open = [1.0; BAND_COUNT];
    for bands in hits {
        for i in 0..BAND_COUNT {
            open[i] *= 1.0 - bands[i].clamp(0.0, 1.0);
        }
    }
    let mut out = ZERO_BANDS;
    for i in 0..BAND_COUNT {
        out[i] = (1.0 - open[i]).clamp(0.0, 1.0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_db_is_no_occlusion() {
        assert_relative_eq!(db_to_occlusion(0.0), 0.0);
    }

    #[test]
    fn minus_sixty_db_is_full_occlusion() {
        assert_relative_eq!(db_to_occlusion(-60.0), 1.0);
        assert_relative_eq!(db_to_occlusion(-120.0), 1.0);
    }

    /// Literal scenario from spec.md §8: uniform -20dB transmission loss
    /// converges to ~0.9 occlusion.
    #[test]
    fn minus_twenty_db_is_point_nine() {
        assert_relative_eq!(db_to_occlusion(-20.0), 0.9, epsilon = 1e-9);
    }

    #[test]
    fn accumulation_is_order_invariant() {
        let a = accumulate([0.5, 0.3, 0.8]);
        let b = accumulate([0.8, 0.5, 0.3]);
        let c = accumulate([0.3, 0.8, 0.5]);
        assert_relative_eq!(a, b, epsilon = 1e-12);
        assert_relative_eq!(b, c, epsilon = 1e-12);
    }

    #[test]
    fn accumulation_of_single_full_occlusion_is_full() {
        assert_relative_eq!(accumulate([1.0, 0.5]), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn accumulate_bands_order_invariant() {
        let h1 = [0.5; BAND_COUNT];
        let h2 = [0.3; BAND_COUNT];
        let forward = accumulate_bands([&h1, &h2]);
        let backward = accumulate_bands([&h2, &h1]);
        assert_eq!(forward, backward);
    }
}
