//! Acoustic fingerprints: a compact, immutable per-room descriptor used to
//! drive reverb, plus the mutable blend scratch used only while
//! interpolating between two fingerprints (spec §4.E).

use dynamis_core::{all_finite, BandArray, CoreError, CoreResult, Room, ZERO_BANDS};
use dynamis_world::AcousticProxy;

use crate::reverb_estimator::estimate_rt60;

/// Immutable compact per-room acoustic descriptor. Built once via
/// [`build_fingerprint`] or produced by [`FingerprintBlend::freeze`]; every
/// array field is a defensive copy (band arrays are `Copy`, so this is free).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fingerprint {
    room_id: u32,
    volume: f64,
    surface_area: f64,
    /// Scalar mean free path, `4V/S`.
    mean_free_path: f64,
    /// Per-band mean free path, scaled by `1 - clamp(scattering, 0, 0.9999)`.
    mean_free_path_bands: BandArray,
    early_reflection_density: f64,
    rt60_bands: BandArray,
    portal_transmission_bands: BandArray,
}

impl Fingerprint {
    /// Validates and constructs directly from already-known fields; used by
    /// [`FingerprintBlend::freeze`] and tests. All magnitudes must be `>= 0`
    /// and band arrays exactly 8 long (enforced by the `BandArray` type).
    pub fn try_new(
        room_id: u32,
        volume: f64,
        surface_area: f64,
        mean_free_path: f64,
        mean_free_path_bands: BandArray,
        early_reflection_density: f64,
        rt60_bands: BandArray,
        portal_transmission_bands: BandArray,
    ) -> CoreResult<Self> {
        for (field, v) in [
            ("volume", volume),
            ("surface_area", surface_area),
            ("mean_free_path", mean_free_path),
            ("early_reflection_density", early_reflection_density),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(CoreError::NonFinite { field, value: v });
            }
        }
        if !all_finite(&mean_free_path_bands)
            || !all_finite(&rt60_bands)
            || !all_finite(&portal_transmission_bands)
        {
            return Err(CoreError::NonFinite {
                field: "fingerprint band array",
                value: f64::NAN,
            });
        }
        Ok(Self {
            room_id,
            volume,
            surface_area,
            mean_free_path,
            mean_free_path_bands,
            early_reflection_density,
            rt60_bands,
            portal_transmission_bands,
        })
    }

    #[inline]
    pub fn room_id(&self) -> u32 {
        self.room_id
    }
    #[inline]
    pub fn room_volume(&self) -> f64 {
        self.volume
    }
    #[inline]
    pub fn surface_area(&self) -> f64 {
        self.surface_area
    }
    #[inline]
    pub fn mean_free_path(&self) -> f64 {
        self.mean_free_path
    }
    #[inline]
    pub fn mean_free_path_bands(&self) -> &BandArray {
        &self.mean_free_path_bands
    }
    #[inline]
    pub fn early_reflection_density(&self) -> f64 {
        self.early_reflection_density
    }
    #[inline]
    pub fn rt60_bands(&self) -> &BandArray {
        &self.rt60_bands
    }
    #[inline]
    pub fn portal_transmission_bands(&self) -> &BandArray {
        &self.portal_transmission_bands
    }
}

/// Mutable scratch used only while blending two fingerprints. Kept distinct
/// from [`Fingerprint`] so a blend-in-progress can never be passed where an
/// immutable fingerprint is expected; callers that need the result as a
/// `Fingerprint` call [`FingerprintBlend::freeze`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerprintBlend {
    pub room_id: u32,
    pub room_volume: f64,
    pub surface_area: f64,
    pub mean_free_path: f64,
    pub mean_free_path_bands: BandArray,
    pub early_reflection_density: f64,
    pub rt60_bands: BandArray,
    pub portal_transmission_bands: BandArray,
}

impl Default for FingerprintBlend {
    fn default() -> Self {
        Self {
            room_id: 0,
            room_volume: 0.0,
            surface_area: 0.0,
            mean_free_path: 0.0,
            mean_free_path_bands: ZERO_BANDS,
            early_reflection_density: 0.0,
            rt60_bands: ZERO_BANDS,
            portal_transmission_bands: ZERO_BANDS,
        }
    }
}

impl FingerprintBlend {
    /// Defensive-copy conversion into an immutable fingerprint.
    pub fn freeze(&self) -> Fingerprint {
        Fingerprint {
            room_id: self.room_id,
            volume: self.room_volume,
            surface_area: self.surface_area,
            mean_free_path: self.mean_free_path,
            mean_free_path_bands: self.mean_free_path_bands,
            early_reflection_density: self.early_reflection_density,
            rt60_bands: self.rt60_bands,
            portal_transmission_bands: self.portal_transmission_bands,
        }
    }
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[inline]
fn lerp_bands(a: &BandArray, b: &BandArray, t: f64) -> BandArray {
    dynamis_core::lerp(a, b, t)
}

/// Logarithmic interpolation (geometric mean at `t=0.5`), falling back to
/// linear if either side is non-positive (spec §4.E).
#[inline]
fn lerp_log(a: f64, b: f64, t: f64) -> f64 {
    if a > 0.0 && b > 0.0 {
        (a.ln() * (1.0 - t) + b.ln() * t).exp()
    } else {
        lerp(a, b, t)
    }
}

/// Blend two fingerprints at `t` (clamped to `[0, 1]`) into a reusable
/// scratch buffer, avoiding any per-block allocation in the fingerprint-
/// driven reverb's automation path.
///
/// - RT60, portal transmission, per-band MFP, scalar MFP and ER density
///   interpolate linearly.
/// - `room_volume`/`surface_area` interpolate logarithmically unless either
///   side is non-positive.
/// - `room_id` snaps to whichever side has the larger weight; at `t=0.5`
///   the `a` side wins.
pub fn blend_into(out: &mut FingerprintBlend, a: &Fingerprint, b: &Fingerprint, t: f64) {
    let t = t.clamp(0.0, 1.0);
    out.room_id = if t <= 0.5 { a.room_id } else { b.room_id };
    out.room_volume = lerp_log(a.volume, b.volume, t);
    out.surface_area = lerp_log(a.surface_area, b.surface_area, t);
    out.mean_free_path = lerp(a.mean_free_path, b.mean_free_path, t);
    out.mean_free_path_bands = lerp_bands(&a.mean_free_path_bands, &b.mean_free_path_bands, t);
    out.early_reflection_density =
        lerp(a.early_reflection_density, b.early_reflection_density, t);
    out.rt60_bands = lerp_bands(&a.rt60_bands, &b.rt60_bands, t);
    out.portal_transmission_bands = lerp_bands(
        &a.portal_transmission_bands,
        &b.portal_transmission_bands,
        t,
    );
}

/// Convenience wrapper over [`blend_into`] for call sites that do not
/// already own a reusable scratch buffer (construction time, tests).
pub fn blend(a: &Fingerprint, b: &Fingerprint, t: f64) -> Fingerprint {
    let mut scratch = FingerprintBlend::default();
    blend_into(&mut scratch, a, b, t);
    scratch.freeze()
}

/// Early-reflection density approximation: `c^3 * 4*pi * (mfp/c)^2 / (2V)`.
fn early_reflection_density(mean_free_path: f64, volume: f64) -> f64 {
    use dynamis_core::SPEED_OF_SOUND as C;
    let v = volume.max(1.0);
    C.powi(3) * 4.0 * std::f64::consts::PI * (mean_free_path / C).powi(2) / (2.0 * v)
}

/// Builds a fingerprint for `room` from its dominant material's scattering
/// (looked up via `proxy`/the optional snapshot) and the reverb estimator
/// for RT60. Portal transmission is derived from every portal-tagged
/// triangle in `proxy` belonging to this room; absent portals default to
/// full transmission (spec §4.E).
pub fn build_fingerprint(
    room: &Room,
    proxy: Option<&AcousticProxy>,
    snapshot: Option<&dynamis_world::WorldSnapshot>,
) -> Fingerprint {
    let volume = room.volume_floored();
    let surface = room.surface_area_floored();
    let mean_free_path = 4.0 * volume / surface;

    let scattering = snapshot
        .and_then(|s| s.material(room.dominant_material_id()))
        .map(|m| *m.scattering())
        .unwrap_or(ZERO_BANDS);

    let mut mfp_bands = ZERO_BANDS;
    for i in 0..dynamis_core::BAND_COUNT {
        let s = scattering[i].clamp(0.0, 0.9999);
        mfp_bands[i] = mean_free_path * (1.0 - s);
    }

    let rt60_bands = estimate_rt60(volume, surface, room.sabins());
    let er_density = early_reflection_density(mean_free_path, volume);

    let portal_transmission_bands = match proxy {
        Some(proxy) => portal_transmission_for_room(proxy, room.room_id(), snapshot),
        None => dynamis_core::UNITY_BANDS,
    };

    Fingerprint::try_new(
        room.room_id(),
        volume,
        surface,
        mean_free_path,
        mfp_bands,
        er_density,
        rt60_bands,
        portal_transmission_bands,
    )
    .expect("fingerprint inputs are all non-negative finite values by construction")
}

/// Mean transmission loss (dB) over every portal triangle tagged with
/// `room_id`, converted to a linear amplitude ratio clamped to `[0,1]`.
/// No portals in the room yields full transmission on every band.
fn portal_transmission_for_room(
    proxy: &AcousticProxy,
    room_id: u32,
    snapshot: Option<&dynamis_world::WorldSnapshot>,
) -> BandArray {
    let mut sum = ZERO_BANDS;
    let mut count = 0usize;
    for tri in proxy.portal_triangles_in_room(room_id) {
        let loss_db = snapshot
            .and_then(|s| s.portal(tri.portal_id))
            .map(|p| *p.transmission_loss_db())
            .unwrap_or(ZERO_BANDS);
        for i in 0..dynamis_core::BAND_COUNT {
            sum[i] += loss_db[i];
        }
        count += 1;
    }
    if count == 0 {
        return dynamis_core::UNITY_BANDS;
    }
    let mut out = ZERO_BANDS;
    for i in 0..dynamis_core::BAND_COUNT {
        let mean_db = sum[i] / count as f64;
        out[i] = 10f64.powf(mean_db / 20.0).clamp(0.0, 1.0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fp(volume: f64, rt60: f64) -> Fingerprint {
        Fingerprint::try_new(
            1,
            volume,
            100.0,
            1.0,
            ZERO_BANDS,
            1.0,
            [rt60; dynamis_core::BAND_COUNT],
            dynamis_core::UNITY_BANDS,
        )
        .unwrap()
    }

    /// Literal scenario from spec.md §8: log-volume blend at t=0.5 between
    /// volume=10 and volume=1000 yields ~100 (geometric mean).
    #[test]
    fn log_volume_blend_at_midpoint() {
        let a = fp(10.0, 1.0);
        let b = fp(1000.0, 1.0);
        let blended = blend(&a, &b, 0.5);
        assert_relative_eq!(blended.room_volume(), 100.0, epsilon = 0.5);
        assert_relative_eq!(blended.rt60_bands()[0], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn blend_endpoints_recover_inputs() {
        let a = fp(10.0, 0.5);
        let b = fp(1000.0, 3.0);
        let at0 = blend(&a, &b, 0.0);
        let at1 = blend(&a, &b, 1.0);
        assert_relative_eq!(at0.room_volume(), a.room_volume(), epsilon = 1e-6);
        assert_relative_eq!(at1.room_volume(), b.room_volume(), epsilon = 1e-6);
    }

    #[test]
    fn blend_identical_fingerprints_is_invariant() {
        let a = fp(42.0, 1.2);
        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let blended = blend(&a, &a, t);
            assert_relative_eq!(blended.room_volume(), a.room_volume(), epsilon = 1e-9);
            assert_relative_eq!(blended.rt60_bands()[0], a.rt60_bands()[0], epsilon = 1e-9);
        }
    }

    #[test]
    fn log_blend_falls_back_to_linear_for_non_positive_side() {
        let mut out = FingerprintBlend::default();
        blend_into(&mut out, &fp(0.0, 1.0), &fp(10.0, 1.0), 0.5);
        assert_relative_eq!(out.room_volume, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn build_fingerprint_with_no_proxy_defaults_full_transmission() {
        let room = Room::try_new(1, 100.0, 100.0, [5.0; dynamis_core::BAND_COUNT], 0).unwrap();
        let f = build_fingerprint(&room, None, None);
        assert_eq!(*f.portal_transmission_bands(), dynamis_core::UNITY_BANDS);
    }
}
