//! Acoustic material: an immutable handle identified by a stable id.

use crate::bands::{all_finite, BandArray};
use crate::error::{CoreError, CoreResult};

/// Immutable acoustic material. Exposes per-band absorption, scattering and
/// transmission loss. Constructed once and never mutated in place — scene
/// edits create a new `Material` and `put_material` it into the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    material_id: u32,
    absorption: BandArray,
    scattering: BandArray,
    /// Transmission loss in dB, non-positive (0 = no loss).
    transmission_loss_db: BandArray,
}

impl Material {
    pub fn try_new(
        material_id: u32,
        absorption: BandArray,
        scattering: BandArray,
        transmission_loss_db: BandArray,
    ) -> CoreResult<Self> {
        if !all_finite(&absorption) || !all_finite(&scattering) || !all_finite(&transmission_loss_db) {
            return Err(CoreError::NonFinite {
                field: "material band array",
                value: f64::NAN,
            });
        }
        for &a in &absorption {
            if !(0.0..=1.0).contains(&a) {
                return Err(CoreError::BandValueOutOfRange {
                    field: "absorption",
                    value: a,
                    lo: 0.0,
                    hi: 1.0,
                });
            }
        }
        for &s in &scattering {
            if !(0.0..=1.0).contains(&s) {
                return Err(CoreError::BandValueOutOfRange {
                    field: "scattering",
                    value: s,
                    lo: 0.0,
                    hi: 1.0,
                });
            }
        }
        for &t in &transmission_loss_db {
            if t > 0.0 {
                return Err(CoreError::BandValueOutOfRange {
                    field: "transmission_loss_db",
                    value: t,
                    lo: f64::NEG_INFINITY,
                    hi: 0.0,
                });
            }
        }
        Ok(Self {
            material_id,
            absorption,
            scattering,
            transmission_loss_db,
        })
    }

    #[inline]
    pub fn material_id(&self) -> u32 {
        self.material_id
    }

    #[inline]
    pub fn absorption(&self) -> &BandArray {
        &self.absorption
    }

    #[inline]
    pub fn scattering(&self) -> &BandArray {
        &self.scattering
    }

    #[inline]
    pub fn transmission_loss_db(&self) -> &BandArray {
        &self.transmission_loss_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::ZERO_BANDS;

    #[test]
    fn rejects_out_of_range_absorption() {
        let mut absorption = ZERO_BANDS;
        absorption[0] = 1.5;
        let err = Material::try_new(1, absorption, ZERO_BANDS, ZERO_BANDS);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_positive_transmission_loss() {
        let mut loss = ZERO_BANDS;
        loss[0] = 1.0;
        let err = Material::try_new(1, ZERO_BANDS, ZERO_BANDS, loss);
        assert!(err.is_err());
    }

    #[test]
    fn accepts_valid_material() {
        let m = Material::try_new(7, ZERO_BANDS, ZERO_BANDS, ZERO_BANDS).unwrap();
        assert_eq!(m.material_id(), 7);
    }
}
