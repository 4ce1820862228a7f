//! Room: positive volume/surface geometry plus per-band absorption in sabins.

use crate::bands::{all_finite, BandArray};
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    room_id: u32,
    /// Volume, m^3. Must be > 0.
    volume: f64,
    /// Total surface area, m^2. Must be > 0.
    surface_area: f64,
    /// Per-band total absorption in sabins (`S * alpha`).
    sabins: BandArray,
    dominant_material_id: u32,
}

impl Room {
    pub fn try_new(
        room_id: u32,
        volume: f64,
        surface_area: f64,
        sabins: BandArray,
        dominant_material_id: u32,
    ) -> CoreResult<Self> {
        if !(volume.is_finite() && volume > 0.0) {
            return Err(CoreError::NonPositiveVolume(volume));
        }
        if !(surface_area.is_finite() && surface_area > 0.0) {
            return Err(CoreError::NonPositiveSurfaceArea(surface_area));
        }
        if !all_finite(&sabins) {
            return Err(CoreError::NonFinite {
                field: "room.sabins",
                value: f64::NAN,
            });
        }
        for &s in &sabins {
            if s < 0.0 {
                return Err(CoreError::BandValueOutOfRange {
                    field: "room.sabins",
                    value: s,
                    lo: 0.0,
                    hi: f64::INFINITY,
                });
            }
        }
        Ok(Self {
            room_id,
            volume,
            surface_area,
            sabins,
            dominant_material_id,
        })
    }

    #[inline]
    pub fn room_id(&self) -> u32 {
        self.room_id
    }
    #[inline]
    pub fn volume(&self) -> f64 {
        self.volume
    }
    #[inline]
    pub fn surface_area(&self) -> f64 {
        self.surface_area
    }
    #[inline]
    pub fn sabins(&self) -> &BandArray {
        &self.sabins
    }
    #[inline]
    pub fn dominant_material_id(&self) -> u32 {
        self.dominant_material_id
    }

    /// Volume floored at 1 m^3 for use in MFP / RT60 formulas (spec §4.E).
    #[inline]
    pub fn volume_floored(&self) -> f64 {
        self.volume.max(1.0)
    }

    /// Surface area floored at 1 m^2 for use in MFP formulas.
    #[inline]
    pub fn surface_area_floored(&self) -> f64 {
        self.surface_area.max(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::ZERO_BANDS;

    #[test]
    fn rejects_zero_volume() {
        assert!(Room::try_new(1, 0.0, 10.0, ZERO_BANDS, 0).is_err());
    }

    #[test]
    fn rejects_negative_sabins() {
        let mut sabins = ZERO_BANDS;
        sabins[3] = -1.0;
        assert!(Room::try_new(1, 10.0, 10.0, sabins, 0).is_err());
    }
}
