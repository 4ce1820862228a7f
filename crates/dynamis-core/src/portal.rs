//! Portals connect two rooms through a continuous aperture.

use crate::bands::{all_finite, BandArray};
use crate::error::{CoreError, CoreResult};

/// A portal connecting two room ids with a continuous (not boolean)
/// aperture and per-band transmission loss.
#[derive(Debug, Clone, PartialEq)]
pub struct Portal {
    portal_id: u32,
    room_a: u32,
    room_b: u32,
    aperture: f64,
    transmission_loss_db: BandArray,
}

impl Portal {
    pub fn try_new(
        portal_id: u32,
        room_a: u32,
        room_b: u32,
        aperture: f64,
        transmission_loss_db: BandArray,
    ) -> CoreResult<Self> {
        if portal_id == 0 {
            return Err(CoreError::PortalIdZero { portal_id });
        }
        if !aperture.is_finite() {
            return Err(CoreError::NonFinite {
                field: "portal.aperture",
                value: aperture,
            });
        }
        if !all_finite(&transmission_loss_db) {
            return Err(CoreError::NonFinite {
                field: "portal.transmission_loss_db",
                value: f64::NAN,
            });
        }
        Ok(Self {
            portal_id,
            room_a,
            room_b,
            aperture: aperture.clamp(0.0, 1.0),
            transmission_loss_db,
        })
    }

    #[inline]
    pub fn portal_id(&self) -> u32 {
        self.portal_id
    }

    #[inline]
    pub fn rooms(&self) -> (u32, u32) {
        (self.room_a, self.room_b)
    }

    #[inline]
    pub fn aperture(&self) -> f64 {
        self.aperture
    }

    #[inline]
    pub fn transmission_loss_db(&self) -> &BandArray {
        &self.transmission_loss_db
    }

    /// Aperture default used when a portal id is unknown to the scene:
    /// fully open.
    pub const DEFAULT_APERTURE: f64 = 1.0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::ZERO_BANDS;

    #[test]
    fn rejects_zero_portal_id() {
        assert!(Portal::try_new(0, 1, 2, 0.5, ZERO_BANDS).is_err());
    }

    #[test]
    fn clamps_aperture() {
        let p = Portal::try_new(1, 1, 2, 1.5, ZERO_BANDS).unwrap();
        assert_eq!(p.aperture(), 1.0);
    }
}
