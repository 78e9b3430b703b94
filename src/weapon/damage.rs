//! Hit damage with optional distance falloff

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::spec::{HitRegion, WeaponSpec};

/// Distance falloff curve: `1 - distance^exponent * k`, floored at zero
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Falloff {
    pub k: f64,
    #[serde(default = "Falloff::default_exponent")]
    pub exponent: f64,
}

impl Falloff {
    pub const DEFAULT_K: f64 = 0.0004;
    pub const DEFAULT_EXPONENT: f64 = 1.5;

    pub fn new(k: f64) -> Self {
        Self {
            k,
            exponent: Self::DEFAULT_EXPONENT,
        }
    }

    fn default_exponent() -> f64 {
        Self::DEFAULT_EXPONENT
    }

    /// Damage multiplier at `distance`, in `[0, 1]`
    pub fn multiplier(&self, distance: f64) -> f64 {
        let reduction = distance.max(0.0).powf(self.exponent) * self.k;
        (1.0 - reduction).clamp(0.0, 1.0)
    }
}

impl Default for Falloff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_K)
    }
}

/// Damage dealt by a hit on `region`
///
/// Without falloff this is the table value. With falloff the table value is
/// scaled by the distance multiplier and rounded up.
pub fn compute_damage(
    spec: &WeaponSpec,
    falloff: Option<&Falloff>,
    region: HitRegion,
    attacker: Vec3,
    target: Vec3,
) -> u32 {
    let base = spec.damage.get(region);
    match falloff {
        None => base,
        Some(falloff) => {
            let distance = f64::from(attacker.distance(target));
            let scaled = (f64::from(base) * falloff.multiplier(distance)).ceil();
            scaled.max(0.0) as u32
        }
    }
}
