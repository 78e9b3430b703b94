//! Weapon stats, ammo accounting and damage

pub mod ammo;
pub mod damage;
pub mod fire_control;
pub mod ruleset;
pub mod spec;

pub use damage::{compute_damage, Falloff};
pub use fire_control::{Weapon, WeaponEffect, WeaponPhase, WeaponSnapshot};
pub use ruleset::{Ruleset, RulesetError, RulesetPreset, DEFAULT_CLIP_TOLERANCE};
pub use spec::{DamageTable, HitRegion, SpecError, WeaponKind, WeaponSpec};
