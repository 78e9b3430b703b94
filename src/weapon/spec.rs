//! Weapon archetypes and their immutable stats

use serde::{Deserialize, Serialize};

/// Weapon archetypes, in wire-id order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    Rifle,
    Smg,
    Shotgun,
    RiflePt,
    SmgPt,
    ShotgunPt,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 6] = [
        WeaponKind::Rifle,
        WeaponKind::Smg,
        WeaponKind::Shotgun,
        WeaponKind::RiflePt,
        WeaponKind::SmgPt,
        WeaponKind::ShotgunPt,
    ];

    /// Protocol weapon id
    pub fn id(self) -> u8 {
        match self {
            Self::Rifle => 0,
            Self::Smg => 1,
            Self::Shotgun => 2,
            Self::RiflePt => 3,
            Self::SmgPt => 4,
            Self::ShotgunPt => 5,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    /// Name shown to players
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Rifle | Self::RiflePt => "Rifle",
            Self::Smg | Self::SmgPt => "SMG",
            Self::Shotgun | Self::ShotgunPt => "Shotgun",
        }
    }
}

impl Default for WeaponKind {
    fn default() -> Self {
        Self::Rifle
    }
}

/// Body region a hit landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitRegion {
    Torso,
    Head,
    Arms,
    Legs,
}

/// Base damage per body region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageTable {
    pub torso: u32,
    pub head: u32,
    pub arms: u32,
    pub legs: u32,
}

impl DamageTable {
    pub const fn new(torso: u32, head: u32, arms: u32, legs: u32) -> Self {
        Self {
            torso,
            head,
            arms,
            legs,
        }
    }

    pub fn get(&self, region: HitRegion) -> u32 {
        match region {
            HitRegion::Torso => self.torso,
            HitRegion::Head => self.head,
            HitRegion::Arms => self.arms,
            HitRegion::Legs => self.legs,
        }
    }
}

/// Stats for one weapon archetype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponSpec {
    /// Seconds between shots
    pub fire_delay: f64,
    pub magazine_capacity: u32,
    pub reserve_capacity: u32,
    /// Seconds per reload (per round for slow reloads)
    pub reload_duration: f64,
    /// Reload trickles in one round at a time
    pub slow_reload: bool,
    pub damage: DamageTable,
}

impl WeaponSpec {
    /// Reject stats the state machine cannot run with
    pub fn validate(&self) -> Result<(), SpecError> {
        if !(self.fire_delay.is_finite() && self.fire_delay > 0.0) {
            return Err(SpecError::FireDelay(self.fire_delay));
        }
        if !(self.reload_duration.is_finite() && self.reload_duration > 0.0) {
            return Err(SpecError::ReloadDuration(self.reload_duration));
        }
        if self.magazine_capacity == 0 {
            return Err(SpecError::EmptyMagazine);
        }
        if self.reserve_capacity == 0 {
            return Err(SpecError::EmptyReserve);
        }
        Ok(())
    }
}

/// Invalid weapon stats
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpecError {
    #[error("fire delay must be a positive number of seconds, got {0}")]
    FireDelay(f64),

    #[error("reload duration must be a positive number of seconds, got {0}")]
    ReloadDuration(f64),

    #[error("magazine capacity must be positive")]
    EmptyMagazine,

    #[error("reserve capacity must be positive")]
    EmptyReserve,
}
