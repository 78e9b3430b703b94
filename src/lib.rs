//! Authoritative weapon fire control for a voxel shooter server
//!
//! The server never trusts the client's ammo count. A `Weapon` derives it
//! from when the trigger went down and the fire delay, runs reloads on a
//! `DebouncedTimer`, and decides whether a reported hit was even possible.
//! Each player's weapon lives inside a `WeaponSession` task; the connection
//! layer talks to it through a `SessionHandle`.

pub mod airstrike;
pub mod config;
pub mod session;
pub mod telemetry;
pub mod timer;
pub mod util;
pub mod weapon;

pub use config::{Config, ConfigError};
pub use session::{
    SessionError, SessionHandle, SessionRegistry, SessionSettings, WeaponNotice, WeaponSession,
};
pub use timer::{DebouncedTimer, TimerTicket};
pub use weapon::{
    compute_damage, Falloff, HitRegion, Ruleset, RulesetPreset, Weapon, WeaponKind, WeaponPhase,
    WeaponSnapshot, WeaponSpec,
};
