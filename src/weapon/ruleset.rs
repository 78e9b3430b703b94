//! Per-ruleset weapon table, falloff toggle and anti-cheat tolerance

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::damage::Falloff;
use super::spec::{DamageTable, SpecError, WeaponKind, WeaponSpec};

/// Shots of grace a client may be ahead of the server before a hit is refused
pub const DEFAULT_CLIP_TOLERANCE: u32 = 5;

/// Built-in rulesets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulesetPreset {
    /// Flat per-region damage
    Classic,
    /// Older balance with distance falloff
    Legacy,
}

impl FromStr for RulesetPreset {
    type Err = RulesetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "legacy" => Ok(Self::Legacy),
            other => Err(RulesetError::UnknownPreset(other.to_string())),
        }
    }
}

/// Validated weapon table plus ruleset-wide toggles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RulesetFile")]
pub struct Ruleset {
    name: String,
    falloff: Option<Falloff>,
    clip_tolerance: u32,
    weapons: HashMap<WeaponKind, WeaponSpec>,
}

/// Unvalidated on-disk shape
#[derive(Debug, Deserialize)]
struct RulesetFile {
    name: String,
    #[serde(default)]
    falloff: Option<Falloff>,
    #[serde(default = "default_clip_tolerance")]
    clip_tolerance: u32,
    weapons: HashMap<WeaponKind, WeaponSpec>,
}

fn default_clip_tolerance() -> u32 {
    DEFAULT_CLIP_TOLERANCE
}

impl TryFrom<RulesetFile> for Ruleset {
    type Error = RulesetError;

    fn try_from(file: RulesetFile) -> Result<Self, Self::Error> {
        Ruleset::new(file.name, file.falloff, file.clip_tolerance, file.weapons)
    }
}

impl Ruleset {
    /// Build a ruleset, checking every weapon kind is present and sane
    pub fn new(
        name: impl Into<String>,
        falloff: Option<Falloff>,
        clip_tolerance: u32,
        weapons: HashMap<WeaponKind, WeaponSpec>,
    ) -> Result<Self, RulesetError> {
        for kind in WeaponKind::ALL {
            let spec = weapons.get(&kind).ok_or(RulesetError::MissingWeapon(kind))?;
            spec.validate()
                .map_err(|source| RulesetError::InvalidWeapon { kind, source })?;
        }
        if let Some(falloff) = &falloff {
            validate_falloff(falloff)?;
        }

        Ok(Self {
            name: name.into(),
            falloff,
            clip_tolerance,
            weapons,
        })
    }

    pub fn preset(preset: RulesetPreset) -> Self {
        match preset {
            RulesetPreset::Classic => Self::classic(),
            RulesetPreset::Legacy => Self::legacy(),
        }
    }

    /// Flat damage, no falloff
    pub fn classic() -> Self {
        let rifle = WeaponSpec {
            fire_delay: 0.5,
            magazine_capacity: 10,
            reserve_capacity: 50,
            reload_duration: 2.5,
            slow_reload: false,
            damage: DamageTable::new(49, 100, 33, 33),
        };
        let smg = WeaponSpec {
            // nominally 0.1, server scheduling lands shots at ~0.11
            fire_delay: 0.11,
            magazine_capacity: 30,
            reserve_capacity: 120,
            reload_duration: 2.5,
            slow_reload: false,
            damage: DamageTable::new(29, 75, 18, 18),
        };
        let shotgun = WeaponSpec {
            fire_delay: 1.0,
            magazine_capacity: 6,
            reserve_capacity: 48,
            reload_duration: 0.5,
            slow_reload: true,
            damage: DamageTable::new(27, 37, 16, 16),
        };
        Self::from_base_weapons("classic", None, rifle, smg, shotgun)
    }

    /// Older balance: higher damage, falloff with distance
    pub fn legacy() -> Self {
        let rifle = WeaponSpec {
            fire_delay: 0.6,
            magazine_capacity: 8,
            reserve_capacity: 48,
            reload_duration: 2.5,
            slow_reload: false,
            damage: DamageTable::new(60, 1800, 50, 50),
        };
        let smg = WeaponSpec {
            fire_delay: 0.11,
            magazine_capacity: 30,
            reserve_capacity: 150,
            reload_duration: 2.5,
            slow_reload: false,
            damage: DamageTable::new(40, 60, 20, 20),
        };
        let shotgun = WeaponSpec {
            fire_delay: 0.8,
            magazine_capacity: 8,
            reserve_capacity: 48,
            reload_duration: 0.4,
            slow_reload: true,
            damage: DamageTable::new(40, 60, 20, 20),
        };
        Self::from_base_weapons("legacy", Some(Falloff::default()), rifle, smg, shotgun)
    }

    fn from_base_weapons(
        name: &str,
        falloff: Option<Falloff>,
        rifle: WeaponSpec,
        smg: WeaponSpec,
        shotgun: WeaponSpec,
    ) -> Self {
        // the PT SMG is its own weapon, the other PT variants share stats
        let smg_pt = WeaponSpec {
            fire_delay: 0.075,
            magazine_capacity: 20,
            reserve_capacity: 120,
            reload_duration: 5.0,
            slow_reload: false,
            damage: DamageTable::new(30, 34, 21, 21),
        };

        let weapons = HashMap::from([
            (WeaponKind::RiflePt, rifle.clone()),
            (WeaponKind::Rifle, rifle),
            (WeaponKind::Smg, smg),
            (WeaponKind::SmgPt, smg_pt),
            (WeaponKind::ShotgunPt, shotgun.clone()),
            (WeaponKind::Shotgun, shotgun),
        ]);

        Self {
            name: name.to_string(),
            falloff,
            clip_tolerance: DEFAULT_CLIP_TOLERANCE,
            weapons,
        }
    }

    /// Parse and validate a JSON ruleset
    pub fn from_json(json: &str) -> Result<Self, RulesetError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stats for `kind`; every kind is present once validated
    pub fn spec(&self, kind: WeaponKind) -> &WeaponSpec {
        &self.weapons[&kind]
    }

    pub fn falloff(&self) -> Option<&Falloff> {
        self.falloff.as_ref()
    }

    pub fn clip_tolerance(&self) -> u32 {
        self.clip_tolerance
    }

    /// Turn falloff on with constant `k`, or off
    pub fn with_falloff(mut self, falloff: Option<Falloff>) -> Result<Self, RulesetError> {
        if let Some(falloff) = &falloff {
            validate_falloff(falloff)?;
        }
        self.falloff = falloff;
        Ok(self)
    }

    pub fn with_clip_tolerance(mut self, clip_tolerance: u32) -> Self {
        self.clip_tolerance = clip_tolerance;
        self
    }
}

impl Default for Ruleset {
    fn default() -> Self {
        Self::classic()
    }
}

fn validate_falloff(falloff: &Falloff) -> Result<(), RulesetError> {
    let sane = falloff.k.is_finite()
        && falloff.k >= 0.0
        && falloff.exponent.is_finite()
        && falloff.exponent > 0.0;
    if sane {
        Ok(())
    } else {
        Err(RulesetError::InvalidFalloff {
            k: falloff.k,
            exponent: falloff.exponent,
        })
    }
}

/// Ruleset loading errors
#[derive(Debug, thiserror::Error)]
pub enum RulesetError {
    #[error("Unknown ruleset preset: {0}")]
    UnknownPreset(String),

    #[error("Ruleset has no stats for {0:?}")]
    MissingWeapon(WeaponKind),

    #[error("Invalid stats for {kind:?}: {source}")]
    InvalidWeapon {
        kind: WeaponKind,
        #[source]
        source: SpecError,
    },

    #[error("Invalid falloff curve (k = {k}, exponent = {exponent})")]
    InvalidFalloff { k: f64, exponent: f64 },

    #[error("Malformed ruleset JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_complete_and_valid() {
        for preset in [RulesetPreset::Classic, RulesetPreset::Legacy] {
            let ruleset = Ruleset::preset(preset);
            let weapons = ruleset.weapons.clone();
            let rebuilt =
                Ruleset::new(ruleset.name(), ruleset.falloff, ruleset.clip_tolerance, weapons);
            assert!(rebuilt.is_ok(), "{preset:?} failed validation");
        }
    }

    #[test]
    fn classic_has_no_falloff_legacy_does() {
        assert!(Ruleset::classic().falloff().is_none());
        let legacy = Ruleset::legacy();
        let falloff = legacy.falloff().copied().unwrap_or_default();
        assert_eq!(falloff.k, 0.0004);
        assert_eq!(falloff.exponent, 1.5);
    }

    #[test]
    fn pt_variants_share_base_stats_except_smg() {
        let ruleset = Ruleset::legacy();
        assert_eq!(ruleset.spec(WeaponKind::RiflePt), ruleset.spec(WeaponKind::Rifle));
        assert_eq!(ruleset.spec(WeaponKind::ShotgunPt), ruleset.spec(WeaponKind::Shotgun));
        assert_ne!(ruleset.spec(WeaponKind::SmgPt), ruleset.spec(WeaponKind::Smg));
        assert_eq!(ruleset.spec(WeaponKind::SmgPt).magazine_capacity, 20);
        assert!(ruleset.spec(WeaponKind::Shotgun).slow_reload);
    }

    #[test]
    fn preset_names_parse() {
        assert_eq!("Classic".parse::<RulesetPreset>().ok(), Some(RulesetPreset::Classic));
        assert_eq!(" legacy ".parse::<RulesetPreset>().ok(), Some(RulesetPreset::Legacy));
        assert!(matches!(
            "arena".parse::<RulesetPreset>(),
            Err(RulesetError::UnknownPreset(name)) if name == "arena"
        ));
    }

    #[test]
    fn json_ruleset_is_validated() {
        let mut value = serde_json::to_value(Ruleset::classic()).expect("serialize preset");
        value["name"] = "custom".into();
        value["falloff"] = serde_json::json!({ "k": 0.001 });
        let ruleset = Ruleset::from_json(&value.to_string()).expect("valid ruleset");
        assert_eq!(ruleset.name(), "custom");
        assert_eq!(ruleset.falloff().map(|f| f.exponent), Some(1.5));
        assert_eq!(ruleset.clip_tolerance(), DEFAULT_CLIP_TOLERANCE);

        value["weapons"]["smg"]["fire_delay"] = 0.0.into();
        let err = Ruleset::from_json(&value.to_string()).expect_err("zero delay must fail");
        assert!(err.to_string().contains("fire delay"), "{err}");

        let mut missing = serde_json::to_value(Ruleset::classic()).expect("serialize preset");
        missing["weapons"]
            .as_object_mut()
            .expect("weapons map")
            .remove("shotgun_pt");
        assert!(Ruleset::from_json(&missing.to_string()).is_err());
    }

    #[test]
    fn negative_falloff_is_rejected() {
        let result = Ruleset::classic().with_falloff(Some(Falloff::new(-0.1)));
        assert!(matches!(result, Err(RulesetError::InvalidFalloff { .. })));
    }
}
