//! Messages between the connection layer and a weapon session

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::telemetry::RequestLedger;
use crate::weapon::{HitRegion, WeaponKind, WeaponSnapshot};

/// Notices a session publishes for its connection to forward to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WeaponNotice {
    /// A reload was accepted
    ReloadStarted { player_id: Uuid, weapon: WeaponKind },

    /// The reload is over; counts are authoritative
    ReloadFinished {
        player_id: Uuid,
        weapon: WeaponKind,
        magazine: u32,
        reserve: u32,
    },

    /// One round went in during a round-by-round reload
    RoundLoaded {
        player_id: Uuid,
        weapon: WeaponKind,
        magazine: u32,
        reserve: u32,
    },
}

impl WeaponNotice {
    pub fn player_id(&self) -> Uuid {
        match self {
            Self::ReloadStarted { player_id, .. }
            | Self::ReloadFinished { player_id, .. }
            | Self::RoundLoaded { player_id, .. } => *player_id,
        }
    }
}

/// Requests processed by the session task, in arrival order
#[derive(Debug)]
pub(crate) enum SessionCommand {
    SetFiring(bool),
    RequestReload,
    Reset,
    Restock,
    SwitchWeapon(WeaponKind),
    Snapshot(oneshot::Sender<WeaponSnapshot>),
    ValidateShot(oneshot::Sender<bool>),
    Damage {
        region: HitRegion,
        attacker: Vec3,
        target: Vec3,
        reply: oneshot::Sender<u32>,
    },
    IgnoredRequests(oneshot::Sender<RequestLedger>),
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_serialize_with_type_tag() {
        let player_id = Uuid::new_v4();
        let notice = WeaponNotice::RoundLoaded {
            player_id,
            weapon: WeaponKind::Shotgun,
            magazine: 4,
            reserve: 20,
        };
        let json = serde_json::to_value(&notice).expect("serialize notice");
        assert_eq!(json["type"], "round_loaded");
        assert_eq!(json["weapon"], "shotgun");
        assert_eq!(json["magazine"], 4);
        assert_eq!(notice.player_id(), player_id);
    }
}
