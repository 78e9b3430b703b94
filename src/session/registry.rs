//! Registry of live weapon sessions

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::weapon::{SpecError, WeaponKind};

use super::actor::{SessionHandle, SessionSettings, WeaponSession};
use super::protocol::WeaponNotice;

/// Live sessions keyed by player id
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            sessions: DashMap::new(),
            settings,
        }
    }

    /// Start a session for a player, replacing any previous one
    pub fn open(
        &self,
        player_id: Uuid,
        kind: WeaponKind,
    ) -> Result<(SessionHandle, mpsc::Receiver<WeaponNotice>), SpecError> {
        let (handle, notice_rx) = WeaponSession::spawn(player_id, kind, self.settings.clone())?;
        if let Some(previous) = self.sessions.insert(player_id, handle.clone()) {
            info!(player_id = %player_id, "Replacing existing weapon session");
            previous.request_shutdown();
        }
        Ok((handle, notice_rx))
    }

    pub fn get(&self, player_id: &Uuid) -> Option<SessionHandle> {
        self.sessions.get(player_id).map(|entry| entry.clone())
    }

    /// Stop and forget a player's session (disconnect)
    pub fn close(&self, player_id: &Uuid) -> Option<SessionHandle> {
        let (_, handle) = self.sessions.remove(player_id)?;
        handle.request_shutdown();
        Some(handle)
    }

    /// Drop entries whose session task has already ended
    pub fn prune(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, handle| !handle.is_closed());
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
}
