//! Per-player weapon session task
//!
//! The session task is the only place its weapon is touched. Commands from the
//! connection and reload timer events are interleaved on one task, so nothing
//! about the weapon needs a lock.

use std::sync::Arc;

use glam::Vec3;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::telemetry::RequestLedger;
use crate::timer::TimerTicket;
use crate::util::rate_limit::IgnoredLogLimiter;
use crate::util::time::SharedClock;
use crate::weapon::{
    HitRegion, Ruleset, SpecError, Weapon, WeaponEffect, WeaponKind, WeaponSnapshot,
};

use super::protocol::{SessionCommand, WeaponNotice};

/// Buffered commands per session
const COMMAND_BUFFER: usize = 256;

/// Buffered notices per session before new ones are dropped
const NOTICE_BUFFER: usize = 64;

/// What every session on a server shares
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ruleset: Arc<Ruleset>,
    pub clock: SharedClock,
    pub ignored_log_per_second: u32,
}

impl SessionSettings {
    pub fn new(config: &Config, clock: SharedClock) -> Self {
        Self {
            ruleset: Arc::clone(&config.ruleset),
            clock,
            ignored_log_per_second: config.ignored_log_per_second,
        }
    }
}

/// Session has ended
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Weapon session for player {0} has ended")]
    Closed(Uuid),
}

/// Handle for driving a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub player_id: Uuid,
    command_tx: mpsc::Sender<SessionCommand>,
    stop_tx: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SessionError::Closed(self.player_id))
    }

    async fn ask<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(command(reply_tx)).await?;
        reply_rx.await.map_err(|_| SessionError::Closed(self.player_id))
    }

    pub async fn set_firing(&self, on: bool) -> Result<(), SessionError> {
        self.send(SessionCommand::SetFiring(on)).await
    }

    pub async fn request_reload(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::RequestReload).await
    }

    /// Respawn: full ammo, nothing in progress
    pub async fn reset(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Reset).await
    }

    pub async fn restock(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Restock).await
    }

    pub async fn switch_weapon(&self, kind: WeaponKind) -> Result<(), SessionError> {
        self.send(SessionCommand::SwitchWeapon(kind)).await
    }

    pub async fn snapshot(&self) -> Result<WeaponSnapshot, SessionError> {
        self.ask(SessionCommand::Snapshot).await
    }

    pub async fn ammo(&self) -> Result<u32, SessionError> {
        Ok(self.snapshot().await?.magazine)
    }

    /// Whether a shot the client reports now could have been fired
    pub async fn validate_shot(&self) -> Result<bool, SessionError> {
        self.ask(SessionCommand::ValidateShot).await
    }

    pub async fn damage(
        &self,
        region: HitRegion,
        attacker: Vec3,
        target: Vec3,
    ) -> Result<u32, SessionError> {
        self.ask(|reply| SessionCommand::Damage {
            region,
            attacker,
            target,
            reply,
        })
        .await
    }

    pub async fn ignored_requests(&self) -> Result<RequestLedger, SessionError> {
        self.ask(SessionCommand::IgnoredRequests).await
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Shutdown).await
    }

    /// Stop the session without queueing behind pending commands
    pub(crate) fn request_shutdown(&self) {
        if self.stop_tx.send(true).is_err() {
            debug!(player_id = %self.player_id, "Session already stopped");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}

/// The authoritative weapon session for one player
pub struct WeaponSession {
    player_id: Uuid,
    settings: SessionSettings,
    weapon: Weapon,
    command_rx: mpsc::Receiver<SessionCommand>,
    reload_tx: mpsc::UnboundedSender<TimerTicket>,
    reload_rx: mpsc::UnboundedReceiver<TimerTicket>,
    notice_tx: mpsc::Sender<WeaponNotice>,
    stop_rx: watch::Receiver<bool>,
    log_limiter: IgnoredLogLimiter,
}

impl WeaponSession {
    /// Create a session holding `kind`
    ///
    /// Returns the session (to be run), its handle and the notice stream for
    /// the connection.
    pub fn new(
        player_id: Uuid,
        kind: WeaponKind,
        settings: SessionSettings,
    ) -> Result<(Self, SessionHandle, mpsc::Receiver<WeaponNotice>), SpecError> {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (reload_tx, reload_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::channel(NOTICE_BUFFER);
        let (stop_tx, stop_rx) = watch::channel(false);

        let weapon = Weapon::new(
            kind,
            settings.ruleset.spec(kind).clone(),
            Arc::clone(&settings.clock),
            reload_tx.clone(),
        )?;

        let handle = SessionHandle {
            player_id,
            command_tx,
            stop_tx: Arc::new(stop_tx),
        };

        let session = Self {
            player_id,
            log_limiter: IgnoredLogLimiter::new(settings.ignored_log_per_second),
            settings,
            weapon,
            command_rx,
            reload_tx,
            reload_rx,
            notice_tx,
            stop_rx,
        };

        Ok((session, handle, notice_rx))
    }

    /// Create and spawn a session on the current runtime
    pub fn spawn(
        player_id: Uuid,
        kind: WeaponKind,
        settings: SessionSettings,
    ) -> Result<(SessionHandle, mpsc::Receiver<WeaponNotice>), SpecError> {
        let (session, handle, notice_rx) = Self::new(player_id, kind, settings)?;
        tokio::spawn(session.run());
        Ok((handle, notice_rx))
    }

    /// Process commands and timer events until shut down or abandoned
    pub async fn run(mut self) {
        info!(player_id = %self.player_id, weapon = ?self.weapon.kind(), "Weapon session started");

        loop {
            tokio::select! {
                biased;

                _ = self.stop_rx.changed() => {
                    debug!(player_id = %self.player_id, "Session stop requested");
                    break;
                }
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        debug!(player_id = %self.player_id, "All session handles dropped");
                        break;
                    };
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Some(ticket) = self.reload_rx.recv() => {
                    self.weapon.on_reload_elapsed(ticket);
                }
            }

            self.flush_effects();
        }

        // dropping the weapon stops its reload timer
        info!(player_id = %self.player_id, "Weapon session ended");
    }

    /// Returns false when the session should stop
    fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::SetFiring(on) => self.weapon.set_firing(on),
            SessionCommand::RequestReload => self.weapon.request_reload(),
            SessionCommand::Reset => self.weapon.reset(),
            SessionCommand::Restock => self.weapon.restock(),
            SessionCommand::SwitchWeapon(kind) => self.switch_weapon(kind),
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.weapon.snapshot());
            }
            SessionCommand::ValidateShot(reply) => {
                let legal = self.weapon.validate_shot(self.settings.ruleset.clip_tolerance());
                let _ = reply.send(legal);
            }
            SessionCommand::Damage {
                region,
                attacker,
                target,
                reply,
            } => {
                let damage = self
                    .weapon
                    .damage(self.settings.ruleset.falloff(), region, attacker, target);
                let _ = reply.send(damage);
            }
            SessionCommand::IgnoredRequests(reply) => {
                let _ = reply.send(self.weapon.ignored_requests().clone());
            }
            SessionCommand::Shutdown => return false,
        }
        true
    }

    fn switch_weapon(&mut self, kind: WeaponKind) {
        if kind == self.weapon.kind() {
            return;
        }
        let spec = self.settings.ruleset.spec(kind).clone();
        match Weapon::new(kind, spec, Arc::clone(&self.settings.clock), self.reload_tx.clone()) {
            Ok(weapon) => {
                info!(
                    player_id = %self.player_id,
                    from = ?self.weapon.kind(),
                    to = ?kind,
                    "Weapon switched"
                );
                // the old weapon's pending reload dies with it
                self.weapon = weapon;
            }
            Err(e) => {
                error!(
                    player_id = %self.player_id,
                    weapon = ?kind,
                    error = %e,
                    "Refusing invalid weapon stats"
                );
            }
        }
    }

    fn flush_effects(&mut self) {
        let weapon = self.weapon.kind();
        for effect in self.weapon.take_effects() {
            let notice = match effect {
                WeaponEffect::ReloadStarted => WeaponNotice::ReloadStarted {
                    player_id: self.player_id,
                    weapon,
                },
                WeaponEffect::ReloadFinished { magazine, reserve } => WeaponNotice::ReloadFinished {
                    player_id: self.player_id,
                    weapon,
                    magazine,
                    reserve,
                },
                WeaponEffect::RoundLoaded { magazine, reserve } => WeaponNotice::RoundLoaded {
                    player_id: self.player_id,
                    weapon,
                    magazine,
                    reserve,
                },
                WeaponEffect::Ignored(request) => {
                    if self.log_limiter.check() {
                        warn!(
                            player_id = %self.player_id,
                            weapon = ?weapon,
                            reason = %request,
                            "Ignored weapon request"
                        );
                    }
                    continue;
                }
            };
            self.publish(notice);
        }
    }

    fn publish(&self, notice: WeaponNotice) {
        match self.notice_tx.try_send(notice) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(notice)) => {
                warn!(player_id = %self.player_id, ?notice, "Notice buffer full, dropping notice");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(player_id = %self.player_id, "Notice receiver gone");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::ManualClock;
    use std::time::Duration;
    use tokio::time::timeout;

    fn settings() -> SessionSettings {
        SessionSettings::new(&Config::default(), ManualClock::shared(0.0))
    }

    #[tokio::test(start_paused = true)]
    async fn stop_request_skips_a_full_command_buffer() {
        let player_id = Uuid::new_v4();
        let (session, handle, mut notices) =
            WeaponSession::new(player_id, WeaponKind::Rifle, settings()).expect("valid rifle");

        for _ in 0..COMMAND_BUFFER {
            handle
                .command_tx
                .try_send(SessionCommand::Restock)
                .expect("buffer has room");
        }
        assert!(handle.command_tx.try_send(SessionCommand::Restock).is_err());

        handle.request_shutdown();
        let task = tokio::spawn(session.run());
        timeout(Duration::from_secs(1), task)
            .await
            .expect("session stopped")
            .expect("session task did not panic");

        assert!(notices.recv().await.is_none());
        assert!(handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_request_after_session_ended_is_harmless() {
        let (handle, mut notices) =
            WeaponSession::spawn(Uuid::new_v4(), WeaponKind::Smg, settings()).expect("valid smg");
        handle.shutdown().await.expect("session running");
        assert!(notices.recv().await.is_none());

        handle.request_shutdown();
        assert_eq!(handle.snapshot().await, Err(SessionError::Closed(handle.player_id)));
    }
}
