//! Per-player weapon fire-control state machine
//!
//! A `Weapon` is owned by exactly one session and mutated only from that
//! session's task. Reload completion arrives as a `TimerTicket` on the channel
//! handed to `Weapon::new`; the owner passes it back through
//! `on_reload_elapsed`, which drops tickets from cancelled or superseded
//! reloads.

use glam::Vec3;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::telemetry::{IgnoredRequest, RequestLedger};
use crate::timer::{DebouncedTimer, TimerTicket};
use crate::util::time::{secs_to_duration, SharedClock};

use super::ammo::{burst_ammo, clamp_ammo};
use super::damage::{compute_damage, Falloff};
use super::spec::{HitRegion, SpecError, WeaponKind, WeaponSpec};

/// Where the state machine currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponPhase {
    Idle,
    Firing,
    ReloadingBulk,
    ReloadingSlow,
}

/// Something the owning session should react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponEffect {
    ReloadStarted,
    ReloadFinished { magazine: u32, reserve: u32 },
    RoundLoaded { magazine: u32, reserve: u32 },
    Ignored(IgnoredRequest),
}

/// Point-in-time view of a weapon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeaponSnapshot {
    pub kind: WeaponKind,
    pub magazine: u32,
    pub reserve: u32,
    pub firing: bool,
    pub reloading: bool,
    pub phase: WeaponPhase,
}

#[derive(Debug, Clone, PartialEq)]
struct WeaponState {
    /// Committed magazine count; while firing, the count at burst start
    ammo_in_magazine: u32,
    ammo_in_reserve: u32,
    firing: bool,
    burst_start_time: f64,
    /// Earliest time the next burst may land a shot
    next_shot_time: Option<f64>,
    reloading: bool,
}

impl WeaponState {
    fn full(spec: &WeaponSpec) -> Self {
        Self {
            ammo_in_magazine: spec.magazine_capacity,
            ammo_in_reserve: spec.reserve_capacity,
            firing: false,
            burst_start_time: 0.0,
            next_shot_time: None,
            reloading: false,
        }
    }
}

/// Authoritative ammo, fire and reload state for one held weapon
#[derive(Debug)]
pub struct Weapon {
    kind: WeaponKind,
    spec: WeaponSpec,
    clock: SharedClock,
    state: WeaponState,
    reload_timer: DebouncedTimer,
    effects: Vec<WeaponEffect>,
    ignored: RequestLedger,
}

impl Weapon {
    /// Spawn-fresh weapon with a full magazine and reserve
    ///
    /// Fails on stats the state machine cannot run with.
    pub fn new(
        kind: WeaponKind,
        spec: WeaponSpec,
        clock: SharedClock,
        reload_events: mpsc::UnboundedSender<TimerTicket>,
    ) -> Result<Self, SpecError> {
        spec.validate()?;

        let reload_timer = DebouncedTimer::with_ticket(move |ticket| {
            // the owner may already be gone
            let _ = reload_events.send(ticket);
        });

        Ok(Self {
            kind,
            state: WeaponState::full(&spec),
            spec,
            clock,
            reload_timer,
            effects: Vec::new(),
            ignored: RequestLedger::new(),
        })
    }

    pub fn kind(&self) -> WeaponKind {
        self.kind
    }

    pub fn spec(&self) -> &WeaponSpec {
        &self.spec
    }

    pub fn is_firing(&self) -> bool {
        self.state.firing
    }

    pub fn is_reloading(&self) -> bool {
        self.state.reloading
    }

    pub fn reserve(&self) -> u32 {
        self.state.ammo_in_reserve
    }

    pub fn phase(&self) -> WeaponPhase {
        match (self.state.firing, self.state.reloading, self.spec.slow_reload) {
            (true, _, _) => WeaponPhase::Firing,
            (false, true, true) => WeaponPhase::ReloadingSlow,
            (false, true, false) => WeaponPhase::ReloadingBulk,
            (false, false, _) => WeaponPhase::Idle,
        }
    }

    /// Magazine count right now, below zero if the trigger was held past empty
    pub fn ammo_unclamped(&self) -> i64 {
        if self.state.firing {
            burst_ammo(
                self.state.ammo_in_magazine,
                self.state.burst_start_time,
                self.clock.now(),
                self.spec.fire_delay,
            )
        } else {
            i64::from(self.state.ammo_in_magazine)
        }
    }

    /// Magazine count right now
    pub fn ammo(&self) -> u32 {
        clamp_ammo(self.ammo_unclamped())
    }

    pub fn snapshot(&self) -> WeaponSnapshot {
        WeaponSnapshot {
            kind: self.kind,
            magazine: self.ammo(),
            reserve: self.state.ammo_in_reserve,
            firing: self.state.firing,
            reloading: self.state.reloading,
            phase: self.phase(),
        }
    }

    /// Press or release the trigger
    pub fn set_firing(&mut self, on: bool) {
        if on == self.state.firing {
            return;
        }
        if on {
            self.start_burst();
        } else {
            self.stop_burst();
        }
    }

    fn start_burst(&mut self) {
        if self.ammo() == 0 {
            self.ignore(IgnoredRequest::FireWhileEmpty);
            return;
        }
        if self.state.reloading {
            if !self.spec.slow_reload {
                self.ignore(IgnoredRequest::FireDuringBulkReload);
                return;
            }
            self.cancel_reload();
            debug!(weapon = ?self.kind, "Round-by-round reload interrupted by firing");
        }

        let now = self.clock.now();
        self.state.burst_start_time = self.state.next_shot_time.map_or(now, |next| next.max(now));
        self.state.firing = true;
    }

    fn stop_burst(&mut self) {
        let before = self.state.ammo_in_magazine;
        let after = self.ammo();

        self.state.ammo_in_magazine = after;
        self.state.next_shot_time =
            Some(self.state.burst_start_time + self.spec.fire_delay * f64::from(before - after));
        self.state.firing = false;
    }

    /// Ask for a reload; refused silently when not currently legal
    pub fn request_reload(&mut self) {
        if self.state.reloading {
            self.ignore(IgnoredRequest::ReloadWhileReloading);
            return;
        }
        let ammo = self.ammo();
        if self.state.ammo_in_reserve == 0 {
            self.ignore(IgnoredRequest::ReloadWithoutReserve);
            return;
        }
        if ammo >= self.spec.magazine_capacity {
            self.ignore(IgnoredRequest::ReloadWithFullMagazine);
            return;
        }
        if self.spec.slow_reload && self.state.firing && ammo > 0 {
            self.ignore(IgnoredRequest::ReloadWhileFiring);
            return;
        }

        if self.state.firing {
            self.stop_burst();
        }
        self.state.reloading = true;
        self.arm_reload_timer();
        self.effects.push(WeaponEffect::ReloadStarted);
        debug!(
            weapon = ?self.kind,
            magazine = self.state.ammo_in_magazine,
            reserve = self.state.ammo_in_reserve,
            "Reload started"
        );
    }

    /// Reload timer fired; `ticket` identifies which arming
    pub fn on_reload_elapsed(&mut self, ticket: TimerTicket) {
        if !self.state.reloading || !self.reload_timer.is_current(ticket) {
            trace!(
                weapon = ?self.kind,
                generation = ticket.generation(),
                "Dropping stale reload completion"
            );
            return;
        }
        if self.spec.slow_reload {
            self.load_one_round();
        } else {
            self.load_magazine();
        }
    }

    fn load_magazine(&mut self) {
        let deficit = self.spec.magazine_capacity.saturating_sub(self.state.ammo_in_magazine);
        let moved = deficit.min(self.state.ammo_in_reserve);
        self.state.ammo_in_magazine += moved;
        self.state.ammo_in_reserve -= moved;
        self.state.reloading = false;
        self.effects.push(WeaponEffect::ReloadFinished {
            magazine: self.state.ammo_in_magazine,
            reserve: self.state.ammo_in_reserve,
        });
    }

    fn load_one_round(&mut self) {
        let has_room = self.state.ammo_in_magazine < self.spec.magazine_capacity;
        if self.state.ammo_in_reserve > 0 && has_room {
            self.state.ammo_in_magazine += 1;
            self.state.ammo_in_reserve -= 1;
            self.effects.push(WeaponEffect::RoundLoaded {
                magazine: self.state.ammo_in_magazine,
                reserve: self.state.ammo_in_reserve,
            });
        }

        let done = self.state.ammo_in_magazine >= self.spec.magazine_capacity
            || self.state.ammo_in_reserve == 0;
        if done {
            self.state.reloading = false;
            self.effects.push(WeaponEffect::ReloadFinished {
                magazine: self.state.ammo_in_magazine,
                reserve: self.state.ammo_in_reserve,
            });
        } else {
            self.arm_reload_timer();
        }
    }

    fn arm_reload_timer(&mut self) {
        self.reload_timer
            .start_or_reset(secs_to_duration(self.spec.reload_duration));
    }

    fn cancel_reload(&mut self) {
        self.reload_timer.stop();
        self.state.reloading = false;
    }

    /// True if a client-reported shot cannot have been legal
    ///
    /// Either the trigger is not held, or the burst has run more than
    /// `tolerance` shots past an empty magazine.
    pub fn is_depleted(&self, tolerance: u32) -> bool {
        !self.state.firing || self.ammo_unclamped() < -i64::from(tolerance)
    }

    /// Check a client-reported shot, counting it when refused
    pub fn validate_shot(&mut self, tolerance: u32) -> bool {
        if self.is_depleted(tolerance) {
            self.ignore(IgnoredRequest::HitWhileDepleted);
            return false;
        }
        true
    }

    /// Damage for a hit with this weapon
    pub fn damage(
        &self,
        falloff: Option<&Falloff>,
        region: HitRegion,
        attacker: Vec3,
        target: Vec3,
    ) -> u32 {
        compute_damage(&self.spec, falloff, region, attacker, target)
    }

    /// Back to spawn state: full magazine and reserve, nothing in progress
    ///
    /// The fire cooldown left by the last burst still applies.
    pub fn reset(&mut self) {
        self.reload_timer.stop();
        let next_shot_time = self.state.next_shot_time;
        self.state = WeaponState {
            next_shot_time,
            ..WeaponState::full(&self.spec)
        };
    }

    /// Refill the reserve, leaving the magazine alone
    pub fn restock(&mut self) {
        self.state.ammo_in_reserve = self.spec.reserve_capacity;
    }

    /// Drain side effects produced since the last call
    pub fn take_effects(&mut self) -> Vec<WeaponEffect> {
        std::mem::take(&mut self.effects)
    }

    pub fn ignored_requests(&self) -> &RequestLedger {
        &self.ignored
    }

    fn ignore(&mut self, request: IgnoredRequest) {
        debug!(weapon = ?self.kind, reason = %request, "Ignored weapon request");
        self.ignored.record(request);
        self.effects.push(WeaponEffect::Ignored(request));
    }
}
