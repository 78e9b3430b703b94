//! Kill-streak airstrikes: earning, cooldown and sequenced grenade drops
//!
//! A launch turns into dozens of grenade drops spread over several seconds.
//! Each drop has its own `DebouncedTimer`, so ending the strike (team change,
//! disconnect) cancels every drop that has not landed yet.

use std::f32::consts::TAU;
use std::time::Duration;

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::timer::{DebouncedTimer, Nag};
use crate::util::time::secs_to_duration;

/// Airstrike tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirstrikeSettings {
    /// Qualifying kills in a row to earn a strike
    pub streak_requirement: u32,
    /// Seconds a team waits between launches
    pub team_cooldown: f64,
    /// Seconds from launch to the first drop
    pub arrival_delay: f64,
    pub waves: u32,
    pub grenades_per_wave: u32,
    /// Seconds between waves
    pub wave_interval: f64,
    /// Seconds between grenades in one wave
    pub grenade_interval: f64,
    /// Max distance of a wave centre from ground zero
    pub radius: f32,
    /// Forward shift per grenade, drawn from this range
    pub forward_jitter: (f32, f32),
    /// Sideways shift per grenade, drawn from `-spread..spread`
    pub spread: f32,
    pub map_max_x: f32,
    pub drop_z: f32,
    /// Seconds after spawning before a held strike is announced
    pub ready_reminder: f64,
}

impl AirstrikeSettings {
    /// Reject tuning that cannot produce a sane strike
    pub fn validate(&self) -> Result<(), AirstrikeSettingsError> {
        let timings = [
            ("team_cooldown", self.team_cooldown),
            ("arrival_delay", self.arrival_delay),
            ("wave_interval", self.wave_interval),
            ("grenade_interval", self.grenade_interval),
            ("ready_reminder", self.ready_reminder),
        ];
        for (field, value) in timings {
            if !(value.is_finite() && value >= 0.0) {
                return Err(AirstrikeSettingsError::Timing { field, value });
            }
        }
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            return Err(AirstrikeSettingsError::Radius(self.radius));
        }
        let (low, high) = self.forward_jitter;
        if !(low.is_finite() && high.is_finite() && low <= high) {
            return Err(AirstrikeSettingsError::ForwardJitter { low, high });
        }
        if !(self.spread.is_finite() && self.spread >= 0.0) {
            return Err(AirstrikeSettingsError::Spread(self.spread));
        }
        if !(self.map_max_x.is_finite() && self.map_max_x >= 0.0 && self.drop_z.is_finite()) {
            return Err(AirstrikeSettingsError::Map {
                max_x: self.map_max_x,
                drop_z: self.drop_z,
            });
        }
        match self.waves.checked_mul(self.grenades_per_wave) {
            Some(total) if total <= MAX_DROPS => Ok(()),
            _ => Err(AirstrikeSettingsError::TooManyDrops {
                waves: self.waves,
                grenades_per_wave: self.grenades_per_wave,
            }),
        }
    }
}

/// Most grenades one strike may drop
pub const MAX_DROPS: u32 = 1000;

/// Invalid airstrike tuning
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AirstrikeSettingsError {
    #[error("{field} must be a non-negative number of seconds, got {value}")]
    Timing { field: &'static str, value: f64 },

    #[error("wave radius must be non-negative, got {0}")]
    Radius(f32),

    #[error("forward jitter range {low}..{high} is empty")]
    ForwardJitter { low: f32, high: f32 },

    #[error("sideways spread must be non-negative, got {0}")]
    Spread(f32),

    #[error("map bounds are invalid: max x {max_x}, drop z {drop_z}")]
    Map { max_x: f32, drop_z: f32 },

    #[error("{waves} waves of {grenades_per_wave} grenades exceeds {} drops", MAX_DROPS)]
    TooManyDrops { waves: u32, grenades_per_wave: u32 },
}

impl Default for AirstrikeSettings {
    fn default() -> Self {
        Self {
            streak_requirement: 8,
            team_cooldown: 25.0,
            arrival_delay: 1.2,
            waves: 10,
            grenades_per_wave: 5,
            wave_interval: 0.85,
            grenade_interval: 0.11,
            radius: 30.0,
            forward_jitter: (3.0, 4.0),
            spread: 0.6,
            map_max_x: 511.0,
            drop_z: 1.0,
            ready_reminder: 4.0,
        }
    }
}

/// How a kill was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillCause {
    Weapon,
    Melee,
    Grenade,
    Airstrike,
    Fall,
}

impl KillCause {
    /// Airstrike and environmental kills do not build a streak
    pub fn counts_for_streak(self) -> bool {
        matches!(self, Self::Weapon | Self::Melee | Self::Grenade)
    }
}

/// Consecutive qualifying kills since the player last died
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillStreak {
    requirement: u32,
    count: u32,
    ready: bool,
}

impl KillStreak {
    pub fn new(requirement: u32) -> Self {
        Self {
            requirement: requirement.max(1),
            count: 0,
            ready: false,
        }
    }

    /// Credit a kill; true when this kill earns the strike
    pub fn record_kill(&mut self, cause: KillCause, teammate: bool) -> bool {
        // a held strike freezes the streak
        if teammate || !cause.counts_for_streak() || self.ready {
            return false;
        }
        self.count += 1;
        if self.count >= self.requirement {
            self.ready = true;
            return true;
        }
        false
    }

    /// The holder died; a strike already earned is kept
    pub fn on_death(&mut self) {
        self.count = 0;
    }

    /// Spend the earned strike
    pub fn consume(&mut self) -> bool {
        if !self.ready {
            return false;
        }
        self.ready = false;
        self.count = 0;
        true
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.ready = false;
    }

    pub fn grant(&mut self) {
        self.ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Kills still needed
    pub fn remaining(&self) -> u32 {
        if self.ready {
            0
        } else {
            self.requirement.saturating_sub(self.count)
        }
    }
}

/// Per-team launch cooldown
#[derive(Debug, Clone, PartialEq)]
pub struct TeamCooldown {
    window: f64,
    last_launch: Option<f64>,
}

impl TeamCooldown {
    pub fn new(window: f64) -> Self {
        Self {
            window,
            last_launch: None,
        }
    }

    /// Whole seconds (rounded up) until the team may launch again
    pub fn remaining(&self, now: f64) -> Option<u32> {
        let last = self.last_launch?;
        let elapsed = now - last;
        if elapsed < self.window {
            Some((self.window - elapsed).ceil() as u32)
        } else {
            None
        }
    }

    pub fn mark_launch(&mut self, now: f64) {
        self.last_launch = Some(now);
    }
}

/// One grenade of a strike
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrenadeDrop {
    /// Time after launch
    pub delay: Duration,
    pub position: Vec3,
}

/// Forward direction of a team's bombers along x
pub fn team_direction(team_id: u8) -> f32 {
    if team_id == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Uniform draw from `low..high`, or `low` when the range is empty
fn sample_span<R: Rng>(rng: &mut R, low: f32, high: f32) -> f32 {
    if low < high {
        rng.gen_range(low..high)
    } else {
        low
    }
}

/// Mean of three uniform draws: bell-shaped over `low..high`
fn bell_sample<R: Rng>(rng: &mut R, low: f32, high: f32) -> f32 {
    (sample_span(rng, low, high) + sample_span(rng, low, high) + sample_span(rng, low, high))
        / 3.0
}

/// Lay out every grenade of a strike on `target`
pub fn plan_drops<R: Rng>(
    settings: &AirstrikeSettings,
    target: Vec3,
    direction: f32,
    rng: &mut R,
) -> Vec<GrenadeDrop> {
    // start short of the target to account for forward travel while falling
    let travel = 32.0 * target.z / 64.0;
    let origin_x = (target.x - travel * direction).min(settings.map_max_x).max(0.0);
    let (jitter_low, jitter_high) = settings.forward_jitter;
    let radius = settings.radius.abs();
    let spread = settings.spread.abs();

    let capacity = settings.waves.saturating_mul(settings.grenades_per_wave).min(MAX_DROPS);
    let mut drops = Vec::with_capacity(capacity as usize);
    for wave in 0..settings.waves {
        let angle = rng.gen_range(0.0..TAU);
        let distance = bell_sample(rng, -radius, radius);
        let mut x = origin_x + angle.cos() * distance;
        let mut y = target.y + angle.sin() * distance;

        for grenade in 0..settings.grenades_per_wave {
            x += direction * sample_span(rng, jitter_low, jitter_high);
            y += sample_span(rng, -spread, spread);
            let delay = settings.arrival_delay
                + f64::from(wave) * settings.wave_interval
                + f64::from(grenade) * settings.grenade_interval;
            drops.push(GrenadeDrop {
                delay: secs_to_duration(delay),
                position: Vec3::new(x, y, settings.drop_z),
            });
        }
    }
    drops
}

/// Events an airstrike holder's connection acts on
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AirstrikeEvent {
    /// Remind the player they hold a strike
    ReadyReminder,
    /// Spawn this grenade now
    Drop(GrenadeDrop),
}

/// Pending drops of one launched strike
#[derive(Debug)]
pub struct AirstrikeSequencer {
    timers: Vec<DebouncedTimer>,
}

impl AirstrikeSequencer {
    /// Arm a timer per drop; each delivers its drop when due
    pub fn launch(
        drops: Vec<GrenadeDrop>,
        events: mpsc::UnboundedSender<AirstrikeEvent>,
    ) -> Self {
        let timers = drops
            .into_iter()
            .map(|drop| {
                let events = events.clone();
                let mut timer = DebouncedTimer::new(move || {
                    let _ = events.send(AirstrikeEvent::Drop(drop));
                });
                timer.start_or_reset(drop.delay);
                timer
            })
            .collect();
        Self { timers }
    }

    /// Drops still to come
    pub fn pending(&self) -> usize {
        self.timers.iter().filter(|timer| timer.is_active()).count()
    }

    pub fn is_finished(&self) -> bool {
        self.pending() == 0
    }

    pub fn cancel(&mut self) {
        for timer in &mut self.timers {
            timer.stop();
        }
    }
}

/// Why a launch was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchRefused {
    #[error("{remaining} kills to go before an airstrike")]
    NotReady { remaining: u32 },

    #[error("{seconds} seconds before your team can launch another airstrike")]
    Cooldown { seconds: u32 },
}

/// One player's airstrike state
#[derive(Debug)]
pub struct AirstrikeState {
    settings: AirstrikeSettings,
    streak: KillStreak,
    reminder: Nag,
    active: Option<AirstrikeSequencer>,
    events: mpsc::UnboundedSender<AirstrikeEvent>,
    rng: ChaCha8Rng,
}

impl AirstrikeState {
    /// Fails on tuning `plan_drops` cannot work with
    pub fn new(
        settings: AirstrikeSettings,
        events: mpsc::UnboundedSender<AirstrikeEvent>,
        seed: u64,
    ) -> Result<Self, AirstrikeSettingsError> {
        settings.validate()?;
        let reminder_events = events.clone();
        let reminder = Nag::new(secs_to_duration(settings.ready_reminder), move || {
            let _ = reminder_events.send(AirstrikeEvent::ReadyReminder);
        });
        Ok(Self {
            streak: KillStreak::new(settings.streak_requirement),
            settings,
            reminder,
            active: None,
            events,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    pub fn streak(&self) -> &KillStreak {
        &self.streak
    }

    /// Credit a kill made by this player; true when it earns the strike
    pub fn on_kill(&mut self, cause: KillCause, teammate: bool) -> bool {
        let earned = self.streak.record_kill(cause, teammate);
        if earned {
            info!(kills = self.streak.count(), "Airstrike earned");
        }
        earned
    }

    /// This player died
    pub fn on_death(&mut self) {
        self.streak.on_death();
        self.reminder.stop();
    }

    pub fn on_spawn(&mut self) {
        if self.streak.is_ready() {
            self.reminder.start_or_reset();
        }
    }

    /// Call in the held strike on `target`
    pub fn launch(
        &mut self,
        target: Vec3,
        team_id: u8,
        cooldown: &mut TeamCooldown,
        now: f64,
    ) -> Result<usize, LaunchRefused> {
        if !self.streak.is_ready() {
            return Err(LaunchRefused::NotReady {
                remaining: self.streak.remaining(),
            });
        }
        if let Some(seconds) = cooldown.remaining(now) {
            return Err(LaunchRefused::Cooldown { seconds });
        }

        self.streak.consume();
        self.reminder.stop();
        cooldown.mark_launch(now);

        let direction = team_direction(team_id);
        let drops = plan_drops(&self.settings, target, direction, &mut self.rng);
        let count = drops.len();
        if let Some(mut previous) = self.active.take() {
            previous.cancel();
        }
        self.active = Some(AirstrikeSequencer::launch(drops, self.events.clone()));
        info!(team_id, x = target.x, y = target.y, drops = count, "Airstrike launched");
        Ok(count)
    }

    /// Drops of the current strike still to land
    pub fn pending_drops(&self) -> usize {
        self.active.as_ref().map_or(0, AirstrikeSequencer::pending)
    }

    /// Cancel any strike in flight (team change)
    pub fn end_strike(&mut self) {
        if let Some(mut sequencer) = self.active.take() {
            let pending = sequencer.pending();
            sequencer.cancel();
            debug!(pending, "Airstrike cancelled");
        }
    }

    /// Back to a fresh player (disconnect, map change)
    pub fn reset(&mut self) {
        self.streak.reset();
        self.reminder.stop();
        self.end_strike();
    }
}
