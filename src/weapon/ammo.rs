//! Ammo as a function of elapsed firing time
//!
//! Nothing decrements ammo per shot. While the trigger is held, the shots
//! fired so far follow from when the burst started and the weapon's fire
//! delay, so the count can be answered at any instant without a tick.

/// Shots fired between `burst_start` and `now` with one shot per `fire_delay`
///
/// The first shot lands at the burst start itself. A burst start in the
/// future (cooldown carried over from the previous burst) counts as zero.
pub fn shots_fired(burst_start: f64, now: f64, fire_delay: f64) -> i64 {
    let elapsed = now - burst_start;
    let shots = (elapsed / fire_delay).ceil();
    if shots.is_finite() && shots > 0.0 {
        shots as i64
    } else {
        0
    }
}

/// Unclamped ammo left in a burst
///
/// Goes negative once the trigger has been held longer than the magazine
/// lasts; that overshoot is what shot validation compares to its tolerance.
pub fn burst_ammo(ammo_at_burst_start: u32, burst_start: f64, now: f64, fire_delay: f64) -> i64 {
    i64::from(ammo_at_burst_start) - shots_fired(burst_start, now, fire_delay)
}

/// Ammo as a client may see it
pub fn clamp_ammo(ammo: i64) -> u32 {
    u32::try_from(ammo.max(0)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_seconds_of_rifle_fire() {
        // 8 rounds, 0.6s apart: ceil(3.0 / 0.6) = 5 shots
        assert_eq!(shots_fired(10.0, 13.0, 0.6), 5);
        assert_eq!(burst_ammo(8, 10.0, 13.0, 0.6), 3);
    }

    #[test]
    fn first_shot_is_immediate_after_any_time() {
        assert_eq!(shots_fired(5.0, 5.0, 0.5), 0);
        assert_eq!(shots_fired(5.0, 5.001, 0.5), 1);
        assert_eq!(shots_fired(5.0, 5.5, 0.5), 1);
        assert_eq!(shots_fired(5.0, 5.501, 0.5), 2);
    }

    #[test]
    fn carried_cooldown_counts_as_no_shots() {
        assert_eq!(shots_fired(7.0, 6.2, 0.6), 0);
        assert_eq!(burst_ammo(4, 7.0, 6.2, 0.6), 4);
    }

    #[test]
    fn overshoot_goes_negative_but_clamps_to_zero() {
        let ammo = burst_ammo(2, 0.0, 10.0, 1.0);
        assert_eq!(ammo, -8);
        assert_eq!(clamp_ammo(ammo), 0);
        assert_eq!(clamp_ammo(7), 7);
    }

    #[test]
    fn ammo_never_rises_during_a_burst() {
        let mut previous = i64::MAX;
        for step in 0..400 {
            let now = 100.0 + f64::from(step) * 0.013;
            let ammo = burst_ammo(30, 100.0, now, 0.11);
            assert!(ammo <= previous);
            previous = ammo;
        }
    }
}
