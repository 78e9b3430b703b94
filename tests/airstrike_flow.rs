use std::time::Duration;

use glam::Vec3;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use voxel_fire_control::airstrike::{
    AirstrikeEvent, AirstrikeSettings, AirstrikeState, KillCause, LaunchRefused, TeamCooldown,
};

fn state_with(events: mpsc::UnboundedSender<AirstrikeEvent>, seed: u64) -> AirstrikeState {
    AirstrikeState::new(AirstrikeSettings::default(), events, seed)
        .expect("default settings are valid")
}

fn earn(state: &mut AirstrikeState) {
    for _ in 0..6 {
        assert!(!state.on_kill(KillCause::Weapon, false));
    }
    assert!(!state.on_kill(KillCause::Melee, false));
    assert!(state.on_kill(KillCause::Grenade, false));
}

#[tokio::test(start_paused = true)]
async fn launched_strike_drops_every_grenade_on_schedule() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut state = state_with(tx, 42);
    let mut cooldown = TeamCooldown::new(25.0);
    earn(&mut state);

    let started = Instant::now();
    let count = state
        .launch(Vec3::new(256.0, 256.0, 20.0), 0, &mut cooldown, 0.0)
        .expect("strike held and team ready");
    assert_eq!(count, 50);
    assert!(!state.streak().is_ready());

    let mut landed = Vec::new();
    while landed.len() < count {
        match rx.recv().await {
            Some(AirstrikeEvent::Drop(drop)) => landed.push((started.elapsed(), drop)),
            Some(AirstrikeEvent::ReadyReminder) => panic!("no strike is held"),
            None => break,
        }
    }

    assert_eq!(landed.len(), 50);
    let (first_at, _) = landed[0];
    assert!(first_at >= Duration::from_millis(1200) && first_at < Duration::from_millis(1250));
    assert!(landed.windows(2).all(|pair| pair[0].0 <= pair[1].0));
    assert!(landed.iter().all(|(elapsed, drop)| *elapsed >= drop.delay));
    assert_eq!(state.pending_drops(), 0);
}

#[tokio::test(start_paused = true)]
async fn ending_the_strike_cancels_remaining_drops() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut state = state_with(tx, 9);
    let mut cooldown = TeamCooldown::new(25.0);
    earn(&mut state);
    state.launch(Vec3::new(100.0, 100.0, 0.0), 1, &mut cooldown, 0.0).unwrap();

    // first wave lands between 1.2 s and 1.64 s
    sleep(Duration::from_millis(1700)).await;
    let mut landed = 0;
    while let Ok(AirstrikeEvent::Drop(_)) = rx.try_recv() {
        landed += 1;
    }
    assert_eq!(landed, 5);
    assert_eq!(state.pending_drops(), 45);

    state.end_strike();
    sleep(Duration::from_secs(15)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(state.pending_drops(), 0);
}

#[tokio::test(start_paused = true)]
async fn team_cooldown_blocks_a_second_launch() {
    let (tx_a, _rx_a) = mpsc::unbounded_channel();
    let (tx_b, _rx_b) = mpsc::unbounded_channel();
    let mut alice = state_with(tx_a, 1);
    let mut bob = state_with(tx_b, 2);
    let mut team = TeamCooldown::new(25.0);
    earn(&mut alice);
    earn(&mut bob);

    alice.launch(Vec3::new(50.0, 50.0, 0.0), 0, &mut team, 100.0).unwrap();
    let refused = bob.launch(Vec3::new(60.0, 60.0, 0.0), 0, &mut team, 103.5);
    assert_eq!(refused, Err(LaunchRefused::Cooldown { seconds: 22 }));
    assert!(bob.streak().is_ready());

    assert!(bob.launch(Vec3::new(60.0, 60.0, 0.0), 0, &mut team, 125.0).is_ok());
}

#[tokio::test(start_paused = true)]
async fn launching_without_a_strike_is_refused() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut state = state_with(tx, 5);
    let mut team = TeamCooldown::new(25.0);
    state.on_kill(KillCause::Weapon, false);
    state.on_kill(KillCause::Weapon, false);

    let refused = state.launch(Vec3::ZERO, 0, &mut team, 0.0);
    assert_eq!(refused, Err(LaunchRefused::NotReady { remaining: 6 }));
}

#[tokio::test(start_paused = true)]
async fn held_strike_is_announced_after_spawning() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut state = state_with(tx, 3);
    earn(&mut state);

    state.on_death();
    assert!(state.streak().is_ready());
    state.on_spawn();

    sleep(Duration::from_secs(3)).await;
    assert!(rx.try_recv().is_err());
    sleep(Duration::from_secs(2)).await;
    assert_eq!(rx.try_recv(), Ok(AirstrikeEvent::ReadyReminder));

    // dying before the reminder silences it
    state.on_spawn();
    state.on_death();
    sleep(Duration::from_secs(10)).await;
    assert!(rx.try_recv().is_err());
}
