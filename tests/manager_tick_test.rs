//! Character manager ticking players and agents together.
//!
//! Covers:
//! - a queued punch on the bundled gesture library producing gesture events
//! - a punch finishing its exit while no tracking frames arrive
//! - stun blocking gesture casting
//! - casting toggles reaching the shared event sink
//! - a stranded agent starting recovery after failing to path for four seconds
//! - spawning and removing characters
//! - gesture debug drawing through the manager's draw backend
//!
//! Run with: cargo test --test manager_tick_test

use std::sync::Arc;

use crossbeam_channel::Receiver;
use handcast::config::GameplayConfig;
use handcast::game::agent::{AgentCommand, AiCharacter};
use handcast::game::debug::{DebugConfig, DebugShape, RecordingDebugDraw};
use handcast::game::events::{EventSink, GameEvent};
use handcast::game::gesture::{ActivationState, CastingPose, GestureKind, Hand};
use handcast::game::kinematics::KinematicSample;
use handcast::game::nav::{NavRecoveryEvent, NavWorld};
use handcast::game::player::{HandFrame, PlayerInput};
use handcast::game::{CharacterManager, CharacterManagerHandle, CharacterManagerState};
use nalgebra::{UnitQuaternion, Vector3};
use uuid::Uuid;

/// 1/64 s ticks
const TICK_RATE: u64 = 64;

const THRUST_START: f64 = 0.25;
const THRUST_END: f64 = 0.75;
const THRUST_SPEED: f32 = 400.0;

fn manager(debug: DebugConfig) -> (CharacterManager, CharacterManagerHandle, Receiver<GameEvent>) {
    let (sink, events) = EventSink::channel();
    let (manager, state) = CharacterManager::new(TICK_RATE, CharacterManagerState::new(sink, debug));
    (manager, state, events)
}

/// Right hand thrusts forward along +X; the left hand rests 60 units away.
fn punch_frame(now: f64) -> HandFrame {
    let thrust = (now.clamp(THRUST_START, THRUST_END) - THRUST_START) as f32 * THRUST_SPEED;
    HandFrame {
        right: KinematicSample::new(Vector3::new(30.0 + thrust, -30.0, 0.0), UnitQuaternion::identity(), now),
        left: KinematicSample::new(Vector3::new(30.0, 30.0, 0.0), UnitQuaternion::identity(), now),
        body: None,
    }
}

/// Feed one punch frame per tick for `seconds`.
fn run_punch(manager: &mut CharacterManager, state: &CharacterManagerState, player: Uuid, seconds: f64) {
    let ticks = (seconds * TICK_RATE as f64) as u64;
    for _ in 0..ticks {
        let now = manager.time().now + 1.0 / TICK_RATE as f64;
        let handle = state.player(player).expect("player exists");
        handle.read().queue_input(PlayerInput::Frame(punch_frame(now)));
        manager.step();
    }
}

fn gesture_changes(events: &Receiver<GameEvent>) -> Vec<(Hand, GestureKind, GestureKind)> {
    events
        .try_iter()
        .filter_map(|event| match event {
            GameEvent::GestureChanged { hand, from, to, .. } => Some((hand, from, to)),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Players
// =============================================================================

#[test]
fn test_punch_recognized_and_released() {
    let config = GameplayConfig::default();
    let (mut manager, state, events) = manager(config.debug);
    let player = state.spawn_player(&config);

    run_punch(&mut manager, &state, player, 0.5);
    {
        let handle = state.player(player).expect("player exists");
        let player = handle.read();
        assert_eq!(player.gesture_kind(Hand::Right), GestureKind::Punch);
        assert_eq!(player.gesture_kind(Hand::Left), GestureKind::NoGesture);
        assert_eq!(player.pose(), CastingPose::NoPose);
    }

    run_punch(&mut manager, &state, player, 0.75);
    assert_eq!(
        gesture_changes(&events),
        vec![
            (Hand::Right, GestureKind::NoGesture, GestureKind::Punch),
            (Hand::Right, GestureKind::Punch, GestureKind::NoGesture),
        ]
    );

    // The punch exit is stamped for cooldowns
    let handle = state.player(player).expect("player exists");
    let exit = handle.read().ledger().hands.get(Hand::Right).punch;
    assert!(exit.is_some_and(|t| t > THRUST_END && t < 1.25), "punch exit at {exit:?}");
}

#[test]
fn test_punch_exits_while_tracking_is_lost() {
    let config = GameplayConfig::default();
    let (mut manager, state, events) = manager(config.debug);
    let player = state.spawn_player(&config);

    run_punch(&mut manager, &state, player, 0.75);
    let handle = state.player(player).expect("player exists");
    let punch_state = || {
        let player = handle.read();
        let gestures = player.hand(Hand::Right).gestures();
        gestures
            .slot_index(GestureKind::Punch)
            .and_then(|idx| gestures.slot(idx))
            .map(|slot| slot.state.activation_state)
    };
    assert_eq!(punch_state(), Some(ActivationState::Active));

    // The hand stops; feed frames until the punch starts to exit
    let mut ticks = 0;
    while punch_state() != Some(ActivationState::Deactivating) {
        assert!(ticks < TICK_RATE, "punch never started exiting");
        run_punch(&mut manager, &state, player, 1.0 / TICK_RATE as f64);
        ticks += 1;
    }

    // No more frames arrive; the exit grace still runs out
    manager.run_ticks(TICK_RATE / 2);
    assert_eq!(punch_state(), Some(ActivationState::Inactive));
    assert_eq!(handle.read().gesture_kind(Hand::Right), GestureKind::NoGesture);
    assert!(handle.read().ledger().hands.get(Hand::Right).punch.is_some());
    assert_eq!(
        gesture_changes(&events),
        vec![
            (Hand::Right, GestureKind::NoGesture, GestureKind::Punch),
            (Hand::Right, GestureKind::Punch, GestureKind::NoGesture),
        ]
    );
}

#[test]
fn test_stunned_player_cannot_punch() {
    let config = GameplayConfig::default();
    let (mut manager, state, events) = manager(config.debug);
    let player = state.spawn_player(&config);

    let handle = state.player(player).expect("player exists");
    handle.read().queue_input(PlayerInput::Stun { duration: 10.0 });
    run_punch(&mut manager, &state, player, 1.25);

    assert!(gesture_changes(&events).is_empty());
    assert!(handle.read().status().is_stunned(manager.time().now));
}

#[test]
fn test_casting_toggle_reaches_shared_sink() {
    let config = GameplayConfig::default();
    let (mut manager, state, events) = manager(config.debug);
    let first = state.spawn_player(&config);
    let second = state.spawn_player(&config);

    for id in [first, second] {
        let handle = state.player(id).expect("player exists");
        let player = handle.read();
        player.queue_input(PlayerInput::SetCastingEnabled(false));
        player.queue_input(PlayerInput::Frame(punch_frame(0.0)));
    }
    manager.step();

    let toggles: Vec<(Uuid, Hand)> = events
        .try_iter()
        .filter_map(|event| match event {
            GameEvent::CastingToggled {
                character,
                hand,
                enabled: false,
                ..
            } => Some((character, hand)),
            _ => None,
        })
        .collect();
    assert_eq!(toggles.len(), 4);
    for id in [first, second] {
        assert!(toggles.contains(&(id, Hand::Right)));
        assert!(toggles.contains(&(id, Hand::Left)));
    }
}

#[test]
fn test_gesture_debug_draw_uses_manager_backend() {
    let config = GameplayConfig::default();
    let draw = Arc::new(RecordingDebugDraw::default());
    let debug = DebugConfig {
        draw_gestures: true,
        ..DebugConfig::default()
    };
    let (sink, _events) = EventSink::channel();
    let (mut manager, state) = CharacterManager::new(
        TICK_RATE,
        CharacterManagerState::new(sink, debug).with_draw(draw.clone()),
    );
    let player = state.spawn_player(&config);

    run_punch(&mut manager, &state, player, 0.125);
    let shapes = draw.take();
    assert!(!shapes.is_empty());
    assert!(shapes.iter().any(|s| matches!(s, DebugShape::Sphere { .. })));
}

// =============================================================================
// Agents
// =============================================================================

#[test]
fn test_stranded_agent_starts_recovery_through_manager() {
    let config = GameplayConfig::default();
    let mut world = NavWorld::new();
    world.add_walkable(Vector3::new(0.0, 0.0, -50.0), Vector3::new(700.0, 700.0, 50.0), 0);
    world.add_walkable(Vector3::new(1000.0, 0.0, -50.0), Vector3::new(150.0, 150.0, 50.0), 1);

    let (sink, events) = EventSink::channel();
    // 1/8 s ticks keep the failure clock exact
    let (mut manager, state) = CharacterManager::new(8, CharacterManagerState::new(sink, config.debug));
    let agent = AiCharacter::new(Arc::new(world), config.nav, Vector3::new(1000.0, 0.0, 0.0), 7);
    agent.queue_command(AgentCommand::MoveTo { goal: [0.0, 0.0, 0.0] });
    let agent_id = state.spawn_agent(agent);

    // First failure at 0.125; four seconds of failures start recovery at 4.125.
    manager.run_ticks(32);
    assert!(!state.agent(agent_id).expect("agent exists").read().controller().is_recovering());
    manager.run_ticks(1);

    let started: Vec<GameEvent> = events
        .try_iter()
        .filter(|event| {
            matches!(
                event,
                GameEvent::NavRecovery {
                    recovery: NavRecoveryEvent::Started { .. },
                    ..
                }
            )
        })
        .collect();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].character(), agent_id);
    assert!(matches!(
        started[0],
        GameEvent::NavRecovery {
            time,
            recovery: NavRecoveryEvent::Started { on_valid_mesh: true, .. },
            ..
        } if time == 4.125
    ));

    let handle = state.agent(agent_id).expect("agent exists");
    let agent = handle.read();
    assert!(agent.controller().is_failing_from_valid_mesh());
    assert_eq!(agent.controller().state().failed_goal, Vector3::zeros());
}

#[test]
fn test_spawn_and_remove_characters() {
    let config = GameplayConfig::default();
    let (mut manager, state, _events) = manager(config.debug);
    let player = state.spawn_player(&config);
    let agent = state.spawn_agent(AiCharacter::new(
        Arc::new(NavWorld::new()),
        config.nav,
        Vector3::zeros(),
        1,
    ));
    assert_eq!(state.character_count(), 2);

    manager.run_ticks(4);
    assert!(state.remove_player(player));
    assert!(!state.remove_player(player));
    assert!(state.remove_agent(agent));
    assert_eq!(state.character_count(), 0);

    // Ticking an empty manager only advances time
    let time = manager.step();
    assert_eq!(time.now, 5.0 / TICK_RATE as f64);
}
