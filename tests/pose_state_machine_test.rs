//! Two-hand casting pose state machine.
//!
//! Covers:
//! - static entry timing and the per-hand distance requirement
//! - busy hands, casting permission and cannon cooldown blocking entry
//! - promotion from static to dynamic
//! - dynamic decay resuming a still-valid static pose, or dropping to no pose
//! - static exit grace
//! - which transitions stamp a pose exit
//!
//! Run with: cargo test --test pose_state_machine_test

use handcast::game::gesture::{
    ActivationState, CastingPose, CheckType, ComparisonOp, ConditionNode, GestureCheckSnapshot, Hand, HandMotion,
    PoseHandInput, PoseStateMachine, PoseTickInput, PoseTransition, TwoHandGestureDefinition,
};
use nalgebra::Vector3;

const DT: f64 = 0.125;

/// Hands close together (< 40) to enter, within 60 to hold.
fn static_pose(min_distance: f32) -> TwoHandGestureDefinition {
    TwoHandGestureDefinition::new(
        "cannon_static",
        ConditionNode::new(CheckType::DistanceBetweenHands, ComparisonOp::LessThan, 40.0),
        ConditionNode::new(CheckType::DistanceBetweenHands, ComparisonOp::LessThan, 60.0),
    )
    .with_thresholds(0.25, min_distance, 0.25)
}

/// Both hands thrust forward.
fn dynamic_pose() -> TwoHandGestureDefinition {
    TwoHandGestureDefinition::new(
        "cannon_dynamic",
        ConditionNode::new(CheckType::VelocityX, ComparisonOp::GreaterThan, 200.0),
        ConditionNode::new(CheckType::VelocityX, ComparisonOp::GreaterThan, 50.0),
    )
    .with_thresholds(0.0, 0.0, 0.25)
}

#[derive(Clone, Copy)]
struct Hands {
    gap: f32,
    vx: f32,
    right_moved: f32,
    left_moved: f32,
}

impl Hands {
    fn holding() -> Self {
        Self {
            gap: 30.0,
            vx: 0.0,
            right_moved: 0.0,
            left_moved: 0.0,
        }
    }

    fn apart() -> Self {
        Self {
            gap: 100.0,
            ..Self::holding()
        }
    }

    fn thrusting() -> Self {
        Self {
            vx: 250.0,
            right_moved: 30.0,
            left_moved: 30.0,
            ..Self::holding()
        }
    }
}

struct Gates {
    can_cast: bool,
    can_cannon: bool,
    hands_busy: bool,
}

const OPEN: Gates = Gates {
    can_cast: true,
    can_cannon: true,
    hands_busy: false,
};

struct Driver {
    machine: PoseStateMachine,
    now: f64,
}

impl Driver {
    fn new(min_distance: f32) -> Self {
        Self {
            machine: PoseStateMachine::new(static_pose(min_distance), dynamic_pose()),
            now: 0.0,
        }
    }

    fn step_gated(&mut self, hands: Hands, gates: &Gates) -> Option<PoseTransition> {
        let snapshot = GestureCheckSnapshot {
            velocity: Vector3::new(hands.vx, 0.0, 0.0),
            velocity_magnitude: hands.vx.abs(),
            dist_between_hands: hands.gap,
            ..GestureCheckSnapshot::default()
        };
        let motion = |moved: f32| HandMotion {
            delta_distance: moved,
            ..HandMotion::default()
        };
        let input = PoseTickInput {
            now: self.now,
            right: PoseHandInput {
                buffered: &snapshot,
                frame: &snapshot,
                motion: motion(hands.right_moved),
            },
            left: PoseHandInput {
                buffered: &snapshot,
                frame: &snapshot,
                motion: motion(hands.left_moved),
            },
            can_cast: gates.can_cast,
            can_cannon: gates.can_cannon,
            hands_busy: gates.hands_busy,
        };
        let transition = self.machine.tick(&input);
        self.now += DT;
        transition
    }

    fn step(&mut self, hands: Hands) -> Option<PoseTransition> {
        self.step_gated(hands, &OPEN)
    }

    /// Hold still until the static pose is entered.
    fn enter_static(&mut self) {
        for _ in 0..3 {
            self.step(Hands::holding());
        }
        assert_eq!(self.machine.pose(), CastingPose::CannonStatic);
    }
}

fn transition(from: CastingPose, to: CastingPose) -> Option<PoseTransition> {
    Some(PoseTransition { from, to })
}

// =============================================================================
// Static entry
// =============================================================================

#[test]
fn test_static_enters_after_min_entry_time() {
    let mut driver = Driver::new(0.0);
    assert_eq!(driver.step(Hands::holding()), None); // t = 0.0
    assert_eq!(driver.machine.static_state().activation_state, ActivationState::Activating);
    assert_eq!(driver.step(Hands::holding()), None); // t = 0.125
    assert_eq!(
        driver.step(Hands::holding()), // t = 0.25
        transition(CastingPose::NoPose, CastingPose::CannonStatic)
    );
    assert_eq!(driver.machine.static_state().activation_state, ActivationState::Active);
}

#[test]
fn test_static_needs_distance_on_both_hands() {
    let mut driver = Driver::new(5.0);
    let right_only = Hands {
        right_moved: 10.0,
        ..Hands::holding()
    };
    for _ in 0..6 {
        assert_eq!(driver.step(right_only), None);
    }
    assert_eq!(driver.machine.static_state().distance(Hand::Right), 60.0);

    let both = Hands {
        right_moved: 10.0,
        left_moved: 10.0,
        ..Hands::holding()
    };
    assert_eq!(driver.step(both), transition(CastingPose::NoPose, CastingPose::CannonStatic));
}

#[test]
fn test_gates_block_static_entry() {
    for gates in [
        Gates { hands_busy: true, ..OPEN },
        Gates { can_cast: false, ..OPEN },
        Gates { can_cannon: false, ..OPEN },
    ] {
        let mut driver = Driver::new(0.0);
        for _ in 0..6 {
            assert_eq!(driver.step_gated(Hands::holding(), &gates), None);
        }
        assert_eq!(driver.machine.pose(), CastingPose::NoPose);
        assert_eq!(driver.machine.static_state().activation_state, ActivationState::Inactive);
    }
}

#[test]
fn test_failed_entry_resets_tracking() {
    let mut driver = Driver::new(0.0);
    driver.step(Hands::holding());
    driver.step(Hands::holding());
    driver.step(Hands::apart());
    assert_eq!(driver.machine.static_state().activation_state, ActivationState::Inactive);

    // Timing restarts from the next successful tick
    assert_eq!(driver.step(Hands::holding()), None);
    assert_eq!(driver.step(Hands::holding()), None);
    assert!(driver.step(Hands::holding()).is_some());
}

// =============================================================================
// Static <-> dynamic
// =============================================================================

#[test]
fn test_static_promotes_to_dynamic() {
    let mut driver = Driver::new(0.0);
    driver.enter_static();

    let promoted = driver.step(Hands::thrusting());
    assert_eq!(promoted, transition(CastingPose::CannonStatic, CastingPose::CannonDynamic));
    assert_eq!(promoted.and_then(|t| t.exited()), None);
    assert_eq!(driver.machine.static_state().activation_state, ActivationState::Inactive);
    assert_eq!(driver.machine.dynamic_state().activation_state, ActivationState::Active);
}

#[test]
fn test_dynamic_decays_back_to_static() {
    let mut driver = Driver::new(0.0);
    driver.enter_static();
    driver.step(Hands::thrusting());

    assert_eq!(driver.step(Hands::holding()), None); // exit starts
    assert_eq!(driver.machine.dynamic_state().activation_state, ActivationState::Deactivating);
    assert_eq!(driver.step(Hands::holding()), None); // 0.125 into the grace period
    let decayed = driver.step(Hands::holding()); // 0.25
    assert_eq!(decayed, transition(CastingPose::CannonDynamic, CastingPose::CannonStatic));
    assert_eq!(decayed.and_then(|t| t.exited()), Some(CastingPose::CannonDynamic));
    assert_eq!(driver.machine.static_state().activation_state, ActivationState::Active);
}

#[test]
fn test_dynamic_decays_to_no_pose_when_static_invalid() {
    let mut driver = Driver::new(0.0);
    driver.enter_static();
    driver.step(Hands::thrusting());

    driver.step(Hands::apart());
    driver.step(Hands::apart());
    assert_eq!(
        driver.step(Hands::apart()),
        transition(CastingPose::CannonDynamic, CastingPose::NoPose)
    );
}

#[test]
fn test_dynamic_sustains_while_thrusting() {
    let mut driver = Driver::new(0.0);
    driver.enter_static();
    driver.step(Hands::thrusting());
    let slower = Hands {
        vx: 80.0,
        ..Hands::thrusting()
    };
    for _ in 0..8 {
        assert_eq!(driver.step(slower), None);
    }
    assert_eq!(driver.machine.pose(), CastingPose::CannonDynamic);
    assert_eq!(driver.machine.dynamic_state().distance(Hand::Left), 270.0);
}

// =============================================================================
// Static exit
// =============================================================================

#[test]
fn test_static_exit_grace_then_exit() {
    let mut driver = Driver::new(0.0);
    driver.enter_static();

    assert_eq!(driver.step(Hands::apart()), None);
    assert_eq!(driver.machine.static_state().activation_state, ActivationState::Deactivating);
    assert_eq!(driver.step(Hands::holding()), None);
    assert_eq!(driver.machine.static_state().activation_state, ActivationState::Active);

    driver.step(Hands::apart());
    driver.step(Hands::apart());
    let exited = driver.step(Hands::apart());
    assert_eq!(exited, transition(CastingPose::CannonStatic, CastingPose::NoPose));
    assert_eq!(exited.and_then(|t| t.exited()), Some(CastingPose::CannonStatic));
}

#[test]
fn test_losing_cannon_cooldown_drops_static() {
    let mut driver = Driver::new(0.0);
    driver.enter_static();
    let blocked = Gates { can_cannon: false, ..OPEN };
    driver.step_gated(Hands::holding(), &blocked);
    driver.step_gated(Hands::holding(), &blocked);
    assert_eq!(
        driver.step_gated(Hands::holding(), &blocked),
        transition(CastingPose::CannonStatic, CastingPose::NoPose)
    );
}

#[test]
fn test_clear_returns_to_no_pose() {
    let mut driver = Driver::new(0.0);
    driver.enter_static();
    assert_eq!(
        driver.machine.clear(),
        transition(CastingPose::CannonStatic, CastingPose::NoPose)
    );
    assert_eq!(driver.machine.clear(), None);
}
