//! Two-hand casting pose state machine.
//!
//! The static pose is entered when both hands satisfy their entry trees for
//! long enough and far enough. While static is held, the dynamic pose's entry
//! trees are checked every tick and may promote the pose directly. When the
//! dynamic pose decays, a still-valid static pose is resumed.

use tracing::{debug, trace};

use super::condition::ConditionFailure;
use super::definition::TwoHandGestureDefinition;
use super::snapshot::GestureCheckSnapshot;
use super::{
    ActivationState, CastingPose, GestureTransformCache, Hand, HandMotion, HandPair,
    TwoHandGestureState,
};

/// One hand's inputs for a pose tick.
#[derive(Debug, Clone, Copy)]
pub struct PoseHandInput<'a> {
    pub buffered: &'a GestureCheckSnapshot,
    pub frame: &'a GestureCheckSnapshot,
    pub motion: HandMotion,
}

pub struct PoseTickInput<'a> {
    pub now: f64,
    pub right: PoseHandInput<'a>,
    pub left: PoseHandInput<'a>,
    /// Casting is permitted and both hands are charged
    pub can_cast: bool,
    /// Cannon cooldowns have elapsed
    pub can_cannon: bool,
    /// A one-hand gesture is in progress on either hand
    pub hands_busy: bool,
}

impl<'a> PoseTickInput<'a> {
    fn hand(&self, hand: Hand) -> &PoseHandInput<'a> {
        match hand {
            Hand::Right => &self.right,
            Hand::Left => &self.left,
        }
    }

    fn add_distance(&self, state: &mut TwoHandGestureState) {
        state.add_distance(self.right.motion.delta_distance, self.left.motion.delta_distance);
    }
}

#[derive(Debug, Clone, Copy)]
enum Tree {
    Entry,
    Sustain,
}

/// Evaluate one of a pose's trees on both hands, right first.
fn evaluate_pose(
    def: &TwoHandGestureDefinition,
    tree: Tree,
    input: &PoseTickInput<'_>,
) -> Result<(), ConditionFailure> {
    for hand in [Hand::Right, Hand::Left] {
        let h = input.hand(hand);
        let node = match tree {
            Tree::Entry => def.entry(hand),
            Tree::Sustain => def.sustain(hand),
        };
        node.evaluate(h.buffered, h.frame)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoseTransition {
    pub from: CastingPose,
    pub to: CastingPose,
}

#[derive(Debug, Clone)]
pub struct PoseStateMachine {
    static_pose: TwoHandGestureDefinition,
    dynamic_pose: TwoHandGestureDefinition,
    static_state: TwoHandGestureState,
    dynamic_state: TwoHandGestureState,
    static_caches: HandPair<GestureTransformCache>,
    dynamic_caches: HandPair<GestureTransformCache>,
    pose: CastingPose,
    last_failure: String,
}

impl PoseStateMachine {
    pub fn new(static_pose: TwoHandGestureDefinition, dynamic_pose: TwoHandGestureDefinition) -> Self {
        Self {
            static_pose,
            dynamic_pose,
            static_state: TwoHandGestureState::default(),
            dynamic_state: TwoHandGestureState::default(),
            static_caches: HandPair::default(),
            dynamic_caches: HandPair::default(),
            pose: CastingPose::NoPose,
            last_failure: String::new(),
        }
    }

    pub fn pose(&self) -> CastingPose {
        self.pose
    }

    pub fn static_state(&self) -> &TwoHandGestureState {
        &self.static_state
    }

    pub fn dynamic_state(&self) -> &TwoHandGestureState {
        &self.dynamic_state
    }

    pub fn static_caches(&self) -> &HandPair<GestureTransformCache> {
        &self.static_caches
    }

    pub fn dynamic_caches(&self) -> &HandPair<GestureTransformCache> {
        &self.dynamic_caches
    }

    /// Most recent reason a pose tree failed, for diagnostics.
    pub fn last_failure(&self) -> &str {
        &self.last_failure
    }

    pub fn tick(&mut self, input: &PoseTickInput<'_>) -> Option<PoseTransition> {
        match self.pose {
            CastingPose::NoPose => {
                if input.hands_busy {
                    None
                } else {
                    self.attempt_enter_static(input)
                }
            }
            CastingPose::CannonStatic => self.tick_static(input),
            CastingPose::CannonDynamic => self.tick_dynamic(input),
        }
    }

    fn met(&mut self, pose: CastingPose, tree: Tree, input: &PoseTickInput<'_>) -> bool {
        let def = match pose {
            CastingPose::CannonDynamic => &self.dynamic_pose,
            _ => &self.static_pose,
        };
        match evaluate_pose(def, tree, input) {
            Ok(()) => true,
            Err(failure) => {
                trace!(?pose, ?tree, reason = %failure, "pose conditions not met");
                self.last_failure = failure.reason;
                false
            }
        }
    }

    fn attempt_enter_static(&mut self, input: &PoseTickInput<'_>) -> Option<PoseTransition> {
        if input.can_cast && input.can_cannon && self.met(CastingPose::CannonStatic, Tree::Entry, input) {
            if self.static_state.activation_state != ActivationState::Activating {
                self.reset_entry_state(CastingPose::CannonStatic);
                self.static_state.reset();
                self.static_state.last_entry_start_time = input.now;
                self.static_caches.right.record_entry(&input.right.motion);
                self.static_caches.left.record_entry(&input.left.motion);
                self.static_state.activation_state = ActivationState::Activating;
            }

            input.add_distance(&mut self.static_state);

            let elapsed = input.now - self.static_state.last_entry_start_time;
            if elapsed >= self.static_pose.min_entry_time as f64
                && self.static_state.both_covered(self.static_pose.min_entry_distance)
            {
                self.static_caches.right.record_exit(&input.right.motion);
                self.static_caches.left.record_exit(&input.left.motion);
                self.static_state.activation_state = ActivationState::Active;
                return self.set_pose(CastingPose::CannonStatic);
            }
            return None;
        }

        self.reset_entry_state(CastingPose::NoPose);
        None
    }

    fn tick_static(&mut self, input: &PoseTickInput<'_>) -> Option<PoseTransition> {
        if input.can_cast && input.can_cannon {
            if self.met(CastingPose::CannonDynamic, Tree::Entry, input) {
                if self.dynamic_state.activation_state != ActivationState::Activating {
                    self.dynamic_state.reset();
                    self.dynamic_state.activation_state = ActivationState::Activating;
                    self.dynamic_state.last_entry_start_time = input.now;
                    self.dynamic_caches.right.record_entry(&input.right.motion);
                    self.dynamic_caches.left.record_entry(&input.left.motion);
                }

                input.add_distance(&mut self.dynamic_state);

                let elapsed = input.now - self.dynamic_state.last_entry_start_time;
                if elapsed >= self.dynamic_pose.min_entry_time as f64
                    && self.dynamic_state.both_covered(self.dynamic_pose.min_entry_distance)
                {
                    self.dynamic_state.activation_state = ActivationState::Active;
                    return self.set_pose(CastingPose::CannonDynamic);
                }
                return None;
            }

            self.dynamic_state.reset();

            if self.met(CastingPose::CannonStatic, Tree::Sustain, input) {
                self.static_state.activation_state = ActivationState::Active;
                input.add_distance(&mut self.static_state);
                self.static_caches.right.record_exit(&input.right.motion);
                self.static_caches.left.record_exit(&input.left.motion);
                return None;
            }
        }

        if self.static_state.activation_state != ActivationState::Deactivating {
            self.static_state.activation_state = ActivationState::Deactivating;
            self.static_state.last_exit_start_time = input.now;
        }

        if input.now - self.static_state.last_exit_start_time >= self.static_pose.min_exit_time as f64 {
            self.static_state.reset();
            return self.set_pose(CastingPose::NoPose);
        }

        input.add_distance(&mut self.static_state);
        None
    }

    fn tick_dynamic(&mut self, input: &PoseTickInput<'_>) -> Option<PoseTransition> {
        let valid = input.can_cast && input.can_cannon;
        if valid && self.met(CastingPose::CannonDynamic, Tree::Sustain, input) {
            self.dynamic_state.activation_state = ActivationState::Active;
            input.add_distance(&mut self.dynamic_state);
            self.dynamic_caches.right.record_exit(&input.right.motion);
            self.dynamic_caches.left.record_exit(&input.left.motion);
            return None;
        }

        if self.dynamic_state.activation_state != ActivationState::Deactivating {
            self.dynamic_state.activation_state = ActivationState::Deactivating;
            self.dynamic_state.last_exit_start_time = input.now;
        }

        if input.now - self.dynamic_state.last_exit_start_time >= self.dynamic_pose.min_exit_time as f64 {
            self.dynamic_state.reset();

            if valid && self.met(CastingPose::CannonStatic, Tree::Sustain, input) {
                let transition = self.set_pose(CastingPose::CannonStatic);
                self.static_state.activation_state = ActivationState::Active;
                return transition;
            }
            return self.set_pose(CastingPose::NoPose);
        }

        input.add_distance(&mut self.dynamic_state);
        None
    }

    /// Reset the entry trackers of every pose other than `keep`.
    fn reset_entry_state(&mut self, keep: CastingPose) {
        if keep != CastingPose::CannonStatic {
            self.static_state.reset();
        }
        if keep != CastingPose::CannonDynamic {
            self.dynamic_state.reset();
        }
    }

    fn set_pose(&mut self, pose: CastingPose) -> Option<PoseTransition> {
        if pose == self.pose {
            return None;
        }
        let from = self.pose;
        self.pose = pose;
        self.reset_entry_state(pose);
        debug!(?from, to = ?pose, "casting pose changed");
        Some(PoseTransition { from, to: pose })
    }

    /// Drop the pose immediately (casting disabled).
    pub fn clear(&mut self) -> Option<PoseTransition> {
        self.reset_entry_state(CastingPose::NoPose);
        self.set_pose(CastingPose::NoPose)
    }
}

impl PoseTransition {
    /// Pose whose exit time should be stamped by this transition, if any.
    ///
    /// Promotion from static to dynamic is not an exit of the static pose.
    pub fn exited(&self) -> Option<CastingPose> {
        match (self.from, self.to) {
            (CastingPose::CannonStatic, CastingPose::CannonDynamic) => None,
            (CastingPose::NoPose, _) => None,
            (from, _) => Some(from),
        }
    }
}
