//! Hand-gesture recognition: snapshots, condition trees and the one-hand and
//! two-hand (pose) state machines.

pub mod condition;
pub mod cooldown;
pub mod definition;
pub mod one_hand;
pub mod pose;
pub mod snapshot;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

pub use condition::{CheckType, ComparisonOp, ConditionFailure, ConditionNode, VelocitySource};
pub use cooldown::{CooldownLedger, CooldownMatrix, HandExitTimes};
pub use definition::{OneHandGestureDefinition, TwoHandGestureDefinition};
pub use one_hand::{GestureTransition, OneHandGestureMachine, OneHandGestureSlot, OneHandTickInput};
pub use pose::{PoseHandInput, PoseStateMachine, PoseTickInput, PoseTransition};
pub use snapshot::{GestureCheckSnapshot, SnapshotPair};

/// Which hand a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub fn other(self) -> Hand {
        match self {
            Hand::Left => Hand::Right,
            Hand::Right => Hand::Left,
        }
    }

    /// Sign of the hand-local lateral axis pointing toward the body midline.
    pub fn inward_sign(self) -> f32 {
        match self {
            Hand::Left => 1.0,
            Hand::Right => -1.0,
        }
    }
}

/// A value kept once per hand.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HandPair<T> {
    pub left: T,
    pub right: T,
}

impl<T> HandPair<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn get(&self, hand: Hand) -> &T {
        match hand {
            Hand::Left => &self.left,
            Hand::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, hand: Hand) -> &mut T {
        match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }
}

/// Lifecycle of a gesture or pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    #[default]
    Inactive,
    Activating,
    Active,
    Deactivating,
}

/// Recognized gesture a hand is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    #[default]
    NoGesture,
    Punch,
    Slash,
    CannonStatic,
    CannonDynamic,
}

/// Two-handed pose the player is currently holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastingPose {
    #[default]
    NoPose,
    CannonStatic,
    CannonDynamic,
}

impl CastingPose {
    /// Gesture kind both hands report while the pose is held.
    pub fn gesture_kind(self) -> GestureKind {
        match self {
            CastingPose::NoPose => GestureKind::NoGesture,
            CastingPose::CannonStatic => GestureKind::CannonStatic,
            CastingPose::CannonDynamic => GestureKind::CannonDynamic,
        }
    }
}

/// Activation bookkeeping for one one-hand gesture on one hand.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GestureState {
    pub activation_state: ActivationState,
    /// Distance traveled since entry started
    pub gesture_distance: f32,
    pub last_entry_start_time: f64,
    pub last_exit_start_time: f64,
}

impl GestureState {
    /// Back to Inactive with no accumulated distance.
    pub fn reset(&mut self) {
        self.activation_state = ActivationState::Inactive;
        self.gesture_distance = 0.0;
    }
}

/// Activation bookkeeping for a two-hand gesture; distance is tracked per hand.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TwoHandGestureState {
    pub activation_state: ActivationState,
    pub gesture_distance_right: f32,
    pub gesture_distance_left: f32,
    pub last_entry_start_time: f64,
    pub last_exit_start_time: f64,
}

impl TwoHandGestureState {
    pub fn reset(&mut self) {
        self.activation_state = ActivationState::Inactive;
        self.gesture_distance_right = 0.0;
        self.gesture_distance_left = 0.0;
    }

    pub fn distance(&self, hand: Hand) -> f32 {
        match hand {
            Hand::Left => self.gesture_distance_left,
            Hand::Right => self.gesture_distance_right,
        }
    }

    pub fn add_distance(&mut self, right: f32, left: f32) {
        self.gesture_distance_right += right;
        self.gesture_distance_left += left;
    }

    /// Both hands have covered at least `min_distance`.
    pub fn both_covered(&self, min_distance: f32) -> bool {
        self.gesture_distance_right >= min_distance && self.gesture_distance_left >= min_distance
    }
}

/// Hand transform captured when a gesture starts entering or starts exiting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GestureTransformCache {
    pub last_entry_start_location: Vector3<f32>,
    pub last_entry_start_rotation: UnitQuaternion<f32>,
    pub last_entry_start_motion_angle: Vector3<f32>,
    pub last_entry_start_velocity: Vector3<f32>,
    pub last_exit_start_location: Vector3<f32>,
    pub last_exit_start_rotation: UnitQuaternion<f32>,
    pub last_exit_start_motion_angle: Vector3<f32>,
    pub last_exit_start_velocity: Vector3<f32>,
}

impl Default for GestureTransformCache {
    fn default() -> Self {
        Self {
            last_entry_start_location: Vector3::zeros(),
            last_entry_start_rotation: UnitQuaternion::identity(),
            last_entry_start_motion_angle: Vector3::zeros(),
            last_entry_start_velocity: Vector3::zeros(),
            last_exit_start_location: Vector3::zeros(),
            last_exit_start_rotation: UnitQuaternion::identity(),
            last_exit_start_motion_angle: Vector3::zeros(),
            last_exit_start_velocity: Vector3::zeros(),
        }
    }
}

impl GestureTransformCache {
    pub fn record_entry(&mut self, motion: &HandMotion) {
        self.last_entry_start_location = motion.location;
        self.last_entry_start_rotation = motion.rotation;
        self.last_entry_start_motion_angle = motion.motion_angle;
        self.last_entry_start_velocity = motion.velocity;
    }

    pub fn record_exit(&mut self, motion: &HandMotion) {
        self.last_exit_start_location = motion.location;
        self.last_exit_start_rotation = motion.rotation;
        self.last_exit_start_motion_angle = motion.motion_angle;
        self.last_exit_start_velocity = motion.velocity;
    }
}

/// Per-tick hand motion consumed by the state machines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandMotion {
    pub location: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    /// Buffered motion angle of this tick
    pub motion_angle: Vector3<f32>,
    /// Buffered world velocity
    pub velocity: Vector3<f32>,
    /// Distance moved since the previous tick
    pub delta_distance: f32,
}

impl Default for HandMotion {
    fn default() -> Self {
        Self {
            location: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            motion_angle: Vector3::zeros(),
            velocity: Vector3::zeros(),
            delta_distance: 0.0,
        }
    }
}
