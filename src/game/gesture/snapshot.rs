//! Per-tick gesture check values derived from a hand's kinematic sampler.

use nalgebra::{UnitQuaternion, Vector3};
use serde::Serialize;

use super::Hand;
use crate::game::constants::gesture as consts;
use crate::game::kinematics::{KinematicSampler, KinematicValues};

/// Kinematic quantities the condition trees compare against.
///
/// Linear and angular values are expressed in the hand's local frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GestureCheckSnapshot {
    pub velocity: Vector3<f32>,
    pub velocity_magnitude: f32,
    pub angular_velocity: Vector3<f32>,
    /// Angular velocity divided by linear speed
    pub scaled_angular_velocity: Vector3<f32>,
    pub spherical_velocity: f32,
    pub radial_velocity: f32,
    pub vertical_velocity: f32,
    pub spherical_dist: f32,
    pub radial_dist: f32,
    pub vertical_dist: f32,
    pub acceleration: Vector3<f32>,
    pub accel_magnitude: f32,
    pub angular_acceleration: Vector3<f32>,
    pub spherical_accel: f32,
    pub radial_accel: f32,
    pub vertical_accel: f32,
    /// Degrees between the velocity direction and each local axis
    pub motion_angle: Vector3<f32>,
    pub dist_between_hands: f32,
    pub interior_angle_to_other_hand: f32,
}

impl Default for GestureCheckSnapshot {
    fn default() -> Self {
        Self {
            velocity: Vector3::zeros(),
            velocity_magnitude: 0.0,
            angular_velocity: Vector3::zeros(),
            scaled_angular_velocity: Vector3::zeros(),
            spherical_velocity: 0.0,
            radial_velocity: 0.0,
            vertical_velocity: 0.0,
            spherical_dist: 0.0,
            radial_dist: 0.0,
            vertical_dist: 0.0,
            acceleration: Vector3::zeros(),
            accel_magnitude: 0.0,
            angular_acceleration: Vector3::zeros(),
            spherical_accel: 0.0,
            radial_accel: 0.0,
            vertical_accel: 0.0,
            motion_angle: Vector3::repeat(consts::STATIONARY_MOTION_ANGLE),
            dist_between_hands: 0.0,
            interior_angle_to_other_hand: 0.0,
        }
    }
}

/// Buffered and frame snapshots captured on the same tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SnapshotPair {
    pub buffered: GestureCheckSnapshot,
    pub frame: GestureCheckSnapshot,
}

impl SnapshotPair {
    /// Capture both snapshots for `hand`.
    ///
    /// `other_hand` is the other hand's world location; when absent the
    /// inter-hand values are zero. The frame snapshot reuses the inter-hand
    /// values of the buffered one.
    pub fn capture(
        sampler: &KinematicSampler,
        hand: Hand,
        other_hand: Option<Vector3<f32>>,
    ) -> Self {
        let rotation = sampler.rotation();
        let mut buffered = GestureCheckSnapshot::from_values(sampler.kinematic(), sampler, &rotation);
        let mut frame = GestureCheckSnapshot::from_values(sampler.frame(), sampler, &rotation);

        if let Some(other) = other_hand {
            let to_other = other - sampler.location();
            buffered.dist_between_hands = to_other.norm();
            let inward = rotation.transform_vector(&Vector3::new(0.0, hand.inward_sign(), 0.0));
            buffered.interior_angle_to_other_hand = angle_between_degrees(&inward, &safe_normal(&to_other));
        }

        frame.dist_between_hands = buffered.dist_between_hands;
        frame.interior_angle_to_other_hand = buffered.interior_angle_to_other_hand;

        Self { buffered, frame }
    }
}

impl GestureCheckSnapshot {
    fn from_values(
        values: &KinematicValues,
        sampler: &KinematicSampler,
        rotation: &UnitQuaternion<f32>,
    ) -> Self {
        let velocity = rotation.inverse_transform_vector(&values.velocity);
        let velocity_magnitude = velocity.norm();
        let angular_velocity = values.angular_velocity_fixed_local;
        let scaled_angular_velocity = if velocity_magnitude > 0.0 {
            angular_velocity / velocity_magnitude
        } else {
            Vector3::zeros()
        };
        let acceleration = rotation.inverse_transform_vector(&values.acceleration);

        Self {
            velocity,
            velocity_magnitude,
            angular_velocity,
            scaled_angular_velocity,
            spherical_velocity: values.spherical_velocity,
            radial_velocity: values.radial_velocity,
            vertical_velocity: values.vertical_velocity,
            spherical_dist: sampler.last_spherical_dist(),
            radial_dist: sampler.last_radial_dist(),
            vertical_dist: sampler.last_vertical_dist(),
            acceleration,
            accel_magnitude: acceleration.norm(),
            angular_acceleration: values.angular_accel_local,
            spherical_accel: values.spherical_accel,
            radial_accel: values.radial_accel,
            vertical_accel: values.vertical_accel,
            motion_angle: motion_angles(&velocity),
            dist_between_hands: 0.0,
            interior_angle_to_other_hand: 0.0,
        }
    }
}

/// Angle in degrees between a direction and each of the X, Y and Z axes.
pub fn motion_angles(velocity: &Vector3<f32>) -> Vector3<f32> {
    let dir = safe_normal(velocity);
    Vector3::new(
        angle_between_degrees(&Vector3::x(), &dir),
        angle_between_degrees(&Vector3::y(), &dir),
        angle_between_degrees(&Vector3::z(), &dir),
    )
}

fn safe_normal(v: &Vector3<f32>) -> Vector3<f32> {
    v.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros)
}

fn angle_between_degrees(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    a.dot(b).clamp(-1.0, 1.0).acos().to_degrees()
}
