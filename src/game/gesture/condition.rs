//! Recursive gesture condition trees.
//!
//! A node passes when its own comparison passes, every strong sub-condition
//! passes, and (if any weak sub-conditions exist) at least one weak
//! sub-condition passes. Trees are authored for the right hand; [`ConditionNode::mirrored`]
//! derives the left-hand variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::snapshot::GestureCheckSnapshot;
use crate::game::constants::gesture as consts;

/// Snapshot quantity a condition compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    AutoSuccess,
    VelocityMagnitude,
    VelocityX,
    VelocityY,
    VelocityZ,
    AngularVelocityX,
    AngularVelocityY,
    AngularVelocityZ,
    ScaledAngularVelocityX,
    ScaledAngularVelocityY,
    ScaledAngularVelocityZ,
    SphericalVelocity,
    RadialVelocity,
    VerticalVelocity,
    SphericalDistance,
    RadialDistance,
    VerticalDistance,
    AccelerationMagnitude,
    AccelerationX,
    AccelerationY,
    AccelerationZ,
    AngularAccelerationX,
    AngularAccelerationY,
    AngularAccelerationZ,
    SphericalAcceleration,
    RadialAcceleration,
    VerticalAcceleration,
    MotionAngleX,
    MotionAngleY,
    MotionAngleZ,
    DistanceBetweenHands,
    InteriorAngleToOtherHand,
}

/// How a check type changes when a tree is mirrored to the other hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorRule {
    /// Not hand-relative
    Unchanged,
    /// Sign flips between hands
    Negate,
    /// Angle measured from the lateral axis; mirrors around 180 degrees
    Supplement,
}

impl CheckType {
    pub const ALL: [CheckType; 32] = [
        CheckType::AutoSuccess,
        CheckType::VelocityMagnitude,
        CheckType::VelocityX,
        CheckType::VelocityY,
        CheckType::VelocityZ,
        CheckType::AngularVelocityX,
        CheckType::AngularVelocityY,
        CheckType::AngularVelocityZ,
        CheckType::ScaledAngularVelocityX,
        CheckType::ScaledAngularVelocityY,
        CheckType::ScaledAngularVelocityZ,
        CheckType::SphericalVelocity,
        CheckType::RadialVelocity,
        CheckType::VerticalVelocity,
        CheckType::SphericalDistance,
        CheckType::RadialDistance,
        CheckType::VerticalDistance,
        CheckType::AccelerationMagnitude,
        CheckType::AccelerationX,
        CheckType::AccelerationY,
        CheckType::AccelerationZ,
        CheckType::AngularAccelerationX,
        CheckType::AngularAccelerationY,
        CheckType::AngularAccelerationZ,
        CheckType::SphericalAcceleration,
        CheckType::RadialAcceleration,
        CheckType::VerticalAcceleration,
        CheckType::MotionAngleX,
        CheckType::MotionAngleY,
        CheckType::MotionAngleZ,
        CheckType::DistanceBetweenHands,
        CheckType::InteriorAngleToOtherHand,
    ];

    /// Human-readable name used in failure reasons.
    pub fn label(self) -> &'static str {
        match self {
            CheckType::AutoSuccess => "Auto Success",
            CheckType::VelocityMagnitude => "Velocity Magnitude",
            CheckType::VelocityX => "Velocity X",
            CheckType::VelocityY => "Velocity Y",
            CheckType::VelocityZ => "Velocity Z",
            CheckType::AngularVelocityX => "Angular Velocity X",
            CheckType::AngularVelocityY => "Angular Velocity Y",
            CheckType::AngularVelocityZ => "Angular Velocity Z",
            CheckType::ScaledAngularVelocityX => "Scaled Angular Velocity X",
            CheckType::ScaledAngularVelocityY => "Scaled Angular Velocity Y",
            CheckType::ScaledAngularVelocityZ => "Scaled Angular Velocity Z",
            CheckType::SphericalVelocity => "Spherical Velocity",
            CheckType::RadialVelocity => "Radial Velocity",
            CheckType::VerticalVelocity => "Vertical Velocity",
            CheckType::SphericalDistance => "Spherical Distance",
            CheckType::RadialDistance => "Radial Distance",
            CheckType::VerticalDistance => "Vertical Distance",
            CheckType::AccelerationMagnitude => "Acceleration Magnitude",
            CheckType::AccelerationX => "Acceleration X",
            CheckType::AccelerationY => "Acceleration Y",
            CheckType::AccelerationZ => "Acceleration Z",
            CheckType::AngularAccelerationX => "Angular Acceleration X",
            CheckType::AngularAccelerationY => "Angular Acceleration Y",
            CheckType::AngularAccelerationZ => "Angular Acceleration Z",
            CheckType::SphericalAcceleration => "Spherical Acceleration",
            CheckType::RadialAcceleration => "Radial Acceleration",
            CheckType::VerticalAcceleration => "Vertical Acceleration",
            CheckType::MotionAngleX => "Motion Angle X",
            CheckType::MotionAngleY => "Motion Angle Y",
            CheckType::MotionAngleZ => "Motion Angle Z",
            CheckType::DistanceBetweenHands => "Distance Between Hands",
            CheckType::InteriorAngleToOtherHand => "Interior Angle to Other Hand",
        }
    }

    pub fn mirror_rule(self) -> MirrorRule {
        match self {
            CheckType::VelocityY
            | CheckType::AccelerationY
            | CheckType::AngularVelocityZ
            | CheckType::ScaledAngularVelocityZ
            | CheckType::AngularAccelerationZ => MirrorRule::Negate,
            CheckType::MotionAngleY => MirrorRule::Supplement,
            _ => MirrorRule::Unchanged,
        }
    }

    /// Read this quantity from a snapshot. `AutoSuccess` reads zero.
    pub fn read(self, s: &GestureCheckSnapshot) -> f32 {
        match self {
            CheckType::AutoSuccess => 0.0,
            CheckType::VelocityMagnitude => s.velocity_magnitude,
            CheckType::VelocityX => s.velocity.x,
            CheckType::VelocityY => s.velocity.y,
            CheckType::VelocityZ => s.velocity.z,
            CheckType::AngularVelocityX => s.angular_velocity.x,
            CheckType::AngularVelocityY => s.angular_velocity.y,
            CheckType::AngularVelocityZ => s.angular_velocity.z,
            CheckType::ScaledAngularVelocityX => s.scaled_angular_velocity.x,
            CheckType::ScaledAngularVelocityY => s.scaled_angular_velocity.y,
            CheckType::ScaledAngularVelocityZ => s.scaled_angular_velocity.z,
            CheckType::SphericalVelocity => s.spherical_velocity,
            CheckType::RadialVelocity => s.radial_velocity,
            CheckType::VerticalVelocity => s.vertical_velocity,
            CheckType::SphericalDistance => s.spherical_dist,
            CheckType::RadialDistance => s.radial_dist,
            CheckType::VerticalDistance => s.vertical_dist,
            CheckType::AccelerationMagnitude => s.accel_magnitude,
            CheckType::AccelerationX => s.acceleration.x,
            CheckType::AccelerationY => s.acceleration.y,
            CheckType::AccelerationZ => s.acceleration.z,
            CheckType::AngularAccelerationX => s.angular_acceleration.x,
            CheckType::AngularAccelerationY => s.angular_acceleration.y,
            CheckType::AngularAccelerationZ => s.angular_acceleration.z,
            CheckType::SphericalAcceleration => s.spherical_accel,
            CheckType::RadialAcceleration => s.radial_accel,
            CheckType::VerticalAcceleration => s.vertical_accel,
            CheckType::MotionAngleX => s.motion_angle.x,
            CheckType::MotionAngleY => s.motion_angle.y,
            CheckType::MotionAngleZ => s.motion_angle.z,
            CheckType::DistanceBetweenHands => s.dist_between_hands,
            CheckType::InteriorAngleToOtherHand => s.interior_angle_to_other_hand,
        }
    }
}

/// Which snapshot a condition reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocitySource {
    /// Averaged over the sample window
    #[default]
    Buffered,
    /// This tick only
    Frame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[default]
    #[serde(rename = ">", alias = "gt")]
    GreaterThan,
    #[serde(rename = ">=", alias = "ge")]
    GreaterThanEqual,
    #[serde(rename = "<", alias = "lt")]
    LessThan,
    #[serde(rename = "<=", alias = "le")]
    LessThanEqual,
    #[serde(rename = "==", alias = "eq")]
    Equal,
}

impl ComparisonOp {
    /// Compare `value` against `threshold`, returning the failure word on mismatch.
    pub fn apply(self, value: f32, threshold: f32) -> Result<(), &'static str> {
        match self {
            ComparisonOp::GreaterThan if value > threshold => Ok(()),
            ComparisonOp::GreaterThanEqual if value >= threshold => Ok(()),
            ComparisonOp::GreaterThan | ComparisonOp::GreaterThanEqual => Err("Too Low"),
            ComparisonOp::LessThan if value < threshold => Ok(()),
            ComparisonOp::LessThanEqual if value <= threshold => Ok(()),
            ComparisonOp::LessThan | ComparisonOp::LessThanEqual => Err("Too High"),
            ComparisonOp::Equal if nearly_equal(value, threshold) => Ok(()),
            ComparisonOp::Equal => Err("Not Equal"),
        }
    }

    /// Direction-flipped operator; `==` is unchanged.
    pub fn flipped(self) -> Self {
        match self {
            ComparisonOp::GreaterThan => ComparisonOp::LessThan,
            ComparisonOp::GreaterThanEqual => ComparisonOp::LessThanEqual,
            ComparisonOp::LessThan => ComparisonOp::GreaterThan,
            ComparisonOp::LessThanEqual => ComparisonOp::GreaterThanEqual,
            ComparisonOp::Equal => ComparisonOp::Equal,
        }
    }
}

fn nearly_equal(a: f32, b: f32) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= consts::EQUAL_TOLERANCE * scale
}

/// Why a condition tree did not pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ConditionFailure {
    pub reason: String,
}

impl ConditionFailure {
    fn new(reason: String) -> Self {
        Self { reason }
    }
}

/// One comparison plus its strong (AND) and weak (OR) sub-conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionNode {
    pub check: CheckType,
    #[serde(default)]
    pub source: VelocitySource,
    #[serde(default)]
    pub op: ComparisonOp,
    #[serde(default)]
    pub threshold: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strong: Vec<ConditionNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weak: Vec<ConditionNode>,
}

impl Default for ConditionNode {
    fn default() -> Self {
        Self::auto_success()
    }
}

impl ConditionNode {
    pub fn new(check: CheckType, op: ComparisonOp, threshold: f32) -> Self {
        Self {
            check,
            source: VelocitySource::Buffered,
            op,
            threshold,
            strong: Vec::new(),
            weak: Vec::new(),
        }
    }

    /// A node whose own comparison always passes.
    pub fn auto_success() -> Self {
        Self::new(CheckType::AutoSuccess, ComparisonOp::GreaterThan, 0.0)
    }

    /// Read from the frame snapshot instead of the buffered one.
    pub fn frame(mut self) -> Self {
        self.source = VelocitySource::Frame;
        self
    }

    pub fn with_strong(mut self, node: ConditionNode) -> Self {
        self.strong.push(node);
        self
    }

    pub fn with_weak(mut self, node: ConditionNode) -> Self {
        self.weak.push(node);
        self
    }

    /// Evaluate the whole tree.
    pub fn evaluate(
        &self,
        buffered: &GestureCheckSnapshot,
        frame: &GestureCheckSnapshot,
    ) -> Result<(), ConditionFailure> {
        self.evaluate_base(buffered, frame)?;

        for (idx, sub) in self.strong.iter().enumerate() {
            if let Err(failure) = sub.evaluate(buffered, frame) {
                return Err(ConditionFailure::new(format!(
                    "{} Strong Sub Condition {}",
                    failure.reason, idx
                )));
            }
        }

        if self.weak.is_empty() {
            return Ok(());
        }

        // Every failing reason carries its own leading space.
        let mut reason = String::new();
        for sub in &self.weak {
            match sub.evaluate(buffered, frame) {
                Ok(()) => return Ok(()),
                Err(failure) => {
                    reason.push(' ');
                    reason.push_str(&failure.reason);
                }
            }
        }
        reason.push_str(" Weak Sub Conditions");

        Err(ConditionFailure::new(reason))
    }

    pub fn is_met(&self, buffered: &GestureCheckSnapshot, frame: &GestureCheckSnapshot) -> bool {
        self.evaluate(buffered, frame).is_ok()
    }

    /// Evaluate only this node's own comparison.
    pub fn evaluate_base(
        &self,
        buffered: &GestureCheckSnapshot,
        frame: &GestureCheckSnapshot,
    ) -> Result<(), ConditionFailure> {
        if self.check == CheckType::AutoSuccess {
            return Ok(());
        }

        let snapshot = match self.source {
            VelocitySource::Buffered => buffered,
            VelocitySource::Frame => frame,
        };
        let value = self.check.read(snapshot);

        self.op
            .apply(value, self.threshold)
            .map_err(|word| ConditionFailure::new(format!("{} {}", word, self.check.label())))
    }

    /// The same tree authored for the opposite hand.
    pub fn mirrored(&self) -> ConditionNode {
        let (op, threshold) = match self.check.mirror_rule() {
            MirrorRule::Unchanged => (self.op, self.threshold),
            MirrorRule::Negate => (self.op.flipped(), -self.threshold),
            MirrorRule::Supplement => (self.op.flipped(), consts::MIRROR_ANGLE - self.threshold),
        };

        ConditionNode {
            check: self.check,
            source: self.source,
            op,
            threshold,
            strong: self.strong.iter().map(ConditionNode::mirrored).collect(),
            weak: self.weak.iter().map(ConditionNode::mirrored).collect(),
        }
    }

    /// Number of levels, counting this node.
    pub fn depth(&self) -> usize {
        1 + self
            .strong
            .iter()
            .chain(self.weak.iter())
            .map(ConditionNode::depth)
            .max()
            .unwrap_or(0)
    }

    /// Total nodes in the tree.
    pub fn node_count(&self) -> usize {
        1 + self
            .strong
            .iter()
            .chain(self.weak.iter())
            .map(ConditionNode::node_count)
            .sum::<usize>()
    }
}
