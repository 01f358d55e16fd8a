//! Navigation recovery: detecting an agent that can no longer path and
//! driving it back onto the navigable mesh.

pub mod navmesh;
pub mod projectile;
pub mod recovery;
pub mod search;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

pub use navmesh::NavWorld;
pub use projectile::{suggest_projectile_velocity, JumpPlan, JumpTimings};
pub use recovery::{
    IgnoredReason, NavRecoveryAbility, NavRecoveryConfig, NavRecoveryController, NavRecoveryEvent, NavRecoverySettings,
    NavRecoveryState, PathFailureOutcome, RecoveryFailedResponse, RecoveryHooks, RecoveryTickOutcome,
};

/// Minimum gap kept between the inner and outer search radius.
pub const MIN_SEARCH_RING_WIDTH: f32 = 100.0;

/// Queries the host's navigation data.
pub trait NavQuery {
    fn project_point_to_navmesh(&self, point: Vector3<f32>, extent: Vector3<f32>) -> Option<Vector3<f32>>;

    fn path_exists(&self, from: Vector3<f32>, to: Vector3<f32>) -> bool;

    /// First blocking point along the segment, if any.
    fn trace_segment(&self, from: Vector3<f32>, to: Vector3<f32>) -> Option<Vector3<f32>>;

    /// Gravity magnitude along -Z.
    fn gravity(&self) -> f32 {
        crate::game::constants::nav::DEFAULT_GRAVITY
    }

    fn predict_projectile_arc(
        &self,
        origin: Vector3<f32>,
        destination: Vector3<f32>,
        arc: f32,
    ) -> Option<Vector3<f32>> {
        suggest_projectile_velocity(origin, destination, arc, self.gravity())
    }
}

/// Blackboard shared with the agent's decision logic. The recovery
/// controller writes to it and reads from it but does not own it.
pub trait RecoveryBlackboard {
    fn recovery_destination(&self) -> Option<Vector3<f32>>;
    fn set_recovery_destination(&mut self, destination: Vector3<f32>);
    fn clear_recovery_destination(&mut self);
    /// `(inner, outer)`
    fn search_radii(&self) -> (f32, f32);
    fn set_search_radii(&mut self, inner: f32, outer: f32);
    fn goal_location(&self) -> Option<Vector3<f32>>;
    fn set_goal_location(&mut self, goal: Vector3<f32>);
}

/// In-memory blackboard. A zero destination is the same as no destination.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AiBlackboard {
    recovery_destination: Vector3<f32>,
    search_inner_radius: f32,
    search_outer_radius: f32,
    goal_location: Option<Vector3<f32>>,
}

impl AiBlackboard {
    pub fn clear_goal_location(&mut self) {
        self.goal_location = None;
    }
}

impl RecoveryBlackboard for AiBlackboard {
    fn recovery_destination(&self) -> Option<Vector3<f32>> {
        if self.recovery_destination == Vector3::zeros() {
            None
        } else {
            Some(self.recovery_destination)
        }
    }

    fn set_recovery_destination(&mut self, destination: Vector3<f32>) {
        self.recovery_destination = destination;
    }

    fn clear_recovery_destination(&mut self) {
        self.recovery_destination = Vector3::zeros();
    }

    fn search_radii(&self) -> (f32, f32) {
        (self.search_inner_radius, self.search_outer_radius)
    }

    fn set_search_radii(&mut self, inner: f32, outer: f32) {
        let inner = inner.max(0.0);
        self.search_inner_radius = inner;
        self.search_outer_radius = outer.max(inner + MIN_SEARCH_RING_WIDTH);
    }

    fn goal_location(&self) -> Option<Vector3<f32>> {
        self.goal_location
    }

    fn set_goal_location(&mut self, goal: Vector3<f32>) {
        self.goal_location = Some(goal);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementMode {
    None,
    #[default]
    Walking,
    NavWalking,
    Falling,
    Swimming,
    Flying,
}

/// What the controller needs to know about the pawn this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PawnStatus {
    pub location: Vector3<f32>,
    /// Location paths are requested from (the feet)
    pub pathing_location: Vector3<f32>,
    pub movement_mode: MovementMode,
    pub default_land_mode: MovementMode,
    pub dead: bool,
    pub ragdolling: bool,
}

impl PawnStatus {
    pub fn standing(location: Vector3<f32>, pathing_location: Vector3<f32>) -> Self {
        Self {
            location,
            pathing_location,
            movement_mode: MovementMode::Walking,
            default_land_mode: MovementMode::Walking,
            dead: false,
            ragdolling: false,
        }
    }

    pub fn is_expected_ground_mode(&self) -> bool {
        self.movement_mode == self.default_land_mode && self.movement_mode != MovementMode::Falling
    }

    /// Path requests are expected to succeed only while upright, alive and grounded.
    pub fn expects_successful_path(&self) -> bool {
        !self.ragdolling && !self.dead && self.is_expected_ground_mode()
    }
}
