//! Ballistic jump math shared by recovery jumps and aim prediction.
//!
//! Gravity acts along -Z. `gravity` arguments are magnitudes.

use nalgebra::Vector3;
use serde::Serialize;
use tracing::trace;

use super::NavQuery;
use crate::game::constants::nav::{MAX_JUMP_ARC, MIN_LAUNCH_DISTANCE, PATH_TRACE_FREQUENCY};

fn horizontal(v: &Vector3<f32>) -> f32 {
    (v.x * v.x + v.y * v.y).sqrt()
}

/// Launch velocity that carries a projectile from `start` to `end`.
///
/// `arc` blends the launch direction between straight up (0) and the direct
/// line to the target (1). Returns `None` when no launch speed reaches the
/// target along that direction, or the points coincide.
pub fn suggest_projectile_velocity(
    start: Vector3<f32>,
    end: Vector3<f32>,
    arc: f32,
    gravity: f32,
) -> Option<Vector3<f32>> {
    let to_end = end - start;
    let dist = to_end.norm();
    if dist <= MIN_LAUNCH_DISTANCE {
        return None;
    }

    let up = Vector3::z();
    let direction = up.lerp(&(to_end / dist), arc).try_normalize(f32::EPSILON)?;
    if horizontal(&direction) <= 1.0e-6 {
        return None;
    }
    let pitch = direction.z.clamp(-1.0, 1.0).asin();

    let dx = horizontal(&to_end);
    let dz = to_end.z;
    let gravity_z = -gravity.abs();

    let cos = pitch.cos();
    let denominator = (dz - dx * pitch.tan()) * cos * cos;
    let speed_sq = (gravity_z * dx * dx * 0.5) / denominator;
    if !speed_sq.is_finite() || speed_sq < 0.0 {
        return None;
    }

    Some(direction * speed_sq.sqrt())
}

/// Time spent rising and falling on a jump.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct JumpTimings {
    pub ascending: f32,
    pub descending: f32,
}

impl JumpTimings {
    pub fn total(&self) -> f32 {
        self.ascending + self.descending
    }
}

/// Split the horizontal flight time of a launch into ascent and descent.
pub fn jump_timings(
    launch_velocity: Vector3<f32>,
    start: Vector3<f32>,
    end: Vector3<f32>,
    gravity: f32,
) -> Option<JumpTimings> {
    let speed_xy = horizontal(&launch_velocity);
    if speed_xy <= 0.0 {
        return None;
    }
    let total = horizontal(&(end - start)) / speed_xy;

    if launch_velocity.z > 0.0 && gravity.abs() > 0.0 {
        let to_apex = launch_velocity.z / gravity.abs();
        if to_apex > total {
            Some(JumpTimings {
                ascending: total,
                descending: 0.0,
            })
        } else {
            Some(JumpTimings {
                ascending: to_apex,
                descending: total - to_apex,
            })
        }
    } else {
        Some(JumpTimings {
            ascending: 0.0,
            descending: total,
        })
    }
}

/// Position `t` seconds after launch.
pub fn position_at(start: Vector3<f32>, launch_velocity: Vector3<f32>, gravity: f32, t: f32) -> Vector3<f32> {
    start + launch_velocity * t - Vector3::z() * (0.5 * gravity.abs() * t * t)
}

/// Points along the flight, sampled at a fixed rate and always ending at `sim_time`.
pub fn predicted_path(
    start: Vector3<f32>,
    launch_velocity: Vector3<f32>,
    gravity: f32,
    sim_time: f32,
) -> Vec<Vector3<f32>> {
    let step = 1.0 / PATH_TRACE_FREQUENCY;
    let mut points = vec![start];
    let mut t = step;
    while t < sim_time {
        points.push(position_at(start, launch_velocity, gravity, t));
        t += step;
    }
    if sim_time > 0.0 {
        points.push(position_at(start, launch_velocity, gravity, sim_time));
    }
    points
}

/// A validated jump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JumpPlan {
    pub start: Vector3<f32>,
    pub destination: Vector3<f32>,
    pub arc: f32,
    pub launch_velocity: Vector3<f32>,
    pub time_to_target: f32,
    pub timings: JumpTimings,
}

/// Solve a jump from `start` to `destination` and check that the first
/// `trace_fraction` of its flight is unobstructed.
pub fn trace_jump<N: NavQuery + ?Sized>(
    nav: &N,
    start: Vector3<f32>,
    destination: Vector3<f32>,
    arc: f32,
    trace_fraction: f32,
) -> Option<JumpPlan> {
    let arc = arc.clamp(0.0, MAX_JUMP_ARC);
    let gravity = nav.gravity();

    let Some(launch_velocity) = nav.predict_projectile_arc(start, destination, arc) else {
        trace!(?start, ?destination, arc, "no launch velocity reaches destination");
        return None;
    };

    let speed_xy = horizontal(&launch_velocity);
    let time_to_target = if speed_xy > 0.0 {
        horizontal(&(destination - start)) / speed_xy
    } else {
        0.0
    };
    if time_to_target <= 0.0 {
        return None;
    }

    let sim_time = time_to_target * trace_fraction.clamp(0.0, 1.0);
    let path = predicted_path(start, launch_velocity, gravity, sim_time);
    for segment in path.windows(2) {
        if let Some(hit) = nav.trace_segment(segment[0], segment[1]) {
            trace!(?hit, arc, "jump path obstructed");
            return None;
        }
    }

    let timings = jump_timings(launch_velocity, start, destination, gravity)?;
    Some(JumpPlan {
        start,
        destination,
        arc,
        launch_velocity,
        time_to_target,
        timings,
    })
}
