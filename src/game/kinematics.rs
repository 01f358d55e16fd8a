//! Windowed velocity estimation for kinematically driven objects.
//!
//! Tracked hands follow their input device 1:1 and carry no physical velocity,
//! so velocity, acceleration and angular velocity are reconstructed from the
//! transform history. Each tick yields a single-frame estimate and a buffered
//! estimate averaged over a trailing time window.

use nalgebra::{UnitQuaternion, Vector3};
use std::collections::VecDeque;

use super::constants::kinematics as consts;

/// Raw transform sample for one tick.
#[derive(Debug, Clone, Copy)]
pub struct KinematicSample {
    /// World position of the tracked object
    pub position: Vector3<f32>,
    /// World orientation of the tracked object
    pub orientation: UnitQuaternion<f32>,
    /// Timestamp in seconds
    pub timestamp: f64,
}

impl KinematicSample {
    pub fn new(position: Vector3<f32>, orientation: UnitQuaternion<f32>, timestamp: f64) -> Self {
        Self {
            position,
            orientation,
            timestamp,
        }
    }
}

/// Reference body used for the spherical/radial/vertical decomposition.
#[derive(Debug, Clone, Copy)]
pub struct BodyReference {
    /// Body center the hand distances are measured from
    pub center: Vector3<f32>,
    /// Tracking-space origin; linear velocity is measured relative to it so
    /// locomotion of the body does not register as hand motion
    pub tracking_origin: Vector3<f32>,
}

/// One frame's worth of kinematic values, kept in the averaging window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityHistoryEntry {
    pub linear_velocity: Vector3<f32>,
    pub angular_velocity: Vector3<f32>,
    pub acceleration: Vector3<f32>,
    pub spherical_velocity: f32,
    pub radial_velocity: f32,
    pub vertical_velocity: f32,
    pub spherical_accel: f32,
    pub radial_accel: f32,
    pub vertical_accel: f32,
    pub timestamp: f64,
}

/// Velocity-derived quantities, either for one frame or averaged over the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicValues {
    pub velocity: Vector3<f32>,
    /// World angular velocity in degrees/second, renderer convention
    pub angular_velocity: Vector3<f32>,
    pub acceleration: Vector3<f32>,
    pub spherical_velocity: f32,
    pub radial_velocity: f32,
    pub vertical_velocity: f32,
    pub spherical_accel: f32,
    pub radial_accel: f32,
    pub vertical_accel: f32,
    /// World angular velocity with the Z axis flipped
    pub angular_velocity_fixed_world: Vector3<f32>,
    /// Local-frame angular velocity with the Z axis flipped after the transform
    pub angular_velocity_fixed_local: Vector3<f32>,
    pub angular_accel_world: Vector3<f32>,
    pub angular_accel_local: Vector3<f32>,
}

impl Default for KinematicValues {
    fn default() -> Self {
        Self {
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            spherical_velocity: 0.0,
            radial_velocity: 0.0,
            vertical_velocity: 0.0,
            spherical_accel: 0.0,
            radial_accel: 0.0,
            vertical_accel: 0.0,
            angular_velocity_fixed_world: Vector3::zeros(),
            angular_velocity_fixed_local: Vector3::zeros(),
            angular_accel_world: Vector3::zeros(),
            angular_accel_local: Vector3::zeros(),
        }
    }
}

impl KinematicValues {
    fn from_entry(entry: &VelocityHistoryEntry) -> Self {
        Self {
            velocity: entry.linear_velocity,
            angular_velocity: entry.angular_velocity,
            acceleration: entry.acceleration,
            spherical_velocity: entry.spherical_velocity,
            radial_velocity: entry.radial_velocity,
            vertical_velocity: entry.vertical_velocity,
            spherical_accel: entry.spherical_accel,
            radial_accel: entry.radial_accel,
            vertical_accel: entry.vertical_accel,
            ..Self::default()
        }
    }

    /// Derive the Z-flipped angular velocities and their rates of change.
    fn fix_angular(&mut self, previous: &KinematicValues, rotation: &UnitQuaternion<f32>, dt: f32) {
        let mut world = self.angular_velocity;
        world.z = -world.z;
        let mut local = rotation.inverse_transform_vector(&self.angular_velocity);
        local.z = -local.z;

        self.angular_velocity_fixed_world = world;
        self.angular_velocity_fixed_local = local;
        self.angular_accel_world = (world - previous.angular_velocity_fixed_world) / dt;
        self.angular_accel_local = (local - previous.angular_velocity_fixed_local) / dt;
    }
}

/// Per-object velocity estimator.
#[derive(Debug, Clone)]
pub struct KinematicSampler {
    sample_window: f32,
    active: bool,
    location: Vector3<f32>,
    rotation: UnitQuaternion<f32>,
    last_location: Vector3<f32>,
    last_rotation: UnitQuaternion<f32>,
    delta_location: Vector3<f32>,
    last_spherical_dist: f32,
    last_radial_dist: f32,
    last_vertical_dist: f32,
    frame: KinematicValues,
    kinematic: KinematicValues,
    history: VecDeque<VelocityHistoryEntry>,
}

impl Default for KinematicSampler {
    fn default() -> Self {
        Self::new(consts::DEFAULT_SAMPLE_WINDOW)
    }
}

impl KinematicSampler {
    /// Create an inactive sampler averaging over `sample_window` seconds.
    pub fn new(sample_window: f32) -> Self {
        Self {
            sample_window,
            active: false,
            location: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            last_location: Vector3::zeros(),
            last_rotation: UnitQuaternion::identity(),
            delta_location: Vector3::zeros(),
            last_spherical_dist: 0.0,
            last_radial_dist: 0.0,
            last_vertical_dist: 0.0,
            frame: KinematicValues::default(),
            kinematic: KinematicValues::default(),
            history: VecDeque::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn sample_window(&self) -> f32 {
        self.sample_window
    }

    pub fn set_sample_window(&mut self, sample_window: f32) {
        self.sample_window = sample_window;
    }

    /// Start sampling from the given transform.
    ///
    /// The history is kept; only the last transform is re-seeded so the first
    /// tick after activation reports no motion.
    pub fn activate(&mut self, sample: &KinematicSample, body: Option<&BodyReference>) {
        self.active = true;
        self.location = sample.position;
        self.rotation = sample.orientation;
        self.last_location = sample.position;
        self.last_rotation = sample.orientation;

        if let Some(body) = body {
            let spherical = sample.position - body.center;
            self.last_spherical_dist = spherical.norm();
            self.last_radial_dist = spherical.xy().norm();
            self.last_vertical_dist = spherical.z.abs();
            self.last_location -= body.tracking_origin;
        }
    }

    /// Stop sampling and zero every derived value.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.last_location = Vector3::zeros();
        self.last_rotation = UnitQuaternion::identity();
        self.delta_location = Vector3::zeros();
        self.last_spherical_dist = 0.0;
        self.last_radial_dist = 0.0;
        self.last_vertical_dist = 0.0;
        self.frame = KinematicValues::default();
        self.kinematic = KinematicValues::default();
        self.history.clear();
    }

    /// Advance the estimator by one tick.
    pub fn tick(&mut self, sample: &KinematicSample, dt: f32, body: Option<&BodyReference>) {
        if !self.active {
            return;
        }

        let last_frame = self.frame;
        let last_kinematic = self.kinematic;

        if dt <= consts::MIN_TICK_DELTA {
            return;
        }

        self.location = sample.position;
        self.rotation = sample.orientation;

        let mut frame = KinematicValues::default();
        let mut current_location = sample.position;

        if let Some(body) = body {
            let spherical = sample.position - body.center;
            let spherical_dist = spherical.norm();
            let radial_dist = spherical.xy().norm();
            let vertical_dist = spherical.z.abs();

            frame.spherical_velocity = (spherical_dist - self.last_spherical_dist) / dt;
            frame.radial_velocity = (radial_dist - self.last_radial_dist) / dt;
            frame.vertical_velocity = (vertical_dist - self.last_vertical_dist) / dt;

            frame.spherical_accel = (frame.spherical_velocity - last_frame.spherical_velocity) / dt;
            frame.radial_accel = (frame.radial_velocity - last_frame.radial_velocity) / dt;
            frame.vertical_accel = (frame.vertical_velocity - last_frame.vertical_velocity) / dt;

            current_location -= body.tracking_origin;

            self.last_spherical_dist = spherical_dist;
            self.last_radial_dist = radial_dist;
            self.last_vertical_dist = vertical_dist;
        }

        self.delta_location = current_location - self.last_location;
        frame.velocity = self.delta_location / dt;
        frame.acceleration = (frame.velocity - last_frame.velocity) / dt;
        frame.angular_velocity = frame_angular_velocity(
            &sample.orientation,
            &self.last_rotation,
            dt,
            &last_frame,
        );

        if self.sample_window > 0.0 {
            let entry = VelocityHistoryEntry {
                linear_velocity: frame.velocity,
                angular_velocity: frame.angular_velocity,
                acceleration: frame.acceleration,
                spherical_velocity: frame.spherical_velocity,
                radial_velocity: frame.radial_velocity,
                vertical_velocity: frame.vertical_velocity,
                spherical_accel: frame.spherical_accel,
                radial_accel: frame.radial_accel,
                vertical_accel: frame.vertical_accel,
                timestamp: sample.timestamp,
            };
            self.history.push_back(entry);
            prune_history(&mut self.history, sample.timestamp, self.sample_window);
            self.kinematic = average_history(&self.history);
        } else {
            self.kinematic = frame;
        }

        self.kinematic
            .fix_angular(&last_kinematic, &sample.orientation, dt);
        frame.fix_angular(&last_frame, &sample.orientation, dt);
        self.frame = frame;

        self.last_location = current_location;
        self.last_rotation = sample.orientation;
    }

    /// Buffered (window-averaged) values
    pub fn kinematic(&self) -> &KinematicValues {
        &self.kinematic
    }

    /// Values from the most recent tick only
    pub fn frame(&self) -> &KinematicValues {
        &self.frame
    }

    pub fn history(&self) -> &VecDeque<VelocityHistoryEntry> {
        &self.history
    }

    /// Location change over the last tick, in tracking space when a body is attached
    pub fn delta_location(&self) -> Vector3<f32> {
        self.delta_location
    }

    /// World location as of the last sample
    pub fn location(&self) -> Vector3<f32> {
        self.location
    }

    /// World orientation as of the last sample
    pub fn rotation(&self) -> UnitQuaternion<f32> {
        self.rotation
    }

    pub fn last_spherical_dist(&self) -> f32 {
        self.last_spherical_dist
    }

    pub fn last_radial_dist(&self) -> f32 {
        self.last_radial_dist
    }

    pub fn last_vertical_dist(&self) -> f32 {
        self.last_vertical_dist
    }
}

/// Angular velocity in degrees/second from the rotation delta over one tick.
///
/// Near the poles of the axis extraction a reading can jump wildly; such a
/// reading is replaced by the previous frame's value extrapolated with last
/// frame's angular acceleration.
fn frame_angular_velocity(
    current: &UnitQuaternion<f32>,
    last: &UnitQuaternion<f32>,
    dt: f32,
    last_frame: &KinematicValues,
) -> Vector3<f32> {
    let delta = current.inverse() * last;
    let scaled_axis = match delta.axis_angle() {
        Some((axis, angle)) => axis.into_inner() * angle / dt,
        None => Vector3::zeros(),
    };
    let measured = current.transform_vector(&scaled_axis).map(f32::to_degrees);

    let previous = last_frame.angular_velocity;
    let jumped = (0..3).any(|i| {
        (previous[i] - measured[i]).abs() > consts::ANGULAR_SINGULARITY_DELTA
            && measured[i].abs() > consts::ANGULAR_SINGULARITY_MAGNITUDE
    });

    if jumped {
        // Undo the Z flip so the acceleration matches the raw convention.
        let mut accel = last_frame.angular_accel_world;
        accel.z = -accel.z;
        previous + accel * dt
    } else {
        measured
    }
}

/// Drop entries older than the window from the front.
///
/// Entries arrive in timestamp order, so pruning stops at the first entry still
/// inside the window.
fn prune_history(history: &mut VecDeque<VelocityHistoryEntry>, now: f64, window: f32) {
    while let Some(front) = history.front() {
        if now - front.timestamp > window as f64 {
            history.pop_front();
        } else {
            break;
        }
    }
}

fn average_history(history: &VecDeque<VelocityHistoryEntry>) -> KinematicValues {
    let Some(first) = history.front() else {
        return KinematicValues::default();
    };

    let mut total = KinematicValues::from_entry(first);
    for entry in history.iter().skip(1) {
        total.velocity += entry.linear_velocity;
        total.angular_velocity += entry.angular_velocity;
        total.acceleration += entry.acceleration;
        total.spherical_velocity += entry.spherical_velocity;
        total.radial_velocity += entry.radial_velocity;
        total.vertical_velocity += entry.vertical_velocity;
        total.spherical_accel += entry.spherical_accel;
        total.radial_accel += entry.radial_accel;
        total.vertical_accel += entry.vertical_accel;
    }

    let count = history.len() as f32;
    total.velocity /= count;
    total.angular_velocity /= count;
    total.acceleration /= count;
    total.spherical_velocity /= count;
    total.radial_velocity /= count;
    total.vertical_velocity /= count;
    total.spherical_accel /= count;
    total.radial_accel /= count;
    total.vertical_accel /= count;
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(x: f32, t: f64) -> KinematicSample {
        KinematicSample::new(Vector3::new(x, 0.0, 0.0), UnitQuaternion::identity(), t)
    }

    #[test]
    fn test_inactive_sampler_ignores_ticks() {
        let mut sampler = KinematicSampler::new(0.1);
        sampler.tick(&sample_at(5.0, 0.1), 0.1, None);
        assert_eq!(sampler.frame().velocity, Vector3::zeros());
        assert!(sampler.history().is_empty());
    }

    #[test]
    fn test_zero_dt_tick_is_skipped() {
        let mut sampler = KinematicSampler::new(0.1);
        sampler.activate(&sample_at(0.0, 0.0), None);
        sampler.tick(&sample_at(1.0, 0.0), 0.0, None);
        assert!(sampler.history().is_empty());
        assert_eq!(sampler.frame().velocity, Vector3::zeros());
    }

    #[test]
    fn test_zero_window_uses_frame_values() {
        let mut sampler = KinematicSampler::new(0.0);
        sampler.activate(&sample_at(0.0, 0.0), None);
        sampler.tick(&sample_at(1.0, 0.1), 0.1, None);
        sampler.tick(&sample_at(3.0, 0.2), 0.1, None);
        assert!(sampler.history().is_empty());
        assert!((sampler.kinematic().velocity.x - 20.0).abs() < 1e-3);
        assert_eq!(sampler.kinematic().velocity, sampler.frame().velocity);
    }

    #[test]
    fn test_prune_stops_at_first_live_entry() {
        let mut history = VecDeque::new();
        for t in [0.0, 0.05, 0.1, 0.15] {
            history.push_back(VelocityHistoryEntry {
                linear_velocity: Vector3::zeros(),
                angular_velocity: Vector3::zeros(),
                acceleration: Vector3::zeros(),
                spherical_velocity: 0.0,
                radial_velocity: 0.0,
                vertical_velocity: 0.0,
                spherical_accel: 0.0,
                radial_accel: 0.0,
                vertical_accel: 0.0,
                timestamp: t,
            });
        }
        prune_history(&mut history, 0.2, 0.1);
        assert_eq!(history.len(), 2);
        assert!((history[0].timestamp - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_constant_rotation_yields_steady_angular_speed() {
        let mut sampler = KinematicSampler::new(0.0);
        let rate = 90.0f32.to_radians();
        let dt = 1.0 / 60.0;
        sampler.activate(
            &KinematicSample::new(Vector3::zeros(), UnitQuaternion::identity(), 0.0),
            None,
        );
        for i in 1..=30 {
            let rot = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), rate * dt * i as f32);
            sampler.tick(
                &KinematicSample::new(Vector3::zeros(), rot, i as f64 * dt as f64),
                dt,
                None,
            );
        }
        let speed = sampler.frame().angular_velocity.norm();
        assert!((speed - 90.0).abs() < 0.5, "expected ~90 deg/s, got {}", speed);
        assert!(sampler.frame().angular_velocity.x.abs() < 1e-2);
    }
}
