//! Kinematic sampler behavior through the public API.
//!
//! Covers:
//! - buffered velocity convergence under constant motion
//! - startup transient after a hand starts moving
//! - history window retention at every tick
//! - body-relative spherical/radial/vertical decomposition
//! - tracking-origin locomotion not registering as hand motion
//! - angular velocity jumps replaced by the previous frame's extrapolation
//! - deactivation clearing history and derived values
//!
//! Run with: cargo test --test kinematic_sampler_test

use handcast::game::kinematics::{BodyReference, KinematicSample, KinematicSampler};
use nalgebra::{Unit, UnitQuaternion, Vector3};

/// 1/64 s, exact in both f32 and f64
const DT: f32 = 0.015625;
const WINDOW: f32 = 0.1;

fn at(position: Vector3<f32>, tick: u32) -> KinematicSample {
    KinematicSample::new(position, UnitQuaternion::identity(), tick as f64 * DT as f64)
}

fn assert_vec_near(actual: Vector3<f32>, expected: Vector3<f32>, tol: f32, what: &str) {
    assert!(
        (actual - expected).norm() <= tol,
        "{what}: expected {expected:?}, got {actual:?}"
    );
}

// =============================================================================
// Convergence
// =============================================================================

#[test]
fn test_constant_velocity_converges() {
    let velocity = Vector3::new(5.0, 0.0, 0.0);
    let mut sampler = KinematicSampler::new(WINDOW);
    sampler.activate(&at(Vector3::zeros(), 0), None);

    // One simulated second
    for tick in 1..=64 {
        let t = tick as f32 * DT;
        sampler.tick(&at(velocity * t, tick), DT, None);
        if t >= WINDOW {
            assert_vec_near(sampler.kinematic().velocity, velocity, 1e-3, "buffered velocity");
        }
    }
    assert_vec_near(sampler.frame().velocity, velocity, 1e-3, "frame velocity");
    assert!(sampler.kinematic().acceleration.norm() < 0.1);
}

#[test]
fn test_startup_transient_settles_within_one_window() {
    let mut sampler = KinematicSampler::new(WINDOW);
    let rest_ticks = 32;
    sampler.activate(&at(Vector3::zeros(), 0), None);
    for tick in 1..=rest_ticks {
        sampler.tick(&at(Vector3::zeros(), tick), DT, None);
    }
    assert_eq!(sampler.kinematic().velocity, Vector3::zeros());

    let speed = 200.0;
    let mut x = 0.0;
    let mut saw_partial = false;
    for tick in rest_ticks + 1..=rest_ticks + 16 {
        x += speed * DT;
        sampler.tick(&at(Vector3::new(x, 0.0, 0.0), tick), DT, None);

        let moving_for = (tick - rest_ticks) as f32 * DT;
        let buffered = sampler.kinematic().velocity.x;
        if moving_for < WINDOW {
            // Still averaging in resting entries
            saw_partial |= buffered < speed - 1.0;
        } else if moving_for >= WINDOW + DT {
            assert!((buffered - speed).abs() < 0.05, "buffered {buffered} at {moving_for}s");
        }
    }
    assert!(saw_partial, "buffered velocity should lag behind frame velocity");
}

// =============================================================================
// History window
// =============================================================================

#[test]
fn test_history_entries_stay_inside_window() {
    let mut sampler = KinematicSampler::new(WINDOW);
    sampler.activate(&at(Vector3::zeros(), 0), None);

    for tick in 1..=100u32 {
        let now = tick as f64 * DT as f64;
        sampler.tick(&at(Vector3::new(tick as f32, 0.0, 0.0), tick), DT, None);

        let history = sampler.history();
        assert!(history
            .iter()
            .all(|entry| now - entry.timestamp <= WINDOW as f64));

        // Entries at now, now - DT, ... now - 6 DT fit; now - 7 DT does not.
        let expected = tick.min(7) as usize;
        assert_eq!(history.len(), expected, "history length at tick {tick}");
        assert_eq!(history.back().map(|e| e.timestamp), Some(now));
    }
}

#[test]
fn test_uneven_ticks_prune_exactly_expired_entries() {
    let mut sampler = KinematicSampler::new(WINDOW);
    sampler.activate(&at(Vector3::zeros(), 0), None);

    // Entries at 0.0625, 0.125, 0.1875
    for tick in [4u32, 8, 12] {
        sampler.tick(&at(Vector3::new(tick as f32, 0.0, 0.0), tick), 4.0 * DT, None);
    }
    let stamps: Vec<f64> = sampler.history().iter().map(|e| e.timestamp).collect();
    assert_eq!(stamps, vec![0.125, 0.1875]);

    // A long stall leaves only the newest entry.
    sampler.tick(&at(Vector3::new(20.0, 0.0, 0.0), 40), 28.0 * DT, None);
    assert_eq!(sampler.history().len(), 1);
}

// =============================================================================
// Body-relative decomposition
// =============================================================================

#[test]
fn test_radial_motion_away_from_body() {
    let body = BodyReference {
        center: Vector3::new(0.0, 0.0, 100.0),
        tracking_origin: Vector3::zeros(),
    };
    let mut sampler = KinematicSampler::new(WINDOW);
    sampler.activate(&at(Vector3::new(20.0, 0.0, 80.0), 0), Some(&body));

    for tick in 1..=16 {
        let x = 20.0 + 10.0 * tick as f32 * DT;
        sampler.tick(&at(Vector3::new(x, 0.0, 80.0), tick), DT, Some(&body));
    }

    let frame = sampler.frame();
    assert!((frame.radial_velocity - 10.0).abs() < 1e-2, "radial {}", frame.radial_velocity);
    assert!(frame.vertical_velocity.abs() < 1e-3);
    assert!(frame.spherical_velocity > 0.0 && frame.spherical_velocity < 10.0);
    // Hand is below the body center; distance is still positive
    assert!((sampler.last_vertical_dist() - 20.0).abs() < 1e-3);
    assert!((sampler.last_radial_dist() - 22.5).abs() < 1e-3);
}

#[test]
fn test_locomotion_is_not_hand_motion() {
    let mut sampler = KinematicSampler::new(WINDOW);
    let hand_offset = Vector3::new(30.0, -20.0, 0.0);
    let body_at = |tick: u32| BodyReference {
        center: Vector3::new(tick as f32 * 4.0, 0.0, 0.0),
        tracking_origin: Vector3::new(tick as f32 * 4.0, 0.0, 0.0),
    };

    let start = body_at(0);
    sampler.activate(&at(start.tracking_origin + hand_offset, 0), Some(&start));
    for tick in 1..=20 {
        let body = body_at(tick);
        sampler.tick(&at(body.tracking_origin + hand_offset, tick), DT, Some(&body));
    }

    assert_vec_near(sampler.kinematic().velocity, Vector3::zeros(), 1e-3, "buffered velocity");
    assert!(sampler.frame().spherical_velocity.abs() < 1e-3);
    assert!(sampler.delta_location().norm() < 1e-4);
}

// =============================================================================
// Angular velocity
// =============================================================================

fn turned(axis: &Unit<Vector3<f32>>, degrees: f32, tick: u32) -> KinematicSample {
    KinematicSample::new(
        Vector3::zeros(),
        UnitQuaternion::from_axis_angle(axis, degrees.to_radians()),
        tick as f64 * DT as f64,
    )
}

/// Spin at each rate (degrees/second) for one tick, starting from rest.
fn spin_up(axis: &Unit<Vector3<f32>>, rates: &[f32]) -> (KinematicSampler, f32) {
    let mut sampler = KinematicSampler::new(WINDOW);
    sampler.activate(&turned(axis, 0.0, 0), None);
    let mut angle = 0.0;
    for (tick, rate) in rates.iter().enumerate() {
        angle += rate * DT;
        sampler.tick(&turned(axis, angle, tick as u32 + 1), DT, None);
    }
    (sampler, angle)
}

#[test]
fn test_angular_jump_extrapolates_previous_frame() {
    let axis = Vector3::z_axis();
    let (mut sampler, angle) = spin_up(&axis, &[100.0, 200.0]);

    let previous = sampler.frame().angular_velocity;
    let accel = sampler.frame().angular_accel_world;
    assert!((previous.z.abs() - 200.0).abs() < 1.0, "spin rate {previous:?}");
    assert!(accel.z.abs() > 1000.0, "angular accel {accel:?}");

    // 1200 degrees/second in a single tick
    sampler.tick(&turned(&axis, angle + 1200.0 * DT, 3), DT, None);

    let mut raw_accel = accel;
    raw_accel.z = -raw_accel.z;
    let expected = previous + raw_accel * DT;
    assert_vec_near(sampler.frame().angular_velocity, expected, 1e-3, "extrapolated angular velocity");
    // The previous trend continues instead of the spike
    let z = sampler.frame().angular_velocity.z;
    assert!((z.abs() - 300.0).abs() < 2.0, "angular velocity z {z}");
}

#[test]
fn test_angular_jump_on_one_axis_is_enough() {
    let axis = Vector3::x_axis();
    let (mut sampler, angle) = spin_up(&axis, &[100.0, 200.0]);

    let previous = sampler.frame().angular_velocity;
    let accel = sampler.frame().angular_accel_world;
    assert!(previous.y.abs() < 1e-3 && previous.z.abs() < 1e-3);

    sampler.tick(&turned(&axis, angle + 1200.0 * DT, 3), DT, None);

    // Only X jumped; the Z flip is undone on a zero component
    let mut raw_accel = accel;
    raw_accel.z = -raw_accel.z;
    let expected = previous + raw_accel * DT;
    assert_vec_near(sampler.frame().angular_velocity, expected, 1e-3, "extrapolated angular velocity");
    let x = sampler.frame().angular_velocity.x;
    assert!((x.abs() - 300.0).abs() < 2.0, "angular velocity x {x}");
}

#[test]
fn test_fast_steady_spin_is_not_a_jump() {
    let axis = Vector3::z_axis();
    let (sampler, _) = spin_up(&axis, &[450.0, 600.0, 600.0]);

    // Above the magnitude limit, but each step changes by less than the jump limit
    let z = sampler.frame().angular_velocity.z;
    assert!((z.abs() - 600.0).abs() < 1.0, "angular velocity z {z}");
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_deactivate_clears_derived_state() {
    let mut sampler = KinematicSampler::new(WINDOW);
    sampler.activate(&at(Vector3::zeros(), 0), None);
    for tick in 1..=8 {
        sampler.tick(&at(Vector3::new(tick as f32, 0.0, 0.0), tick), DT, None);
    }
    assert!(!sampler.history().is_empty());

    sampler.deactivate();
    assert!(!sampler.is_active());
    assert!(sampler.history().is_empty());
    assert_eq!(sampler.kinematic().velocity, Vector3::zeros());
    assert_eq!(sampler.delta_location(), Vector3::zeros());

    // Reactivation reports no motion on the first tick from the new location
    sampler.activate(&at(Vector3::new(50.0, 0.0, 0.0), 9), None);
    sampler.tick(&at(Vector3::new(50.0, 0.0, 0.0), 10), DT, None);
    assert_eq!(sampler.frame().velocity, Vector3::zeros());
}
