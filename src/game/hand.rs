//! One tracked hand: its kinematic sampler, gesture snapshots and one-hand
//! gesture machine.

use nalgebra::Vector3;
use tracing::debug;

use super::gesture::{
    GestureKind, GestureTransition, Hand, HandMotion, OneHandGestureDefinition, OneHandGestureMachine,
    OneHandTickInput, PoseHandInput, SnapshotPair,
};
use super::kinematics::{BodyReference, KinematicSample, KinematicSampler};

#[derive(Debug, Clone)]
pub struct HandController {
    hand: Hand,
    sampler: KinematicSampler,
    snapshots: SnapshotPair,
    gestures: OneHandGestureMachine,
    casting_enabled: bool,
    power_charged: bool,
    /// Sampling paused while the owner teleports
    suspended: bool,
    /// No transform arrived this tick; snapshots are from the last one
    untracked: bool,
}

impl HandController {
    pub fn new(hand: Hand, sample_window: f32, definitions: &[OneHandGestureDefinition]) -> Self {
        Self {
            hand,
            sampler: KinematicSampler::new(sample_window),
            snapshots: SnapshotPair::default(),
            gestures: OneHandGestureMachine::new(hand, definitions),
            casting_enabled: true,
            power_charged: true,
            suspended: false,
            untracked: false,
        }
    }

    pub fn hand(&self) -> Hand {
        self.hand
    }

    pub fn sampler(&self) -> &KinematicSampler {
        &self.sampler
    }

    pub fn snapshots(&self) -> &SnapshotPair {
        &self.snapshots
    }

    pub fn gestures(&self) -> &OneHandGestureMachine {
        &self.gestures
    }

    pub fn casting_enabled(&self) -> bool {
        self.casting_enabled
    }

    pub fn power_charged(&self) -> bool {
        self.power_charged
    }

    pub fn set_power_charged(&mut self, charged: bool) {
        if charged != self.power_charged {
            debug!(hand = ?self.hand, charged, "power charge changed");
            self.power_charged = charged;
        }
    }

    /// Enabling arms the sampler for the next update. Disabling stops sampling,
    /// clears both snapshots and drops any gesture.
    pub fn set_casting_enabled(&mut self, enabled: bool) -> Option<GestureTransition> {
        if enabled == self.casting_enabled {
            return None;
        }
        self.casting_enabled = enabled;
        debug!(hand = ?self.hand, enabled, "gesture casting toggled");
        if enabled {
            None
        } else {
            self.stop_sampling()
        }
    }

    /// Owner started teleporting.
    pub fn suspend(&mut self) -> Option<GestureTransition> {
        self.suspended = true;
        self.stop_sampling()
    }

    /// Owner finished teleporting; sampling resumes on the next update.
    pub fn resume(&mut self) {
        self.suspended = false;
    }

    fn stop_sampling(&mut self) -> Option<GestureTransition> {
        self.sampler.deactivate();
        self.snapshots = SnapshotPair::default();
        self.gestures.clear()
    }

    /// Feed this tick's transform. A sampler armed since the last update is
    /// activated from this sample instead of ticked.
    pub fn update_sampler(&mut self, sample: &KinematicSample, dt: f32, body: Option<&BodyReference>) {
        self.untracked = false;
        if !self.casting_enabled || self.suspended {
            return;
        }
        if self.sampler.is_active() {
            self.sampler.tick(sample, dt, body);
        } else {
            self.sampler.activate(sample, body);
        }
    }

    /// Tracking dropped out for this tick. Gestures keep evaluating the last
    /// snapshots but cover no distance until the next transform.
    pub fn mark_untracked(&mut self) {
        self.untracked = true;
    }

    pub fn is_untracked(&self) -> bool {
        self.untracked
    }

    pub fn capture_snapshots(&mut self, other_hand: Option<Vector3<f32>>) {
        if self.sampler.is_active() {
            self.snapshots = SnapshotPair::capture(&self.sampler, self.hand, other_hand);
        }
    }

    pub fn location(&self) -> Vector3<f32> {
        self.sampler.location()
    }

    pub fn motion(&self) -> HandMotion {
        HandMotion {
            location: self.sampler.location(),
            rotation: self.sampler.rotation(),
            motion_angle: self.snapshots.buffered.motion_angle,
            velocity: self.sampler.kinematic().velocity,
            delta_distance: if self.untracked {
                0.0
            } else {
                self.sampler.delta_location().norm()
            },
        }
    }

    /// Run the one-hand gesture machine. `can_cast` is the owner's gate; the
    /// hand adds its own casting and charge state.
    pub fn tick_gestures(
        &mut self,
        now: f64,
        can_cast: bool,
        allowed: impl Fn(GestureKind) -> bool,
    ) -> (bool, Option<GestureTransition>) {
        let motion = self.motion();
        let input = OneHandTickInput {
            now,
            buffered: &self.snapshots.buffered,
            frame: &self.snapshots.frame,
            motion,
            can_cast: can_cast && self.ready(),
        };
        self.gestures.tick(&input, allowed)
    }

    pub fn pose_input(&self) -> PoseHandInput<'_> {
        PoseHandInput {
            buffered: &self.snapshots.buffered,
            frame: &self.snapshots.frame,
            motion: self.motion(),
        }
    }

    /// Casting is enabled, not suspended, charged, and the hand has been sampled.
    pub fn ready(&self) -> bool {
        self.casting_enabled && self.power_charged && !self.suspended && self.sampler.is_active()
    }
}
