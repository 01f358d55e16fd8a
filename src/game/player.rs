//! Player character: two tracked hands, their one-hand gestures and the
//! two-hand casting pose, gated by status and cooldowns.

use crossbeam_channel::{unbounded, Receiver, Sender};
use nalgebra::Vector3;
use tracing::{debug, info, trace};
use uuid::Uuid;

use super::debug::{DebugColor, DebugContext, DebugShape};
use super::events::{EventSink, GameEvent};
use super::gesture::{
    CastingPose, CooldownLedger, CooldownMatrix, GestureKind, GestureTransition, Hand, PoseStateMachine,
    PoseTickInput, PoseTransition,
};
use super::hand::HandController;
use super::kinematics::{BodyReference, KinematicSample};
use super::FrameTime;
use crate::config::GameplayConfig;

/// Tracked transforms for both hands this tick.
#[derive(Debug, Clone, Copy)]
pub struct HandFrame {
    pub right: KinematicSample,
    pub left: KinematicSample,
    pub body: Option<BodyReference>,
}

/// Input queued from outside the tick, applied in order at the start of the next tick.
#[derive(Debug, Clone, Copy)]
pub enum PlayerInput {
    Frame(HandFrame),
    SetCastingEnabled(bool),
    SetPowerCharged { hand: Hand, charged: bool },
    TeleportStarted,
    TeleportFinished,
    SetDead(bool),
    /// Stunned for `duration` seconds from the tick the input is applied
    Stun { duration: f32 },
    SetPaused(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerStatus {
    pub teleporting: bool,
    pub dead: bool,
    pub stunned_until: Option<f64>,
    pub paused: bool,
}

impl PlayerStatus {
    pub fn is_stunned(&self, now: f64) -> bool {
        self.stunned_until.is_some_and(|until| now < until)
    }

    /// Status side of the casting gate; hands add their own state.
    pub fn allows_casting(&self, now: f64) -> bool {
        !self.teleporting && !self.dead && !self.paused && !self.is_stunned(now)
    }
}

pub struct PlayerCharacter {
    pub id: Uuid,
    right: HandController,
    left: HandController,
    pose: PoseStateMachine,
    cooldowns: CooldownMatrix,
    ledger: CooldownLedger,
    status: PlayerStatus,
    casting_enabled: bool,
    latest_frame: Option<HandFrame>,
    input_sender: Sender<PlayerInput>,
    input_receiver: Receiver<PlayerInput>,
    events: EventSink,
}

impl PlayerCharacter {
    pub fn new(config: &GameplayConfig) -> Self {
        let (input_sender, input_receiver) = unbounded();
        let window = config.sampler.sample_window;
        Self {
            id: Uuid::new_v4(),
            right: HandController::new(Hand::Right, window, &config.gestures),
            left: HandController::new(Hand::Left, window, &config.gestures),
            pose: PoseStateMachine::new(config.poses.static_pose.clone(), config.poses.dynamic_pose.clone()),
            cooldowns: config.casting.clone(),
            ledger: CooldownLedger::default(),
            status: PlayerStatus::default(),
            casting_enabled: true,
            latest_frame: None,
            input_sender,
            input_receiver,
            events: EventSink::disconnected(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn input_sender(&self) -> Sender<PlayerInput> {
        self.input_sender.clone()
    }

    pub fn queue_input(&self, input: PlayerInput) {
        // The receiver lives in self, so the send cannot fail.
        let _ = self.input_sender.send(input);
    }

    pub fn hand(&self, hand: Hand) -> &HandController {
        match hand {
            Hand::Right => &self.right,
            Hand::Left => &self.left,
        }
    }

    pub fn pose(&self) -> CastingPose {
        self.pose.pose()
    }

    pub fn pose_machine(&self) -> &PoseStateMachine {
        &self.pose
    }

    pub fn status(&self) -> &PlayerStatus {
        &self.status
    }

    pub fn ledger(&self) -> &CooldownLedger {
        &self.ledger
    }

    /// Gesture `hand` currently reports. A held pose overrides the one-hand gesture.
    pub fn gesture_kind(&self, hand: Hand) -> GestureKind {
        match self.pose.pose() {
            CastingPose::NoPose => self.hand(hand).gestures().active_kind(),
            pose => pose.gesture_kind(),
        }
    }

    /// Casting is enabled and the status allows it.
    pub fn can_gesture_cast(&self, now: f64) -> bool {
        self.casting_enabled && self.status.allows_casting(now)
    }

    fn apply_input(&mut self, input: PlayerInput, now: f64) {
        trace!(player = %self.id, ?input, "player input");
        match input {
            PlayerInput::Frame(frame) => self.latest_frame = Some(frame),
            PlayerInput::SetCastingEnabled(enabled) => self.set_casting_enabled(enabled, now),
            PlayerInput::SetPowerCharged { hand, charged } => match hand {
                Hand::Right => self.right.set_power_charged(charged),
                Hand::Left => self.left.set_power_charged(charged),
            },
            PlayerInput::TeleportStarted => {
                self.status.teleporting = true;
                let right = self.right.suspend();
                let left = self.left.suspend();
                self.publish_gesture(right, now);
                self.publish_gesture(left, now);
                let pose = self.pose.clear();
                self.publish_pose(pose, now);
            }
            PlayerInput::TeleportFinished => {
                self.status.teleporting = false;
                self.right.resume();
                self.left.resume();
            }
            PlayerInput::SetDead(dead) => self.status.dead = dead,
            PlayerInput::Stun { duration } => {
                let until = now + duration.max(0.0) as f64;
                self.status.stunned_until = Some(self.status.stunned_until.map_or(until, |u| u.max(until)));
            }
            PlayerInput::SetPaused(paused) => self.status.paused = paused,
        }
    }

    fn set_casting_enabled(&mut self, enabled: bool, now: f64) {
        if enabled == self.casting_enabled {
            return;
        }
        self.casting_enabled = enabled;
        info!(player = %self.id, enabled, "gesture casting toggled");

        for hand in [Hand::Right, Hand::Left] {
            let transition = match hand {
                Hand::Right => self.right.set_casting_enabled(enabled),
                Hand::Left => self.left.set_casting_enabled(enabled),
            };
            self.publish_gesture(transition, now);
            self.events.emit(GameEvent::CastingToggled {
                character: self.id,
                time: now,
                hand,
                enabled,
            });
        }
        if !enabled {
            let pose = self.pose.clear();
            self.publish_pose(pose, now);
        }
    }

    fn publish_gesture(&mut self, transition: Option<GestureTransition>, now: f64) {
        let Some(transition) = transition else {
            return;
        };
        self.ledger.record_exit(transition.hand, transition.from, now);
        self.events.emit(GameEvent::GestureChanged {
            character: self.id,
            time: now,
            hand: transition.hand,
            from: transition.from,
            to: transition.to,
        });
    }

    fn publish_pose(&mut self, transition: Option<PoseTransition>, now: f64) {
        let Some(transition) = transition else {
            return;
        };
        if let Some(exited) = transition.exited() {
            self.ledger.record_exit(Hand::Right, exited.gesture_kind(), now);
        }
        self.events.emit(GameEvent::PoseChanged {
            character: self.id,
            time: now,
            from: transition.from,
            to: transition.to,
        });
    }

    /// Phase 1-3: sample both hands and capture their snapshots.
    fn update_hands(&mut self, frame: &HandFrame, dt: f32) {
        self.right.update_sampler(&frame.right, dt, frame.body.as_ref());
        self.left.update_sampler(&frame.left, dt, frame.body.as_ref());

        let right_location = self.right.sampler().is_active().then(|| self.right.location());
        let left_location = self.left.sampler().is_active().then(|| self.left.location());
        self.right.capture_snapshots(left_location);
        self.left.capture_snapshots(right_location);
    }

    /// Phase 4: one-hand gestures, right then left. Returns whether either hand is busy.
    fn tick_one_hand(&mut self, now: f64, can_cast: bool) -> bool {
        let (right_busy, right) = {
            let (matrix, ledger) = (&self.cooldowns, &self.ledger);
            self.right
                .tick_gestures(now, can_cast, |kind| matrix.allows(kind, ledger, Hand::Right, now))
        };
        self.publish_gesture(right, now);

        let (left_busy, left) = {
            let (matrix, ledger) = (&self.cooldowns, &self.ledger);
            self.left
                .tick_gestures(now, can_cast, |kind| matrix.allows(kind, ledger, Hand::Left, now))
        };
        self.publish_gesture(left, now);

        right_busy || left_busy
    }

    /// Phase 5: the two-hand pose.
    fn tick_pose(&mut self, now: f64, can_cast: bool, hands_busy: bool) {
        let input = PoseTickInput {
            now,
            right: self.right.pose_input(),
            left: self.left.pose_input(),
            can_cast: can_cast && self.right.ready() && self.left.ready(),
            can_cannon: self.cooldowns.can_cannon(&self.ledger, now),
            hands_busy,
        };
        let transition = self.pose.tick(&input);
        self.publish_pose(transition, now);
    }

    fn draw_hands(&self, debug: &DebugContext<'_>) {
        for hand in [&self.right, &self.left] {
            if !hand.sampler().is_active() {
                continue;
            }
            let color = match self.gesture_kind(hand.hand()) {
                GestureKind::NoGesture => DebugColor::White,
                GestureKind::Punch => DebugColor::Red,
                GestureKind::Slash => DebugColor::Orange,
                GestureKind::CannonStatic => DebugColor::Cyan,
                GestureKind::CannonDynamic => DebugColor::Yellow,
            };
            let location = hand.location();
            debug.gesture(
                DebugShape::Sphere {
                    center: location,
                    radius: 5.0,
                    color,
                },
                false,
            );
            debug.gesture(
                DebugShape::Line {
                    from: location,
                    to: location + hand.sampler().kinematic().velocity * 0.1,
                    color: DebugColor::Green,
                },
                false,
            );
        }
    }

    pub fn tick(&mut self, time: FrameTime, debug: &DebugContext<'_>) {
        let FrameTime { now, dt } = time;

        while let Ok(input) = self.input_receiver.try_recv() {
            self.apply_input(input, now);
        }
        if let Some(until) = self.status.stunned_until {
            if now >= until {
                debug!(player = %self.id, "stun expired");
                self.status.stunned_until = None;
            }
        }

        match self.latest_frame.take() {
            Some(frame) => self.update_hands(&frame, dt),
            None => {
                self.right.mark_untracked();
                self.left.mark_untracked();
            }
        }

        let can_cast = self.can_gesture_cast(now);
        if self.pose.pose() == CastingPose::NoPose {
            let hands_busy = self.tick_one_hand(now, can_cast);
            if !hands_busy {
                self.tick_pose(now, can_cast, false);
            }
        } else {
            self.tick_pose(now, can_cast, false);
        }

        self.draw_hands(debug);
    }

    /// Midpoint between the hands, if both are tracked.
    pub fn hands_midpoint(&self) -> Option<Vector3<f32>> {
        (self.right.sampler().is_active() && self.left.sampler().is_active())
            .then(|| (self.right.location() + self.left.location()) * 0.5)
    }
}
