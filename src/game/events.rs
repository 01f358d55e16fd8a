//! Consumer-facing notifications emitted by characters during their tick.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use tracing::trace;
use uuid::Uuid;

use super::gesture::{CastingPose, GestureKind, Hand};
use super::nav::NavRecoveryEvent;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// A hand's active one-hand gesture changed
    GestureChanged {
        character: Uuid,
        time: f64,
        hand: Hand,
        from: GestureKind,
        to: GestureKind,
    },
    /// The player's two-hand pose changed
    PoseChanged {
        character: Uuid,
        time: f64,
        from: CastingPose,
        to: CastingPose,
    },
    CastingToggled {
        character: Uuid,
        time: f64,
        hand: Hand,
        enabled: bool,
    },
    NavRecovery {
        character: Uuid,
        time: f64,
        recovery: NavRecoveryEvent,
    },
}

impl GameEvent {
    pub fn character(&self) -> Uuid {
        match self {
            GameEvent::GestureChanged { character, .. }
            | GameEvent::PoseChanged { character, .. }
            | GameEvent::CastingToggled { character, .. }
            | GameEvent::NavRecovery { character, .. } => *character,
        }
    }
}

/// Cloneable sending half shared by every character of a manager.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<Sender<GameEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, Receiver<GameEvent>) {
        let (sender, receiver) = unbounded();
        (Self { sender: Some(sender) }, receiver)
    }

    /// A sink that drops everything.
    pub fn disconnected() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, event: GameEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(event).is_err() {
            trace!("event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_delivers_in_order() {
        let (sink, receiver) = EventSink::channel();
        let id = Uuid::new_v4();
        for to in [CastingPose::CannonStatic, CastingPose::NoPose] {
            sink.emit(GameEvent::PoseChanged {
                character: id,
                time: 1.0,
                from: CastingPose::NoPose,
                to,
            });
        }
        let got: Vec<_> = receiver.try_iter().collect();
        assert_eq!(got.len(), 2);
        assert!(matches!(got[1], GameEvent::PoseChanged { to: CastingPose::NoPose, .. }));
    }

    #[test]
    fn test_event_serializes_tagged() {
        let event = GameEvent::GestureChanged {
            character: Uuid::nil(),
            time: 0.5,
            hand: Hand::Left,
            from: GestureKind::NoGesture,
            to: GestureKind::Punch,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "gesture_changed");
        assert_eq!(json["hand"], "left");
        assert_eq!(json["to"], "punch");
    }

    #[test]
    fn test_disconnected_sink_is_silent() {
        EventSink::disconnected().emit(GameEvent::CastingToggled {
            character: Uuid::nil(),
            time: 0.0,
            hand: Hand::Right,
            enabled: false,
        });
    }
}
