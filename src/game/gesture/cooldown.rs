//! Cooldown interlocks between gesture kinds.

use serde::Deserialize;

use super::{GestureKind, Hand, HandPair};

/// Minimum time (seconds) after exiting one gesture kind before another may begin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CooldownMatrix {
    pub punch_enabled: bool,
    pub slash_enabled: bool,
    pub cannon_enabled: bool,
    pub punch_after_punch: f32,
    pub punch_after_slash: f32,
    pub punch_after_cannon_static: f32,
    pub punch_after_cannon_dynamic: f32,
    pub slash_after_punch: f32,
    pub slash_after_slash: f32,
    pub slash_after_cannon_static: f32,
    pub slash_after_cannon_dynamic: f32,
    pub cannon_after_punch: f32,
    pub cannon_after_slash: f32,
    pub cannon_after_cannon: f32,
}

impl Default for CooldownMatrix {
    fn default() -> Self {
        Self {
            punch_enabled: true,
            slash_enabled: true,
            cannon_enabled: true,
            punch_after_punch: 0.2,
            punch_after_slash: 0.3,
            punch_after_cannon_static: 1.0,
            punch_after_cannon_dynamic: 1.0,
            slash_after_punch: 0.3,
            slash_after_slash: 0.2,
            slash_after_cannon_static: 1.0,
            slash_after_cannon_dynamic: 1.0,
            cannon_after_punch: 0.5,
            cannon_after_slash: 0.5,
            cannon_after_cannon: 1.5,
        }
    }
}

/// Last exit times of the one-hand gestures on one hand. `None` means never.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HandExitTimes {
    pub punch: Option<f64>,
    pub slash: Option<f64>,
}

/// Exit timestamps every cooldown check reads from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CooldownLedger {
    pub hands: HandPair<HandExitTimes>,
    pub cannon_static: Option<f64>,
    pub cannon_dynamic: Option<f64>,
}

impl CooldownLedger {
    /// Record that `kind` stopped at `now`. Cannon kinds are player-wide.
    pub fn record_exit(&mut self, hand: Hand, kind: GestureKind, now: f64) {
        match kind {
            GestureKind::Punch => self.hands.get_mut(hand).punch = Some(now),
            GestureKind::Slash => self.hands.get_mut(hand).slash = Some(now),
            GestureKind::CannonStatic => self.cannon_static = Some(now),
            GestureKind::CannonDynamic => self.cannon_dynamic = Some(now),
            GestureKind::NoGesture => {}
        }
    }
}

fn elapsed(now: f64, since: Option<f64>, cooldown: f32) -> bool {
    match since {
        Some(t) => now - t >= cooldown as f64,
        None => true,
    }
}

impl CooldownMatrix {
    pub fn can_punch(&self, ledger: &CooldownLedger, hand: Hand, now: f64) -> bool {
        let exits = ledger.hands.get(hand);
        self.punch_enabled
            && elapsed(now, exits.punch, self.punch_after_punch)
            && elapsed(now, exits.slash, self.punch_after_slash)
            && elapsed(now, ledger.cannon_static, self.punch_after_cannon_static)
            && elapsed(now, ledger.cannon_dynamic, self.punch_after_cannon_dynamic)
    }

    pub fn can_slash(&self, ledger: &CooldownLedger, hand: Hand, now: f64) -> bool {
        let exits = ledger.hands.get(hand);
        self.slash_enabled
            && elapsed(now, exits.punch, self.slash_after_punch)
            && elapsed(now, exits.slash, self.slash_after_slash)
            && elapsed(now, ledger.cannon_static, self.slash_after_cannon_static)
            && elapsed(now, ledger.cannon_dynamic, self.slash_after_cannon_dynamic)
    }

    /// Cannon poses consult both hands' punch and slash exits.
    pub fn can_cannon(&self, ledger: &CooldownLedger, now: f64) -> bool {
        let (left, right) = (&ledger.hands.left, &ledger.hands.right);
        self.cannon_enabled
            && elapsed(now, ledger.cannon_dynamic, self.cannon_after_cannon)
            && elapsed(now, right.punch, self.cannon_after_punch)
            && elapsed(now, left.punch, self.cannon_after_punch)
            && elapsed(now, right.slash, self.cannon_after_slash)
            && elapsed(now, left.slash, self.cannon_after_slash)
    }

    /// Whether `kind` may be entered or sustained on `hand` right now.
    pub fn allows(&self, kind: GestureKind, ledger: &CooldownLedger, hand: Hand, now: f64) -> bool {
        match kind {
            GestureKind::Punch => self.can_punch(ledger, hand, now),
            GestureKind::Slash => self.can_slash(ledger, hand, now),
            GestureKind::CannonStatic | GestureKind::CannonDynamic => self.can_cannon(ledger, now),
            GestureKind::NoGesture => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_exited_allows_everything() {
        let matrix = CooldownMatrix::default();
        let ledger = CooldownLedger::default();
        assert!(matrix.can_punch(&ledger, Hand::Right, 0.0));
        assert!(matrix.can_slash(&ledger, Hand::Left, 0.0));
        assert!(matrix.can_cannon(&ledger, 0.0));
    }

    #[test]
    fn test_slash_after_punch_waits() {
        let matrix = CooldownMatrix::default();
        let mut ledger = CooldownLedger::default();
        ledger.record_exit(Hand::Right, GestureKind::Punch, 10.0);
        assert!(!matrix.can_slash(&ledger, Hand::Right, 10.25));
        assert!(matrix.can_slash(&ledger, Hand::Right, 10.5));
        // other hand is unaffected
        assert!(matrix.can_slash(&ledger, Hand::Left, 10.25));
    }

    #[test]
    fn test_cannon_reads_both_hands() {
        let matrix = CooldownMatrix::default();
        let mut ledger = CooldownLedger::default();
        ledger.record_exit(Hand::Left, GestureKind::Slash, 5.0);
        assert!(!matrix.can_cannon(&ledger, 5.25));
        assert!(matrix.can_cannon(&ledger, 5.5));
    }

    #[test]
    fn test_cannon_locks_out_hands_longest() {
        let matrix = CooldownMatrix::default();
        let mut ledger = CooldownLedger::default();
        ledger.record_exit(Hand::Right, GestureKind::CannonDynamic, 2.0);

        assert!(!matrix.can_punch(&ledger, Hand::Left, 2.75));
        assert!(!matrix.can_slash(&ledger, Hand::Right, 2.75));
        assert!(matrix.can_punch(&ledger, Hand::Left, 3.0));
        assert!(matrix.can_slash(&ledger, Hand::Right, 3.0));
        assert!(!matrix.can_cannon(&ledger, 3.25));
        assert!(matrix.can_cannon(&ledger, 3.5));
    }

    #[test]
    fn test_repeat_gestures_wait_briefly() {
        let matrix = CooldownMatrix::default();
        let mut ledger = CooldownLedger::default();
        ledger.record_exit(Hand::Right, GestureKind::Punch, 1.0);
        assert!(!matrix.can_punch(&ledger, Hand::Right, 1.125));
        assert!(matrix.can_punch(&ledger, Hand::Right, 1.25));
        // slash waits longer after a punch than a punch does
        assert!(!matrix.can_slash(&ledger, Hand::Right, 1.25));
    }

    #[test]
    fn test_disabled_kind_is_refused() {
        let matrix = CooldownMatrix {
            punch_enabled: false,
            ..CooldownMatrix::default()
        };
        assert!(!matrix.allows(GestureKind::Punch, &CooldownLedger::default(), Hand::Right, 0.0));
        assert!(!matrix.allows(GestureKind::NoGesture, &CooldownLedger::default(), Hand::Right, 0.0));
    }
}
