//! One-hand gesture state machine.
//!
//! Inactive -> Activating -> Active -> Deactivating -> Inactive, driven by the
//! entry and sustain condition trees of each registered gesture. Only one
//! gesture per hand may be activating or active at a time.

use tracing::{debug, trace};

use super::definition::OneHandGestureDefinition;
use super::snapshot::GestureCheckSnapshot;
use super::{ActivationState, GestureKind, GestureState, GestureTransformCache, Hand, HandMotion};

/// A gesture definition together with its per-hand runtime state.
#[derive(Debug, Clone)]
pub struct OneHandGestureSlot {
    pub definition: OneHandGestureDefinition,
    pub state: GestureState,
    pub cache: GestureTransformCache,
    pub last_entry_failure: String,
    pub last_sustain_failure: String,
}

impl OneHandGestureSlot {
    fn new(definition: OneHandGestureDefinition) -> Self {
        Self {
            definition,
            state: GestureState::default(),
            cache: GestureTransformCache::default(),
            last_entry_failure: String::new(),
            last_sustain_failure: String::new(),
        }
    }
}

/// Inputs for one tick of a hand's gesture machine.
pub struct OneHandTickInput<'a> {
    pub now: f64,
    pub buffered: &'a GestureCheckSnapshot,
    pub frame: &'a GestureCheckSnapshot,
    pub motion: HandMotion,
    /// Casting is permitted and the hand is charged
    pub can_cast: bool,
}

/// Change of the active one-hand gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureTransition {
    pub hand: Hand,
    pub from: GestureKind,
    pub to: GestureKind,
}

#[derive(Debug, Clone)]
pub struct OneHandGestureMachine {
    hand: Hand,
    slots: Vec<OneHandGestureSlot>,
    active: Option<usize>,
}

impl OneHandGestureMachine {
    /// Register right-hand authored definitions for `hand`, mirroring them for the left hand.
    pub fn new(hand: Hand, definitions: &[OneHandGestureDefinition]) -> Self {
        Self {
            hand,
            slots: definitions
                .iter()
                .map(|d| OneHandGestureSlot::new(d.for_hand(hand)))
                .collect(),
            active: None,
        }
    }

    pub fn hand(&self) -> Hand {
        self.hand
    }

    pub fn slots(&self) -> &[OneHandGestureSlot] {
        &self.slots
    }

    pub fn slot(&self, idx: usize) -> Option<&OneHandGestureSlot> {
        self.slots.get(idx)
    }

    /// Index of the first slot registered for `kind`.
    pub fn slot_index(&self, kind: GestureKind) -> Option<usize> {
        self.slots.iter().position(|s| s.definition.kind == kind)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_kind(&self) -> GestureKind {
        self.active
            .and_then(|idx| self.slots.get(idx))
            .map(|s| s.definition.kind)
            .unwrap_or(GestureKind::NoGesture)
    }

    /// True while any gesture is activating, active or deactivating.
    pub fn is_engaged(&self) -> bool {
        self.active.is_some()
            || self
                .slots
                .iter()
                .any(|s| s.state.activation_state != ActivationState::Inactive)
    }

    /// Advance one tick. Returns whether the hand is busy with a one-hand
    /// gesture, plus the active-gesture change if one happened.
    ///
    /// `allowed` reports whether a gesture kind is currently off cooldown.
    pub fn tick(
        &mut self,
        input: &OneHandTickInput<'_>,
        allowed: impl Fn(GestureKind) -> bool,
    ) -> (bool, Option<GestureTransition>) {
        match self.active {
            None => self.attempt_enter(input, &allowed),
            Some(idx) => self.attempt_sustain(idx, input, &allowed),
        }
    }

    /// Try to enter a gesture. The first gesture whose entry conditions pass wins.
    fn attempt_enter(
        &mut self,
        input: &OneHandTickInput<'_>,
        allowed: &impl Fn(GestureKind) -> bool,
    ) -> (bool, Option<GestureTransition>) {
        if input.can_cast {
            for idx in 0..self.slots.len() {
                let kind = self.slots[idx].definition.kind;
                if !allowed(kind) {
                    continue;
                }

                if let Err(failure) = self.slots[idx]
                    .definition
                    .entry
                    .evaluate(input.buffered, input.frame)
                {
                    trace!(hand = ?self.hand, gesture = %self.slots[idx].definition.name, reason = %failure, "entry conditions not met");
                    self.slots[idx].last_entry_failure = failure.reason;
                    continue;
                }

                if self.slots[idx].state.activation_state != ActivationState::Activating {
                    self.reset_entry_state(Some(idx));
                    let slot = &mut self.slots[idx];
                    slot.state.reset();
                    slot.state.last_entry_start_time = input.now;
                    slot.cache.record_entry(&input.motion);
                    slot.state.activation_state = ActivationState::Activating;
                }

                let slot = &mut self.slots[idx];
                slot.state.gesture_distance += input.motion.delta_distance;

                let elapsed = input.now - slot.state.last_entry_start_time;
                if slot.state.gesture_distance >= slot.definition.min_entry_distance
                    && elapsed >= slot.definition.min_entry_time as f64
                {
                    slot.state.activation_state = ActivationState::Active;
                    slot.cache.record_exit(&input.motion);
                    let transition = self.set_active(Some(idx));
                    return (true, transition);
                }
                return (true, None);
            }
        }

        self.reset_entry_state(None);
        (false, None)
    }

    fn attempt_sustain(
        &mut self,
        idx: usize,
        input: &OneHandTickInput<'_>,
        allowed: &impl Fn(GestureKind) -> bool,
    ) -> (bool, Option<GestureTransition>) {
        let hand = self.hand;
        let Some(slot) = self.slots.get_mut(idx) else {
            let transition = self.set_active(None);
            return (false, transition);
        };

        let sustained = if input.can_cast && allowed(slot.definition.kind) {
            match slot.definition.sustain.evaluate(input.buffered, input.frame) {
                Ok(()) => true,
                Err(failure) => {
                    trace!(hand = ?hand, gesture = %slot.definition.name, reason = %failure, "sustain conditions not met");
                    slot.last_sustain_failure = failure.reason;
                    false
                }
            }
        } else {
            false
        };

        if sustained {
            slot.state.activation_state = ActivationState::Active;
            slot.state.gesture_distance += input.motion.delta_distance;
            slot.cache.record_exit(&input.motion);
            return (true, None);
        }

        if slot.state.activation_state != ActivationState::Deactivating {
            slot.state.last_exit_start_time = input.now;
            slot.state.activation_state = ActivationState::Deactivating;
        }

        if input.now - slot.state.last_exit_start_time >= slot.definition.min_exit_time as f64 {
            let transition = self.set_active(None);
            return (false, transition);
        }

        slot.state.gesture_distance += input.motion.delta_distance;
        (true, None)
    }

    /// Reset every slot's activation, except `keep`.
    pub fn reset_entry_state(&mut self, keep: Option<usize>) {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if Some(idx) != keep {
                slot.state.reset();
            }
        }
    }

    /// Make `idx` the active gesture (or none). Out-of-range indices clear it.
    pub fn set_active(&mut self, idx: Option<usize>) -> Option<GestureTransition> {
        let idx = idx.filter(|i| *i < self.slots.len());
        if idx == self.active {
            return None;
        }

        let from = self.active_kind();
        if let Some(old) = self.active.and_then(|i| self.slots.get_mut(i)) {
            old.state.reset();
        }
        self.active = idx;
        let to = self.active_kind();

        debug!(hand = ?self.hand, ?from, ?to, "one-hand gesture changed");
        Some(GestureTransition {
            hand: self.hand,
            from,
            to,
        })
    }

    /// Drop any gesture in progress.
    pub fn clear(&mut self) -> Option<GestureTransition> {
        self.reset_entry_state(None);
        self.set_active(None)
    }
}
