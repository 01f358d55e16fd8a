//! Authored gesture definitions.

use serde::{Deserialize, Serialize};

use super::condition::ConditionNode;
use super::{GestureKind, Hand};

/// A one-hand gesture authored for the right hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHandGestureDefinition {
    pub name: String,
    pub kind: GestureKind,
    #[serde(default)]
    pub min_entry_time: f32,
    #[serde(default)]
    pub min_entry_distance: f32,
    #[serde(default)]
    pub min_exit_time: f32,
    #[serde(default)]
    pub entry: ConditionNode,
    #[serde(default)]
    pub sustain: ConditionNode,
}

impl OneHandGestureDefinition {
    pub fn new(name: impl Into<String>, kind: GestureKind, entry: ConditionNode, sustain: ConditionNode) -> Self {
        Self {
            name: name.into(),
            kind,
            min_entry_time: 0.0,
            min_entry_distance: 0.0,
            min_exit_time: 0.0,
            entry,
            sustain,
        }
    }

    pub fn with_thresholds(mut self, min_entry_time: f32, min_entry_distance: f32, min_exit_time: f32) -> Self {
        self.min_entry_time = min_entry_time;
        self.min_entry_distance = min_entry_distance;
        self.min_exit_time = min_exit_time;
        self
    }

    /// This definition as used by `hand`.
    pub fn for_hand(&self, hand: Hand) -> Self {
        match hand {
            Hand::Right => self.clone(),
            Hand::Left => Self {
                entry: self.entry.mirrored(),
                sustain: self.sustain.mirrored(),
                ..self.clone()
            },
        }
    }
}

/// Serialized form of a two-hand gesture; only the right-hand trees are authored.
#[derive(Debug, Clone, Deserialize)]
struct TwoHandGestureAuthoring {
    name: String,
    #[serde(default)]
    min_entry_time: f32,
    #[serde(default)]
    min_entry_distance: f32,
    #[serde(default)]
    min_exit_time: f32,
    #[serde(default)]
    entry: ConditionNode,
    #[serde(default)]
    sustain: ConditionNode,
}

impl From<TwoHandGestureAuthoring> for TwoHandGestureDefinition {
    fn from(raw: TwoHandGestureAuthoring) -> Self {
        TwoHandGestureDefinition::new(raw.name, raw.entry, raw.sustain).with_thresholds(
            raw.min_entry_time,
            raw.min_entry_distance,
            raw.min_exit_time,
        )
    }
}

/// A two-hand gesture. The left-hand trees are mirrored once at construction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "TwoHandGestureAuthoring")]
pub struct TwoHandGestureDefinition {
    pub name: String,
    pub min_entry_time: f32,
    /// Minimum distance each hand must cover
    pub min_entry_distance: f32,
    pub min_exit_time: f32,
    right_entry: ConditionNode,
    right_sustain: ConditionNode,
    left_entry: ConditionNode,
    left_sustain: ConditionNode,
}

impl TwoHandGestureDefinition {
    pub fn new(name: impl Into<String>, right_entry: ConditionNode, right_sustain: ConditionNode) -> Self {
        let left_entry = right_entry.mirrored();
        let left_sustain = right_sustain.mirrored();
        Self {
            name: name.into(),
            min_entry_time: 0.0,
            min_entry_distance: 0.0,
            min_exit_time: 0.0,
            right_entry,
            right_sustain,
            left_entry,
            left_sustain,
        }
    }

    pub fn with_thresholds(mut self, min_entry_time: f32, min_entry_distance: f32, min_exit_time: f32) -> Self {
        self.min_entry_time = min_entry_time;
        self.min_entry_distance = min_entry_distance;
        self.min_exit_time = min_exit_time;
        self
    }

    pub fn entry(&self, hand: Hand) -> &ConditionNode {
        match hand {
            Hand::Right => &self.right_entry,
            Hand::Left => &self.left_entry,
        }
    }

    pub fn sustain(&self, hand: Hand) -> &ConditionNode {
        match hand {
            Hand::Right => &self.right_sustain,
            Hand::Left => &self.left_sustain,
        }
    }
}
