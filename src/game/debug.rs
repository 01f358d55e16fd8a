//! Diagnostic draw calls. Nothing here affects gameplay.

use nalgebra::Vector3;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Runtime debug toggles, passed explicitly into ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub draw_gestures: bool,
    pub draw_nav_recovery: bool,
    /// Seconds a persistent shape stays on screen
    pub draw_duration: f32,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            draw_gestures: false,
            draw_nav_recovery: false,
            draw_duration: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugColor {
    Red,
    Orange,
    Green,
    Cyan,
    Yellow,
    White,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum DebugShape {
    Sphere {
        center: Vector3<f32>,
        radius: f32,
        color: DebugColor,
    },
    Line {
        from: Vector3<f32>,
        to: Vector3<f32>,
        color: DebugColor,
    },
    Text {
        at: Vector3<f32>,
        text: String,
        color: DebugColor,
    },
}

pub trait DebugDraw: Send + Sync {
    /// `duration` of zero means a single frame.
    fn draw(&self, shape: DebugShape, duration: f32);
}

/// Writes shapes to the `trace` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDebugDraw;

impl DebugDraw for TracingDebugDraw {
    fn draw(&self, shape: DebugShape, duration: f32) {
        trace!(?shape, duration, "debug draw");
    }
}

/// Keeps every shape it is given.
#[derive(Debug, Default)]
pub struct RecordingDebugDraw {
    shapes: Mutex<Vec<DebugShape>>,
}

impl RecordingDebugDraw {
    pub fn take(&self) -> Vec<DebugShape> {
        std::mem::take(&mut *self.shapes.lock())
    }
}

impl DebugDraw for RecordingDebugDraw {
    fn draw(&self, shape: DebugShape, _duration: f32) {
        self.shapes.lock().push(shape);
    }
}

static TRACING_DRAW: TracingDebugDraw = TracingDebugDraw;

/// Config plus drawing backend handed to a tick.
#[derive(Clone, Copy)]
pub struct DebugContext<'a> {
    pub config: DebugConfig,
    pub draw: &'a dyn DebugDraw,
}

impl<'a> DebugContext<'a> {
    pub fn new(config: DebugConfig, draw: &'a dyn DebugDraw) -> Self {
        Self { config, draw }
    }

    /// All categories off.
    pub fn disabled() -> DebugContext<'static> {
        DebugContext {
            config: DebugConfig::default(),
            draw: &TRACING_DRAW,
        }
    }

    pub fn nav(&self, shape: DebugShape, persistent: bool) {
        if self.config.draw_nav_recovery {
            self.draw.draw(shape, self.duration(persistent));
        }
    }

    pub fn gesture(&self, shape: DebugShape, persistent: bool) {
        if self.config.draw_gestures {
            self.draw.draw(shape, self.duration(persistent));
        }
    }

    fn duration(&self, persistent: bool) -> f32 {
        if persistent {
            self.config.draw_duration
        } else {
            0.0
        }
    }
}

impl std::fmt::Debug for DebugContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugContext").field("config", &self.config).finish()
    }
}
