//! Gameplay tuning constants.
//! Centralizing these keeps the samplers, gesture machines and recovery logic in agreement.

/// Kinematic sampling constants
pub mod kinematics {
    /// Default averaging window for buffered velocities, in seconds
    pub const DEFAULT_SAMPLE_WINDOW: f32 = 0.1;

    /// Ticks shorter than this are skipped entirely
    pub const MIN_TICK_DELTA: f32 = 1.0e-8;

    /// Per-axis angular velocity jump (deg/s) treated as a quaternion pole singularity.
    /// Approximate; tuned for tracked-controller rates and not a physical constant.
    pub const ANGULAR_SINGULARITY_DELTA: f32 = 500.0;

    /// Minimum magnitude (deg/s) of the new reading before the singularity fallback applies
    pub const ANGULAR_SINGULARITY_MAGNITUDE: f32 = 500.0;
}

/// Gesture evaluation constants
pub mod gesture {
    /// Tolerance for `==` comparisons, relative to the larger operand (absolute below 1.0)
    pub const EQUAL_TOLERANCE: f32 = 1.0e-4;

    /// Motion angles are mirrored around this value (degrees)
    pub const MIRROR_ANGLE: f32 = 180.0;

    /// Motion angle reported for a stationary hand
    pub const STATIONARY_MOTION_ANGLE: f32 = 90.0;
}

/// Navigation recovery constants
pub mod nav {
    /// Grace period after recovery starts before a missing destination counts as a search failure
    pub const DESTINATION_GRACE: f32 = 0.2;

    /// Default vertical extent used when projecting onto the navmesh
    pub const DEFAULT_TEST_EXTENT: [f32; 3] = [0.0, 0.0, 2048.0];

    /// Jump arcs are clamped below this to keep horizontal speed non-zero
    pub const MAX_JUMP_ARC: f32 = 0.99;

    /// Default minimum randomized jump arc
    pub const DEFAULT_MIN_JUMP_ARC: f32 = 0.25;

    /// Default maximum randomized jump arc
    pub const DEFAULT_MAX_JUMP_ARC: f32 = 0.5;

    /// Default gravity magnitude (units/s², applied along -Z)
    pub const DEFAULT_GRAVITY: f32 = 980.0;

    /// Predicted jump paths are sampled at this many steps per simulated second
    pub const PATH_TRACE_FREQUENCY: f32 = 4.0;

    /// Fraction of the jump flight traced for obstructions
    pub const DEFAULT_PATH_TRACE_FRACTION: f32 = 0.95;

    /// Distances below this are treated as coincident for projectile solving
    pub const MIN_LAUNCH_DISTANCE: f32 = 1.0e-3;

    /// Projection rays start this far above the queried point
    pub const PROJECTION_LIFT: f32 = 50.0;

    /// Number of rings sampled between inner and outer search radius
    pub const SEARCH_RINGS: usize = 3;

    /// Candidate points per search ring
    pub const SEARCH_POINTS_PER_RING: usize = 12;
}

/// Simulated agent constants
pub mod agent {
    /// Half-height of the agent capsule, measured from its center to its feet
    pub const CAPSULE_HALF_HEIGHT: f32 = 88.0;

    /// Capsule radius
    pub const CAPSULE_RADIUS: f32 = 34.0;

    /// Ground probe length below the feet used to decide landing
    pub const GROUND_PROBE: f32 = 2.0;

    /// Horizontal walking speed (units/s)
    pub const WALK_SPEED: f32 = 400.0;

    /// Distance to the goal at which walking stops
    pub const ACCEPTANCE_RADIUS: f32 = 20.0;
}
