//! Recovery state machine for agents that can no longer path.
//!
//! Following -> Recovering is triggered by repeated path failures (by count,
//! or by time when the count threshold is disabled) or immediately when the
//! agent is found off the navmesh. While recovering, the controller waits
//! for the blackboard to provide a destination, grows the search radii while
//! none is found, runs a throttled recovery action toward it, and gives up
//! after `max_recovery_attempt_time`.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::{NavQuery, PawnStatus, RecoveryBlackboard};
use crate::game::constants::nav::{
    DEFAULT_MAX_JUMP_ARC, DEFAULT_MIN_JUMP_ARC, DEFAULT_PATH_TRACE_FRACTION, DEFAULT_TEST_EXTENT, DESTINATION_GRACE,
};
use crate::game::debug::{DebugColor, DebugContext, DebugShape};

/// Which kinds of stranding an agent can recover from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavRecoveryAbility {
    /// Only recover when fully off the navmesh
    OffNavMesh,
    /// Also recover when stuck on a disconnected island of valid navmesh
    #[default]
    OnNavMeshIsland,
}

/// Tuning for one recovery classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavRecoverySettings {
    /// Failures before recovery starts; 0 disables the count threshold
    pub failure_count_until_recovery: u32,
    /// Seconds of failing before recovery starts, used when the count threshold is disabled
    pub failure_time_until_recovery: f32,
    pub max_recovery_attempt_time: f32,
    pub search_inner_radius: f32,
    pub search_outer_radius: f32,
    pub search_radius_growth_rate_inner: f32,
    pub search_radius_growth_rate_outer: f32,
    /// Ticks skipped between recovery actions
    pub skip_frames: u32,
}

impl Default for NavRecoverySettings {
    fn default() -> Self {
        Self {
            failure_count_until_recovery: 0,
            failure_time_until_recovery: 4.0,
            max_recovery_attempt_time: 5.0,
            search_inner_radius: 100.0,
            search_outer_radius: 300.0,
            search_radius_growth_rate_inner: 200.0,
            search_radius_growth_rate_outer: 500.0,
            skip_frames: 1,
        }
    }
}

impl NavRecoverySettings {
    /// Defaults for an agent stranded on a navmesh island.
    pub fn island() -> Self {
        Self {
            failure_count_until_recovery: 0,
            failure_time_until_recovery: 4.0,
            max_recovery_attempt_time: 3.0,
            search_inner_radius: 200.0,
            search_outer_radius: 400.0,
            search_radius_growth_rate_inner: 25.0,
            search_radius_growth_rate_outer: 50.0,
            skip_frames: 1,
        }
    }

    fn default_island() -> Self {
        Self::island()
    }
}

/// Controller-wide recovery configuration (`[nav]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavRecoveryConfig {
    #[serde(default)]
    pub ability: NavRecoveryAbility,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_min_jump_arc")]
    pub min_jump_arc: f32,
    #[serde(default = "default_max_jump_arc")]
    pub max_jump_arc: f32,
    #[serde(default = "default_path_trace_fraction")]
    pub path_trace_fraction: f32,
    #[serde(default = "default_test_extent")]
    pub test_extent: [f32; 3],
    #[serde(default = "default_destination_grace")]
    pub destination_grace: f32,
    #[serde(default)]
    pub off_mesh: NavRecoverySettings,
    /// Fields omitted from a partial `[nav.island]` table take the off-mesh defaults.
    #[serde(default = "NavRecoverySettings::default_island")]
    pub island: NavRecoverySettings,
}

fn default_enabled() -> bool {
    true
}

fn default_min_jump_arc() -> f32 {
    DEFAULT_MIN_JUMP_ARC
}

fn default_max_jump_arc() -> f32 {
    DEFAULT_MAX_JUMP_ARC
}

fn default_path_trace_fraction() -> f32 {
    DEFAULT_PATH_TRACE_FRACTION
}

fn default_test_extent() -> [f32; 3] {
    DEFAULT_TEST_EXTENT
}

fn default_destination_grace() -> f32 {
    DESTINATION_GRACE
}

impl Default for NavRecoveryConfig {
    fn default() -> Self {
        Self {
            ability: NavRecoveryAbility::default(),
            enabled: true,
            min_jump_arc: DEFAULT_MIN_JUMP_ARC,
            max_jump_arc: DEFAULT_MAX_JUMP_ARC,
            path_trace_fraction: DEFAULT_PATH_TRACE_FRACTION,
            test_extent: DEFAULT_TEST_EXTENT,
            destination_grace: DESTINATION_GRACE,
            off_mesh: NavRecoverySettings::default(),
            island: NavRecoverySettings::island(),
        }
    }
}

impl NavRecoveryConfig {
    pub fn test_extent(&self) -> Vector3<f32> {
        Vector3::from(self.test_extent)
    }

    /// Jump arc range, ordered low to high.
    pub fn jump_arc_range(&self) -> (f32, f32) {
        (
            self.min_jump_arc.min(self.max_jump_arc),
            self.min_jump_arc.max(self.max_jump_arc),
        )
    }
}

/// Failure tracking and the active recovery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NavRecoveryState {
    /// Recovering
    pub failed: bool,
    pub started_on_valid_mesh: bool,
    pub start_time: f64,
    pub start_location: Vector3<f32>,
    pub start_pathing_location: Vector3<f32>,
    pub failed_goal: Vector3<f32>,
    pub failure_count: u32,
    pub first_failure_time: Option<f64>,
    /// Recovery ticks seen since the attempt started, skipped ones included
    pub counter: u64,
}

/// What the host wants after a recovery attempt timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryFailedResponse {
    /// Clear everything so a fresh attempt can start
    #[default]
    Reset,
    /// Keep recovering; the timeout fires again next tick
    Retain,
}

/// Extension points invoked while recovering.
pub trait RecoveryHooks {
    /// Recovery action for a non-skipped tick, e.g. jumping toward `destination`.
    fn tick_recovery(
        &mut self,
        nav: &dyn NavQuery,
        config: &NavRecoveryConfig,
        dt: f32,
        location: Vector3<f32>,
        destination: Vector3<f32>,
    );

    /// No destination is available yet. Grows the search radii by default.
    fn failed_to_find_destination(
        &mut self,
        settings: &NavRecoverySettings,
        blackboard: &mut dyn RecoveryBlackboard,
        dt: f32,
        _location: Vector3<f32>,
        _elapsed: f32,
    ) {
        grow_search_radii(settings, blackboard, dt);
    }

    fn recovery_failed(
        &mut self,
        _location: Vector3<f32>,
        _elapsed: f32,
        _started_on_valid_mesh: bool,
    ) -> RecoveryFailedResponse {
        RecoveryFailedResponse::Reset
    }
}

/// Grow the blackboard search radii by `rate * dt`, never letting the inner
/// radius grow faster than the outer one.
pub fn grow_search_radii(settings: &NavRecoverySettings, blackboard: &mut dyn RecoveryBlackboard, dt: f32) {
    let outer_growth = (settings.search_radius_growth_rate_outer * dt).max(0.0);
    let inner_growth = (settings.search_radius_growth_rate_inner * dt).max(0.0).min(outer_growth);
    let (inner, outer) = blackboard.search_radii();
    trace!(inner, outer, inner_growth, outer_growth, "growing recovery search radii");
    blackboard.set_search_radii(inner + inner_growth, outer + outer_growth);
}

/// Why a path failure did not count toward recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoredReason {
    AlreadyRecovering,
    PathNotExpected,
}

/// Lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavRecoveryEvent {
    Started {
        location: Vector3<f32>,
        goal: Vector3<f32>,
        on_valid_mesh: bool,
        inner_radius: f32,
        outer_radius: f32,
    },
    Tick {
        location: Vector3<f32>,
        destination: Vector3<f32>,
    },
    Recovered {
        location: Vector3<f32>,
        goal: Vector3<f32>,
    },
    FailedToFindDestination {
        location: Vector3<f32>,
        elapsed: f32,
    },
    RecoveryFailed {
        location: Vector3<f32>,
        elapsed: f32,
        started_on_valid_mesh: bool,
    },
    PathFailureIgnored {
        reason: IgnoredReason,
    },
    RecoverySuppressed {
        failure_count: u32,
    },
}

/// Result of reporting a failed path request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathFailureOutcome {
    Disabled,
    AlreadyRecovering,
    /// Counters were cleared because a path was not expected to succeed
    NotExpected,
    /// Counted; not enough to start recovering
    Counted { failure_count: u32 },
    /// On-mesh with off-mesh-only ability
    Suppressed { failure_count: u32 },
    Started { on_valid_mesh: bool },
}

impl PathFailureOutcome {
    pub fn is_recovering(&self) -> bool {
        matches!(self, PathFailureOutcome::Started { .. } | PathFailureOutcome::AlreadyRecovering)
    }
}

/// What a recovery tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryTickOutcome {
    /// Not recovering
    Idle,
    /// Recovering, but not in the expected ground mode
    Waiting,
    AwaitingDestination,
    FailedToFindDestination,
    Recovered,
    Attempted,
    Skipped,
    RecoveryFailed(RecoveryFailedResponse),
}

#[derive(Debug, Clone)]
pub struct NavRecoveryController {
    config: NavRecoveryConfig,
    state: NavRecoveryState,
    events: Vec<NavRecoveryEvent>,
}

impl NavRecoveryController {
    pub fn new(config: NavRecoveryConfig) -> Self {
        Self {
            config,
            state: NavRecoveryState::default(),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &NavRecoveryConfig {
        &self.config
    }

    pub fn state(&self) -> &NavRecoveryState {
        &self.state
    }

    pub fn is_recovering(&self) -> bool {
        self.state.failed
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn set_ability(&mut self, ability: NavRecoveryAbility) {
        self.config.ability = ability;
    }

    pub fn drain_events(&mut self) -> Vec<NavRecoveryEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_failing_from_valid_mesh(&self) -> bool {
        self.state.failed && self.state.started_on_valid_mesh
    }

    /// Island settings while failing from a valid mesh with island ability, else off-mesh settings.
    pub fn current_settings(&self) -> &NavRecoverySettings {
        if self.is_failing_from_valid_mesh() && self.config.ability == NavRecoveryAbility::OnNavMeshIsland {
            &self.config.island
        } else {
            &self.config.off_mesh
        }
    }

    /// Reset failure tracking and end any recovery attempt.
    pub fn clear(&mut self, blackboard: &mut dyn RecoveryBlackboard) {
        self.state = NavRecoveryState::default();
        blackboard.clear_recovery_destination();
    }

    pub fn on_path_request_failed(
        &mut self,
        now: f64,
        goal: Vector3<f32>,
        pawn: &PawnStatus,
        nav: &dyn NavQuery,
        blackboard: &mut dyn RecoveryBlackboard,
        debug: &DebugContext<'_>,
    ) -> PathFailureOutcome {
        if !self.config.enabled {
            return PathFailureOutcome::Disabled;
        }

        if self.state.failed {
            warn!(location = ?pawn.location, ?goal, "path request failed while already recovering");
            self.events.push(NavRecoveryEvent::PathFailureIgnored {
                reason: IgnoredReason::AlreadyRecovering,
            });
            return PathFailureOutcome::AlreadyRecovering;
        }

        if !pawn.expects_successful_path() {
            trace!(location = ?pawn.location, ?goal, "ignoring path failure, success not expected");
            self.clear(blackboard);
            self.events.push(NavRecoveryEvent::PathFailureIgnored {
                reason: IgnoredReason::PathNotExpected,
            });
            return PathFailureOutcome::NotExpected;
        }

        debug!(location = ?pawn.location, ?goal, "path request failed");
        debug.nav(
            DebugShape::Line {
                from: pawn.location,
                to: goal,
                color: DebugColor::Orange,
            },
            false,
        );

        self.state.failure_count += 1;
        let first_failure = *self.state.first_failure_time.get_or_insert(now);

        let settings = self.current_settings();
        let mut should_start = if settings.failure_count_until_recovery > 0 {
            self.state.failure_count >= settings.failure_count_until_recovery
        } else {
            settings.failure_time_until_recovery > 0.0
                && (now - first_failure) as f32 >= settings.failure_time_until_recovery
        };

        let on_mesh = nav
            .project_point_to_navmesh(pawn.location, self.config.test_extent())
            .is_some();
        if !on_mesh {
            should_start = true;
        } else if self.config.ability == NavRecoveryAbility::OffNavMesh {
            if should_start {
                debug!(location = ?pawn.location, "on mesh with off-mesh-only recovery, not recovering");
                self.events.push(NavRecoveryEvent::RecoverySuppressed {
                    failure_count: self.state.failure_count,
                });
                return PathFailureOutcome::Suppressed {
                    failure_count: self.state.failure_count,
                };
            }
            should_start = false;
        }

        if should_start {
            self.start_recovery(now, goal, on_mesh, pawn, blackboard, debug);
            PathFailureOutcome::Started { on_valid_mesh: on_mesh }
        } else {
            PathFailureOutcome::Counted {
                failure_count: self.state.failure_count,
            }
        }
    }

    fn start_recovery(
        &mut self,
        now: f64,
        goal: Vector3<f32>,
        on_mesh: bool,
        pawn: &PawnStatus,
        blackboard: &mut dyn RecoveryBlackboard,
        debug: &DebugContext<'_>,
    ) {
        self.clear(blackboard);
        self.state.failed = true;
        self.state.started_on_valid_mesh = on_mesh;
        self.state.start_time = now;
        self.state.start_location = pawn.location;
        self.state.start_pathing_location = pawn.pathing_location;
        self.state.failed_goal = goal;

        let settings = *self.current_settings();
        blackboard.set_search_radii(settings.search_inner_radius, settings.search_outer_radius);

        let distance = (pawn.location - goal).norm();
        warn!(location = ?pawn.location, ?goal, distance, on_valid_mesh = on_mesh, "failed navigation, starting recovery");
        debug.nav(
            DebugShape::Line {
                from: pawn.location,
                to: goal,
                color: DebugColor::Red,
            },
            true,
        );

        let (inner_radius, outer_radius) = blackboard.search_radii();
        self.events.push(NavRecoveryEvent::Started {
            location: pawn.location,
            goal,
            on_valid_mesh: on_mesh,
            inner_radius,
            outer_radius,
        });
    }

    /// A path request succeeded: re-signal `goal` if recovering, then reset.
    pub fn on_path_request_success(&mut self, goal: Vector3<f32>, blackboard: &mut dyn RecoveryBlackboard) {
        if self.state.failed {
            blackboard.set_goal_location(goal);
        }
        self.clear(blackboard);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        now: f64,
        dt: f32,
        pawn: &PawnStatus,
        nav: &dyn NavQuery,
        blackboard: &mut dyn RecoveryBlackboard,
        hooks: &mut dyn RecoveryHooks,
        debug: &DebugContext<'_>,
    ) -> RecoveryTickOutcome {
        if !self.state.failed || pawn.dead {
            return RecoveryTickOutcome::Idle;
        }

        let location = pawn.location;
        let elapsed = (now - self.state.start_time) as f32;
        let settings = *self.current_settings();

        if elapsed >= settings.max_recovery_attempt_time {
            warn!(?location, elapsed, on_valid_mesh = self.state.started_on_valid_mesh, "recovery has failed");
            self.events.push(NavRecoveryEvent::RecoveryFailed {
                location,
                elapsed,
                started_on_valid_mesh: self.state.started_on_valid_mesh,
            });
            let response = hooks.recovery_failed(location, elapsed, self.state.started_on_valid_mesh);
            if response == RecoveryFailedResponse::Reset {
                self.clear(blackboard);
            }
            return RecoveryTickOutcome::RecoveryFailed(response);
        }

        if !pawn.expects_successful_path() {
            trace!(?location, mode = ?pawn.movement_mode, "recovery tick skipped outside ground mode");
            return RecoveryTickOutcome::Waiting;
        }

        let Some(destination) = blackboard.recovery_destination() else {
            if elapsed > self.config.destination_grace {
                trace!(?location, elapsed, "no recovery destination set");
                debug.nav(
                    DebugShape::Sphere {
                        center: location,
                        radius: crate::game::constants::agent::CAPSULE_RADIUS,
                        color: DebugColor::Red,
                    },
                    false,
                );
                self.events.push(NavRecoveryEvent::FailedToFindDestination { location, elapsed });
                hooks.failed_to_find_destination(&settings, blackboard, dt, location, elapsed);
                return RecoveryTickOutcome::FailedToFindDestination;
            }
            return RecoveryTickOutcome::AwaitingDestination;
        };

        if self.has_recovered(location, nav) {
            let goal = self.state.failed_goal;
            info!(?location, ?goal, on_valid_mesh = self.state.started_on_valid_mesh, "regained navmesh");
            debug.nav(
                DebugShape::Line {
                    from: location,
                    to: destination,
                    color: DebugColor::Green,
                },
                true,
            );
            self.events.push(NavRecoveryEvent::Recovered { location, goal });
            self.on_path_request_success(goal, blackboard);
            return RecoveryTickOutcome::Recovered;
        }

        let run = settings.skip_frames == 0 || self.state.counter % (settings.skip_frames as u64 + 1) == 0;
        self.state.counter += 1;

        if !run {
            trace!(?location, ?destination, "recovery action skipped this tick");
            return RecoveryTickOutcome::Skipped;
        }

        trace!(?location, ?destination, dist = (location - destination).norm(), "recovery tick");
        debug.nav(
            DebugShape::Line {
                from: location,
                to: destination,
                color: DebugColor::Cyan,
            },
            false,
        );
        self.events.push(NavRecoveryEvent::Tick { location, destination });
        hooks.tick_recovery(nav, &self.config, dt, location, destination);
        RecoveryTickOutcome::Attempted
    }

    /// Off-mesh recovery succeeds once the agent projects onto the navmesh;
    /// island recovery succeeds once the failed goal is reachable.
    fn has_recovered(&self, location: Vector3<f32>, nav: &dyn NavQuery) -> bool {
        if self.config.ability == NavRecoveryAbility::OffNavMesh || !self.state.started_on_valid_mesh {
            nav.project_point_to_navmesh(location, self.config.test_extent()).is_some()
        } else {
            nav.path_exists(location, self.state.failed_goal)
        }
    }
}
