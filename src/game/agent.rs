//! Simulated AI character: walks toward a goal on the navmesh, reports path
//! results to its recovery controller and jumps when told to recover.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, info, trace};
use uuid::Uuid;

use super::constants::agent::{ACCEPTANCE_RADIUS, CAPSULE_HALF_HEIGHT, CAPSULE_RADIUS, GROUND_PROBE, WALK_SPEED};
use super::debug::{DebugConfig, DebugContext, DebugDraw, TracingDebugDraw};
use super::events::{EventSink, GameEvent};
use super::nav::projectile::{trace_jump, JumpPlan};
use super::nav::search::{find_destination, SearchQuery};
use super::nav::{
    AiBlackboard, MovementMode, NavQuery, NavRecoveryAbility, NavRecoveryConfig, NavRecoveryController,
    NavWorld, PawnStatus, RecoveryBlackboard, RecoveryHooks, RecoveryTickOutcome,
};
use super::FrameTime;

/// Commands queued from outside the tick.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentCommand {
    MoveTo { goal: [f32; 3] },
    Stop,
    /// Place the agent's feet at `feet`
    Teleport { feet: [f32; 3] },
    SetDead { dead: bool },
    SetRagdoll { ragdolling: bool },
}

/// Body state and the default recovery behavior (jumping).
struct AgentMotor {
    /// Capsule center
    location: Vector3<f32>,
    velocity: Vector3<f32>,
    movement_mode: MovementMode,
    dead: bool,
    ragdolling: bool,
    rng: StdRng,
    last_jump: Option<JumpPlan>,
    jump_count: u32,
}

impl AgentMotor {
    fn feet(&self) -> Vector3<f32> {
        self.location - Vector3::z() * CAPSULE_HALF_HEIGHT
    }

    fn status(&self) -> PawnStatus {
        PawnStatus {
            location: self.location,
            pathing_location: self.feet(),
            movement_mode: self.movement_mode,
            default_land_mode: MovementMode::Walking,
            dead: self.dead,
            ragdolling: self.ragdolling,
        }
    }

    /// Integrate a ballistic fall and land on the first surface crossed.
    fn fall(&mut self, nav: &NavWorld, dt: f32) {
        let prev_feet = self.feet();
        self.velocity.z -= nav.gravity() * dt;
        self.location += self.velocity * dt;

        if self.velocity.z > 0.0 {
            return;
        }

        let feet = self.feet();
        let probe_from = Vector3::new(feet.x, feet.y, prev_feet.z + GROUND_PROBE);
        let drop = probe_from.z - feet.z + GROUND_PROBE;
        if let Some(ground) = nav.ground_below(probe_from, drop) {
            self.location.z = ground + CAPSULE_HALF_HEIGHT;
            self.velocity = Vector3::zeros();
            self.movement_mode = MovementMode::Walking;
            debug!(location = ?self.location, "landed");
        }
    }

    /// Start falling when nothing is under the feet.
    fn check_ground(&mut self, nav: &NavWorld) {
        let feet = self.feet();
        if nav.ground_below(feet + Vector3::z() * GROUND_PROBE, GROUND_PROBE * 2.0).is_none() {
            trace!(location = ?self.location, "lost ground");
            self.movement_mode = MovementMode::Falling;
        }
    }

    /// Walk horizontally toward `goal`. Returns true on arrival.
    fn walk_toward(&mut self, goal: Vector3<f32>, dt: f32) -> bool {
        let to_goal = Vector3::new(goal.x - self.location.x, goal.y - self.location.y, 0.0);
        let dist = to_goal.norm();
        if dist <= ACCEPTANCE_RADIUS {
            return true;
        }
        let step = (WALK_SPEED * dt).min(dist);
        self.location += to_goal / dist * step;
        false
    }
}

impl RecoveryHooks for AgentMotor {
    fn tick_recovery(
        &mut self,
        nav: &dyn NavQuery,
        config: &NavRecoveryConfig,
        _dt: f32,
        _location: Vector3<f32>,
        destination: Vector3<f32>,
    ) {
        let (min_arc, max_arc) = config.jump_arc_range();
        let arc = self.rng.gen_range(min_arc..=max_arc);

        // Trace the path of a point one capsule radius above the feet so the
        // launch surface does not register as an obstruction.
        let clearance = Vector3::z() * CAPSULE_RADIUS;
        let start = self.feet() + clearance;
        let end = destination + clearance;

        match trace_jump(nav, start, end, arc, config.path_trace_fraction) {
            Some(plan) => {
                debug!(?destination, arc, velocity = ?plan.launch_velocity, "recovery jump");
                self.velocity = plan.launch_velocity;
                self.movement_mode = MovementMode::Falling;
                self.last_jump = Some(plan);
                self.jump_count += 1;
            }
            None => trace!(?destination, arc, "recovery jump rejected"),
        }
    }
}

pub struct AiCharacter {
    pub id: Uuid,
    nav: Arc<NavWorld>,
    controller: NavRecoveryController,
    blackboard: AiBlackboard,
    motor: AgentMotor,
    command_sender: Sender<AgentCommand>,
    command_receiver: Receiver<AgentCommand>,
    events: EventSink,
    debug: DebugConfig,
    draw: Arc<dyn DebugDraw>,
    last_outcome: RecoveryTickOutcome,
}

impl AiCharacter {
    /// Spawn standing with feet at `feet`.
    pub fn new(nav: Arc<NavWorld>, config: NavRecoveryConfig, feet: Vector3<f32>, seed: u64) -> Self {
        let (command_sender, command_receiver) = unbounded();
        Self {
            id: Uuid::new_v4(),
            nav,
            controller: NavRecoveryController::new(config),
            blackboard: AiBlackboard::default(),
            motor: AgentMotor {
                location: feet + Vector3::z() * CAPSULE_HALF_HEIGHT,
                velocity: Vector3::zeros(),
                movement_mode: MovementMode::Walking,
                dead: false,
                ragdolling: false,
                rng: StdRng::seed_from_u64(seed),
                last_jump: None,
                jump_count: 0,
            },
            command_sender,
            command_receiver,
            events: EventSink::disconnected(),
            debug: DebugConfig::default(),
            draw: Arc::new(TracingDebugDraw),
            last_outcome: RecoveryTickOutcome::Idle,
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_debug(mut self, debug: DebugConfig, draw: Arc<dyn DebugDraw>) -> Self {
        self.debug = debug;
        self.draw = draw;
        self
    }

    pub fn command_sender(&self) -> Sender<AgentCommand> {
        self.command_sender.clone()
    }

    pub fn queue_command(&self, command: AgentCommand) {
        // The receiver lives in self, so the send cannot fail.
        let _ = self.command_sender.send(command);
    }

    pub fn location(&self) -> Vector3<f32> {
        self.motor.location
    }

    pub fn feet(&self) -> Vector3<f32> {
        self.motor.feet()
    }

    pub fn movement_mode(&self) -> MovementMode {
        self.motor.movement_mode
    }

    pub fn controller(&self) -> &NavRecoveryController {
        &self.controller
    }

    pub fn blackboard(&self) -> &AiBlackboard {
        &self.blackboard
    }

    pub fn goal(&self) -> Option<Vector3<f32>> {
        self.blackboard.goal_location()
    }

    pub fn last_jump(&self) -> Option<&JumpPlan> {
        self.motor.last_jump.as_ref()
    }

    pub fn jump_count(&self) -> u32 {
        self.motor.jump_count
    }

    pub fn last_outcome(&self) -> RecoveryTickOutcome {
        self.last_outcome
    }

    fn apply_commands(&mut self) {
        while let Ok(command) = self.command_receiver.try_recv() {
            trace!(agent = %self.id, ?command, "agent command");
            match command {
                AgentCommand::MoveTo { goal } => self.blackboard.set_goal_location(Vector3::from(goal)),
                AgentCommand::Stop => self.blackboard.clear_goal_location(),
                AgentCommand::Teleport { feet } => {
                    self.motor.location = Vector3::from(feet) + Vector3::z() * CAPSULE_HALF_HEIGHT;
                    self.motor.velocity = Vector3::zeros();
                    self.motor.movement_mode = MovementMode::Walking;
                }
                AgentCommand::SetDead { dead } => self.motor.dead = dead,
                AgentCommand::SetRagdoll { ragdolling } => self.motor.ragdolling = ragdolling,
            }
        }
    }

    /// Request a path to the goal and walk it when one exists.
    ///
    /// Paths are requested in every movement mode; the controller decides
    /// whether a failure counts. Only walking moves the agent.
    fn follow_goal(&mut self, now: f64, dt: f32, debug: &DebugContext<'_>) {
        let Some(goal) = self.blackboard.goal_location() else {
            return;
        };
        if self.controller.is_recovering() {
            return;
        }

        let status = self.motor.status();
        if self.nav.path_exists(status.pathing_location, goal) {
            self.controller.on_path_request_success(goal, &mut self.blackboard);
            if self.motor.movement_mode == MovementMode::Walking && self.motor.walk_toward(goal, dt) {
                info!(agent = %self.id, ?goal, "reached goal");
                self.blackboard.clear_goal_location();
            }
        } else {
            self.controller.on_path_request_failed(
                now,
                goal,
                &status,
                self.nav.as_ref(),
                &mut self.blackboard,
                debug,
            );
        }
    }

    /// Stand-in for the decision logic that picks a recovery destination.
    fn search_destination(&mut self) {
        if !self.controller.is_recovering() || self.blackboard.recovery_destination().is_some() {
            return;
        }
        let state = self.controller.state();
        let island_recovery = state.started_on_valid_mesh
            && self.controller.config().ability == NavRecoveryAbility::OnNavMeshIsland;
        let (inner_radius, outer_radius) = self.blackboard.search_radii();
        let query = SearchQuery {
            center: state.start_pathing_location,
            inner_radius,
            outer_radius,
            extent: self.controller.config().test_extent(),
            reachable_goal: island_recovery.then_some(state.failed_goal),
        };
        if let Some(destination) = find_destination(self.nav.as_ref(), &query) {
            debug!(agent = %self.id, ?destination, inner_radius, outer_radius, "found recovery destination");
            self.blackboard.set_recovery_destination(destination);
        }
    }

    pub fn tick(&mut self, time: FrameTime) {
        let FrameTime { now, dt } = time;
        self.apply_commands();

        let draw = Arc::clone(&self.draw);
        let debug = DebugContext::new(self.debug, draw.as_ref());

        // Movement
        if !self.motor.dead {
            match self.motor.movement_mode {
                MovementMode::Falling => self.motor.fall(self.nav.as_ref(), dt),
                _ => self.motor.check_ground(self.nav.as_ref()),
            }
        }

        // Pathing
        if !self.motor.dead && !self.motor.ragdolling {
            self.follow_goal(now, dt, &debug);
        }

        // Recovery
        let status = self.motor.status();
        self.last_outcome = self.controller.tick(
            now,
            dt,
            &status,
            self.nav.as_ref(),
            &mut self.blackboard,
            &mut self.motor,
            &debug,
        );
        self.search_destination();

        for recovery in self.controller.drain_events() {
            self.events.emit(GameEvent::NavRecovery {
                character: self.id,
                time: now,
                recovery,
            });
        }
    }
}
