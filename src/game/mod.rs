pub mod agent;
pub mod constants;
pub mod debug;
pub mod events;
pub mod gesture;
pub mod hand;
pub mod kinematics;
pub mod manager_tick;
pub mod nav;
pub mod player;

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::GameplayConfig;
use agent::AiCharacter;
use debug::{DebugConfig, DebugDraw, TracingDebugDraw};
use events::EventSink;
use player::PlayerCharacter;

/// Clock for one simulation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Seconds since the simulation started
    pub now: f64,
    /// Seconds since the previous tick
    pub dt: f32,
}

impl FrameTime {
    pub fn new(now: f64, dt: f32) -> Self {
        Self { now, dt }
    }

    /// The following tick, `dt` later.
    pub fn advance(self, dt: f32) -> Self {
        Self {
            now: self.now + dt as f64,
            dt,
        }
    }
}

/// Handle to the character manager state
pub type CharacterManagerHandle = Arc<CharacterManagerState>;

/// Per-character lock wrappers
pub type PlayerHandle = Arc<RwLock<PlayerCharacter>>;
pub type AgentHandle = Arc<RwLock<AiCharacter>>;

pub struct CharacterManagerState {
    /// Player characters, keyed by character id
    pub players: DashMap<Uuid, PlayerHandle>,
    /// AI characters, keyed by character id
    pub agents: DashMap<Uuid, AgentHandle>,
    /// Sink every spawned character emits into
    pub events: EventSink,
    pub debug: DebugConfig,
    pub draw: Arc<dyn DebugDraw>,
}

impl CharacterManagerState {
    pub fn new(events: EventSink, debug: DebugConfig) -> Self {
        Self {
            players: DashMap::new(),
            agents: DashMap::new(),
            events,
            debug,
            draw: Arc::new(TracingDebugDraw),
        }
    }

    pub fn with_draw(mut self, draw: Arc<dyn DebugDraw>) -> Self {
        self.draw = draw;
        self
    }

    pub fn spawn_player(&self, config: &GameplayConfig) -> Uuid {
        let player = PlayerCharacter::new(config).with_events(self.events.clone());
        let id = player.id;
        self.players.insert(id, Arc::new(RwLock::new(player)));
        info!(player = %id, "spawned player");
        id
    }

    /// Register an agent; it is wired to the shared event sink and debug drawing.
    pub fn spawn_agent(&self, agent: AiCharacter) -> Uuid {
        let agent = agent
            .with_events(self.events.clone())
            .with_debug(self.debug, Arc::clone(&self.draw));
        let id = agent.id;
        self.agents.insert(id, Arc::new(RwLock::new(agent)));
        info!(agent = %id, "spawned agent");
        id
    }

    pub fn player(&self, id: Uuid) -> Option<PlayerHandle> {
        self.players.get(&id).map(|e| e.value().clone())
    }

    pub fn agent(&self, id: Uuid) -> Option<AgentHandle> {
        self.agents.get(&id).map(|e| e.value().clone())
    }

    pub fn remove_player(&self, id: Uuid) -> bool {
        self.players.remove(&id).is_some()
    }

    pub fn remove_agent(&self, id: Uuid) -> bool {
        self.agents.remove(&id).is_some()
    }

    pub fn character_count(&self) -> usize {
        self.players.len() + self.agents.len()
    }
}

pub struct CharacterManager {
    state: CharacterManagerHandle,
    tick_rate: u64,
    time: FrameTime,
}

impl CharacterManager {
    pub fn new(tick_rate: u64, state: CharacterManagerState) -> (Self, CharacterManagerHandle) {
        let state = Arc::new(state);
        let handle = Arc::clone(&state);
        let manager = Self {
            state,
            tick_rate: tick_rate.max(1),
            time: FrameTime::new(0.0, 0.0),
        };
        (manager, handle)
    }

    pub fn time(&self) -> FrameTime {
        self.time
    }

    fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Advance the clock one tick and tick every character.
    pub fn step(&mut self) -> FrameTime {
        self.time = self.time.advance(self.tick_delta());
        manager_tick::tick_characters(&self.state, self.time);
        self.time
    }

    /// Run `ticks` ticks back to back, without waiting between them.
    pub fn run_ticks(&mut self, ticks: u64) -> FrameTime {
        for _ in 0..ticks {
            self.step();
        }
        debug!(ticks, now = self.time.now, "simulation advanced");
        self.time
    }

    /// Tick at the configured rate until `stop` returns true.
    pub fn run_until(&mut self, stop: impl Fn(&CharacterManagerState) -> bool) {
        let tick_duration = Duration::from_millis(1000 / self.tick_rate);
        while !stop(&self.state) {
            let start = Instant::now();
            self.step();
            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                thread::sleep(tick_duration - elapsed);
            }
        }
    }
}
