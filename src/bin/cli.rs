//! handcast CLI - check gesture libraries and run canned simulations

use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::Receiver;
use nalgebra::{UnitQuaternion, Vector3};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use handcast::config::{ConfigError, GameplayConfig};
use handcast::game::agent::{AgentCommand, AiCharacter};
use handcast::game::events::{EventSink, GameEvent};
use handcast::game::gesture::{ConditionNode, Hand};
use handcast::game::kinematics::KinematicSample;
use handcast::game::nav::{NavRecoveryAbility, NavWorld};
use handcast::game::player::{HandFrame, PlayerInput};
use handcast::game::{CharacterManager, CharacterManagerState};

#[derive(Parser)]
#[command(name = "handcast")]
#[command(about = "Hand gesture recognition and nav recovery toolkit", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a gameplay config file
    Check {
        /// Path to the gameplay TOML file
        config: PathBuf,
    },
    /// Print the mirrored left-hand condition trees as JSON
    Mirror {
        /// Path to the gameplay TOML file
        config: PathBuf,
        /// Only print this gesture
        #[arg(long)]
        gesture: Option<String>,
    },
    /// Simulate a synthetic punch and print gesture events as JSON lines
    Punch {
        /// Gameplay TOML file (default: bundled library)
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "right")]
        hand: HandArg,
        /// Hand speed during the thrust, units/s
        #[arg(long, default_value = "400")]
        speed: f32,
        /// Thrust duration in seconds
        #[arg(long, default_value = "0.3")]
        duration: f32,
        #[arg(long, default_value = "90")]
        tick_rate: u64,
    },
    /// Simulate a stranded agent and print recovery events as JSON lines
    Recover {
        /// Gameplay TOML file (default: bundled library)
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "island")]
        scenario: Scenario,
        /// Simulated seconds
        #[arg(long, default_value = "8")]
        seconds: f32,
        #[arg(long, default_value = "30")]
        tick_rate: u64,
        /// Seed for the randomized jump arc
        #[arg(long, default_value = "7")]
        seed: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum HandArg {
    Left,
    Right,
}

impl From<HandArg> for Hand {
    fn from(hand: HandArg) -> Self {
        match hand {
            HandArg::Left => Hand::Left,
            HandArg::Right => Hand::Right,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Scenario {
    /// Standing on a disconnected navmesh island
    Island,
    /// Standing on a ledge with no navmesh
    OffMesh,
}

#[derive(Debug, Error)]
enum ScenarioError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no gesture named '{0}'")]
    UnknownGesture(String),
    #[error("character {0} disappeared during the simulation")]
    MissingCharacter(uuid::Uuid),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_level.clone().into()))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Check { config } => check_config(&config),
        Commands::Mirror { config, gesture } => mirror_gestures(&config, gesture.as_deref()),
        Commands::Punch {
            config,
            hand,
            speed,
            duration,
            tick_rate,
        } => simulate_punch(config.as_deref(), hand.into(), speed, duration, tick_rate),
        Commands::Recover {
            config,
            scenario,
            seconds,
            tick_rate,
            seed,
        } => simulate_recovery(config.as_deref(), scenario, seconds, tick_rate, seed),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<GameplayConfig, ScenarioError> {
    match path {
        Some(path) => Ok(GameplayConfig::from_file(path)?),
        None => Ok(GameplayConfig::default()),
    }
}

fn print_events(events: &Receiver<GameEvent>) -> Result<usize, ScenarioError> {
    let mut count = 0;
    for event in events.try_iter() {
        println!("{}", serde_json::to_string(&event)?);
        count += 1;
    }
    Ok(count)
}

// =============================================================================
// Check / Mirror
// =============================================================================

fn check_config(path: &Path) -> Result<(), ScenarioError> {
    let config = GameplayConfig::from_file(path)?;
    info!(
        gestures = config.gestures.len(),
        static_pose = %config.poses.static_pose.name,
        dynamic_pose = %config.poses.dynamic_pose.name,
        "config is valid"
    );
    println!("{}: ok ({} gestures)", path.display(), config.gestures.len());
    Ok(())
}

#[derive(Serialize)]
struct MirroredTrees<'a> {
    name: &'a str,
    right_entry: &'a ConditionNode,
    left_entry: ConditionNode,
    right_sustain: &'a ConditionNode,
    left_sustain: ConditionNode,
}

fn mirror_gestures(path: &Path, only: Option<&str>) -> Result<(), ScenarioError> {
    let config = GameplayConfig::from_file(path)?;
    if let Some(name) = only {
        if config.gesture(name).is_none() {
            return Err(ScenarioError::UnknownGesture(name.to_string()));
        }
    }

    for gesture in config.gestures.iter().filter(|g| only.map_or(true, |n| g.name == n)) {
        let left = gesture.for_hand(Hand::Left);
        let trees = MirroredTrees {
            name: &gesture.name,
            right_entry: &gesture.entry,
            left_entry: left.entry,
            right_sustain: &gesture.sustain,
            left_sustain: left.sustain,
        };
        println!("{}", serde_json::to_string_pretty(&trees)?);
    }
    Ok(())
}

// =============================================================================
// Punch
// =============================================================================

/// Seconds the hands rest before the thrust starts
const PUNCH_LEAD_IN: f32 = 0.2;

/// Seconds simulated after the thrust ends
const PUNCH_FOLLOW_THROUGH: f32 = 0.5;

fn simulate_punch(
    config_path: Option<&Path>,
    hand: Hand,
    speed: f32,
    duration: f32,
    tick_rate: u64,
) -> Result<(), ScenarioError> {
    let config = load_config(config_path)?;
    let (sink, events) = EventSink::channel();
    let (mut manager, state) = CharacterManager::new(tick_rate, CharacterManagerState::new(sink, config.debug));
    let player_id = state.spawn_player(&config);

    // Hands rest shoulder-width apart, palms facing forward.
    let right_rest = Vector3::new(30.0, -30.0, 0.0);
    let left_rest = Vector3::new(30.0, 30.0, 0.0);
    let total = PUNCH_LEAD_IN + duration.max(0.0) + PUNCH_FOLLOW_THROUGH;
    let ticks = (total * tick_rate.max(1) as f32).ceil() as u64;
    let dt = 1.0 / tick_rate.max(1) as f32;

    for _ in 0..ticks {
        let now = manager.time().now + dt as f64;
        let thrust = ((now as f32 - PUNCH_LEAD_IN).clamp(0.0, duration.max(0.0))) * speed;
        let offset = Vector3::new(thrust, 0.0, 0.0);
        let (right, left) = match hand {
            Hand::Right => (right_rest + offset, left_rest),
            Hand::Left => (right_rest, left_rest + offset),
        };
        let frame = HandFrame {
            right: KinematicSample::new(right, UnitQuaternion::identity(), now),
            left: KinematicSample::new(left, UnitQuaternion::identity(), now),
            body: None,
        };

        let player = state.player(player_id).ok_or(ScenarioError::MissingCharacter(player_id))?;
        player.read().queue_input(PlayerInput::Frame(frame));
        manager.step();
    }

    let printed = print_events(&events)?;
    if printed == 0 {
        warn!(?hand, speed, duration, "no gesture was recognized");
    }
    Ok(())
}

// =============================================================================
// Recover
// =============================================================================

/// The goal island is centered on the origin; a small island sits across a
/// 150 unit gap on +X.
fn scenario_world() -> NavWorld {
    let mut world = NavWorld::new();
    world.add_walkable(Vector3::new(0.0, 0.0, -50.0), Vector3::new(700.0, 700.0, 50.0), 0);
    world.add_walkable(Vector3::new(1000.0, 0.0, -50.0), Vector3::new(150.0, 150.0, 50.0), 1);
    world
}

fn simulate_recovery(
    config_path: Option<&Path>,
    scenario: Scenario,
    seconds: f32,
    tick_rate: u64,
    seed: u64,
) -> Result<(), ScenarioError> {
    let config = load_config(config_path)?;
    let mut world = scenario_world();
    let mut nav_config = config.nav;

    let start = match scenario {
        Scenario::Island => {
            nav_config.ability = NavRecoveryAbility::OnNavMeshIsland;
            Vector3::new(1000.0, 0.0, 0.0)
        }
        Scenario::OffMesh => {
            // A ledge that is solid but not navigable, just off the goal island.
            world.add_obstacle(Vector3::new(300.0, 900.0, -25.0), Vector3::new(60.0, 60.0, 25.0));
            nav_config.ability = NavRecoveryAbility::OffNavMesh;
            Vector3::new(300.0, 900.0, 0.0)
        }
    };

    let (sink, events) = EventSink::channel();
    let (mut manager, state) = CharacterManager::new(tick_rate, CharacterManagerState::new(sink, config.debug));
    let agent = AiCharacter::new(Arc::new(world), nav_config, start, seed);
    agent.queue_command(AgentCommand::MoveTo { goal: [0.0, 0.0, 0.0] });
    let agent_id = state.spawn_agent(agent);

    let ticks = (seconds.max(0.0) * tick_rate.max(1) as f32).ceil() as u64;
    manager.run_ticks(ticks);
    print_events(&events)?;

    let agent = state.agent(agent_id).ok_or(ScenarioError::MissingCharacter(agent_id))?;
    let agent = agent.read();
    info!(
        feet = ?agent.feet(),
        jumps = agent.jump_count(),
        recovering = agent.controller().is_recovering(),
        "simulation finished"
    );
    Ok(())
}
