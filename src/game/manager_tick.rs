use std::sync::Arc;
use uuid::Uuid;

use rayon::prelude::*;

use crate::game::debug::DebugContext;
use crate::game::{AgentHandle, CharacterManagerHandle, FrameTime, PlayerHandle};

fn process_player(state: &CharacterManagerHandle, player_handle: &PlayerHandle, time: FrameTime) {
    let draw = Arc::clone(&state.draw);
    let debug = DebugContext::new(state.debug, draw.as_ref());
    player_handle.write().tick(time, &debug);
}

fn process_agent(agent_handle: &AgentHandle, time: FrameTime) {
    agent_handle.write().tick(time);
}

/// Tick every character once. Characters are independent, so they tick in parallel.
pub fn tick_characters(state: &CharacterManagerHandle, time: FrameTime) {
    // Collect handles to avoid holding DashMap references during parallel iteration.
    let players: Vec<(Uuid, PlayerHandle)> = state
        .players
        .iter()
        .map(|e| (*e.key(), e.value().clone()))
        .collect();
    let agents: Vec<(Uuid, AgentHandle)> = state
        .agents
        .iter()
        .map(|e| (*e.key(), e.value().clone()))
        .collect();

    players
        .par_iter()
        .for_each(|(_, player_handle)| process_player(state, player_handle, time));
    agents
        .par_iter()
        .for_each(|(_, agent_handle)| process_agent(agent_handle, time));
}
