//! Ring search for a recovery destination around where recovery started.

use std::f32::consts::TAU;

use nalgebra::Vector3;

use super::NavQuery;
use crate::game::constants::nav::{SEARCH_POINTS_PER_RING, SEARCH_RINGS};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchQuery {
    pub center: Vector3<f32>,
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub extent: Vector3<f32>,
    /// When set, candidates must have a path to this goal
    pub reachable_goal: Option<Vector3<f32>>,
}

/// Candidate points on evenly spaced rings from the inner to the outer radius.
/// Odd rings are rotated by half a step so candidates do not line up radially.
pub fn ring_candidates(center: Vector3<f32>, inner_radius: f32, outer_radius: f32) -> Vec<Vector3<f32>> {
    let inner = inner_radius.max(0.0);
    let outer = outer_radius.max(inner);
    let step = TAU / SEARCH_POINTS_PER_RING as f32;

    let mut points = Vec::with_capacity(SEARCH_RINGS * SEARCH_POINTS_PER_RING);
    for ring in 0..SEARCH_RINGS {
        let t = if SEARCH_RINGS > 1 {
            ring as f32 / (SEARCH_RINGS - 1) as f32
        } else {
            0.5
        };
        let radius = inner + (outer - inner) * t;
        let offset = if ring % 2 == 1 { step * 0.5 } else { 0.0 };
        for i in 0..SEARCH_POINTS_PER_RING {
            let angle = offset + step * i as f32;
            points.push(center + Vector3::new(angle.cos() * radius, angle.sin() * radius, 0.0));
        }
    }
    points
}

/// Nearest navigable candidate to the query center.
pub fn find_destination<N: NavQuery + ?Sized>(nav: &N, query: &SearchQuery) -> Option<Vector3<f32>> {
    ring_candidates(query.center, query.inner_radius, query.outer_radius)
        .into_iter()
        .filter_map(|candidate| nav.project_point_to_navmesh(candidate, query.extent))
        .filter(|projected| match query.reachable_goal {
            Some(goal) => nav.path_exists(*projected, goal),
            None => true,
        })
        .min_by(|a, b| {
            let da = (a - query.center).norm_squared();
            let db = (b - query.center).norm_squared();
            da.total_cmp(&db)
        })
}
