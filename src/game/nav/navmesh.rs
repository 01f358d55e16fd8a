//! Physics-backed navigation host.
//!
//! Walkable regions are static cuboids tagged with an island id; regions on
//! the same island are connected. Obstacles block traces but are not walkable.

use std::collections::HashMap;

use nalgebra::Vector3;
use rapier3d::prelude::*;

use super::NavQuery;
use crate::game::constants::nav::{DEFAULT_GRAVITY, DEFAULT_TEST_EXTENT, PROJECTION_LIFT};

pub struct NavWorld {
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    query_pipeline: QueryPipeline,
    /// Walkable colliders and the island they belong to
    collider_to_island: HashMap<ColliderHandle, u32>,
    gravity: f32,
}

impl Default for NavWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl NavWorld {
    pub fn new() -> Self {
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            query_pipeline: QueryPipeline::new(),
            collider_to_island: HashMap::new(),
            gravity: DEFAULT_GRAVITY,
        }
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity.abs();
        self
    }

    fn insert_cuboid(&mut self, center: Vector3<f32>, half_extents: Vector3<f32>) -> ColliderHandle {
        let collider = ColliderBuilder::new(SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z))
            .translation(center)
            .build();
        let handle = self.collider_set.insert(collider);
        self.query_pipeline.update(&self.collider_set);
        handle
    }

    /// Add a walkable block whose top face is navigable.
    pub fn add_walkable(&mut self, center: Vector3<f32>, half_extents: Vector3<f32>, island: u32) -> ColliderHandle {
        let handle = self.insert_cuboid(center, half_extents);
        self.collider_to_island.insert(handle, island);
        handle
    }

    /// Add a solid block that is not part of the navmesh.
    pub fn add_obstacle(&mut self, center: Vector3<f32>, half_extents: Vector3<f32>) -> ColliderHandle {
        self.insert_cuboid(center, half_extents)
    }

    pub fn island_count(&self) -> usize {
        let mut islands: Vec<u32> = self.collider_to_island.values().copied().collect();
        islands.sort_unstable();
        islands.dedup();
        islands.len()
    }

    /// Walkable surface under `point` within `depth`, with its island id.
    fn walkable_below(&self, point: Vector3<f32>, depth: f32) -> Option<(u32, Vector3<f32>)> {
        let ray = Ray::new(Point::from(point + Vector3::z() * PROJECTION_LIFT), vector![0.0, 0.0, -1.0]);
        let is_walkable = |handle: ColliderHandle, _: &Collider| self.collider_to_island.contains_key(&handle);
        let filter = QueryFilter::default().predicate(&is_walkable);

        let (handle, toi) = self.query_pipeline.cast_ray(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            PROJECTION_LIFT + depth,
            true,
            filter,
        )?;
        let island = *self.collider_to_island.get(&handle)?;
        Some((island, ray.point_at(toi).coords))
    }

    /// Island the point projects onto with the default test extent.
    pub fn island_at(&self, point: Vector3<f32>) -> Option<u32> {
        self.walkable_below(point, DEFAULT_TEST_EXTENT[2]).map(|(island, _)| island)
    }

    /// Height of the first solid surface below `point` within `max_drop`.
    pub fn ground_below(&self, point: Vector3<f32>, max_drop: f32) -> Option<f32> {
        let ray = Ray::new(Point::from(point), vector![0.0, 0.0, -1.0]);
        self.query_pipeline
            .cast_ray(
                &self.rigid_body_set,
                &self.collider_set,
                &ray,
                max_drop,
                true,
                QueryFilter::default(),
            )
            .map(|(_, toi)| ray.point_at(toi).z)
    }
}

impl NavQuery for NavWorld {
    fn project_point_to_navmesh(&self, point: Vector3<f32>, extent: Vector3<f32>) -> Option<Vector3<f32>> {
        self.walkable_below(point, extent.z.abs()).map(|(_, hit)| hit)
    }

    fn path_exists(&self, from: Vector3<f32>, to: Vector3<f32>) -> bool {
        match (self.island_at(from), self.island_at(to)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn trace_segment(&self, from: Vector3<f32>, to: Vector3<f32>) -> Option<Vector3<f32>> {
        let direction = to - from;
        let length = direction.norm();
        if length < 0.001 {
            return None;
        }

        let ray = Ray::new(Point::from(from), direction / length);
        self.query_pipeline
            .cast_ray(
                &self.rigid_body_set,
                &self.collider_set,
                &ray,
                length,
                true,
                QueryFilter::default(),
            )
            .map(|(_, toi)| ray.point_at(toi).coords)
    }

    fn gravity(&self) -> f32 {
        self.gravity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_islands() -> NavWorld {
        let mut world = NavWorld::new();
        // top faces at z = 0
        world.add_walkable(Vector3::new(0.0, 0.0, -50.0), Vector3::new(500.0, 500.0, 50.0), 0);
        world.add_walkable(Vector3::new(2000.0, 0.0, -50.0), Vector3::new(300.0, 300.0, 50.0), 1);
        world
    }

    #[test]
    fn test_projection_lands_on_top_face() {
        let world = two_islands();
        let extent = Vector3::from(DEFAULT_TEST_EXTENT);
        let hit = world
            .project_point_to_navmesh(Vector3::new(10.0, 20.0, 88.0), extent)
            .expect("point above island 0");
        assert!(hit.z.abs() < 1e-3, "hit at {hit:?}");
        assert!(world.project_point_to_navmesh(Vector3::new(1000.0, 0.0, 88.0), extent).is_none());
    }

    #[test]
    fn test_path_exists_only_within_an_island() {
        let world = two_islands();
        let a = Vector3::new(0.0, 0.0, 88.0);
        assert!(world.path_exists(a, Vector3::new(400.0, 0.0, 88.0)));
        assert!(!world.path_exists(a, Vector3::new(2000.0, 0.0, 88.0)));
        assert_eq!(world.island_count(), 2);
    }

    #[test]
    fn test_obstacles_block_traces_but_are_not_walkable() {
        let mut world = two_islands();
        world.add_obstacle(Vector3::new(1000.0, 0.0, 100.0), Vector3::new(10.0, 500.0, 200.0));
        let hit = world.trace_segment(Vector3::new(0.0, 0.0, 100.0), Vector3::new(2000.0, 0.0, 100.0));
        assert!(hit.is_some_and(|p| (p.x - 990.0).abs() < 1e-2));
        assert_eq!(world.island_at(Vector3::new(1000.0, 0.0, 400.0)), None);
        assert!(world.ground_below(Vector3::new(1000.0, 0.0, 400.0), 150.0).is_some());
    }
}
