//! Spatial index used for the per-tick collision and visibility broad phase.
//!
//! The tree is rebuilt from scratch every tick: `reset` then one `insert`
//! per live entity. With thousands of short-lived entities this is cheaper
//! and simpler than keeping an incrementally-updated structure consistent,
//! and it removes the need for removal or rebalancing logic entirely.
//!
//! Entries straddling a split boundary are inserted into every overlapping
//! child; queries deduplicate through a hash set.

use std::collections::HashSet;

use floret_shared::hitbox::Aabb;
use floret_shared::math::Vec2;

use crate::ids::EntityId;

/// Objects per leaf before it splits.
const NODE_CAPACITY: usize = 5;

/// Maximum subdivision depth. At the cap a node stops splitting and simply
/// accumulates entries, degrading to an over-inclusive candidate list under
/// extreme clustering instead of failing.
const MAX_DEPTH: usize = 8;

#[derive(Debug)]
struct Node {
    bounds: Aabb,
    depth: usize,
    entries: Vec<(EntityId, Aabb)>,
    children: Option<Box<[Node; 4]>>,
}

impl Node {
    fn new(bounds: Aabb, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }

    fn insert(&mut self, id: EntityId, aabb: Aabb) {
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                if child.bounds.overlaps(&aabb) {
                    child.insert(id, aabb);
                }
            }
            return;
        }

        self.entries.push((id, aabb));

        if self.entries.len() > NODE_CAPACITY && self.depth < MAX_DEPTH {
            self.split();
        }
    }

    fn split(&mut self) {
        let half = Vec2::new(self.bounds.half_extents.x * 0.5, self.bounds.half_extents.y * 0.5);
        let c = self.bounds.center;
        let depth = self.depth + 1;
        let quadrant = |dx: f32, dy: f32| {
            Node::new(
                Aabb::new(Vec2::new(c.x + dx * half.x, c.y + dy * half.y), half),
                depth,
            )
        };
        let mut children = Box::new([
            quadrant(-1.0, -1.0),
            quadrant(1.0, -1.0),
            quadrant(-1.0, 1.0),
            quadrant(1.0, 1.0),
        ]);

        for (id, aabb) in self.entries.drain(..) {
            for child in children.iter_mut() {
                if child.bounds.overlaps(&aabb) {
                    child.insert(id, aabb);
                }
            }
        }
        self.children = Some(children);
    }

    fn query(&self, area: &Aabb, out: &mut HashSet<EntityId>) {
        if !self.bounds.overlaps(area) {
            return;
        }
        for (id, aabb) in &self.entries {
            if aabb.overlaps(area) {
                out.insert(*id);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query(area, out);
            }
        }
    }
}

/// The world's spatial index over entity bounding boxes.
#[derive(Debug)]
pub struct Quadtree {
    root: Node,
}

impl Quadtree {
    /// Build an empty tree covering a world of the given dimensions, with
    /// (0, 0) at the top-left corner.
    pub fn new(width: f32, height: f32) -> Self {
        let half = Vec2::new(width * 0.5, height * 0.5);
        Self {
            root: Node::new(Aabb::new(half, half), 0),
        }
    }

    /// Clear to a single root covering the world bounds.
    pub fn reset(&mut self, width: f32, height: f32) {
        let half = Vec2::new(width * 0.5, height * 0.5);
        self.root = Node::new(Aabb::new(half, half), 0);
    }

    /// Index an entity's bounding box. Boxes poking outside the world
    /// bounds are still stored at the edge nodes they overlap.
    pub fn insert(&mut self, id: EntityId, aabb: Aabb) {
        self.root.insert(id, aabb);
    }

    /// All entities whose stored box overlaps `area`, deduplicated.
    pub fn query(&self, area: &Aabb) -> Vec<EntityId> {
        let mut set = HashSet::new();
        self.root.query(area, &mut set);
        set.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_box(x: f32, y: f32, r: f32) -> Aabb {
        Aabb::new(Vec2::new(x, y), Vec2::new(r, r))
    }

    #[test]
    fn test_query_finds_all_overlapping() {
        let mut tree = Quadtree::new(1000.0, 1000.0);
        let boxes = [
            point_box(100.0, 100.0, 10.0),
            point_box(110.0, 105.0, 10.0),
            point_box(900.0, 900.0, 10.0),
            point_box(500.0, 500.0, 10.0),
        ];
        for (i, aabb) in boxes.iter().enumerate() {
            tree.insert(EntityId(i as u16), *aabb);
        }

        let hits = tree.query(&point_box(105.0, 102.0, 20.0));
        assert!(hits.contains(&EntityId(0)));
        assert!(hits.contains(&EntityId(1)));
        assert!(!hits.contains(&EntityId(2)));
    }

    #[test]
    fn test_boundary_straddler_returned_once() {
        let mut tree = Quadtree::new(1000.0, 1000.0);
        // Force splits around the center seam.
        for i in 0..20 {
            tree.insert(EntityId(i), point_box(100.0 + i as f32 * 5.0, 100.0, 4.0));
        }
        // Sits exactly on the root's split boundary: lands in several children.
        tree.insert(EntityId(99), point_box(500.0, 500.0, 30.0));

        let hits = tree.query(&point_box(500.0, 500.0, 50.0));
        let count = hits.iter().filter(|id| **id == EntityId(99)).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_completeness_against_brute_force() {
        let mut tree = Quadtree::new(1000.0, 1000.0);
        let mut boxes = Vec::new();
        // Deterministic pseudo-random scatter.
        let mut seed: u32 = 12345;
        for i in 0..200u16 {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            let x = (seed >> 8) % 1000;
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            let y = (seed >> 8) % 1000;
            let aabb = point_box(x as f32, y as f32, 8.0);
            tree.insert(EntityId(i), aabb);
            boxes.push((EntityId(i), aabb));
        }

        let area = point_box(400.0, 400.0, 150.0);
        let hits: HashSet<EntityId> = tree.query(&area).into_iter().collect();
        for (id, aabb) in &boxes {
            assert_eq!(
                hits.contains(id),
                aabb.overlaps(&area),
                "mismatch for {}",
                id
            );
        }
    }

    #[test]
    fn test_depth_cap_still_answers() {
        let mut tree = Quadtree::new(1000.0, 1000.0);
        // Pathological clustering: 100 entries at the same point.
        for i in 0..100u16 {
            tree.insert(EntityId(i), point_box(10.0, 10.0, 2.0));
        }
        let hits = tree.query(&point_box(10.0, 10.0, 5.0));
        assert_eq!(hits.len(), 100);
    }

    #[test]
    fn test_reset_clears_entries() {
        let mut tree = Quadtree::new(1000.0, 1000.0);
        tree.insert(EntityId(1), point_box(50.0, 50.0, 5.0));
        tree.reset(1000.0, 1000.0);
        assert!(tree.query(&point_box(50.0, 50.0, 20.0)).is_empty());
    }
}
