//! Collision shapes shared between the simulation and the spatial index.
//!
//! Two shapes exist: circles (players, petals, mobs, loot, projectiles) and
//! axis-aligned rectangles (walls). Every shape can be projected to a
//! center + half-extent box for quadtree insertion.

use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// A collision shape, positioned by the owning entity's center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Hitbox {
    Circle { radius: f32 },
    Rect { half_extents: Vec2 },
}

impl Hitbox {
    pub fn circle(radius: f32) -> Self {
        Hitbox::Circle { radius }
    }

    pub fn rect(half_width: f32, half_height: f32) -> Self {
        Hitbox::Rect {
            half_extents: Vec2::new(half_width, half_height),
        }
    }

    /// Bounding box of this shape at `center`.
    pub fn bounds(&self, center: Vec2) -> Aabb {
        match self {
            Hitbox::Circle { radius } => Aabb {
                center,
                half_extents: Vec2::new(*radius, *radius),
            },
            Hitbox::Rect { half_extents } => Aabb {
                center,
                half_extents: *half_extents,
            },
        }
    }

    pub fn contains_point(&self, center: Vec2, point: Vec2) -> bool {
        match self {
            Hitbox::Circle { radius } => center.distance_to(point) <= *radius,
            Hitbox::Rect { half_extents } => {
                (point.x - center.x).abs() <= half_extents.x
                    && (point.y - center.y).abs() <= half_extents.y
            }
        }
    }

    /// Pairwise intersection test between two positioned shapes.
    pub fn intersects(&self, center: Vec2, other: &Hitbox, other_center: Vec2) -> bool {
        match (self, other) {
            (Hitbox::Circle { radius: ra }, Hitbox::Circle { radius: rb }) => {
                center.distance_to(other_center) <= ra + rb
            }
            (Hitbox::Circle { radius }, Hitbox::Rect { half_extents }) => {
                circle_rect_overlap(center, *radius, other_center, *half_extents)
            }
            (Hitbox::Rect { half_extents }, Hitbox::Circle { radius }) => {
                circle_rect_overlap(other_center, *radius, center, *half_extents)
            }
            (Hitbox::Rect { half_extents: ea }, Hitbox::Rect { half_extents: eb }) => {
                (center.x - other_center.x).abs() <= ea.x + eb.x
                    && (center.y - other_center.y).abs() <= ea.y + eb.y
            }
        }
    }

    /// Penetration of `self` into `other`, as a unit direction pointing from
    /// `other` toward `self` plus a depth. `None` when the shapes do not
    /// overlap. The direction degenerates to +x for exactly coincident
    /// centers so callers always get a usable push axis.
    pub fn penetration(
        &self,
        center: Vec2,
        other: &Hitbox,
        other_center: Vec2,
    ) -> Option<(Vec2, f32)> {
        if !self.intersects(center, other, other_center) {
            return None;
        }
        match (self, other) {
            (Hitbox::Circle { radius: ra }, Hitbox::Circle { radius: rb }) => {
                let delta = center - other_center;
                let dist = delta.length();
                let depth = ra + rb - dist;
                let dir = if dist > 0.0001 {
                    delta * (1.0 / dist)
                } else {
                    Vec2::new(1.0, 0.0)
                };
                Some((dir, depth))
            }
            (Hitbox::Circle { radius }, Hitbox::Rect { half_extents }) => {
                circle_rect_penetration(center, *radius, other_center, *half_extents)
            }
            (Hitbox::Rect { half_extents }, Hitbox::Circle { radius }) => {
                circle_rect_penetration(other_center, *radius, center, *half_extents)
                    .map(|(dir, depth)| (-dir, depth))
            }
            (Hitbox::Rect { half_extents: ea }, Hitbox::Rect { half_extents: eb }) => {
                // Push out along the axis of least overlap.
                let dx = center.x - other_center.x;
                let dy = center.y - other_center.y;
                let overlap_x = ea.x + eb.x - dx.abs();
                let overlap_y = ea.y + eb.y - dy.abs();
                if overlap_x < overlap_y {
                    Some((Vec2::new(dx.signum(), 0.0), overlap_x))
                } else {
                    Some((Vec2::new(0.0, dy.signum()), overlap_y))
                }
            }
        }
    }
}

fn circle_rect_overlap(circle: Vec2, radius: f32, rect: Vec2, half: Vec2) -> bool {
    let cx = circle.x.clamp(rect.x - half.x, rect.x + half.x);
    let cy = circle.y.clamp(rect.y - half.y, rect.y + half.y);
    let dx = circle.x - cx;
    let dy = circle.y - cy;
    dx * dx + dy * dy <= radius * radius
}

fn circle_rect_penetration(
    circle: Vec2,
    radius: f32,
    rect: Vec2,
    half: Vec2,
) -> Option<(Vec2, f32)> {
    let clamped = Vec2::new(
        circle.x.clamp(rect.x - half.x, rect.x + half.x),
        circle.y.clamp(rect.y - half.y, rect.y + half.y),
    );
    let delta = circle - clamped;
    let dist = delta.length();
    if dist > radius {
        return None;
    }
    if dist > 0.0001 {
        Some((delta * (1.0 / dist), radius - dist))
    } else {
        // Circle center inside the rect: push out along the nearest face.
        let to_right = half.x - (circle.x - rect.x).abs();
        let to_top = half.y - (circle.y - rect.y).abs();
        if to_right < to_top {
            Some((Vec2::new((circle.x - rect.x).signum(), 0.0), to_right + radius))
        } else {
            Some((Vec2::new(0.0, (circle.y - rect.y).signum()), to_top + radius))
        }
    }
}

/// A center + half-extent box, the quadtree's native entry type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl Aabb {
    pub fn new(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    pub fn from_corners(min: Vec2, max: Vec2) -> Self {
        Self {
            center: Vec2::new((min.x + max.x) * 0.5, (min.y + max.y) * 0.5),
            half_extents: Vec2::new((max.x - min.x) * 0.5, (max.y - min.y) * 0.5),
        }
    }

    pub fn min(&self) -> Vec2 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec2 {
        self.center + self.half_extents
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        (self.center.x - other.center.x).abs() <= self.half_extents.x + other.half_extents.x
            && (self.center.y - other.center.y).abs() <= self.half_extents.y + other.half_extents.y
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        other.min().x >= self.min().x
            && other.max().x <= self.max().x
            && other.min().y >= self.min().y
            && other.max().y <= self.max().y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_circle_intersection() {
        let a = Hitbox::circle(1.0);
        let b = Hitbox::circle(0.5);

        // No overlap
        assert!(!a.intersects(Vec2::ZERO, &b, Vec2::new(3.0, 0.0)));

        // Overlap
        assert!(a.intersects(Vec2::ZERO, &b, Vec2::new(1.2, 0.0)));
    }

    #[test]
    fn test_circle_rect_intersection() {
        let circle = Hitbox::circle(0.5);
        let rect = Hitbox::rect(1.0, 1.0);

        assert!(!circle.intersects(Vec2::new(3.0, 0.0), &rect, Vec2::ZERO));
        assert!(circle.intersects(Vec2::new(1.3, 0.0), &rect, Vec2::ZERO));
    }

    #[test]
    fn test_circle_penetration_direction() {
        let a = Hitbox::circle(1.0);
        let b = Hitbox::circle(1.0);
        let (dir, depth) = a
            .penetration(Vec2::new(1.5, 0.0), &b, Vec2::ZERO)
            .expect("circles overlap");
        assert!((dir.x - 1.0).abs() < 0.001);
        assert!((depth - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_coincident_circles_get_push_axis() {
        let a = Hitbox::circle(1.0);
        let (dir, depth) = a.penetration(Vec2::ZERO, &a, Vec2::ZERO).unwrap();
        assert!(dir.length() > 0.9);
        assert!((depth - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_aabb_overlap_and_contains() {
        let big = Aabb::new(Vec2::ZERO, Vec2::new(2.0, 2.0));
        let small = Aabb::new(Vec2::new(1.0, 1.0), Vec2::new(0.5, 0.5));
        let outside = Aabb::new(Vec2::new(5.0, 5.0), Vec2::new(0.5, 0.5));

        assert!(big.overlaps(&small));
        assert!(big.contains(&small));
        assert!(!big.overlaps(&outside));
        assert!(!small.contains(&big));
    }
}
