//! Entity base state and the closed entity-type union.
//!
//! Entities reference each other exclusively by id through the world
//! registry, so parent/child/summoner links never form ownership cycles;
//! destruction is removal from the registry.

use floret_shared::defs::{MobDef, PetalDef, ProjectileDef};
use floret_shared::hitbox::{Aabb, Hitbox};
use floret_shared::math::Vec2;
use floret_shared::protocol::EntityTag;

use crate::ids::EntityId;
use crate::lively::LivelyState;
use crate::mob_ai::MobAi;
use crate::inventory::Inventory;

/// Per-tick velocity retention; the rest bleeds off as drag.
pub const DRAG: f32 = 0.82;

/// Below this speed velocity snaps to exactly zero to kill jitter.
pub const VELOCITY_EPSILON: f32 = 0.05;

/// Fields common to every entity type.
#[derive(Debug)]
pub struct EntityBase {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Pending impulse, consumed by the next integration step.
    pub acceleration: Vec2,
    pub hitbox: Hitbox,
    pub destroyed: bool,
}

impl EntityBase {
    pub fn new(id: EntityId, position: Vec2, hitbox: Hitbox) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            hitbox,
            destroyed: false,
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.hitbox.bounds(self.position)
    }

    /// Damp velocity, consume the pending acceleration, integrate position.
    /// Returns true if the position observably changed.
    pub fn integrate(&mut self, dt: f32) -> bool {
        self.velocity = self.velocity * DRAG;
        self.velocity += self.acceleration;
        self.acceleration = Vec2::ZERO;

        if self.velocity.length() < VELOCITY_EPSILON {
            self.velocity = Vec2::ZERO;
            return false;
        }

        self.position += self.velocity * dt;
        true
    }

    /// Clamp circular entities inside the world. Returns true when the
    /// clamp moved the entity (the border-collision hook fires on that).
    pub fn clamp_to_world(&mut self, width: f32, height: f32) -> bool {
        let radius = match self.hitbox {
            Hitbox::Circle { radius } => radius,
            Hitbox::Rect { .. } => return false,
        };
        let clamped = Vec2::new(
            self.position.x.clamp(radius, width - radius),
            self.position.y.clamp(radius, height - radius),
        );
        if clamped != self.position {
            self.position = clamped;
            true
        } else {
            false
        }
    }
}

// =============================================================================
// Per-type payloads
// =============================================================================

/// Latest movement intent received from the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    pub direction: f32,
    pub magnitude: f32,
    pub primary: bool,
    pub secondary: bool,
}

#[derive(Debug)]
pub struct PlayerData {
    pub name: String,
    pub score: u32,
    pub experience: u32,
    pub level: u32,
    pub input: InputState,
    pub inventory: Inventory,
    /// Shared revolution angle for all petal bunches.
    pub revolution_angle: f32,
    /// Absolute shield points granted by a revive, drained before health.
    pub shield: f32,
    /// Seconds left before an overleveled player is removed from the zone.
    pub overlevel_secs: f32,
    /// Petal tags picked up this tick, flushed into the update packet.
    pub collected: Vec<u8>,
    pub reconnect_secret: u64,
    pub admin: bool,
    pub spectator: bool,
    pub invisible: bool,
    pub frozen: bool,
}

#[derive(Debug)]
pub struct MobData {
    pub def: MobDef,
    pub ai: MobAi,
    /// Facing angle in radians.
    pub direction: f32,
    /// Body segment directly ahead of this one, for centipede chains.
    pub follow: Option<EntityId>,
}

#[derive(Debug)]
pub struct PetalData {
    pub def: PetalDef,
    pub owner: EntityId,
    pub slot: u8,
    pub piece: u8,
    /// Local fast-spin phase for shown-in-one clusters.
    pub cluster_phase: f32,
}

#[derive(Debug)]
pub struct LootData {
    pub def: PetalDef,
    pub despawn_secs: f32,
}

#[derive(Debug)]
pub struct ProjectileData {
    pub def: ProjectileDef,
    pub despawn_secs: f32,
    pub direction: f32,
}

#[derive(Debug)]
pub struct WallData;

/// The closed set of entity types. Serialization codecs and tick behavior
/// are selected by this tag, keeping the dispatch exhaustiveness-checked.
#[derive(Debug)]
pub enum EntityKind {
    Player(PlayerData),
    Petal(PetalData),
    Mob(MobData),
    Loot(LootData),
    Projectile(ProjectileData),
    Wall(WallData),
}

/// One world entity: common base, optional combat layer, type payload.
#[derive(Debug)]
pub struct Entity {
    pub base: EntityBase,
    /// Present for everything that fights: players, petals, mobs,
    /// projectiles. Absent for loot and walls.
    pub lively: Option<LivelyState>,
    pub kind: EntityKind,
}

impl Entity {
    pub fn id(&self) -> EntityId {
        self.base.id
    }

    pub fn tag(&self) -> EntityTag {
        match &self.kind {
            EntityKind::Player(_) => EntityTag::Player,
            EntityKind::Petal(_) => EntityTag::Petal,
            EntityKind::Mob(_) => EntityTag::Mob,
            EntityKind::Loot(_) => EntityTag::Loot,
            EntityKind::Projectile(_) => EntityTag::Projectile,
            EntityKind::Wall(_) => EntityTag::Wall,
        }
    }

    /// Destroyed entities must not be ticked or queried again; cached ids
    /// are re-validated through this before every use.
    pub fn is_active(&self) -> bool {
        !self.base.destroyed
    }

    pub fn as_player(&self) -> Option<&PlayerData> {
        match &self.kind {
            EntityKind::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerData> {
        match &mut self.kind {
            EntityKind::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_mob(&self) -> Option<&MobData> {
        match &self.kind {
            EntityKind::Mob(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mob_mut(&mut self) -> Option<&mut MobData> {
        match &mut self.kind {
            EntityKind::Mob(m) => Some(m),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrate_applies_drag_and_impulse() {
        let mut base = EntityBase::new(EntityId(0), Vec2::ZERO, Hitbox::circle(10.0));
        base.acceleration = Vec2::new(10.0, 0.0);
        assert!(base.integrate(1.0));
        assert!((base.velocity.x - 10.0).abs() < 0.001);
        assert_eq!(base.acceleration, Vec2::ZERO);

        // No new impulse: drag bleeds speed off.
        base.integrate(1.0);
        assert!(base.velocity.x < 10.0);
    }

    #[test]
    fn test_velocity_snaps_to_zero() {
        let mut base = EntityBase::new(EntityId(0), Vec2::ZERO, Hitbox::circle(10.0));
        base.velocity = Vec2::new(VELOCITY_EPSILON * 0.5, 0.0);
        assert!(!base.integrate(1.0));
        assert_eq!(base.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_clamp_to_world_circle_only() {
        let mut circle = EntityBase::new(EntityId(0), Vec2::new(-5.0, 50.0), Hitbox::circle(10.0));
        assert!(circle.clamp_to_world(100.0, 100.0));
        assert_eq!(circle.position, Vec2::new(10.0, 50.0));
        assert!(!circle.clamp_to_world(100.0, 100.0));

        let mut wall = EntityBase::new(EntityId(1), Vec2::new(-5.0, 50.0), Hitbox::rect(20.0, 20.0));
        assert!(!wall.clamp_to_world(100.0, 100.0));
    }
}
