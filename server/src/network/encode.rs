//! Per-entity binary codecs and the update-packet assembler.
//!
//! Every entity type has two independent blocks: a small `partial` written
//! whenever the entity is dirty (position, direction, light flags) and a
//! heavier `full` written when it first becomes visible to an observer or
//! when its full-dirty flag is set. Fractions are quantized to 16 bits.

use std::collections::HashSet;
use std::f32::consts::PI;

use floret_shared::math::Vec2;
use floret_shared::protocol::{packet, ByteWriter};

use crate::entity::{Entity, EntityKind};
use crate::ids::EntityId;
use crate::world::GameWorld;

/// Sentinel inventory tag for an empty slot.
pub const EMPTY_SLOT_TAG: u8 = 255;

/// Update-packet header flag: world dimensions follow.
pub const FLAG_WORLD_DIMS: u8 = 0b0000_0001;

/// Player partial state byte.
pub mod player_state {
    pub const IDLE: u8 = 0;
    pub const MOVING: u8 = 1;
}

/// Player partial flag bits.
pub mod player_flags {
    pub const HURT: u8 = 0b0000_0001;
}

fn put_direction(w: &mut ByteWriter, angle: f32) {
    w.put_quantized(angle, -PI, PI);
}

/// Frequently-changing block, written without the id/tag prefix.
pub fn write_partial(w: &mut ByteWriter, entity: &Entity) {
    match &entity.kind {
        EntityKind::Player(player) => {
            w.put_vec2(entity.base.position);
            put_direction(w, player.input.direction);
            let state = if entity.base.velocity == Vec2::ZERO {
                player_state::IDLE
            } else {
                player_state::MOVING
            };
            w.put_u8(state);
            let mut flags = 0u8;
            if entity.lively.as_ref().is_some_and(|l| l.hurt) {
                flags |= player_flags::HURT;
            }
            w.put_u8(flags);
        }
        EntityKind::Petal(petal) => {
            w.put_vec2(entity.base.position);
            put_direction(w, petal.cluster_phase.rem_euclid(std::f32::consts::TAU) - PI);
        }
        EntityKind::Mob(mob) => {
            w.put_vec2(entity.base.position);
            put_direction(w, mob.direction);
        }
        EntityKind::Loot(_) => {
            w.put_vec2(entity.base.position);
        }
        EntityKind::Projectile(projectile) => {
            w.put_vec2(entity.base.position);
            put_direction(w, projectile.direction);
        }
        EntityKind::Wall(_) => {
            let bounds = entity.base.bounds();
            w.put_vec2(bounds.min());
            w.put_vec2(bounds.max());
        }
    }
}

fn health_fraction(entity: &Entity) -> f32 {
    entity.lively.as_ref().map_or(1.0, |l| l.health_fraction())
}

/// Rarely-changing block, written without the id/tag prefix. Walls have no
/// full payload at all.
pub fn write_full(w: &mut ByteWriter, entity: &Entity) {
    match &entity.kind {
        EntityKind::Player(player) => {
            w.put_quantized(health_fraction(entity), 0.0, 1.0);
            let mut flags = 0u8;
            if player.admin {
                flags |= 0b0001;
            }
            if player.spectator {
                flags |= 0b0010;
            }
            if player.invisible {
                flags |= 0b0100;
            }
            if player.frozen {
                flags |= 0b1000;
            }
            w.put_u8(flags);
            let max = entity.lively.as_ref().map_or(1.0, |l| l.max_health());
            w.put_quantized(player.shield / max, 0.0, 1.0);
            w.put_str(&player.name);
        }
        EntityKind::Petal(petal) => {
            w.put_u8(petal.def.tag);
            w.put_u8(petal.def.rarity.as_u8());
            w.put_quantized(health_fraction(entity), 0.0, 1.0);
            w.put_u16(petal.owner.0);
        }
        EntityKind::Mob(mob) => {
            w.put_u8(mob.def.tag);
            w.put_u8(mob.def.rarity.as_u8());
            w.put_quantized(health_fraction(entity), 0.0, 1.0);
            w.put_u8(u8::from(mob.follow.is_some()));
        }
        EntityKind::Loot(loot) => {
            w.put_u8(loot.def.tag);
            w.put_u8(loot.def.rarity.as_u8());
        }
        EntityKind::Projectile(projectile) => {
            w.put_u8(projectile.def.tag);
        }
        EntityKind::Wall(_) => {}
    }
}

/// Per-observer deltas computed by the visibility diff.
pub struct UpdatePlan {
    pub deletions: Vec<EntityId>,
    pub fulls: Vec<EntityId>,
    pub partials: Vec<EntityId>,
    pub send_world_dims: bool,
}

/// Assemble one observer's update datagram for a finished tick.
pub fn encode_update(world: &GameWorld, observer: EntityId, plan: &UpdatePlan) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(1024);
    w.put_u8(packet::UPDATE);
    w.put_u32(world.tick());

    let mut flags = 0u8;
    if plan.send_world_dims {
        flags |= FLAG_WORLD_DIMS;
    }
    w.put_u8(flags);
    if plan.send_world_dims {
        w.put_f32(world.width);
        w.put_f32(world.height);
    }

    w.put_u16(plan.deletions.len() as u16);
    for id in &plan.deletions {
        w.put_u16(id.0);
    }

    w.put_u16(plan.fulls.len() as u16);
    for id in &plan.fulls {
        if let Some(entity) = world.entity(*id) {
            w.put_u16(id.0);
            w.put_u8(entity.tag().as_u8());
            write_full(&mut w, entity);
            write_partial(&mut w, entity);
        }
    }

    w.put_u16(plan.partials.len() as u16);
    for id in &plan.partials {
        if let Some(entity) = world.entity(*id) {
            w.put_u16(id.0);
            w.put_u8(entity.tag().as_u8());
            write_partial(&mut w, entity);
        }
    }

    write_self_block(&mut w, world, observer);
    write_roster(&mut w, world);
    write_chat(&mut w, world);
    w.finish()
}

/// Observer-private fields: zoom, inventory snapshot, progression.
fn write_self_block(w: &mut ByteWriter, world: &GameWorld, observer: EntityId) {
    let Some(entity) = world.entity(observer) else {
        w.put_u8(0);
        return;
    };
    let Some(player) = entity.as_player() else {
        w.put_u8(0);
        return;
    };
    w.put_u8(1);
    let zoom = entity.lively.as_ref().map_or(1.0, |l| l.snapshot.zoom);
    w.put_f32(zoom);
    w.put_u32(player.score);
    w.put_u32(player.experience);
    w.put_u16(player.overlevel_secs.ceil() as u16);

    let slots = player.inventory.slots();
    w.put_u8(slots.len() as u8);
    for slot in slots {
        w.put_u8(slot.as_ref().map_or(EMPTY_SLOT_TAG, |bunch| bunch.def.tag));
    }

    w.put_u8(player.collected.len().min(255) as u8);
    for tag in player.collected.iter().take(255) {
        w.put_u8(*tag);
    }
}

/// All connected players' names and scores, sent every tick.
fn write_roster(w: &mut ByteWriter, world: &GameWorld) {
    let roster: Vec<(&str, u32, EntityId)> = world
        .entities()
        .filter_map(|e| {
            let player = e.as_player()?;
            Some((player.name.as_str(), player.score, e.id()))
        })
        .collect();
    w.put_u8(roster.len().min(255) as u8);
    for (name, score, id) in roster.into_iter().take(255) {
        w.put_str(name);
        w.put_u32(score);
        w.put_u16(id.0);
    }
}

fn write_chat(w: &mut ByteWriter, world: &GameWorld) {
    let chat = world.chat();
    w.put_u8(chat.len().min(255) as u8);
    for line in chat.iter().take(255) {
        w.put_str(line);
    }
}

/// Compute an observer's deltas from its previous known set. `visible`
/// must already be filtered to live entities.
pub fn plan_update(
    visible: &HashSet<EntityId>,
    known: &HashSet<EntityId>,
    partial_dirty: &HashSet<EntityId>,
    full_dirty: &HashSet<EntityId>,
    send_world_dims: bool,
) -> UpdatePlan {
    let deletions: Vec<EntityId> = known.difference(visible).copied().collect();
    let fulls: Vec<EntityId> = visible
        .iter()
        .filter(|id| !known.contains(id) || full_dirty.contains(id))
        .copied()
        .collect();
    let full_set: HashSet<EntityId> = fulls.iter().copied().collect();
    let partials: Vec<EntityId> = visible
        .iter()
        .filter(|id| known.contains(id) && partial_dirty.contains(id) && !full_set.contains(id))
        .copied()
        .collect();
    UpdatePlan {
        deletions,
        fulls,
        partials,
        send_world_dims,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use floret_shared::protocol::{ByteReader, EntityTag};

    fn set(ids: &[u16]) -> HashSet<EntityId> {
        ids.iter().map(|raw| EntityId(*raw)).collect()
    }

    #[test]
    fn test_plan_update_diffs_known_against_visible() {
        let visible = set(&[1, 2, 3]);
        let known = set(&[2, 3, 4]);
        let partial_dirty = set(&[3]);
        let full_dirty = set(&[2]);

        let plan = plan_update(&visible, &known, &partial_dirty, &full_dirty, false);
        assert_eq!(plan.deletions, vec![EntityId(4)]);
        // 1 is newly visible, 2 is full-dirty.
        let fulls: HashSet<EntityId> = plan.fulls.iter().copied().collect();
        assert_eq!(fulls, set(&[1, 2]));
        assert_eq!(plan.partials, vec![EntityId(3)]);
    }

    #[test]
    fn test_full_payloads_bounded_by_visibility() {
        let visible = set(&[1, 2, 3, 4, 5]);
        let known = HashSet::new();
        let everything_dirty = set(&[1, 2, 3, 4, 5, 6, 7]);

        let plan = plan_update(&visible, &known, &everything_dirty, &everything_dirty, true);
        assert!(plan.fulls.len() <= visible.len());
        assert!(plan.partials.len() <= visible.len());
        assert!(plan.deletions.is_empty());
    }

    #[test]
    fn test_partial_blocks_fit_their_budget() {
        let mut world = GameWorld::new(1000.0, 1000.0);
        world.spawn_player("codec".into(), None);
        world.spawn_mob("ladybug", Vec2::new(200.0, 200.0));
        world.spawn_wall(Vec2::new(500.0, 500.0), Vec2::new(100.0, 40.0));
        world.update(0.04);

        for entity in world.entities() {
            let mut w = ByteWriter::new();
            write_partial(&mut w, entity);
            assert!(
                w.len() <= entity.tag().partial_budget(),
                "{:?} partial exceeds budget",
                entity.tag()
            );
        }
    }

    #[test]
    fn test_update_packet_decodes_header_and_counts() {
        let mut world = GameWorld::new(1000.0, 1000.0);
        let player = world.spawn_player("reader".into(), None);
        world.update(0.04);

        let visible: HashSet<EntityId> = world.entities().map(Entity::id).collect();
        let known = HashSet::new();
        let plan = plan_update(
            &visible,
            &known,
            world.partial_dirty(),
            world.full_dirty(),
            true,
        );
        let data = encode_update(&world, player, &plan);

        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_u8(), Some(packet::UPDATE));
        assert_eq!(r.read_u32(), Some(world.tick()));
        let flags = r.read_u8().unwrap();
        assert_eq!(flags & FLAG_WORLD_DIMS, FLAG_WORLD_DIMS);
        assert_eq!(r.read_f32(), Some(1000.0));
        assert_eq!(r.read_f32(), Some(1000.0));
        assert_eq!(r.read_u16(), Some(0));
        let fulls = r.read_u16().unwrap();
        assert_eq!(usize::from(fulls), plan.fulls.len());

        // First full entry carries a valid tag byte.
        if fulls > 0 {
            let _id = r.read_u16().unwrap();
            let tag = r.read_u8().unwrap();
            assert!(EntityTag::from_u8(tag).is_some());
        }
    }
}
