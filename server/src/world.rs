//! Game world: entity registry and the fixed-tick simulation loop.
//!
//! All cross-entity references are ids resolved through the registry, so
//! every phase collects the data it needs immutably first and applies
//! mutations in a second pass. Cached ids (AI targets, collision pairs,
//! parent links) are re-validated through `is_active` before use; a stale
//! id is skipped, never an error.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use rand::Rng;

use floret_shared::defs::{
    get_mob_by_id, get_mob_definitions, get_petal_by_id, get_projectile_by_id, ExpireSpawn,
    HitEffect, MobCategory, MobDef, Modifier, PetalDef, PoisonSpec, Rarity,
};
use floret_shared::hitbox::{Aabb, Hitbox};
use floret_shared::math::Vec2;
use floret_shared::protocol::{PlayerAction, BASE_SLOTS, MAX_SLOTS};

use crate::effects::Effect;
use crate::entity::{
    Entity, EntityBase, EntityKind, InputState, LootData, MobData, PetalData, PlayerData,
    ProjectileData, WallData, DRAG,
};
use crate::ids::{EntityId, IdAllocator};
use crate::inventory::{advance_revolution, Inventory, CLUSTER_SPIN_SPEED};
use crate::lively::{DamageKind, LivelyState, Team};
use crate::mob_ai::{AiContext, MobAi, TargetInfo};
use crate::modifiers::account_modifier;
use crate::quadtree::Quadtree;

// =============================================================================
// Tuning constants
// =============================================================================

pub const PLAYER_HEALTH: f32 = 150.0;
pub const PLAYER_RADIUS: f32 = 25.0;
pub const PLAYER_BODY_DAMAGE: f32 = 25.0;
/// Terminal player speed in units per second at full input.
pub const PLAYER_SPEED: f32 = 280.0;

/// Mobs the population keeper steers toward.
const TARGET_MOB_COUNT: usize = 40;
/// At most this many mobs respawn per tick.
const MOB_RESPAWNS_PER_TICK: usize = 2;

const LOOT_DESPAWN_SECS: f32 = 30.0;
/// Forced-retreat duration after a segment chain breaks.
const SEGMENT_BREAK_BACKING_SECS: f32 = 1.5;
/// Center distance between chained body segments, in radii.
const SEGMENT_SPACING: f32 = 1.7;

/// Fraction of separation depth converted into velocity exchange.
const VELOCITY_TRANSFER: f32 = 0.35;

/// Petal position easing toward its orbit point per tick.
const PETAL_SLAVE_RATE: f32 = 0.45;

const EXPERIENCE_PER_LEVEL: u32 = 100;
/// Shield fraction granted by a consumed revive.
const REVIVE_SHIELD_FRACTION: f32 = 0.5;
/// Immovable weight used for walls in separation.
const WALL_WEIGHT: f32 = 100_000.0;

pub struct GameWorld {
    pub width: f32,
    pub height: f32,
    entities: HashMap<EntityId, Entity>,
    ids: IdAllocator,
    quadtree: Quadtree,
    /// Memoized per-entity overlap lists, valid for the current tick only.
    collision_cache: HashMap<EntityId, Vec<EntityId>>,
    /// Unordered pairs whose combat has been resolved this tick.
    dealt_pairs: HashSet<(EntityId, EntityId)>,
    /// Latest damager per victim, for kill attribution.
    killers: HashMap<EntityId, EntityId>,
    partial_dirty: HashSet<EntityId>,
    full_dirty: HashSet<EntityId>,
    removed_this_tick: Vec<EntityId>,
    chat: Vec<String>,
    tick: u32,
}

impl GameWorld {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            entities: HashMap::new(),
            ids: IdAllocator::new(),
            quadtree: Quadtree::new(width, height),
            collision_cache: HashMap::new(),
            dealt_pairs: HashSet::new(),
            killers: HashMap::new(),
            partial_dirty: HashSet::new(),
            full_dirty: HashSet::new(),
            removed_this_tick: Vec::new(),
            chat: Vec::new(),
            tick: 0,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id).filter(|e| e.is_active())
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id).filter(|e| e.is_active())
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|e| e.is_active())
    }

    pub fn partial_dirty(&self) -> &HashSet<EntityId> {
        &self.partial_dirty
    }

    pub fn full_dirty(&self) -> &HashSet<EntityId> {
        &self.full_dirty
    }

    pub fn removed_this_tick(&self) -> &[EntityId] {
        &self.removed_this_tick
    }

    pub fn chat(&self) -> &[String] {
        &self.chat
    }

    pub fn push_chat(&mut self, line: String) {
        self.chat.push(line);
    }

    /// Deduplicated ids whose bounds overlap the given area.
    pub fn query_area(&self, center: Vec2, radius: f32) -> Vec<EntityId> {
        let area = Aabb::new(center, Vec2::new(radius, radius));
        self.quadtree.query(&area)
    }

    /// Memoized overlap list for one entity, filled during the tick.
    pub fn collisions(&self, id: EntityId) -> &[EntityId] {
        self.collision_cache.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Walk the parent chain to the ultimate responsible actor. A petal's
    /// damage credits its player; a player's own top parent is itself.
    pub fn top_parent(&self, id: EntityId) -> EntityId {
        let mut current = id;
        // Parent chains are shallow; the bound guards against a stale cycle.
        for _ in 0..8 {
            let parent = self
                .entities
                .get(&current)
                .and_then(|e| e.lively.as_ref())
                .and_then(|l| l.parent);
            match parent {
                Some(parent) if self.entity(parent).is_some() => current = parent,
                _ => break,
            }
        }
        current
    }

    pub fn find_player_by_secret(&self, secret: u64) -> Option<EntityId> {
        self.entities().find_map(|e| match e.as_player() {
            Some(player) if player.reconnect_secret == secret => Some(e.id()),
            _ => None,
        })
    }

    // =========================================================================
    // Spawning
    // =========================================================================

    fn insert_entity(&mut self, entity: Entity) -> EntityId {
        let id = entity.id();
        self.entities.insert(id, entity);
        self.full_dirty.insert(id);
        id
    }

    pub fn spawn_player(&mut self, name: String, loadout: Option<Vec<String>>) -> EntityId {
        let mut rng = rand::thread_rng();
        let position = self.random_position(PLAYER_RADIUS, &mut rng);
        let id = self.ids.allocate();

        let mut inventory = Inventory::new(BASE_SLOTS);
        let petal_ids = loadout.unwrap_or_else(|| vec!["basic".to_string(); 5]);
        for petal_id in petal_ids.iter().take(usize::from(MAX_SLOTS)) {
            if let Some(def) = get_petal_by_id(petal_id) {
                inventory.equip_first_free(def);
            }
        }

        let mut lively = LivelyState::new(
            PLAYER_HEALTH,
            Team(u32::from(id.0) + 1),
            Some(PLAYER_BODY_DAMAGE),
            3.0,
            4.0,
        );
        lively.knockback = 4.0;

        let entity = Entity {
            base: EntityBase::new(id, position, Hitbox::circle(PLAYER_RADIUS)),
            lively: Some(lively),
            kind: EntityKind::Player(PlayerData {
                name: name.clone(),
                score: 0,
                experience: 0,
                level: 1,
                input: InputState::default(),
                inventory,
                revolution_angle: 0.0,
                shield: 0.0,
                overlevel_secs: 0.0,
                collected: Vec::new(),
                reconnect_secret: rng.gen(),
                admin: false,
                spectator: false,
                invisible: false,
                frozen: false,
            }),
        };
        info!("player {} joined as {}", name, id);
        self.insert_entity(entity)
    }

    /// Spawn a mob (and its body segments, for chained definitions).
    /// Returns the head id, or None for an unknown definition.
    pub fn spawn_mob(&mut self, def_id: &str, position: Vec2) -> Option<EntityId> {
        let def = get_mob_by_id(def_id)?;
        let segments = def.segments;
        let head = self.spawn_mob_part(def.clone(), position, None);

        let mut ahead = head;
        for index in 1..=segments {
            let offset = Vec2::new(-(f32::from(index)) * def.radius * SEGMENT_SPACING, 0.0);
            ahead = self.spawn_mob_part(def.clone(), position + offset, Some(ahead));
        }
        debug!("spawned mob {} at {:?}", def_id, position);
        Some(head)
    }

    fn spawn_mob_part(&mut self, def: MobDef, position: Vec2, follow: Option<EntityId>) -> EntityId {
        let mut rng = rand::thread_rng();
        let id = self.ids.allocate();
        let mut lively = LivelyState::new(def.health, Team::MOBS, def.damage, def.weight, def.knockback);
        lively.constant = def.constant.clone();

        let entity = Entity {
            base: EntityBase::new(id, position, Hitbox::circle(def.radius)),
            lively: Some(lively),
            kind: EntityKind::Mob(MobData {
                ai: MobAi::new(&def, &mut rng),
                def,
                direction: 0.0,
                follow,
            }),
        };
        self.insert_entity(entity)
    }

    pub fn spawn_loot(&mut self, def: PetalDef, position: Vec2) -> EntityId {
        let id = self.ids.allocate();
        let radius = def.radius.max(8.0);
        let entity = Entity {
            base: EntityBase::new(id, position, Hitbox::circle(radius)),
            lively: None,
            kind: EntityKind::Loot(LootData {
                def,
                despawn_secs: LOOT_DESPAWN_SECS,
            }),
        };
        self.insert_entity(entity)
    }

    pub fn spawn_projectile(
        &mut self,
        def_id: &str,
        position: Vec2,
        direction: Vec2,
        owner: EntityId,
    ) -> Option<EntityId> {
        let def = get_projectile_by_id(def_id)?;
        let team = self
            .entities
            .get(&owner)
            .and_then(|e| e.lively.as_ref())
            .map_or(Team::MOBS, |l| l.team);
        let top = self.top_parent(owner);

        let id = self.ids.allocate();
        let mut lively = LivelyState::new(def.health, team, Some(def.damage), def.weight, def.knockback);
        lively.summoner = Some(top);

        let mut base = EntityBase::new(id, position, Hitbox::circle(def.radius));
        base.velocity = direction * def.speed;
        let entity = Entity {
            base,
            lively: Some(lively),
            kind: EntityKind::Projectile(ProjectileData {
                despawn_secs: def.despawn_secs,
                direction: direction.angle(),
                def,
            }),
        };
        Some(self.insert_entity(entity))
    }

    pub fn spawn_wall(&mut self, center: Vec2, half_extents: Vec2) -> EntityId {
        let id = self.ids.allocate();
        let entity = Entity {
            base: EntityBase::new(id, center, Hitbox::rect(half_extents.x, half_extents.y)),
            lively: None,
            kind: EntityKind::Wall(WallData),
        };
        self.insert_entity(entity)
    }

    fn spawn_petal(&mut self, owner: EntityId, slot: u8, piece: u8, def: PetalDef) -> EntityId {
        let (position, team) = match self.entities.get(&owner) {
            Some(e) => (
                e.base.position,
                e.lively.as_ref().map_or(Team::MOBS, |l| l.team),
            ),
            None => (Vec2::ZERO, Team::MOBS),
        };
        let id = self.ids.allocate();
        let mut lively = LivelyState::new(def.health, team, def.damage, def.weight, def.knockback);
        lively.parent = Some(owner);
        if let Some(poison) = def.poison_on_hit {
            lively.constant.poison = Some(poison);
        }

        let entity = Entity {
            base: EntityBase::new(id, position, Hitbox::circle(def.radius)),
            lively: Some(lively),
            kind: EntityKind::Petal(PetalData {
                def,
                owner,
                slot,
                piece,
                cluster_phase: 0.0,
            }),
        };
        let id = self.insert_entity(entity);
        if let Some(l) = self
            .entities
            .get_mut(&owner)
            .and_then(|e| e.lively.as_mut())
        {
            l.children.push(id);
        }
        id
    }

    fn random_position(&self, radius: f32, rng: &mut impl Rng) -> Vec2 {
        Vec2::new(
            rng.gen_range(radius..self.width - radius),
            rng.gen_range(radius..self.height - radius),
        )
    }

    // =========================================================================
    // Destruction
    // =========================================================================

    /// Mark an entity destroyed and cascade to its parented children.
    /// Registry removal and id release happen at end of tick so the
    /// deletion still reaches observers.
    pub fn destroy_entity(&mut self, id: EntityId) {
        let mut worklist = vec![id];
        while let Some(current) = worklist.pop() {
            let Some(entity) = self.entities.get_mut(&current) else {
                continue;
            };
            if entity.base.destroyed {
                continue;
            }
            entity.base.destroyed = true;

            if let Some(lively) = &entity.lively {
                worklist.extend(lively.children.iter().copied());
            }
            // A player takes its live petal pieces with it.
            if let Some(player) = entity.as_player() {
                worklist.extend(player.inventory.live_piece_ids());
            }

            // Petal owners restart the piece's reload.
            let owner = match &entity.kind {
                EntityKind::Petal(petal) => Some(petal.owner),
                _ => None,
            };
            if let Some(owner) = owner {
                if let Some(player) = self
                    .entities
                    .get_mut(&owner)
                    .and_then(|e| e.as_player_mut())
                {
                    player.inventory.piece_destroyed(current);
                }
            }
        }
    }

    pub fn remove_player(&mut self, id: EntityId) {
        if let Some(name) = self.entity(id).and_then(|e| e.as_player()).map(|p| p.name.clone()) {
            info!("player {} ({}) left", name, id);
        }
        self.destroy_entity(id);
    }

    // =========================================================================
    // Client input
    // =========================================================================

    pub fn set_player_input(&mut self, id: EntityId, input: InputState) {
        if let Some(player) = self.entity_mut(id).and_then(Entity::as_player_mut) {
            player.input = input;
        }
    }

    /// Discrete slot actions. Out-of-range indices no-op.
    pub fn apply_player_action(&mut self, id: EntityId, action: &PlayerAction) {
        let mut despawn = Vec::new();
        if let Some(player) = self.entity_mut(id).and_then(Entity::as_player_mut) {
            match action {
                PlayerAction::SwapSlots { from, to } => player.inventory.swap_slots(*from, *to),
                PlayerAction::DeleteSlot { slot } => {
                    if let Some(bunch) = player.inventory.delete_slot(*slot) {
                        despawn = bunch.pieces.iter().filter_map(|p| p.id).collect();
                    }
                }
                PlayerAction::TransformLoadout => player.inventory.transform_loadout(),
                PlayerAction::Leave => {}
            }
        }
        for petal in despawn {
            self.destroy_entity(petal);
        }
        if matches!(action, PlayerAction::Leave) {
            self.remove_player(id);
        }
    }

    // =========================================================================
    // The tick
    // =========================================================================

    pub fn update(&mut self, dt: f32) {
        self.tick = self.tick.wrapping_add(1);
        self.ids.roll_tick();
        self.collision_cache.clear();
        self.dealt_pairs.clear();
        self.killers.clear();
        self.partial_dirty.clear();
        self.full_dirty.clear();
        self.removed_this_tick.clear();
        self.chat.clear();

        self.rebuild_index();
        self.tick_effects_and_snapshots(dt);
        self.tick_regen_and_poison(dt);
        self.fill_collision_cache();
        self.resolve_separation();
        self.resolve_combat(dt);
        self.update_mobs(dt);
        self.update_players(dt);
        self.integrate_physics(dt);
        self.tick_despawns(dt);
        self.process_deaths();
        self.maintain_mob_population();
        self.flush_removals();
    }

    /// Full rebuild every tick; no removal or rebalancing logic needed.
    fn rebuild_index(&mut self) {
        self.quadtree.reset(self.width, self.height);
        for entity in self.entities.values().filter(|e| e.is_active()) {
            self.quadtree.insert(entity.id(), entity.base.bounds());
        }
    }

    fn tick_effects_and_snapshots(&mut self, dt: f32) {
        // Snapshot extras need immutable reads of the player's own data, so
        // collect them per entity before the mutable pass.
        let extras: HashMap<EntityId, Vec<Modifier>> = self
            .entities
            .values()
            .filter(|e| e.is_active())
            .filter_map(|e| {
                let player = e.as_player()?;
                let mut mods = player.inventory.wearer_modifiers();
                mods.push(account_modifier(player.level));
                Some((e.id(), mods))
            })
            .collect();

        for entity in self.entities.values_mut().filter(|e| e.is_active()) {
            let id = entity.base.id;
            let damp_slows = match &entity.kind {
                EntityKind::Mob(mob) => mob.def.rarity >= Rarity::Unusual,
                _ => false,
            };
            if let Some(lively) = entity.lively.as_mut() {
                lively.tick_effects(dt);
                lively.hurt = false;
                let empty = Vec::new();
                let extra = extras.get(&id).unwrap_or(&empty);
                lively.recompute_snapshot(extra, damp_slows);
            }
        }
    }

    fn tick_regen_and_poison(&mut self, dt: f32) {
        let mut poison_hits: Vec<(EntityId, f32, EntityId)> = Vec::new();
        for entity in self.entities.values_mut().filter(|e| e.is_active()) {
            let id = entity.base.id;
            if let Some(lively) = entity.lively.as_mut() {
                let heal = lively.snapshot.heal_per_second * dt;
                if heal > 0.0 {
                    lively.heal(heal);
                }
                if let Some((damage, source)) = lively.tick_poison(dt) {
                    poison_hits.push((id, damage, source));
                }
            }
        }
        for (victim, damage, source) in poison_hits {
            self.deal_damage(victim, damage, DamageKind::Poison, source);
        }
    }

    fn fill_collision_cache(&mut self) {
        let mut cache = HashMap::new();
        for entity in self.entities.values().filter(|e| e.is_active()) {
            let bounds = entity.base.bounds();
            let overlaps: Vec<EntityId> = self
                .quadtree
                .query(&bounds)
                .into_iter()
                .filter(|other| *other != entity.id())
                .filter(|other| {
                    self.entity(*other).is_some_and(|o| {
                        entity
                            .base
                            .hitbox
                            .intersects(entity.base.position, &o.base.hitbox, o.base.position)
                    })
                })
                .collect();
            cache.insert(entity.id(), overlaps);
        }
        self.collision_cache = cache;
    }

    /// True when two entities physically push each other apart.
    fn separation_eligible(&self, a: &Entity, b: &Entity) -> bool {
        if !a.is_active() || !b.is_active() {
            return false;
        }
        // Loot is intangible; walls block but are handled by weight.
        if matches!(a.kind, EntityKind::Loot(_)) || matches!(b.kind, EntityKind::Loot(_)) {
            return false;
        }
        if self.related(a, b) {
            return false;
        }
        if self.is_ghost(a) || self.is_ghost(b) {
            return false;
        }
        // Petals never shove their own side; their position is slaved.
        let (ta, tb) = (self.team_of(a), self.team_of(b));
        let petal_ally = |x: &Entity, other_team: Option<Team>| {
            matches!(x.kind, EntityKind::Petal(_)) && self.team_of(x) == other_team
        };
        if petal_ally(a, tb) || petal_ally(b, ta) {
            return false;
        }
        true
    }

    fn team_of(&self, entity: &Entity) -> Option<Team> {
        entity.lively.as_ref().map(|l| l.team)
    }

    /// Parent/child or summoner relationships in either direction.
    fn related(&self, a: &Entity, b: &Entity) -> bool {
        let link = |x: &Entity, y: &Entity| {
            x.lively.as_ref().is_some_and(|l| {
                l.parent == Some(y.id()) || l.summoner == Some(y.id())
            })
        };
        link(a, b) || link(b, a)
    }

    fn is_ghost(&self, entity: &Entity) -> bool {
        entity
            .as_player()
            .is_some_and(|p| p.spectator || p.invisible)
    }

    fn resolve_separation(&mut self) {
        // Collect push results first; pairs are visited once via id order.
        let mut pushes: Vec<(EntityId, Vec2, Vec2)> = Vec::new();
        for (id, overlaps) in &self.collision_cache {
            let Some(a) = self.entity(*id) else { continue };
            for other in overlaps {
                if other.0 <= id.0 {
                    continue;
                }
                let Some(b) = self.entity(*other) else { continue };
                if !self.separation_eligible(a, b) {
                    continue;
                }
                let Some((dir, depth)) =
                    a.base
                        .hitbox
                        .penetration(a.base.position, &b.base.hitbox, b.base.position)
                else {
                    continue;
                };
                let weight = |e: &Entity| match e.kind {
                    EntityKind::Wall(_) => WALL_WEIGHT,
                    _ => e.lively.as_ref().map_or(1.0, |l| l.weight.max(0.01)),
                };
                let (wa, wb) = (weight(a), weight(b));
                let total = wa + wb;
                // Each side moves by the other's weight share.
                let push_a = dir * (depth * wb / total);
                let push_b = -dir * (depth * wa / total);
                pushes.push((*id, push_a, push_a * VELOCITY_TRANSFER));
                pushes.push((*other, push_b, push_b * VELOCITY_TRANSFER));
            }
        }
        for (id, shift, velocity) in pushes {
            if let Some(entity) = self.entity_mut(id) {
                if matches!(entity.kind, EntityKind::Wall(_)) {
                    continue;
                }
                entity.base.position += shift;
                entity.base.velocity += velocity;
                self.partial_dirty.insert(id);
            }
        }
    }

    /// True when `dealer` may damage `receiver` this tick.
    fn combat_eligible(&self, dealer: &Entity, receiver: &Entity) -> bool {
        let (Some(dl), Some(rl)) = (dealer.lively.as_ref(), receiver.lively.as_ref()) else {
            return false;
        };
        if dl.team == rl.team || dl.damage.is_none() {
            return false;
        }
        if self.related(dealer, receiver) {
            return false;
        }
        !self.is_ghost(dealer) && !self.is_ghost(receiver)
    }

    fn resolve_combat(&mut self, _dt: f32) {
        // Hits collected first: (victim, raw damage, dealer, knockback impulse,
        // poison). Applied afterwards so each pair resolves exactly once.
        struct Hit {
            victim: EntityId,
            dealer: EntityId,
            amount: f32,
            impulse: Vec2,
            poison: Option<PoisonSpec>,
            effect: Option<HitEffect>,
        }
        let mut hits: Vec<Hit> = Vec::new();
        let mut pickups: Vec<(EntityId, EntityId)> = Vec::new();
        let mut pairs: Vec<(EntityId, EntityId)> = Vec::new();

        for (id, overlaps) in &self.collision_cache {
            for other in overlaps {
                let key = if id.0 < other.0 {
                    (*id, *other)
                } else {
                    (*other, *id)
                };
                if self.dealt_pairs.insert(key) {
                    pairs.push(key);
                }
            }
        }

        for (first, second) in pairs {
            let (Some(a), Some(b)) = (self.entity(first), self.entity(second)) else {
                continue;
            };

            // Loot pickup rides the same contact scan.
            match (&a.kind, &b.kind) {
                (EntityKind::Player(_), EntityKind::Loot(_)) => {
                    pickups.push((first, second));
                    continue;
                }
                (EntityKind::Loot(_), EntityKind::Player(_)) => {
                    pickups.push((second, first));
                    continue;
                }
                _ => {}
            }

            // One-directional eligibility per side: A may hit B while B
            // independently hits A, but the pair is processed only here.
            for (dealer, receiver) in [(a, b), (b, a)] {
                if !self.combat_eligible(dealer, receiver) {
                    continue;
                }
                let (Some(dl), Some(rl)) = (dealer.lively.as_ref(), receiver.lively.as_ref())
                else {
                    continue;
                };
                let amount = dl.damage.unwrap_or(0.0);
                if amount <= 0.0 {
                    continue;
                }
                // Knockback pushes the receiver along the dealer-to-receiver
                // axis, scaled by the dealer's weight share.
                let dir = (receiver.base.position - dealer.base.position).normalized();
                let share = dl.weight / (dl.weight + rl.weight).max(0.01);
                let magnitude = dl.knockback * rl.snapshot.knockback_absorption * share;
                let effect = match &dealer.kind {
                    EntityKind::Mob(mob) => mob.def.effect_on_hit.clone(),
                    EntityKind::Petal(petal) => petal.def.effect_on_hit.clone(),
                    _ => None,
                };
                hits.push(Hit {
                    victim: receiver.id(),
                    dealer: dealer.id(),
                    amount,
                    impulse: dir * magnitude,
                    poison: dl.snapshot.poison,
                    effect,
                });
            }
        }

        for hit in hits {
            let source = (hit.poison.is_some() || hit.effect.is_some())
                .then(|| self.top_parent(hit.dealer));
            self.deal_damage(hit.victim, hit.amount, DamageKind::Contact, hit.dealer);
            let Some(victim) = self.entity_mut(hit.victim) else {
                continue;
            };
            victim.base.velocity += hit.impulse;
            let Some(lively) = victim.lively.as_mut() else {
                continue;
            };
            if let (Some(spec), Some(source)) = (hit.poison, source) {
                lively.apply_poison(spec, source);
            }
            if let (Some(on_hit), Some(source)) = (hit.effect, source) {
                let mut effect = Effect::new(source, on_hit.duration, Some(on_hit.modifier));
                if effect.start(hit.victim).is_ok() {
                    lively.apply_effect(effect);
                }
            }
        }

        for (player_id, loot_id) in pickups {
            self.pick_up_loot(player_id, loot_id);
        }
    }

    fn pick_up_loot(&mut self, player_id: EntityId, loot_id: EntityId) {
        let Some(def) = self.entity(loot_id).and_then(|e| match &e.kind {
            EntityKind::Loot(loot) => Some(loot.def.clone()),
            _ => None,
        }) else {
            return;
        };
        let Some(player) = self.entity_mut(player_id).and_then(Entity::as_player_mut) else {
            return;
        };
        if player.inventory.equip_first_free(def.clone()) {
            player.collected.push(def.tag);
            debug!("{} picked up {}", player_id, def.id);
            self.destroy_entity(loot_id);
        }
    }

    /// Apply damage of one kind to a victim, with shield drain, kill
    /// attribution, contact reflection, and mob retaliation. Returns the
    /// health actually removed.
    pub fn deal_damage(
        &mut self,
        victim_id: EntityId,
        amount: f32,
        kind: DamageKind,
        source: EntityId,
    ) -> f32 {
        let attributed = self.top_parent(source);
        let Some(victim) = self.entities.get_mut(&victim_id).filter(|e| e.is_active()) else {
            return 0.0;
        };
        let Some(lively) = victim.lively.as_mut() else {
            return 0.0;
        };

        let mut remaining = lively.mitigate(amount, kind);
        let reflection = match kind {
            DamageKind::Contact => lively.snapshot.damage_reflection,
            _ => 0.0,
        };

        // Shield from a revive drains before health.
        if let EntityKind::Player(player) = &mut victim.kind {
            if player.shield > 0.0 && remaining > 0.0 {
                let absorbed = player.shield.min(remaining);
                player.shield -= absorbed;
                remaining -= absorbed;
            }
        }
        let Some(lively) = victim.lively.as_mut() else {
            return 0.0;
        };
        let dealt = lively.apply_raw_damage(remaining);
        if dealt <= 0.0 && reflection <= 0.0 {
            return 0.0;
        }
        self.killers.insert(victim_id, attributed);
        self.partial_dirty.insert(victim_id);
        self.full_dirty.insert(victim_id);

        // Aggressive and neutral mobs retaliate against their attacker.
        if let Some(mob) = self
            .entities
            .get_mut(&victim_id)
            .and_then(Entity::as_mob_mut)
        {
            if mob.def.category != MobCategory::Fixed
                && mob.def.category != MobCategory::Passive
                && mob.ai.target.is_none()
            {
                mob.ai.target = Some(attributed);
            }
        }

        // Reflection synthesizes an armor-bypassing hit back at the source,
        // attributed through the victim's own top parent.
        if reflection > 0.0 && dealt > 0.0 {
            let reflected = dealt * reflection;
            self.deal_damage(source, reflected, DamageKind::Reflect, victim_id);
        }
        dealt
    }

    // =========================================================================
    // Mob updates
    // =========================================================================

    fn update_mobs(&mut self, dt: f32) {
        struct MobPlan {
            id: EntityId,
            current_target: Option<TargetInfo>,
            nearest_hostile: Option<TargetInfo>,
            speed_multiplier: f32,
        }
        struct FollowPlan {
            id: EntityId,
            desired: Vec2,
            speed: f32,
        }

        // Pass 1: gather targets immutably.
        let mut plans: Vec<MobPlan> = Vec::new();
        let mut follows: Vec<FollowPlan> = Vec::new();
        let mut broken_chains: Vec<EntityId> = Vec::new();

        let mob_ids: Vec<EntityId> = self
            .entities()
            .filter(|e| e.as_mob().is_some())
            .map(Entity::id)
            .collect();

        for id in mob_ids {
            let Some(entity) = self.entity(id) else { continue };
            let Some(mob) = entity.as_mob() else { continue };
            let position = entity.base.position;
            let speed_multiplier = entity
                .lively
                .as_ref()
                .map_or(1.0, |l| l.snapshot.speed.max(0.0));

            // Body segments trail their leader instead of thinking.
            if let Some(ahead) = mob.follow {
                match self.entity(ahead) {
                    Some(leader) => {
                        let gap = mob.def.radius * SEGMENT_SPACING;
                        let dir = (position - leader.base.position).normalized();
                        follows.push(FollowPlan {
                            id,
                            desired: leader.base.position + dir * gap,
                            speed: mob.def.speed * speed_multiplier,
                        });
                    }
                    None => broken_chains.push(id),
                }
                continue;
            }

            let current_target = mob
                .ai
                .target
                .and_then(|t| self.target_info(t));
            let nearest_hostile = self.nearest_hostile(position, mob.def.aggro_radius, Team::MOBS);
            plans.push(MobPlan {
                id,
                current_target,
                nearest_hostile,
                speed_multiplier,
            });
        }

        // Pass 2: run the state machines and collect spawn intents.
        let mut rng = rand::thread_rng();
        let mut shots: Vec<(EntityId, &'static str, Vec2, Vec2)> = Vec::new();
        for plan in plans {
            let Some(entity) = self.entities.get_mut(&plan.id).filter(|e| e.is_active()) else {
                continue;
            };
            let position = entity.base.position;
            let EntityKind::Mob(mob) = &mut entity.kind else {
                continue;
            };
            let MobData { def, ai, direction, .. } = mob;
            let ctx = AiContext {
                def,
                position,
                current_target: plan.current_target,
                nearest_hostile: plan.nearest_hostile,
                speed_multiplier: plan.speed_multiplier,
            };
            let intent = ai.update(dt, &ctx, &mut rng);
            if let Some(angle) = intent.face {
                *direction = angle;
                self.partial_dirty.insert(plan.id);
            }
            // Impulse sized so terminal velocity approaches def.speed.
            entity.base.acceleration += intent.movement * def.speed * (1.0 - DRAG);
            if let Some(shot) = intent.shoot {
                let muzzle = position + shot.direction * (def.radius + 5.0);
                shots.push((plan.id, shot.projectile, muzzle, shot.direction));
            }
        }

        for (owner, projectile, muzzle, direction) in shots {
            self.spawn_projectile(projectile, muzzle, direction, owner);
        }

        // Segment followers steer toward their trailing point.
        for plan in follows {
            if let Some(entity) = self.entity_mut(plan.id) {
                let to_desired = plan.desired - entity.base.position;
                if to_desired.length() > 1.0 {
                    entity.base.acceleration +=
                        to_desired.normalized() * plan.speed * (1.0 - DRAG);
                }
            }
        }

        // A broken chain backs off and fends for itself.
        for id in broken_chains {
            if let Some(mob) = self.entity_mut(id).and_then(Entity::as_mob_mut) {
                mob.follow = None;
                mob.ai.start_backing(SEGMENT_BREAK_BACKING_SECS);
            }
        }

        // Keep projectiles at their definition speed against drag.
        let projectile_thrust: Vec<(EntityId, Vec2)> = self
            .entities()
            .filter_map(|e| match &e.kind {
                EntityKind::Projectile(p) => Some((
                    e.id(),
                    Vec2::from_polar(p.direction, p.def.speed * (1.0 - DRAG)),
                )),
                _ => None,
            })
            .collect();
        for (id, thrust) in projectile_thrust {
            if let Some(entity) = self.entity_mut(id) {
                entity.base.acceleration += thrust;
            }
        }
    }

    fn target_info(&self, id: EntityId) -> Option<TargetInfo> {
        let entity = self.entity(id)?;
        entity.lively.as_ref().filter(|l| !l.is_dead())?;
        if self.is_ghost(entity) {
            return None;
        }
        Some(TargetInfo {
            id,
            position: entity.base.position,
            velocity: entity.base.velocity,
        })
    }

    /// Nearest live, unparented entity of a different team within radius.
    fn nearest_hostile(&self, center: Vec2, radius: f32, team: Team) -> Option<TargetInfo> {
        let mut best: Option<(f32, TargetInfo)> = None;
        for id in self.query_area(center, radius) {
            let Some(entity) = self.entity(id) else { continue };
            let Some(lively) = entity.lively.as_ref() else { continue };
            if lively.team == team || lively.parent.is_some() || lively.is_dead() {
                continue;
            }
            if self.is_ghost(entity) {
                continue;
            }
            let dist = center.distance_to(entity.base.position);
            if dist > radius {
                continue;
            }
            if best.as_ref().is_none_or(|(d, _)| dist < *d) {
                best = Some((
                    dist,
                    TargetInfo {
                        id,
                        position: entity.base.position,
                        velocity: entity.base.velocity,
                    },
                ));
            }
        }
        best.map(|(_, info)| info)
    }

    // =========================================================================
    // Player updates
    // =========================================================================

    fn update_players(&mut self, dt: f32) {
        let player_ids: Vec<EntityId> = self
            .entities()
            .filter(|e| e.as_player().is_some())
            .map(Entity::id)
            .collect();

        let mut petal_spawns: Vec<(EntityId, u8, u8, PetalDef)> = Vec::new();
        let mut petal_moves: Vec<(EntityId, Vec2, f32)> = Vec::new();
        let mut slot_drops: Vec<EntityId> = Vec::new();

        for id in player_ids {
            let Some(entity) = self.entities.get_mut(&id).filter(|e| e.is_active()) else {
                continue;
            };
            let position = entity.base.position;
            let (speed_multiplier, extra_slots, slow_debuffs) = match entity.lively.as_ref() {
                Some(l) => (
                    l.snapshot.speed.max(0.0),
                    l.snapshot.extra_slots,
                    l.effects
                        .iter()
                        .filter(|e| e.modifier.as_ref().is_some_and(|m| m.speed < 1.0))
                        .count() as u32,
                ),
                None => (1.0, 0, 0),
            };
            let snapshot = entity.lively.as_ref().map(|l| l.snapshot.clone());
            let EntityKind::Player(player) = &mut entity.kind else {
                continue;
            };

            // Movement from the latest input intent.
            if !player.frozen && !player.spectator {
                let magnitude = player.input.magnitude.clamp(0.0, 1.0);
                let thrust = Vec2::from_polar(player.input.direction, magnitude)
                    * PLAYER_SPEED
                    * speed_multiplier
                    * (1.0 - DRAG);
                entity.base.acceleration += thrust;
            }

            // Slot count follows the fold's extra-slot sum.
            let desired_slots = (BASE_SLOTS + extra_slots).min(MAX_SLOTS);
            if desired_slots != player.inventory.slot_count() {
                for bunch in player.inventory.set_slot_count(desired_slots) {
                    slot_drops.extend(bunch.pieces.iter().filter_map(|p| p.id));
                }
            }

            if player.overlevel_secs > 0.0 {
                player.overlevel_secs = (player.overlevel_secs - dt).max(0.0);
            }

            // Orbit state and reloads.
            player
                .inventory
                .update_orbit(dt, player.input.primary, player.input.secondary);
            for (slot, piece) in player.inventory.tick_reloads(dt) {
                let def = player.inventory.slots()[usize::from(slot)]
                    .as_ref()
                    .map(|bunch| bunch.def.clone());
                if let Some(def) = def {
                    petal_spawns.push((id, slot, piece, def));
                }
            }

            if let Some(snapshot) = &snapshot {
                player.revolution_angle = advance_revolution(
                    player.revolution_angle,
                    snapshot,
                    player.input.direction,
                    slow_debuffs,
                    dt,
                );
            }

            for placement in player.inventory.piece_placements(player.revolution_angle) {
                let target = position + Vec2::from_polar(placement.angle, placement.radius);
                petal_moves.push((placement.id, target, placement.cluster_radius));
            }
            self.partial_dirty.insert(id);
        }

        for (owner, slot, piece, def) in petal_spawns {
            let petal = self.spawn_petal(owner, slot, piece, def);
            if let Some(player) = self.entity_mut(owner).and_then(Entity::as_player_mut) {
                player.inventory.piece_spawned(slot, piece, petal);
            }
        }

        // Petal positions are slaved toward their orbit point; cluster
        // petals add a fast local spin around it.
        for (petal_id, target, cluster_radius) in petal_moves {
            let Some(entity) = self.entities.get_mut(&petal_id).filter(|e| e.is_active()) else {
                continue;
            };
            let EntityKind::Petal(petal) = &mut entity.kind else {
                continue;
            };
            let mut point = target;
            if cluster_radius > 0.0 {
                petal.cluster_phase += CLUSTER_SPIN_SPEED * dt;
                let spread =
                    std::f32::consts::TAU * f32::from(petal.piece) / f32::from(petal.def.pieces.max(1));
                point += Vec2::from_polar(petal.cluster_phase + spread, cluster_radius);
            }
            entity.base.position = entity.base.position.lerp(point, PETAL_SLAVE_RATE);
            entity.base.velocity = Vec2::ZERO;
            self.partial_dirty.insert(petal_id);
        }

        for petal in slot_drops {
            self.destroy_entity(petal);
        }
    }

    // =========================================================================
    // Physics, despawns, deaths
    // =========================================================================

    fn integrate_physics(&mut self, dt: f32) {
        let mut moved: Vec<EntityId> = Vec::new();
        for entity in self.entities.values_mut().filter(|e| e.is_active()) {
            // Petals are position-slaved above; walls never move.
            if matches!(entity.kind, EntityKind::Petal(_) | EntityKind::Wall(_)) {
                continue;
            }
            let mut changed = entity.base.integrate(dt);
            if entity.base.clamp_to_world(self.width, self.height) {
                // Border hook: kill outward velocity so entities settle.
                entity.base.velocity = Vec2::ZERO;
                changed = true;
            }
            if changed {
                moved.push(entity.base.id);
            }
        }
        self.partial_dirty.extend(moved);
    }

    fn tick_despawns(&mut self, dt: f32) {
        let mut expired_loot: Vec<EntityId> = Vec::new();
        let mut expired_projectiles: Vec<EntityId> = Vec::new();

        for entity in self.entities.values_mut().filter(|e| e.is_active()) {
            match &mut entity.kind {
                EntityKind::Loot(loot) => {
                    loot.despawn_secs -= dt;
                    if loot.despawn_secs <= 0.0 {
                        expired_loot.push(entity.base.id);
                    }
                }
                EntityKind::Projectile(projectile) => {
                    projectile.despawn_secs -= dt;
                    if projectile.despawn_secs <= 0.0 {
                        expired_projectiles.push(entity.base.id);
                    }
                }
                _ => {}
            }
        }

        for id in expired_loot {
            self.destroy_entity(id);
        }
        // Expiry spawns run exactly once: the entity is destroyed in the
        // same breath and never ticks again.
        for id in expired_projectiles {
            self.expire_projectile(id);
        }
    }

    fn expire_projectile(&mut self, id: EntityId) {
        let Some(entity) = self.entity(id) else { return };
        let EntityKind::Projectile(projectile) = &entity.kind else {
            return;
        };
        let position = entity.base.position;
        let owner = entity
            .lively
            .as_ref()
            .and_then(|l| l.summoner)
            .unwrap_or(id);
        let spawns = projectile.def.spawn_on_expire.clone();
        let direction = projectile.direction;
        self.destroy_entity(id);

        let mut rng = rand::thread_rng();
        for spawn in spawns {
            match spawn {
                ExpireSpawn::Projectile { id: child, count } => {
                    for index in 0..count {
                        let spread = direction
                            + (f32::from(index) - f32::from(count.saturating_sub(1)) / 2.0) * 0.5;
                        self.spawn_projectile(
                            child,
                            position,
                            Vec2::from_polar(spread, 1.0),
                            owner,
                        );
                    }
                }
                ExpireSpawn::Mob { id: child, count } => {
                    for _ in 0..count {
                        let jitter = Vec2::new(rng.gen_range(-20.0..20.0), rng.gen_range(-20.0..20.0));
                        self.spawn_mob(child, position + jitter);
                    }
                }
            }
        }
    }

    fn process_deaths(&mut self) {
        let dead: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.is_active())
            .filter(|e| e.lively.as_ref().is_some_and(LivelyState::is_dead))
            .map(Entity::id)
            .collect();

        for id in dead {
            if self.try_revive(id) {
                continue;
            }
            self.award_kill(id);
            self.drop_loot(id);
            self.destroy_entity(id);
        }
    }

    /// A dying player holding a revive modifier consumes the granting petal
    /// instead of dying: full health, a shield, poison cleared.
    fn try_revive(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.get_mut(&id).filter(|e| e.is_active()) else {
            return false;
        };
        let has_revive = entity
            .lively
            .as_ref()
            .is_some_and(|l| l.snapshot.revive);
        if !has_revive {
            return false;
        }

        let mut despawn: Vec<EntityId> = Vec::new();
        {
            let Some(player) = entity.as_player_mut() else {
                return false;
            };
            let slot = player
                .inventory
                .slots()
                .iter()
                .position(|s| s.as_ref().is_some_and(|b| b.def.wearer.revive));
            match slot {
                Some(slot) => {
                    if let Some(bunch) = player.inventory.delete_slot(slot as u8) {
                        despawn = bunch.pieces.iter().filter_map(|p| p.id).collect();
                    }
                }
                None => return false,
            }
        }
        let max = entity.lively.as_ref().map_or(0.0, LivelyState::max_health);
        if let Some(lively) = entity.lively.as_mut() {
            lively.set_health(max);
            lively.poison = None;
        }
        if let Some(player) = entity.as_player_mut() {
            player.shield = max * REVIVE_SHIELD_FRACTION;
        }
        info!("{} consumed a revive", id);
        self.full_dirty.insert(id);
        for petal in despawn {
            self.destroy_entity(petal);
        }
        true
    }

    /// Score and experience go to the killer's top parent, when that is a
    /// player.
    fn award_kill(&mut self, victim: EntityId) {
        let Some(killer) = self.killers.get(&victim).copied() else {
            return;
        };
        let reward = match self.entity(victim).map(|e| &e.kind) {
            Some(EntityKind::Mob(mob)) => mob.def.experience,
            Some(EntityKind::Player(player)) => player.score / 2,
            _ => return,
        };
        if reward == 0 {
            return;
        }
        let Some(player) = self.entity_mut(killer).and_then(Entity::as_player_mut) else {
            return;
        };
        player.score += reward;
        player.experience += reward;
        player.level = player.experience / EXPERIENCE_PER_LEVEL + 1;
        self.full_dirty.insert(killer);
    }

    fn drop_loot(&mut self, victim: EntityId) {
        let drops: Vec<(PetalDef, Vec2)> = match self.entity(victim) {
            Some(entity) => match &entity.kind {
                EntityKind::Mob(mob) => {
                    let mut rng = rand::thread_rng();
                    mob.def
                        .loot
                        .iter()
                        .filter(|drop| rng.gen::<f32>() < drop.chance)
                        .filter_map(|drop| get_petal_by_id(drop.petal))
                        .map(|def| (def, entity.base.position))
                        .collect()
                }
                _ => Vec::new(),
            },
            None => Vec::new(),
        };
        for (def, position) in drops {
            self.spawn_loot(def, position);
        }
    }

    /// Keep the zone stocked: spawn weighted-random mobs up to the target
    /// head count, a few per tick.
    fn maintain_mob_population(&mut self) {
        let heads = self
            .entities()
            .filter(|e| e.as_mob().is_some_and(|m| m.follow.is_none()))
            .count();
        if heads >= TARGET_MOB_COUNT {
            return;
        }
        let defs = get_mob_definitions();
        let mut rng = rand::thread_rng();
        let spawning = (TARGET_MOB_COUNT - heads).min(MOB_RESPAWNS_PER_TICK);
        for _ in 0..spawning {
            let def = &defs[rng.gen_range(0..defs.len())];
            let position = self.random_position(def.radius, &mut rng);
            self.spawn_mob(def.id, position);
        }
    }

    /// Remove destroyed entities from the registry and hand their ids back
    /// to the allocator (reusable next tick, after deletions have flushed).
    fn flush_removals(&mut self) {
        let removed: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.base.destroyed)
            .map(Entity::id)
            .collect();
        for id in &removed {
            self.entities.remove(id);
            self.ids.release(*id);
            self.partial_dirty.remove(id);
            self.full_dirty.remove(id);
        }
        self.removed_this_tick = removed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.04;

    fn world() -> GameWorld {
        GameWorld::new(3000.0, 3000.0)
    }

    #[test]
    fn test_spider_contact_applies_timed_slow() {
        let mut w = GameWorld::new(10_000.0, 10_000.0);
        let player = w.spawn_player("runner".into(), None);
        if let Some(entity) = w.entity_mut(player) {
            entity.base.position = Vec2::new(5000.0, 5010.0);
        }
        let spider = w.spawn_mob("spider", Vec2::new(5000.0, 5000.0)).unwrap();

        w.update(DT);
        let lively = w.entity(player).unwrap().lively.as_ref().unwrap();
        assert_eq!(lively.effects.len(), 1);
        assert_eq!(lively.effects[0].source, spider);

        // A second contact refreshes the running effect instead of stacking,
        // and the slow now shows up in the folded snapshot.
        if let Some(entity) = w.entity_mut(player) {
            entity.base.position = Vec2::new(5000.0, 5010.0);
        }
        if let Some(entity) = w.entity_mut(spider) {
            entity.base.position = Vec2::new(5000.0, 5000.0);
        }
        w.update(DT);
        let lively = w.entity(player).unwrap().lively.as_ref().unwrap();
        assert_eq!(lively.effects.len(), 1);
        assert!((lively.snapshot.speed - 0.35).abs() < 0.001);

        // Out of reach, the snare runs out and speed recovers.
        if let Some(entity) = w.entity_mut(player) {
            entity.base.position = Vec2::new(9000.0, 9000.0);
        }
        for _ in 0..55 {
            w.update(DT);
        }
        let lively = w.entity(player).unwrap().lively.as_ref().unwrap();
        assert!(lively.effects.is_empty());
        assert!((lively.snapshot.speed - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_web_slow_is_damped_on_high_rarity_mobs() {
        let mut w = world();
        let wasp = w.spawn_mob("wasp", Vec2::new(1500.0, 1500.0)).unwrap();
        let on_hit = get_petal_by_id("web").unwrap().effect_on_hit.unwrap();
        {
            let lively = w.entity_mut(wasp).unwrap().lively.as_mut().unwrap();
            let mut effect = Effect::new(EntityId(999), on_hit.duration, Some(on_hit.modifier));
            effect.start(wasp).unwrap();
            lively.apply_effect(effect);
        }
        w.update(DT);
        let snapshot = &w.entity(wasp).unwrap().lively.as_ref().unwrap().snapshot;
        assert!((snapshot.speed - (1.0 - (1.0 - 0.5) / 3.0)).abs() < 0.001);
    }

    #[test]
    fn test_destroyed_entity_reports_deletion() {
        let mut w = world();
        let mob = w.spawn_mob("ladybug", Vec2::new(100.0, 100.0)).unwrap();
        assert!(w.entity(mob).is_some());

        w.destroy_entity(mob);
        assert!(w.entity(mob).is_none());
        w.update(DT);
        assert!(w.removed_this_tick().contains(&mob));
    }

    #[test]
    fn test_contact_damage_is_mitigated_by_armor() {
        let mut w = world();
        let mob = w.spawn_mob("ladybug", Vec2::new(500.0, 500.0)).unwrap();
        {
            let lively = w.entity_mut(mob).unwrap().lively.as_mut().unwrap();
            lively.queue_modifier(floret_shared::defs::Modifier {
                armor: 5.0,
                ..Default::default()
            });
            lively.recompute_snapshot(&[], false);
        }
        let dealt = w.deal_damage(mob, 20.0, DamageKind::Contact, mob);
        assert!((dealt - 15.0).abs() < 0.001);
        let dealt = w.deal_damage(mob, 20.0, DamageKind::Poison, mob);
        assert!((dealt - 20.0).abs() < 0.001);
    }

    #[test]
    fn test_reflection_hits_the_source_once() {
        let mut w = world();
        let cactus = w.spawn_mob("cactus", Vec2::new(500.0, 500.0)).unwrap();
        let attacker = w.spawn_player("tester".into(), None);
        // cactus reflects 0.1 of contact damage via its constant modifier
        if let Some(lively) = w.entity_mut(cactus).and_then(|e| e.lively.as_mut()) {
            lively.recompute_snapshot(&[], false);
        }
        let before = w.entity(attacker).unwrap().lively.as_ref().unwrap().health();
        let dealt = w.deal_damage(cactus, 100.0, DamageKind::Contact, attacker);
        assert!(dealt > 0.0);
        let after = w.entity(attacker).unwrap().lively.as_ref().unwrap().health();
        assert!((before - after - dealt * 0.1).abs() < 0.01);
    }

    #[test]
    fn test_dead_mob_awards_killer_and_drops_loot() {
        let mut w = world();
        let player = w.spawn_player("hunter".into(), None);
        let mob = w.spawn_mob("rock", Vec2::new(1500.0, 1500.0)).unwrap();
        let experience = w.entity(mob).unwrap().as_mob().unwrap().def.experience;

        w.deal_damage(mob, 10_000.0, DamageKind::Contact, player);
        w.process_deaths();
        assert!(w.entities.get(&mob).is_none_or(|e| e.base.destroyed));

        let data = w.entity(player).unwrap().as_player().unwrap();
        assert_eq!(data.score, experience);
        assert_eq!(data.experience, experience);
    }

    #[test]
    fn test_projectile_expiry_spawns_children_exactly_once() {
        let mut w = world();
        let hornet = w.spawn_mob("hornet", Vec2::new(500.0, 500.0)).unwrap();
        let projectile = w
            .spawn_projectile("burst", Vec2::new(600.0, 500.0), Vec2::new(1.0, 0.0), hornet)
            .unwrap();

        // Run past the 3.0s despawn.
        let mut sparks_seen = 0usize;
        for _ in 0..120 {
            w.update(DT);
            let sparks = w
                .entities()
                .filter(|e| match &e.kind {
                    EntityKind::Projectile(p) => p.def.id == "spark",
                    _ => false,
                })
                .count();
            sparks_seen = sparks_seen.max(sparks);
        }
        assert!(w.entity(projectile).is_none());
        // Burst spawns 3 sparks once; sparks themselves despawn in 0.8s and
        // spawn nothing, so the high-water mark is exactly 3.
        assert_eq!(sparks_seen, 3);
    }

    #[test]
    fn test_loot_pickup_equips_and_collects() {
        let mut w = world();
        let player = w.spawn_player("collector".into(), Some(vec!["basic".into()]));
        let position = w.entity(player).unwrap().base.position;
        let rose = get_petal_by_id("rose").unwrap();
        let loot = w.spawn_loot(rose, position);

        w.update(DT);
        assert!(w.entity(loot).is_none());
        let data = w.entity(player).unwrap().as_player().unwrap();
        assert!(data.inventory.slots().iter().flatten().any(|b| b.def.id == "rose"));
    }

    #[test]
    fn test_centipede_spawns_chain_and_breaking_backs_off() {
        let mut w = world();
        let head = w.spawn_mob("centipede", Vec2::new(1000.0, 1000.0)).unwrap();
        let segments: Vec<EntityId> = w
            .entities()
            .filter(|e| e.as_mob().is_some_and(|m| m.follow.is_some()))
            .map(Entity::id)
            .collect();
        assert_eq!(segments.len(), 8);

        w.destroy_entity(head);
        w.update(DT);
        w.update(DT);
        let backing = w
            .entities()
            .filter(|e| {
                e.as_mob()
                    .is_some_and(|m| m.follow.is_none() && m.ai.state == crate::mob_ai::AiState::Backing)
            })
            .count();
        assert!(backing >= 1);
    }

    #[test]
    fn test_removed_ids_flush_before_reuse() {
        let mut w = world();
        let mob = w.spawn_mob("ladybug", Vec2::new(100.0, 100.0)).unwrap();
        w.destroy_entity(mob);
        w.update(DT);
        assert!(w.removed_this_tick().contains(&mob));

        // The freed id may come back, but never in the tick that reported
        // the deletion.
        w.update(DT);
        for entity in w.entities() {
            if entity.id() == mob {
                assert!(!w.removed_this_tick().contains(&mob));
            }
        }
    }
}
