//! Player inventory and petal orbit bookkeeping.
//!
//! The inventory owns the logical slot state: which petal definition sits in
//! each slot, per-piece reload countdowns, and the eased orbit radius. The
//! world spawns and destroys the physical petal entities; the inventory only
//! tracks their ids and answers placement queries.

use std::collections::HashSet;

use floret_shared::defs::{Modifier, OrbitBehavior, PetalDef};
use floret_shared::math::{ease_toward, wrap_angle};

use crate::ids::EntityId;
use crate::modifiers::ModifierSnapshot;

/// Orbit radius with no intent held.
pub const DEFAULT_ORBIT_RADIUS: f32 = 55.0;

/// Orbit radius while the primary (attack) intent is held.
pub const ATTACK_ORBIT_RADIUS: f32 = 110.0;

/// Orbit radius while the secondary (defend) intent is held.
pub const DEFEND_ORBIT_RADIUS: f32 = 30.0;

/// Per-tick easing fraction toward the target radius.
const ORBIT_EASE_RATE: f32 = 0.2;

/// Base revolution speed in radians per second.
pub const BASE_REVOLUTION_SPEED: f32 = 2.4;

/// Local spin speed of a shown-in-one cluster, radians per second.
pub const CLUSTER_SPIN_SPEED: f32 = 9.0;

/// One physical sub-entity of a bunch.
#[derive(Debug)]
pub struct Piece {
    /// Live petal entity, or None while reloading.
    pub id: Option<EntityId>,
    pub reload: f32,
    pub spawned_once: bool,
}

/// One equipped slot: a petal definition and its 1..N pieces.
#[derive(Debug)]
pub struct PetalBunch {
    pub def: PetalDef,
    pub pieces: Vec<Piece>,
}

impl PetalBunch {
    pub fn new(def: PetalDef) -> Self {
        let pieces = (0..def.pieces)
            .map(|_| Piece {
                id: None,
                reload: def.reload_secs,
                spawned_once: false,
            })
            .collect();
        Self { def, pieces }
    }

    /// True until every piece has spawned at least once. Wearer modifiers
    /// are withheld during this window unless the petal applies from start.
    pub fn first_reload(&self) -> bool {
        self.pieces.iter().any(|piece| !piece.spawned_once)
    }

    /// Pieces this bunch occupies in the angular spread. Shown-in-one
    /// bunches cluster at a single point and count as one.
    pub fn displayed_pieces(&self) -> u32 {
        if self.def.shown_in_one {
            1
        } else {
            u32::from(self.def.pieces)
        }
    }

    fn contributes_wearer(&self) -> bool {
        self.def.apply_from_start || !self.first_reload()
    }
}

/// A live piece's desired orbit placement for this tick. `cluster_radius`
/// is zero for evenly-spread pieces; shown-in-one pieces sit at the bunch
/// point plus a small fast-spinning local offset.
#[derive(Debug, Clone, Copy)]
pub struct PiecePlacement {
    pub id: EntityId,
    pub angle: f32,
    pub radius: f32,
    pub cluster_radius: f32,
}

#[derive(Debug)]
pub struct Inventory {
    slots: Vec<Option<PetalBunch>>,
    orbit_radius: f32,
    /// Drives swing-behavior radius cycles.
    swing_elapsed: f32,
}

impl Inventory {
    pub fn new(slot_count: u8) -> Self {
        Self {
            slots: (0..slot_count).map(|_| None).collect(),
            orbit_radius: DEFAULT_ORBIT_RADIUS,
            swing_elapsed: 0.0,
        }
    }

    pub fn slot_count(&self) -> u8 {
        self.slots.len() as u8
    }

    pub fn slots(&self) -> &[Option<PetalBunch>] {
        &self.slots
    }

    pub fn orbit_radius(&self) -> f32 {
        self.orbit_radius
    }

    /// Grow or shrink to `count` slots. Returns the bunches dropped from
    /// removed slots so the world can despawn their pieces.
    pub fn set_slot_count(&mut self, count: u8) -> Vec<PetalBunch> {
        let count = usize::from(count);
        let mut dropped = Vec::new();
        while self.slots.len() > count {
            if let Some(bunch) = self.slots.pop().flatten() {
                dropped.push(bunch);
            }
        }
        while self.slots.len() < count {
            self.slots.push(None);
        }
        dropped
    }

    /// Place a petal into a slot, returning whatever it replaced.
    /// Out-of-range slots no-op and hand the definition back as a bunch.
    pub fn equip(&mut self, slot: u8, def: PetalDef) -> Option<PetalBunch> {
        match self.slots.get_mut(usize::from(slot)) {
            Some(entry) => entry.replace(PetalBunch::new(def)),
            None => None,
        }
    }

    /// Equip into the first empty slot; false when the inventory is full.
    pub fn equip_first_free(&mut self, def: PetalDef) -> bool {
        for entry in &mut self.slots {
            if entry.is_none() {
                *entry = Some(PetalBunch::new(def));
                return true;
            }
        }
        false
    }

    /// Swap two slots. Out-of-range indices no-op.
    pub fn swap_slots(&mut self, from: u8, to: u8) {
        let (from, to) = (usize::from(from), usize::from(to));
        if from < self.slots.len() && to < self.slots.len() && from != to {
            self.slots.swap(from, to);
        }
    }

    /// Clear a slot, returning the removed bunch for despawning.
    pub fn delete_slot(&mut self, slot: u8) -> Option<PetalBunch> {
        self.slots.get_mut(usize::from(slot))?.take()
    }

    /// Rotate the loadout left by one slot.
    pub fn transform_loadout(&mut self) {
        if !self.slots.is_empty() {
            self.slots.rotate_left(1);
        }
    }

    /// Wearer modifier contributions for this tick's fold. Bunches still in
    /// their first reload are skipped unless flagged to apply from start;
    /// unstackable petals contribute once across all equipped copies.
    pub fn wearer_modifiers(&self) -> Vec<Modifier> {
        let mut applied_unstackable: HashSet<u8> = HashSet::new();
        let mut out = Vec::new();
        for bunch in self.slots.iter().flatten() {
            if !bunch.contributes_wearer() {
                continue;
            }
            if bunch.def.unstackable && !applied_unstackable.insert(bunch.def.tag) {
                continue;
            }
            out.push(bunch.def.wearer.clone());
        }
        out
    }

    /// Advance reload countdowns; returns (slot, piece) pairs whose reload
    /// just finished. The world spawns entities for them and reports back
    /// through `piece_spawned`.
    pub fn tick_reloads(&mut self, dt: f32) -> Vec<(u8, u8)> {
        let mut due = Vec::new();
        for (slot, entry) in self.slots.iter_mut().enumerate() {
            let Some(bunch) = entry else { continue };
            for (piece_index, piece) in bunch.pieces.iter_mut().enumerate() {
                if piece.id.is_some() {
                    continue;
                }
                piece.reload -= dt;
                if piece.reload <= 0.0 {
                    due.push((slot as u8, piece_index as u8));
                }
            }
        }
        due
    }

    pub fn piece_spawned(&mut self, slot: u8, piece: u8, id: EntityId) {
        if let Some(Some(bunch)) = self.slots.get_mut(usize::from(slot)) {
            if let Some(piece) = bunch.pieces.get_mut(usize::from(piece)) {
                piece.id = Some(id);
                piece.spawned_once = true;
            }
        }
    }

    /// A live piece entity died; restart its reload.
    pub fn piece_destroyed(&mut self, id: EntityId) {
        for bunch in self.slots.iter_mut().flatten() {
            for piece in &mut bunch.pieces {
                if piece.id == Some(id) {
                    piece.id = None;
                    piece.reload = bunch.def.reload_secs;
                    return;
                }
            }
        }
    }

    /// All live piece ids, for cascade despawn.
    pub fn live_piece_ids(&self) -> Vec<EntityId> {
        self.slots
            .iter()
            .flatten()
            .flat_map(|bunch| bunch.pieces.iter().filter_map(|piece| piece.id))
            .collect()
    }

    pub fn total_displayed_pieces(&self) -> u32 {
        self.slots
            .iter()
            .flatten()
            .map(PetalBunch::displayed_pieces)
            .sum()
    }

    /// Ease the shared orbit radius toward the intent-derived target and
    /// advance the swing clock.
    pub fn update_orbit(&mut self, dt: f32, primary: bool, secondary: bool) {
        let target = if primary {
            ATTACK_ORBIT_RADIUS
        } else if secondary {
            DEFEND_ORBIT_RADIUS
        } else {
            DEFAULT_ORBIT_RADIUS
        };
        self.orbit_radius = ease_toward(self.orbit_radius, target, ORBIT_EASE_RATE);
        self.swing_elapsed += dt;
    }

    /// Desired placement for every live piece. The angular spread divides
    /// the circle by the summed displayed piece count of all bunches,
    /// recomputed here every call since bunches come and go.
    pub fn piece_placements(&self, revolution_angle: f32) -> Vec<PiecePlacement> {
        let total = self.total_displayed_pieces();
        if total == 0 {
            return Vec::new();
        }
        let step = std::f32::consts::TAU / total as f32;

        let mut out = Vec::new();
        let mut angular_index = 0u32;
        for bunch in self.slots.iter().flatten() {
            let radius = self.bunch_radius(bunch);
            if bunch.def.shown_in_one {
                let angle = revolution_angle + step * angular_index as f32;
                for piece in &bunch.pieces {
                    if let Some(id) = piece.id {
                        out.push(PiecePlacement {
                            id,
                            angle,
                            radius,
                            cluster_radius: bunch.def.radius * 1.5,
                        });
                    }
                }
                angular_index += 1;
            } else {
                for piece in &bunch.pieces {
                    if let Some(id) = piece.id {
                        out.push(PiecePlacement {
                            id,
                            angle: revolution_angle + step * angular_index as f32,
                            radius,
                            cluster_radius: 0.0,
                        });
                    }
                    // Reloading pieces keep their angular slot reserved.
                    angular_index += 1;
                }
            }
        }
        out
    }

    fn bunch_radius(&self, bunch: &PetalBunch) -> f32 {
        match bunch.def.behavior {
            OrbitBehavior::Normal => self.orbit_radius,
            OrbitBehavior::Extend { distance } => self.orbit_radius + distance,
            OrbitBehavior::Swing { period, amplitude } => {
                let phase = self.swing_elapsed * std::f32::consts::TAU / period;
                self.orbit_radius + amplitude * 0.5 * (1.0 - phase.cos())
            }
        }
    }
}

/// Enumerated revolution policy keyed by the count of active slow-debuff
/// sources on the owner: full speed, half, frozen, then reversed.
pub fn revolution_scale(slow_debuff_count: u32) -> f32 {
    match slow_debuff_count {
        0 => 1.0,
        1 => 0.5,
        2 => 0.0,
        _ => -0.5,
    }
}

/// Advance the shared revolution angle for one tick. Control-rotation
/// slaves the angle to the owner's aim; shocked freezes it outright.
pub fn advance_revolution(
    angle: f32,
    snapshot: &ModifierSnapshot,
    aim: f32,
    slow_debuff_count: u32,
    dt: f32,
) -> f32 {
    if snapshot.control_rotation {
        return aim;
    }
    if snapshot.shocked {
        return angle;
    }
    let speed =
        BASE_REVOLUTION_SPEED * snapshot.revolution_speed * revolution_scale(slow_debuff_count);
    // Keep the accumulator wrapped so trig precision does not decay.
    wrap_angle(angle + speed * dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use floret_shared::defs::get_petal_by_id;

    fn inv_with(ids: &[&str]) -> Inventory {
        let mut inventory = Inventory::new(5);
        for (slot, id) in ids.iter().enumerate() {
            inventory.equip(slot as u8, get_petal_by_id(id).unwrap());
        }
        inventory
    }

    #[test]
    fn test_out_of_range_slot_ops_noop() {
        let mut inventory = inv_with(&["basic"]);
        inventory.swap_slots(0, 99);
        inventory.swap_slots(42, 43);
        assert!(inventory.delete_slot(99).is_none());
        assert!(inventory.slots()[0].is_some());
    }

    #[test]
    fn test_swap_and_delete() {
        let mut inventory = inv_with(&["basic", "rose"]);
        inventory.swap_slots(0, 1);
        assert_eq!(inventory.slots()[0].as_ref().unwrap().def.id, "rose");
        let removed = inventory.delete_slot(1).unwrap();
        assert_eq!(removed.def.id, "basic");
        assert!(inventory.slots()[1].is_none());
    }

    #[test]
    fn test_first_reload_gates_wearer_modifier() {
        let mut inventory = inv_with(&["rose"]);
        // Nothing has spawned yet.
        assert!(inventory.wearer_modifiers().is_empty());

        let due = inventory.tick_reloads(10.0);
        assert_eq!(due, vec![(0, 0)]);
        inventory.piece_spawned(0, 0, EntityId(5));
        assert_eq!(inventory.wearer_modifiers().len(), 1);

        // Destroying the piece starts a normal reload; the modifier stays.
        inventory.piece_destroyed(EntityId(5));
        assert_eq!(inventory.wearer_modifiers().len(), 1);
    }

    #[test]
    fn test_apply_from_start_skips_gating() {
        let inventory = inv_with(&["leaf"]);
        assert_eq!(inventory.wearer_modifiers().len(), 1);
    }

    #[test]
    fn test_unstackable_applies_once() {
        let mut inventory = inv_with(&["salt", "salt", "rose"]);
        // leaf-style gating out of the way: mark everything spawned.
        for slot in 0..3u8 {
            for due in inventory.tick_reloads(100.0) {
                inventory.piece_spawned(due.0, due.1, EntityId(u16::from(slot) * 10 + u16::from(due.1)));
            }
        }
        let mods = inventory.wearer_modifiers();
        // Two salts contribute one modifier, rose contributes its own.
        assert_eq!(mods.len(), 2);
    }

    #[test]
    fn test_displayed_pieces_cluster_as_one() {
        let inventory = inv_with(&["stinger", "basic"]);
        // Stinger has 3 pieces but shows in one; basic has 1.
        assert_eq!(inventory.total_displayed_pieces(), 2);
    }

    #[test]
    fn test_placements_spread_evenly() {
        let mut inventory = inv_with(&["basic", "light"]);
        for due in inventory.tick_reloads(100.0) {
            inventory.piece_spawned(due.0, due.1, EntityId(u16::from(due.0) * 10 + u16::from(due.1)));
        }
        let placements = inventory.piece_placements(0.0);
        assert_eq!(placements.len(), 3);
        let step = std::f32::consts::TAU / 3.0;
        for (index, placement) in placements.iter().enumerate() {
            assert!((placement.angle - step * index as f32).abs() < 0.001);
        }
    }

    #[test]
    fn test_orbit_radius_eases_toward_intent() {
        let mut inventory = inv_with(&["basic"]);
        for _ in 0..100 {
            inventory.update_orbit(0.04, true, false);
        }
        assert!((inventory.orbit_radius() - ATTACK_ORBIT_RADIUS).abs() < 1.0);
        for _ in 0..100 {
            inventory.update_orbit(0.04, false, true);
        }
        assert!((inventory.orbit_radius() - DEFEND_ORBIT_RADIUS).abs() < 1.0);
    }

    #[test]
    fn test_revolution_policy() {
        let snapshot = ModifierSnapshot::default();
        let advanced = advance_revolution(0.0, &snapshot, 1.0, 0, 1.0);
        assert!((advanced - BASE_REVOLUTION_SPEED).abs() < 0.001);

        // Frozen at two slow debuffs, reversed past that.
        assert_eq!(advance_revolution(1.0, &snapshot, 0.0, 2, 1.0), 1.0);
        assert!(advance_revolution(1.0, &snapshot, 0.0, 3, 1.0) < 1.0);

        let mut shocked = ModifierSnapshot::default();
        shocked.shocked = true;
        assert_eq!(advance_revolution(1.0, &shocked, 0.0, 0, 1.0), 1.0);

        let mut slaved = ModifierSnapshot::default();
        slaved.control_rotation = true;
        assert_eq!(advance_revolution(1.0, &slaved, 2.5, 0, 1.0), 2.5);
    }

    #[test]
    fn test_transform_loadout_rotates() {
        let mut inventory = inv_with(&["basic", "rose", "iris"]);
        inventory.transform_loadout();
        assert_eq!(inventory.slots()[0].as_ref().unwrap().def.id, "rose");
        assert_eq!(inventory.slots()[1].as_ref().unwrap().def.id, "iris");
        assert!(inventory.slots()[2].is_none());
        assert_eq!(inventory.slots()[4].as_ref().unwrap().def.id, "basic");
    }
}
