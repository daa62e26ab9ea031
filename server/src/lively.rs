//! Combat state layered on top of the entity base.
//!
//! Anything that fights (players, petals, mobs, projectiles) carries a
//! `LivelyState`: health, team, contact damage, knockback, modifiers,
//! effects, poison and ownership links. Pair resolution (who damages whom
//! this tick) lives in the world; this module owns the single-entity rules.

use floret_shared::defs::{Modifier, PoisonSpec};

use crate::effects::Effect;
use crate::ids::EntityId;
use crate::modifiers::ModifierSnapshot;

/// Team identifier. Collision damage only occurs across differing teams.
/// Mobs all share one team; every player is their own. Wider than an
/// entity id so player teams can never wrap onto the mob team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Team(pub u32);

impl Team {
    pub const MOBS: Team = Team(0);
}

/// A running poison dose on one entity.
#[derive(Debug, Clone, Copy)]
pub struct ActivePoison {
    pub damage_per_second: f32,
    pub remaining_secs: f32,
    pub source: EntityId,
}

impl ActivePoison {
    /// Total damage this dose will still deal.
    pub fn remaining_total(&self) -> f32 {
        self.damage_per_second * self.remaining_secs
    }
}

/// How a damage amount interacts with defenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageKind {
    /// Reduced by the target's armor; can trigger reflection.
    Contact,
    /// Bypasses armor; never reflected.
    Poison,
    /// Bypasses armor; never reflected (no reflection loops).
    Reflect,
}

#[derive(Debug)]
pub struct LivelyState {
    health: f32,
    base_max_health: f32,
    pub team: Team,
    /// None means this entity cannot deal contact damage.
    pub damage: Option<f32>,
    pub weight: f32,
    /// Knockback dealt to whatever this entity hits.
    pub knockback: f32,
    pub invincible: bool,
    /// Fixed per-type stat bias, folded first.
    pub constant: Modifier,
    pub effects: Vec<Effect>,
    /// One-tick modifiers queued by collision/attack resolution; consumed
    /// and cleared by the next snapshot fold.
    pub one_shot: Vec<Modifier>,
    pub snapshot: ModifierSnapshot,
    /// Owning entity; destroying the parent destroys this one.
    pub parent: Option<EntityId>,
    /// Creator credit only; destroying the summoner does not cascade.
    pub summoner: Option<EntityId>,
    pub children: Vec<EntityId>,
    pub poison: Option<ActivePoison>,
    /// Took damage this tick; serialized as the hurt flag and cleared.
    pub hurt: bool,
}

impl LivelyState {
    pub fn new(health: f32, team: Team, damage: Option<f32>, weight: f32, knockback: f32) -> Self {
        Self {
            health,
            base_max_health: health,
            team,
            damage,
            weight,
            knockback,
            invincible: false,
            constant: Modifier::default(),
            effects: Vec::new(),
            one_shot: Vec::new(),
            snapshot: ModifierSnapshot::default(),
            parent: None,
            summoner: None,
            children: Vec::new(),
            poison: None,
            hurt: false,
        }
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn max_health(&self) -> f32 {
        (self.base_max_health + self.snapshot.max_health_flat).max(1.0)
    }

    pub fn health_fraction(&self) -> f32 {
        (self.health / self.max_health()).clamp(0.0, 1.0)
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// Every health write clamps into [0, max].
    pub fn set_health(&mut self, value: f32) {
        self.health = value.clamp(0.0, self.max_health());
    }

    pub fn heal(&mut self, amount: f32) {
        if amount > 0.0 {
            self.set_health(self.health + amount);
        }
    }

    /// Subtract an already-mitigated damage amount. Returns what was
    /// actually removed. Invincible entities take nothing.
    pub fn apply_raw_damage(&mut self, amount: f32) -> f32 {
        if self.invincible || amount <= 0.0 {
            return 0.0;
        }
        let before = self.health;
        self.set_health(self.health - amount);
        let dealt = before - self.health;
        if dealt > 0.0 {
            self.hurt = true;
        }
        dealt
    }

    /// Mitigate `amount` by kind: armor applies to contact damage only.
    pub fn mitigate(&self, amount: f32, kind: DamageKind) -> f32 {
        match kind {
            DamageKind::Contact => (amount - self.snapshot.armor).max(0.0),
            DamageKind::Poison | DamageKind::Reflect => amount,
        }
    }

    /// (Re-)apply poison. The new dose only replaces a running one when its
    /// total prospective damage exceeds the remaining total of the current
    /// dose, so refresh-stacking a weak poison cannot extend a strong one.
    pub fn apply_poison(&mut self, spec: PoisonSpec, source: EntityId) -> bool {
        let replace = match &self.poison {
            Some(current) => spec.total() > current.remaining_total(),
            None => true,
        };
        if replace {
            self.poison = Some(ActivePoison {
                damage_per_second: spec.damage_per_second,
                remaining_secs: spec.duration,
                source,
            });
        }
        replace
    }

    /// Advance the running poison. Returns (damage due this tick, source)
    /// while a dose is active.
    pub fn tick_poison(&mut self, dt: f32) -> Option<(f32, EntityId)> {
        let poison = self.poison.as_mut()?;
        let step = dt.min(poison.remaining_secs);
        let damage = poison.damage_per_second * step;
        let source = poison.source;
        poison.remaining_secs -= dt;
        if poison.remaining_secs <= 0.0 {
            self.poison = None;
        }
        Some((damage, source))
    }

    /// Queue a modifier that applies to this tick's fold only.
    pub fn queue_modifier(&mut self, modifier: Modifier) {
        self.one_shot.push(modifier);
    }

    /// Register a timed effect. A repeat hit from the same source refreshes
    /// the running effect instead of stacking a second copy.
    pub fn apply_effect(&mut self, effect: Effect) {
        match self.effects.iter_mut().find(|e| e.source == effect.source) {
            Some(existing) => *existing = effect,
            None => self.effects.push(effect),
        }
    }

    /// Rebuild the snapshot from a clean baseline: constant modifier, then
    /// active effects, then queued one-shot modifiers (consumed here), then
    /// any caller-supplied extras (wearer/account modifiers for players).
    pub fn recompute_snapshot(&mut self, extras: &[Modifier], damp_slows: bool) {
        let mut snapshot = ModifierSnapshot::default();
        snapshot.apply(&self.constant, damp_slows);
        for effect in &self.effects {
            if let Some(modifier) = &effect.modifier {
                snapshot.apply(modifier, damp_slows);
            }
        }
        for modifier in self.one_shot.drain(..) {
            snapshot.apply(&modifier, damp_slows);
        }
        for modifier in extras {
            snapshot.apply(modifier, damp_slows);
        }
        self.snapshot = snapshot;
        // Max health may have shrunk; the clamp invariant holds on every write.
        self.set_health(self.health);
    }

    /// Advance all effects, dropping expired ones.
    pub fn tick_effects(&mut self, dt: f32) {
        self.effects.retain_mut(|effect| !effect.tick(dt));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lively() -> LivelyState {
        LivelyState::new(100.0, Team(1), Some(10.0), 2.0, 3.0)
    }

    #[test]
    fn test_player_team_never_aliases_mob_team() {
        // Player teams are id + 1 in a wider type; even the last id is safe.
        for raw in [0u16, 1, u16::MAX] {
            assert_ne!(Team(u32::from(raw) + 1), Team::MOBS);
        }
    }

    #[test]
    fn test_health_clamped_after_any_sequence() {
        let mut state = lively();
        state.apply_raw_damage(30.0);
        assert_eq!(state.health(), 70.0);
        state.heal(500.0);
        assert_eq!(state.health(), 100.0);
        state.apply_raw_damage(1000.0);
        assert_eq!(state.health(), 0.0);
        state.heal(-5.0);
        assert_eq!(state.health(), 0.0);
    }

    #[test]
    fn test_armor_applies_to_contact_only() {
        let mut state = lively();
        state.queue_modifier(Modifier {
            armor: 15.0,
            ..Modifier::default()
        });
        state.recompute_snapshot(&[], false);

        assert_eq!(state.mitigate(20.0, DamageKind::Contact), 5.0);
        assert_eq!(state.mitigate(20.0, DamageKind::Poison), 20.0);
        assert_eq!(state.mitigate(20.0, DamageKind::Reflect), 20.0);
        assert_eq!(state.mitigate(10.0, DamageKind::Contact), 0.0);
    }

    #[test]
    fn test_invincible_takes_nothing() {
        let mut state = lively();
        state.invincible = true;
        assert_eq!(state.apply_raw_damage(50.0), 0.0);
        assert_eq!(state.health(), 100.0);
        assert!(!state.hurt);
    }

    #[test]
    fn test_poison_non_downgrade() {
        let mut state = lively();
        let strong = PoisonSpec {
            damage_per_second: 10.0,
            duration: 4.0,
        };
        let weak = PoisonSpec {
            damage_per_second: 10.0,
            duration: 2.0,
        };
        assert!(state.apply_poison(strong, EntityId(7)));
        assert!(!state.apply_poison(weak, EntityId(8)));
        assert_eq!(state.poison.unwrap().source, EntityId(7));

        // Once the running dose has mostly burned off, the weak one wins.
        state.tick_poison(3.0);
        assert!(state.apply_poison(weak, EntityId(8)));
        assert_eq!(state.poison.unwrap().source, EntityId(8));
    }

    #[test]
    fn test_poison_ticks_to_completion() {
        let mut state = lively();
        state.apply_poison(
            PoisonSpec {
                damage_per_second: 10.0,
                duration: 1.0,
            },
            EntityId(7),
        );
        let mut total = 0.0;
        while let Some((damage, _)) = state.tick_poison(0.3) {
            total += damage;
        }
        assert!((total - 10.0).abs() < 0.001);
        assert!(state.poison.is_none());
    }

    #[test]
    fn test_one_shot_modifiers_consumed_by_fold() {
        let mut state = lively();
        state.queue_modifier(Modifier {
            speed: 0.5,
            ..Modifier::default()
        });
        state.recompute_snapshot(&[], false);
        assert!((state.snapshot.speed - 0.5).abs() < 0.001);

        // Next fold: the one-shot is gone.
        state.recompute_snapshot(&[], false);
        assert!((state.snapshot.speed - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_max_health_shrink_reclamps() {
        let mut state = lively();
        state.queue_modifier(Modifier {
            max_health_flat: 50.0,
            ..Modifier::default()
        });
        state.recompute_snapshot(&[], false);
        state.heal(200.0);
        assert_eq!(state.health(), 150.0);

        // Bonus expires next tick; health clamps back down.
        state.recompute_snapshot(&[], false);
        assert_eq!(state.health(), 100.0);
    }
}
