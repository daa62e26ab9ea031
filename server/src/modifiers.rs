//! Per-tick stat snapshot composition.
//!
//! Every lively entity rebuilds its `ModifierSnapshot` from a clean baseline
//! each tick by folding independent `Modifier` sources. Folding order is not
//! guaranteed, so every per-field rule is commutative: flat bonuses sum,
//! percentage scalars multiply, defensive fractions take the max, and status
//! booleans or together.

use floret_shared::defs::{Modifier, PoisonSpec};

/// The fully-folded stat values an entity uses for one tick. Never persisted;
/// always derived.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierSnapshot {
    pub speed: f32,
    pub armor: f32,
    pub heal_per_second: f32,
    pub max_health_flat: f32,
    pub damage_reflection: f32,
    pub knockback_absorption: f32,
    pub revolution_speed: f32,
    pub zoom: f32,
    pub extra_slots: u8,
    pub poison: Option<PoisonSpec>,
    pub shocked: bool,
    pub control_rotation: bool,
    pub revive: bool,
}

impl Default for ModifierSnapshot {
    fn default() -> Self {
        Self {
            speed: 1.0,
            armor: 0.0,
            heal_per_second: 0.0,
            max_health_flat: 0.0,
            damage_reflection: 0.0,
            knockback_absorption: 1.0,
            revolution_speed: 1.0,
            zoom: 1.0,
            extra_slots: 0,
            poison: None,
            shocked: false,
            control_rotation: false,
            revive: false,
        }
    }
}

impl ModifierSnapshot {
    /// Fold one source into the snapshot.
    ///
    /// `damp_slows` is the narrow high-rarity exception: speed-reducing
    /// multipliers on Unusual-and-above mobs land at one third of their nominal
    /// penalty. It applies to the speed field only; nothing else is damped.
    pub fn apply(&mut self, m: &Modifier, damp_slows: bool) {
        let mut speed = m.speed;
        if damp_slows && speed < 1.0 {
            speed = 1.0 - (1.0 - speed) / 3.0;
        }
        self.speed *= speed;

        self.armor += m.armor;
        self.heal_per_second += m.heal_per_second;
        self.max_health_flat += m.max_health_flat;

        self.damage_reflection = self.damage_reflection.max(m.damage_reflection);
        self.knockback_absorption *= m.knockback_absorption;
        self.revolution_speed *= m.revolution_speed;
        self.zoom *= m.zoom;
        self.extra_slots = self.extra_slots.saturating_add(m.extra_slots);

        if let Some(poison) = m.poison {
            self.poison = Some(strongest_poison(self.poison, poison));
        }

        self.shocked |= m.shocked;
        self.control_rotation |= m.control_rotation;
        self.revive |= m.revive;
    }

    /// Fold an arbitrary sequence of sources onto a clean baseline.
    pub fn fold<'a>(sources: impl IntoIterator<Item = &'a Modifier>, damp_slows: bool) -> Self {
        let mut snapshot = Self::default();
        for m in sources {
            snapshot.apply(m, damp_slows);
        }
        snapshot
    }
}

/// Strongest-wins combination for poison: higher total prospective damage
/// takes the slot.
pub fn strongest_poison(current: Option<PoisonSpec>, incoming: PoisonSpec) -> PoisonSpec {
    match current {
        Some(existing) if existing.total() >= incoming.total() => existing,
        _ => incoming,
    }
}

/// Persistent account-level bonuses derived from the player's level, folded
/// last into every player snapshot.
pub fn account_modifier(level: u32) -> Modifier {
    Modifier {
        max_health_flat: level as f32 * 2.0,
        extra_slots: (level / 15).min(5) as u8,
        ..Modifier::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_is_order_independent() {
        let armor_buff = Modifier {
            armor: 50.0,
            ..Modifier::default()
        };
        let slow = Modifier {
            speed: 0.5,
            ..Modifier::default()
        };

        let ab = ModifierSnapshot::fold([&armor_buff, &slow], false);
        let ba = ModifierSnapshot::fold([&slow, &armor_buff], false);
        assert_eq!(ab, ba);
        assert_eq!(ab.armor, 50.0);
        assert_eq!(ab.speed, 0.5);
    }

    #[test]
    fn test_fold_is_deterministic() {
        let sources = vec![
            Modifier {
                speed: 0.8,
                armor: 10.0,
                ..Modifier::default()
            },
            Modifier {
                damage_reflection: 0.2,
                shocked: true,
                ..Modifier::default()
            },
        ];
        let a = ModifierSnapshot::fold(sources.iter(), false);
        let b = ModifierSnapshot::fold(sources.iter(), false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_reflection_takes_max_not_sum() {
        let low = Modifier {
            damage_reflection: 0.1,
            ..Modifier::default()
        };
        let high = Modifier {
            damage_reflection: 0.25,
            ..Modifier::default()
        };
        let snapshot = ModifierSnapshot::fold([&low, &high, &low], false);
        assert_eq!(snapshot.damage_reflection, 0.25);
    }

    #[test]
    fn test_booleans_or_together() {
        let shock = Modifier {
            shocked: true,
            ..Modifier::default()
        };
        let snapshot = ModifierSnapshot::fold([&shock, &Modifier::default()], false);
        assert!(snapshot.shocked);
        assert!(!snapshot.control_rotation);
    }

    #[test]
    fn test_high_rarity_slow_damping() {
        let slow = Modifier {
            speed: 0.4,
            ..Modifier::default()
        };

        let normal = ModifierSnapshot::fold([&slow], false);
        assert!((normal.speed - 0.4).abs() < 0.001);

        // Damped: penalty of 0.6 reduced to 0.2.
        let damped = ModifierSnapshot::fold([&slow], true);
        assert!((damped.speed - 0.8).abs() < 0.001);

        // Speed-ups are never damped.
        let haste = Modifier {
            speed: 1.5,
            ..Modifier::default()
        };
        let boosted = ModifierSnapshot::fold([&haste], true);
        assert!((boosted.speed - 1.5).abs() < 0.001);
    }

    #[test]
    fn test_strongest_poison_wins() {
        let weak = PoisonSpec {
            damage_per_second: 5.0,
            duration: 2.0,
        };
        let strong = PoisonSpec {
            damage_per_second: 4.0,
            duration: 4.0,
        };
        let kept = strongest_poison(Some(strong), weak);
        assert_eq!(kept, strong);
        let replaced = strongest_poison(Some(weak), strong);
        assert_eq!(replaced, strong);
    }

    #[test]
    fn test_account_modifier_scales_with_level() {
        let low = account_modifier(1);
        assert_eq!(low.extra_slots, 0);
        let high = account_modifier(45);
        assert_eq!(high.extra_slots, 3);
        assert_eq!(high.max_health_flat, 90.0);
    }
}
