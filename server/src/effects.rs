//! Timed stat effects.
//!
//! An effect is a revocable modifier attached to exactly one target. It is
//! registered into the target's effect set, accumulates elapsed time each
//! tick, and is dropped once its duration runs out. Periodic behavior
//! (poison damage, regeneration) is expressed as countdown fields ticked
//! inline during the owner's tick, never as scheduled callbacks.

use floret_shared::defs::Modifier;

use crate::ids::EntityId;

/// A timed modifier applied to one target.
#[derive(Debug, Clone)]
pub struct Effect {
    /// Who caused this effect, for attribution.
    pub source: EntityId,
    /// Set on registration; an effect never moves between targets.
    target: Option<EntityId>,
    pub duration: f32,
    pub elapsed: f32,
    /// Stat payload folded into the target's snapshot while active.
    pub modifier: Option<Modifier>,
}

impl Effect {
    pub fn new(source: EntityId, duration: f32, modifier: Option<Modifier>) -> Self {
        Self {
            source,
            target: None,
            duration,
            elapsed: 0.0,
            modifier,
        }
    }

    /// Bind to a target. Re-registering to a different target is rejected.
    pub fn start(&mut self, target: EntityId) -> Result<(), &'static str> {
        match self.target {
            None => {
                self.target = Some(target);
                Ok(())
            }
            Some(current) if current == target => Ok(()),
            Some(_) => Err("effect already belongs to another target"),
        }
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Advance elapsed time. Returns true once the effect has expired.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.elapsed += dt;
        self.expired()
    }

    pub fn expired(&self) -> bool {
        self.elapsed >= self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_expires_at_duration() {
        let mut effect = Effect::new(EntityId(1), 1.0, None);
        assert!(!effect.tick(0.4));
        assert!(!effect.tick(0.4));
        assert!(effect.tick(0.4));
        assert!(effect.expired());
    }

    #[test]
    fn test_rebind_to_other_target_rejected() {
        let mut effect = Effect::new(EntityId(1), 5.0, None);
        assert!(effect.start(EntityId(2)).is_ok());
        assert!(effect.start(EntityId(2)).is_ok());
        assert!(effect.start(EntityId(3)).is_err());
        assert_eq!(effect.target(), Some(EntityId(2)));
    }
}
