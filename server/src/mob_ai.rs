//! Mob AI state machine.
//!
//! The world gathers everything the AI needs into an `AiContext` before
//! calling `update`, and the AI answers with an `AiIntent` instead of
//! touching the world itself. That keeps target lookup and projectile
//! spawning out of the state machine and avoids borrow tangles.

use rand::Rng;

use floret_shared::defs::{get_projectile_by_id, MobCategory, MobDef, RangedSpec};
use floret_shared::math::Vec2;

use crate::ids::EntityId;

/// Targets are dropped once they stray past this multiple of the aggro radius.
const DEAGGRO_FACTOR: f32 = 2.2;

/// Seconds between wander direction re-rolls.
const WANDER_REROLL_SECS: f32 = 2.0;

/// Fraction of each re-roll interval actually spent moving.
const WANDER_MOVE_FRACTION: f32 = 0.6;

/// How far inside melee range the mob tries to push (radius overlap).
const MELEE_CLOSE_SLACK: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiState {
    /// Rooted in place. Fixed-category mobs spawn here and never leave.
    Locked,
    /// No target; wandering.
    Idle,
    /// Chasing or shooting at a target.
    GetTarget,
    /// Forced retreat; the target is cleared for the duration.
    Backing,
}

/// Validated target data for this tick, gathered by the world.
#[derive(Debug, Clone, Copy)]
pub struct TargetInfo {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Per-tick inputs to the state machine.
pub struct AiContext<'a> {
    pub def: &'a MobDef,
    pub position: Vec2,
    /// The cached target, already validated as alive and active. None when
    /// the cache is empty or stale.
    pub current_target: Option<TargetInfo>,
    /// Nearest hostile inside the aggro radius, for acquisition.
    pub nearest_hostile: Option<TargetInfo>,
    /// Snapshot speed multiplier in effect this tick.
    pub speed_multiplier: f32,
}

/// What the mob wants to do this tick. The world turns this into
/// acceleration, facing and projectile spawns.
#[derive(Debug, Default)]
pub struct AiIntent {
    /// Desired movement as a unit direction scaled by speed, or zero.
    pub movement: Vec2,
    /// Facing angle in radians, when the mob cares about facing.
    pub face: Option<f32>,
    pub shoot: Option<ShootIntent>,
}

#[derive(Debug)]
pub struct ShootIntent {
    pub projectile: &'static str,
    pub direction: Vec2,
}

#[derive(Debug)]
pub struct MobAi {
    pub state: AiState,
    pub target: Option<EntityId>,
    shoot_cooldown: f32,
    wander_timer: f32,
    wander_dir: Vec2,
    /// Rolled once at spawn; a precise mob leads its shots.
    precise: bool,
    backing_timer: f32,
}

impl MobAi {
    pub fn new(def: &MobDef, rng: &mut impl Rng) -> Self {
        let state = match def.category {
            MobCategory::Fixed => AiState::Locked,
            _ => AiState::Idle,
        };
        let precise = match &def.ranged {
            Some(ranged) => rng.gen::<f32>() < ranged.precision_chance,
            None => false,
        };
        Self {
            state,
            target: None,
            shoot_cooldown: 0.0,
            wander_timer: 0.0,
            wander_dir: Vec2::ZERO,
            precise,
            backing_timer: 0.0,
        }
    }

    /// Begin a forced retreat. Ignored by Locked mobs.
    pub fn start_backing(&mut self, duration: f32) {
        if self.state == AiState::Locked {
            return;
        }
        self.state = AiState::Backing;
        self.backing_timer = duration;
        self.target = None;
    }

    pub fn update(&mut self, dt: f32, ctx: &AiContext, rng: &mut impl Rng) -> AiIntent {
        if self.shoot_cooldown > 0.0 {
            self.shoot_cooldown -= dt;
        }

        match self.state {
            AiState::Locked => AiIntent::default(),
            AiState::Backing => self.update_backing(dt, ctx),
            AiState::Idle | AiState::GetTarget => self.update_roaming(dt, ctx, rng),
        }
    }

    fn update_backing(&mut self, dt: f32, ctx: &AiContext) -> AiIntent {
        self.backing_timer -= dt;
        if self.backing_timer <= 0.0 {
            self.state = AiState::Idle;
            return AiIntent::default();
        }
        // Retreat from whatever is closest, or drift if nothing is near.
        let movement = match &ctx.nearest_hostile {
            Some(hostile) => -(hostile.position - ctx.position).normalized(),
            None => self.wander_dir,
        };
        AiIntent {
            movement: movement * ctx.speed_multiplier,
            face: None,
            shoot: None,
        }
    }

    fn update_roaming(&mut self, dt: f32, ctx: &AiContext, rng: &mut impl Rng) -> AiIntent {
        // Validate the cached target, drop it beyond the de-aggro radius.
        let mut target = match (&self.target, &ctx.current_target) {
            (Some(_), Some(info)) => {
                let dist = ctx.position.distance_to(info.position);
                if dist > ctx.def.aggro_radius * DEAGGRO_FACTOR {
                    None
                } else {
                    Some(*info)
                }
            }
            _ => None,
        };

        // Acquire the nearest hostile when aggressive and empty-handed.
        if target.is_none() && ctx.def.category == MobCategory::Hostile {
            target = ctx.nearest_hostile;
        }

        match target {
            Some(info) => {
                self.target = Some(info.id);
                self.state = AiState::GetTarget;
                self.pursue(ctx, info, rng)
            }
            None => {
                self.target = None;
                self.state = AiState::Idle;
                self.wander(dt, ctx, rng)
            }
        }
    }

    /// Idle-wander: re-roll a direction on a fixed interval, move for a
    /// bounded fraction of it, then stand still until the next roll.
    fn wander(&mut self, dt: f32, ctx: &AiContext, rng: &mut impl Rng) -> AiIntent {
        self.wander_timer -= dt;
        if self.wander_timer <= 0.0 {
            self.wander_timer = WANDER_REROLL_SECS;
            let angle = rng.gen::<f32>() * std::f32::consts::TAU;
            self.wander_dir = Vec2::from_polar(angle, 1.0);
        }
        let moving = self.wander_timer > WANDER_REROLL_SECS * (1.0 - WANDER_MOVE_FRACTION);
        let movement = if moving {
            self.wander_dir * ctx.speed_multiplier * 0.5
        } else {
            Vec2::ZERO
        };
        AiIntent {
            face: (movement != Vec2::ZERO).then(|| self.wander_dir.angle()),
            movement,
            shoot: None,
        }
    }

    fn pursue(&mut self, ctx: &AiContext, info: TargetInfo, rng: &mut impl Rng) -> AiIntent {
        let to_target = info.position - ctx.position;
        let dist = to_target.length();
        let dir = to_target.normalized();
        let face = Some(dir.angle());

        match &ctx.def.ranged {
            Some(ranged) => {
                let shoot = if self.shoot_cooldown <= 0.0 {
                    self.shoot_cooldown = rng.gen_range(ranged.min_cooldown..=ranged.max_cooldown);
                    Some(ShootIntent {
                        projectile: ranged.projectile,
                        direction: self.aim(ctx.position, info, ranged),
                    })
                } else {
                    None
                };
                // Keep-distance shooters retreat from a crowding target
                // while reloading; everyone closes toward shooting range.
                let preferred = ctx.def.aggro_radius * 0.6;
                let movement = if ranged.keep_distance && self.shoot_cooldown > 0.0 && dist < preferred
                {
                    -dir * ctx.speed_multiplier
                } else if dist > preferred {
                    dir * ctx.speed_multiplier
                } else {
                    Vec2::ZERO
                };
                AiIntent {
                    movement,
                    face,
                    shoot,
                }
            }
            None => {
                // Melee: push slightly past contact range so the hitboxes meet.
                let reach = ctx.def.radius * MELEE_CLOSE_SLACK;
                let movement = if dist > reach {
                    dir * ctx.speed_multiplier
                } else {
                    Vec2::ZERO
                };
                AiIntent {
                    movement,
                    face,
                    shoot: None,
                }
            }
        }
    }

    /// Aim direction for a shot. Precise mobs lead the target using the
    /// velocity component perpendicular to the line of fire, clamped to a
    /// fraction of the projectile's own speed.
    fn aim(&self, from: Vec2, info: TargetInfo, ranged: &RangedSpec) -> Vec2 {
        let dir = (info.position - from).normalized();
        if !self.precise {
            return dir;
        }
        let projectile_speed = match get_projectile_by_id(ranged.projectile) {
            Some(def) => def.speed,
            None => return dir,
        };
        let lateral = info.velocity - dir * info.velocity.dot(dir);
        let limit = projectile_speed * 0.5;
        let lateral = if lateral.length() > limit {
            lateral.normalized() * limit
        } else {
            lateral
        };
        (dir * projectile_speed + lateral).normalized()
    }
}
