//! Static content definitions shared between client and server.
//!
//! Mobs, petals and projectiles are defined here as plain read-only tables,
//! looked up by string id. The server treats them as opaque inputs; balance
//! numbers live in this one place.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

// =============================================================================
// Stat Modifiers
// =============================================================================

/// Poison parameters carried by a modifier. Strongest total damage wins when
/// two sources compete.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoisonSpec {
    pub damage_per_second: f32,
    pub duration: f32,
}

impl PoisonSpec {
    /// Total prospective damage, the quantity compared on re-application.
    pub fn total(&self) -> f32 {
        self.damage_per_second * self.duration
    }
}

/// One source's contribution to an entity's per-tick stat snapshot.
///
/// Default is the identity: folding a default modifier changes nothing.
/// Combination rules per field live in the server's snapshot fold; fields
/// here just declare the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    /// Movement speed multiplier (multiplicative).
    pub speed: f32,
    /// Flat armor deducted from incoming contact damage (additive).
    pub armor: f32,
    /// Health regeneration per second (additive).
    pub heal_per_second: f32,
    /// Flat bonus to max health (additive).
    pub max_health_flat: f32,
    /// Fraction of received damage reflected at the source (max wins).
    pub damage_reflection: f32,
    /// Knockback received multiplier; below 1.0 resists pushes (multiplicative).
    pub knockback_absorption: f32,
    /// Petal revolution speed multiplier (multiplicative).
    pub revolution_speed: f32,
    /// View radius multiplier (multiplicative).
    pub zoom: f32,
    /// Extra equipment slots (additive).
    pub extra_slots: u8,
    /// Poison applied on contact (strongest total wins).
    pub poison: Option<PoisonSpec>,
    /// Shocked entities cannot rotate their petals (boolean or).
    pub shocked: bool,
    /// Revolution angle follows the aim direction instead of advancing (boolean or).
    pub control_rotation: bool,
    /// A single-use death save is available (boolean or).
    pub revive: bool,
}

impl Default for Modifier {
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

// =============================================================================
// Common Def Types
// =============================================================================

/// Content rarity. Ordering matters: some modifier rules key off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Rarity {
    Common = 0,
    Unusual = 1,
    Rare = 2,
    Epic = 3,
    Legendary = 4,
    Mythic = 5,
}

impl Rarity {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Common),
            1 => Some(Self::Unusual),
            2 => Some(Self::Rare),
            3 => Some(Self::Epic),
            4 => Some(Self::Legendary),
            5 => Some(Self::Mythic),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Broad behavior class of a mob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MobCategory {
    /// Attacks hostile teams on sight.
    Hostile,
    /// Retaliates but does not seek targets.
    Neutral,
    /// Never acquires a hostile target.
    Passive,
    /// Never moves; spawns locked in place.
    Fixed,
}

// =============================================================================
// Mob Definitions
// =============================================================================

/// Ranged attack parameters for mobs that shoot.
#[derive(Debug, Clone)]
pub struct RangedSpec {
    pub projectile: &'static str,
    /// Cooldown is re-rolled in [min, max] once per shot cycle.
    pub min_cooldown: f32,
    pub max_cooldown: f32,
    /// Back away instead of closing while the shot reloads.
    pub keep_distance: bool,
    /// Chance per spawned instance to get lead-prediction aim.
    pub precision_chance: f32,
}

/// A loot table entry rolled on death.
#[derive(Debug, Clone, Copy)]
pub struct LootDrop {
    pub petal: &'static str,
    pub chance: f32,
}

/// A timed debuff applied to whatever the owner hits. Reapplication from
/// the same source refreshes the timer instead of stacking.
#[derive(Debug, Clone)]
pub struct HitEffect {
    pub modifier: Modifier,
    pub duration: f32,
}

/// Creature definition.
#[derive(Debug, Clone)]
pub struct MobDef {
    pub id: &'static str,
    /// Wire tag, unique among mobs.
    pub tag: u8,
    pub name: &'static str,
    pub rarity: Rarity,
    pub category: MobCategory,
    pub health: f32,
    /// Contact damage; None means the mob cannot deal contact damage.
    pub damage: Option<f32>,
    pub weight: f32,
    pub radius: f32,
    pub speed: f32,
    pub aggro_radius: f32,
    pub knockback: f32,
    pub experience: u32,
    /// Body segments trailing behind the head (centipede-style). 0 = none.
    pub segments: u8,
    pub ranged: Option<RangedSpec>,
    /// Innate per-type stat bias, folded first into every snapshot.
    pub constant: Modifier,
    /// Timed debuff inflicted by contact hits.
    pub effect_on_hit: Option<HitEffect>,
    pub loot: Vec<LootDrop>,
}

/// Built-in creature table.
fn build_mob_definitions() -> Vec<MobDef> {
    vec![
        MobDef {
            id: "ladybug",
            tag: 0,
            name: "Ladybug",
            rarity: Rarity::Common,
            category: MobCategory::Passive,
            health: 50.0,
            damage: Some(10.0),
            weight: 2.0,
            radius: 20.0,
            speed: 60.0,
            aggro_radius: 0.0,
            knockback: 4.0,
            experience: 4,
            segments: 0,
            ranged: None,
            constant: Modifier::default(),
            effect_on_hit: None,
            loot: vec![
                LootDrop { petal: "light", chance: 0.25 },
                LootDrop { petal: "rose", chance: 0.12 },
            ],
        },
        MobDef {
            id: "rock",
            tag: 1,
            name: "Rock",
            rarity: Rarity::Common,
            category: MobCategory::Fixed,
            health: 90.0,
            damage: Some(8.0),
            weight: 20.0,
            radius: 24.0,
            speed: 0.0,
            aggro_radius: 0.0,
            knockback: 6.0,
            experience: 3,
            segments: 0,
            ranged: None,
            constant: Modifier {
                knockback_absorption: 0.0,
                ..Modifier::default()
            },
            effect_on_hit: None,
            loot: vec![LootDrop { petal: "heavy", chance: 0.18 }],
        },
        MobDef {
            id: "bee",
            tag: 2,
            name: "Bee",
            rarity: Rarity::Common,
            category: MobCategory::Neutral,
            health: 35.0,
            damage: Some(25.0),
            weight: 1.5,
            radius: 16.0,
            speed: 70.0,
            aggro_radius: 300.0,
            knockback: 6.0,
            experience: 6,
            segments: 0,
            ranged: None,
            constant: Modifier::default(),
            effect_on_hit: None,
            loot: vec![
                LootDrop { petal: "stinger", chance: 0.2 },
                LootDrop { petal: "light", chance: 0.3 },
            ],
        },
        MobDef {
            id: "spider",
            tag: 3,
            name: "Spider",
            rarity: Rarity::Unusual,
            category: MobCategory::Hostile,
            health: 60.0,
            damage: Some(20.0),
            weight: 2.0,
            radius: 18.0,
            speed: 120.0,
            aggro_radius: 420.0,
            knockback: 5.0,
            experience: 12,
            segments: 0,
            ranged: None,
            constant: Modifier {
                poison: Some(PoisonSpec {
                    damage_per_second: 10.0,
                    duration: 3.0,
                }),
                ..Modifier::default()
            },
            // Web snare: victims crawl at a third speed for two seconds.
            effect_on_hit: Some(HitEffect {
                modifier: Modifier {
                    speed: 0.35,
                    ..Modifier::default()
                },
                duration: 2.0,
            }),
            loot: vec![
                LootDrop { petal: "iris", chance: 0.15 },
                LootDrop { petal: "web", chance: 0.1 },
                LootDrop { petal: "third_eye", chance: 0.03 },
            ],
        },
        MobDef {
            id: "hornet",
            tag: 4,
            name: "Hornet",
            rarity: Rarity::Rare,
            category: MobCategory::Hostile,
            health: 80.0,
            damage: Some(30.0),
            weight: 2.5,
            radius: 20.0,
            speed: 90.0,
            aggro_radius: 550.0,
            knockback: 5.0,
            experience: 20,
            segments: 0,
            ranged: Some(RangedSpec {
                projectile: "missile",
                min_cooldown: 1.2,
                max_cooldown: 2.4,
                keep_distance: true,
                precision_chance: 0.35,
            }),
            constant: Modifier::default(),
            effect_on_hit: None,
            loot: vec![
                LootDrop { petal: "stinger", chance: 0.35 },
                LootDrop { petal: "wing", chance: 0.1 },
            ],
        },
        MobDef {
            id: "wasp",
            tag: 5,
            name: "Wasp",
            rarity: Rarity::Epic,
            category: MobCategory::Hostile,
            health: 140.0,
            damage: Some(40.0),
            weight: 3.0,
            radius: 22.0,
            speed: 100.0,
            aggro_radius: 600.0,
            knockback: 6.0,
            experience: 40,
            segments: 0,
            ranged: Some(RangedSpec {
                projectile: "burst",
                min_cooldown: 2.0,
                max_cooldown: 3.5,
                keep_distance: true,
                precision_chance: 0.6,
            }),
            constant: Modifier::default(),
            effect_on_hit: None,
            loot: vec![
                LootDrop { petal: "wing", chance: 0.25 },
                LootDrop { petal: "talisman", chance: 0.05 },
            ],
        },
        MobDef {
            id: "centipede",
            tag: 6,
            name: "Centipede",
            rarity: Rarity::Unusual,
            category: MobCategory::Passive,
            health: 50.0,
            damage: Some(10.0),
            weight: 4.0,
            radius: 22.0,
            speed: 50.0,
            aggro_radius: 0.0,
            knockback: 3.0,
            experience: 8,
            segments: 8,
            ranged: None,
            constant: Modifier::default(),
            effect_on_hit: None,
            loot: vec![
                LootDrop { petal: "leaf", chance: 0.2 },
                LootDrop { petal: "faster", chance: 0.08 },
            ],
        },
        MobDef {
            id: "cactus",
            tag: 7,
            name: "Cactus",
            rarity: Rarity::Common,
            category: MobCategory::Fixed,
            health: 70.0,
            damage: Some(18.0),
            weight: 10.0,
            radius: 28.0,
            speed: 0.0,
            aggro_radius: 0.0,
            knockback: 4.0,
            experience: 5,
            segments: 0,
            ranged: None,
            constant: Modifier {
                damage_reflection: 0.1,
                ..Modifier::default()
            },
            effect_on_hit: None,
            loot: vec![
                LootDrop { petal: "cactus", chance: 0.2 },
                LootDrop { petal: "salt", chance: 0.06 },
            ],
        },
    ]
}

// =============================================================================
// Petal Definitions
// =============================================================================

/// How a petal's orbit radius behaves beyond the shared easing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrbitBehavior {
    /// Sits at the bunch radius.
    Normal,
    /// Permanently orbits further out by `distance`.
    Extend { distance: f32 },
    /// Moves out and back on a timed cycle.
    Swing { period: f32, amplitude: f32 },
}

/// Equippable item definition. One slot holds one petal def; a def may
/// manifest as several physical pieces.
#[derive(Debug, Clone)]
pub struct PetalDef {
    pub id: &'static str,
    /// Wire tag, unique among petals.
    pub tag: u8,
    pub name: &'static str,
    pub rarity: Rarity,
    /// Physical sub-entities spawned for this slot.
    pub pieces: u8,
    pub health: f32,
    pub damage: Option<f32>,
    pub weight: f32,
    pub radius: f32,
    pub knockback: f32,
    /// Seconds to respawn a destroyed piece.
    pub reload_secs: f32,
    /// Stat contribution to the wearer while equipped.
    pub wearer: Modifier,
    /// Applies its wearer modifier at most once across copies.
    pub unstackable: bool,
    /// Wearer modifier counts even during the very first reload cycle.
    pub apply_from_start: bool,
    /// All pieces cluster near one orbit point with a fast local spin.
    pub shown_in_one: bool,
    pub behavior: OrbitBehavior,
    /// Poison applied to whatever this petal hits.
    pub poison_on_hit: Option<PoisonSpec>,
    /// Timed debuff applied to whatever this petal hits.
    pub effect_on_hit: Option<HitEffect>,
}

/// Built-in petal table.
fn build_petal_definitions() -> Vec<PetalDef> {
    vec![
        PetalDef {
            id: "basic",
            tag: 0,
            name: "Basic",
            rarity: Rarity::Common,
            pieces: 1,
            health: 10.0,
            damage: Some(10.0),
            weight: 1.0,
            radius: 10.0,
            knockback: 3.0,
            reload_secs: 2.5,
            wearer: Modifier::default(),
            unstackable: false,
            apply_from_start: false,
            shown_in_one: false,
            behavior: OrbitBehavior::Normal,
            poison_on_hit: None,
            effect_on_hit: None,
        },
        PetalDef {
            id: "light",
            tag: 1,
            name: "Light",
            rarity: Rarity::Common,
            pieces: 2,
            health: 5.0,
            damage: Some(7.0),
            weight: 0.5,
            radius: 7.0,
            knockback: 2.0,
            reload_secs: 0.8,
            wearer: Modifier::default(),
            unstackable: false,
            apply_from_start: false,
            shown_in_one: false,
            behavior: OrbitBehavior::Normal,
            poison_on_hit: None,
            effect_on_hit: None,
        },
        PetalDef {
            id: "stinger",
            tag: 2,
            name: "Stinger",
            rarity: Rarity::Unusual,
            pieces: 3,
            health: 3.0,
            damage: Some(35.0),
            weight: 0.5,
            radius: 7.0,
            knockback: 2.0,
            reload_secs: 4.0,
            wearer: Modifier::default(),
            unstackable: false,
            apply_from_start: false,
            shown_in_one: true,
            behavior: OrbitBehavior::Normal,
            poison_on_hit: None,
            effect_on_hit: None,
        },
        PetalDef {
            id: "rose",
            tag: 3,
            name: "Rose",
            rarity: Rarity::Unusual,
            pieces: 1,
            health: 5.0,
            damage: None,
            weight: 0.5,
            radius: 10.0,
            knockback: 1.0,
            reload_secs: 3.5,
            wearer: Modifier {
                heal_per_second: 3.0,
                ..Modifier::default()
            },
            unstackable: false,
            apply_from_start: false,
            shown_in_one: false,
            behavior: OrbitBehavior::Normal,
            poison_on_hit: None,
            effect_on_hit: None,
        },
        PetalDef {
            id: "iris",
            tag: 4,
            name: "Iris",
            rarity: Rarity::Rare,
            pieces: 1,
            health: 5.0,
            damage: Some(5.0),
            weight: 0.5,
            radius: 8.0,
            knockback: 1.0,
            reload_secs: 5.5,
            wearer: Modifier::default(),
            unstackable: false,
            apply_from_start: false,
            shown_in_one: false,
            behavior: OrbitBehavior::Normal,
            poison_on_hit: Some(PoisonSpec {
                damage_per_second: 9.0,
                duration: 6.0,
            }),
            effect_on_hit: None,
        },
        PetalDef {
            id: "cactus",
            tag: 5,
            name: "Cactus",
            rarity: Rarity::Unusual,
            pieces: 1,
            health: 15.0,
            damage: Some(5.0),
            weight: 1.0,
            radius: 12.0,
            knockback: 3.0,
            reload_secs: 1.0,
            wearer: Modifier {
                max_health_flat: 20.0,
                ..Modifier::default()
            },
            unstackable: false,
            apply_from_start: false,
            shown_in_one: false,
            behavior: OrbitBehavior::Normal,
            poison_on_hit: None,
            effect_on_hit: None,
        },
        PetalDef {
            id: "salt",
            tag: 6,
            name: "Salt",
            rarity: Rarity::Rare,
            pieces: 1,
            health: 10.0,
            damage: Some(10.0),
            weight: 1.0,
            radius: 10.0,
            knockback: 3.0,
            reload_secs: 2.5,
            wearer: Modifier {
                damage_reflection: 0.2,
                ..Modifier::default()
            },
            unstackable: true,
            apply_from_start: false,
            shown_in_one: false,
            behavior: OrbitBehavior::Normal,
            poison_on_hit: None,
            effect_on_hit: None,
        },
        PetalDef {
            id: "wing",
            tag: 7,
            name: "Wing",
            rarity: Rarity::Rare,
            pieces: 1,
            health: 10.0,
            damage: Some(15.0),
            weight: 1.0,
            radius: 11.0,
            knockback: 4.0,
            reload_secs: 1.25,
            wearer: Modifier::default(),
            unstackable: false,
            apply_from_start: false,
            shown_in_one: false,
            behavior: OrbitBehavior::Swing {
                period: 1.6,
                amplitude: 60.0,
            },
            poison_on_hit: None,
            effect_on_hit: None,
        },
        PetalDef {
            id: "faster",
            tag: 8,
            name: "Faster",
            rarity: Rarity::Unusual,
            pieces: 1,
            health: 5.0,
            damage: Some(8.0),
            weight: 0.5,
            radius: 8.0,
            knockback: 2.0,
            reload_secs: 1.0,
            wearer: Modifier {
                revolution_speed: 1.25,
                ..Modifier::default()
            },
            unstackable: false,
            apply_from_start: false,
            shown_in_one: false,
            behavior: OrbitBehavior::Normal,
            poison_on_hit: None,
            effect_on_hit: None,
        },
        PetalDef {
            id: "leaf",
            tag: 9,
            name: "Leaf",
            rarity: Rarity::Unusual,
            pieces: 1,
            health: 10.0,
            damage: Some(8.0),
            weight: 1.0,
            radius: 10.0,
            knockback: 2.0,
            reload_secs: 1.0,
            wearer: Modifier {
                heal_per_second: 1.0,
                ..Modifier::default()
            },
            unstackable: false,
            apply_from_start: true,
            shown_in_one: false,
            behavior: OrbitBehavior::Normal,
            poison_on_hit: None,
            effect_on_hit: None,
        },
        PetalDef {
            id: "third_eye",
            tag: 10,
            name: "Third Eye",
            rarity: Rarity::Epic,
            pieces: 1,
            health: 5.0,
            damage: None,
            weight: 0.5,
            radius: 8.0,
            knockback: 1.0,
            reload_secs: 2.0,
            wearer: Modifier {
                zoom: 1.3,
                ..Modifier::default()
            },
            unstackable: true,
            apply_from_start: false,
            shown_in_one: false,
            behavior: OrbitBehavior::Extend { distance: 90.0 },
            poison_on_hit: None,
            effect_on_hit: None,
        },
        PetalDef {
            id: "heavy",
            tag: 11,
            name: "Heavy",
            rarity: Rarity::Unusual,
            pieces: 1,
            health: 30.0,
            damage: Some(12.0),
            weight: 6.0,
            radius: 13.0,
            knockback: 8.0,
            reload_secs: 4.5,
            wearer: Modifier {
                knockback_absorption: 0.7,
                ..Modifier::default()
            },
            unstackable: true,
            apply_from_start: false,
            shown_in_one: false,
            behavior: OrbitBehavior::Normal,
            poison_on_hit: None,
            effect_on_hit: None,
        },
        PetalDef {
            id: "talisman",
            tag: 12,
            name: "Talisman",
            rarity: Rarity::Legendary,
            pieces: 1,
            health: 5.0,
            damage: None,
            weight: 0.5,
            radius: 9.0,
            knockback: 1.0,
            reload_secs: 6.0,
            wearer: Modifier {
                revive: true,
                ..Modifier::default()
            },
            unstackable: true,
            apply_from_start: false,
            shown_in_one: false,
            behavior: OrbitBehavior::Normal,
            poison_on_hit: None,
            effect_on_hit: None,
        },
        PetalDef {
            id: "web",
            tag: 13,
            name: "Web",
            rarity: Rarity::Rare,
            pieces: 1,
            health: 8.0,
            damage: Some(5.0),
            weight: 0.8,
            radius: 12.0,
            knockback: 1.0,
            reload_secs: 3.0,
            wearer: Modifier::default(),
            unstackable: false,
            apply_from_start: false,
            shown_in_one: false,
            behavior: OrbitBehavior::Normal,
            poison_on_hit: None,
            effect_on_hit: Some(HitEffect {
                modifier: Modifier {
                    speed: 0.5,
                    ..Modifier::default()
                },
                duration: 1.5,
            }),
        },
    ]
}

// =============================================================================
// Projectile Definitions
// =============================================================================

/// Something a projectile leaves behind when its despawn timer expires.
#[derive(Debug, Clone)]
pub enum ExpireSpawn {
    Projectile { id: &'static str, count: u8 },
    Mob { id: &'static str, count: u8 },
}

/// Projectile definition.
#[derive(Debug, Clone)]
pub struct ProjectileDef {
    pub id: &'static str,
    /// Wire tag, unique among projectiles.
    pub tag: u8,
    pub speed: f32,
    pub radius: f32,
    pub health: f32,
    pub damage: f32,
    pub weight: f32,
    pub knockback: f32,
    /// Seconds until the projectile destroys itself.
    pub despawn_secs: f32,
    /// Spawned exactly once on expiry.
    pub spawn_on_expire: Vec<ExpireSpawn>,
}

/// Built-in projectile table.
fn build_projectile_definitions() -> Vec<ProjectileDef> {
    vec![
        ProjectileDef {
            id: "missile",
            tag: 0,
            speed: 260.0,
            radius: 8.0,
            health: 10.0,
            damage: 12.0,
            weight: 0.5,
            knockback: 3.0,
            despawn_secs: 2.5,
            spawn_on_expire: vec![],
        },
        ProjectileDef {
            id: "burst",
            tag: 1,
            speed: 200.0,
            radius: 12.0,
            health: 20.0,
            damage: 10.0,
            weight: 1.0,
            knockback: 4.0,
            despawn_secs: 3.0,
            spawn_on_expire: vec![ExpireSpawn::Projectile {
                id: "spark",
                count: 3,
            }],
        },
        ProjectileDef {
            id: "spark",
            tag: 2,
            speed: 320.0,
            radius: 5.0,
            health: 1.0,
            damage: 6.0,
            weight: 0.2,
            knockback: 1.0,
            despawn_secs: 0.8,
            spawn_on_expire: vec![],
        },
    ]
}

// =============================================================================
// Lookup helpers
// =============================================================================

// The tables are built once and indexed by id after that; lookups run on
// the hot spawn paths every tick.

/// The full creature table.
pub fn get_mob_definitions() -> &'static [MobDef] {
    static TABLE: OnceLock<Vec<MobDef>> = OnceLock::new();
    TABLE.get_or_init(build_mob_definitions)
}

/// The full petal table.
pub fn get_petal_definitions() -> &'static [PetalDef] {
    static TABLE: OnceLock<Vec<PetalDef>> = OnceLock::new();
    TABLE.get_or_init(build_petal_definitions)
}

/// The full projectile table.
pub fn get_projectile_definitions() -> &'static [ProjectileDef] {
    static TABLE: OnceLock<Vec<ProjectileDef>> = OnceLock::new();
    TABLE.get_or_init(build_projectile_definitions)
}

fn mob_table() -> &'static HashMap<&'static str, &'static MobDef> {
    static TABLE: OnceLock<HashMap<&'static str, &'static MobDef>> = OnceLock::new();
    TABLE.get_or_init(|| get_mob_definitions().iter().map(|m| (m.id, m)).collect())
}

fn petal_table() -> &'static HashMap<&'static str, &'static PetalDef> {
    static TABLE: OnceLock<HashMap<&'static str, &'static PetalDef>> = OnceLock::new();
    TABLE.get_or_init(|| get_petal_definitions().iter().map(|p| (p.id, p)).collect())
}

fn projectile_table() -> &'static HashMap<&'static str, &'static ProjectileDef> {
    static TABLE: OnceLock<HashMap<&'static str, &'static ProjectileDef>> = OnceLock::new();
    TABLE.get_or_init(|| get_projectile_definitions().iter().map(|p| (p.id, p)).collect())
}

/// Get a mob definition by string id.
pub fn get_mob_by_id(id: &str) -> Option<MobDef> {
    mob_table().get(id).map(|d| (*d).clone())
}

/// Get a petal definition by string id.
pub fn get_petal_by_id(id: &str) -> Option<PetalDef> {
    petal_table().get(id).map(|d| (*d).clone())
}

/// Get a projectile definition by string id.
pub fn get_projectile_by_id(id: &str) -> Option<ProjectileDef> {
    projectile_table().get(id).map(|d| (*d).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tags_are_unique() {
        let mobs = get_mob_definitions();
        for a in mobs {
            for b in mobs {
                if a.id != b.id {
                    assert_ne!(a.tag, b.tag, "{} and {} share a tag", a.id, b.id);
                }
            }
        }
        let petals = get_petal_definitions();
        for a in petals {
            for b in petals {
                if a.id != b.id {
                    assert_ne!(a.tag, b.tag, "{} and {} share a tag", a.id, b.id);
                }
            }
        }
    }

    #[test]
    fn test_loot_references_resolve() {
        for mob in get_mob_definitions() {
            for drop in &mob.loot {
                assert!(
                    get_petal_by_id(drop.petal).is_some(),
                    "{} drops unknown petal {}",
                    mob.id,
                    drop.petal
                );
            }
            if let Some(ranged) = &mob.ranged {
                assert!(get_projectile_by_id(ranged.projectile).is_some());
            }
        }
        for projectile in get_projectile_definitions() {
            for spawn in &projectile.spawn_on_expire {
                match spawn {
                    ExpireSpawn::Projectile { id, .. } => {
                        assert!(get_projectile_by_id(id).is_some())
                    }
                    ExpireSpawn::Mob { id, .. } => assert!(get_mob_by_id(id).is_some()),
                }
            }
        }
    }

    #[test]
    fn test_default_modifier_is_identity() {
        let m = Modifier::default();
        assert_eq!(m.speed, 1.0);
        assert_eq!(m.armor, 0.0);
        assert_eq!(m.knockback_absorption, 1.0);
        assert!(m.poison.is_none());
        assert!(!m.shocked);
    }
}
