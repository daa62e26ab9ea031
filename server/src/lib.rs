//! Authoritative game server for the floret arena.
//!
//! The simulation is a single-threaded fixed-tick loop owned by
//! [`world::GameWorld`]; the network layer fans the finished tick out to
//! observers as delta-compressed binary updates.

pub mod effects;
pub mod entity;
pub mod ids;
pub mod inventory;
pub mod lively;
pub mod mob_ai;
pub mod modifiers;
pub mod network;
pub mod quadtree;
pub mod world;
