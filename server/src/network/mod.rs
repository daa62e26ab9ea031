//! Network layer: UDP transport and the per-entity wire codecs.

pub mod encode;
mod server;

pub use server::{ClientConnection, Server};
