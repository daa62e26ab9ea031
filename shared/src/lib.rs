pub mod defs;
pub mod hitbox;
pub mod math;
pub mod protocol;

pub use defs::*;
pub use hitbox::*;
pub use math::*;
pub use protocol::*;
