//! Network protocol definitions shared between client and server.
//!
//! Client -> server traffic is small and infrequent enough that it uses a
//! bincode-serialized enum. Server -> client traffic is the per-tick update
//! stream, which is hand-packed into a compact binary layout with per-entity
//! partial/full blocks (see `ByteWriter`).

use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Server tick rate in Hz
pub const SERVER_TICK_RATE: u32 = 25;

/// Default server port
pub const DEFAULT_PORT: u16 = 7777;

/// World dimensions in units
pub const WORLD_WIDTH: f32 = 3000.0;
pub const WORLD_HEIGHT: f32 = 3000.0;

/// Base per-observer visibility radius, scaled by the player's zoom
pub const BASE_VIEW_RADIUS: f32 = 900.0;

/// Starting and maximum equipment slot counts
pub const BASE_SLOTS: u8 = 5;
pub const MAX_SLOTS: u8 = 10;

/// Maximum datagram size
pub const MAX_PACKET_SIZE: usize = 60_000;

// =============================================================================
// Client -> Server Messages
// =============================================================================

/// Discrete one-shot actions queued inside an input packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    /// Swap two inventory slots.
    SwapSlots { from: u8, to: u8 },
    /// Drop the petal in a slot.
    DeleteSlot { slot: u8 },
    /// Swap the whole loadout with the stashed secondary row.
    TransformLoadout,
    /// Leave the game gracefully.
    Leave,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Enter the world
    Join {
        protocol_version: u32,
        name: String,
        /// Reclaims a still-live player entity after a transport drop
        reconnect_secret: Option<u64>,
        /// Optional starting loadout as petal string ids
        loadout: Option<Vec<String>>,
    },

    /// Movement intent + held buttons, sent every client frame
    Input {
        /// Desired movement direction in radians
        direction: f32,
        /// Input magnitude in [0, 1]
        magnitude: f32,
        /// Attack intent (petals extend)
        primary: bool,
        /// Defend intent (petals retract)
        secondary: bool,
        /// One-shot actions queued since the last input packet
        actions: Vec<PlayerAction>,
    },

    /// RTT probe, echoed back verbatim
    Ping { nonce: u32 },
}

impl ClientMessage {
    pub fn serialize(&self) -> Vec<u8> {
        bincode::serialize(self).expect("Failed to serialize ClientMessage")
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

// =============================================================================
// Server -> Client packet framing
// =============================================================================

/// First byte of every server -> client datagram.
pub mod packet {
    /// Per-tick world update
    pub const UPDATE: u8 = 0;
    /// Join accepted: self id, reconnect secret, world dimensions
    pub const ACCEPT: u8 = 1;
    /// Join rejected: reason string
    pub const REJECT: u8 = 2;
    /// Ping echo
    pub const PONG: u8 = 3;
}

/// Entity type tag on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntityTag {
    Player = 0,
    Petal = 1,
    Mob = 2,
    Loot = 3,
    Projectile = 4,
    Wall = 5,
}

impl EntityTag {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Player),
            1 => Some(Self::Petal),
            2 => Some(Self::Mob),
            3 => Some(Self::Loot),
            4 => Some(Self::Projectile),
            5 => Some(Self::Wall),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Reserved byte budget for this tag's partial block.
    pub fn partial_budget(&self) -> usize {
        match self {
            EntityTag::Player => 12,
            EntityTag::Petal => 10,
            EntityTag::Mob => 10,
            EntityTag::Loot => 8,
            EntityTag::Projectile => 10,
            EntityTag::Wall => 16,
        }
    }

    /// Reserved byte budget for this tag's full block.
    pub fn full_budget(&self) -> usize {
        match self {
            EntityTag::Player => 40,
            EntityTag::Petal => 6,
            EntityTag::Mob => 6,
            EntityTag::Loot => 2,
            EntityTag::Projectile => 2,
            EntityTag::Wall => 0,
        }
    }
}

// =============================================================================
// Binary writer / reader
// =============================================================================

/// Append-only little-endian byte writer for the update stream.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_vec2(&mut self, v: Vec2) {
        self.put_f32(v.x);
        self.put_f32(v.y);
    }

    /// Quantize a value over [min, max] to 16 bits. Values outside the
    /// range clamp to its edges.
    pub fn put_quantized(&mut self, value: f32, min: f32, max: f32) {
        let t = ((value - min) / (max - min)).clamp(0.0, 1.0);
        self.put_u16((t * u16::MAX as f32).round() as u16);
    }

    /// Length-prefixed UTF-8 string, truncated to 255 bytes.
    pub fn put_str(&mut self, s: &str) {
        let bytes = s.as_bytes();
        let len = bytes.len().min(255);
        self.put_u8(len as u8);
        self.buf.extend_from_slice(&bytes[..len]);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked reader over a received datagram. Every read returns
/// `None` past the end instead of panicking; a malformed packet simply
/// stops decoding.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.take(1).map(|s| s[0])
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        self.take(2).map(|s| u16::from_le_bytes([s[0], s[1]]))
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        self.take(4)
            .map(|s| u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    pub fn read_u64(&mut self) -> Option<u64> {
        self.take(8)
            .map(|s| u64::from_le_bytes([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]]))
    }

    pub fn read_f32(&mut self) -> Option<f32> {
        self.take(4)
            .map(|s| f32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    pub fn read_vec2(&mut self) -> Option<Vec2> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        Some(Vec2::new(x, y))
    }

    pub fn read_quantized(&mut self, min: f32, max: f32) -> Option<f32> {
        let raw = self.read_u16()?;
        Some(min + (raw as f32 / u16::MAX as f32) * (max - min))
    }

    pub fn read_str(&mut self) -> Option<String> {
        let len = self.read_u8()? as usize;
        let bytes = self.take(len)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_reader_roundtrip() {
        let mut w = ByteWriter::new();
        w.put_u8(7);
        w.put_u16(65000);
        w.put_u32(123_456);
        w.put_f32(3.5);
        w.put_vec2(Vec2::new(-1.0, 2.0));
        w.put_str("floret");
        let data = w.finish();

        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_u8(), Some(7));
        assert_eq!(r.read_u16(), Some(65000));
        assert_eq!(r.read_u32(), Some(123_456));
        assert_eq!(r.read_f32(), Some(3.5));
        assert_eq!(r.read_vec2(), Some(Vec2::new(-1.0, 2.0)));
        assert_eq!(r.read_str().as_deref(), Some("floret"));
        assert_eq!(r.read_u8(), None);
    }

    #[test]
    fn test_quantized_fraction_precision() {
        let mut w = ByteWriter::new();
        w.put_quantized(0.37, 0.0, 1.0);
        w.put_quantized(2.0, 0.0, 1.0); // clamps to 1.0
        let data = w.finish();

        let mut r = ByteReader::new(&data);
        let v = r.read_quantized(0.0, 1.0).unwrap();
        assert!((v - 0.37).abs() < 0.001);
        let clamped = r.read_quantized(0.0, 1.0).unwrap();
        assert!((clamped - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_truncated_packet_stops_decoding() {
        let mut w = ByteWriter::new();
        w.put_u32(42);
        let data = w.finish();

        let mut r = ByteReader::new(&data[..2]);
        assert_eq!(r.read_u32(), None);
    }

    #[test]
    fn test_client_message_bincode_roundtrip() {
        let msg = ClientMessage::Input {
            direction: 1.2,
            magnitude: 0.8,
            primary: true,
            secondary: false,
            actions: vec![PlayerAction::SwapSlots { from: 0, to: 3 }],
        };
        let data = msg.serialize();
        let back = ClientMessage::deserialize(&data).unwrap();
        match back {
            ClientMessage::Input {
                primary, actions, ..
            } => {
                assert!(primary);
                assert_eq!(actions.len(), 1);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_entity_tag_roundtrip() {
        for raw in 0..=5u8 {
            let tag = EntityTag::from_u8(raw).unwrap();
            assert_eq!(tag.as_u8(), raw);
        }
        assert!(EntityTag::from_u8(6).is_none());
    }
}
