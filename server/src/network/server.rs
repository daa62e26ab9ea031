//! UDP game server: connections, input decoding, per-observer fan-out.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use log::{error, info, warn};
use tokio::net::UdpSocket;

use floret_shared::protocol::{
    packet, ByteWriter, ClientMessage, BASE_VIEW_RADIUS, MAX_PACKET_SIZE, PROTOCOL_VERSION,
};

use crate::entity::InputState;
use crate::ids::EntityId;
use crate::network::encode::{encode_update, plan_update};
use crate::world::GameWorld;

/// Connection timeout in seconds
const CONNECTION_TIMEOUT: f32 = 30.0;

/// Client connection state
#[derive(Debug)]
pub struct ClientConnection {
    pub addr: SocketAddr,
    pub player: EntityId,
    pub last_seen: Instant,
    /// Entities this observer currently knows about; diffed every tick
    /// against the fresh visibility query.
    pub known: HashSet<EntityId>,
    /// World dimensions are sent once, on the first update.
    pub sent_world_dims: bool,
}

impl ClientConnection {
    pub fn new(addr: SocketAddr, player: EntityId) -> Self {
        Self {
            addr,
            player,
            last_seen: Instant::now(),
            known: HashSet::new(),
            sent_world_dims: false,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        self.last_seen.elapsed().as_secs_f32() > CONNECTION_TIMEOUT
    }
}

/// Game server
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: HashMap<SocketAddr, ClientConnection>,
}

impl Server {
    /// Create a new server listening on the given port
    pub async fn new(port: u16) -> Result<Self, std::io::Error> {
        let addr = format!("0.0.0.0:{}", port);
        let socket = UdpSocket::bind(&addr).await?;
        info!("Listening on {}", addr);
        Ok(Self {
            socket: Arc::new(socket),
            clients: HashMap::new(),
        })
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Drain pending datagrams without blocking, then sweep timeouts.
    pub async fn process_incoming(&mut self, world: &mut GameWorld) {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        loop {
            match self.socket.try_recv_from(&mut buf) {
                Ok((len, addr)) => {
                    self.handle_packet(&buf[..len], addr, world).await;
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    break;
                }
            }
        }
        self.check_timeouts(world);
    }

    async fn handle_packet(&mut self, data: &[u8], addr: SocketAddr, world: &mut GameWorld) {
        let message = match ClientMessage::deserialize(data) {
            Ok(message) => message,
            Err(e) => {
                warn!("Malformed packet from {}: {}", addr, e);
                return;
            }
        };
        if let Some(client) = self.clients.get_mut(&addr) {
            client.last_seen = Instant::now();
        }

        match message {
            ClientMessage::Join {
                protocol_version,
                name,
                reconnect_secret,
                loadout,
            } => {
                self.handle_join(addr, protocol_version, name, reconnect_secret, loadout, world)
                    .await;
            }
            ClientMessage::Input {
                direction,
                magnitude,
                primary,
                secondary,
                actions,
            } => {
                let Some(player) = self.clients.get(&addr).map(|c| c.player) else {
                    return;
                };
                world.set_player_input(
                    player,
                    InputState {
                        direction,
                        magnitude,
                        primary,
                        secondary,
                    },
                );
                for action in &actions {
                    world.apply_player_action(player, action);
                }
            }
            ClientMessage::Ping { nonce } => {
                let mut w = ByteWriter::with_capacity(5);
                w.put_u8(packet::PONG);
                w.put_u32(nonce);
                self.send_to(addr, &w.finish()).await;
            }
        }
    }

    async fn handle_join(
        &mut self,
        addr: SocketAddr,
        protocol_version: u32,
        name: String,
        reconnect_secret: Option<u64>,
        loadout: Option<Vec<String>>,
        world: &mut GameWorld,
    ) {
        if protocol_version != PROTOCOL_VERSION {
            self.send_reject(addr, "protocol version mismatch").await;
            return;
        }
        if name.is_empty() || name.len() > 24 {
            self.send_reject(addr, "invalid name").await;
            return;
        }

        // A valid secret reclaims a still-live player entity; the stale
        // connection entry for it is dropped.
        let reclaimed = reconnect_secret.and_then(|secret| world.find_player_by_secret(secret));
        let player = match reclaimed {
            Some(player) => {
                self.clients.retain(|_, c| c.player != player);
                info!("{} reconnected from {}", player, addr);
                player
            }
            None => world.spawn_player(name, loadout),
        };
        self.clients
            .insert(addr, ClientConnection::new(addr, player));

        let secret = world
            .entity(player)
            .and_then(|e| e.as_player())
            .map_or(0, |p| p.reconnect_secret);
        let mut w = ByteWriter::with_capacity(32);
        w.put_u8(packet::ACCEPT);
        w.put_u16(player.0);
        w.put_u64(secret);
        w.put_f32(world.width);
        w.put_f32(world.height);
        self.send_to(addr, &w.finish()).await;
    }

    async fn send_reject(&self, addr: SocketAddr, reason: &str) {
        let mut w = ByteWriter::with_capacity(2 + reason.len());
        w.put_u8(packet::REJECT);
        w.put_str(reason);
        self.send_to(addr, &w.finish()).await;
        info!("Rejected join from {}: {}", addr, reason);
    }

    fn check_timeouts(&mut self, world: &mut GameWorld) {
        let timed_out: Vec<SocketAddr> = self
            .clients
            .iter()
            .filter(|(_, c)| c.is_timed_out())
            .map(|(addr, _)| *addr)
            .collect();
        for addr in timed_out {
            if let Some(client) = self.clients.remove(&addr) {
                info!("Client {} timed out", addr);
                // The entity stays briefly reclaimable via the reconnect
                // secret only if another transport appears before this.
                world.remove_player(client.player);
            }
        }
    }

    /// Serialize and send one update per observer for the finished tick.
    /// Send failures are logged per connection, never fatal to the tick.
    pub async fn flush_updates(&mut self, world: &GameWorld) {
        let mut dead: Vec<SocketAddr> = Vec::new();
        let addrs: Vec<SocketAddr> = self.clients.keys().copied().collect();

        for addr in addrs {
            let Some(client) = self.clients.get_mut(&addr) else {
                continue;
            };
            let Some(entity) = world.entity(client.player) else {
                dead.push(addr);
                continue;
            };

            let zoom = entity.lively.as_ref().map_or(1.0, |l| l.snapshot.zoom);
            let radius = BASE_VIEW_RADIUS * zoom.max(0.1);
            let visible: HashSet<EntityId> = world
                .query_area(entity.base.position, radius)
                .into_iter()
                .filter(|id| world.entity(*id).is_some())
                .collect();

            let plan = plan_update(
                &visible,
                &client.known,
                world.partial_dirty(),
                world.full_dirty(),
                !client.sent_world_dims,
            );
            client.known = visible;
            client.sent_world_dims = true;
            let player = client.player;

            let data = encode_update(world, player, &plan);
            self.send_to(addr, &data).await;
        }

        for addr in dead {
            self.clients.remove(&addr);
        }
    }

    async fn send_to(&self, addr: SocketAddr, data: &[u8]) {
        if let Err(e) = self.socket.send_to(data, addr).await {
            warn!("Failed to send to {}: {}", addr, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_timeout_window() {
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let client = ClientConnection::new(addr, EntityId(1));
        assert!(!client.is_timed_out());
    }

    #[tokio::test]
    async fn test_join_and_update_over_loopback() {
        let mut world = GameWorld::new(1000.0, 1000.0);
        let mut server = Server::new(0).await.unwrap();
        let server_addr = server.socket.local_addr().unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let join = ClientMessage::Join {
            protocol_version: PROTOCOL_VERSION,
            name: "loopback".into(),
            reconnect_secret: None,
            loadout: None,
        };
        client.send_to(&join.serialize(), server_addr).await.unwrap();

        // Give the datagram a moment to arrive.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        server.process_incoming(&mut world).await;
        assert_eq!(server.client_count(), 1);

        let mut buf = [0u8; MAX_PACKET_SIZE];
        let (len, _) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(buf[0], packet::ACCEPT);
        assert!(len >= 1 + 2 + 8 + 8);

        world.update(0.04);
        server.flush_updates(&world).await;
        let (_, _) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(buf[0], packet::UPDATE);
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let mut world = GameWorld::new(1000.0, 1000.0);
        let mut server = Server::new(0).await.unwrap();
        let server_addr = server.socket.local_addr().unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let join = ClientMessage::Join {
            protocol_version: PROTOCOL_VERSION + 1,
            name: "old".into(),
            reconnect_secret: None,
            loadout: None,
        };
        client.send_to(&join.serialize(), server_addr).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        server.process_incoming(&mut world).await;
        assert_eq!(server.client_count(), 0);

        let mut buf = [0u8; MAX_PACKET_SIZE];
        let (_, _) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(buf[0], packet::REJECT);
    }
}
