//! Floret game server binary.

use std::time::{Duration, Instant};

use log::info;

use floret_shared::protocol::{DEFAULT_PORT, SERVER_TICK_RATE, WORLD_HEIGHT, WORLD_WIDTH};

use floret_server::network::Server;
use floret_server::world::GameWorld;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting floret server...");
    info!("Tick rate: {} Hz", SERVER_TICK_RATE);

    let mut world = GameWorld::new(WORLD_WIDTH, WORLD_HEIGHT);
    let mut server = match Server::new(DEFAULT_PORT).await {
        Ok(server) => server,
        Err(e) => {
            log::error!("Failed to bind UDP port {}: {}", DEFAULT_PORT, e);
            return;
        }
    };

    let tick_duration = Duration::from_secs_f64(1.0 / f64::from(SERVER_TICK_RATE));
    let mut last_tick = Instant::now();

    info!("Server started successfully!");

    loop {
        let tick_start = Instant::now();

        server.process_incoming(&mut world).await;

        let delta = last_tick.elapsed().as_secs_f32();
        last_tick = Instant::now();
        world.update(delta);

        server.flush_updates(&world).await;

        let elapsed = tick_start.elapsed();
        if elapsed < tick_duration {
            tokio::time::sleep(tick_duration - elapsed).await;
        }
    }
}
