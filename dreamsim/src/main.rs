//! DREAM Server Simulator (dreamsim)
//!
//! Runs one mock camera-controller server per DREAM position:
//!
//! | Server | Port          |
//! |--------|---------------|
//! | N      | base_port     |
//! | E      | base_port + 1 |
//! | S      | base_port + 2 |
//! | W      | base_port + 3 |
//! | C      | base_port + 4 |
//! | B      | base_port + 5 |
//!
//! Connected servers send status every two seconds and announce a random
//! batch of data products now and then.

use std::env;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info, warn};
use rand::Rng;

use dreamproto::{now_unix, DataProductAnnouncement, DataProductMetadata, ServerId};
use dreamsim::{MockConfig, MockDream};

const DEFAULT_BASE_PORT: u16 = 5000;
const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(15);

fn random_announcement(id: ServerId, rng: &mut impl Rng) -> DataProductAnnouncement {
    let count = rng.gen_range(1..=3);
    let metadata = (0..count)
        .map(|_| {
            let name = format!(
                "dream_{}_{:08x}.fits",
                id.as_str().to_lowercase(),
                rng.gen::<u32>()
            );
            DataProductMetadata {
                location: format!("/data/{}/{}", id.as_str().to_lowercase(), name),
                name,
                timestamp: now_unix(),
            }
        })
        .collect();
    DataProductAnnouncement::new(metadata)
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let base_port = match env::args().nth(1) {
        Some(arg) => match arg.parse::<u16>() {
            Ok(port) if port as usize + ServerId::ALL.len() <= u16::MAX as usize => port,
            _ => {
                error!("Invalid base port: {}", arg);
                process::exit(1);
            }
        },
        None => DEFAULT_BASE_PORT,
    };

    info!("DREAM simulator starting up");

    let mut mocks = Vec::new();
    for (offset, id) in ServerId::ALL.iter().enumerate() {
        let config = MockConfig {
            id: *id,
            address: format!("127.0.0.1:{}", base_port + offset as u16),
            status_interval: Duration::from_secs(2),
        };
        match MockDream::start(config) {
            Ok(mock) => mocks.push(mock),
            Err(e) => {
                error!("Failed to start mock server {}: {}", id, e);
                process::exit(1);
            }
        }
    }

    // Set up signal handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running_clone.store(false, Ordering::SeqCst);
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    info!("All mock servers started");

    let mut rng = rand::thread_rng();
    let mut elapsed = Duration::ZERO;
    let tick = Duration::from_millis(100);
    while running.load(Ordering::SeqCst) {
        thread::sleep(tick);
        elapsed += tick;
        if elapsed < ANNOUNCE_INTERVAL {
            continue;
        }
        elapsed = Duration::ZERO;

        for mock in mocks.iter().filter(|m| m.is_client_connected()) {
            let announcement = random_announcement(mock.id(), &mut rng);
            if let Err(e) = mock.announce_data_products(announcement) {
                warn!("Server {} announcement failed: {}", mock.id(), e);
            }
        }
    }

    for mock in mocks.iter_mut() {
        mock.stop();
    }
    info!("DREAM simulator shutdown complete");
}
