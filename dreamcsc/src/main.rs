//! DREAM CSC main entry point
//!
//! Loads the configuration, connects to the DREAM servers and relays events
//! until interrupted.

use std::env;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info};

use dreamcsc::config::constants::DEFAULT_CONFIG_PATH;
use dreamcsc::{load_config, start_simulators, DreamController};

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Get config file path from command line or use default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    info!("DREAM CSC starting up");
    info!("Loading configuration from: {}", config_path);

    let mut config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    // Kept alive until shutdown
    let _simulators = if config.simulation_mode {
        match start_simulators(&mut config) {
            Ok(mocks) => mocks,
            Err(e) => {
                error!("Error starting simulated servers: {}", e);
                process::exit(1);
            }
        }
    } else {
        Vec::new()
    };

    info!(
        "Configured {} DREAM server(s), ack timeout {:?}",
        config.servers.len(),
        config.connection.ack_timeout
    );

    let mut controller = DreamController::from_config(config);

    // Set up signal handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running_clone.store(false, Ordering::SeqCst);
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    if let Err(e) = controller.enable() {
        error!("Error enabling DREAM controller: {}", e);
        controller.disable();
        process::exit(1);
    }

    // Run main loop
    if let Err(e) = controller.run(&running) {
        error!("Error in main loop: {}", e);
        controller.disable();
        process::exit(1);
    }

    controller.disable();
    info!("DREAM CSC shutdown complete");
}
