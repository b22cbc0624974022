//! Configuration loading for the DREAM CSC

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use dreamproto::{DreamConfig, DreamConfigJson, DreamError, DreamResult};

/// Load the CSC configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> DreamResult<DreamConfig> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let config_json: DreamConfigJson = serde_json::from_reader(reader)?;

    let config = config_json.to_dream_config().map_err(DreamError::Config)?;

    Ok(config)
}

/// Configuration constants
pub mod constants {
    use std::time::Duration;

    /// Configuration file used when none is given on the command line
    pub const DEFAULT_CONFIG_PATH: &str = "dream.json";

    /// How long the controller waits for an event before checking staleness
    pub const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Status telemetry older than this many telemetry intervals is stale
    pub const STALE_TELEMETRY_INTERVALS: u32 = 3;

    /// Host the in-process mock servers listen on
    pub const SIMULATION_HOST: &str = "127.0.0.1";
}
