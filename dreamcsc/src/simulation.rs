//! Simulation mode: in-process mock servers stand in for the instrument

use log::info;

use dreamproto::{DreamConfig, DreamResult, ServerAddress};
use dreamsim::{MockConfig, MockDream};

use crate::config::constants::SIMULATION_HOST;

/// Start one mock server per configured server on a free local port and
/// point the configuration at them. The mocks stop when dropped.
pub fn start_simulators(config: &mut DreamConfig) -> DreamResult<Vec<MockDream>> {
    let mut mocks = Vec::with_capacity(config.servers.len());
    for server in config.servers.iter_mut() {
        let mock = MockDream::start(MockConfig {
            id: server.id,
            address: format!("{}:0", SIMULATION_HOST),
            status_interval: config.telemetry_interval,
        })?;
        info!(
            "Simulating server {} on port {} instead of {}",
            server.id,
            mock.port(),
            server.authority()
        );
        *server = ServerAddress::new(server.id, SIMULATION_HOST, mock.port());
        mocks.push(mock);
    }
    Ok(mocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dreamproto::{DreamConfigJson, ServerId};

    #[test]
    fn test_simulators_replace_addresses() {
        let json: DreamConfigJson = serde_json::from_str(
            r#"{"servers": [
                {"id": "N", "host": "dream-n.example", "port": 5000},
                {"id": "B", "host": "dream-b.example", "port": 5005}
            ], "simulation_mode": true}"#,
        )
        .unwrap();
        let mut config = json.to_dream_config().unwrap();

        let mocks = start_simulators(&mut config).unwrap();
        assert_eq!(mocks.len(), 2);
        for (server, mock) in config.servers.iter().zip(&mocks) {
            assert_eq!(server.id, mock.id());
            assert_eq!(server.host, SIMULATION_HOST);
            assert_eq!(server.port, mock.port());
        }
        assert_eq!(config.servers[1].id, ServerId::B);
    }
}
