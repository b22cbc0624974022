//! DREAM controller
//!
//! Owns the gateway to the DREAM servers and drives it from the CSC's
//! summary state. Gateway events are handled on the caller's thread by
//! `run` or `poll`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde_json::{Map, Value};

use dreamlib::{Gateway, GatewayEvent, ServerResults};
use dreamproto::{
    CommandKind, DataProductAnnouncement, DreamConfig, DreamError, DreamResult, ServerId,
};

use crate::config::constants::{EVENT_POLL_INTERVAL, STALE_TELEMETRY_INTERVALS};
use crate::products::{filter_products, DataProductSink, LoggingSink};
use crate::weather::{FileWeather, WeatherRelay, WeatherSource};

/// CSC summary state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Not connected to the servers
    Standby,
    /// Connected, relaying commands, weather and data products
    Enabled,
    /// A server could not be reached; disable to recover
    Fault,
}

/// Latest status telemetry from one server
#[derive(Debug, Clone)]
pub struct ServerStatus {
    pub parameters: Map<String, Value>,
    pub received: Instant,
}

pub struct DreamController {
    config: DreamConfig,
    gateway: Arc<Gateway>,
    state: ControllerState,
    sink: Box<dyn DataProductSink>,
    weather_source: Option<Arc<dyn WeatherSource>>,
    weather_relay: Option<WeatherRelay>,
    status: BTreeMap<ServerId, ServerStatus>,
    stale: BTreeSet<ServerId>,
    enabled_at: Option<Instant>,
    products_archived: u64,
}

impl DreamController {
    pub fn new(
        config: DreamConfig,
        gateway: Gateway,
        sink: Box<dyn DataProductSink>,
        weather_source: Option<Arc<dyn WeatherSource>>,
    ) -> Self {
        Self {
            config,
            gateway: Arc::new(gateway),
            state: ControllerState::Standby,
            sink,
            weather_source,
            weather_relay: None,
            status: BTreeMap::new(),
            stale: BTreeSet::new(),
            enabled_at: None,
            products_archived: 0,
        }
    }

    /// Controller talking TCP to the configured servers, logging data
    /// products and reading weather from the configured file
    pub fn from_config(config: DreamConfig) -> Self {
        let gateway = Gateway::tcp(&config.servers, &config.connection);
        let weather_source = config
            .weather
            .file
            .as_ref()
            .map(|path| Arc::new(FileWeather::new(path)) as Arc<dyn WeatherSource>);
        Self::new(config, gateway, Box::new(LoggingSink::new()), weather_source)
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn products_archived(&self) -> u64 {
        self.products_archived
    }

    pub fn server_status(&self, server: ServerId) -> Option<&ServerStatus> {
        self.status.get(&server)
    }

    /// Connect to every server and announce that the observatory is ready
    /// for data. If any server cannot be connected the controller stays in
    /// Standby.
    pub fn enable(&mut self) -> DreamResult<()> {
        match self.state {
            ControllerState::Enabled => return Ok(()),
            ControllerState::Fault => {
                return Err(DreamError::State("disable before enabling from Fault".to_string()))
            }
            ControllerState::Standby => {}
        }

        let results = self.gateway.connect_all();
        if let Err(e) = first_error(results) {
            self.gateway.disconnect_all();
            return Err(e);
        }

        self.state = ControllerState::Enabled;
        self.enabled_at = Some(Instant::now());
        self.status.clear();
        self.stale.clear();
        info!("DREAM controller enabled");

        if let Err(e) = self.start_operations() {
            self.fault(&e);
            return Err(e);
        }
        Ok(())
    }

    /// Announce readiness and start relaying weather
    fn start_operations(&mut self) -> DreamResult<()> {
        self.broadcast(CommandKind::ReadyForData { ready: true })?;
        if let Some(source) = &self.weather_source {
            self.weather_relay = WeatherRelay::start(
                self.config.weather.poll_interval,
                Arc::clone(source),
                Arc::clone(&self.gateway),
            )?;
        }
        Ok(())
    }

    /// Announce that the observatory no longer takes data, then disconnect
    pub fn disable(&mut self) {
        if self.state == ControllerState::Standby {
            return;
        }
        if let Some(mut relay) = self.weather_relay.take() {
            relay.stop();
        }
        if self.state == ControllerState::Enabled {
            if let Err(e) = self.broadcast(CommandKind::ReadyForData { ready: false }) {
                warn!("readyForData(false) not accepted everywhere: {}", e);
            }
        }
        self.gateway.disconnect_all();
        self.state = ControllerState::Standby;
        self.enabled_at = None;
        info!("DREAM controller in standby");
    }

    fn fault(&mut self, cause: &DreamError) {
        error!("DREAM controller fault: {}", cause);
        if let Some(mut relay) = self.weather_relay.take() {
            relay.stop();
        }
        self.state = ControllerState::Fault;
    }

    fn require_enabled(&self, command: &str) -> DreamResult<()> {
        if self.state == ControllerState::Enabled {
            Ok(())
        } else {
            Err(DreamError::State(format!(
                "{} not allowed in {:?}",
                command, self.state
            )))
        }
    }

    /// Send a command to every server; the first failure is returned after
    /// all servers have answered
    fn broadcast(&self, kind: CommandKind) -> DreamResult<()> {
        let name = kind.name();
        let results = self.gateway.broadcast(kind);
        for (server, result) in &results {
            if let Err(e) = result {
                warn!("Server {}: {} failed: {}", server, name, e);
            }
        }
        first_error(results)
    }

    fn operational(&self, kind: CommandKind) -> DreamResult<()> {
        self.require_enabled(kind.name())?;
        self.broadcast(kind)
    }

    pub fn resume(&self) -> DreamResult<()> {
        self.operational(CommandKind::Resume)
    }

    pub fn open_hatch(&self) -> DreamResult<()> {
        self.operational(CommandKind::OpenHatch)
    }

    pub fn close_hatch(&self) -> DreamResult<()> {
        self.operational(CommandKind::CloseHatch)
    }

    pub fn stop(&self) -> DreamResult<()> {
        self.operational(CommandKind::Stop)
    }

    /// Change how often the weather is relayed; relays immediately
    pub fn set_weather_interval(&mut self, interval: Duration) {
        self.config.weather.poll_interval = interval;
        if let Some(relay) = &self.weather_relay {
            relay.set_interval(interval);
        }
    }

    fn handle_data_products(&mut self, server: ServerId, announcement: DataProductAnnouncement) {
        if let Err(e) = announcement.validate() {
            warn!("Server {}: ignoring data product announcement: {}", server, e);
            return;
        }
        let (products, skipped) =
            filter_products(&announcement, self.config.skip_tmpdata_products);
        if skipped > 0 {
            info!("Server {}: skipped {} product(s) under /tmpdata/", server, skipped);
        }
        if products.is_empty() {
            return;
        }

        if let Err(e) = self.sink.archive(server, &products) {
            error!("Server {}: archiving failed: {}", server, e);
            return;
        }
        self.products_archived += products.len() as u64;

        if let Err(e) = self.gateway.send_to(server, CommandKind::DataArchived) {
            warn!("Server {}: dataArchived failed: {}", server, e);
        }
    }

    /// Act on one gateway event
    pub fn handle_event(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::Status { server, parameters } => {
                if self.stale.remove(&server) {
                    info!("Server {}: status telemetry resumed", server);
                }
                self.status.insert(
                    server,
                    ServerStatus {
                        parameters,
                        received: Instant::now(),
                    },
                );
            }
            GatewayEvent::DataProducts {
                server,
                announcement,
            } => {
                if self.state == ControllerState::Enabled {
                    self.handle_data_products(server, announcement);
                } else {
                    debug!("Server {}: data products ignored in {:?}", server, self.state);
                }
            }
            GatewayEvent::Disconnected {
                server,
                failed_commands,
            } => {
                warn!(
                    "Server {} disconnected, {} command(s) failed",
                    server, failed_commands
                );
                // Without reconnection the server stays lost
                let reconnecting = self.config.connection.auto_reconnect;
                if self.state == ControllerState::Enabled && !reconnecting {
                    self.fault(&DreamError::ConnectionLost(server));
                }
            }
            GatewayEvent::Reconnected { server, attempts } => {
                info!("Server {} reconnected after {} attempt(s)", server, attempts);
                if self.state == ControllerState::Enabled {
                    if let Err(e) = self
                        .gateway
                        .send_to(server, CommandKind::ReadyForData { ready: true })
                    {
                        warn!("Server {}: readyForData after reconnect failed: {}", server, e);
                    }
                }
            }
            GatewayEvent::ReconnectFailed { server, attempts } => {
                if self.state == ControllerState::Enabled {
                    self.fault(&DreamError::ConnectionLost(server));
                }
                error!("Server {} unreachable after {} attempt(s)", server, attempts);
            }
            GatewayEvent::ProtocolError { server, message } => {
                warn!("Server {}: protocol error: {}", server, message);
            }
        }
    }

    fn stale_after(&self) -> Duration {
        self.config.telemetry_interval * STALE_TELEMETRY_INTERVALS
    }

    /// Servers whose status telemetry is overdue. Newly stale servers are
    /// logged once.
    pub fn check_staleness(&mut self) -> Vec<ServerId> {
        let enabled_at = match (self.state, self.enabled_at) {
            (ControllerState::Enabled, Some(at)) => at,
            _ => return Vec::new(),
        };
        let limit = self.stale_after();
        let servers = self.gateway.servers();

        let mut stale = Vec::new();
        for server in servers {
            let last_seen = self
                .status
                .get(&server)
                .map(|status| status.received)
                .unwrap_or(enabled_at);
            if last_seen.elapsed() > limit {
                if self.stale.insert(server) {
                    warn!(
                        "Server {}: no status telemetry for {:?}",
                        server,
                        last_seen.elapsed()
                    );
                }
                stale.push(server);
            }
        }
        stale
    }

    /// Handle events for up to `timeout`
    pub fn poll(&mut self, timeout: Duration) -> DreamResult<()> {
        if let Some(event) = self.gateway.next_event(timeout)? {
            self.handle_event(event);
        }
        self.check_staleness();
        Ok(())
    }

    /// Handle events until `running` is cleared
    pub fn run(&mut self, running: &AtomicBool) -> DreamResult<()> {
        while running.load(Ordering::SeqCst) {
            self.poll(EVENT_POLL_INTERVAL)?;
        }
        Ok(())
    }
}

impl Drop for DreamController {
    fn drop(&mut self) {
        self.disable();
    }
}

fn first_error<T>(results: ServerResults<T>) -> DreamResult<()> {
    for (_, result) in results {
        result?;
    }
    Ok(())
}
