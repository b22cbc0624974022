//! Mock DREAM camera-controller server
//!
//! Accepts one client at a time over TCP, answers every command with an
//! acknowledgement and sends periodic status telemetry. Data-product
//! announcements are sent on demand. Faults can be injected to exercise the
//! CSC's timeout and reconnect handling.

use std::io::{BufReader, ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde_json::{json, Map, Value};

use dreamproto::{
    decode_command, encode_line, now_unix, read_line_limited, Acknowledgement, Command,
    CommandKind, DataProductAnnouncement, DreamError, DreamResult, LineRead, ResponseCode,
    ServerId, TelemetryMessage, WeatherInfo, MAX_MESSAGE_SIZE,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock server configuration
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub id: ServerId,
    /// Address to listen on; port 0 picks a free port
    pub address: String,
    /// Interval between status telemetry messages; zero disables them
    pub status_interval: Duration,
}

impl MockConfig {
    pub fn local(id: ServerId) -> Self {
        Self {
            id,
            address: "127.0.0.1:0".to_string(),
            status_interval: Duration::from_secs(2),
        }
    }
}

/// Instrument state as changed by the commands received
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockState {
    pub hatch_open: bool,
    pub ready_for_data: bool,
    pub stopped: bool,
    pub weather: Option<WeatherInfo>,
    pub archived_count: u32,
    pub commands_received: u64,
    pub last_command: Option<String>,
}

/// Misbehaviour to inject
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Wait this long before acknowledging
    pub ack_delay: Duration,
    /// Never acknowledge
    pub drop_acks: bool,
    /// Acknowledge with this response instead of the real one
    pub response: Option<ResponseCode>,
}

struct MockShared {
    config: MockConfig,
    state: Mutex<MockState>,
    faults: Mutex<Faults>,
    running: AtomicBool,
    /// Writing half of the current client connection
    client: Mutex<Option<TcpStream>>,
    connections: AtomicU64,
}

impl MockShared {
    fn id(&self) -> ServerId {
        self.config.id
    }

    fn write_line(&self, line: &[u8]) -> DreamResult<()> {
        let mut client = lock(&self.client);
        match client.as_mut() {
            Some(stream) => {
                stream.write_all(line)?;
                stream.flush()?;
                Ok(())
            }
            None => Err(DreamError::protocol("no client connected")),
        }
    }

    fn send_telemetry(&self, telemetry: &TelemetryMessage) -> DreamResult<()> {
        debug!("Mock {} sending {} telemetry", self.id(), telemetry.name());
        self.write_line(&encode_line(telemetry)?)
    }

    fn status_parameters(&self) -> Map<String, Value> {
        let state = lock(&self.state);
        let status = json!({
            "server": self.id(),
            "hatch_open": state.hatch_open,
            "ready_for_data": state.ready_for_data,
            "stopped": state.stopped,
            "archived_count": state.archived_count,
            "commands_received": state.commands_received,
            "safe_observing_conditions": state
                .weather
                .map(|w| w.safe_observing_conditions)
                .unwrap_or(false),
        });
        match status {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Apply a command to the instrument state
    fn process_command(&self, command: &Command) -> ResponseCode {
        let mut state = lock(&self.state);
        state.commands_received += 1;
        state.last_command = Some(command.name().to_string());

        match &command.kind {
            CommandKind::Resume => {
                state.stopped = false;
            }
            CommandKind::OpenHatch => {
                state.hatch_open = true;
            }
            CommandKind::CloseHatch => {
                state.hatch_open = false;
            }
            CommandKind::Stop => {
                state.stopped = true;
                state.hatch_open = false;
            }
            CommandKind::ReadyForData { ready } => {
                state.ready_for_data = *ready;
            }
            CommandKind::DataArchived => {
                state.archived_count += 1;
            }
            CommandKind::SetWeatherInfo { weather_info } => {
                if weather_info.validate().is_err() {
                    return ResponseCode::Error(2);
                }
                state.weather = Some(*weather_info);
            }
        }
        ResponseCode::Ok
    }

    fn acknowledge(&self, cmd_id: u32, time_command_received: f64, response: ResponseCode) {
        let faults = lock(&self.faults).clone();
        if faults.drop_acks {
            debug!("Mock {} dropping acknowledgement for cmd_id {}", self.id(), cmd_id);
            return;
        }
        if !faults.ack_delay.is_zero() {
            thread::sleep(faults.ack_delay);
        }
        let response = faults.response.unwrap_or(response);
        let ack = Acknowledgement::new(cmd_id, time_command_received, now_unix(), response);
        let result = encode_line(&ack).and_then(|line| self.write_line(&line));
        if let Err(e) = result {
            warn!("Mock {} could not acknowledge cmd_id {}: {}", self.id(), cmd_id, e);
        }
    }

    fn handle_line(&self, line: &[u8]) {
        let time_command_received = now_unix();
        match decode_command(line) {
            Ok(command) => {
                debug!(
                    "Mock {} received {} (cmd_id {})",
                    self.id(),
                    command.name(),
                    command.cmd_id
                );
                let response = self.process_command(&command);
                self.acknowledge(command.cmd_id, time_command_received, response);
            }
            Err(e) => {
                let cmd_id = serde_json::from_slice::<Value>(line)
                    .ok()
                    .and_then(|value| Command::salvage_cmd_id(&value));
                match cmd_id {
                    Some(cmd_id) => {
                        warn!("Mock {} rejecting cmd_id {}: {}", self.id(), cmd_id, e);
                        self.acknowledge(cmd_id, time_command_received, ResponseCode::Error(1));
                    }
                    None => warn!("Mock {} ignoring unreadable message: {}", self.id(), e),
                }
            }
        }
    }

    fn handle_connection(&self, stream: TcpStream) -> DreamResult<()> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(POLL_INTERVAL))?;
        *lock(&self.client) = Some(stream.try_clone()?);

        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        let mut last_status = Instant::now();
        let status_interval = self.config.status_interval;

        while self.running.load(Ordering::SeqCst) {
            if !status_interval.is_zero() && last_status.elapsed() >= status_interval {
                let status = TelemetryMessage::Status(self.status_parameters());
                if let Err(e) = self.send_telemetry(&status) {
                    warn!("Mock {} status telemetry failed: {}", self.id(), e);
                    break;
                }
                last_status = Instant::now();
            }

            match read_line_limited(&mut reader, &mut line) {
                Ok(LineRead::Complete) => {
                    self.handle_line(&line);
                    line.clear();
                }
                Ok(LineRead::Eof) => {
                    info!("Mock {} client disconnected", self.id());
                    break;
                }
                Ok(LineRead::Truncated) => break,
                Ok(LineRead::Oversized) => {
                    warn!(
                        "Mock {} dropping client after a line over {} bytes",
                        self.id(),
                        MAX_MESSAGE_SIZE
                    );
                    break;
                }
                // Partial lines stay in the buffer until the rest arrives
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) => {
                    warn!("Mock {} read error: {}", self.id(), e);
                    break;
                }
            }

            if lock(&self.client).is_none() {
                info!("Mock {} dropped its client", self.id());
                break;
            }
        }

        if let Some(stream) = lock(&self.client).take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        Ok(())
    }

    fn run(&self, listener: TcpListener) {
        while self.running.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer_addr)) => {
                    info!("Mock {} accepted connection from {}", self.id(), peer_addr);
                    self.connections.fetch_add(1, Ordering::SeqCst);
                    if let Err(e) = stream
                        .set_nonblocking(false)
                        .map_err(DreamError::from)
                        .and_then(|_| self.handle_connection(stream))
                    {
                        warn!("Mock {} connection error: {}", self.id(), e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    warn!("Mock {} accept error: {}", self.id(), e);
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
        info!("Mock {} stopped", self.id());
    }
}

/// A running mock DREAM server
pub struct MockDream {
    shared: Arc<MockShared>,
    local_addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl MockDream {
    /// Bind and start serving on a background thread
    pub fn start(config: MockConfig) -> DreamResult<Self> {
        let listener = TcpListener::bind(&config.address)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        info!("Mock {} listening on {}", config.id, local_addr);

        let shared = Arc::new(MockShared {
            config,
            state: Mutex::new(MockState::default()),
            faults: Mutex::new(Faults::default()),
            running: AtomicBool::new(true),
            client: Mutex::new(None),
            connections: AtomicU64::new(0),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("mock-{}", thread_shared.id()))
            .spawn(move || thread_shared.run(listener))?;

        Ok(Self {
            shared,
            local_addr,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> ServerId {
        self.shared.id()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn state(&self) -> MockState {
        lock(&self.shared.state).clone()
    }

    pub fn set_faults(&self, faults: Faults) {
        *lock(&self.shared.faults) = faults;
    }

    pub fn is_client_connected(&self) -> bool {
        lock(&self.shared.client).is_some()
    }

    /// Number of client connections accepted so far
    pub fn connections(&self) -> u64 {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Wait until a client is connected
    pub fn wait_for_client(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if self.is_client_connected() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        self.is_client_connected()
    }

    /// Announce new data products to the connected client
    pub fn announce_data_products(&self, announcement: DataProductAnnouncement) -> DreamResult<()> {
        self.shared
            .send_telemetry(&TelemetryMessage::SetNewDataProducts(announcement))
    }

    /// Send a status telemetry message now
    pub fn send_status(&self) -> DreamResult<()> {
        let status = TelemetryMessage::Status(self.shared.status_parameters());
        self.shared.send_telemetry(&status)
    }

    /// Write raw bytes to the client, bypassing the encoder
    pub fn send_raw(&self, data: &[u8]) -> DreamResult<()> {
        self.shared.write_line(data)
    }

    /// Drop the current client connection; the server keeps listening
    pub fn disconnect_client(&self) {
        if let Some(stream) = lock(&self.shared.client).take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }

    /// Stop listening and close any client connection
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.disconnect_client();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockDream {
    fn drop(&mut self) {
        self.stop();
    }
}
