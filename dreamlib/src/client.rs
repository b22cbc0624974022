//! Client for a single DREAM camera-controller server
//!
//! Provides a blocking API for sending commands and waiting for their
//! acknowledgements. A reader thread per connection routes acknowledgements
//! to the waiting callers and surfaces telemetry as `GatewayEvent`s.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use dreamproto::{
    Acknowledgement, Command, CommandKind, ConnectionConfig, DreamError, DreamResult, Incoming,
    ServerAddress, ServerId, TelemetryMessage, WeatherInfo,
};

use crate::backoff::Backoff;
use crate::connection::{Connector, MessageReceiver, MessageSender, TcpConnector};
use crate::events::GatewayEvent;
use crate::pending::{PendingCommands, Resolution};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct CondPair<T> {
    lock: Mutex<T>,
    cvar: Condvar,
}

/// State shared between the client and its reader thread
struct ClientShared {
    server: ServerId,
    connector: Box<dyn Connector>,
    config: ConnectionConfig,
    pending: PendingCommands,
    sender: Mutex<Option<Box<dyn MessageSender>>>,
    events: Mutex<Sender<GatewayEvent>>,
    /// true once `disconnect` has been requested
    stopping: CondPair<bool>,
}

impl ClientShared {
    fn emit(&self, event: GatewayEvent) {
        // Nobody listening is not an error for the connection
        let _ = lock(&self.events).send(event);
    }

    fn is_stopping(&self) -> bool {
        *lock(&self.stopping.lock)
    }

    /// Sleep for `delay` unless a stop is requested first. Returns whether
    /// the client is stopping.
    fn wait_or_stop(&self, delay: Duration) -> bool {
        let guard = lock(&self.stopping.lock);
        let (guard, _) = self
            .stopping
            .cvar
            .wait_timeout_while(guard, delay, |stopping| !*stopping)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    fn dispatch(&self, message: Incoming) {
        match message {
            Incoming::Ack(ack) => {
                let cmd_id = ack.cmd_id;
                let response = ack.response.clone();
                match self.pending.resolve(ack) {
                    Resolution::Delivered { command, elapsed } => {
                        debug!(
                            "Server {}: {} (cmd_id {}) acknowledged {} after {:?}",
                            self.server, command, cmd_id, response, elapsed
                        );
                    }
                    Resolution::Unmatched => {
                        warn!(
                            "Server {}: ignoring acknowledgement for unknown cmd_id {}",
                            self.server, cmd_id
                        );
                    }
                }
            }
            Incoming::Telemetry(TelemetryMessage::Status(parameters)) => {
                debug!("Server {}: status telemetry", self.server);
                self.emit(GatewayEvent::Status {
                    server: self.server,
                    parameters,
                });
            }
            Incoming::Telemetry(TelemetryMessage::SetNewDataProducts(announcement)) => {
                info!(
                    "Server {}: {} new data product(s)",
                    self.server, announcement.amount
                );
                self.emit(GatewayEvent::DataProducts {
                    server: self.server,
                    announcement,
                });
            }
        }
    }

    /// Read until the connection ends. Returns normally on EOF or I/O error.
    fn read_messages(&self, receiver: &mut dyn MessageReceiver) {
        loop {
            match receiver.receive() {
                Ok(Some(message)) => self.dispatch(message),
                Ok(None) => {
                    debug!("Server {}: connection closed by peer", self.server);
                    return;
                }
                Err(DreamError::Protocol(message)) => {
                    warn!("Server {}: {}", self.server, message);
                    self.emit(GatewayEvent::ProtocolError {
                        server: self.server,
                        message,
                    });
                }
                Err(e) => {
                    if !self.is_stopping() {
                        warn!("Server {}: read failed: {}", self.server, e);
                    }
                    return;
                }
            }
        }
    }

    /// Throw away the current connection and fail every outstanding command
    fn connection_lost(&self) -> usize {
        if let Some(mut sender) = lock(&self.sender).take() {
            let _ = sender.shutdown();
        }
        self.pending.fail_all()
    }

    /// Keep trying to connect. Returns the new reader, or `None` when the
    /// client is stopping or the retry limit is reached.
    fn reconnect(&self) -> Option<Box<dyn MessageReceiver>> {
        let mut backoff = Backoff::new(
            self.config.reconnect_delay_init,
            self.config.reconnect_delay_max,
            self.config.reconnect_max_retries,
        );

        loop {
            let delay = match backoff.next_delay() {
                Some(delay) => delay,
                None => {
                    error!(
                        "Server {}: giving up after {} reconnect attempts",
                        self.server,
                        backoff.attempts()
                    );
                    self.emit(GatewayEvent::ReconnectFailed {
                        server: self.server,
                        attempts: backoff.attempts(),
                    });
                    return None;
                }
            };
            if self.wait_or_stop(delay) {
                return None;
            }

            match self.connector.connect() {
                Ok((mut sender, receiver)) => {
                    let mut slot = lock(&self.sender);
                    if self.is_stopping() {
                        let _ = sender.shutdown();
                        return None;
                    }
                    *slot = Some(sender);
                    drop(slot);

                    info!(
                        "Reconnected to {} after {} attempt(s)",
                        self.connector.describe(),
                        backoff.attempts()
                    );
                    self.emit(GatewayEvent::Reconnected {
                        server: self.server,
                        attempts: backoff.attempts(),
                    });
                    return Some(receiver);
                }
                Err(e) => {
                    debug!(
                        "Server {}: reconnect attempt {} failed: {}",
                        self.server,
                        backoff.attempts(),
                        e
                    );
                }
            }
        }
    }

    fn run_reader(&self, mut receiver: Box<dyn MessageReceiver>) {
        loop {
            self.read_messages(receiver.as_mut());

            let failed_commands = self.connection_lost();
            if self.is_stopping() {
                debug!("Server {}: reader stopped", self.server);
                return;
            }

            warn!(
                "Lost connection to {}, {} command(s) failed",
                self.connector.describe(),
                failed_commands
            );
            self.emit(GatewayEvent::Disconnected {
                server: self.server,
                failed_commands,
            });

            if !self.config.auto_reconnect {
                return;
            }
            receiver = match self.reconnect() {
                Some(receiver) => receiver,
                None => return,
            };
        }
    }
}

/// Connection to one DREAM server
pub struct CameraClient {
    shared: Arc<ClientShared>,
    cmd_id: AtomicU32,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl CameraClient {
    /// Create a client that is not yet connected
    pub fn new(
        server: ServerId,
        connector: Box<dyn Connector>,
        config: ConnectionConfig,
        events: Sender<GatewayEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                server,
                connector,
                config,
                pending: PendingCommands::new(),
                sender: Mutex::new(None),
                events: Mutex::new(events),
                stopping: CondPair {
                    lock: Mutex::new(false),
                    cvar: Condvar::new(),
                },
            }),
            cmd_id: AtomicU32::new(1),
            reader: Mutex::new(None),
        }
    }

    /// Create a client for a server reached over TCP
    pub fn tcp(
        address: ServerAddress,
        config: ConnectionConfig,
        events: Sender<GatewayEvent>,
    ) -> Self {
        let server = address.id;
        let connector = TcpConnector::new(address, config.connection_timeout);
        Self::new(server, Box::new(connector), config, events)
    }

    pub fn server(&self) -> ServerId {
        self.shared.server
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared.sender).is_some()
    }

    /// Number of commands waiting for an acknowledgement
    pub fn outstanding(&self) -> usize {
        self.shared.pending.len()
    }

    /// Get the next command identifier
    fn next_cmd_id(&self) -> u32 {
        self.cmd_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Connect to the server and start the reader thread
    pub fn connect(&self) -> DreamResult<()> {
        let mut reader = lock(&self.reader);
        if let Some(handle) = reader.as_ref() {
            if !handle.is_finished() {
                // Already connected, or reconnecting in the background
                return if self.is_connected() {
                    Ok(())
                } else {
                    Err(DreamError::NotConnected(self.server()))
                };
            }
        }
        if let Some(handle) = reader.take() {
            let _ = handle.join();
        }

        *lock(&self.shared.stopping.lock) = false;
        let (sender, receiver) = self.shared.connector.connect()?;
        *lock(&self.shared.sender) = Some(sender);
        info!("Connected to {}", self.shared.connector.describe());

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("dream-{}", self.server()))
            .spawn(move || shared.run_reader(receiver))?;
        *reader = Some(handle);
        Ok(())
    }

    /// Close the connection and stop reconnecting. Outstanding commands fail.
    pub fn disconnect(&self) {
        {
            let mut stopping = lock(&self.shared.stopping.lock);
            *stopping = true;
            self.shared.stopping.cvar.notify_all();
        }
        if let Some(mut sender) = lock(&self.shared.sender).take() {
            if let Err(e) = sender.shutdown() {
                debug!("Server {}: shutdown failed: {}", self.server(), e);
            }
        }
        if let Some(handle) = lock(&self.reader).take() {
            if handle.join().is_err() {
                error!("Server {}: reader thread panicked", self.server());
            }
            info!("Disconnected from {}", self.shared.connector.describe());
        }
        self.shared.pending.fail_all();
    }

    /// Send a command and wait for its acknowledgement, whatever the response
    pub fn send_command(&self, kind: CommandKind) -> DreamResult<Acknowledgement> {
        let server = self.server();
        let command = Command::new(self.next_cmd_id(), kind);
        let cmd_id = command.cmd_id;
        let name = command.name();

        // Register first so a fast acknowledgement is not lost
        let reply = self.shared.pending.register(cmd_id, name);
        {
            let mut sender = lock(&self.shared.sender);
            let result = match sender.as_mut() {
                Some(sender) => sender.send(&command),
                None => Err(DreamError::NotConnected(server)),
            };
            if let Err(e) = result {
                self.shared.pending.cancel(cmd_id);
                return Err(e);
            }
        }
        debug!("Server {}: sent {} (cmd_id {})", server, name, cmd_id);

        let timeout = self.shared.config.ack_timeout;
        match reply.recv_timeout(timeout) {
            Ok(ack) => Ok(ack),
            Err(RecvTimeoutError::Timeout) => {
                if !self.shared.pending.cancel(cmd_id) {
                    // Resolved between the timeout and the cancel
                    if let Ok(ack) = reply.try_recv() {
                        return Ok(ack);
                    }
                }
                warn!(
                    "Server {}: no acknowledgement for {} (cmd_id {}) within {:?}",
                    server, name, cmd_id, timeout
                );
                Err(DreamError::AckTimeout {
                    cmd_id,
                    command: name,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(DreamError::ConnectionLost(server)),
        }
    }

    /// Send a command and require an "OK" acknowledgement
    pub fn command(&self, kind: CommandKind) -> DreamResult<Acknowledgement> {
        let name = kind.name();
        let ack = self.send_command(kind)?;
        if ack.is_ok() {
            Ok(ack)
        } else {
            Err(DreamError::Rejected {
                cmd_id: ack.cmd_id,
                command: name,
                response: ack.response,
            })
        }
    }

    pub fn resume(&self) -> DreamResult<Acknowledgement> {
        self.command(CommandKind::Resume)
    }

    pub fn open_hatch(&self) -> DreamResult<Acknowledgement> {
        self.command(CommandKind::OpenHatch)
    }

    pub fn close_hatch(&self) -> DreamResult<Acknowledgement> {
        self.command(CommandKind::CloseHatch)
    }

    pub fn stop(&self) -> DreamResult<Acknowledgement> {
        self.command(CommandKind::Stop)
    }

    pub fn ready_for_data(&self, ready: bool) -> DreamResult<Acknowledgement> {
        self.command(CommandKind::ReadyForData { ready })
    }

    pub fn data_archived(&self) -> DreamResult<Acknowledgement> {
        self.command(CommandKind::DataArchived)
    }

    /// Send weather; out-of-range values are rejected before sending
    pub fn set_weather_info(&self, weather_info: WeatherInfo) -> DreamResult<Acknowledgement> {
        weather_info.validate()?;
        self.command(CommandKind::SetWeatherInfo { weather_info })
    }
}

impl Drop for CameraClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use dreamproto::{now_unix, ResponseCode};
    use serde_json::{json, Map};
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc::{self, Receiver};
    use std::time::Instant;

    /// Test side of an in-memory connection
    pub(crate) struct MockLink {
        pub commands: Receiver<Command>,
        pub incoming: Sender<Option<Incoming>>,
    }

    impl MockLink {
        pub fn ack(&self, cmd: &Command, response: ResponseCode) {
            let now = now_unix();
            let ack = Acknowledgement::new(cmd.cmd_id, now, now, response);
            let _ = self.incoming.send(Some(Incoming::Ack(ack)));
        }

        /// Acknowledge every command with `response` until the link closes
        pub fn auto_ack(self, response: ResponseCode) -> JoinHandle<Vec<Command>> {
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Ok(cmd) = self.commands.recv() {
                    self.ack(&cmd, response.clone());
                    seen.push(cmd);
                }
                seen
            })
        }

        pub fn close(&self) {
            let _ = self.incoming.send(None);
        }
    }

    struct ChannelSender {
        commands: Sender<Command>,
        incoming: Sender<Option<Incoming>>,
    }

    impl MessageSender for ChannelSender {
        fn send(&mut self, command: &Command) -> DreamResult<()> {
            self.commands
                .send(command.clone())
                .map_err(|e| DreamError::Channel(e.to_string()))
        }

        fn shutdown(&mut self) -> DreamResult<()> {
            let _ = self.incoming.send(None);
            Ok(())
        }
    }

    struct ChannelReceiver {
        incoming: Receiver<Option<Incoming>>,
    }

    impl MessageReceiver for ChannelReceiver {
        fn receive(&mut self) -> DreamResult<Option<Incoming>> {
            Ok(self.incoming.recv().unwrap_or(None))
        }
    }

    pub(crate) struct MockConnector {
        links: Mutex<Sender<MockLink>>,
        pub refuse: Arc<AtomicBool>,
    }

    impl MockConnector {
        pub fn new() -> (Self, Receiver<MockLink>) {
            let (tx, rx) = mpsc::channel();
            let connector = Self {
                links: Mutex::new(tx),
                refuse: Arc::new(AtomicBool::new(false)),
            };
            (connector, rx)
        }
    }

    impl Connector for MockConnector {
        fn connect(&self) -> DreamResult<(Box<dyn MessageSender>, Box<dyn MessageReceiver>)> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(DreamError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                )));
            }
            let (cmd_tx, cmd_rx) = mpsc::channel();
            let (in_tx, in_rx) = mpsc::channel();
            lock(&self.links)
                .send(MockLink {
                    commands: cmd_rx,
                    incoming: in_tx.clone(),
                })
                .map_err(|e| DreamError::Channel(e.to_string()))?;
            let sender: Box<dyn MessageSender> = Box::new(ChannelSender {
                commands: cmd_tx,
                incoming: in_tx,
            });
            let receiver: Box<dyn MessageReceiver> = Box::new(ChannelReceiver { incoming: in_rx });
            Ok((sender, receiver))
        }

        fn describe(&self) -> String {
            "mock server".to_string()
        }
    }

    pub(crate) fn test_config() -> ConnectionConfig {
        ConnectionConfig {
            ack_timeout: Duration::from_millis(300),
            reconnect_delay_init: Duration::from_millis(10),
            reconnect_delay_max: Duration::from_millis(40),
            ..ConnectionConfig::default()
        }
    }

    fn connected_client(
        config: ConnectionConfig,
    ) -> (CameraClient, Receiver<MockLink>, Receiver<GatewayEvent>, Arc<AtomicBool>) {
        let (connector, links) = MockConnector::new();
        let refuse = Arc::clone(&connector.refuse);
        let (events_tx, events) = mpsc::channel();
        let client = CameraClient::new(ServerId::N, Box::new(connector), config, events_tx);
        client.connect().unwrap();
        (client, links, events, refuse)
    }

    fn next_link(links: &Receiver<MockLink>) -> MockLink {
        links.recv_timeout(Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_command_acknowledged() {
        let (client, links, _events, _) = connected_client(test_config());
        let server = next_link(&links).auto_ack(ResponseCode::Ok);

        let ack = client.resume().unwrap();
        assert!(ack.is_ok());
        assert!(ack.time_ack_sent >= ack.time_command_received);
        client.ready_for_data(false).unwrap();
        assert_eq!(client.outstanding(), 0);

        client.disconnect();
        assert!(!client.is_connected());
        let seen = server.join().unwrap();
        assert_eq!(seen[0].kind, CommandKind::Resume);
        assert_eq!(seen[1].kind, CommandKind::ReadyForData { ready: false });
        assert_ne!(seen[0].cmd_id, seen[1].cmd_id);
    }

    #[test]
    fn test_rejected_response() {
        let (client, links, _events, _) = connected_client(test_config());
        let _server = next_link(&links).auto_ack(ResponseCode::Error(2));

        match client.open_hatch() {
            Err(DreamError::Rejected {
                command, response, ..
            }) => {
                assert_eq!(command, "openHatch");
                assert_eq!(response, ResponseCode::Error(2));
            }
            other => panic!("unexpected result {:?}", other),
        }
        // send_command does not interpret the response
        let ack = client.send_command(CommandKind::Stop).unwrap();
        assert_eq!(ack.response, ResponseCode::Error(2));
    }

    #[test]
    fn test_ack_timeout() {
        let (client, links, _events, _) = connected_client(test_config());
        let link = next_link(&links);

        let start = Instant::now();
        let result = client.close_hatch();
        let elapsed = start.elapsed();
        assert!(matches!(
            result,
            Err(DreamError::AckTimeout { command: "closeHatch", timeout_ms: 300, .. })
        ));
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_secs(2));
        assert_eq!(client.outstanding(), 0);

        // A late acknowledgement is ignored
        let cmd = link.commands.recv().unwrap();
        link.ack(&cmd, ResponseCode::Ok);
        assert!(client.is_connected());
    }

    #[test]
    fn test_out_of_order_acks() {
        let (client, links, _events, _) = connected_client(ConnectionConfig {
            ack_timeout: Duration::from_secs(2),
            ..test_config()
        });
        let client = Arc::new(client);
        let link = next_link(&links);

        let c1 = Arc::clone(&client);
        let first = thread::spawn(move || c1.resume());
        let cmd1 = link.commands.recv().unwrap();
        let c2 = Arc::clone(&client);
        let second = thread::spawn(move || c2.stop());
        let cmd2 = link.commands.recv().unwrap();

        link.ack(&cmd2, ResponseCode::Ok);
        link.ack(&cmd1, ResponseCode::Error(1));

        assert!(second.join().unwrap().is_ok());
        assert!(matches!(first.join().unwrap(), Err(DreamError::Rejected { .. })));
    }

    #[test]
    fn test_unique_cmd_ids() {
        let (client, links, _events, _) = connected_client(test_config());
        let server = next_link(&links).auto_ack(ResponseCode::Ok);
        let client = Arc::new(client);

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let client = Arc::clone(&client);
                thread::spawn(move || {
                    for _ in 0..10 {
                        client.data_archived().unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        client.disconnect();

        let seen = server.join().unwrap();
        let ids: HashSet<u32> = seen.iter().map(|c| c.cmd_id).collect();
        assert_eq!(seen.len(), 40);
        assert_eq!(ids.len(), 40);
    }

    #[test]
    fn test_telemetry_surfaced() {
        let (client, links, events, _) = connected_client(test_config());
        let link = next_link(&links);

        let mut parameters = Map::new();
        parameters.insert("temperature".to_string(), json!(12.5));
        link.incoming
            .send(Some(Incoming::Telemetry(TelemetryMessage::Status(parameters.clone()))))
            .unwrap();

        match events.recv_timeout(Duration::from_secs(1)).unwrap() {
            GatewayEvent::Status { server, parameters: p } => {
                assert_eq!(server, ServerId::N);
                assert_eq!(p, parameters);
            }
            other => panic!("unexpected event {:?}", other),
        }
        drop(client);
    }

    #[test]
    fn test_connection_loss_fails_outstanding_and_reconnects() {
        let (client, links, events, _) = connected_client(ConnectionConfig {
            ack_timeout: Duration::from_secs(2),
            ..test_config()
        });
        let client = Arc::new(client);
        let link = next_link(&links);

        let c = Arc::clone(&client);
        let waiter = thread::spawn(move || {
            let start = Instant::now();
            (c.resume(), start.elapsed())
        });
        link.commands.recv().unwrap();
        link.close();

        let (result, elapsed) = waiter.join().unwrap();
        assert!(matches!(result, Err(DreamError::ConnectionLost(ServerId::N))));
        assert!(elapsed < Duration::from_secs(1));

        assert_eq!(
            events.recv_timeout(Duration::from_secs(1)).unwrap(),
            GatewayEvent::Disconnected {
                server: ServerId::N,
                failed_commands: 1
            }
        );
        let relink = next_link(&links);
        assert!(matches!(
            events.recv_timeout(Duration::from_secs(1)).unwrap(),
            GatewayEvent::Reconnected { server: ServerId::N, .. }
        ));

        let _server = relink.auto_ack(ResponseCode::Ok);
        assert!(client.resume().is_ok());
    }

    #[test]
    fn test_reconnect_gives_up() {
        let config = ConnectionConfig {
            reconnect_max_retries: 2,
            ..test_config()
        };
        let (client, links, events, refuse) = connected_client(config);
        let link = next_link(&links);

        refuse.store(true, Ordering::SeqCst);
        link.close();

        assert!(matches!(
            events.recv_timeout(Duration::from_secs(1)).unwrap(),
            GatewayEvent::Disconnected { .. }
        ));
        assert_eq!(
            events.recv_timeout(Duration::from_secs(1)).unwrap(),
            GatewayEvent::ReconnectFailed {
                server: ServerId::N,
                attempts: 2
            }
        );
        assert!(!client.is_connected());
        assert!(matches!(client.resume(), Err(DreamError::NotConnected(ServerId::N))));

        // An explicit connect starts over once the reader has exited
        refuse.store(false, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        client.connect().unwrap();
        assert!(client.is_connected());
    }

    #[test]
    fn test_not_connected() {
        let (connector, _links) = MockConnector::new();
        let (events_tx, _events) = mpsc::channel();
        let client = CameraClient::new(ServerId::C, Box::new(connector), test_config(), events_tx);
        assert!(matches!(client.stop(), Err(DreamError::NotConnected(ServerId::C))));
        assert_eq!(client.outstanding(), 0);
    }

    #[test]
    fn test_invalid_weather_not_sent() {
        let (client, links, _events, _) = connected_client(test_config());
        let link = next_link(&links);
        let weather = WeatherInfo {
            humidity: 150.0,
            ..WeatherInfo::unsafe_default()
        };
        assert!(matches!(
            client.set_weather_info(weather),
            Err(DreamError::Validation(_))
        ));
        assert!(link.commands.try_recv().is_err());
    }

    #[test]
    fn test_disconnect_stops_reconnect() {
        let (client, links, events, _) = connected_client(test_config());
        let _link = next_link(&links);
        client.disconnect();
        assert!(!client.is_connected());
        // Deliberate disconnects are not reported as connection loss
        assert!(events.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(links.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
