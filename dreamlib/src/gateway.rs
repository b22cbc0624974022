//! Gateway to all configured DREAM servers
//!
//! Holds one `CameraClient` per server. Events from every connection arrive on
//! a single stream.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::{info, warn};

use dreamproto::{
    Acknowledgement, CommandKind, ConnectionConfig, DreamError, DreamResult, ServerAddress,
    ServerId,
};

use crate::client::CameraClient;
use crate::connection::Connector;
use crate::events::GatewayEvent;

/// Per-server outcome of an operation applied to every server
pub type ServerResults<T> = BTreeMap<ServerId, DreamResult<T>>;

pub struct Gateway {
    clients: BTreeMap<ServerId, CameraClient>,
    events: Mutex<Receiver<GatewayEvent>>,
}

impl Gateway {
    /// Gateway to servers reached over TCP
    pub fn tcp(servers: &[ServerAddress], config: &ConnectionConfig) -> Self {
        let (events_tx, events) = mpsc::channel();
        let clients = servers
            .iter()
            .map(|address| {
                let client = CameraClient::tcp(address.clone(), config.clone(), events_tx.clone());
                (address.id, client)
            })
            .collect();
        Self {
            clients,
            events: Mutex::new(events),
        }
    }

    /// Gateway over caller-supplied connectors
    pub fn with_connectors(
        connectors: Vec<(ServerId, Box<dyn Connector>)>,
        config: &ConnectionConfig,
    ) -> Self {
        let (events_tx, events) = mpsc::channel();
        let clients = connectors
            .into_iter()
            .map(|(id, connector)| {
                let client = CameraClient::new(id, connector, config.clone(), events_tx.clone());
                (id, client)
            })
            .collect();
        Self {
            clients,
            events: Mutex::new(events),
        }
    }

    pub fn servers(&self) -> Vec<ServerId> {
        self.clients.keys().copied().collect()
    }

    pub fn connected(&self) -> Vec<ServerId> {
        self.clients
            .iter()
            .filter(|(_, client)| client.is_connected())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn client(&self, server: ServerId) -> DreamResult<&CameraClient> {
        self.clients
            .get(&server)
            .ok_or_else(|| DreamError::UnknownServer(server.to_string()))
    }

    fn for_each<T, F>(&self, op: F) -> ServerResults<T>
    where
        T: Send,
        F: Fn(&CameraClient) -> DreamResult<T> + Sync,
    {
        let op = &op;
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .clients
                .iter()
                .map(|(id, client)| (*id, scope.spawn(move || op(client))))
                .collect();
            handles
                .into_iter()
                .map(|(id, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(DreamError::Channel(format!("server {} worker panicked", id)))
                    });
                    (id, result)
                })
                .collect()
        })
    }

    /// Connect every server. Servers that fail keep their error in the result.
    pub fn connect_all(&self) -> ServerResults<()> {
        let results = self.for_each(|client| client.connect());
        for (id, result) in &results {
            if let Err(e) = result {
                warn!("Could not connect to server {}: {}", id, e);
            }
        }
        info!(
            "Connected to {} of {} DREAM servers",
            results.values().filter(|r| r.is_ok()).count(),
            results.len()
        );
        results
    }

    pub fn disconnect_all(&self) {
        for client in self.clients.values() {
            client.disconnect();
        }
    }

    /// Send a command to one server and require an "OK" acknowledgement
    pub fn send_to(&self, server: ServerId, kind: CommandKind) -> DreamResult<Acknowledgement> {
        self.client(server)?.command(kind)
    }

    /// Send a command to every server at once
    pub fn broadcast(&self, kind: CommandKind) -> ServerResults<Acknowledgement> {
        self.for_each(|client| client.command(kind.clone()))
    }

    /// Wait up to `timeout` for the next event from any server
    pub fn next_event(&self, timeout: Duration) -> DreamResult<Option<GatewayEvent>> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        match events.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(DreamError::Channel("gateway event stream closed".to_string()))
            }
        }
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.disconnect_all();
    }
}
