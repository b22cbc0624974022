//! Events surfaced by the gateway

use serde_json::{Map, Value};

use dreamproto::{DataProductAnnouncement, ServerId};

/// Something a DREAM server connection reported without being asked
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// Periodic status telemetry
    Status {
        server: ServerId,
        parameters: Map<String, Value>,
    },
    /// New data products are ready for archiving
    DataProducts {
        server: ServerId,
        announcement: DataProductAnnouncement,
    },
    /// The connection was lost; `failed_commands` were outstanding
    Disconnected {
        server: ServerId,
        failed_commands: usize,
    },
    Reconnected {
        server: ServerId,
        attempts: u32,
    },
    /// Gave up reconnecting
    ReconnectFailed {
        server: ServerId,
        attempts: u32,
    },
    /// A message could not be understood; the connection stays up
    ProtocolError {
        server: ServerId,
        message: String,
    },
}

impl GatewayEvent {
    pub fn server(&self) -> ServerId {
        match self {
            GatewayEvent::Status { server, .. }
            | GatewayEvent::DataProducts { server, .. }
            | GatewayEvent::Disconnected { server, .. }
            | GatewayEvent::Reconnected { server, .. }
            | GatewayEvent::ReconnectFailed { server, .. }
            | GatewayEvent::ProtocolError { server, .. } => *server,
        }
    }
}
