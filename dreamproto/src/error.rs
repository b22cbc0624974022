//! Error definitions for DREAM

use thiserror::Error;

use crate::ack::ResponseCode;
use crate::types::ServerId;

/// DREAM error types
#[derive(Error, Debug)]
pub enum DreamError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No acknowledgement for {command} (cmd_id {cmd_id}) within {timeout_ms} ms")]
    AckTimeout {
        cmd_id: u32,
        command: &'static str,
        timeout_ms: u64,
    },

    #[error("{command} (cmd_id {cmd_id}) rejected with response {response}")]
    Rejected {
        cmd_id: u32,
        command: &'static str,
        response: ResponseCode,
    },

    #[error("Not connected to server {0}")]
    NotConnected(ServerId),

    #[error("Connection to server {0} lost")]
    ConnectionLost(ServerId),

    #[error("Invalid state: {0}")]
    State(String),

    #[error("Unknown server: {0}")]
    UnknownServer(String),

    #[error("Channel error: {0}")]
    Channel(String),
}

impl DreamError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        DreamError::Protocol(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        DreamError::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        DreamError::Config(msg.into())
    }
}

/// Result type alias for DREAM operations
pub type DreamResult<T> = Result<T, DreamError>;
