//! Type definitions shared between the CSC and the DREAM servers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DreamError;

/// Current time as float seconds since the UNIX epoch, the format used by
/// every timestamp on the wire
pub fn now_unix() -> f64 {
    unix_seconds(Utc::now())
}

/// Convert a UTC time to float seconds since the UNIX epoch
pub fn unix_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp_micros() as f64 / 1_000_000.0
}

/// Position of a DREAM camera-controller server. Parsing ignores case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String")]
pub enum ServerId {
    N,
    E,
    S,
    W,
    /// Centre (zenith) camera
    C,
    B,
}

impl ServerId {
    pub const ALL: [ServerId; 6] = [
        ServerId::N,
        ServerId::E,
        ServerId::S,
        ServerId::W,
        ServerId::C,
        ServerId::B,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerId::N => "N",
            ServerId::E => "E",
            ServerId::S => "S",
            ServerId::W => "W",
            ServerId::C => "C",
            ServerId::B => "B",
        }
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerId {
    type Err = DreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServerId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DreamError::UnknownServer(s.to_string()))
    }
}

impl TryFrom<String> for ServerId {
    type Error = DreamError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Network address of one DREAM server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerAddress {
    pub id: ServerId,
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn new(id: ServerId, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
        }
    }

    /// "host:port" form accepted by `ToSocketAddrs`
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
