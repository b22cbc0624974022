//! Command definitions for DREAM
//!
//! Commands are sent from the CSC to a DREAM server, one JSON object per
//! command. Every command must be acknowledged by the server.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::DreamError;
use crate::types::now_unix;
use crate::weather::WeatherInfo;

/// Operational commands understood by the DREAM servers
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// Resume normal operations
    Resume,
    OpenHatch,
    CloseHatch,
    /// Stop operations and close the hatch
    Stop,
    /// Whether the observatory is ready to receive data products
    ReadyForData { ready: bool },
    /// The last announced data products have been archived
    DataArchived,
    SetWeatherInfo { weather_info: WeatherInfo },
}

impl CommandKind {
    /// Command name used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Resume => "resume",
            CommandKind::OpenHatch => "openHatch",
            CommandKind::CloseHatch => "closeHatch",
            CommandKind::Stop => "stop",
            CommandKind::ReadyForData { .. } => "readyForData",
            CommandKind::DataArchived => "dataArchived",
            CommandKind::SetWeatherInfo { .. } => "setWeatherInfo",
        }
    }

    fn parameters(&self) -> Option<Value> {
        match self {
            CommandKind::ReadyForData { ready } => Some(json!({ "ready": ready })),
            CommandKind::SetWeatherInfo { weather_info } => {
                Some(json!({ "weather_info": weather_info }))
            }
            _ => None,
        }
    }

    fn from_wire(name: &str, parameters: Option<Value>) -> Result<Self, DreamError> {
        let kind = match name {
            "resume" => CommandKind::Resume,
            "openHatch" => CommandKind::OpenHatch,
            "closeHatch" => CommandKind::CloseHatch,
            "stop" => CommandKind::Stop,
            "dataArchived" => CommandKind::DataArchived,
            "readyForData" => {
                let ready = parameter(name, &parameters, "ready")?
                    .as_bool()
                    .ok_or_else(|| {
                        DreamError::protocol("readyForData parameter ready must be a boolean")
                    })?;
                CommandKind::ReadyForData { ready }
            }
            "setWeatherInfo" => {
                let value = parameter(name, &parameters, "weather_info")?;
                let weather_info: WeatherInfo = serde_json::from_value(value.clone())
                    .map_err(|e| DreamError::protocol(format!("invalid weather_info: {}", e)))?;
                CommandKind::SetWeatherInfo { weather_info }
            }
            other => return Err(DreamError::protocol(format!("unknown command {}", other))),
        };
        Ok(kind)
    }
}

fn parameter<'a>(
    command: &str,
    parameters: &'a Option<Value>,
    key: &str,
) -> Result<&'a Value, DreamError> {
    parameters
        .as_ref()
        .and_then(|p| p.get(key))
        .ok_or_else(|| DreamError::protocol(format!("{} is missing parameter {}", command, key)))
}

/// Flat wire form of a command
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireCommand {
    command: String,
    cmd_id: u32,
    time_command_sent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

/// A command together with its identifier and send time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireCommand", into = "WireCommand")]
pub struct Command {
    /// Identifier matched against the acknowledgement
    pub cmd_id: u32,
    /// Float seconds since the UNIX epoch
    pub time_command_sent: f64,
    pub kind: CommandKind,
}

impl Command {
    pub fn new(cmd_id: u32, kind: CommandKind) -> Self {
        Self {
            cmd_id,
            time_command_sent: now_unix(),
            kind,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Extract the command identifier from a message that failed to parse as
    /// a command, so the server can still answer it
    pub fn salvage_cmd_id(value: &Value) -> Option<u32> {
        value
            .get("cmd_id")
            .and_then(Value::as_u64)
            .and_then(|id| u32::try_from(id).ok())
    }
}

impl TryFrom<WireCommand> for Command {
    type Error = DreamError;

    fn try_from(wire: WireCommand) -> Result<Self, Self::Error> {
        let kind = CommandKind::from_wire(&wire.command, wire.parameters)?;
        Ok(Command {
            cmd_id: wire.cmd_id,
            time_command_sent: wire.time_command_sent,
            kind,
        })
    }
}

impl From<Command> for WireCommand {
    fn from(cmd: Command) -> Self {
        WireCommand {
            command: cmd.kind.name().to_string(),
            cmd_id: cmd.cmd_id,
            time_command_sent: cmd.time_command_sent,
            parameters: cmd.kind.parameters(),
        }
    }
}
