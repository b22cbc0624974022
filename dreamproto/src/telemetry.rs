//! Telemetry definitions for DREAM
//!
//! Telemetry is sent from a DREAM server to the CSC without being requested.
//! It shares the connection with acknowledgements, so incoming messages are
//! told apart by their shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ack::Acknowledgement;
use crate::error::{DreamError, DreamResult};

/// Location prefix of products that are still being written on the server
pub const TMPDATA_PREFIX: &str = "/tmpdata/";

/// Description of one data product ready for archiving
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataProductMetadata {
    pub name: String,
    /// Path or URL the product can be fetched from
    pub location: String,
    /// Float seconds since the UNIX epoch
    pub timestamp: f64,
}

impl DataProductMetadata {
    pub fn is_tmpdata(&self) -> bool {
        self.location.starts_with(TMPDATA_PREFIX)
    }
}

/// Announcement of new data products
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataProductAnnouncement {
    pub amount: u32,
    pub metadata: Vec<DataProductMetadata>,
}

impl DataProductAnnouncement {
    pub fn new(metadata: Vec<DataProductMetadata>) -> Self {
        Self {
            amount: metadata.len() as u32,
            metadata,
        }
    }

    pub fn validate(&self) -> DreamResult<()> {
        if self.amount == 0 {
            return Err(DreamError::validation("data product amount must be at least 1"));
        }
        if self.amount as usize != self.metadata.len() {
            return Err(DreamError::validation(format!(
                "data product amount {} does not match {} metadata entries",
                self.amount,
                self.metadata.len()
            )));
        }
        for entry in &self.metadata {
            if entry.name.is_empty() || entry.location.is_empty() {
                return Err(DreamError::validation(
                    "data product name and location must not be empty",
                ));
            }
        }
        Ok(())
    }
}

/// Telemetry messages, `{"telemetry": <name>, "parameters": {...}}` on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "telemetry", content = "parameters")]
pub enum TelemetryMessage {
    #[serde(rename = "setNewDataProducts")]
    SetNewDataProducts(DataProductAnnouncement),
    /// Periodic status; the contents are defined by the server
    #[serde(rename = "status")]
    Status(Map<String, Value>),
}

impl TelemetryMessage {
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryMessage::SetNewDataProducts(_) => "setNewDataProducts",
            TelemetryMessage::Status(_) => "status",
        }
    }
}

/// Any message a DREAM server sends to the CSC
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Incoming {
    Ack(Acknowledgement),
    Telemetry(TelemetryMessage),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::ResponseCode;
    use serde_json::json;

    fn metadata() -> DataProductMetadata {
        DataProductMetadata {
            name: "dream_n_20210629_201836.fits".to_string(),
            location: "/data/n/dream_n_20210629_201836.fits".to_string(),
            timestamp: 1624997916.102829,
        }
    }

    #[test]
    fn test_announcement_one_product() {
        let value = json!({
            "telemetry": "setNewDataProducts",
            "parameters": {"amount": 1, "metadata": [
                {"name": "a.fits", "location": "/data/a.fits", "timestamp": 1624997916.0}
            ]}
        });
        let msg: TelemetryMessage = serde_json::from_value(value).unwrap();
        match msg {
            TelemetryMessage::SetNewDataProducts(announcement) => {
                announcement.validate().unwrap();
                assert_eq!(announcement.metadata.len(), 1);
                assert_eq!(announcement.metadata[0].name, "a.fits");
            }
            other => panic!("unexpected telemetry {:?}", other),
        }
    }

    #[test]
    fn test_announcement_amount_mismatch() {
        let announcement = DataProductAnnouncement {
            amount: 2,
            metadata: vec![metadata()],
        };
        assert!(announcement.validate().is_err());
        assert!(DataProductAnnouncement::new(vec![]).validate().is_err());
        assert!(DataProductAnnouncement::new(vec![metadata()]).validate().is_ok());
    }

    #[test]
    fn test_tmpdata_location() {
        let mut product = metadata();
        assert!(!product.is_tmpdata());
        product.location = "/tmpdata/n/partial.fits".to_string();
        assert!(product.is_tmpdata());
    }

    #[test]
    fn test_incoming_demultiplex() {
        let ack: Incoming = serde_json::from_value(json!({
            "cmd_id": 5, "time_command_received": 1.0, "time_ack_sent": 1.1, "response": "OK"
        }))
        .unwrap();
        assert_eq!(
            ack,
            Incoming::Ack(Acknowledgement::new(5, 1.0, 1.1, ResponseCode::Ok))
        );

        let status: Incoming = serde_json::from_value(json!({
            "telemetry": "status", "parameters": {"hatch": "open"}
        }))
        .unwrap();
        match status {
            Incoming::Telemetry(TelemetryMessage::Status(map)) => {
                assert_eq!(map.get("hatch"), Some(&json!("open")));
            }
            other => panic!("unexpected message {:?}", other),
        }

        let garbage = serde_json::from_value::<Incoming>(json!({"hello": "world"}));
        assert!(garbage.is_err());
    }
}
