//! Acknowledgements returned by the DREAM servers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Response code carried by an acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseCode {
    Ok,
    /// "Error1", "Error2", ...
    Error(u32),
    /// Any other response string, kept as received
    Unknown(String),
}

impl ResponseCode {
    pub fn is_ok(&self) -> bool {
        matches!(self, ResponseCode::Ok)
    }
}

impl From<String> for ResponseCode {
    fn from(s: String) -> Self {
        if s == "OK" {
            return ResponseCode::Ok;
        }
        match s.strip_prefix("Error").and_then(parse_error_number) {
            Some(n) => ResponseCode::Error(n),
            None => ResponseCode::Unknown(s),
        }
    }
}

/// Only the form `Display` produces: ASCII digits without a leading zero
fn parse_error_number(digits: &str) -> Option<u32> {
    let canonical = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'));
    if canonical {
        digits.parse().ok()
    } else {
        None
    }
}

impl From<ResponseCode> for String {
    fn from(code: ResponseCode) -> Self {
        code.to_string()
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCode::Ok => f.write_str("OK"),
            ResponseCode::Error(n) => write!(f, "Error{}", n),
            ResponseCode::Unknown(s) => f.write_str(s),
        }
    }
}

/// Acknowledgement of a single command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// Identifier of the acknowledged command
    pub cmd_id: u32,
    pub time_command_received: f64,
    pub time_ack_sent: f64,
    pub response: ResponseCode,
}

impl Acknowledgement {
    pub fn new(
        cmd_id: u32,
        time_command_received: f64,
        time_ack_sent: f64,
        response: ResponseCode,
    ) -> Self {
        Self {
            cmd_id,
            time_command_received,
            time_ack_sent,
            response,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.response.is_ok()
    }

    /// Time from the command being sent to the acknowledgement being sent,
    /// as measured by the two clocks. Clamped at zero.
    pub fn latency_from(&self, time_command_sent: f64) -> Duration {
        let seconds = self.time_ack_sent - time_command_sent;
        if seconds.is_finite() && seconds > 0.0 {
            Duration::from_secs_f64(seconds)
        } else {
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_code_parse() {
        assert_eq!(ResponseCode::from("OK".to_string()), ResponseCode::Ok);
        assert_eq!(ResponseCode::from("Error1".to_string()), ResponseCode::Error(1));
        assert_eq!(ResponseCode::from("Error12".to_string()), ResponseCode::Error(12));
        assert_eq!(
            ResponseCode::from("Busy".to_string()),
            ResponseCode::Unknown("Busy".to_string())
        );
        assert_eq!(ResponseCode::Error(2).to_string(), "Error2");
    }

    #[test]
    fn test_response_code_non_canonical_kept() {
        for text in ["Error01", "Error+1", "Error", "Error 1", "Error99999999999"] {
            let code = ResponseCode::from(text.to_string());
            assert_eq!(code, ResponseCode::Unknown(text.to_string()));
            assert_eq!(code.to_string(), text);
        }
        assert_eq!(ResponseCode::from("Error0".to_string()), ResponseCode::Error(0));
    }

    #[test]
    fn test_ack_wire_format() {
        let text = r#"{"cmd_id": 1, "time_command_received": 1624997916.2,
            "time_ack_sent": 1624997916.3, "response": "OK"}"#;
        let ack: Acknowledgement = serde_json::from_str(text).unwrap();
        assert_eq!(ack.cmd_id, 1);
        assert!(ack.is_ok());

        let value = serde_json::to_value(&ack).unwrap();
        assert_eq!(value["response"], "OK");
    }

    #[test]
    fn test_latency() {
        let ack = Acknowledgement::new(1, 10.5, 11.0, ResponseCode::Ok);
        let latency = ack.latency_from(10.0);
        assert!((latency.as_secs_f64() - 1.0).abs() < 1e-9);
        assert_eq!(ack.latency_from(12.0), Duration::ZERO);
    }

    #[test]
    fn test_error_response() {
        let ack = Acknowledgement::new(3, 1.0, 1.1, ResponseCode::Error(2));
        assert!(!ack.is_ok());
        let value = serde_json::to_value(&ack).unwrap();
        assert_eq!(value["response"], "Error2");
    }
}
