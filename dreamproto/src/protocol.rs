//! Framing for DREAM messages
//!
//! Each message is a single JSON object followed by a newline.

use std::io::{self, BufRead, Read};

use serde::Serialize;

use crate::commands::Command;
use crate::error::{DreamError, DreamResult};
use crate::telemetry::Incoming;

/// Message terminator
pub const TERMINATOR: u8 = b'\n';

/// Maximum message size in bytes, terminator included
pub const MAX_MESSAGE_SIZE: usize = 65535;

/// Serialize a message and append the terminator
pub fn encode_line<T: Serialize>(message: &T) -> DreamResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec(message)?;
    if bytes.len() >= MAX_MESSAGE_SIZE {
        return Err(DreamError::protocol(format!(
            "message of {} bytes exceeds maximum of {}",
            bytes.len(),
            MAX_MESSAGE_SIZE
        )));
    }
    bytes.push(TERMINATOR);
    Ok(bytes)
}

/// Result of reading from a newline-framed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRead {
    /// `line` ends with the terminator
    Complete,
    /// End of stream, nothing left in `line` worth decoding
    Eof,
    /// Stream ended part way through a line
    Truncated,
    /// The line grew past `MAX_MESSAGE_SIZE` before a terminator arrived
    Oversized,
}

/// Append bytes up to and including the next terminator to `line`, never
/// letting it grow past `MAX_MESSAGE_SIZE + 1` bytes. Bytes already in
/// `line` from an interrupted read count towards the limit.
pub fn read_line_limited<R: BufRead>(
    reader: &mut R,
    line: &mut Vec<u8>,
) -> io::Result<LineRead> {
    let room = (MAX_MESSAGE_SIZE + 1).saturating_sub(line.len()) as u64;
    let read = (&mut *reader).take(room).read_until(TERMINATOR, line)?;
    if line.len() > MAX_MESSAGE_SIZE {
        return Ok(LineRead::Oversized);
    }
    if line.last() == Some(&TERMINATOR) {
        Ok(LineRead::Complete)
    } else if read == 0 {
        Ok(LineRead::Eof)
    } else {
        Ok(LineRead::Truncated)
    }
}

/// Discard input up to and including the next terminator. Returns the
/// number of bytes dropped.
pub fn skip_line<R: BufRead>(reader: &mut R) -> io::Result<usize> {
    let mut skipped = 0;
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(skipped);
        }
        match available.iter().position(|b| *b == TERMINATOR) {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(skipped + end + 1);
            }
            None => {
                let len = available.len();
                reader.consume(len);
                skipped += len;
            }
        }
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}

/// Decode one line received by the CSC
pub fn decode_incoming(line: &[u8]) -> DreamResult<Incoming> {
    serde_json::from_slice(trim_line(line))
        .map_err(|e| DreamError::protocol(format!("unrecognized message: {}", e)))
}

/// Decode one line received by a DREAM server
pub fn decode_command(line: &[u8]) -> DreamResult<Command> {
    let value: serde_json::Value = serde_json::from_slice(trim_line(line))?;
    serde_json::from_value(value)
        .map_err(|e| DreamError::protocol(format!("invalid command: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandKind;
    use crate::telemetry::TelemetryMessage;

    #[test]
    fn test_encode_line_terminated() {
        let cmd = Command::new(1, CommandKind::OpenHatch);
        let line = encode_line(&cmd).unwrap();
        assert_eq!(line.last(), Some(&TERMINATOR));
        assert_eq!(line.iter().filter(|b| **b == TERMINATOR).count(), 1);
        let decoded = decode_command(&line).unwrap();
        assert_eq!(decoded.kind, CommandKind::OpenHatch);
    }

    #[test]
    fn test_decode_incoming_crlf() {
        let line = b"{\"telemetry\": \"status\", \"parameters\": {}}\r\n";
        let msg = decode_incoming(line).unwrap();
        assert!(matches!(msg, Incoming::Telemetry(TelemetryMessage::Status(_))));
    }

    #[test]
    fn test_read_line_limited() {
        let mut input = b"{\"a\": 1}\n".to_vec();
        input.extend(std::iter::repeat(b'x').take(MAX_MESSAGE_SIZE * 2));
        input.extend_from_slice(b"\n{\"b\": 2}\npartial");
        let mut reader = io::Cursor::new(input);
        let mut line = Vec::new();

        assert_eq!(read_line_limited(&mut reader, &mut line).unwrap(), LineRead::Complete);
        assert_eq!(line, b"{\"a\": 1}\n");

        line.clear();
        assert_eq!(read_line_limited(&mut reader, &mut line).unwrap(), LineRead::Oversized);
        assert_eq!(line.len(), MAX_MESSAGE_SIZE + 1);
        assert_eq!(skip_line(&mut reader).unwrap(), MAX_MESSAGE_SIZE);

        line.clear();
        assert_eq!(read_line_limited(&mut reader, &mut line).unwrap(), LineRead::Complete);
        assert_eq!(line, b"{\"b\": 2}\n");

        line.clear();
        assert_eq!(read_line_limited(&mut reader, &mut line).unwrap(), LineRead::Truncated);
        line.clear();
        assert_eq!(read_line_limited(&mut reader, &mut line).unwrap(), LineRead::Eof);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode_incoming(b"not json\n"), Err(DreamError::Protocol(_))));
        assert!(matches!(decode_command(b"{]\n"), Err(DreamError::Json(_))));
        assert!(matches!(
            decode_command(b"{\"command\": \"fly\", \"cmd_id\": 1, \"time_command_sent\": 0.0}\n"),
            Err(DreamError::Protocol(_))
        ));
    }
}
