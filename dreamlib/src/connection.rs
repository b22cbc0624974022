//! Connection management for the CSC-to-DREAM link
//!
//! A connection is split in two halves so that commands can be written from
//! any thread while a single reader thread waits for incoming messages.

use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;
use socket2::{Domain, Protocol, Socket, Type};

use dreamproto::{
    decode_incoming, encode_line, read_line_limited, skip_line, Command, DreamError, DreamResult,
    Incoming, LineRead, ServerAddress, MAX_MESSAGE_SIZE,
};

/// Writing half of a connection to a DREAM server
pub trait MessageSender: Send {
    /// Send a command to the server
    fn send(&mut self, command: &Command) -> DreamResult<()>;

    /// Close the connection, which also wakes the reading half
    fn shutdown(&mut self) -> DreamResult<()>;
}

/// Reading half of a connection to a DREAM server
pub trait MessageReceiver: Send {
    /// Block until the next message arrives. `Ok(None)` means the server
    /// closed the connection. A `Protocol` error leaves the connection usable.
    fn receive(&mut self) -> DreamResult<Option<Incoming>>;
}

/// Opens connections to one DREAM server
pub trait Connector: Send + Sync {
    fn connect(&self) -> DreamResult<(Box<dyn MessageSender>, Box<dyn MessageReceiver>)>;

    /// Where the connection goes, for log messages
    fn describe(&self) -> String;
}

/// TCP connections to a DREAM server
pub struct TcpConnector {
    address: ServerAddress,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(address: ServerAddress, connect_timeout: Duration) -> Self {
        Self {
            address,
            connect_timeout,
        }
    }

    fn resolve(&self) -> DreamResult<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = self.address.authority().to_socket_addrs()?.collect();
        if addrs.is_empty() {
            return Err(DreamError::config(format!(
                "{} did not resolve to any address",
                self.address.authority()
            )));
        }
        Ok(addrs)
    }

    fn open(&self, addr: &SocketAddr) -> DreamResult<TcpStream> {
        let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_keepalive(true)?;
        socket.set_nodelay(true)?;
        socket.connect_timeout(&(*addr).into(), self.connect_timeout)?;
        Ok(socket.into())
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> DreamResult<(Box<dyn MessageSender>, Box<dyn MessageReceiver>)> {
        let mut last_error = None;
        for addr in self.resolve()? {
            match self.open(&addr) {
                Ok(stream) => {
                    debug!("Connected to server {} at {}", self.address.id, addr);
                    let receiver: Box<dyn MessageReceiver> =
                        Box::new(TcpReceiver::new(stream.try_clone()?));
                    let sender: Box<dyn MessageSender> = Box::new(TcpSender { stream });
                    return Ok((sender, receiver));
                }
                Err(e) => {
                    debug!("Connecting to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| DreamError::NotConnected(self.address.id)))
    }

    fn describe(&self) -> String {
        format!("server {} at {}", self.address.id, self.address.authority())
    }
}

/// Writes newline-terminated commands to a TCP stream
pub struct TcpSender {
    stream: TcpStream,
}

impl MessageSender for TcpSender {
    fn send(&mut self, command: &Command) -> DreamResult<()> {
        let data = encode_line(command)?;
        self.stream.write_all(&data)?;
        self.stream.flush()?;
        Ok(())
    }

    fn shutdown(&mut self) -> DreamResult<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // Already closed by the peer
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reads newline-terminated messages from a TCP stream
pub struct TcpReceiver {
    reader: BufReader<TcpStream>,
    line: Vec<u8>,
}

const LINE_CAPACITY: usize = 4096;

impl TcpReceiver {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            reader: BufReader::new(stream),
            line: Vec::with_capacity(LINE_CAPACITY),
        }
    }
}

impl MessageReceiver for TcpReceiver {
    fn receive(&mut self) -> DreamResult<Option<Incoming>> {
        loop {
            self.line.clear();
            match read_line_limited(&mut self.reader, &mut self.line)? {
                LineRead::Complete => {}
                LineRead::Eof => return Ok(None),
                LineRead::Truncated => {
                    debug!("Connection closed part way through a message");
                    return Ok(None);
                }
                LineRead::Oversized => {
                    let size = self.line.len() + skip_line(&mut self.reader)?;
                    self.line.clear();
                    self.line.shrink_to(LINE_CAPACITY);
                    return Err(DreamError::protocol(format!(
                        "message of {} bytes exceeds maximum of {}",
                        size, MAX_MESSAGE_SIZE
                    )));
                }
            }
            // Blank keep-alive lines
            if self.line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }
            return decode_incoming(&self.line).map(Some);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dreamproto::{CommandKind, ServerId, TelemetryMessage};
    use dreamproto::TERMINATOR;
    use std::io::{BufRead, Read};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_tcp_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = Vec::new();
            reader.read_until(TERMINATOR, &mut line).unwrap();
            stream
                .write_all(b"\n{\"telemetry\": \"status\", \"parameters\": {\"ok\": true}}\n")
                .unwrap();
            line
        });

        let connector = TcpConnector::new(
            ServerAddress::new(ServerId::N, "127.0.0.1", port),
            Duration::from_secs(1),
        );
        let (mut sender, mut receiver) = connector.connect().unwrap();
        sender.send(&Command::new(1, CommandKind::Resume)).unwrap();

        match receiver.receive().unwrap() {
            Some(Incoming::Telemetry(TelemetryMessage::Status(map))) => {
                assert_eq!(map.get("ok"), Some(&serde_json::Value::Bool(true)));
            }
            other => panic!("unexpected message {:?}", other),
        }

        let line = server.join().unwrap();
        let cmd = dreamproto::decode_command(&line).unwrap();
        assert_eq!(cmd.kind, CommandKind::Resume);

        // Server side has gone away
        assert!(matches!(receiver.receive(), Ok(None) | Err(DreamError::Io(_))));
    }

    #[test]
    fn test_malformed_line_is_protocol_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"garbage\n").unwrap();
            stream
                .write_all(b"{\"cmd_id\": 1, \"time_command_received\": 1.0, \"time_ack_sent\": 1.0, \"response\": \"OK\"}\n")
                .unwrap();
            let mut rest = Vec::new();
            let _ = stream.read_to_end(&mut rest);
        });

        let connector = TcpConnector::new(
            ServerAddress::new(ServerId::S, "127.0.0.1", port),
            Duration::from_secs(1),
        );
        let (mut sender, mut receiver) = connector.connect().unwrap();
        assert!(matches!(receiver.receive(), Err(DreamError::Protocol(_))));
        assert!(matches!(receiver.receive(), Ok(Some(Incoming::Ack(_)))));
        sender.shutdown().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_oversized_line_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let flood = vec![b'x'; MAX_MESSAGE_SIZE * 8];
            stream.write_all(&flood).unwrap();
            stream
                .write_all(b"\n{\"telemetry\": \"status\", \"parameters\": {}}\n")
                .unwrap();
            let mut rest = Vec::new();
            let _ = stream.read_to_end(&mut rest);
        });

        let connector = TcpConnector::new(
            ServerAddress::new(ServerId::C, "127.0.0.1", port),
            Duration::from_secs(1),
        );
        let (mut sender, mut receiver) = connector.connect().unwrap();
        match receiver.receive() {
            Err(DreamError::Protocol(message)) => {
                assert!(message.contains(&format!("{} bytes", MAX_MESSAGE_SIZE * 8 + 1)));
            }
            other => panic!("expected protocol error, got {:?}", other),
        }
        // The connection survives and the next message is intact
        assert!(matches!(
            receiver.receive(),
            Ok(Some(Incoming::Telemetry(TelemetryMessage::Status(_))))
        ));
        sender.shutdown().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to find a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let connector = TcpConnector::new(
            ServerAddress::new(ServerId::E, "127.0.0.1", port),
            Duration::from_millis(500),
        );
        assert!(connector.connect().is_err());
        assert_eq!(connector.describe(), format!("server E at 127.0.0.1:{}", port));
    }
}
