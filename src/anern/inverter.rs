use crate::anern::grammar::DecodedResponse;
use crate::anern::packet::{self, Command, Response, END};
use crate::config;
use crate::error::{Error, Result};

use log::{debug, info, warn};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Longest response accepted before giving up on seeing a terminator.
const MAX_RESPONSE_LEN: usize = 512;

/// Pause between writing a command and reading its response.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);

/// Byte link to the inverter.
///
/// Implementations are not required to be safe for interleaved use; [`Inverter`] serialises
/// every exchange.
pub trait Transport {
    fn write(&mut self, frame: &[u8]) -> Result<()>;

    /// Reads up to and including the frame terminator. Returns whatever arrived if the read
    /// times out part way through a frame, and `Error::Timeout` if nothing arrived at all.
    fn read_line(&mut self) -> Result<Vec<u8>>;
}

// SerialTransport {{{
pub struct SerialTransport {
    device: String,
    baud_rate: u32,
    read_timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn new(device: &str, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            device: device.to_string(),
            baud_rate,
            read_timeout,
            port: None,
        }
    }

    pub fn from_config(config: &config::Inverter) -> Self {
        Self::new(config.device(), config.baud_rate(), config.read_timeout())
    }

    fn open(&self) -> Result<Box<dyn SerialPort>> {
        info!("opening {} at {} baud", self.device, self.baud_rate);

        let port = serialport::new(&self.device, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(self.read_timeout)
            .open()?;

        Ok(port)
    }

    // opened on first use and kept for later exchanges
    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        let port = match self.port.take() {
            Some(port) => port,
            None => self.open()?,
        };
        Ok(self.port.insert(port))
    }

    fn read_frame<R: Read + ?Sized>(port: &mut R) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        while line.len() < MAX_RESPONSE_LEN {
            match port.read(&mut byte) {
                Ok(0) => return Self::timed_out(line),
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == END {
                        return Ok(line);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Self::timed_out(line),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        warn!("no terminator within {} bytes", MAX_RESPONSE_LEN);
        Ok(line)
    }

    fn timed_out(line: Vec<u8>) -> Result<Vec<u8>> {
        if line.is_empty() {
            return Err(Error::Timeout);
        }
        warn!("read timed out after {} bytes without terminator", line.len());
        Ok(line)
    }

    // a port that failed with anything other than a timeout is reopened on next use
    fn forget_on_error<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(ref e) = result {
            if !matches!(e, Error::Timeout) {
                warn!("closing {} after error: {}", self.device, e);
                self.port = None;
            }
        }
        result
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, frame: &[u8]) -> Result<()> {
        let result = self.port().and_then(|port| {
            // drop anything left over from an earlier, abandoned exchange
            port.clear(ClearBuffer::Input)?;
            port.write_all(frame)?;
            port.flush()?;
            Ok(())
        });
        self.forget_on_error(result)
    }

    fn read_line(&mut self) -> Result<Vec<u8>> {
        let result = self
            .port()
            .and_then(|port| Self::read_frame(&mut **port));
        self.forget_on_error(result)
    }
} // }}}

/// Whether the checksum bytes of a response are compared against the body before decoding.
///
/// Inverters seen in the field include the `(` marker in the response checksum, so their frames
/// fail a body-only comparison. Enforcing is opt-in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChecksumPolicy {
    Enforce,
    #[default]
    Ignore,
}

/// One inverter on one transport.
///
/// The transport sits behind a mutex, so `send` may be called from any number of threads; each
/// write/settle/read exchange completes before the next one starts.
pub struct Inverter<T: Transport> {
    transport: Mutex<T>,
    settle: Duration,
    checksum_policy: ChecksumPolicy,
}

impl Inverter<SerialTransport> {
    pub fn from_config(config: &config::Inverter) -> Self {
        let checksum_policy = if config.strict_checksum() {
            ChecksumPolicy::Enforce
        } else {
            ChecksumPolicy::Ignore
        };

        Self::new(SerialTransport::from_config(config))
            .with_settle(config.settle())
            .with_checksum_policy(checksum_policy)
    }
}

impl<T: Transport> Inverter<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Mutex::new(transport),
            settle: DEFAULT_SETTLE,
            checksum_policy: ChecksumPolicy::default(),
        }
    }

    /// Pause between writing a command and reading the response.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_checksum_policy(mut self, checksum_policy: ChecksumPolicy) -> Self {
        self.checksum_policy = checksum_policy;
        self
    }

    pub fn checksum_policy(&self) -> ChecksumPolicy {
        self.checksum_policy
    }

    /// Sends `command` and returns its decoded (or raw) response.
    pub fn send(&self, command: Command) -> Result<Response> {
        let raw = self.exchange(command)?;
        self.process(command, &raw)
    }

    /// General status (QPIGS), decoded.
    pub fn status(&self) -> Result<DecodedResponse> {
        match self.send(Command::Qpigs)? {
            Response::Decoded(decoded) => Ok(decoded),
            Response::Raw(_) => Err(Error::UnexpectedResponse {
                command: Command::Qpigs.code(),
                expected: "decoded",
            }),
        }
    }

    /// Device ratings (QPIRI), as the undecoded response body.
    pub fn ratings(&self) -> Result<String> {
        match self.send(Command::Qpiri)? {
            Response::Raw(text) => Ok(text),
            Response::Decoded(_) => Err(Error::UnexpectedResponse {
                command: Command::Qpiri.code(),
                expected: "raw",
            }),
        }
    }

    fn exchange(&self, command: Command) -> Result<Vec<u8>> {
        let frame = command.encode();

        let mut transport = self
            .transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        debug!("{}: sending {}", command, frame.escape_ascii());
        transport.write(&frame)?;

        if !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }

        let raw = transport.read_line()?;
        debug!("{}: received {}", command, raw.escape_ascii());

        Ok(raw)
    }

    fn process(&self, command: Command, raw: &[u8]) -> Result<Response> {
        let body = packet::validate_and_strip(raw)?;

        if self.checksum_policy == ChecksumPolicy::Enforce {
            packet::verify_checksum(raw)?;
        }

        command.interpret(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// Hands out scripted chunks, then times out.
    struct ScriptedReader {
        chunks: VecDeque<io::Result<Vec<u8>>>,
    }

    impl ScriptedReader {
        fn new(chunks: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                chunks: chunks.into(),
            }
        }

        fn remaining(&self) -> Vec<u8> {
            self.chunks
                .iter()
                .filter_map(|chunk| chunk.as_ref().ok())
                .flatten()
                .copied()
                .collect()
        }
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(Ok(mut chunk)) => {
                    let n = buf.len().min(chunk.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.chunks.push_front(Ok(chunk.split_off(n)));
                    }
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Err(io::ErrorKind::TimedOut.into()),
            }
        }
    }

    #[test]
    fn read_frame_times_out_with_nothing_read() {
        let mut reader = ScriptedReader::new(vec![]);
        assert!(matches!(
            SerialTransport::read_frame(&mut reader),
            Err(Error::Timeout)
        ));
    }

    #[test]
    fn read_frame_treats_zero_length_read_as_timeout() {
        let mut reader = ScriptedReader::new(vec![Ok(vec![])]);
        assert!(matches!(
            SerialTransport::read_frame(&mut reader),
            Err(Error::Timeout)
        ));
    }

    #[test]
    fn read_frame_returns_partial_line_on_timeout() {
        let mut reader = ScriptedReader::new(vec![
            Ok(b"(AB".to_vec()),
            Err(io::ErrorKind::TimedOut.into()),
        ]);
        assert_eq!(SerialTransport::read_frame(&mut reader).unwrap(), b"(AB");
    }

    #[test]
    fn read_frame_stops_at_length_cap() {
        let mut reader = ScriptedReader::new(vec![Ok(vec![b'A'; 600])]);
        let line = SerialTransport::read_frame(&mut reader).unwrap();

        assert_eq!(line.len(), MAX_RESPONSE_LEN);
        assert_eq!(reader.remaining().len(), 600 - MAX_RESPONSE_LEN);
    }

    #[test]
    fn read_frame_retries_when_interrupted() {
        let mut reader = ScriptedReader::new(vec![
            Ok(b"(NA".to_vec()),
            Err(io::ErrorKind::Interrupted.into()),
            Ok(b"K\x73\x73\r".to_vec()),
        ]);
        assert_eq!(
            SerialTransport::read_frame(&mut reader).unwrap(),
            b"(NAK\x73\x73\r"
        );
    }

    #[test]
    fn read_frame_stops_at_terminator() {
        let mut reader = ScriptedReader::new(vec![Ok(b"(OK\x00\x00\rEXTRA".to_vec())]);

        assert_eq!(
            SerialTransport::read_frame(&mut reader).unwrap(),
            b"(OK\x00\x00\r"
        );
        assert_eq!(reader.remaining(), b"EXTRA");
    }

    #[test]
    fn read_frame_propagates_other_errors() {
        let mut reader = ScriptedReader::new(vec![
            Ok(b"(".to_vec()),
            Err(io::ErrorKind::BrokenPipe.into()),
        ]);
        assert!(matches!(
            SerialTransport::read_frame(&mut reader),
            Err(Error::Io(_))
        ));
    }
}
