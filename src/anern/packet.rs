use crate::anern::checksum::checksum;
use crate::anern::grammar::{DecodedResponse, Grammar, STATUS};
use crate::error::{Error, Result};

use serde::Serialize;

/// Leading marker byte of every response frame.
pub const START: u8 = b'(';
/// Terminator of every frame, in both directions.
pub const END: u8 = b'\r';

// marker + 2 checksum bytes + terminator
const MIN_RESPONSE_LEN: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// General status parameters; answered with the status field set.
    Qpigs,
    /// Device rating information; answered with raw text.
    Qpiri,
}

impl Command {
    pub const ALL: [Command; 2] = [Command::Qpigs, Command::Qpiri];

    pub fn code(&self) -> &'static str {
        match self {
            Command::Qpigs => "QPIGS",
            Command::Qpiri => "QPIRI",
        }
    }

    /// Response grammar, or `None` when the body is handed back undecoded.
    pub fn grammar(&self) -> Option<&'static Grammar> {
        match self {
            Command::Qpigs => Some(&STATUS),
            Command::Qpiri => None,
        }
    }

    /// Wire bytes: code, two checksum bytes over the code, terminator.
    pub fn encode(&self) -> Vec<u8> {
        let code = self.code().as_bytes();

        let mut frame = Vec::with_capacity(code.len() + 3);
        frame.extend_from_slice(code);
        frame.extend_from_slice(&checksum(code));
        frame.push(END);
        frame
    }

    /// Turns a validated response body into the caller-facing response for this command.
    pub fn interpret(&self, body: String) -> Result<Response> {
        match self.grammar() {
            Some(grammar) => Ok(Response::Decoded(grammar.decode(&body)?)),
            None => Ok(Response::Raw(body)),
        }
    }
}

impl std::str::FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Command::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownCommand(s.to_string()))
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Result of one exchange.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Decoded(DecodedResponse),
    Raw(String),
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Response::Decoded(decoded) => write!(f, "{}", decoded),
            Response::Raw(text) => writeln!(f, "{}", text),
        }
    }
}

fn frame_parts(raw: &[u8]) -> Result<(&[u8], [u8; 2])> {
    if raw.first() != Some(&START) {
        return Err(Error::MalformedFrame(format!(
            "response does not start with {:?}",
            START as char
        )));
    }
    if raw.last() != Some(&END) {
        return Err(Error::MalformedFrame(
            "response does not end with carriage return".to_string(),
        ));
    }

    let len = raw.len();
    if len < MIN_RESPONSE_LEN {
        return Err(Error::MalformedFrame(format!(
            "response too short ({} bytes)",
            len
        )));
    }

    Ok((&raw[1..len - 3], [raw[len - 3], raw[len - 2]]))
}

/// Checks the marker and terminator of a response frame and returns its body as text.
///
/// The checksum bytes are dropped without being compared; see [`verify_checksum`].
pub fn validate_and_strip(raw: &[u8]) -> Result<String> {
    let (body, _) = frame_parts(raw)?;

    if !body.is_ascii() {
        return Err(Error::MalformedFrame(
            "response body is not ASCII text".to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(body).into_owned())
}

/// Compares the received checksum bytes against the checksum of the body.
///
/// The marker byte is not covered by the checksum.
pub fn verify_checksum(raw: &[u8]) -> Result<()> {
    let (body, received) = frame_parts(raw)?;
    let expected = checksum(body);

    if expected != received {
        return Err(Error::ChecksumMismatch { expected, received });
    }

    Ok(())
}
