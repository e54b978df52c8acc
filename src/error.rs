use thiserror::Error;

/// Failures of a single command/response exchange with the inverter.
///
/// All of these are terminal for the exchange; nothing in the protocol layer retries.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("response does not match grammar at field {field} (offset {offset})")]
    GrammarMismatch { field: &'static str, offset: usize },

    #[error("field {field}: cannot convert {value:?} to {kind}")]
    FieldTypeError {
        field: &'static str,
        value: String,
        kind: &'static str,
    },

    #[error("checksum mismatch - got {received:02x?}, expected {expected:02x?}")]
    ChecksumMismatch { expected: [u8; 2], received: [u8; 2] },

    #[error("unknown command {0}")]
    UnknownCommand(String),

    #[error("expected {expected} response to {command}")]
    UnexpectedResponse {
        command: &'static str,
        expected: &'static str,
    },

    #[error("timed out waiting for response")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
