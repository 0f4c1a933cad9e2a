//! Error types for connection setup, frame acquisition and payload decoding.
//!
//! Each stage of a poll has its own error enum so that callers can tell a
//! transient condition ([`ReadError::NoNewData`]) apart from a hard failure.

/// Failures while opening and initialising the connection to the D-LOGG.
///
/// All of these are fatal to the connection attempt. The partially opened
/// device is always released before the error is returned.
#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    /// The device path could not be opened.
    #[error("Cannot open device {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading, flushing or applying the serial line settings failed.
    #[cfg(unix)]
    #[error("Cannot configure device {device} ({step}): {source}")]
    Configure {
        device: String,
        step: &'static str,
        #[source]
        source: nix::Error,
    },

    /// The mode query was not answered as expected.
    #[error("Mode handshake failed: {0}")]
    Handshake(HandshakeFailure),
}

/// What went wrong during the mode query.
#[derive(thiserror::Error, Debug)]
pub enum HandshakeFailure {
    #[error("command write transmitted {0} bytes instead of 1")]
    ShortWrite(usize),
    #[error("mode read returned {0} bytes instead of 1")]
    ShortRead(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures while requesting and accumulating a data frame.
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// Transport failure, including a read that returned no data.
    #[error("I/O error while reading frame: {0}")]
    Io(#[from] std::io::Error),

    /// The controller has not produced a fresh sample since the last poll.
    #[error("No new data currently available")]
    NoNewData,

    /// The controller family is supported but the negotiated mode is not.
    #[error("Unsupported device mode 0x{0:02X}")]
    UnsupportedMode(u8),

    /// The frame identifier does not belong to a supported controller.
    #[error("Unsupported device 0x{0:02X}")]
    UnsupportedDevice(u8),
}

impl ReadError {
    /// Returns `true` if the poll should simply be retried later.
    pub fn is_no_new_data(&self) -> bool {
        matches!(self, ReadError::NoNewData)
    }
}

/// Failures while decoding a complete frame.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unsupported device 0x{0:02X}")]
    UnsupportedDevice(u8),

    #[error("Unsupported sensor type {kind} on input {channel}")]
    UnsupportedSensorType { channel: u8, kind: u8 },

    #[error("Malformed frame: expected at least {expected} bytes, got {actual}")]
    Malformed { expected: usize, actual: usize },
}

/// Any failure of a single poll cycle.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl Error {
    /// Returns `true` if the poll failed only because no new sample was ready.
    pub fn is_no_new_data(&self) -> bool {
        matches!(self, Error::Read(err) if err.is_no_new_data())
    }
}

/// The result type for a poll cycle.
pub type Result<T> = std::result::Result<T, Error>;
