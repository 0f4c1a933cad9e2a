//! Synchronous client for the D-LOGG data logger.
//!
//! [`DLogg`] performs the mode handshake, requests data frames and decodes
//! them. It works on any blocking `Read + Write` port. On unix,
//! [`DLogg::open`] opens a serial device directly.
//!
//! # Example
//!
//! ```no_run
//! use dlogg_lib::client::DLogg;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut dlogg = DLogg::open("/dev/ttyUSB0")?;
//!     match dlogg.poll() {
//!         Ok(state) => print!("{state}"),
//!         Err(err) if err.is_no_new_data() => println!("No new data yet"),
//!         Err(err) => return Err(err.into()),
//!     }
//!     Ok(())
//! }
//! ```
use crate::error::{ConnectionError, HandshakeFailure, ReadError, Result};
use crate::protocol::{self as proto, SystemState};
use log::{debug, trace};
use std::io::{self, Read, Write};

#[cfg(unix)]
use crate::serial::SerialHandle;

/// A connection to a D-LOGG with a completed mode handshake.
///
/// The client is not meant to be shared. Every call blocks until the device
/// answers.
#[derive(Debug)]
pub struct DLogg<P> {
    port: P,
    mode: u8,
}

#[cfg(unix)]
impl DLogg<SerialHandle> {
    /// Opens the serial device at `device` and performs the mode handshake.
    ///
    /// If the handshake fails the device is restored and closed before the
    /// error is returned.
    pub fn open(device: &str) -> std::result::Result<Self, ConnectionError> {
        let port = SerialHandle::open(device)?;
        Self::handshake(port)
    }

    /// Restores the original line settings and closes the device.
    pub fn close(self) -> nix::Result<()> {
        self.port.close()
    }
}

impl<P: Read + Write> DLogg<P> {
    /// Queries the device mode over an already configured port.
    pub fn handshake(mut port: P) -> std::result::Result<Self, ConnectionError> {
        let mut mode = [0u8; 1];
        Self::query_mode(&mut port, &mut mode).map_err(ConnectionError::Handshake)?;

        debug!("Device mode 0x{:02X}", mode[0]);
        Ok(Self {
            port,
            mode: mode[0],
        })
    }

    fn query_mode(port: &mut P, mode: &mut [u8; 1]) -> std::result::Result<(), HandshakeFailure> {
        match port.write(&[proto::GET_MODE])? {
            1 => {}
            written => return Err(HandshakeFailure::ShortWrite(written)),
        }
        match port.read(mode)? {
            1 => Ok(()),
            read => Err(HandshakeFailure::ShortRead(read)),
        }
    }

    /// The device mode negotiated during the handshake.
    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Consumes the client and returns the underlying port.
    pub fn into_inner(self) -> P {
        self.port
    }

    fn send_command(&mut self, command: u8) -> io::Result<()> {
        match self.port.write(&[command])? {
            1 => Ok(()),
            _ => Err(io::Error::from(io::ErrorKind::WriteZero)),
        }
    }

    /// Determines the expected frame size from the frame identifier.
    fn frame_size(&self, identifier: u8) -> std::result::Result<usize, ReadError> {
        match identifier {
            proto::NO_NEW_DATA => Err(ReadError::NoNewData),
            proto::UVR1611 => match self.mode {
                proto::MODE_SINGLE_UVR1611 => Ok(proto::SINGLE_FRAME_SIZE),
                mode => Err(ReadError::UnsupportedMode(mode)),
            },
            other => Err(ReadError::UnsupportedDevice(other)),
        }
    }

    /// Requests the current data and reads one complete frame.
    ///
    /// Partial reads are accumulated until the frame size implied by the
    /// identifier byte and the device mode is reached.
    ///
    /// # Errors
    ///
    /// * [`ReadError::NoNewData`] if the controller has no fresh sample. This is not fatal.
    /// * [`ReadError::UnsupportedMode`] / [`ReadError::UnsupportedDevice`] on a protocol mismatch.
    /// * [`ReadError::Io`] if a write or read fails or the read returns no data.
    pub fn read_frame(&mut self) -> std::result::Result<Vec<u8>, ReadError> {
        self.send_command(proto::GET_CURRENT_DATA)?;

        let mut buffer = [0u8; proto::MAX_FRAME_SIZE];
        let mut expected = proto::MAX_FRAME_SIZE;
        let mut received = 0;
        while received < expected {
            let read = self.port.read(&mut buffer[received..expected])?;
            if read == 0 {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
            received += read;
            expected = self.frame_size(buffer[0])?;
        }

        debug!("Read frame of {expected} bytes");
        Ok(buffer[..expected].to_vec())
    }

    /// Reads and decodes one frame.
    pub fn poll(&mut self) -> Result<SystemState> {
        let frame = self.read_frame()?;
        trace!("Frame: {frame:02X?}");
        Ok(proto::parse(&frame, frame[0])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ParseError};
    use crate::protocol::tests::sample_frame;
    use assert_matches::assert_matches;
    use std::collections::VecDeque;

    /// A port that answers reads from a script of chunks and records writes.
    #[derive(Default, Debug)]
    struct MockPort {
        chunks: VecDeque<io::Result<Vec<u8>>>,
        written: Vec<u8>,
        reads: usize,
        write_limit: Option<usize>,
    }

    impl MockPort {
        fn with_chunks(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| Ok(c.to_vec())).collect(),
                ..Default::default()
            }
        }
    }

    impl Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            match self.chunks.pop_front() {
                None => Ok(0),
                Some(Err(err)) => Err(err),
                Some(Ok(mut chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.chunks.push_front(Ok(chunk.split_off(n)));
                    }
                    Ok(n)
                }
            }
        }
    }

    impl Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = self.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn connected(mode: u8, chunks: &[&[u8]]) -> DLogg<MockPort> {
        let mode = [mode];
        let mut script: Vec<&[u8]> = vec![&mode];
        script.extend_from_slice(chunks);
        DLogg::handshake(MockPort::with_chunks(&script)).unwrap()
    }

    #[test]
    fn handshake() {
        let dlogg = DLogg::handshake(MockPort::with_chunks(&[&[0xA8]])).unwrap();
        assert_eq!(dlogg.mode(), proto::MODE_SINGLE_UVR1611);
        assert_eq!(dlogg.into_inner().written, vec![proto::GET_MODE]);
    }

    #[test]
    fn handshake_failures() {
        assert_matches!(
            DLogg::handshake(MockPort::default()),
            Err(ConnectionError::Handshake(HandshakeFailure::ShortRead(0)))
        );

        let port = MockPort {
            write_limit: Some(0),
            ..MockPort::with_chunks(&[&[0xA8]])
        };
        assert_matches!(
            DLogg::handshake(port),
            Err(ConnectionError::Handshake(HandshakeFailure::ShortWrite(0)))
        );

        let mut port = MockPort::default();
        port.chunks
            .push_back(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
        assert_matches!(
            DLogg::handshake(port),
            Err(ConnectionError::Handshake(HandshakeFailure::Io(_)))
        );
    }

    #[test]
    fn frame_length_negotiation() {
        let frame = sample_frame();
        let trailing: &[u8] = &[0xEE; 8];
        let mut dlogg = connected(0xA8, &[&frame[..1], &frame[1..30], &frame[30..], trailing]);

        assert_eq!(dlogg.read_frame().unwrap(), frame);

        let port = dlogg.into_inner();
        assert_eq!(port.written, vec![proto::GET_MODE, proto::GET_CURRENT_DATA]);
        // the bytes after the 57-byte frame are left unread
        assert_eq!(port.chunks.len(), 1);
    }

    #[test]
    fn frame_in_single_read() {
        let frame = sample_frame();
        let mut dlogg = connected(0xA8, &[&frame[..]]);
        assert_eq!(dlogg.read_frame().unwrap().len(), proto::SINGLE_FRAME_SIZE);
    }

    #[test]
    fn unsupported_mode() {
        let mut dlogg = connected(0x12, &[&[proto::UVR1611, 0x00, 0x00]]);
        assert_matches!(dlogg.read_frame(), Err(ReadError::UnsupportedMode(0x12)));
    }

    #[test]
    fn unsupported_device() {
        let mut dlogg = connected(0xA8, &[&[0x90, 0x00]]);
        assert_matches!(dlogg.read_frame(), Err(ReadError::UnsupportedDevice(0x90)));
    }

    #[test]
    fn no_new_data() {
        let mut dlogg = connected(0xA8, &[&[proto::NO_NEW_DATA], &sample_frame()[..]]);
        let err = dlogg.read_frame().unwrap_err();
        assert!(err.is_no_new_data());

        let port = dlogg.into_inner();
        // one read for the handshake, one for the identifier
        assert_eq!(port.reads, 2);
        assert_eq!(port.chunks.len(), 1);
    }

    #[test]
    fn truncated_frame() {
        let frame = sample_frame();
        let mut dlogg = connected(0xA8, &[&frame[..20]]);
        assert_matches!(
            dlogg.read_frame(),
            Err(ReadError::Io(err)) if err.kind() == io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn failed_command_write() {
        let mut dlogg = connected(0xA8, &[]);
        dlogg.port.write_limit = Some(0);
        assert_matches!(
            dlogg.read_frame(),
            Err(ReadError::Io(err)) if err.kind() == io::ErrorKind::WriteZero
        );
    }

    #[test]
    fn poll() {
        let frame = sample_frame();
        let mut dlogg = connected(0xA8, &[&frame[..10], &frame[10..], &frame[..]]);

        for _ in 0..2 {
            let state = dlogg.poll().unwrap();
            assert_eq!(state.inputs().len(), proto::NUMBER_OF_INPUTS);
            assert_eq!(state.outputs().len(), proto::NUMBER_OF_OUTPUTS);
            assert_eq!(state.heat_registers().len(), 1);
        }
    }

    #[test]
    fn poll_errors() {
        let mut dlogg = connected(0xA8, &[&[proto::NO_NEW_DATA]]);
        let err = dlogg.poll().unwrap_err();
        assert!(err.is_no_new_data());

        let mut frame = sample_frame();
        frame[2] = 0x40;
        let mut dlogg = connected(0xA8, &[&frame[..]]);
        let err = dlogg.poll().unwrap_err();
        assert!(!err.is_no_new_data());
        assert_matches!(
            err,
            Error::Parse(ParseError::UnsupportedSensorType {
                channel: 1,
                kind: 4
            })
        );
    }
}
