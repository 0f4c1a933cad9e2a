//! Serial line handling for the D-LOGG USB adapter.
//!
//! The adapter shows up as a tty device. [`SerialHandle`] opens it, remembers
//! the line settings that were active before, switches the line to raw
//! 115200 baud 8N1 and restores the previous settings when it is released.
//!
//! Reads block until at least one byte arrives. There is deliberately no read
//! timeout: a stalled link stalls the caller. Applications that need a
//! deadline must enforce it outside of this crate.
use crate::error::ConnectionError;
use log::{debug, warn};
use nix::fcntl::OFlag;
use nix::sys::termios::{
    self, BaudRate, ControlFlags, FlushArg, InputFlags, LocalFlags, OutputFlags, SetArg,
    SpecialCharacterIndices, Termios,
};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;

/// The line speed of the D-LOGG.
pub const BAUD_RATE: &BaudRate = &BaudRate::B115200;

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
))]
fn control_flags() -> ControlFlags {
    ControlFlags::CS8 | ControlFlags::CLOCAL | ControlFlags::CREAD | ControlFlags::CRTSCTS
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
fn control_flags() -> ControlFlags {
    ControlFlags::CS8 | ControlFlags::CLOCAL | ControlFlags::CREAD
}

/// Derives the raw line settings from the settings found on the device.
///
/// No parity, no input/output/local processing, blocking reads returning
/// as soon as one byte is available.
pub fn raw_line_settings(saved: &Termios) -> nix::Result<Termios> {
    let mut settings = saved.clone();
    settings.control_flags = control_flags();
    settings.input_flags = InputFlags::IGNPAR;
    settings.output_flags = OutputFlags::empty();
    settings.local_flags = LocalFlags::empty();
    settings.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
    settings.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
    // must come after control_flags, the speed lives in there on some systems
    termios::cfsetspeed(&mut settings, *BAUD_RATE)?;
    Ok(settings)
}

/// An open, configured serial device.
///
/// Dropping the handle restores the saved line settings (best effort) and
/// closes the descriptor. Use [`SerialHandle::close`] to observe a failed
/// restore.
#[derive(Debug)]
pub struct SerialHandle {
    device: String,
    file: File,
    saved: Option<Termios>,
}

impl SerialHandle {
    /// Opens `device` and switches it to the raw D-LOGG line settings.
    ///
    /// Pending input is flushed. On any failure the descriptor is closed
    /// before the error is returned.
    pub fn open(device: &str) -> Result<Self, ConnectionError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_NOCTTY.bits())
            .open(device)
            .map_err(|source| ConnectionError::Open {
                device: device.to_owned(),
                source,
            })?;
        let configure = |step: &'static str| {
            move |source: nix::Error| ConnectionError::Configure {
                device: device.to_owned(),
                step,
                source,
            }
        };

        let mut handle = Self {
            device: device.to_owned(),
            file,
            saved: None,
        };
        let saved = termios::tcgetattr(&handle.file).map_err(configure("read settings"))?;
        let settings = raw_line_settings(&saved).map_err(configure("set speed"))?;
        termios::tcflush(&handle.file, FlushArg::TCIFLUSH).map_err(configure("flush input"))?;
        termios::tcsetattr(&handle.file, SetArg::TCSANOW, &settings)
            .map_err(configure("apply settings"))?;
        handle.saved = Some(saved);
        debug!("Opened {} at {:?}", handle.device, BAUD_RATE);
        Ok(handle)
    }

    /// The device path this handle was opened with.
    pub fn device(&self) -> &str {
        &self.device
    }

    fn restore(&mut self) -> nix::Result<()> {
        match self.saved.take() {
            Some(saved) => termios::tcsetattr(&self.file, SetArg::TCSANOW, &saved),
            None => Ok(()),
        }
    }

    /// Restores the original line settings and closes the device.
    ///
    /// The descriptor is closed even if restoring the settings fails.
    pub fn close(mut self) -> nix::Result<()> {
        self.restore()
    }
}

impl Drop for SerialHandle {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            warn!("Cannot restore line settings of {}: {err}", self.device);
        }
        debug!("Released {}", self.device);
    }
}

impl Read for SerialHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for SerialHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
