//! Serial infrastructure: the RTS line that keys the transmitter.
//!
//! Typical hardware is a USB-serial adapter whose RTS pin drives a transistor
//! on the radio's PTT input.  No data is ever sent over the port; only the
//! modem-control line is used, so flow control is disabled and RTS is
//! explicitly deasserted right after opening (many drivers raise it on open,
//! which would key the radio).

use std::time::Duration;

use radiogw_core::{ControlLine, ControlLineError};
use serialport::{FlowControl, SerialPort};
use tracing::{debug, info};

pub mod mock;

/// PTT line driven through a serial port's RTS signal.
pub struct SerialControlLine {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialControlLine {
    /// Opens `path` at `baud_rate` and leaves RTS deasserted.
    ///
    /// # Errors
    ///
    /// Returns [`ControlLineError::Device`] if the port cannot be opened or
    /// RTS cannot be cleared.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, ControlLineError> {
        let mut port = serialport::new(path, baud_rate)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| ControlLineError::Device(format!("{path}: {e}")))?;

        port.write_request_to_send(false)
            .map_err(|e| ControlLineError::Device(format!("{path}: failed to clear RTS: {e}")))?;

        info!(port = %path, baud_rate, "serial PTT line opened, RTS deasserted");
        Ok(Self {
            port,
            path: path.to_string(),
        })
    }

    /// Device path this line was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ControlLine for SerialControlLine {
    fn set_asserted(&mut self, asserted: bool) -> Result<(), ControlLineError> {
        debug!(port = %self.path, rts = asserted, "driving RTS");
        self.port
            .write_request_to_send(asserted)
            .map_err(|e| ControlLineError::Device(format!("{}: {e}", self.path)))
    }
}

impl std::fmt::Debug for SerialControlLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialControlLine")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_nonexistent_port_returns_device_error() {
        let result = SerialControlLine::open("/dev/radiogw-no-such-port", 9600);

        match result {
            Err(ControlLineError::Device(msg)) => {
                assert!(msg.contains("/dev/radiogw-no-such-port"));
            }
            other => panic!("expected device error, got {other:?}"),
        }
    }
}
