use std::io::{BufReader, Read, Write};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::*;
use serialport::SerialPort;

use crate::command::Command;
use crate::config;

pub const IMAGE_DELAY: Duration = Duration::from_millis(100);
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Open the device port at `baud_rate`, 8N1.
pub fn open(port_name: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>> {
    info!("Opening {} at {} baud", port_name, baud_rate);

    serialport::new(port_name, baud_rate)
        .timeout(READ_TIMEOUT)
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .open()
        .map_err(|e| anyhow!("Failed to open serial port {}: {}", port_name, e))
}

/// Read handles for successive reader sessions.
///
/// The first session uses `clone`. Later sessions call `reopen` first so a
/// device that was unplugged and plugged back in is picked up again, and
/// fall back to `clone` when the port cannot be reopened.
pub fn reader_sessions<P, O, C>(
    mut reopen: O,
    mut clone: C,
) -> impl FnMut() -> Result<BufReader<P>> + Send
where
    P: Read,
    O: FnMut() -> Result<P> + Send,
    C: FnMut() -> Result<P> + Send,
{
    let mut first = true;

    move || {
        let port = if std::mem::take(&mut first) {
            clone()?
        } else {
            match reopen() {
                Ok(port) => port,
                Err(e) => {
                    warn!("{:#}, reusing the existing handle", e);
                    clone()?
                }
            }
        };
        Ok(BufReader::new(port))
    }
}

/// The sending side of the device connection.
pub struct Device<W: Write> {
    writer: W,
    image_delay: Duration,
}

impl<W: Write> Device<W> {
    pub fn new(writer: W) -> Self {
        Device {
            writer,
            image_delay: IMAGE_DELAY,
        }
    }

    /// How long to wait between the `start_image` frame and the pixel data.
    pub fn with_image_delay(mut self, image_delay: Duration) -> Self {
        self.image_delay = image_delay;
        self
    }

    pub fn send_command(&mut self, command: &Command) -> Result<()> {
        debug!("Sending {:?}", command);
        let frame = command.to_frame()?;
        self.writer
            .write_all(&frame)
            .context("Cannot write command")?;
        self.writer.flush().context("Cannot flush command")?;
        Ok(())
    }

    /// Send a raw frame. The device switches to binary mode on `start_image`
    /// and reads exactly one grid of bytes; nothing is read back.
    pub fn send_image(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != config::IMAGE_SIZE {
            bail!(
                "Image must be {} bytes, got {}",
                config::IMAGE_SIZE,
                data.len()
            );
        }

        info!("Sending image command...");
        self.send_command(&Command::StartImage)?;
        thread::sleep(self.image_delay);

        info!("Sending image bytes...");
        self.writer
            .write_all(data)
            .context("Cannot write image data")?;
        self.writer.flush().context("Cannot flush image data")?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn get_ref(&self) -> &W {
        &self.writer
    }
}
