//! Button events reported by the device over serial.
//!
//! The device prints one token per line when a button is pressed. A
//! supervised thread reads those lines and forwards recognised tokens to
//! the main loop. If reading fails the thread reports the reader as
//! stopped, backs off, reopens the port and carries on.

use std::fmt::Display;
use std::io::{BufRead, ErrorKind};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::*;

use crate::messages;
use crate::messages::Message;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ButtonId {
    Left,
    Middle,
    Right,
}

impl ButtonId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ButtonId::Left => "BTN_LEFT",
            ButtonId::Middle => "BTN_MIDDLE",
            ButtonId::Right => "BTN_RIGHT",
        }
    }

    /// Match a line from the device, ignoring surrounding whitespace.
    pub fn from_line(line: &str) -> Option<Self> {
        match line.trim() {
            "BTN_LEFT" => Some(ButtonId::Left),
            "BTN_MIDDLE" => Some(ButtonId::Middle),
            "BTN_RIGHT" => Some(ButtonId::Right),
            _ => None,
        }
    }
}

impl Display for ButtonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReaderStatus {
    Running,
    Stopped,
}

impl ReaderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderStatus::Running => "running",
            ReaderStatus::Stopped => "stopped",
        }
    }
}

/// Exponential restart delay: `initial`, doubling per failure, capped at `max`.
#[derive(Copy, Clone, Debug)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 1u32 << failures.min(16);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

/// One read session over an open port.
pub struct ButtonReader<R: BufRead> {
    reader: R,
    lines_read: u64,
}

impl<R: BufRead> ButtonReader<R> {
    pub fn new(reader: R) -> Self {
        ButtonReader {
            reader,
            lines_read: 0,
        }
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Read until something goes wrong.
    ///
    /// Returns `Ok` only once the main loop has gone away. Read timeouts
    /// just mean the device is quiet; EOF, I/O errors and lines that are
    /// not UTF-8 end the session with an error.
    pub fn run(&mut self, tx: &messages::Sender) -> Result<()> {
        let mut buf = Vec::new();

        loop {
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => bail!("Serial port closed"),
                Ok(_) if buf.ends_with(b"\n") => {}
                Ok(_) => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    continue
                }
                Err(e) => return Err(e).context("Serial read error"),
            }

            self.lines_read += 1;
            let line = std::str::from_utf8(&buf).context("Serial line is not UTF-8")?;

            match ButtonId::from_line(line) {
                Some(id) => {
                    info!("Got button {}", id);
                    if tx.send(Message::ButtonPress(id)).is_err() {
                        return Ok(());
                    }
                }
                None => debug!("Ignoring serial line {:?}", line.trim()),
            }

            buf.clear();
        }
    }
}

/// Spawn the supervised reader thread.
///
/// `open` is called for every session. Status changes are sent as
/// [`Message::Reader`]. The thread exits when `tx` is disconnected.
pub fn connect<R, F>(mut open: F, tx: messages::Sender, backoff: Backoff) -> thread::JoinHandle<()>
where
    R: BufRead + 'static,
    F: FnMut() -> Result<R> + Send + 'static,
{
    thread::spawn(move || {
        let mut running = false;
        let mut failures: u32 = 0;

        loop {
            let result = match open() {
                Ok(reader) => {
                    if !running {
                        running = true;
                        if tx.send(Message::Reader(ReaderStatus::Running)).is_err() {
                            return;
                        }
                    }

                    let mut session = ButtonReader::new(reader);
                    let result = session.run(&tx);
                    if session.lines_read() > 0 {
                        failures = 0;
                    }
                    result
                }
                Err(e) => Err(e.context("Cannot open serial reader")),
            };

            match result {
                Ok(()) => return,
                Err(e) => error!("{:#}", e),
            }

            if running {
                running = false;
                if tx.send(Message::Reader(ReaderStatus::Stopped)).is_err() {
                    return;
                }
            }

            let delay = backoff.delay(failures);
            failures = failures.saturating_add(1);
            warn!("Restarting serial reader in {:?}", delay);
            thread::sleep(delay);
        }
    })
}
