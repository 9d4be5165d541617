use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::*;

use mqtt2serial::config;
use mqtt2serial::frame;
use mqtt2serial::serial::{self, Device};

/// Opening the port resets the board; give it time to boot.
const RESET_DELAY: Duration = Duration::from_secs(2);

/// Send image to LED matrix via serial.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Serial port to use (e.g. /dev/ttyUSB1)
    serial_port: String,

    /// Path to the image file (e.g. image.png)
    image_path: PathBuf,
}

fn main() -> Result<()> {
    mqtt2serial::initialize();

    let args = Args::parse();

    let data = frame::encode_file(&args.image_path)?;

    let port = serial::open(&args.serial_port, config::BAUD_RATE)?;
    thread::sleep(RESET_DELAY);

    let mut device = Device::new(port);
    device.send_image(&data)?;
    info!("Done.");

    Ok(())
}
