use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::*;
use rumqttc::{LastWill, MqttOptions, QoS};

use mqtt2serial::button::{self, Backoff, ReaderStatus};
use mqtt2serial::config::{self, ImageList};
use mqtt2serial::messages::Message;
use mqtt2serial::mqtt;
use mqtt2serial::router::Router;
use mqtt2serial::serial::{self, Device};
use mqtt2serial::status::{Outbound, Publication};

/// Relay MQTT commands to the LED matrix and publish its button presses.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Serial port (e.g. /dev/ttyUSB0)
    serial_port: String,

    /// MQTT topic prefix (e.g. clock)
    mqtt_prefix: String,

    /// MQTT broker host
    #[arg(long = "mqtt_host", default_value = config::DEFAULT_MQTT_HOST)]
    mqtt_host: String,

    /// MQTT broker port
    #[arg(long = "mqtt_port", default_value_t = config::DEFAULT_MQTT_PORT)]
    mqtt_port: u16,

    /// MQTT client id [default: mqtt2serial-<pid>]
    #[arg(long = "mqtt_client_id")]
    mqtt_client_id: Option<String>,

    /// Image that may be requested on the image topic, as KEY=PATH.
    /// Repeat for more images [default: decice=images/decice.png]
    #[arg(long = "image", value_name = "KEY=PATH")]
    images: Vec<String>,
}

fn publish(mqtt: &mqtt::Mqtt, publication: &Publication) {
    info!("Send {}: {}", publication.topic, publication.payload);
    if let Err(e) = mqtt.publish(&publication.topic, publication.retain, publication.payload) {
        error!("{:#}", e);
    }
}

fn main() -> Result<()> {
    mqtt2serial::initialize();

    let args = Args::parse();
    let images = ImageList::from_entries(&args.images)?;
    for (key, path) in images.iter() {
        info!("Image '{}' is {}", key, path.display());
    }

    let port = serial::open(&args.serial_port, config::BAUD_RATE)?;
    let reader_port = port
        .try_clone()
        .with_context(|| format!("Cannot clone serial port {}", args.serial_port))?;
    let mut device = Device::new(port);

    let (tx, rx) = mpsc::channel();

    let mut outbound = Outbound::new(&args.mqtt_prefix);

    let client_id = args
        .mqtt_client_id
        .clone()
        .unwrap_or_else(|| format!("mqtt2serial-{}", std::process::id()));
    let mut options = MqttOptions::new(client_id, &args.mqtt_host, args.mqtt_port);
    options.set_keep_alive(Duration::from_secs(config::MQTT_KEEP_ALIVE_SECS));
    options.set_last_will(LastWill::new(
        outbound.reader_topic(),
        ReaderStatus::Stopped.as_str(),
        QoS::AtMostOnce,
        true,
    ));
    let mqtt = mqtt::Mqtt::connect(options, tx.clone());

    let mut router = Router::new(&args.mqtt_prefix, images);
    for s in router.get_subscriptions() {
        mqtt.subscribe(&s.topic, s.label)?;
    }

    let port_name = args.serial_port.clone();
    let sessions = serial::reader_sessions(
        move || serial::open(&port_name, config::BAUD_RATE),
        move || reader_port.try_clone().context("Cannot clone serial port"),
    );
    button::connect(sessions, tx, Backoff::default());

    for received in rx {
        match received {
            Message::MqttConnect => {
                info!("Got connected");
                if let Some(publication) = outbound.connected() {
                    publish(&mqtt, &publication);
                }
            }
            Message::MqttDisconnect => {
                info!("Got disconnected");
            }
            Message::MqttReceived(topic, data, label) => {
                debug!("Got message: {} ({} bytes)", topic, data.len());
                router.process_message(label, &data, &mut device);
            }
            Message::ButtonPress(id) => {
                publish(&mqtt, &outbound.button_press(id));
            }
            Message::Reader(status) => {
                match status {
                    ReaderStatus::Running => info!("Serial reader running"),
                    ReaderStatus::Stopped => warn!("Serial reader stopped"),
                }
                publish(&mqtt, &outbound.reader_status(status));
            }
        }
    }

    Ok(())
}
