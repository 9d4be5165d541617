use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Error};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};

use log::*;

use crate::messages;
use crate::router::Topic;

type Result<T, E = Error> = core::result::Result<T, E>;

pub type Label = Topic;

const REQUEST_CAPACITY: usize = 10;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Labels registered for each subscribed topic.
#[derive(Default)]
struct Subscriptions {
    topics: HashMap<String, Vec<Label>>,
}

impl Subscriptions {
    /// Returns true if the topic was not subscribed before.
    fn add(&mut self, topic: &str, label: Label) -> bool {
        match self.topics.get_mut(topic) {
            Some(list) => {
                list.push(label);
                false
            }
            None => {
                self.topics.insert(topic.to_string(), vec![label]);
                true
            }
        }
    }

    fn labels(&self, topic: &str) -> &[Label] {
        self.topics.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }
}

pub struct Mqtt {
    tx: mpsc::Sender<MqttCommand>,
}

enum MqttCommand {
    MqttConnect,
    MqttDisconnect,
    MqttReceived(String, Vec<u8>),
    Subscribe(String, Label),
    Publish(String, bool, Vec<u8>),
}

/// Drives the network connection and turns its events into commands.
///
/// The client library reconnects on the next poll after an error.
fn event_loop(mut connection: Connection, tx: mpsc::Sender<MqttCommand>) {
    let mut connected = false;

    for notification in connection.iter() {
        let command = match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected = true;
                Some(MqttCommand::MqttConnect)
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => Some(MqttCommand::MqttReceived(
                publish.topic,
                publish.payload.to_vec(),
            )),
            Ok(event) => {
                trace!("MQTT event: {:?}", event);
                None
            }
            Err(e) => {
                error!("MQTT connection error: {}", e);
                thread::sleep(RETRY_DELAY);
                if connected {
                    connected = false;
                    Some(MqttCommand::MqttDisconnect)
                } else {
                    None
                }
            }
        };

        if let Some(command) = command {
            if tx.send(command).is_err() {
                break;
            }
        }
    }
}

fn command_loop(client: Client, rx: mpsc::Receiver<MqttCommand>, tx_to_client: messages::Sender) {
    let mut subscriptions = Subscriptions::default();

    for received in rx {
        match received {
            MqttCommand::MqttConnect => {
                info!("MQTT connected");
                for topic in subscriptions.topics() {
                    if let Err(e) = client.subscribe(topic, QoS::AtMostOnce) {
                        error!("Cannot subscribe to {}: {}", topic, e);
                    }
                }
                if tx_to_client.send(messages::Message::MqttConnect).is_err() {
                    break;
                }
            }

            MqttCommand::MqttDisconnect => {
                info!("MQTT disconnected");
                if tx_to_client
                    .send(messages::Message::MqttDisconnect)
                    .is_err()
                {
                    break;
                }
            }

            MqttCommand::MqttReceived(topic, data) => {
                debug!("Got message on {}", topic);
                for label in subscriptions.labels(&topic) {
                    let message =
                        messages::Message::MqttReceived(topic.clone(), data.clone(), *label);
                    if tx_to_client.send(message).is_err() {
                        return;
                    }
                }
            }

            MqttCommand::Subscribe(topic, label) => {
                info!("Subscribing to {}", topic);
                if subscriptions.add(&topic, label) {
                    if let Err(e) = client.subscribe(&topic, QoS::AtMostOnce) {
                        error!("Cannot subscribe to {}: {}", topic, e);
                    }
                }
            }

            MqttCommand::Publish(topic, retain, data) => {
                debug!("Publishing to {}", topic);
                if let Err(e) = client.publish(&topic, QoS::AtMostOnce, retain, data) {
                    error!("Cannot publish to {}: {}", topic, e);
                }
            }
        }
    }
}

impl Mqtt {
    /// Start the connection. Received messages and connection changes go to `tx_to_client`.
    pub fn connect(options: MqttOptions, tx_to_client: messages::Sender) -> Self {
        let (host, port) = options.broker_address();
        info!("Connecting to MQTT broker {}:{}", host, port);

        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        let (tx, rx) = mpsc::channel();

        let tx_events = tx.clone();
        thread::spawn(move || event_loop(connection, tx_events));
        thread::spawn(move || command_loop(client, rx, tx_to_client));

        Mqtt { tx }
    }

    pub fn subscribe(&self, topic: &str, label: Label) -> Result<()> {
        self.tx
            .send(MqttCommand::Subscribe(topic.to_string(), label))
            .map_err(|_| anyhow!("MQTT client has stopped"))
    }

    pub fn publish(&self, topic: &str, retain: bool, data: &str) -> Result<()> {
        self.tx
            .send(MqttCommand::Publish(
                topic.to_string(),
                retain,
                data.as_bytes().to_vec(),
            ))
            .map_err(|_| anyhow!("MQTT client has stopped"))
    }
}
