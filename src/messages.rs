use crate::button::{ButtonId, ReaderStatus};
use crate::messages;
use crate::router::Topic;

pub enum Message {
    MqttConnect,
    MqttDisconnect,
    MqttReceived(String, Vec<u8>, Topic),
    ButtonPress(ButtonId),
    Reader(ReaderStatus),
}

pub type Sender = std::sync::mpsc::Sender<messages::Message>;
