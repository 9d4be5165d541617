//! What the relay publishes back to MQTT.

use crate::button::{ButtonId, ReaderStatus};
use crate::config;
use crate::router::topic;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Publication {
    pub topic: String,
    pub retain: bool,
    pub payload: &'static str,
}

/// Maps device events to publications and remembers the reader status.
///
/// The last will overwrites the retained reader status whenever the
/// connection drops, so the remembered status is published again on
/// every connect.
pub struct Outbound {
    buttons_topic: String,
    reader_topic: String,
    reader_status: Option<ReaderStatus>,
}

impl Outbound {
    pub fn new(prefix: &str) -> Self {
        Outbound {
            buttons_topic: topic(&[prefix, config::BUTTONS_TOPIC]),
            reader_topic: topic(&[prefix, config::READER_TOPIC]),
            reader_status: None,
        }
    }

    pub fn reader_topic(&self) -> &str {
        &self.reader_topic
    }

    pub fn button_press(&self, id: ButtonId) -> Publication {
        Publication {
            topic: self.buttons_topic.clone(),
            retain: false,
            payload: id.as_str(),
        }
    }

    pub fn reader_status(&mut self, status: ReaderStatus) -> Publication {
        self.reader_status = Some(status);
        self.reader_publication(status)
    }

    pub fn connected(&self) -> Option<Publication> {
        self.reader_status
            .map(|status| self.reader_publication(status))
    }

    fn reader_publication(&self, status: ReaderStatus) -> Publication {
        Publication {
            topic: self.reader_topic.clone(),
            retain: true,
            payload: status.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_goes_to_buttons_topic() {
        let outbound = Outbound::new("clock");

        assert_eq!(
            outbound.button_press(ButtonId::Left),
            Publication {
                topic: "clock/buttons".to_string(),
                retain: false,
                payload: "BTN_LEFT",
            }
        );
        assert_eq!(outbound.button_press(ButtonId::Right).payload, "BTN_RIGHT");
    }

    #[test]
    fn reader_status_is_retained() {
        let mut outbound = Outbound::new("clock");

        assert_eq!(
            outbound.reader_status(ReaderStatus::Stopped),
            Publication {
                topic: "clock/reader".to_string(),
                retain: true,
                payload: "stopped",
            }
        );
        assert_eq!(outbound.reader_topic(), "clock/reader");
    }

    #[test]
    fn nothing_to_repeat_before_first_status() {
        assert_eq!(Outbound::new("clock").connected(), None);
    }

    #[test]
    fn reconnect_repeats_last_status() {
        let mut outbound = Outbound::new("clock");
        outbound.reader_status(ReaderStatus::Stopped);
        outbound.reader_status(ReaderStatus::Running);

        // The broker has replaced the retained value with the last will.
        let repeated = outbound.connected().unwrap();
        assert_eq!(repeated.topic, "clock/reader");
        assert!(repeated.retain);
        assert_eq!(repeated.payload, "running");

        // Repeats on every connect, not just the first.
        assert_eq!(outbound.connected(), Some(repeated));
    }
}
