use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::*;

use crate::command::{Color, Command};
use crate::config::ImageList;
use crate::frame;
use crate::serial::Device;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Topic {
    Color,
    Message,
    Static,
    Image,
}

impl Topic {
    pub const ALL: [Topic; 4] = [Topic::Color, Topic::Message, Topic::Static, Topic::Image];

    pub fn suffix(&self) -> &'static str {
        match self {
            Topic::Color => "color",
            Topic::Message => "message",
            Topic::Static => "static",
            Topic::Image => "image",
        }
    }
}

pub struct Subscription {
    pub topic: String,
    pub label: Topic,
}

pub fn topic(parts: &[&str]) -> String {
    parts.join("/")
}

/// Turns MQTT messages into device commands.
///
/// Owns the current text color, which only the `color` topic changes.
pub struct Router {
    prefix: String,
    color: Color,
    images: ImageList,
}

impl Router {
    pub fn new(prefix: &str, images: ImageList) -> Self {
        Router {
            prefix: prefix.to_string(),
            color: Color::default(),
            images,
        }
    }

    #[cfg(test)]
    pub(crate) fn color(&self) -> Color {
        self.color
    }

    pub fn get_subscriptions(&self) -> Vec<Subscription> {
        Topic::ALL
            .iter()
            .map(|label| Subscription {
                topic: topic(&[self.prefix.as_str(), label.suffix()]),
                label: *label,
            })
            .collect()
    }

    /// Handle one message. Failures are logged, never returned.
    pub fn process_message<W: Write>(
        &mut self,
        label: Topic,
        data: &[u8],
        device: &mut Device<W>,
    ) {
        let data = match std::str::from_utf8(data) {
            Ok(data) => data,
            Err(e) => {
                error!("Ignoring non UTF-8 {} payload: {}", label.suffix(), e);
                return;
            }
        };

        let result = match label {
            Topic::Color => {
                self.process_color(data);
                Ok(())
            }
            Topic::Message => device.send_command(&Command::scroll_text(data, self.color)),
            Topic::Static => device.send_command(&Command::display_text(data, self.color)),
            Topic::Image => self.process_image(data, device),
        };

        if let Err(e) = result {
            error!("Failed to process {} message: {:#}", label.suffix(), e);
        }
    }

    fn process_color(&mut self, data: &str) {
        match data.parse::<Color>() {
            Ok(color) => {
                info!("Color is now {}", color);
                self.color = color;
            }
            Err(e) => error!("Invalid color format {:?}: {:#}", data, e),
        }
    }

    fn process_image<W: Write>(&self, data: &str, device: &mut Device<W>) -> Result<()> {
        let key = data.trim();
        match self.images.get(key) {
            Some(path) => send_image(path, device),
            None => {
                warn!("Image key '{}' not whitelisted", key);
                Ok(())
            }
        }
    }
}

fn send_image<W: Write>(path: &Path, device: &mut Device<W>) -> Result<()> {
    if !path.is_file() {
        error!("Image file not found: {}", path.display());
        return Ok(());
    }

    let data = frame::encode_file(path)?;
    device
        .send_image(&data)
        .with_context(|| format!("Cannot send image {}", path.display()))?;
    info!("Sent image {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use image::{Rgb, RgbImage};

    use super::*;
    use crate::config::IMAGE_SIZE;

    const START_IMAGE: &[u8] = b"{\"command\":\"start_image\"}\n";

    fn device() -> Device<Vec<u8>> {
        Device::new(Vec::new()).with_image_delay(Duration::ZERO)
    }

    fn router() -> Router {
        Router::new("clock", ImageList::default())
    }

    fn frames(device: &Device<Vec<u8>>) -> Vec<serde_json::Value> {
        device
            .get_ref()
            .split(|&b| b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).unwrap())
            .collect()
    }

    #[test]
    fn subscribes_to_four_topics() {
        let topics: Vec<(String, Topic)> = router()
            .get_subscriptions()
            .into_iter()
            .map(|s| (s.topic, s.label))
            .collect();

        assert_eq!(
            topics,
            vec![
                ("clock/color".to_string(), Topic::Color),
                ("clock/message".to_string(), Topic::Message),
                ("clock/static".to_string(), Topic::Static),
                ("clock/image".to_string(), Topic::Image),
            ]
        );
    }

    #[test]
    fn color_updates_state() {
        let mut router = router();
        let mut device = device();

        router.process_message(Topic::Color, b"10,20,30", &mut device);

        assert_eq!(router.color(), Color { r: 10, g: 20, b: 30 });
        assert!(device.get_ref().is_empty());
    }

    #[test]
    fn bad_color_keeps_state() {
        let mut router = router();
        let mut device = device();

        router.process_message(Topic::Color, b"1,2,3", &mut device);
        router.process_message(Topic::Color, b"abc", &mut device);
        router.process_message(Topic::Color, b"1,2", &mut device);
        router.process_message(Topic::Color, b"\xff,0,0", &mut device);

        assert_eq!(router.color(), Color { r: 1, g: 2, b: 3 });
    }

    #[test]
    fn color_is_idempotent() {
        let mut once = router();
        let mut twice = router();
        let mut device = device();

        once.process_message(Topic::Color, b"5,6,7", &mut device);
        twice.process_message(Topic::Color, b"5,6,7", &mut device);
        twice.process_message(Topic::Color, b"5,6,7", &mut device);

        assert_eq!(once.color(), twice.color());
    }

    #[test]
    fn message_scrolls_text() {
        let mut router = router();
        let mut device = device();

        router.process_message(Topic::Message, b"hello", &mut device);

        assert_eq!(
            device.get_ref().as_slice(),
            b"{\"command\":\"scroll_text\",\"text\":\"hello\",\"speed\":60,\"r\":0,\"g\":178,\"b\":233}\n"
        );
    }

    #[test]
    fn static_uses_current_color() {
        let mut router = router();
        let mut device = device();

        router.process_message(Topic::Color, b"255,0,0", &mut device);
        router.process_message(Topic::Static, b" 12:00 ", &mut device);

        assert_eq!(
            frames(&device),
            vec![serde_json::json!({
                "command": "display_text",
                "text": " 12:00 ",
                "speed": 60,
                "r": 255,
                "g": 0,
                "b": 0,
            })]
        );
    }

    #[test]
    fn unknown_image_sends_nothing() {
        let mut router = router();
        let mut device = device();

        router.process_message(Topic::Image, b"unknown", &mut device);

        assert!(device.get_ref().is_empty());
    }

    #[test]
    fn missing_image_file_sends_nothing() {
        let images = ImageList::new([("gone", "/nonexistent/mqtt2serial/gone.png")]);
        let mut router = Router::new("clock", images);
        let mut device = device();

        router.process_message(Topic::Image, b"gone", &mut device);

        assert!(device.get_ref().is_empty());
    }

    #[test]
    fn known_image_sends_header_and_payload() {
        let path: PathBuf = std::env::temp_dir().join(format!(
            "mqtt2serial-router-{}-decice.png",
            std::process::id()
        ));
        RgbImage::from_pixel(64, 16, Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        let images = ImageList::new([("decice", path.clone())]);
        let mut router = Router::new("clock", images);
        let mut device = device();

        router.process_message(Topic::Image, b" decice\n", &mut device);
        std::fs::remove_file(&path).unwrap();

        let written = device.get_ref();
        assert_eq!(written.len(), START_IMAGE.len() + IMAGE_SIZE);
        assert_eq!(&written[..START_IMAGE.len()], START_IMAGE);
        assert!(written[START_IMAGE.len()..]
            .chunks(3)
            .all(|pixel| pixel == [1, 2, 3]));
    }
}
