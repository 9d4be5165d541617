use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Error, Result};
use serde::Serialize;

use crate::config;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for Color {
    fn default() -> Self {
        config::DEFAULT_COLOR
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}

/// Parses `"r,g,b"`. Whitespace around each channel is ignored.
impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let channels = s
            .split(',')
            .map(|c| {
                c.trim()
                    .parse::<u8>()
                    .with_context(|| format!("invalid channel '{}'", c.trim()))
            })
            .collect::<Result<Vec<u8>>>()?;

        match channels[..] {
            [r, g, b] => Ok(Color { r, g, b }),
            _ => bail!("expected 3 channels, got {}", channels.len()),
        }
    }
}

/// A single frame of the serial protocol. Serializes to one JSON object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    StartImage,
    ScrollText {
        text: String,
        speed: u32,
        #[serde(flatten)]
        color: Color,
    },
    DisplayText {
        text: String,
        speed: u32,
        #[serde(flatten)]
        color: Color,
    },
}

impl Command {
    pub fn scroll_text(text: &str, color: Color) -> Self {
        Command::ScrollText {
            text: text.to_string(),
            speed: config::TEXT_SPEED,
            color,
        }
    }

    pub fn display_text(text: &str, color: Color) -> Self {
        Command::DisplayText {
            text: text.to_string(),
            speed: config::TEXT_SPEED,
            color,
        }
    }

    /// The newline terminated frame written to the device.
    pub fn to_frame(&self) -> Result<Vec<u8>> {
        let mut frame =
            serde_json::to_vec(self).map_err(|e| anyhow!("Cannot encode {:?}: {}", self, e))?;
        frame.push(b'\n');
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_color() {
        let color: Color = "10,20,30".parse().unwrap();
        assert_eq!(color, Color { r: 10, g: 20, b: 30 });

        let color: Color = " 255 , 0,1 ".parse().unwrap();
        assert_eq!(color, Color { r: 255, g: 0, b: 1 });
    }

    #[test]
    fn parse_bad_color() {
        assert!("abc".parse::<Color>().is_err());
        assert!("1,2".parse::<Color>().is_err());
        assert!("1,2,3,4".parse::<Color>().is_err());
        assert!("256,0,0".parse::<Color>().is_err());
        assert!("-1,0,0".parse::<Color>().is_err());
        assert!("".parse::<Color>().is_err());
    }

    #[test]
    fn default_color() {
        assert_eq!(Color::default(), Color { r: 0, g: 178, b: 233 });
        assert_eq!(Color::default().to_string(), "0,178,233");
    }

    #[test]
    fn start_image_frame() {
        let frame = Command::StartImage.to_frame().unwrap();
        assert_eq!(frame, b"{\"command\":\"start_image\"}\n");
    }

    #[test]
    fn scroll_text_frame() {
        let frame = Command::scroll_text("hello", Color::default())
            .to_frame()
            .unwrap();
        assert_eq!(
            String::from_utf8(frame).unwrap(),
            "{\"command\":\"scroll_text\",\"text\":\"hello\",\"speed\":60,\"r\":0,\"g\":178,\"b\":233}\n"
        );
    }

    #[test]
    fn display_text_frame_escapes_text() {
        let color = Color { r: 1, g: 2, b: 3 };
        let frame = Command::display_text("say \"hi\"\n", color)
            .to_frame()
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "command": "display_text",
                "text": "say \"hi\"\n",
                "speed": 60,
                "r": 1,
                "g": 2,
                "b": 3,
            })
        );
        // The embedded newline is escaped, so the frame is a single line.
        assert_eq!(frame.iter().filter(|&&b| b == b'\n').count(), 1);
    }
}
