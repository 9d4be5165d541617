use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};

use crate::command::Color;

pub const BAUD_RATE: u32 = 115_200;

pub const WIDTH: u32 = 32;
pub const HEIGHT: u32 = 8;
pub const IMAGE_SIZE: usize = (WIDTH * HEIGHT * 3) as usize;

pub const DEFAULT_COLOR: Color = Color {
    r: 0,
    g: 178,
    b: 233,
};
pub const TEXT_SPEED: u32 = 60;

pub const DEFAULT_MQTT_HOST: &str = "localhost";
pub const DEFAULT_MQTT_PORT: u16 = 1881;
pub const MQTT_KEEP_ALIVE_SECS: u64 = 60;

pub const BUTTONS_TOPIC: &str = "buttons";
pub const READER_TOPIC: &str = "reader";

const DEFAULT_IMAGES: [(&str, &str); 1] = [("decice", "images/decice.png")];

/// Image keys that may be requested over MQTT, and the files they map to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageList {
    images: HashMap<String, PathBuf>,
}

impl ImageList {
    pub fn new<K, P>(entries: impl IntoIterator<Item = (K, P)>) -> Self
    where
        K: Into<String>,
        P: Into<PathBuf>,
    {
        let images = entries
            .into_iter()
            .map(|(key, path)| (key.into(), path.into()))
            .collect();
        ImageList { images }
    }

    /// Build the list from `KEY=PATH` entries, or the built-in list if there are none.
    pub fn from_entries(entries: &[String]) -> Result<Self> {
        if entries.is_empty() {
            return Ok(Self::default());
        }

        let entries = entries
            .iter()
            .map(|s| Self::parse_entry(s))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(entries))
    }

    pub fn parse_entry(entry: &str) -> Result<(String, PathBuf)> {
        let (key, path) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("Image entry '{}' is not KEY=PATH", entry))?;

        let key = key.trim();
        let path = path.trim();
        if key.is_empty() || path.is_empty() {
            bail!("Image entry '{}' has an empty key or path", entry);
        }

        Ok((key.to_string(), PathBuf::from(path)))
    }

    pub fn get(&self, key: &str) -> Option<&Path> {
        self.images.get(key).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.images
            .iter()
            .map(|(key, path)| (key.as_str(), path.as_path()))
    }
}

impl Default for ImageList {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGES)
    }
}
