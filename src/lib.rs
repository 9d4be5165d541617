pub mod button;
pub mod command;
pub mod config;
pub mod frame;
pub mod messages;
pub mod mqtt;
pub mod router;
pub mod serial;
pub mod status;

use log::LevelFilter;

/// Set up logging. `RUST_LOG` overrides the default `info` level.
pub fn initialize() {
    pretty_env_logger::formatted_timed_builder()
        .filter(None, LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();
}
