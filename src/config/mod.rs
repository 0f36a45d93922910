//! Configuration: config directory resolution and `config.toml` settings.

pub mod settings;

pub use settings::{resolve_config_dir, AppSettings};
