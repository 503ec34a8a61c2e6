pub mod config;
pub mod logging;

pub mod checksum;
pub mod error;
pub mod fetch;
pub mod installer;
pub mod manifest;
pub mod notify;
pub mod owner;
pub mod storage;
pub mod target;
pub mod url_model;

pub use error::Error;
pub use installer::{BatchReport, InstallOutcome, Installer, StateReport};
pub use manifest::{Environment, Manifest, PluginSpec};
