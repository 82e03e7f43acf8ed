//! Configuration management for auscult.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Configuration is stored in the user's config directory.

pub mod file;

pub use file::{AudioConfig, AuscultConfig, BleConfig, ChartConfig, SourceKind};

pub use file::get_config_path;
