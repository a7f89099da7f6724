// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Squash history service.
//!
//! Layers are merged from built-in defaults, a TOML file and
//! `SQUASH_SERVER_*` environment variables, in that order.
//!
//! # Usage
//!
//! ```ignore
//! use squash_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Using database {}", config.database.url);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`SQUASH_SERVER_*`)
/// 2. Config file (`/etc/squash/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(EnvSource)];
	load_from_sources(sources)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&database, &logging)?;

	info!(
		database = %database.url,
		log_level = %logging.level,
		log_json = logging.json,
		"Server configuration loaded"
	);

	Ok(ServerConfig { database, logging })
}

fn validate_config(database: &DatabaseConfig, logging: &LoggingConfig) -> Result<(), ConfigError> {
	if !database.url.starts_with("sqlite:") {
		return Err(ConfigError::Validation(format!(
			"database url must use the sqlite: scheme, got '{}'",
			database.url
		)));
	}
	if logging.level.trim().is_empty() {
		return Err(ConfigError::Validation("log level must not be empty".to_string()));
	}
	Ok(())
}
