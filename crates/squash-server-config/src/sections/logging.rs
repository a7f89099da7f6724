// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
	/// Default `EnvFilter` directive when `RUST_LOG` is unset.
	pub level: String,
	/// Emit JSON log lines instead of human-readable text.
	pub json: bool,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			json: false,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfigLayer {
	#[serde(default)]
	pub level: Option<String>,
	#[serde(default)]
	pub json: Option<bool>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: LoggingConfigLayer) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.json.is_some() {
			self.json = other.json;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		let defaults = LoggingConfig::default();
		LoggingConfig {
			level: self.level.unwrap_or(defaults.level),
			json: self.json.unwrap_or(defaults.json),
		}
	}
}
