// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::sections::{DatabaseConfigLayer, LoggingConfigLayer};

/// Partial server configuration as read from a single source.
///
/// Absent sections leave lower-precedence values untouched when merged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ServerConfigLayer {
	/// Merge `other` on top of `self`; set fields in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T>(current: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	match (current.as_mut(), other) {
		(Some(existing), Some(other)) => merge(existing, other),
		(None, Some(other)) => *current = Some(other),
		(_, None) => {}
	}
}
