// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Migration error: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Map unique-constraint violations to [`DbError::Conflict`].
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> DbError {
	match e {
		sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
			DbError::Conflict(format!("{what} already exists"))
		}
		_ => DbError::Sqlx(e),
	}
}
