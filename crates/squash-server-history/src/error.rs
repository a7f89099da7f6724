// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use squash_server_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
	#[error("history store error: {0}")]
	Store(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, HistoryError>;
