// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Load a branch's messages and resolve them into a linear thread.

pub mod error;
pub mod service;

pub use error::{HistoryError, Result};
pub use service::{HistoryService, ThreadHistory};
