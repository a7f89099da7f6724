// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

pub mod history;
pub mod ids;
pub mod model;

pub use history::{
	into_thread_history, into_thread_history_by, latest_leaf, resolve_thread_history,
	resolve_thread_history_by, thread_leaves, MessageLink, MessageLinks,
};
pub use ids::*;
pub use model::*;
