// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::history::{MessageLink, MessageLinks};
use crate::ids::{BranchId, MessageId, RepoId, ThreadId};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
	System,
	User,
	Assistant,
	Tool,
}

impl MessageRole {
	pub fn as_str(&self) -> &'static str {
		match self {
			MessageRole::System => "system",
			MessageRole::User => "user",
			MessageRole::Assistant => "assistant",
			MessageRole::Tool => "tool",
		}
	}
}

impl fmt::Display for MessageRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for MessageRole {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"system" => Ok(MessageRole::System),
			"user" => Ok(MessageRole::User),
			"assistant" => Ok(MessageRole::Assistant),
			"tool" => Ok(MessageRole::Tool),
			_ => Err(format!("invalid message role: {s}")),
		}
	}
}

/// A message as seen through a branch.
///
/// `parts` is carried through untouched; nothing in this crate inspects it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageProjection {
	pub id: MessageId,
	pub role: MessageRole,
	pub parts: serde_json::Value,
	pub created_at: DateTime<Utc>,
	pub thread_id: ThreadId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parent_id: Option<MessageId>,
}

impl MessageProjection {
	/// Returns true if this message starts a thread.
	pub fn is_root(&self) -> bool {
		self.message_link().parent_id.is_none()
	}
}

impl MessageLinks for MessageProjection {
	fn message_link(&self) -> MessageLink<'_> {
		MessageLink::new(
			self.id.as_str(),
			self.parent_id.as_ref().map(MessageId::as_str),
		)
	}
}

/// A named pointer into a thread's message graph.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
	pub id: BranchId,
	pub repo_id: RepoId,
	pub thread_id: ThreadId,
	pub name: String,
	pub created_at: DateTime<Utc>,
}

impl Branch {
	/// Create a branch on a brand new thread.
	pub fn new(repo_id: RepoId, name: impl Into<String>) -> Self {
		Self::on_thread(repo_id, ThreadId::generate(), name)
	}

	/// Create a branch that exposes an existing thread.
	pub fn on_thread(repo_id: RepoId, thread_id: ThreadId, name: impl Into<String>) -> Self {
		Self {
			id: BranchId::generate(),
			repo_id,
			thread_id,
			name: name.into(),
			created_at: Utc::now().trunc_subsecs(6),
		}
	}
}
