// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use serde::Serialize;
use squash_common_thread::{
	into_thread_history, latest_leaf, thread_leaves, BranchId, MessageId, MessageProjection, UserId,
};
use squash_server_db::{BranchRepository, BranchStore, SqlitePool};

use crate::error::Result;

/// The resolved chain for one leaf of a branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadHistory {
	pub branch_id: BranchId,
	/// The leaf that was resolved, or `None` when the branch exposed nothing.
	pub leaf_id: Option<MessageId>,
	/// Root first, leaf last. Empty means no history is available.
	pub messages: Vec<MessageProjection>,
}

impl ThreadHistory {
	pub fn is_empty(&self) -> bool {
		self.messages.is_empty()
	}
}

/// Reads branch history on behalf of a user.
#[derive(Clone)]
pub struct HistoryService {
	store: Arc<dyn BranchStore>,
}

impl HistoryService {
	pub fn new(store: Arc<dyn BranchStore>) -> Self {
		Self { store }
	}

	pub fn with_pool(pool: SqlitePool) -> Self {
		Self::new(Arc::new(BranchRepository::new(pool)))
	}

	/// Resolve the history of `branch_id` ending at `leaf`.
	///
	/// Without an explicit leaf the most recently created leaf is used. A
	/// branch the user cannot read behaves like an empty one.
	#[tracing::instrument(skip(self), fields(branch_id = %branch_id, user_id = %user_id))]
	pub async fn load_history(
		&self,
		branch_id: &BranchId,
		user_id: &UserId,
		leaf: Option<&MessageId>,
	) -> Result<ThreadHistory> {
		let messages = self.store.load_branch_messages(branch_id, user_id).await?;
		let loaded = messages.len();

		let leaf_id = match leaf {
			Some(id) => Some(id.clone()),
			None => latest_leaf(&messages).cloned(),
		};
		let messages = match &leaf_id {
			Some(id) => into_thread_history(messages, id.as_str()),
			None => Vec::new(),
		};

		tracing::debug!(
			loaded,
			resolved = messages.len(),
			leaf_id = leaf_id.as_ref().map(MessageId::as_str),
			"history resolved"
		);

		Ok(ThreadHistory {
			branch_id: branch_id.clone(),
			leaf_id,
			messages,
		})
	}

	/// Messages on the branch that no other message answers, oldest first.
	#[tracing::instrument(skip(self), fields(branch_id = %branch_id, user_id = %user_id))]
	pub async fn list_leaves(
		&self,
		branch_id: &BranchId,
		user_id: &UserId,
	) -> Result<Vec<MessageProjection>> {
		let messages = self.store.load_branch_messages(branch_id, user_id).await?;
		Ok(thread_leaves(&messages).into_iter().cloned().collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::HistoryError;
	use async_trait::async_trait;
	use squash_common_thread::{Branch, MessageRole, RepoId, ThreadId};
	use squash_server_db::DbError;

	/// In-memory store that ignores authorization.
	struct StaticStore {
		messages: Vec<MessageProjection>,
		fail: bool,
	}

	impl StaticStore {
		fn with(messages: Vec<MessageProjection>) -> Self {
			Self {
				messages,
				fail: false,
			}
		}

		fn failing() -> Self {
			Self {
				messages: Vec::new(),
				fail: true,
			}
		}
	}

	#[async_trait]
	impl BranchStore for StaticStore {
		async fn create_branch(&self, _branch: &Branch) -> std::result::Result<(), DbError> {
			Ok(())
		}

		async fn get_branch(&self, _id: &BranchId) -> std::result::Result<Option<Branch>, DbError> {
			Ok(None)
		}

		async fn fork_branch(
			&self,
			source: &BranchId,
			_name: &str,
		) -> std::result::Result<Branch, DbError> {
			Err(DbError::NotFound(format!("Branch {source}")))
		}

		async fn list_branches_for_user(
			&self,
			_repo_id: &RepoId,
			_user_id: &UserId,
		) -> std::result::Result<Vec<Branch>, DbError> {
			Ok(Vec::new())
		}

		async fn append_message(
			&self,
			_message: &MessageProjection,
		) -> std::result::Result<(), DbError> {
			Ok(())
		}

		async fn load_branch_messages(
			&self,
			_branch_id: &BranchId,
			_user_id: &UserId,
		) -> std::result::Result<Vec<MessageProjection>, DbError> {
			if self.fail {
				return Err(DbError::Internal("connection reset".to_string()));
			}
			Ok(self.messages.clone())
		}
	}

	fn msg(id: &str, parent: Option<&str>, secs: i64) -> MessageProjection {
		use chrono::{Duration, TimeZone, Utc};
		MessageProjection {
			id: MessageId::from(id),
			role: MessageRole::Assistant,
			parts: serde_json::json!([]),
			created_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap() + Duration::seconds(secs),
			thread_id: ThreadId::from("T-1"),
			parent_id: parent.map(MessageId::from),
		}
	}

	fn service(store: StaticStore) -> HistoryService {
		HistoryService::new(Arc::new(store))
	}

	fn ids(history: &ThreadHistory) -> Vec<&str> {
		history.messages.iter().map(|m| m.id.as_str()).collect()
	}

	fn forked() -> Vec<MessageProjection> {
		vec![
			msg("a", None, 0),
			msg("b", Some("a"), 1),
			msg("c1", Some("b"), 2),
			msg("c2", Some("b"), 3),
		]
	}

	#[tokio::test]
	async fn test_defaults_to_latest_leaf() {
		let history = service(StaticStore::with(forked()))
			.load_history(&BranchId::from("B-1"), &UserId::from("U-1"), None)
			.await
			.unwrap();

		assert_eq!(history.leaf_id, Some(MessageId::from("c2")));
		assert_eq!(ids(&history), vec!["a", "b", "c2"]);
	}

	#[tokio::test]
	async fn test_explicit_leaf_selects_sibling() {
		let leaf = MessageId::from("c1");
		let history = service(StaticStore::with(forked()))
			.load_history(&BranchId::from("B-1"), &UserId::from("U-1"), Some(&leaf))
			.await
			.unwrap();

		assert_eq!(ids(&history), vec!["a", "b", "c1"]);
	}

	#[tokio::test]
	async fn test_unknown_leaf_is_empty() {
		let leaf = MessageId::from("zzz");
		let history = service(StaticStore::with(forked()))
			.load_history(&BranchId::from("B-1"), &UserId::from("U-1"), Some(&leaf))
			.await
			.unwrap();

		assert!(history.is_empty());
		assert_eq!(history.leaf_id, Some(leaf));
	}

	#[tokio::test]
	async fn test_empty_branch_has_no_leaf() {
		let history = service(StaticStore::with(Vec::new()))
			.load_history(&BranchId::from("B-1"), &UserId::from("U-1"), None)
			.await
			.unwrap();

		assert!(history.is_empty());
		assert_eq!(history.leaf_id, None);
	}

	#[tokio::test]
	async fn test_store_failure_is_not_empty_history() {
		let result = service(StaticStore::failing())
			.load_history(&BranchId::from("B-1"), &UserId::from("U-1"), None)
			.await;

		assert!(matches!(result, Err(HistoryError::Store(DbError::Internal(_)))));
	}

	#[tokio::test]
	async fn test_list_leaves() {
		let leaves = service(StaticStore::with(forked()))
			.list_leaves(&BranchId::from("B-1"), &UserId::from("U-1"))
			.await
			.unwrap();

		let leaf_ids: Vec<_> = leaves.iter().map(|m| m.id.as_str()).collect();
		assert_eq!(leaf_ids, vec!["c1", "c2"]);
	}

	#[test]
	fn test_history_serializes_camel_case() {
		let history = ThreadHistory {
			branch_id: BranchId::from("B-1"),
			leaf_id: Some(MessageId::from("a")),
			messages: vec![msg("a", None, 0)],
		};
		let json = serde_json::to_value(&history).unwrap();
		assert_eq!(json["branchId"], "B-1");
		assert_eq!(json["leafId"], "a");
		assert_eq!(json["messages"][0]["threadId"], "T-1");
	}
}
