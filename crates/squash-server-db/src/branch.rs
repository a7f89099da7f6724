// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Branch and message repository for database operations.
//!
//! Branches are named pointers into a thread's message graph. Messages are
//! append-only and shared by every branch on the same thread.
//!
//! Reads that return history are scoped to a user: the caller must be a
//! member of the organization owning the branch's repository. A user without
//! membership sees exactly what they would see for a branch that does not
//! exist, which is nothing.

use async_trait::async_trait;
use squash_common_thread::{
	Branch, BranchId, MessageId, MessageProjection, MessageRole, RepoId, ThreadId, UserId,
};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{conflict_on_unique, DbError};
use crate::types::{format_timestamp, parse_timestamp};

/// Trait for branch and message database operations.
#[async_trait]
pub trait BranchStore: Send + Sync {
	async fn create_branch(&self, branch: &Branch) -> Result<(), DbError>;

	async fn get_branch(&self, id: &BranchId) -> Result<Option<Branch>, DbError>;

	/// Create a new branch pointing at the same thread as `source`.
	async fn fork_branch(&self, source: &BranchId, name: &str) -> Result<Branch, DbError>;

	/// Branches of a repository visible to `user_id`, oldest first.
	async fn list_branches_for_user(
		&self,
		repo_id: &RepoId,
		user_id: &UserId,
	) -> Result<Vec<Branch>, DbError>;

	async fn append_message(&self, message: &MessageProjection) -> Result<(), DbError>;

	/// Every message on the branch's thread, if `user_id` may read it.
	///
	/// Ordered by `created_at`, then `id`. The order is advisory; thread
	/// order comes from parent links.
	async fn load_branch_messages(
		&self,
		branch_id: &BranchId,
		user_id: &UserId,
	) -> Result<Vec<MessageProjection>, DbError>;
}

/// Repository for branch and message database operations.
#[derive(Clone)]
pub struct BranchRepository {
	pool: SqlitePool,
}

impl BranchRepository {
	/// Create a new repository from an existing pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Get the underlying database pool.
	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	/// Insert a branch.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if the id, or the name within the
	/// repository, is already taken.
	#[tracing::instrument(skip(self, branch), fields(branch_id = %branch.id, repo_id = %branch.repo_id, thread_id = %branch.thread_id))]
	pub async fn create_branch(&self, branch: &Branch) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO branches (id, repo_id, thread_id, name, created_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(branch.id.as_str())
		.bind(branch.repo_id.as_str())
		.bind(branch.thread_id.as_str())
		.bind(&branch.name)
		.bind(format_timestamp(&branch.created_at))
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, "Branch"))?;

		tracing::debug!(branch_id = %branch.id, name = %branch.name, "branch created");
		Ok(())
	}

	/// Get a branch by ID.
	///
	/// This lookup is not authorization-scoped; it is meant for writers.
	#[tracing::instrument(skip(self), fields(branch_id = %id))]
	pub async fn get_branch(&self, id: &BranchId) -> Result<Option<Branch>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, repo_id, thread_id, name, created_at
			FROM branches
			WHERE id = ?
			"#,
		)
		.bind(id.as_str())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_branch(&r)).transpose()
	}

	/// Create a branch named `name` on the same thread as `source`.
	///
	/// # Errors
	/// Returns `DbError::NotFound` if `source` does not exist.
	#[tracing::instrument(skip(self), fields(source_branch_id = %source))]
	pub async fn fork_branch(&self, source: &BranchId, name: &str) -> Result<Branch, DbError> {
		let source_branch = self
			.get_branch(source)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("Branch {source}")))?;

		let branch = Branch::on_thread(source_branch.repo_id, source_branch.thread_id, name);
		self.create_branch(&branch).await?;

		tracing::debug!(source_branch_id = %source, branch_id = %branch.id, "branch forked");
		Ok(branch)
	}

	#[tracing::instrument(skip(self), fields(repo_id = %repo_id, user_id = %user_id))]
	pub async fn list_branches_for_user(
		&self,
		repo_id: &RepoId,
		user_id: &UserId,
	) -> Result<Vec<Branch>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT b.id, b.repo_id, b.thread_id, b.name, b.created_at
			FROM branches b
			INNER JOIN repos r ON r.id = b.repo_id AND r.deleted_at IS NULL
			INNER JOIN org_memberships om ON om.org_id = r.org_id AND om.user_id = ?
			WHERE b.repo_id = ?
			ORDER BY b.created_at ASC, b.id ASC
			"#,
		)
		.bind(user_id.as_str())
		.bind(repo_id.as_str())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_branch).collect()
	}

	/// Append a message to its thread.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if a message with the same id exists.
	#[tracing::instrument(skip(self, message), fields(message_id = %message.id, thread_id = %message.thread_id))]
	pub async fn append_message(&self, message: &MessageProjection) -> Result<(), DbError> {
		let parts_json = serde_json::to_string(&message.parts)?;

		sqlx::query(
			r#"
			INSERT INTO messages (id, thread_id, parent_id, role, parts, created_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(message.id.as_str())
		.bind(message.thread_id.as_str())
		.bind(message.parent_id.as_ref().map(MessageId::as_str))
		.bind(message.role.as_str())
		.bind(&parts_json)
		.bind(format_timestamp(&message.created_at))
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, "Message"))?;

		tracing::debug!(message_id = %message.id, "message appended");
		Ok(())
	}

	/// Load every message visible through a branch.
	///
	/// Existence and authorization are checked by the same join, so a missing
	/// branch, an empty thread, a soft-deleted repository and a non-member
	/// caller all yield an empty vector.
	#[tracing::instrument(skip(self), fields(branch_id = %branch_id, user_id = %user_id))]
	pub async fn load_branch_messages(
		&self,
		branch_id: &BranchId,
		user_id: &UserId,
	) -> Result<Vec<MessageProjection>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT m.id, m.role, m.parts, m.created_at, m.thread_id, m.parent_id
			FROM branches b
			INNER JOIN messages m ON m.thread_id = b.thread_id
			INNER JOIN repos r ON r.id = b.repo_id AND r.deleted_at IS NULL
			INNER JOIN org_memberships om ON om.org_id = r.org_id AND om.user_id = ?
			WHERE b.id = ?
			ORDER BY m.created_at ASC, m.id ASC
			"#,
		)
		.bind(user_id.as_str())
		.bind(branch_id.as_str())
		.fetch_all(&self.pool)
		.await?;

		let messages = rows
			.iter()
			.map(row_to_message)
			.collect::<Result<Vec<_>, _>>()?;

		tracing::debug!(count = messages.len(), "branch messages loaded");
		Ok(messages)
	}
}

fn row_to_branch(row: &sqlx::sqlite::SqliteRow) -> Result<Branch, DbError> {
	let id: String = row.get("id");
	let repo_id: String = row.get("repo_id");
	let thread_id: String = row.get("thread_id");
	let created_at: String = row.get("created_at");

	Ok(Branch {
		id: BranchId::from_string(id),
		repo_id: RepoId::from_string(repo_id),
		thread_id: ThreadId::from_string(thread_id),
		name: row.get("name"),
		created_at: parse_timestamp("created_at", &created_at)?,
	})
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<MessageProjection, DbError> {
	let id: String = row.get("id");
	let role: String = row.get("role");
	let parts: String = row.get("parts");
	let created_at: String = row.get("created_at");
	let thread_id: String = row.get("thread_id");
	let parent_id: Option<String> = row.get("parent_id");

	Ok(MessageProjection {
		id: MessageId::from_string(id),
		role: role.parse::<MessageRole>().map_err(DbError::Internal)?,
		parts: serde_json::from_str(&parts)?,
		created_at: parse_timestamp("created_at", &created_at)?,
		thread_id: ThreadId::from_string(thread_id),
		parent_id: parent_id.filter(|p| !p.is_empty()).map(MessageId::from_string),
	})
}

#[async_trait]
impl BranchStore for BranchRepository {
	async fn create_branch(&self, branch: &Branch) -> Result<(), DbError> {
		self.create_branch(branch).await
	}

	async fn get_branch(&self, id: &BranchId) -> Result<Option<Branch>, DbError> {
		self.get_branch(id).await
	}

	async fn fork_branch(&self, source: &BranchId, name: &str) -> Result<Branch, DbError> {
		self.fork_branch(source, name).await
	}

	async fn list_branches_for_user(
		&self,
		repo_id: &RepoId,
		user_id: &UserId,
	) -> Result<Vec<Branch>, DbError> {
		self.list_branches_for_user(repo_id, user_id).await
	}

	async fn append_message(&self, message: &MessageProjection) -> Result<(), DbError> {
		self.append_message(message).await
	}

	async fn load_branch_messages(
		&self,
		branch_id: &BranchId,
		user_id: &UserId,
	) -> Result<Vec<MessageProjection>, DbError> {
		self.load_branch_messages(branch_id, user_id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{message_at, TestWorkspace};

	#[tokio::test]
	async fn test_member_loads_thread_in_created_order() {
		let ws = TestWorkspace::new().await;
		let thread = &ws.branch.thread_id;

		ws.branches
			.append_message(&message_at("c", thread, Some("b"), 30))
			.await
			.unwrap();
		ws.branches
			.append_message(&message_at("a", thread, None, 10))
			.await
			.unwrap();
		ws.branches
			.append_message(&message_at("b", thread, Some("a"), 20))
			.await
			.unwrap();

		let messages = ws
			.branches
			.load_branch_messages(&ws.branch.id, &ws.member)
			.await
			.unwrap();

		let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
		assert_eq!(ids, vec!["a", "b", "c"]);
		assert_eq!(messages[0], message_at("a", thread, None, 10));
		assert_eq!(messages[2].parent_id, Some(MessageId::from("b")));
	}

	/// **Property: non-member and missing branch are indistinguishable**
	///
	/// Why this is important: an error for one and an empty list for the
	/// other would reveal which branch ids exist to users outside the org.
	#[tokio::test]
	async fn test_non_member_sees_same_as_missing_branch() {
		let ws = TestWorkspace::new().await;
		ws.branches
			.append_message(&message_at("a", &ws.branch.thread_id, None, 0))
			.await
			.unwrap();

		let outsider = UserId::generate();
		let as_outsider = ws
			.branches
			.load_branch_messages(&ws.branch.id, &outsider)
			.await
			.unwrap();
		let missing = ws
			.branches
			.load_branch_messages(&BranchId::generate(), &ws.member)
			.await
			.unwrap();

		assert!(as_outsider.is_empty());
		assert_eq!(as_outsider, missing);
	}

	#[tokio::test]
	async fn test_empty_thread_loads_nothing() {
		let ws = TestWorkspace::new().await;
		let messages = ws
			.branches
			.load_branch_messages(&ws.branch.id, &ws.member)
			.await
			.unwrap();
		assert!(messages.is_empty());
	}

	#[tokio::test]
	async fn test_other_threads_are_excluded() {
		let ws = TestWorkspace::new().await;
		ws.branches
			.append_message(&message_at("mine", &ws.branch.thread_id, None, 0))
			.await
			.unwrap();
		ws.branches
			.append_message(&message_at("theirs", &ThreadId::generate(), None, 0))
			.await
			.unwrap();

		let messages = ws
			.branches
			.load_branch_messages(&ws.branch.id, &ws.member)
			.await
			.unwrap();
		let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
		assert_eq!(ids, vec!["mine"]);
	}

	#[tokio::test]
	async fn test_removed_member_loses_access() {
		let ws = TestWorkspace::new().await;
		ws.branches
			.append_message(&message_at("a", &ws.branch.thread_id, None, 0))
			.await
			.unwrap();

		ws.orgs.remove_member(&ws.org_id, &ws.member).await.unwrap();

		let messages = ws
			.branches
			.load_branch_messages(&ws.branch.id, &ws.member)
			.await
			.unwrap();
		assert!(messages.is_empty());
	}

	#[tokio::test]
	async fn test_soft_deleted_repo_hides_history() {
		let ws = TestWorkspace::new().await;
		ws.branches
			.append_message(&message_at("a", &ws.branch.thread_id, None, 0))
			.await
			.unwrap();

		ws.repos.soft_delete_repo(&ws.branch.repo_id).await.unwrap();

		let messages = ws
			.branches
			.load_branch_messages(&ws.branch.id, &ws.member)
			.await
			.unwrap();
		assert!(messages.is_empty());
	}

	#[tokio::test]
	async fn test_forked_branch_shares_messages() {
		let ws = TestWorkspace::new().await;
		ws.branches
			.append_message(&message_at("a", &ws.branch.thread_id, None, 0))
			.await
			.unwrap();

		let fork = ws.branches.fork_branch(&ws.branch.id, "experiment").await.unwrap();
		assert_eq!(fork.thread_id, ws.branch.thread_id);
		assert_eq!(ws.branches.get_branch(&fork.id).await.unwrap(), Some(fork.clone()));

		ws.branches
			.append_message(&message_at("b", &fork.thread_id, Some("a"), 1))
			.await
			.unwrap();

		let on_main = ws
			.branches
			.load_branch_messages(&ws.branch.id, &ws.member)
			.await
			.unwrap();
		let on_fork = ws
			.branches
			.load_branch_messages(&fork.id, &ws.member)
			.await
			.unwrap();
		assert_eq!(on_main, on_fork);
		assert_eq!(on_fork.len(), 2);
	}

	#[tokio::test]
	async fn test_fork_missing_branch_is_not_found() {
		let ws = TestWorkspace::new().await;
		let result = ws.branches.fork_branch(&BranchId::generate(), "x").await;
		assert!(matches!(result, Err(DbError::NotFound(_))));
	}

	#[tokio::test]
	async fn test_duplicate_message_id_conflicts() {
		let ws = TestWorkspace::new().await;
		let message = message_at("a", &ws.branch.thread_id, None, 0);
		ws.branches.append_message(&message).await.unwrap();

		let result = ws.branches.append_message(&message).await;
		assert!(matches!(result, Err(DbError::Conflict(_))));
	}

	#[tokio::test]
	async fn test_duplicate_branch_name_conflicts() {
		let ws = TestWorkspace::new().await;
		let result = ws.branches.fork_branch(&ws.branch.id, &ws.branch.name).await;
		assert!(matches!(result, Err(DbError::Conflict(_))));
	}

	#[tokio::test]
	async fn test_list_branches_is_membership_scoped() {
		let ws = TestWorkspace::new().await;
		let fork = ws.branches.fork_branch(&ws.branch.id, "experiment").await.unwrap();

		let visible = ws
			.branches
			.list_branches_for_user(&ws.branch.repo_id, &ws.member)
			.await
			.unwrap();
		let ids: Vec<_> = visible.iter().map(|b| b.id.clone()).collect();
		assert_eq!(ids, vec![ws.branch.id.clone(), fork.id]);

		let hidden = ws
			.branches
			.list_branches_for_user(&ws.branch.repo_id, &UserId::generate())
			.await
			.unwrap();
		assert!(hidden.is_empty());
	}

	#[tokio::test]
	async fn test_closed_pool_propagates_error() {
		let ws = TestWorkspace::new().await;
		ws.branches.pool().close().await;

		let result = ws
			.branches
			.load_branch_messages(&ws.branch.id, &ws.member)
			.await;
		assert!(matches!(result, Err(DbError::Sqlx(_))));
	}
}
