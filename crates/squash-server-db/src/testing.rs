// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fixtures for tests in this crate and its dependents.

use chrono::{DateTime, Duration, TimeZone, Utc};
use squash_common_thread::{
	Branch, MessageId, MessageProjection, MessageRole, OrgId, ThreadId, UserId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::branch::BranchRepository;
use crate::org::OrgRepository;
use crate::pool::run_migrations;
use crate::repo::RepoRepository;
use crate::types::{OrgRole, Organization, RepoRecord};

/// A migrated in-memory database.
///
/// Held to a single connection so every query sees the same database.
pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str(":memory:")
		.unwrap()
		.foreign_keys(true);
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.unwrap();
	run_migrations(&pool).await.unwrap();
	pool
}

/// Fixed base time for fixture messages.
pub fn base_time() -> DateTime<Utc> {
	Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

/// A user message `offset_secs` after [`base_time`].
pub fn message_at(
	id: &str,
	thread_id: &ThreadId,
	parent_id: Option<&str>,
	offset_secs: i64,
) -> MessageProjection {
	MessageProjection {
		id: MessageId::from(id),
		role: MessageRole::User,
		parts: serde_json::json!([{ "type": "text", "text": id }]),
		created_at: base_time() + Duration::seconds(offset_secs),
		thread_id: thread_id.clone(),
		parent_id: parent_id.map(MessageId::from),
	}
}

/// An organization with one member, a repository and a `main` branch.
pub struct TestWorkspace {
	pub pool: SqlitePool,
	pub orgs: OrgRepository,
	pub repos: RepoRepository,
	pub branches: BranchRepository,
	pub org_id: OrgId,
	pub member: UserId,
	pub branch: Branch,
}

impl TestWorkspace {
	pub async fn new() -> Self {
		let pool = create_test_pool().await;
		let orgs = OrgRepository::new(pool.clone());
		let repos = RepoRepository::new(pool.clone());
		let branches = BranchRepository::new(pool.clone());

		let org = Organization::new("Acme", "acme");
		orgs.create_org(&org).await.unwrap();

		let member = UserId::generate();
		orgs.add_member(&org.id, &member, OrgRole::Member).await.unwrap();

		let repo = RepoRecord::new(org.id.clone(), "site");
		repos.create_repo(&repo).await.unwrap();

		let branch = Branch::new(repo.id, "main");
		branches.create_branch(&branch).await.unwrap();

		Self {
			pool,
			orgs,
			repos,
			branches,
			org_id: org.id,
			member,
			branch,
		}
	}
}
