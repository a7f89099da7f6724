// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::Utc;
use squash_common_thread::{OrgId, RepoId};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{conflict_on_unique, DbError};
use crate::types::{format_timestamp, parse_timestamp, RepoRecord};

#[async_trait]
pub trait RepoStore: Send + Sync {
	async fn create_repo(&self, repo: &RepoRecord) -> Result<(), DbError>;
	async fn get_repo_by_id(&self, id: &RepoId) -> Result<Option<RepoRecord>, DbError>;
	async fn soft_delete_repo(&self, id: &RepoId) -> Result<(), DbError>;
}

#[derive(Clone)]
pub struct RepoRepository {
	pool: SqlitePool,
}

impl RepoRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, repo), fields(repo_id = %repo.id, org_id = %repo.org_id, name = %repo.name))]
	pub async fn create_repo(&self, repo: &RepoRecord) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO repos (id, org_id, name, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(repo.id.as_str())
		.bind(repo.org_id.as_str())
		.bind(&repo.name)
		.bind(format_timestamp(&repo.created_at))
		.bind(format_timestamp(&repo.updated_at))
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, "Repository"))?;

		tracing::debug!(repo_id = %repo.id, "repository created");
		Ok(())
	}

	/// Get a repository by ID. Soft-deleted repositories are not returned.
	#[tracing::instrument(skip(self), fields(repo_id = %id))]
	pub async fn get_repo_by_id(&self, id: &RepoId) -> Result<Option<RepoRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, org_id, name, created_at, updated_at, deleted_at
			FROM repos
			WHERE id = ? AND deleted_at IS NULL
			"#,
		)
		.bind(id.as_str())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_repo(&r)).transpose()
	}

	/// Soft-delete a repository. Its branches stop exposing history.
	///
	/// # Errors
	/// Returns `DbError::NotFound` if the repository does not exist or is
	/// already deleted.
	#[tracing::instrument(skip(self), fields(repo_id = %id))]
	pub async fn soft_delete_repo(&self, id: &RepoId) -> Result<(), DbError> {
		let now = format_timestamp(&Utc::now());
		let result = sqlx::query(
			r#"
			UPDATE repos
			SET deleted_at = ?, updated_at = ?
			WHERE id = ? AND deleted_at IS NULL
			"#,
		)
		.bind(&now)
		.bind(&now)
		.bind(id.as_str())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("Repository {id}")));
		}

		tracing::debug!(repo_id = %id, "repository soft-deleted");
		Ok(())
	}
}

fn row_to_repo(row: &sqlx::sqlite::SqliteRow) -> Result<RepoRecord, DbError> {
	let id: String = row.get("id");
	let org_id: String = row.get("org_id");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	let deleted_at: Option<String> = row.get("deleted_at");

	Ok(RepoRecord {
		id: RepoId::from_string(id),
		org_id: OrgId::from_string(org_id),
		name: row.get("name"),
		created_at: parse_timestamp("created_at", &created_at)?,
		updated_at: parse_timestamp("updated_at", &updated_at)?,
		deleted_at: deleted_at
			.map(|s| parse_timestamp("deleted_at", &s))
			.transpose()?,
	})
}

#[async_trait]
impl RepoStore for RepoRepository {
	async fn create_repo(&self, repo: &RepoRecord) -> Result<(), DbError> {
		self.create_repo(repo).await
	}

	async fn get_repo_by_id(&self, id: &RepoId) -> Result<Option<RepoRecord>, DbError> {
		self.get_repo_by_id(id).await
	}

	async fn soft_delete_repo(&self, id: &RepoId) -> Result<(), DbError> {
		self.soft_delete_repo(id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::org::OrgRepository;
	use crate::testing::create_test_pool;
	use crate::types::Organization;

	async fn setup() -> (RepoRepository, OrgId) {
		let pool = create_test_pool().await;
		let org = Organization::new("Acme", "acme");
		OrgRepository::new(pool.clone())
			.create_org(&org)
			.await
			.unwrap();
		(RepoRepository::new(pool), org.id)
	}

	#[tokio::test]
	async fn test_create_and_get_repo() {
		let (repos, org_id) = setup().await;
		let repo = RepoRecord::new(org_id, "site");

		repos.create_repo(&repo).await.unwrap();

		let fetched = repos.get_repo_by_id(&repo.id).await.unwrap();
		assert_eq!(fetched, Some(repo));
	}

	#[tokio::test]
	async fn test_duplicate_name_in_org_conflicts() {
		let (repos, org_id) = setup().await;
		repos
			.create_repo(&RepoRecord::new(org_id.clone(), "site"))
			.await
			.unwrap();

		let result = repos.create_repo(&RepoRecord::new(org_id, "site")).await;
		assert!(matches!(result, Err(DbError::Conflict(_))));
	}

	#[tokio::test]
	async fn test_soft_delete_hides_repo() {
		let (repos, org_id) = setup().await;
		let repo = RepoRecord::new(org_id, "site");
		repos.create_repo(&repo).await.unwrap();

		repos.soft_delete_repo(&repo.id).await.unwrap();

		assert!(repos.get_repo_by_id(&repo.id).await.unwrap().is_none());
		assert!(matches!(
			repos.soft_delete_repo(&repo.id).await,
			Err(DbError::NotFound(_))
		));
	}
}
