// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Organization repository for database operations.
//!
//! Organizations own repositories, and organization membership is the only
//! thing that grants read access to a branch's history.

use async_trait::async_trait;
use chrono::Utc;
use squash_common_thread::{OrgId, UserId};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{conflict_on_unique, DbError};
use crate::types::{format_timestamp, parse_timestamp, OrgMembership, OrgRole, Organization};

#[async_trait]
pub trait OrgStore: Send + Sync {
	async fn create_org(&self, org: &Organization) -> Result<(), DbError>;
	async fn get_org_by_id(&self, id: &OrgId) -> Result<Option<Organization>, DbError>;
	async fn add_member(
		&self,
		org_id: &OrgId,
		user_id: &UserId,
		role: OrgRole,
	) -> Result<(), DbError>;
	async fn get_membership(
		&self,
		org_id: &OrgId,
		user_id: &UserId,
	) -> Result<Option<OrgMembership>, DbError>;
	async fn is_member(&self, org_id: &OrgId, user_id: &UserId) -> Result<bool, DbError>;
	async fn remove_member(&self, org_id: &OrgId, user_id: &UserId) -> Result<bool, DbError>;
}

/// Repository for organization database operations.
#[derive(Clone)]
pub struct OrgRepository {
	pool: SqlitePool,
}

impl OrgRepository {
	/// Create a new repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create a new organization.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if the id or slug is already taken.
	#[tracing::instrument(skip(self, org), fields(org_id = %org.id, slug = %org.slug))]
	pub async fn create_org(&self, org: &Organization) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO organizations (id, name, slug, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(org.id.as_str())
		.bind(&org.name)
		.bind(&org.slug)
		.bind(format_timestamp(&org.created_at))
		.bind(format_timestamp(&org.updated_at))
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, "Organization"))?;

		tracing::debug!(org_id = %org.id, slug = %org.slug, "organization created");
		Ok(())
	}

	/// Get an organization by ID.
	#[tracing::instrument(skip(self), fields(org_id = %id))]
	pub async fn get_org_by_id(&self, id: &OrgId) -> Result<Option<Organization>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, slug, created_at, updated_at
			FROM organizations
			WHERE id = ?
			"#,
		)
		.bind(id.as_str())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_org(&r)).transpose()
	}

	/// Add a member to an organization.
	///
	/// # Database Constraints
	/// - (`org_id`, `user_id`) must be unique
	/// - `org_id` must reference an existing organization
	#[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %user_id, role = %role))]
	pub async fn add_member(
		&self,
		org_id: &OrgId,
		user_id: &UserId,
		role: OrgRole,
	) -> Result<(), DbError> {
		let now = format_timestamp(&Utc::now());
		sqlx::query(
			r#"
			INSERT INTO org_memberships (org_id, user_id, role, created_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(org_id.as_str())
		.bind(user_id.as_str())
		.bind(role.as_str())
		.bind(&now)
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, "Membership"))?;

		tracing::debug!(org_id = %org_id, user_id = %user_id, role = %role, "member added to organization");
		Ok(())
	}

	/// Get a membership for a user in an organization.
	///
	/// # Returns
	/// `None` if the user is not a member.
	#[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %user_id))]
	pub async fn get_membership(
		&self,
		org_id: &OrgId,
		user_id: &UserId,
	) -> Result<Option<OrgMembership>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT org_id, user_id, role, created_at
			FROM org_memberships
			WHERE org_id = ? AND user_id = ?
			"#,
		)
		.bind(org_id.as_str())
		.bind(user_id.as_str())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_membership(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %user_id))]
	pub async fn is_member(&self, org_id: &OrgId, user_id: &UserId) -> Result<bool, DbError> {
		let row: Option<(i64,)> = sqlx::query_as(
			r#"
			SELECT 1
			FROM org_memberships
			WHERE org_id = ? AND user_id = ?
			"#,
		)
		.bind(org_id.as_str())
		.bind(user_id.as_str())
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.is_some())
	}

	/// Remove a member from an organization.
	///
	/// # Returns
	/// `true` if a member was removed, `false` if not found.
	#[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %user_id))]
	pub async fn remove_member(&self, org_id: &OrgId, user_id: &UserId) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			DELETE FROM org_memberships
			WHERE org_id = ? AND user_id = ?
			"#,
		)
		.bind(org_id.as_str())
		.bind(user_id.as_str())
		.execute(&self.pool)
		.await?;

		let removed = result.rows_affected() > 0;
		if removed {
			tracing::debug!(org_id = %org_id, user_id = %user_id, "member removed from organization");
		}
		Ok(removed)
	}
}

fn row_to_org(row: &sqlx::sqlite::SqliteRow) -> Result<Organization, DbError> {
	let id: String = row.get("id");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(Organization {
		id: OrgId::from_string(id),
		name: row.get("name"),
		slug: row.get("slug"),
		created_at: parse_timestamp("created_at", &created_at)?,
		updated_at: parse_timestamp("updated_at", &updated_at)?,
	})
}

fn row_to_membership(row: &sqlx::sqlite::SqliteRow) -> Result<OrgMembership, DbError> {
	let org_id: String = row.get("org_id");
	let user_id: String = row.get("user_id");
	let role: String = row.get("role");
	let created_at: String = row.get("created_at");

	Ok(OrgMembership {
		org_id: OrgId::from_string(org_id),
		user_id: UserId::from_string(user_id),
		role: role.parse().map_err(DbError::Internal)?,
		created_at: parse_timestamp("created_at", &created_at)?,
	})
}

#[async_trait]
impl OrgStore for OrgRepository {
	async fn create_org(&self, org: &Organization) -> Result<(), DbError> {
		self.create_org(org).await
	}

	async fn get_org_by_id(&self, id: &OrgId) -> Result<Option<Organization>, DbError> {
		self.get_org_by_id(id).await
	}

	async fn add_member(
		&self,
		org_id: &OrgId,
		user_id: &UserId,
		role: OrgRole,
	) -> Result<(), DbError> {
		self.add_member(org_id, user_id, role).await
	}

	async fn get_membership(
		&self,
		org_id: &OrgId,
		user_id: &UserId,
	) -> Result<Option<OrgMembership>, DbError> {
		self.get_membership(org_id, user_id).await
	}

	async fn is_member(&self, org_id: &OrgId, user_id: &UserId) -> Result<bool, DbError> {
		self.is_member(org_id, user_id).await
	}

	async fn remove_member(&self, org_id: &OrgId, user_id: &UserId) -> Result<bool, DbError> {
		self.remove_member(org_id, user_id).await
	}
}
