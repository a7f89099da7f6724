// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use squash_common_thread::{OrgId, RepoId, UserId};

use crate::error::DbError;

/// An organization owning repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
	pub id: OrgId,
	pub name: String,
	pub slug: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Organization {
	pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
		let now = Utc::now().trunc_subsecs(6);
		Self {
			id: OrgId::generate(),
			name: name.into(),
			slug: slug.into(),
			created_at: now,
			updated_at: now,
		}
	}
}

/// Roles within an organization. Every role may read history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
	Owner,
	Admin,
	Member,
}

impl OrgRole {
	pub fn as_str(&self) -> &'static str {
		match self {
			OrgRole::Owner => "owner",
			OrgRole::Admin => "admin",
			OrgRole::Member => "member",
		}
	}
}

impl fmt::Display for OrgRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for OrgRole {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"owner" => Ok(OrgRole::Owner),
			"admin" => Ok(OrgRole::Admin),
			"member" => Ok(OrgRole::Member),
			_ => Err(format!("invalid org role: {s}")),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgMembership {
	pub org_id: OrgId,
	pub user_id: UserId,
	pub role: OrgRole,
	pub created_at: DateTime<Utc>,
}

/// A repository row. Branches hang off repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRecord {
	pub id: RepoId,
	pub org_id: OrgId,
	pub name: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub deleted_at: Option<DateTime<Utc>>,
}

impl RepoRecord {
	pub fn new(org_id: OrgId, name: impl Into<String>) -> Self {
		let now = Utc::now().trunc_subsecs(6);
		Self {
			id: RepoId::generate(),
			org_id,
			name: name.into(),
			created_at: now,
			updated_at: now,
			deleted_at: None,
		}
	}
}

/// Fixed-width RFC 3339 so that text ordering in SQLite matches time ordering.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|d| d.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {field}: {e}")))
}
