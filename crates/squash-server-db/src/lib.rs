// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for organizations, repositories, branches and messages.
//!
//! Every read that exposes message history is scoped by organization
//! membership in the query itself.

pub mod branch;
pub mod error;
pub mod org;
pub mod pool;
pub mod repo;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use branch::{BranchRepository, BranchStore};
pub use error::{DbError, Result};
pub use org::{OrgRepository, OrgStore};
pub use pool::{create_pool, run_migrations};
pub use repo::{RepoRepository, RepoStore};
pub use sqlx::SqlitePool;
pub use types::{OrgMembership, OrgRole, Organization, RepoRecord};
