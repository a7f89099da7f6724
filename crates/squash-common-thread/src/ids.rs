// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! String-backed identifier newtypes.
//!
//! Identifiers are assigned by whichever component writes the record, so any
//! string is accepted. Locally generated identifiers use a short prefix
//! followed by a UUIDv7, which keeps them sortable by creation time.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id_type {
	($name:ident, $prefix:expr, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			/// Prefix used by [`Self::generate`].
			pub const PREFIX: &'static str = $prefix;

			/// Generate a new time-ordered ID.
			pub fn generate() -> Self {
				Self(format!("{}{}", Self::PREFIX, uuid7::uuid7()))
			}

			/// Wrap an existing string without validation.
			pub fn from_string(s: String) -> Self {
				Self(s)
			}

			pub fn as_str(&self) -> &str {
				&self.0
			}

			pub fn into_inner(self) -> String {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl From<String> for $name {
			fn from(s: String) -> Self {
				Self(s)
			}
		}

		impl From<&str> for $name {
			fn from(s: &str) -> Self {
				Self(s.to_string())
			}
		}

		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
	};
}

define_id_type!(MessageId, "M-", "Unique identifier for a message.");
define_id_type!(ThreadId, "T-", "Identifier of a message thread shared by branches.");
define_id_type!(BranchId, "B-", "Unique identifier for a branch.");
define_id_type!(RepoId, "R-", "Unique identifier for a repository.");
define_id_type!(OrgId, "O-", "Unique identifier for an organization.");
define_id_type!(UserId, "U-", "Unique identifier for a user.");
