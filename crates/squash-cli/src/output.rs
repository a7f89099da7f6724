// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! JSON-lines rendering for command output.

use std::io::Write;

use serde::Serialize;

/// Write one compact JSON document per item.
pub fn write_json_lines<W, T>(out: &mut W, items: &[T]) -> anyhow::Result<()>
where
	W: Write,
	T: Serialize,
{
	for item in items {
		serde_json::to_writer(&mut *out, item)?;
		out.write_all(b"\n")?;
	}
	out.flush()?;
	Ok(())
}
