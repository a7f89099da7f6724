// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Linear history resolution over parent-linked messages.
//!
//! Messages form a tree through their parent links, with branches pointing at
//! different tips of the same thread. Given every message visible to a branch
//! and a leaf id, [`resolve_thread_history`] rebuilds the root-to-leaf path.
//!
//! The input is not trusted to be a tree. Cycles, dangling parent references
//! and duplicate ids all resolve to a finite, possibly truncated path instead
//! of an error.

use std::collections::{HashMap, HashSet};

use crate::ids::MessageId;
use crate::model::MessageProjection;

/// The parent-link view of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageLink<'a> {
	pub id: &'a str,
	pub parent_id: Option<&'a str>,
}

impl<'a> MessageLink<'a> {
	/// An empty `parent_id` is normalized to `None`.
	pub fn new(id: &'a str, parent_id: Option<&'a str>) -> Self {
		Self {
			id,
			parent_id: parent_id.filter(|p| !p.is_empty()),
		}
	}
}

/// Types that expose their own [`MessageLink`].
pub trait MessageLinks {
	fn message_link(&self) -> MessageLink<'_>;
}

impl<T: MessageLinks + ?Sized> MessageLinks for &T {
	fn message_link(&self) -> MessageLink<'_> {
		(**self).message_link()
	}
}

/// Resolve the root-first path ending at `leaf_id`.
pub fn resolve_thread_history<'a, T: MessageLinks>(messages: &'a [T], leaf_id: &str) -> Vec<&'a T> {
	resolve_thread_history_by(messages, leaf_id, T::message_link)
}

/// Resolve the root-first path ending at `leaf_id`, using `extract` to read
/// each element's links.
///
/// Returns an empty path if `leaf_id` is not present. The walk stops at a
/// root, at a parent id missing from `messages`, or at the first id visited
/// twice. When ids repeat, the last element with a given id wins.
pub fn resolve_thread_history_by<'a, T, F>(messages: &'a [T], leaf_id: &str, extract: F) -> Vec<&'a T>
where
	F: Fn(&T) -> MessageLink<'_>,
{
	resolve_indices(messages, leaf_id, &extract)
		.into_iter()
		.map(|index| &messages[index])
		.collect()
}

/// Owned variant of [`resolve_thread_history`]; elements off the path are
/// dropped.
pub fn into_thread_history<T: MessageLinks>(messages: Vec<T>, leaf_id: &str) -> Vec<T> {
	into_thread_history_by(messages, leaf_id, T::message_link)
}

/// Owned variant of [`resolve_thread_history_by`].
pub fn into_thread_history_by<T, F>(messages: Vec<T>, leaf_id: &str, extract: F) -> Vec<T>
where
	F: Fn(&T) -> MessageLink<'_>,
{
	let path = resolve_indices(&messages, leaf_id, &extract);
	let mut slots: Vec<Option<T>> = messages.into_iter().map(Some).collect();
	path
		.into_iter()
		.filter_map(|index| slots[index].take())
		.collect()
}

fn resolve_indices<T, F>(messages: &[T], leaf_id: &str, extract: &F) -> Vec<usize>
where
	F: Fn(&T) -> MessageLink<'_>,
{
	let mut by_id: HashMap<&str, usize> = HashMap::with_capacity(messages.len());
	for (index, message) in messages.iter().enumerate() {
		by_id.insert(extract(message).id, index);
	}

	let Some(&leaf) = by_id.get(leaf_id) else {
		return Vec::new();
	};

	let mut path = Vec::new();
	let mut visited: HashSet<&str> = HashSet::new();
	let mut current = leaf;

	loop {
		let link = extract(&messages[current]);
		if !visited.insert(link.id) {
			break;
		}
		path.push(current);

		let Some(parent_id) = link.parent_id else {
			break;
		};
		match by_id.get(parent_id) {
			Some(&parent) => current = parent,
			None => break,
		}
	}

	path.reverse();
	path
}

/// Messages that no other message names as its parent, in input order.
pub fn thread_leaves<T: MessageLinks>(messages: &[T]) -> Vec<&T> {
	let parents: HashSet<&str> = messages
		.iter()
		.filter_map(|m| m.message_link().parent_id)
		.collect();

	messages
		.iter()
		.filter(|m| !parents.contains(m.message_link().id))
		.collect()
}

/// The most recently created leaf, used when a caller does not pick one.
///
/// Ties on `created_at` go to the later element. If every message is some
/// other message's parent (only possible with a cycle), the most recent
/// message overall is returned.
pub fn latest_leaf(messages: &[MessageProjection]) -> Option<&MessageId> {
	let leaves = thread_leaves(messages);
	let candidates: Vec<&MessageProjection> = if leaves.is_empty() {
		messages.iter().collect()
	} else {
		leaves
	};

	candidates
		.into_iter()
		.max_by_key(|m| m.created_at)
		.map(|m| &m.id)
}
