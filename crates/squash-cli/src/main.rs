// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! `squash` command-line tool for reading branch history.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use squash_common_thread::{BranchId, MessageId, UserId};
use squash_server_config::ServerConfig;
use squash_server_history::HistoryService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod output;
mod version;

/// Squash - inspect conversation history on branches.
#[derive(Parser, Debug)]
#[command(name = "squash", about = "Inspect Squash branch history", version)]
struct Args {
	/// Path to a TOML config file (defaults to /etc/squash/server.toml)
	#[arg(long, global = true, env = "SQUASH_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
	/// Apply schema migrations to the configured database
	Migrate,

	/// Print the resolved history of a branch as JSON lines, root first
	History {
		#[arg(long)]
		branch: String,
		/// User the history is read on behalf of
		#[arg(long)]
		user: String,
		/// Leaf message to resolve (defaults to the newest leaf)
		#[arg(long)]
		leaf: Option<String>,
	},

	/// Print the selectable leaves of a branch as JSON lines
	Leaves {
		#[arg(long)]
		branch: String,
		#[arg(long)]
		user: String,
	},

	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if args.command == Command::Version {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => squash_server_config::load_config_with_file(path),
		None => squash_server_config::load_config(),
	}
	.context("failed to load configuration")?;

	init_tracing(&config);

	tracing::info!(database = %config.database.url, "starting squash");

	let pool = squash_server_db::create_pool(&config.database.url)
		.await
		.with_context(|| format!("failed to open database {}", config.database.url))?;

	let stdout = std::io::stdout();
	let mut out = stdout.lock();

	match args.command {
		Command::Migrate => {
			squash_server_db::run_migrations(&pool)
				.await
				.context("failed to apply migrations")?;
		}
		Command::History { branch, user, leaf } => {
			let service = HistoryService::with_pool(pool.clone());
			print_history(
				&service,
				&BranchId::from(branch),
				&UserId::from(user),
				leaf.map(MessageId::from).as_ref(),
				&mut out,
			)
			.await?;
		}
		Command::Leaves { branch, user } => {
			let service = HistoryService::with_pool(pool.clone());
			print_leaves(&service, &BranchId::from(branch), &UserId::from(user), &mut out).await?;
		}
		Command::Version => {}
	}

	pool.close().await;
	Ok(())
}

/// Logs go to stderr so stdout carries only command output.
fn init_tracing(config: &ServerConfig) {
	let json = config.logging.json;
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(json.then(|| {
			tracing_subscriber::fmt::layer()
				.json()
				.with_writer(std::io::stderr)
		}))
		.with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
		.init();
}

async fn print_history<W: Write>(
	service: &HistoryService,
	branch: &BranchId,
	user: &UserId,
	leaf: Option<&MessageId>,
	out: &mut W,
) -> anyhow::Result<()> {
	let history = service
		.load_history(branch, user, leaf)
		.await
		.with_context(|| format!("failed to load history for branch {branch}"))?;

	if history.is_empty() {
		tracing::warn!(branch_id = %branch, "no history available");
	}
	output::write_json_lines(out, &history.messages)
}

async fn print_leaves<W: Write>(
	service: &HistoryService,
	branch: &BranchId,
	user: &UserId,
	out: &mut W,
) -> anyhow::Result<()> {
	let leaves = service
		.list_leaves(branch, user)
		.await
		.with_context(|| format!("failed to list leaves for branch {branch}"))?;

	let ids: Vec<&MessageId> = leaves.iter().map(|m| &m.id).collect();
	output::write_json_lines(out, &ids)
}

#[cfg(test)]
mod tests {
	use super::*;
	use squash_server_db::testing::{message_at, TestWorkspace};

	#[test]
	fn test_parse_history_command() {
		let args = Args::try_parse_from([
			"squash", "--config", "/tmp/s.toml", "history", "--branch", "B-1", "--user", "U-1",
		])
		.unwrap();

		assert_eq!(args.config, Some(PathBuf::from("/tmp/s.toml")));
		assert_eq!(
			args.command,
			Command::History {
				branch: "B-1".to_string(),
				user: "U-1".to_string(),
				leaf: None,
			}
		);
	}

	#[test]
	fn test_history_requires_user() {
		assert!(Args::try_parse_from(["squash", "history", "--branch", "B-1"]).is_err());
	}

	async fn seeded() -> TestWorkspace {
		let ws = TestWorkspace::new().await;
		let thread = ws.branch.thread_id.clone();
		for m in [
			message_at("a", &thread, None, 0),
			message_at("b", &thread, Some("a"), 1),
			message_at("b2", &thread, Some("a"), 2),
		] {
			ws.branches.append_message(&m).await.unwrap();
		}
		ws
	}

	#[tokio::test]
	async fn test_print_history_writes_projection_lines() {
		let ws = seeded().await;
		let service = HistoryService::with_pool(ws.pool.clone());
		let mut buf = Vec::new();

		print_history(
			&service,
			&ws.branch.id,
			&ws.member,
			Some(&MessageId::from("b")),
			&mut buf,
		)
		.await
		.unwrap();

		let text = String::from_utf8(buf).unwrap();
		let lines: Vec<serde_json::Value> = text
			.lines()
			.map(|l| serde_json::from_str(l).unwrap())
			.collect();
		assert_eq!(lines.len(), 2);
		assert_eq!(lines[0]["id"], "a");
		assert_eq!(lines[1]["id"], "b");
		assert_eq!(lines[1]["parentId"], "a");
	}

	#[tokio::test]
	async fn test_print_leaves_for_outsider_is_empty() {
		let ws = seeded().await;
		let service = HistoryService::with_pool(ws.pool.clone());
		let mut buf = Vec::new();

		print_leaves(&service, &ws.branch.id, &UserId::generate(), &mut buf)
			.await
			.unwrap();
		assert!(buf.is_empty());

		print_leaves(&service, &ws.branch.id, &ws.member, &mut buf)
			.await
			.unwrap();
		assert_eq!(String::from_utf8(buf).unwrap(), "\"b\"\n\"b2\"\n");
	}
}
