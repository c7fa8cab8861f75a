//! Process-wide logging sink.
//!
//! Diagnostics go through `tracing`; `RUST_LOG` controls the filter and
//! `--verbose` raises the default to `debug`. Progress lines meant for the
//! person running the CLI stay on stdout.

use tracing_subscriber::EnvFilter;

use crate::core::timestamp;

pub fn init(verbose: bool) {
	let default = if verbose { "menuseed=debug" } else { "menuseed=info" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

	// A second init (tests, embedding) keeps the first subscriber.
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.try_init();
}

/// Records a failed operation with its message, error chain and timestamp.
pub fn log_failure(operation: &str, err: &anyhow::Error) {
	let stack: Vec<String> = err.chain().skip(1).map(|cause| cause.to_string()).collect();
	tracing::error!(
		operation,
		error = %err,
		stack = ?stack,
		timestamp = %timestamp(),
		"seed failed"
	);
}

pub fn chain_message(err: &anyhow::Error) -> String {
	format!("{err:#}")
}
