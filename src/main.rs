use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use rust_dotenv::dotenv::DotEnv;

mod appwrite;
mod config;
mod core;
mod fixtures;
mod images;
mod logger;
mod lookup;
mod report;
mod scaffold;
mod seeder;
#[cfg(test)]
mod testing;

use appwrite::AppwriteClient;
use config::AppwriteCfg;
use fixtures::Fixtures;
use images::HttpFetcher;
use report::{FailurePolicy, SeedReport, print_human_report, write_json_report};
use seeder::{SeedError, SeedOpts, SeedTarget, Seeder};

#[derive(Parser, Debug)]
#[command(version, about = "Reseed an Appwrite menu database")]
pub struct Cli {
	/// Increase output
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Write seed/menu.toml and .env.example
	Init,
	/// Validate fixtures without touching the backend
	Check {
		#[arg(long)]
		fixtures: Option<PathBuf>,
	},
	/// Delete every seeded document and stored file
	Clear,
	/// Clear, then recreate all fixture records
	Seed {
		#[arg(long)]
		fixtures: Option<PathBuf>,
		/// Record failures and keep going instead of aborting
		#[arg(long)]
		keep_going: bool,
		#[arg(long)]
		skip_images: bool,
		#[arg(long)]
		json_out: Option<PathBuf>,
	},
}

fn load_env() -> DotEnv {
	// Load .env in CWD if present, ignore missing
	DotEnv::new("")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Cli::parse();
	logger::init(args.verbose);
	run(args).await?;
	Ok(())
}

async fn run(args: Cli) -> Result<()> {
	let env = load_env();
	let lookup = |key: &str| env.get_var(key.to_string());

	match args.command {
		Commands::Init => scaffold::scaffold()?,
		Commands::Check { fixtures } => check(fixtures)?,
		Commands::Clear => {
			let seeder = build_seeder(lookup, SeedOpts::default())?;
			let report = interruptible(seeder.clear()).await?;
			println!(
				"Cleared {} documents and {} files",
				report.documents_deleted, report.files_deleted
			);
		}
		Commands::Seed {
			fixtures,
			keep_going,
			skip_images,
			json_out,
		} => {
			let (fixtures, source) =
				Fixtures::resolve(fixtures.as_deref()).map_err(SeedError::initialization)?;
			tracing::info!(source = %source, "loaded fixtures");

			let policy = if keep_going {
				FailurePolicy::Continue
			} else {
				FailurePolicy::FailFast
			};
			let opts = SeedOpts {
				policy,
				upload_images: !skip_images,
			};
			let seeder = build_seeder(lookup, opts)?;
			let report = interruptible(seeder.run(&fixtures)).await?;

			print_human_report(&report);
			if let Some(path) = &json_out {
				write_json_report(path, &report)?;
			}
			ensure_succeeded(&report)?;
		}
	}

	Ok(())
}

fn check(path: Option<PathBuf>) -> Result<()> {
	let (fixtures, source) = Fixtures::resolve(path.as_deref())?;
	fixtures.validate()?;
	println!(
		"{source}: {} categories, {} customizations, {} menu items, {} menu customizations",
		fixtures.categories.len(),
		fixtures.customizations.len(),
		fixtures.menu.len(),
		fixtures.join_record_count()
	);
	Ok(())
}

/// Reads config and builds the clients. Failures are tagged `initialization`.
fn build_seeder(
	lookup: impl Fn(&str) -> Option<String>,
	opts: SeedOpts,
) -> Result<Seeder, SeedError> {
	AppwriteCfg::from_lookup(lookup)
		.and_then(|cfg| seeder_from_cfg(&cfg, opts))
		.map_err(SeedError::initialization)
}

fn seeder_from_cfg(cfg: &AppwriteCfg, opts: SeedOpts) -> Result<Seeder> {
	let client = Arc::new(AppwriteClient::new(cfg)?);
	let fetcher = Arc::new(HttpFetcher::new(cfg.timeout_ms())?);
	Ok(Seeder::new(
		client.clone(),
		client,
		fetcher,
		SeedTarget::from_cfg(cfg),
		opts,
	))
}

fn ensure_succeeded(report: &SeedReport) -> Result<()> {
	if !report.succeeded() {
		bail!("{} seed operations failed", report.failures.len());
	}
	Ok(())
}

/// Runs a seed operation until it finishes or Ctrl+C arrives.
async fn interruptible(
	run: impl Future<Output = Result<SeedReport, SeedError>>,
) -> Result<SeedReport> {
	tokio::select! {
		outcome = run => outcome.map_err(|err| {
			eprintln!("Seed failed during: {}", err.phase);
			anyhow::Error::new(err)
		}),
		_ = tokio::signal::ctrl_c() => {
			bail!("interrupted; the backend may be partially seeded")
		}
	}
}
