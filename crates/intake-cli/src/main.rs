//! Intake command line
//!
//! - `simulate`: seeded random editing sessions with invariant checks
//! - `walkthrough`: one scripted session from a new document to approval
//! - `check-config`: load and validate a TOML config, print it as JSON

mod simulator;
mod walkthrough;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use intake_core::IntakeConfig;
use simulator::{run_simulator, SimulatorConfig};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("intake")
        .version(intake_core::VERSION)
        .about("Submission request workflow tools")
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Path to an intake TOML config"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run the session simulator")
                .arg(
                    Arg::new("operations")
                        .long("ops")
                        .default_value("2000")
                        .value_parser(value_parser!(u64))
                        .help("Number of operations to simulate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("keep-going")
                        .long("keep-going")
                        .action(ArgAction::SetTrue)
                        .help("Collect every violation instead of stopping at the first"),
                ),
        )
        .subcommand(Command::new("walkthrough").about("Run a scripted session to approval"))
        .subcommand(
            Command::new("check-config")
                .about("Validate a config file and print the effective config")
                .arg(
                    Arg::new("path")
                        .long("path")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Path to the TOML file"),
                ),
        )
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<IntakeConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => IntakeConfig::from_path(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(IntakeConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("json-logs"));

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let operations = args.get_one::<u64>("operations").copied().unwrap_or(2_000);
            let seed = args.get_one::<u64>("seed").copied().unwrap_or(42);

            println!("Running intake simulator...");
            println!("Operations: {operations}");
            println!("Seed: {seed}");
            println!();

            let report = run_simulator(SimulatorConfig {
                seed,
                total_operations: operations,
                stop_on_first_violation: !args.get_flag("keep-going"),
                ..Default::default()
            })
            .await;

            println!("{}", report.generate_text());
            std::process::exit(i32::from(!report.passed()));
        }
        Some(("walkthrough", args)) => {
            let config = load_config(args)?;
            walkthrough::run(config).await?;
        }
        Some(("check-config", args)) => {
            let path = args
                .get_one::<PathBuf>("path")
                .context("--path is required")?;
            let config = IntakeConfig::from_path(path)
                .with_context(|| format!("invalid config {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        _ => {
            cli().print_help()?;
        }
    }
    Ok(())
}
