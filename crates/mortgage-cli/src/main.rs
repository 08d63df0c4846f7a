mod commands;
mod config;
mod input;
mod log;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::mortgage::{ProfilesArgs, RequestArgs, ScheduleArgs};
use config::Context;

/// Mortgage plan simulation with decimal precision
#[derive(Parser)]
#[command(
    name = "msim",
    version,
    about = "Mortgage plan simulation with decimal precision",
    long_about = "Resolves a purchase request against country lending profiles, checks \
                  eligibility, searches down payment and duration for the best loan plan, \
                  and explains where extra down payment stops paying off."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// YAML simulator configuration (grid steps, defaults, reserve months)
    #[arg(long, global = true)]
    config: Option<String>,

    /// JSON list of country-profile overrides applied before simulating
    #[arg(long, global = true)]
    profile_overrides: Option<String>,

    /// Log resolution and search progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the best loan plan for a purchase
    Simulate(RequestArgs),
    /// Check whether any loan plan is possible
    Feasibility(RequestArgs),
    /// Month-by-month amortisation for given loan terms
    Schedule(ScheduleArgs),
    /// Down-payment sweet-spot analysis for the optimal plan
    SweetSpot(RequestArgs),
    /// List built-in country lending profiles
    Profiles(ProfilesArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();
    log::init_logging(cli.verbose);

    let load = || Context::load(cli.config.as_deref(), cli.profile_overrides.as_deref());

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Simulate(args) => load().and_then(|ctx| commands::mortgage::run_simulate(args, &ctx)),
        Commands::Feasibility(args) => {
            load().and_then(|ctx| commands::mortgage::run_feasibility(args, &ctx))
        }
        Commands::Schedule(args) => commands::mortgage::run_schedule(args),
        Commands::SweetSpot(args) => load().and_then(|ctx| commands::mortgage::run_sweet_spot(args, &ctx)),
        Commands::Profiles(args) => load().and_then(|ctx| commands::mortgage::run_profiles(args, &ctx)),
        Commands::Version => {
            println!("msim {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
