mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::allocation::{AllocateArgs, BuildRequestArgs, ValidateArgs};
use commands::timetable::{CheckTimetableArgs, PeriodsArgs};

/// Fee installment payment allocation and timetable checks
#[derive(Parser)]
#[command(
    name = "feealloc",
    version,
    about = "Fee installment payment allocation and timetable checks",
    long_about = "A CLI for distributing a fee payment across outstanding installments \
                  with decimal precision. Supports automatic and manual allocation, \
                  carry-forward balances, submission validation, payment request \
                  building, and school-day period and timetable checks."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Distribute a payment across installments (auto or manual)
    Allocate(AllocateArgs),
    /// Check that an allocation can be submitted
    Validate(ValidateArgs),
    /// Build the multi-installment payment request
    BuildRequest(BuildRequestArgs),
    /// Slice a school day into periods and breaks
    Periods(PeriodsArgs),
    /// Check teacher qualifications and clashes in a timetable
    CheckTimetable(CheckTimetableArgs),
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

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Allocate(args) => commands::allocation::run_allocate(args),
        Commands::Validate(args) => commands::allocation::run_validate(args),
        Commands::BuildRequest(args) => commands::allocation::run_build_request(args),
        Commands::Periods(args) => commands::timetable::run_periods(args),
        Commands::CheckTimetable(args) => commands::timetable::run_check_timetable(args),
        Commands::Version => {
            println!("feealloc {}", env!("CARGO_PKG_VERSION"));
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
