mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rab",
    version,
    about = "Extract and reconcile line items from RAB budget spreadsheets and PDFs"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract line items from a budget (xlsx, xlsm, xls, ods or PDF) and
    /// compare them with the document's declared total
    Analyze {
        /// Path to the budget document
        input_file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,

        /// Write the analysis result to a JSON file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,

        /// JSON config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Tax rate in percent, overriding the config
        #[arg(long, value_name = "PERCENT")]
        tax_rate: Option<Decimal>,

        /// Worksheet to analyse (default: first sheet)
        #[arg(long, value_name = "NAME")]
        sheet: Option<String>,

        /// List rows that were skipped and why
        #[arg(long)]
        show_skipped: bool,
    },
    /// Print the default config as JSON
    Config,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Analyze {
            input_file,
            output,
            out,
            config,
            tax_rate,
            sheet,
            show_skipped,
        } => commands::analyze::run(commands::analyze::AnalyzeArgs {
            input_file,
            output,
            out,
            config,
            tax_rate,
            sheet,
            show_skipped,
        }),
        Commands::Config => commands::config::print_default(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
