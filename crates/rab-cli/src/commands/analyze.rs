use rab_core::config::{load_config, ExtractionConfig};
use rab_core::error::RabError;
use rab_core::model::DocumentKind;
use rab_core::AnalyzeOptions;
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing::info;

use crate::output;
use crate::OutputFormat;

pub struct AnalyzeArgs {
    pub input_file: PathBuf,
    pub output: OutputFormat,
    pub out: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub tax_rate: Option<Decimal>,
    pub sheet: Option<String>,
    pub show_skipped: bool,
}

pub fn run(args: AnalyzeArgs) -> Result<(), RabError> {
    let kind = DocumentKind::from_path(&args.input_file)?;

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ExtractionConfig::default(),
    };
    if let Some(rate) = args.tax_rate {
        config.tax_rate_percent = rate;
    }
    if args.sheet.is_some() {
        config.sheet = args.sheet;
    }

    let bytes = std::fs::read(&args.input_file)?;
    info!(file = %args.input_file.display(), %kind, "analysing document");
    let result = rab_core::analyze_document(&bytes, kind, &AnalyzeOptions::with_config(config))?;

    match args.out {
        Some(path) => {
            // Always write JSON when saving to file
            let json = serde_json::to_string_pretty(&result)?;
            std::fs::write(&path, json)?;
            eprintln!(
                "Extracted {} item(s), written to {}",
                result.item_count(),
                path.display()
            );
            if !result.skipped_rows.is_empty() {
                eprintln!("  {} row(s) skipped during extraction", result.skipped_rows.len());
            }
        }
        None => match args.output {
            OutputFormat::Json => output::json::print(&result)?,
            OutputFormat::Table => output::table::print(&result, args.show_skipped),
        },
    }

    Ok(())
}
