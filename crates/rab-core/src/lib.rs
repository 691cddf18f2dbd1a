pub mod config;
pub mod error;
pub mod extraction;
pub mod model;
pub mod parsing;
pub mod reconcile;

use config::{validate_config, ExtractionConfig};
use error::RabError;
use extraction::pdftotext::PdftotextExtractor;
use extraction::xlsx::CalamineDecoder;
use extraction::{PdfExtractor, SpreadsheetDecoder};
use model::{AnalysisResult, DocumentKind};
use tracing::info;

pub use parsing::CancelFlag;

/// Settings and cancellation handle for one analysis call.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub config: ExtractionConfig,
    pub cancel: CancelFlag,
}

impl AnalyzeOptions {
    pub fn with_config(config: ExtractionConfig) -> Self {
        AnalyzeOptions {
            config,
            cancel: CancelFlag::new(),
        }
    }
}

/// Main API entry point for PDF budgets: extract positioned text, rebuild
/// rows, and reconcile extracted items against the declared total.
pub fn analyze_pdf(
    pdf_bytes: &[u8],
    extractor: &dyn PdfExtractor,
    options: &AnalyzeOptions,
) -> Result<AnalysisResult, RabError> {
    validate_config(&options.config)?;
    info!(backend = extractor.backend_name(), bytes = pdf_bytes.len(), "extracting PDF");

    let pages = extractor.extract_pages(pdf_bytes)?;
    parsing::pdf::analyze_pages(&pages, &options.config, &options.cancel)
}

/// Main API entry point for spreadsheet budgets.
///
/// The sheet named in the config is analysed, or the first sheet when none
/// is named.
pub fn analyze_spreadsheet(
    bytes: &[u8],
    decoder: &dyn SpreadsheetDecoder,
    options: &AnalyzeOptions,
) -> Result<AnalysisResult, RabError> {
    validate_config(&options.config)?;
    info!(backend = decoder.backend_name(), bytes = bytes.len(), "decoding spreadsheet");

    let grid = decoder.decode(bytes, options.config.sheet.as_deref())?;
    parsing::sheet::analyze_grid(&grid, &options.config, &options.cancel)
}

/// Analyse a document with the bundled backends (calamine, pdftotext).
pub fn analyze_document(
    bytes: &[u8],
    kind: DocumentKind,
    options: &AnalyzeOptions,
) -> Result<AnalysisResult, RabError> {
    match kind {
        DocumentKind::Spreadsheet => analyze_spreadsheet(bytes, &CalamineDecoder::new(), options),
        DocumentKind::Pdf => analyze_pdf(bytes, &PdftotextExtractor::new(), options),
    }
}
