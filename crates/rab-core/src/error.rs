use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RabError {
    #[error("PDF extraction failed: {0}")]
    Extraction(String),

    #[error("pdftotext not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)")]
    PdftotextNotFound,

    #[error("pdftotext failed with exit code {code}: {stderr}")]
    PdftotextFailed { code: i32, stderr: String },

    #[error("failed to open spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("sheet '{name}' not found (available: {available})")]
    SheetNotFound { name: String, available: String },

    #[error("unsupported input '{0}'. Expected one of: xlsx, xlsm, xls, ods, pdf")]
    UnsupportedInput(String),

    #[error("failed to load config from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    #[error("analysis cancelled after {rows_processed} row(s)")]
    Cancelled { rows_processed: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("workbook archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}
