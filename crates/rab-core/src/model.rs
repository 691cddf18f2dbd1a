use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::RabError;

/// Input formats the engine accepts, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Spreadsheet,
    Pdf,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Result<DocumentKind, RabError> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(DocumentKind::Spreadsheet),
            "pdf" => Ok(DocumentKind::Pdf),
            other => Err(RabError::UnsupportedInput(other.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> Result<DocumentKind, RabError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| RabError::UnsupportedInput(path.display().to_string()))?;
        DocumentKind::from_extension(ext)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Spreadsheet => write!(f, "spreadsheet"),
            DocumentKind::Pdf => write!(f, "PDF"),
        }
    }
}

/// Fixed tax rate applied on top of every item amount, stored as a percentage.
///
/// Serialized as its label (e.g. `"11%"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TaxRate(Decimal);

impl TaxRate {
    pub const fn from_percent(percent: Decimal) -> TaxRate {
        TaxRate(percent)
    }

    pub fn percent(&self) -> Decimal {
        self.0
    }

    /// Factor that turns a pre-tax amount into a tax-inclusive one.
    pub fn multiplier(&self) -> Decimal {
        Decimal::ONE + self.0 / Decimal::ONE_HUNDRED
    }

    pub fn apply(&self, amount: Decimal) -> Decimal {
        amount * self.multiplier()
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(Decimal::from(11))
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

impl From<TaxRate> for String {
    fn from(rate: TaxRate) -> String {
        rate.to_string()
    }
}

impl TryFrom<String> for TaxRate {
    type Error = String;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        let digits = label.trim().trim_end_matches('%').trim();
        digits
            .parse::<Decimal>()
            .map(TaxRate)
            .map_err(|e| format!("invalid tax rate '{label}': {e}"))
    }
}

/// One extracted row of the bill of quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LineItem {
    /// Roman-numeral group header introducing a category of work items.
    Header {
        sequence_label: String,
        description: String,
    },
    /// Priced work item.
    Item {
        sequence_label: String,
        description: String,
        /// Unit of measure, `"-"` when unknown.
        unit: String,
        quantity: Decimal,
        unit_price: Decimal,
        tax_rate: TaxRate,
        total_with_tax: Decimal,
    },
}

impl LineItem {
    pub fn sequence_label(&self) -> &str {
        match self {
            LineItem::Header { sequence_label, .. } | LineItem::Item { sequence_label, .. } => {
                sequence_label
            }
        }
    }

    pub fn description(&self) -> &str {
        match self {
            LineItem::Header { description, .. } | LineItem::Item { description, .. } => {
                description
            }
        }
    }

    /// Tax-inclusive total, `None` for group headers.
    pub fn total_with_tax(&self) -> Option<Decimal> {
        match self {
            LineItem::Header { .. } => None,
            LineItem::Item { total_with_tax, .. } => Some(*total_with_tax),
        }
    }

    pub fn is_header(&self) -> bool {
        matches!(self, LineItem::Header { .. })
    }
}

/// Where a row came from in the source document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum RowOrigin {
    /// Zero-based worksheet row.
    Sheet { row: usize },
    /// One-based page number and the row's vertical position.
    Page { page: usize, y: f32 },
}

impl fmt::Display for RowOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowOrigin::Sheet { row } => write!(f, "row {}", row + 1),
            RowOrigin::Page { page, y } => write!(f, "page {page} y={y:.1}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Author-side working row hidden in the spreadsheet.
    Hidden,
    /// Row inside a recap (rekapitulasi) section.
    Recap,
    /// Row before any column header was detected.
    Preamble,
    /// Sub-total, tax or rounding caption, or an empty description.
    Caption,
    /// Column-numbering placeholder row ("1 | 2 | 3 ...").
    Placeholder,
    /// Row with no usable quantity and price.
    Noise,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Hidden => "hidden row",
            SkipReason::Recap => "recap section",
            SkipReason::Preamble => "before column header",
            SkipReason::Caption => "caption",
            SkipReason::Placeholder => "column-number placeholder",
            SkipReason::Noise => "no quantity/price",
        };
        write!(f, "{s}")
    }
}

/// A row that was dropped during extraction, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub origin: RowOrigin,
    pub text: String,
    pub reason: SkipReason,
}

/// Outcome of analysing one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Extracted rows in document order.
    pub items: Vec<LineItem>,
    /// Largest total caption seen in the document, 0 if none.
    pub document_total: Decimal,
    /// Sum of every item's tax-inclusive total.
    pub extracted_total: Decimal,
    /// `|document_total - extracted_total|`.
    pub difference: Decimal,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_rows: Vec<SkippedRow>,
}

impl AnalysisResult {
    /// False when no total caption was found, so `difference` has no baseline.
    pub fn has_document_total(&self) -> bool {
        !self.document_total.is_zero()
    }

    /// True when a document total exists and differs from the extracted sum by
    /// less than `tolerance`.
    pub fn matches_within(&self, tolerance: Decimal) -> bool {
        self.has_document_total() && self.difference < tolerance
    }

    pub fn item_count(&self) -> usize {
        self.items.iter().filter(|i| !i.is_header()).count()
    }
}
