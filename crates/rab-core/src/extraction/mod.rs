pub mod pdftotext;
pub mod xlsx;

use rust_decimal::Decimal;

use crate::error::RabError;

/// A positioned word on a PDF page.
///
/// `y` grows upwards from the bottom of the page, so rows higher on the page
/// have larger `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, x: f32, y: f32) -> Self {
        TextFragment {
            text: text.into(),
            x,
            y,
        }
    }
}

/// Content extracted from a single page of a PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    /// One-based page number.
    pub page_number: usize,
    pub fragments: Vec<TextFragment>,
}

/// Trait for PDF text extraction backends.
pub trait PdfExtractor: Send + Sync {
    /// Extract positioned text from PDF bytes, returning one PageContent per page.
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageContent>, RabError>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// A worksheet cell as decoded by a spreadsheet backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(Decimal),
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<Decimal> for CellValue {
    fn from(d: Decimal) -> Self {
        CellValue::Number(d)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(Decimal::from(n))
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(Decimal::from(n))
    }
}

/// One worksheet row. `index` is the zero-based row number in the sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub index: usize,
    pub cells: Vec<CellValue>,
    pub hidden: bool,
}

/// The rows of the worksheet selected for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetGrid {
    pub sheet_name: String,
    /// Every sheet in the workbook, in workbook order.
    pub sheet_names: Vec<String>,
    pub rows: Vec<SheetRow>,
}

impl SheetGrid {
    /// Single-sheet grid with visible rows numbered from zero.
    pub fn new(sheet_name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> SheetGrid {
        let sheet_name = sheet_name.into();
        SheetGrid {
            sheet_names: vec![sheet_name.clone()],
            sheet_name,
            rows: rows
                .into_iter()
                .enumerate()
                .map(|(index, cells)| SheetRow {
                    index,
                    cells,
                    hidden: false,
                })
                .collect(),
        }
    }

    /// Mark the given zero-based rows hidden.
    pub fn with_hidden_rows(mut self, hidden: &[usize]) -> SheetGrid {
        for row in &mut self.rows {
            row.hidden = hidden.contains(&row.index);
        }
        self
    }
}

/// Trait for spreadsheet decoding backends.
pub trait SpreadsheetDecoder: Send + Sync {
    /// Decode workbook bytes into the rows of one sheet. `sheet` selects a
    /// sheet by name; `None` picks the first sheet.
    fn decode(&self, bytes: &[u8], sheet: Option<&str>) -> Result<SheetGrid, RabError>;

    /// Name of this decoding backend (for diagnostics).
    fn backend_name(&self) -> &str;
}
