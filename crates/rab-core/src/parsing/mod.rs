pub mod classify;
pub mod pdf;
pub mod sheet;
pub mod values;

use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::RabError;
use crate::model::{LineItem, RowOrigin, SkipReason, SkippedRow};
use crate::reconcile::TotalTracker;
use sheet::ColumnMap;
use values::{clean_number, is_numeric_token};

/// Where a token sat in its source row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenPosition {
    /// Zero-based spreadsheet column.
    Column(usize),
    /// Horizontal position of a PDF fragment.
    X(f32),
}

/// One cell or text fragment of a reconstructed row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowToken {
    pub text: String,
    /// Native numeric value, for spreadsheet cells that were stored as numbers.
    pub value: Option<Decimal>,
    pub position: TokenPosition,
}

impl RowToken {
    pub fn text(text: impl Into<String>, position: TokenPosition) -> RowToken {
        RowToken {
            text: text.into(),
            value: None,
            position,
        }
    }

    pub fn number(value: Decimal, position: TokenPosition) -> RowToken {
        RowToken {
            text: value.normalize().to_string(),
            value: Some(value),
            position,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.value.is_some() || is_numeric_token(Some(&self.text))
    }

    pub fn numeric_value(&self) -> Decimal {
        self.value
            .unwrap_or_else(|| clean_number(Some(self.text.as_str())))
    }
}

/// A row rebuilt from either a worksheet or positioned PDF fragments.
///
/// Spreadsheet rows keep one token per column (empty cells included) so column
/// indices stay aligned; PDF rows hold only non-empty fragments ordered left to
/// right.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedRow {
    pub origin: RowOrigin,
    pub tokens: Vec<RowToken>,
    pub hidden: bool,
}

impl ReconstructedRow {
    pub fn lowercase_cells(&self) -> Vec<String> {
        self.tokens
            .iter()
            .map(|t| t.text.trim().to_lowercase())
            .collect()
    }

    /// Non-empty token text joined with single spaces.
    pub fn joined_text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_blank(&self) -> bool {
        self.tokens.iter().all(|t| t.text.trim().is_empty())
    }

    pub fn has_numeric_token(&self) -> bool {
        self.tokens.iter().any(RowToken::is_numeric)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SectionMode {
    /// No column header seen yet.
    #[default]
    Preamble,
    /// Inside the priced line-item table.
    Detail,
    /// Inside a rekapitulasi section; nothing is extracted.
    Recap,
}

/// Cross-row parser state threaded through the fold over rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserState {
    pub mode: SectionMode,
    pub columns: ColumnMap,
    pub totals: TotalTracker,
}

impl ParserState {
    /// Fresh header state for a new section, keeping the running total.
    pub fn enter(self, mode: SectionMode) -> ParserState {
        ParserState {
            mode,
            columns: ColumnMap::default(),
            totals: self.totals,
        }
    }

    pub fn observe_total(self, candidate: Decimal) -> ParserState {
        ParserState {
            totals: self.totals.observe(candidate),
            ..self
        }
    }
}

/// What one row contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Emit(LineItem),
    /// Structural row (title, section marker, column header).
    Consumed,
    Skipped(SkipReason),
}

/// Cooperative cancellation flag checked between rows.
///
/// Clones share the same flag, so a caller can hand one clone to a worker
/// thread and cancel from another.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Items, diagnostics and the document-total tracker after one pass.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub items: Vec<LineItem>,
    pub skipped_rows: Vec<SkippedRow>,
    pub totals: TotalTracker,
}

/// Run `step` over every non-blank row in order, starting from a fresh state.
pub fn fold_rows<I, F>(rows: I, cancel: &CancelFlag, mut step: F) -> Result<Extraction, RabError>
where
    I: IntoIterator<Item = ReconstructedRow>,
    F: FnMut(ParserState, &ReconstructedRow) -> (ParserState, RowOutcome),
{
    let mut state = ParserState::default();
    let mut extraction = Extraction::default();

    for (processed, row) in rows.into_iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(RabError::Cancelled {
                rows_processed: processed,
            });
        }
        if row.is_blank() {
            continue;
        }

        let (next, outcome) = step(state, &row);
        if next.mode != state.mode {
            debug!(
                origin = %row.origin,
                from = ?state.mode,
                to = ?next.mode,
                "section mode changed"
            );
        }
        state = next;

        match outcome {
            RowOutcome::Emit(item) => {
                debug!(origin = %row.origin, label = item.sequence_label(), "emitted row");
                extraction.items.push(item);
            }
            RowOutcome::Consumed => {}
            RowOutcome::Skipped(reason) => {
                debug!(origin = %row.origin, %reason, "skipped row");
                extraction.skipped_rows.push(SkippedRow {
                    origin: row.origin,
                    text: row.joined_text(),
                    reason,
                });
            }
        }
    }

    extraction.totals = state.totals;
    Ok(extraction)
}
