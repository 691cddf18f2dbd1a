use rust_decimal::Decimal;
use tracing::{debug, info};

use super::classify::{
    is_group_label, is_marker_like, is_placeholder_row, is_skip_caption, mentions_total,
    qualifies_as_item, section_marker, ColumnRole, HeaderScan, SectionMarker, SHEET_TOTAL_KEYWORDS,
};
use super::{
    fold_rows, CancelFlag, ParserState, ReconstructedRow, RowOutcome, RowToken, SectionMode,
    TokenPosition,
};
use crate::config::ExtractionConfig;
use crate::error::RabError;
use crate::extraction::{CellValue, SheetGrid};
use crate::model::{AnalysisResult, LineItem, RowOrigin, SkipReason, TaxRate};
use crate::reconcile::reconcile;

/// Column index per role, resolved from header rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub sequence: Option<usize>,
    pub description: Option<usize>,
    pub unit: Option<usize>,
    pub quantity: Option<usize>,
    pub unit_price: Option<usize>,
    pub amount: Option<usize>,
}

impl ColumnMap {
    pub fn get(&self, role: ColumnRole) -> Option<usize> {
        match role {
            ColumnRole::Sequence => self.sequence,
            ColumnRole::Description => self.description,
            ColumnRole::Unit => self.unit,
            ColumnRole::Quantity => self.quantity,
            ColumnRole::UnitPrice => self.unit_price,
            ColumnRole::Amount => self.amount,
        }
    }

    fn slot_mut(&mut self, role: ColumnRole) -> &mut Option<usize> {
        match role {
            ColumnRole::Sequence => &mut self.sequence,
            ColumnRole::Description => &mut self.description,
            ColumnRole::Unit => &mut self.unit,
            ColumnRole::Quantity => &mut self.quantity,
            ColumnRole::UnitPrice => &mut self.unit_price,
            ColumnRole::Amount => &mut self.amount,
        }
    }

    /// Role already bound to `column`, if any.
    pub fn role_of(&self, column: usize) -> Option<ColumnRole> {
        [
            ColumnRole::Sequence,
            ColumnRole::Description,
            ColumnRole::Unit,
            ColumnRole::Quantity,
            ColumnRole::UnitPrice,
            ColumnRole::Amount,
        ]
        .into_iter()
        .find(|role| self.get(*role) == Some(column))
    }

    /// Fill unassigned roles from a header scan. An assigned role is never
    /// moved, and a column never takes a second role.
    pub fn absorb(mut self, scan: &HeaderScan) -> ColumnMap {
        for &(column, role) in &scan.hits {
            if self.get(role).is_none() && self.role_of(column).is_none() {
                *self.slot_mut(role) = Some(column);
            }
        }
        self
    }

    /// Enough roles are known to decode line items.
    pub fn is_resolved(&self) -> bool {
        self.description.is_some()
            && (self.quantity.is_some() || self.unit_price.is_some() || self.amount.is_some())
    }
}

/// Turn decoded worksheet rows into reconstructed rows, one token per column.
pub fn rows_from_grid(grid: &SheetGrid) -> Vec<ReconstructedRow> {
    grid.rows
        .iter()
        .map(|row| ReconstructedRow {
            origin: RowOrigin::Sheet { row: row.index },
            tokens: row
                .cells
                .iter()
                .enumerate()
                .map(|(i, cell)| match cell {
                    CellValue::Empty => RowToken::text("", TokenPosition::Column(i)),
                    CellValue::Text(s) => RowToken::text(s.trim(), TokenPosition::Column(i)),
                    CellValue::Number(d) => RowToken::number(*d, TokenPosition::Column(i)),
                })
                .collect(),
            hidden: row.hidden,
        })
        .collect()
}

/// Extract and reconcile line items from one worksheet.
pub fn analyze_grid(
    grid: &SheetGrid,
    config: &ExtractionConfig,
    cancel: &CancelFlag,
) -> Result<AnalysisResult, RabError> {
    let tax_rate = config.tax_rate();
    info!(
        sheet = %grid.sheet_name,
        rows = grid.rows.len(),
        hidden = grid.rows.iter().filter(|r| r.hidden).count(),
        "analysing worksheet"
    );

    let extraction = fold_rows(rows_from_grid(grid), cancel, |state, row| {
        step(state, row, tax_rate)
    })?;

    if extraction.items.is_empty() {
        info!(sheet = %grid.sheet_name, "no line items found in worksheet");
    }
    Ok(reconcile(
        extraction.items,
        extraction.totals,
        extraction.skipped_rows,
    ))
}

/// Classify one worksheet row against the current parser state.
pub fn step(
    state: ParserState,
    row: &ReconstructedRow,
    tax_rate: TaxRate,
) -> (ParserState, RowOutcome) {
    if row.hidden {
        return (state, RowOutcome::Skipped(SkipReason::Hidden));
    }

    let cells = row.lowercase_cells();
    match section_marker(&cells) {
        Some(SectionMarker::EnterRecap) => {
            debug!(origin = %row.origin, "entering recap section");
            return (state.enter(SectionMode::Recap), RowOutcome::Consumed);
        }
        Some(SectionMarker::LeaveRecap) => {
            if state.mode == SectionMode::Recap {
                debug!(origin = %row.origin, "leaving recap section");
                return (state.enter(SectionMode::Preamble), RowOutcome::Consumed);
            }
            return (state, RowOutcome::Consumed);
        }
        None => {}
    }

    if state.mode == SectionMode::Recap {
        return (state, RowOutcome::Skipped(SkipReason::Recap));
    }

    let scan = HeaderScan::scan(&cells);
    if state.mode == SectionMode::Preamble {
        if !scan.is_header() {
            return (state, RowOutcome::Skipped(SkipReason::Preamble));
        }
        let columns = state.columns.absorb(&scan);
        let mode = if columns.is_resolved() {
            debug!(origin = %row.origin, ?columns, "column header resolved");
            SectionMode::Detail
        } else {
            SectionMode::Preamble
        };
        return (ParserState { mode, columns, ..state }, RowOutcome::Consumed);
    }

    // Continuation header lines ("Satuan | Jumlah" under a merged "Harga").
    if scan.is_header() && !row.has_numeric_token() {
        let columns = state.columns.absorb(&scan);
        return (ParserState { columns, ..state }, RowOutcome::Consumed);
    }

    decode_detail_row(state, row, tax_rate)
}

fn decode_detail_row(
    state: ParserState,
    row: &ReconstructedRow,
    tax_rate: TaxRate,
) -> (ParserState, RowOutcome) {
    let columns = &state.columns;
    let sequence_label = cell_text(row, columns.sequence).to_string();
    let unit = cell_text(row, columns.unit).to_string();

    if is_placeholder_row(&sequence_label, cell_text(row, columns.description), &unit) {
        return (state, RowOutcome::Skipped(SkipReason::Placeholder));
    }

    let description = merged_description(row, columns);

    if is_group_label(&sequence_label) {
        return (
            state,
            RowOutcome::Emit(LineItem::Header {
                sequence_label,
                description,
            }),
        );
    }

    if description.is_empty() || is_skip_caption(&description) {
        let state = observe_caption(state, row, &description);
        return (state, RowOutcome::Skipped(SkipReason::Caption));
    }

    let quantity = cell_number(row, columns.quantity);
    let unit_price = cell_number(row, columns.unit_price);
    let amount = cell_number(row, columns.amount);

    if !qualifies_as_item(quantity, unit_price, amount) {
        let state = observe_caption(state, row, &description);
        return (state, RowOutcome::Skipped(SkipReason::Noise));
    }

    let base = if amount > Decimal::ZERO {
        amount
    } else {
        quantity * unit_price
    };

    let item = LineItem::Item {
        sequence_label,
        description,
        unit: if unit.is_empty() { "-".to_string() } else { unit },
        quantity,
        unit_price,
        tax_rate,
        total_with_tax: tax_rate.apply(base),
    };
    (state, RowOutcome::Emit(item))
}

/// Description cell text, extended across the next one or two cells when the
/// description cell only holds a label (titles split over merged cells).
fn merged_description(row: &ReconstructedRow, columns: &ColumnMap) -> String {
    let Some(start) = columns.description else {
        return String::new();
    };

    let mut parts: Vec<&str> = Vec::new();
    let primary = cell_text(row, Some(start));
    if !primary.is_empty() {
        parts.push(primary);
    }

    if is_marker_like(primary) {
        for column in start + 1..=start + 2 {
            if columns.role_of(column).is_some() {
                break;
            }
            let next = cell_text(row, Some(column));
            if next.is_empty() {
                continue;
            }
            parts.push(next);
            if !is_marker_like(next) {
                break;
            }
        }
    }

    parts.join(" ")
}

/// Feed a caption row's amount to the document-total tracker.
fn observe_caption(state: ParserState, row: &ReconstructedRow, description: &str) -> ParserState {
    if !mentions_total(description, SHEET_TOTAL_KEYWORDS) {
        return state;
    }

    let from_amount_column = cell_number(row, state.columns.amount);
    let candidate = if from_amount_column > Decimal::ZERO {
        from_amount_column
    } else {
        row.tokens
            .iter()
            .rev()
            .find(|t| t.is_numeric())
            .map(RowToken::numeric_value)
            .unwrap_or(Decimal::ZERO)
    };

    debug!(origin = %row.origin, %candidate, "document total candidate");
    state.observe_total(candidate)
}

fn cell_text(row: &ReconstructedRow, column: Option<usize>) -> &str {
    column
        .and_then(|c| row.tokens.get(c))
        .map(|t| t.text.trim())
        .unwrap_or("")
}

fn cell_number(row: &ReconstructedRow, column: Option<usize>) -> Decimal {
    column
        .and_then(|c| row.tokens.get(c))
        .map(RowToken::numeric_value)
        .unwrap_or(Decimal::ZERO)
}
