//! PDF adapter: rebuilds table rows from positioned words, then reads each
//! row positionally from the right (total, unit price, quantity).

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::{debug, info};

use super::classify::{
    is_group_label, is_sequence_marker, is_skip_caption, mentions_total, qualifies_as_item,
    section_marker, HeaderScan, SectionMarker, PDF_TOTAL_KEYWORDS,
};
use super::values::is_dot_grouped;
use super::{
    fold_rows, CancelFlag, ParserState, ReconstructedRow, RowOutcome, RowToken, SectionMode,
    TokenPosition,
};
use crate::config::ExtractionConfig;
use crate::error::RabError;
use crate::extraction::{PageContent, TextFragment};
use crate::model::{AnalysisResult, LineItem, RowOrigin, SkipReason, TaxRate};
use crate::reconcile::reconcile;

/// Unit-of-measure tokens stripped from the end of a PDF description.
pub const UNIT_VOCABULARY: &[&str] = &[
    "m2", "m3", "bh", "ls", "pkt", "unit", "set", "ttk", "kg", "m1", "btg", "lbr", "can", "m'",
    "m\u{2019}",
];

/// Per-document settings for the PDF row step.
#[derive(Debug, Clone, Copy)]
pub struct PdfRules<'a> {
    pub tax_rate: TaxRate,
    pub extra_units: &'a [String],
}

impl PdfRules<'_> {
    fn is_unit(&self, word: &str) -> bool {
        let w = word.to_lowercase();
        UNIT_VOCABULARY.contains(&w.as_str())
            || self.extra_units.iter().any(|u| u.to_lowercase() == w)
    }

    fn units(&self) -> impl Iterator<Item = String> + '_ {
        UNIT_VOCABULARY
            .iter()
            .map(|u| u.to_string())
            .chain(self.extra_units.iter().map(|u| u.to_lowercase()))
    }
}

/// Cluster page fragments into rows.
///
/// Fragments whose y-position rounds to the same value at `precision`
/// decimal places share a row. Pages come out in page order, rows top to
/// bottom, tokens left to right.
pub fn reconstruct_rows(pages: &[PageContent], precision: u32) -> Vec<ReconstructedRow> {
    let scale = 10_f32.powi(precision as i32);
    let mut ordered: Vec<&PageContent> = pages.iter().collect();
    ordered.sort_by_key(|p| p.page_number);

    let mut rows = Vec::new();
    for page in ordered {
        let mut clusters: BTreeMap<i64, Vec<&TextFragment>> = BTreeMap::new();
        for fragment in &page.fragments {
            if fragment.text.trim().is_empty() {
                continue;
            }
            let key = (fragment.y * scale).round() as i64;
            clusters.entry(key).or_default().push(fragment);
        }

        for (key, mut fragments) in clusters.into_iter().rev() {
            fragments.sort_by(|a, b| a.x.total_cmp(&b.x));
            rows.push(ReconstructedRow {
                origin: RowOrigin::Page {
                    page: page.page_number,
                    y: key as f32 / scale,
                },
                tokens: fragments
                    .into_iter()
                    .map(|f| RowToken::text(f.text.trim(), TokenPosition::X(f.x)))
                    .collect(),
                hidden: false,
            });
        }
    }
    rows
}

/// Extract and reconcile line items from extracted PDF pages.
pub fn analyze_pages(
    pages: &[PageContent],
    config: &ExtractionConfig,
    cancel: &CancelFlag,
) -> Result<AnalysisResult, RabError> {
    let rules = PdfRules {
        tax_rate: config.tax_rate(),
        extra_units: &config.extra_units,
    };
    let rows = reconstruct_rows(pages, config.row_merge_precision);
    info!(pages = pages.len(), rows = rows.len(), "analysing PDF rows");

    let extraction = fold_rows(rows, cancel, |state, row| step(state, row, &rules))?;
    Ok(reconcile(
        extraction.items,
        extraction.totals,
        extraction.skipped_rows,
    ))
}

/// A PDF row split into label, description words, unit and numbers.
#[derive(Debug, Clone, Default, PartialEq)]
struct RowLayout {
    sequence_label: String,
    words: Vec<String>,
    unit: String,
    numbers: Vec<Decimal>,
}

impl RowLayout {
    fn read(row: &ReconstructedRow, rules: &PdfRules) -> RowLayout {
        let texts: Vec<&str> = row.tokens.iter().map(|t| t.text.trim()).collect();
        let label_index = label_index(&texts);

        let mut layout = RowLayout::default();
        for (i, token) in row.tokens.iter().enumerate() {
            if Some(i) == label_index {
                layout.sequence_label = texts[i].to_string();
            } else if token.is_numeric() {
                layout.numbers.push(token.numeric_value());
            } else if !matches!(texts[i].to_lowercase().as_str(), "rp" | "rp.") {
                layout.words.push(texts[i].to_string());
            }
        }
        layout.strip_unit(rules);
        layout
    }

    fn strip_unit(&mut self, rules: &PdfRules) {
        let Some(last) = self.words.last() else {
            return;
        };
        if rules.is_unit(last) {
            self.unit = last.clone();
            self.words.pop();
            return;
        }

        let lower = last.to_lowercase();
        for unit in rules.units() {
            let Some(prefix_len) = lower
                .strip_suffix(unit.as_str())
                .map(str::len)
                .filter(|n| *n > 0 && last.is_char_boundary(*n))
            else {
                continue;
            };
            let prefix = &last[..prefix_len];
            let glued = unit.chars().any(|c| !c.is_alphabetic())
                || prefix.chars().last().is_some_and(|c| !c.is_alphabetic());
            if glued {
                self.unit = last[prefix_len..].to_string();
                let rest = prefix.trim_end_matches(|c: char| !c.is_alphanumeric()).to_string();
                match self.words.last_mut() {
                    Some(word) if !rest.is_empty() => *word = rest,
                    _ => {
                        self.words.pop();
                    }
                }
                return;
            }
        }
    }

    fn description(&self) -> String {
        self.words.join(" ")
    }

    /// Rightmost number, the row total.
    fn total(&self) -> Decimal {
        self.from_right(1)
    }

    fn unit_price(&self) -> Decimal {
        self.from_right(2)
    }

    fn quantity(&self) -> Decimal {
        match self.numbers.len() {
            n if n >= 4 => self.from_right(4),
            3 => self.from_right(3),
            _ => Decimal::ZERO,
        }
    }

    fn from_right(&self, position: usize) -> Decimal {
        self.numbers
            .len()
            .checked_sub(position)
            .map(|i| self.numbers[i])
            .unwrap_or(Decimal::ZERO)
    }
}

/// Index of the row's sequence label: the first token, or the second when the
/// first is pure punctuation (a bullet or dash).
fn label_index(texts: &[&str]) -> Option<usize> {
    let is_label = |t: &str| is_sequence_marker(t) && !is_dot_grouped(t);
    match texts {
        [first, ..] if is_label(*first) => Some(0),
        [first, second, ..]
            if !first.chars().any(char::is_alphanumeric) && is_label(*second) =>
        {
            Some(1)
        }
        _ => None,
    }
}

/// Classify one reconstructed PDF row against the current parser state.
pub fn step(
    state: ParserState,
    row: &ReconstructedRow,
    rules: &PdfRules,
) -> (ParserState, RowOutcome) {
    let joined = row.joined_text().to_lowercase();
    match section_marker(&[joined.as_str()]) {
        Some(SectionMarker::EnterRecap) => {
            debug!(origin = %row.origin, "entering recap section");
            return (state.enter(SectionMode::Recap), RowOutcome::Consumed);
        }
        Some(SectionMarker::LeaveRecap) => {
            if state.mode == SectionMode::Recap {
                return (state.enter(SectionMode::Preamble), RowOutcome::Consumed);
            }
            return (state, RowOutcome::Consumed);
        }
        None => {}
    }

    if state.mode == SectionMode::Recap {
        return (state, RowOutcome::Skipped(SkipReason::Recap));
    }

    let layout = RowLayout::read(row, rules);
    let description = layout.description();

    // Captions like "Jumlah Total Pekerjaan Fisik" hit header keywords too,
    // so only number-free rows can be headers.
    if layout.numbers.is_empty() && HeaderScan::scan(&row.lowercase_cells()).is_header() {
        debug!(origin = %row.origin, "column header row");
        return (
            ParserState {
                mode: SectionMode::Detail,
                ..state
            },
            RowOutcome::Consumed,
        );
    }

    if is_group_label(&layout.sequence_label) {
        return (
            state,
            RowOutcome::Emit(LineItem::Header {
                sequence_label: layout.sequence_label,
                description,
            }),
        );
    }

    if layout.numbers.len() < 2 || description.is_empty() || is_skip_caption(&description) {
        let reason = if description.is_empty()
            || is_skip_caption(&description)
            || mentions_total(&description, PDF_TOTAL_KEYWORDS)
        {
            SkipReason::Caption
        } else {
            SkipReason::Noise
        };
        return (observe_caption(state, &layout, &description), RowOutcome::Skipped(reason));
    }

    let quantity = layout.quantity();
    let unit_price = layout.unit_price();
    if !qualifies_as_item(quantity, unit_price, Decimal::ZERO) {
        let state = observe_caption(state, &layout, &description);
        return (state, RowOutcome::Skipped(SkipReason::Noise));
    }

    let item = LineItem::Item {
        sequence_label: layout.sequence_label,
        description,
        unit: if layout.unit.is_empty() {
            "-".to_string()
        } else {
            layout.unit
        },
        quantity,
        unit_price,
        tax_rate: rules.tax_rate,
        total_with_tax: rules.tax_rate.apply(quantity * unit_price),
    };
    (state, RowOutcome::Emit(item))
}

fn observe_caption(state: ParserState, layout: &RowLayout, description: &str) -> ParserState {
    if mentions_total(description, PDF_TOTAL_KEYWORDS) {
        state.observe_total(layout.total())
    } else {
        state
    }
}
