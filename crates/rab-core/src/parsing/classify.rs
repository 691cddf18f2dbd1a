//! Row-level heuristics shared by the spreadsheet and PDF adapters.
//!
//! Everything here is a pure function of the row text, so both adapters
//! classify section markers, header rows, group headers and captions the same
//! way regardless of how the row was reconstructed.

use regex::Regex;
use rust_decimal::Decimal;
use std::sync::LazyLock;

static GROUP_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[IVXLC]+$").expect("valid roman numeral pattern"));

static SEQUENCE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)*\.?$").expect("valid sequence code pattern"));

/// Captions that never carry a line item.
pub const SKIP_CAPTIONS: &[&str] = &[
    "uraian pekerjaan",
    "sub jumlah",
    "ppn 11%",
    "jumlah total pekerjaan fisik",
    "dibulatkan",
    "terbilang",
    "sub total",
    "subtotal",
];

/// Caption keywords that mark a document-total candidate in spreadsheets.
pub const SHEET_TOTAL_KEYWORDS: &[&str] = &["total", "jumlah total", "dibulatkan"];

/// Caption keywords that mark a document-total candidate in PDFs.
pub const PDF_TOTAL_KEYWORDS: &[&str] = &["total", "jumlah"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionMarker {
    /// A "rekapitulasi" caption: category roll-ups follow.
    EnterRecap,
    /// A "rencana anggaran biaya" title without "rekapitulasi" on the row.
    LeaveRecap,
}

/// Detect recap-section boundaries from lower-cased cell text.
pub fn section_marker<S: AsRef<str>>(cells: &[S]) -> Option<SectionMarker> {
    if cells.iter().any(|c| c.as_ref().contains("rekapitulasi")) {
        Some(SectionMarker::EnterRecap)
    } else if cells
        .iter()
        .any(|c| c.as_ref().contains("rencana anggaran biaya"))
    {
        Some(SectionMarker::LeaveRecap)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    Sequence,
    Description,
    Unit,
    Quantity,
    UnitPrice,
    Amount,
}

/// Keyword-based role of a header cell, if any.
///
/// "harga" is disambiguated by its neighbours: "harga satuan" is the unit
/// price, "jumlah harga" / "total harga" the amount, a bare "harga" the unit
/// price.
pub fn role_for_cell(cell: &str) -> Option<ColumnRole> {
    let c = cell.trim().to_lowercase();
    if c.is_empty() {
        return None;
    }

    if c == "no" || c == "no." {
        return Some(ColumnRole::Sequence);
    }
    if c.contains("vol") {
        return Some(ColumnRole::Quantity);
    }
    if c.contains("harga") {
        if c.contains("satuan") {
            return Some(ColumnRole::UnitPrice);
        }
        if c.contains("jumlah") || c.contains("total") {
            return Some(ColumnRole::Amount);
        }
        return Some(ColumnRole::UnitPrice);
    }
    if c.contains("jumlah") || c.contains("total") {
        return Some(ColumnRole::Amount);
    }

    let bare = c.trim_end_matches('.');
    if bare == "sat" || bare == "satuan" {
        return Some(ColumnRole::Unit);
    }
    if c.contains("uraian") || c.contains("barang") || c.contains("pekerjaan") {
        return Some(ColumnRole::Description);
    }

    None
}

/// Role hits found in one row, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderScan {
    pub hits: Vec<(usize, ColumnRole)>,
}

impl HeaderScan {
    pub fn scan<S: AsRef<str>>(cells: &[S]) -> HeaderScan {
        let hits = cells
            .iter()
            .enumerate()
            .filter_map(|(i, c)| role_for_cell(c.as_ref()).map(|role| (i, role)))
            .collect();
        HeaderScan { hits }
    }

    /// Number of distinct keyword groups hit. Unit price and amount count as
    /// one group.
    pub fn keyword_groups(&self) -> usize {
        let mut groups = [false; 5];
        for (_, role) in &self.hits {
            let group = match role {
                ColumnRole::Sequence => 0,
                ColumnRole::Description => 1,
                ColumnRole::Unit => 2,
                ColumnRole::Quantity => 3,
                ColumnRole::UnitPrice | ColumnRole::Amount => 4,
            };
            groups[group] = true;
        }
        groups.iter().filter(|g| **g).count()
    }

    pub fn is_header(&self) -> bool {
        self.keyword_groups() >= 2
    }
}

/// Roman-numeral group label such as "I", "iv" or "XII." (trailing dot allowed).
pub fn is_group_label(label: &str) -> bool {
    let bare = label.trim().trim_end_matches('.');
    !bare.is_empty() && GROUP_LABEL.is_match(bare)
}

/// Pure numeric item code such as "3", "2.1" or "4.".
pub fn is_sequence_code(token: &str) -> bool {
    SEQUENCE_CODE.is_match(token.trim())
}

/// Text that reads as a row label rather than a description: empty, at most
/// three characters, a numeric code, or ending in a dot.
pub fn is_marker_like(text: &str) -> bool {
    let t = text.trim();
    t.is_empty() || t.chars().count() <= 3 || is_sequence_code(t) || t.ends_with('.')
}

/// Token usable as a PDF row's sequence label: a numeric code, a Roman
/// numeral, or a short lettered marker like "a.".
pub fn is_sequence_marker(token: &str) -> bool {
    let t = token.trim();
    if t.is_empty() {
        return false;
    }
    is_sequence_code(t) || is_group_label(t) || (t.chars().count() <= 3 && t.ends_with('.'))
}

/// Sub-total, tax and rounding captions that never carry a line item.
pub fn is_skip_caption(description: &str) -> bool {
    let d = description.trim().trim_end_matches(':').trim().to_lowercase();
    SKIP_CAPTIONS.iter().any(|caption| {
        d == *caption
            || d.strip_prefix(caption)
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| !c.is_alphanumeric())
    })
}

/// Template column-numbering row: sequence "1", description "2", unit "3".
pub fn is_placeholder_row(sequence: &str, description: &str, unit: &str) -> bool {
    sequence.trim() == "1" && description.trim() == "2" && unit.trim() == "3"
}

/// Whether a row's description marks a document-total candidate.
pub fn mentions_total(description: &str, keywords: &[&str]) -> bool {
    let d = description.to_lowercase();
    keywords.iter().any(|k| d.contains(k))
}

/// A row becomes an item only with a positive quantity and either a positive
/// unit price or a positive explicit amount.
pub fn qualifies_as_item(quantity: Decimal, unit_price: Decimal, amount: Decimal) -> bool {
    quantity > Decimal::ZERO && (unit_price > Decimal::ZERO || amount > Decimal::ZERO)
}
