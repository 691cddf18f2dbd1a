use rab_core::model::{AnalysisResult, LineItem};
use rust_decimal::Decimal;

const HEADINGS: [&str; 7] = ["No", "Uraian", "Sat", "Vol", "Harga Satuan", "PPN", "Jumlah"];

/// Columns after the description are right-aligned.
const NUMERIC_FROM: usize = 3;

/// Differences below one rupiah are rounding ("dibulatkan"), not a mismatch.
const MATCH_TOLERANCE: Decimal = Decimal::ONE;

pub fn print(result: &AnalysisResult, show_skipped: bool) {
    print!("{}", format_result(result, show_skipped));
}

pub fn format_result(result: &AnalysisResult, show_skipped: bool) -> String {
    let rows: Vec<[String; 7]> = result.items.iter().map(item_cells).collect();

    let mut widths = HEADINGS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    if rows.is_empty() {
        out.push_str("No line items found.\n");
    } else {
        out.push_str(&format_line(&HEADINGS.map(String::from), &widths));
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&rule.join("  "));
        out.push('\n');
        for row in &rows {
            out.push_str(&format_line(row, &widths));
        }
    }

    out.push('\n');
    out.push_str(&format!("  Items:           {}\n", result.item_count()));
    out.push_str(&format!("  Extracted total: {}\n", money(result.extracted_total)));
    if result.has_document_total() {
        out.push_str(&format!("  Document total:  {}\n", money(result.document_total)));
        out.push_str(&format!("  Difference:      {}\n", money(result.difference)));
        let status = if result.matches_within(MATCH_TOLERANCE) {
            "MATCH"
        } else {
            "MISMATCH"
        };
        out.push_str(&format!("  Status:          {status}\n"));
    } else {
        out.push_str("  Document total:  not found\n");
    }

    if show_skipped && !result.skipped_rows.is_empty() {
        out.push_str(&format!("\n  Skipped rows ({}):\n", result.skipped_rows.len()));
        for skipped in &result.skipped_rows {
            out.push_str(&format!(
                "    {:<16} {:<26} {}\n",
                skipped.origin.to_string(),
                skipped.reason.to_string(),
                skipped.text
            ));
        }
    }

    out
}

fn item_cells(item: &LineItem) -> [String; 7] {
    match item {
        LineItem::Header {
            sequence_label,
            description,
        } => [
            sequence_label.clone(),
            description.clone(),
            "-".into(),
            "-".into(),
            "-".into(),
            "-".into(),
            "-".into(),
        ],
        LineItem::Item {
            sequence_label,
            description,
            unit,
            quantity,
            unit_price,
            tax_rate,
            total_with_tax,
        } => [
            sequence_label.clone(),
            description.clone(),
            unit.clone(),
            quantity.normalize().to_string(),
            money(*unit_price),
            tax_rate.to_string(),
            money(*total_with_tax),
        ],
    }
}

fn format_line(cells: &[String; 7], widths: &[usize; 7]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, width))| {
            let width = *width;
            if i >= NUMERIC_FROM {
                format!("{cell:>width$}")
            } else {
                format!("{cell:<width$}")
            }
        })
        .collect();
    format!("{}\n", padded.join("  ").trim_end())
}

/// Amount rounded to two decimals, trailing zeros dropped.
fn money(value: Decimal) -> String {
    value.round_dp(2).normalize().to_string()
}
