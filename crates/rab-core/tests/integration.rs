//! Integration tests for the analyze_spreadsheet() / analyze_pdf() pipelines.
//!
//! Uses a MockDecoder and a MockExtractor that return pre-built grids and
//! pages, so these tests run without a real workbook or poppler-utils.

use rab_core::config::{parse_config_str, ExtractionConfig};
use rab_core::error::RabError;
use rab_core::extraction::{
    CellValue, PageContent, PdfExtractor, SheetGrid, SpreadsheetDecoder, TextFragment,
};
use rab_core::model::{LineItem, RowOrigin, SkipReason};
use rab_core::{analyze_pdf, analyze_spreadsheet, AnalyzeOptions, CancelFlag};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

struct MockDecoder {
    grid: SheetGrid,
}

impl SpreadsheetDecoder for MockDecoder {
    fn decode(&self, _bytes: &[u8], sheet: Option<&str>) -> Result<SheetGrid, RabError> {
        match sheet {
            Some(name) if name != self.grid.sheet_name => Err(RabError::SheetNotFound {
                name: name.to_string(),
                available: self.grid.sheet_names.join(", "),
            }),
            _ => Ok(self.grid.clone()),
        }
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

struct MockExtractor {
    pages: Vec<PageContent>,
}

impl PdfExtractor for MockExtractor {
    fn extract_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<PageContent>, RabError> {
        Ok(self.pages.clone())
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

struct FailingDecoder;

impl SpreadsheetDecoder for FailingDecoder {
    fn decode(&self, _bytes: &[u8], _sheet: Option<&str>) -> Result<SheetGrid, RabError> {
        Err(RabError::Spreadsheet("failed to open workbook: corrupt".into()))
    }

    fn backend_name(&self) -> &str {
        "failing"
    }
}

fn text(s: &str) -> CellValue {
    CellValue::from(s)
}

fn num(n: i64) -> CellValue {
    CellValue::from(n)
}

const EMPTY: CellValue = CellValue::Empty;

/// Words laid out left to right on one line at height `y`.
fn line(y: f32, words: &[&str]) -> Vec<TextFragment> {
    words
        .iter()
        .enumerate()
        .map(|(i, w)| TextFragment::new(*w, 40.0 + 50.0 * i as f32, y))
        .collect()
}

fn page(number: usize, lines: Vec<Vec<TextFragment>>) -> PageContent {
    PageContent {
        page_number: number,
        fragments: lines.into_iter().flatten().collect(),
    }
}

fn budget_grid() -> SheetGrid {
    SheetGrid::new(
        "RAB",
        vec![
            vec![text("RENCANA ANGGARAN BIAYA")],
            vec![text("Pekerjaan: Renovasi Gedung Kantor")],
            vec![
                text("No"),
                text("Uraian Pekerjaan"),
                text("Sat"),
                text("Volume"),
                text("Harga Satuan"),
                text("Jumlah Harga"),
            ],
            vec![num(1), num(2), num(3), num(4), num(5), num(6)],
            vec![text("I"), text("PEKERJAAN PERSIAPAN")],
            vec![
                num(1),
                text("Pembersihan Lokasi"),
                text("ls"),
                num(1),
                num(1_500_000),
                num(1_500_000),
            ],
            vec![
                num(2),
                text("Pekerjaan Tanah"),
                text("m3"),
                num(10),
                num(50_000),
                EMPTY,
            ],
            vec![
                num(3),
                text("Urugan (hitungan sementara)"),
                text("m3"),
                num(4),
                num(120_000),
                num(480_000),
            ],
            vec![],
            vec![
                EMPTY,
                text("Jumlah Total Pekerjaan Fisik"),
                EMPTY,
                EMPTY,
                EMPTY,
                num(2_220_000),
            ],
            vec![text("REKAPITULASI")],
            vec![text("I"), text("PEKERJAAN PERSIAPAN"), EMPTY, EMPTY, EMPTY, num(1_665_000)],
            vec![EMPTY, text("TOTAL"), EMPTY, EMPTY, EMPTY, num(9_999_999)],
        ],
    )
    .with_hidden_rows(&[7])
}

fn budget_pages() -> Vec<PageContent> {
    // page 2 first: pages must still come out in page order
    vec![
        page(
            2,
            vec![
                line(780.0, &["2", "Pekerjaan", "Pondasi", "m3", "5", "100.000", "555.000"]),
                line(700.0, &["Jumlah", "Total", "2.220.000"]),
            ],
        ),
        page(
            1,
            vec![
                line(720.0, &["1", "Pembersihan", "Lokasi", "ls", "1", "1.500.000", "1.665.000"]),
                line(800.0, &["RENCANA", "ANGGARAN", "BIAYA"]),
                line(740.0, &["I", "PEKERJAAN", "PERSIAPAN"]),
                line(
                    760.0,
                    &["No", "Uraian", "Pekerjaan", "Sat", "Vol", "Harga", "Satuan", "Jumlah"],
                ),
            ],
        ),
    ]
}

// ---------------------------------------------------------------------------
// Spreadsheet pipeline
// ---------------------------------------------------------------------------
#[test]
fn spreadsheet_budget_end_to_end() {
    let decoder = MockDecoder {
        grid: budget_grid(),
    };
    let result = analyze_spreadsheet(&[], &decoder, &AnalyzeOptions::default()).unwrap();

    let labels: Vec<&str> = result.items.iter().map(LineItem::sequence_label).collect();
    assert_eq!(labels, vec!["I", "1", "2"]);
    assert!(result.items[0].is_header());
    assert_eq!(result.items[1].total_with_tax(), Some(dec!(1665000)));
    assert_eq!(result.items[2].total_with_tax(), Some(dec!(555000)));
    assert_eq!(result.item_count(), 2);

    // the recap "TOTAL 9.999.999" is never a candidate
    assert_eq!(result.document_total, dec!(2220000));
    assert_eq!(result.extracted_total, dec!(2220000));
    assert_eq!(result.difference, Decimal::ZERO);
    assert!(result.matches_within(Decimal::ONE));
}

#[test]
fn hidden_rows_are_excluded_and_reported() {
    let decoder = MockDecoder {
        grid: budget_grid(),
    };
    let result = analyze_spreadsheet(&[], &decoder, &AnalyzeOptions::default()).unwrap();

    assert!(result
        .items
        .iter()
        .all(|item| !item.description().starts_with("Urugan")));
    let hidden: Vec<_> = result
        .skipped_rows
        .iter()
        .filter(|s| s.reason == SkipReason::Hidden)
        .collect();
    assert_eq!(hidden.len(), 1);
    assert_eq!(hidden[0].origin, RowOrigin::Sheet { row: 7 });

    let reasons: Vec<SkipReason> = result.skipped_rows.iter().map(|s| s.reason).collect();
    assert!(reasons.contains(&SkipReason::Placeholder));
    assert!(reasons.contains(&SkipReason::Preamble));
    assert_eq!(
        reasons.iter().filter(|r| **r == SkipReason::Recap).count(),
        2
    );
}

#[test]
fn configured_tax_rate_is_applied() {
    let decoder = MockDecoder {
        grid: budget_grid(),
    };
    let config = parse_config_str(r#"{"tax_rate_percent": "12"}"#).unwrap();
    let result =
        analyze_spreadsheet(&[], &decoder, &AnalyzeOptions::with_config(config)).unwrap();

    assert_eq!(result.items[2].total_with_tax(), Some(dec!(560000)));
    let LineItem::Item { tax_rate, .. } = &result.items[2] else {
        panic!("expected item");
    };
    assert_eq!(tax_rate.to_string(), "12%");
}

#[test]
fn missing_sheet_is_an_error() {
    let decoder = MockDecoder {
        grid: budget_grid(),
    };
    let config = ExtractionConfig {
        sheet: Some("Rekap".into()),
        ..ExtractionConfig::default()
    };
    let err = analyze_spreadsheet(&[], &decoder, &AnalyzeOptions::with_config(config)).unwrap_err();
    assert!(matches!(err, RabError::SheetNotFound { .. }));
}

#[test]
fn decoder_failure_propagates() {
    let err = analyze_spreadsheet(b"garbage", &FailingDecoder, &AnalyzeOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("corrupt"));
}

#[test]
fn invalid_config_rejected_before_decoding() {
    let config = ExtractionConfig {
        tax_rate_percent: dec!(150),
        ..ExtractionConfig::default()
    };
    let decoder = MockDecoder {
        grid: budget_grid(),
    };
    let err = analyze_spreadsheet(&[], &decoder, &AnalyzeOptions::with_config(config)).unwrap_err();
    assert!(matches!(err, RabError::ConfigInvalid(_)));
}

#[test]
fn sheet_without_items_is_a_valid_empty_result() {
    let decoder = MockDecoder {
        grid: SheetGrid::new(
            "Sheet1",
            vec![vec![text("Daftar Harga Bahan")], vec![text("Semen"), num(65_000)]],
        ),
    };
    let result = analyze_spreadsheet(&[], &decoder, &AnalyzeOptions::default()).unwrap();
    assert!(result.items.is_empty());
    assert_eq!(result.document_total, Decimal::ZERO);
    assert_eq!(result.extracted_total, Decimal::ZERO);
    assert_eq!(result.difference, Decimal::ZERO);
    assert!(!result.has_document_total());
}

#[test]
fn missing_total_caption_leaves_difference_equal_to_extracted() {
    let decoder = MockDecoder {
        grid: SheetGrid::new(
            "RAB",
            vec![
                vec![text("No"), text("Uraian"), text("Sat"), text("Vol"), text("Harga")],
                vec![num(1), text("Pekerjaan Tanah"), text("m3"), num(10), num(50_000)],
            ],
        ),
    };
    let result = analyze_spreadsheet(&[], &decoder, &AnalyzeOptions::default()).unwrap();
    assert_eq!(result.extracted_total, dec!(555000));
    assert_eq!(result.document_total, Decimal::ZERO);
    assert_eq!(result.difference, result.extracted_total);
    assert!(!result.matches_within(dec!(1000000)));
}

#[test]
fn cancelled_analysis_returns_error() {
    let decoder = MockDecoder {
        grid: budget_grid(),
    };
    let options = AnalyzeOptions::default();
    options.cancel.cancel();
    let err = analyze_spreadsheet(&[], &decoder, &options).unwrap_err();
    assert!(matches!(err, RabError::Cancelled { rows_processed: 0 }));
}

#[test]
fn repeated_runs_are_identical() {
    let decoder = MockDecoder {
        grid: budget_grid(),
    };
    let first = analyze_spreadsheet(&[], &decoder, &AnalyzeOptions::default()).unwrap();
    let second = analyze_spreadsheet(&[], &decoder, &AnalyzeOptions::default()).unwrap();
    assert_eq!(first, second);

    let extractor = MockExtractor {
        pages: budget_pages(),
    };
    let first = analyze_pdf(&[], &extractor, &AnalyzeOptions::default()).unwrap();
    let second = analyze_pdf(&[], &extractor, &AnalyzeOptions::default()).unwrap();
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// PDF pipeline
// ---------------------------------------------------------------------------
#[test]
fn pdf_budget_end_to_end() {
    let extractor = MockExtractor {
        pages: budget_pages(),
    };
    let result = analyze_pdf(&[], &extractor, &AnalyzeOptions::default()).unwrap();

    assert_eq!(result.items.len(), 3);
    assert_eq!(
        result.items[0],
        LineItem::Header {
            sequence_label: "I".into(),
            description: "PEKERJAAN PERSIAPAN".into(),
        }
    );

    let LineItem::Item {
        description,
        unit,
        quantity,
        unit_price,
        total_with_tax,
        ..
    } = &result.items[2]
    else {
        panic!("expected item");
    };
    assert_eq!(description, "Pekerjaan Pondasi");
    assert_eq!(unit, "m3");
    assert_eq!(*quantity, dec!(5));
    assert_eq!(*unit_price, dec!(100000));
    assert_eq!(*total_with_tax, dec!(555000));

    assert_eq!(result.items[1].description(), "Pembersihan Lokasi");
    assert_eq!(result.document_total, dec!(2220000));
    assert_eq!(result.extracted_total, dec!(2220000));
    assert_eq!(result.difference, Decimal::ZERO);
}

#[test]
fn pdf_difference_is_absolute() {
    let extractor = MockExtractor {
        pages: vec![page(
            1,
            vec![
                line(700.0, &["1", "Galian", "m3", "10", "50.000", "555.000"]),
                line(650.0, &["Total", "500.000"]),
            ],
        )],
    };
    let result = analyze_pdf(&[], &extractor, &AnalyzeOptions::default()).unwrap();
    assert_eq!(result.extracted_total, dec!(555000));
    assert_eq!(result.document_total, dec!(500000));
    assert_eq!(result.difference, dec!(55000));
}

#[test]
fn pdf_grand_total_caption_is_detected() {
    let extractor = MockExtractor {
        pages: vec![page(
            1,
            vec![
                line(
                    760.0,
                    &["No", "Uraian", "Pekerjaan", "Sat", "Vol", "Harga", "Satuan", "Jumlah"],
                ),
                line(720.0, &["1", "Pembersihan", "Lokasi", "ls", "1", "1.500.000", "1.665.000"]),
                line(680.0, &["JUMLAH", "TOTAL", "PEKERJAAN", "FISIK", "1.665.000"]),
            ],
        )],
    };
    let result = analyze_pdf(&[], &extractor, &AnalyzeOptions::default()).unwrap();

    assert_eq!(result.item_count(), 1);
    assert_eq!(result.document_total, dec!(1665000));
    assert_eq!(result.difference, Decimal::ZERO);
    assert!(result
        .skipped_rows
        .iter()
        .any(|s| s.reason == SkipReason::Caption && s.text.contains("PEKERJAAN FISIK")));
}

#[test]
fn pdf_without_text_yields_empty_result() {
    let extractor = MockExtractor {
        pages: vec![page(1, vec![])],
    };
    let result = analyze_pdf(&[], &extractor, &AnalyzeOptions::default()).unwrap();
    assert!(result.items.is_empty());
    assert!(result.skipped_rows.is_empty());
}

#[test]
fn cancel_flag_is_shared_between_clones() {
    let flag = CancelFlag::new();
    let options = AnalyzeOptions {
        cancel: flag.clone(),
        ..AnalyzeOptions::default()
    };
    flag.cancel();
    let extractor = MockExtractor {
        pages: budget_pages(),
    };
    let err = analyze_pdf(&[], &extractor, &options).unwrap_err();
    assert!(matches!(err, RabError::Cancelled { .. }));
}

#[test]
fn result_serializes_with_tagged_items() {
    let extractor = MockExtractor {
        pages: budget_pages(),
    };
    let result = analyze_pdf(&[], &extractor, &AnalyzeOptions::default()).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["items"][0]["kind"], "header");
    assert_eq!(json["items"][1]["kind"], "item");
    assert_eq!(json["items"][1]["tax_rate"], "11%");
}
