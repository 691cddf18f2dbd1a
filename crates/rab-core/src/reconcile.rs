use rust_decimal::Decimal;
use tracing::info;

use crate::model::{AnalysisResult, LineItem, SkippedRow};

/// Running document-total candidate.
///
/// Keeps the largest caption value observed rather than the last one, so a
/// grand total printed below its sub-totals wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TotalTracker {
    largest: Option<Decimal>,
}

impl TotalTracker {
    pub fn observe(self, candidate: Decimal) -> TotalTracker {
        if candidate <= Decimal::ZERO {
            return self;
        }
        match self.largest {
            Some(current) if current >= candidate => self,
            _ => TotalTracker {
                largest: Some(candidate),
            },
        }
    }

    /// Largest candidate seen, 0 when no caption carried a value.
    pub fn value(&self) -> Decimal {
        self.largest.unwrap_or(Decimal::ZERO)
    }
}

/// Sum extracted item totals and compare them with the declared total.
pub fn reconcile(
    items: Vec<LineItem>,
    document_total: TotalTracker,
    skipped_rows: Vec<SkippedRow>,
) -> AnalysisResult {
    let extracted_total: Decimal = items.iter().filter_map(LineItem::total_with_tax).sum();
    let document_total = document_total.value();
    let difference = (document_total - extracted_total).abs();

    info!(
        items = items.len(),
        skipped = skipped_rows.len(),
        %document_total,
        %extracted_total,
        %difference,
        "reconciled extracted items against document total"
    );

    AnalysisResult {
        items,
        document_total,
        extracted_total,
        difference,
        skipped_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaxRate;
    use rust_decimal_macros::dec;

    fn item(total: Decimal) -> LineItem {
        LineItem::Item {
            sequence_label: "1".into(),
            description: "Pekerjaan".into(),
            unit: "ls".into(),
            quantity: Decimal::ONE,
            unit_price: total,
            tax_rate: TaxRate::default(),
            total_with_tax: total,
        }
    }

    #[test]
    fn test_tracker_keeps_maximum() {
        let tracker = TotalTracker::default()
            .observe(dec!(500000))
            .observe(dec!(1200000))
            .observe(dec!(700000));
        assert_eq!(tracker.value(), dec!(1200000));
    }

    #[test]
    fn test_tracker_ignores_non_positive() {
        let tracker = TotalTracker::default().observe(Decimal::ZERO);
        assert_eq!(tracker, TotalTracker::default());
        assert_eq!(tracker.value(), Decimal::ZERO);
    }

    #[test]
    fn test_reconcile_sums_items_only() {
        let items = vec![
            LineItem::Header {
                sequence_label: "I".into(),
                description: "PEKERJAAN PERSIAPAN".into(),
            },
            item(dec!(111000)),
            item(dec!(222000)),
        ];
        let result = reconcile(items, TotalTracker::default().observe(dec!(333500)), vec![]);
        assert_eq!(result.extracted_total, dec!(333000));
        assert_eq!(result.difference, dec!(500));
    }

    #[test]
    fn test_no_caption_difference_equals_extracted() {
        let result = reconcile(vec![item(dec!(555000))], TotalTracker::default(), vec![]);
        assert_eq!(result.document_total, Decimal::ZERO);
        assert_eq!(result.difference, result.extracted_total);
        assert!(!result.has_document_total());
    }

    #[test]
    fn test_empty_result_is_valid() {
        let result = reconcile(vec![], TotalTracker::default(), vec![]);
        assert!(result.items.is_empty());
        assert_eq!(result.extracted_total, Decimal::ZERO);
        assert_eq!(result.difference, Decimal::ZERO);
    }
}
