// ⚙️ Import Engine - Batch reconciliation pipeline
// Raw row → classify → resolve duplicate → match products → derive amounts →
// attribute profit → normalize → upsert

use serde::{Deserialize, Serialize};

use crate::classifier::TransactionClassifier;
use crate::dedup::{DuplicateMatch, DuplicateResolver};
use crate::derivation::{DerivationMode, TaxEngine};
use crate::matching::{MatchOutcome, MatchOverrides, SimilarityMatcher};
use crate::normalize::PayloadNormalizer;
use crate::profit::ProfitEngine;
use crate::record::{decode_products_blob, RawRecord, RecordError};
use crate::store::{ProductCatalog, TransactionStore};
use crate::transaction::{CanonicalTransaction, LineItem, TransactionType};

// ============================================================================
// BATCH REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateRecord {
    /// Row number of the incoming record that was skipped
    pub row: usize,
    pub hit: DuplicateMatch,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub imported: Vec<CanonicalTransaction>,

    /// Records skipped because they already exist in the store
    pub duplicates: Vec<DuplicateRecord>,

    /// Per-record failures; a bad row never aborts the batch
    pub failures: Vec<RecordError>,

    /// Line items that found no catalog match (warning, not an error)
    pub unmatched_items: usize,

    /// Rows that carried both training and expense signals
    pub mixed_signal_rows: Vec<usize>,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        format!(
            "Imported {} | duplicates {} | failures {} | unmatched items {} | mixed-signal rows {}",
            self.imported.len(),
            self.duplicates.len(),
            self.failures.len(),
            self.unmatched_items,
            self.mixed_signal_rows.len()
        )
    }
}

// ============================================================================
// IMPORT ENGINE
// ============================================================================

pub struct ImportEngine {
    pub classifier: TransactionClassifier,
    pub matcher: SimilarityMatcher,
    pub resolver: DuplicateResolver,
    pub tax_engine: TaxEngine,
    pub profit_engine: ProfitEngine,
    pub normalizer: PayloadNormalizer,

    /// User-confirmed product mappings, consulted before automatic matching
    pub overrides: MatchOverrides,
}

impl ImportEngine {
    /// Engine with default components at the given sales-tax rate
    pub fn new(tax_rate: f64) -> Self {
        ImportEngine {
            classifier: TransactionClassifier::new(),
            matcher: SimilarityMatcher::new(),
            resolver: DuplicateResolver::new(),
            tax_engine: TaxEngine::new(tax_rate),
            profit_engine: ProfitEngine::new(),
            normalizer: PayloadNormalizer::new(),
            overrides: MatchOverrides::new(),
        }
    }

    /// Process a batch of raw records in input order.
    ///
    /// Duplicate detection runs against the store's current contents before
    /// each record, so earlier upserts in the same batch are visible to later
    /// records. Malformed records land in `failures` and the batch continues.
    pub fn process_batch(
        &self,
        records: &[RawRecord],
        store: &mut dyn TransactionStore,
        catalog: &dyn ProductCatalog,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for record in records {
            match self.process_record(record, store, catalog, &mut report) {
                Ok(Some(tx)) => {
                    store.upsert(tx.clone());
                    report.imported.push(tx);
                }
                Ok(None) => {} // duplicate, already recorded
                Err(failure) => report.failures.push(failure),
            }
        }

        report
    }

    /// Run one record through the full pipeline. Returns Ok(None) when the
    /// record duplicates a stored transaction.
    fn process_record(
        &self,
        record: &RawRecord,
        store: &dyn TransactionStore,
        catalog: &dyn ProductCatalog,
        report: &mut BatchReport,
    ) -> Result<Option<CanonicalTransaction>, RecordError> {
        let classification = self.classifier.classify(record);
        if classification.mixed_signals {
            report.mixed_signal_rows.push(record.row_number);
        }

        let existing = store.transactions();
        if let Some(hit) = self.resolver.find_existing_match(
            record,
            classification.transaction_type,
            &existing,
        ) {
            report.duplicates.push(DuplicateRecord {
                row: record.row_number,
                hit,
            });
            return Ok(None);
        }

        let products = self.resolve_line_items(record, catalog, report)?;

        let natural_total: f64 = products.iter().map(|p| p.revenue()).sum();
        let (total, mode) = self.derivation_inputs(record, &classification, natural_total);
        let amounts = self.tax_engine.derive(total, mode);

        let mut tx = self
            .normalizer
            .normalize(record, &classification, &amounts, products)?;

        if !tx.products.is_empty() {
            tx.profit = Some(self.profit_engine.attribute_profit(&tx, catalog));
        }

        Ok(Some(tx))
    }

    /// Decode and catalog-match the record's line items. API line items take
    /// precedence over the string-encoded products blob.
    fn resolve_line_items(
        &self,
        record: &RawRecord,
        catalog: &dyn ProductCatalog,
        report: &mut BatchReport,
    ) -> Result<Vec<LineItem>, RecordError> {
        let mut items: Vec<LineItem> = Vec::new();

        if !record.line_items.is_empty() {
            for raw in &record.line_items {
                let mut line = LineItem::from_unit_price(&raw.name, raw.quantity, raw.price);
                // variant_id / sku are direct catalog-linking keys
                let linked = raw
                    .variant_id
                    .as_deref()
                    .and_then(|id| catalog.find_by_id(id))
                    .or_else(|| raw.sku.as_deref().and_then(|id| catalog.find_by_id(id)));
                match linked {
                    Some(product) => {
                        line.catalog_id = Some(product.id);
                        line.catalog_name = Some(product.name);
                    }
                    None => report.unmatched_items += 1,
                }
                items.push(line);
            }
            return Ok(items);
        }

        let blob = match record.products_blob.as_deref() {
            Some(blob) => blob,
            None => return Ok(items),
        };

        let candidates = catalog.active_products();
        for mut line in decode_products_blob(blob, record.row_number)? {
            match self.matcher.resolve(&self.overrides, &candidates, &line.name) {
                MatchOutcome::Matched(hit) => {
                    if !hit.product.name.eq_ignore_ascii_case(&line.name) {
                        line.original_name = Some(line.name.clone());
                        line.name = hit.product.name.clone();
                    }
                    // Simple-form blobs carry no price; take the catalog's
                    if line.unit_price == 0.0 {
                        line.unit_price = hit.product.retail_price;
                        line.total_price = line.unit_price * line.quantity;
                    }
                    line.catalog_id = Some(hit.product.id);
                    line.catalog_name = Some(hit.product.name);
                }
                // Potential hits stay unmatched here; they are for humans
                MatchOutcome::Potential(_) | MatchOutcome::Unmatched => {
                    report.unmatched_items += 1;
                }
            }
            items.push(line);
        }

        Ok(items)
    }

    /// Pick the total to derive from and the derivation mode.
    fn derivation_inputs(
        &self,
        record: &RawRecord,
        classification: &crate::classifier::Classification,
        natural_total: f64,
    ) -> (f64, DerivationMode) {
        // Agency-billed training is tax-exempt pass-through, ahead of the
        // standard inclusive formula
        if classification.transaction_type == TransactionType::Training {
            let agency = record
                .training_agency
                .as_deref()
                .map(|a| !a.trim().is_empty())
                .unwrap_or(false);
            if agency {
                let total = record.total.or(record.revenue).unwrap_or(natural_total);
                return (total, DerivationMode::AgencyExempt);
            }
        }

        match record.total {
            // Manual total alongside itemized products: tip/discount rules
            Some(total) if natural_total > 0.0 => {
                (total, DerivationMode::WithNaturalTotal(natural_total))
            }
            Some(total) => (total, DerivationMode::Standard),
            None => {
                // Fall back through revenue, line items, then expense columns
                let total = record
                    .revenue
                    .filter(|&r| r > 0.0)
                    .unwrap_or_else(|| {
                        if natural_total > 0.0 {
                            natural_total
                        } else {
                            record.wholesale_cost.unwrap_or(0.0)
                                + record.expense_amounts.values().sum::<f64>()
                        }
                    });
                (total, DerivationMode::Standard)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RawDate, RawLineItem, RecordSource};
    use crate::store::{InMemoryCatalog, InMemoryStore};
    use crate::transaction::CatalogProduct;

    const NYC_RATE: f64 = 0.08875;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new(vec![
            CatalogProduct {
                id: "p1".to_string(),
                name: "Dog Treats".to_string(),
                retail_price: 12.0,
                last_purchase_price: None,
                average_cost: Some(5.0),
            },
            CatalogProduct {
                id: "p2".to_string(),
                name: "Leash".to_string(),
                retail_price: 25.0,
                last_purchase_price: Some(11.0),
                average_cost: None,
            },
        ])
    }

    fn sale_record(row: usize) -> RawRecord {
        let mut r = RawRecord::new(RecordSource::Excel);
        r.row_number = row;
        r.date = Some(RawDate::Text("01/15/2025".to_string()));
        r.total = Some(108.75);
        r.revenue = Some(108.75);
        r.customer = Some("Jane Doe".to_string());
        r
    }

    #[test]
    fn test_batch_imports_good_rows_and_reports_bad_ones() {
        let engine = ImportEngine::new(NYC_RATE);
        let mut store = InMemoryStore::new();

        let mut bad = sale_record(2);
        bad.date = None; // will fail in the normalizer

        let report = engine.process_batch(&[sale_record(1), bad], &mut store, &catalog());

        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].row, 2);
        assert_eq!(report.failures[0].field, "date");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_records_are_skipped_not_reimported() {
        let engine = ImportEngine::new(NYC_RATE);
        let mut store = InMemoryStore::new();

        let mut first = sale_record(1);
        first.external_id = Some("ORDER-9".to_string());
        let mut again = sale_record(2);
        again.external_id = Some("ORDER-9".to_string());

        let report = engine.process_batch(&[first, again], &mut store, &catalog());

        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].row, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_simple_blob_products_match_catalog_and_take_retail_price() {
        let engine = ImportEngine::new(NYC_RATE);
        let mut store = InMemoryStore::new();

        let mut r = sale_record(1);
        r.total = None;
        r.revenue = None;
        r.products_blob = Some(r#"{"dog treats": 2}"#.to_string());

        let report = engine.process_batch(&[r], &mut store, &catalog());
        assert_eq!(report.imported.len(), 1);

        let tx = &report.imported[0];
        assert_eq!(tx.products.len(), 1);
        assert_eq!(tx.products[0].catalog_id.as_deref(), Some("p1"));
        assert_eq!(tx.products[0].unit_price, 12.0);
        assert_eq!(tx.amount, 24.0);
        assert!(tx.profit.is_some());
    }

    #[test]
    fn test_unmatched_blob_product_is_a_warning_not_an_error() {
        let engine = ImportEngine::new(NYC_RATE);
        let mut store = InMemoryStore::new();

        let mut r = sale_record(1);
        r.products_blob = Some(r#"{"zzqx widget": {"qty": 1, "spend": 30.0}}"#.to_string());

        let report = engine.process_batch(&[r], &mut store, &catalog());
        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.unmatched_items, 1);
        let profit = report.imported[0].profit.as_ref().unwrap();
        assert_eq!(profit.items_without_cost, 1);
    }

    #[test]
    fn test_manual_total_above_itemized_total_becomes_tip() {
        let engine = ImportEngine::new(NYC_RATE);
        let mut store = InMemoryStore::new();

        let mut r = sale_record(1);
        r.total = Some(55.0);
        r.revenue = None;
        r.products_blob = Some(r#"{"dog treats": {"qty": 1, "spend": 50.0}}"#.to_string());

        let report = engine.process_batch(&[r], &mut store, &catalog());
        let tx = &report.imported[0];
        assert_eq!(tx.tip, 5.0);
        assert_eq!(tx.discount, 0.0);
        assert_eq!(tx.amount, 55.0);
        assert!(tx.amount_invariant_holds());
    }

    #[test]
    fn test_api_line_items_link_by_variant_id() {
        let engine = ImportEngine::new(NYC_RATE);
        let mut store = InMemoryStore::new();

        let mut r = sale_record(1);
        r.source = RecordSource::Shopify;
        r.external_id = Some("SH-1".to_string());
        r.total = None;
        r.revenue = None;
        r.line_items = vec![RawLineItem {
            name: "Leash (red)".to_string(),
            quantity: 1.0,
            price: 25.0,
            variant_id: Some("p2".to_string()),
            sku: None,
        }];

        let report = engine.process_batch(&[r], &mut store, &catalog());
        let tx = &report.imported[0];
        assert_eq!(tx.products[0].catalog_id.as_deref(), Some("p2"));
        assert_eq!(tx.id, "shopify_SH-1");
    }

    #[test]
    fn test_agency_training_is_tax_exempt() {
        let engine = ImportEngine::new(NYC_RATE);
        let mut store = InMemoryStore::new();

        let mut r = sale_record(1);
        r.total = Some(150.0);
        r.revenue = Some(150.0);
        r.customer = None;
        r.training_client = Some("Jane Doe".to_string());
        r.training_agency = Some("Pawsability".to_string());

        let report = engine.process_batch(&[r], &mut store, &catalog());
        let tx = &report.imported[0];
        assert_eq!(tx.transaction_type, TransactionType::Training);
        assert_eq!(tx.tax_amount, 0.0);
        assert_eq!(tx.pre_tax_amount, 150.0);
        assert!(!tx.is_taxable);
    }

    #[test]
    fn test_mixed_signal_rows_are_flagged() {
        let engine = ImportEngine::new(NYC_RATE);
        let mut store = InMemoryStore::new();

        let mut r = sale_record(3);
        r.revenue = None;
        r.training_client = Some("Jane Doe".to_string());
        r.supplier = Some("Acme Kibble Co".to_string());
        r.supplier_order_number = Some("PO-1".to_string());

        let report = engine.process_batch(&[r], &mut store, &catalog());
        assert_eq!(report.mixed_signal_rows, vec![3]);
        assert_eq!(report.imported[0].transaction_type, TransactionType::Training);
    }

    #[test]
    fn test_expense_total_falls_back_to_category_columns() {
        use crate::record::ExpenseCategory;
        let engine = ImportEngine::new(NYC_RATE);
        let mut store = InMemoryStore::new();

        let mut r = RawRecord::new(RecordSource::Excel);
        r.row_number = 1;
        r.date = Some(RawDate::Text("01/15/2025".to_string()));
        r.expense_amounts.insert(ExpenseCategory::Software, 29.99);
        r.expense_amounts.insert(ExpenseCategory::Shipping, 10.01);

        let report = engine.process_batch(&[r], &mut store, &catalog());
        let tx = &report.imported[0];
        assert_eq!(tx.transaction_type, TransactionType::Expense);
        assert_eq!(tx.amount, 40.0);
    }
}
