// 🔁 Duplicate Resolver - Decide whether an incoming record already exists
// Four strategies tried in order, first hit wins

use serde::{Deserialize, Serialize};

use crate::record::RawRecord;
use crate::transaction::{CanonicalTransaction, TransactionType};

// ============================================================================
// MATCH TYPE & STRATEGY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Id-based or supplier+order-number match: safe to skip re-import
    Exact,

    /// Supplier+amount only: queue for human review before skipping
    Probable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStrategy {
    /// Record's external id equals a stored external id
    ExternalId,

    /// Record's external id equals a stored internal id
    InternalId,

    /// Match after applying/stripping the source's id prefix
    PrefixNormalized,

    /// Expense-only: supplier AND order number both equal
    SupplierOrder,

    /// Expense-only: supplier equal AND amount equal, no order number
    SupplierAmount,
}

// ============================================================================
// DUPLICATE MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateMatch {
    /// Internal id of the stored transaction that matched
    pub transaction_id: String,

    /// Position in the supplied existing-transaction sequence
    pub index: usize,

    pub match_type: MatchType,
    pub strategy: MatchStrategy,

    /// Human-readable reason
    pub reason: String,
}

// ============================================================================
// DUPLICATE RESOLVER
// ============================================================================

pub struct DuplicateResolver {
    /// Tolerance for amount equality in the supplier+amount strategy
    pub amount_tolerance: f64,
}

impl DuplicateResolver {
    pub fn new() -> Self {
        DuplicateResolver {
            amount_tolerance: 0.001,
        }
    }

    /// Find a stored transaction this record duplicates, or None if the
    /// record should be imported as new. Deterministic: same inputs always
    /// produce the same match.
    pub fn find_existing_match(
        &self,
        record: &RawRecord,
        record_type: TransactionType,
        existing: &[CanonicalTransaction],
    ) -> Option<DuplicateMatch> {
        if let Some(m) = self.match_by_external_id(record, existing) {
            return Some(m);
        }
        if let Some(m) = self.match_by_internal_id(record, existing) {
            return Some(m);
        }
        if let Some(m) = self.match_by_prefix(record, existing) {
            return Some(m);
        }
        if record_type == TransactionType::Expense {
            if let Some(m) = self.match_by_supplier(record, existing) {
                return Some(m);
            }
        }
        None
    }

    /// Strategy 1: record external id == stored external id
    fn match_by_external_id(
        &self,
        record: &RawRecord,
        existing: &[CanonicalTransaction],
    ) -> Option<DuplicateMatch> {
        let ext = record.external_id.as_deref()?;
        existing
            .iter()
            .enumerate()
            .find(|(_, tx)| tx.external_id.as_deref() == Some(ext))
            .map(|(index, tx)| DuplicateMatch {
                transaction_id: tx.id.clone(),
                index,
                match_type: MatchType::Exact,
                strategy: MatchStrategy::ExternalId,
                reason: format!("External id match: {}", ext),
            })
    }

    /// Strategy 2: record external id == stored internal id
    fn match_by_internal_id(
        &self,
        record: &RawRecord,
        existing: &[CanonicalTransaction],
    ) -> Option<DuplicateMatch> {
        let ext = record.external_id.as_deref()?;
        existing
            .iter()
            .enumerate()
            .find(|(_, tx)| tx.id == ext)
            .map(|(index, tx)| DuplicateMatch {
                transaction_id: tx.id.clone(),
                index,
                match_type: MatchType::Exact,
                strategy: MatchStrategy::InternalId,
                reason: format!("Internal id match: {}", ext),
            })
    }

    /// Strategy 3: try both the prefixed and unprefixed forms of the id
    /// against stored internal and external ids
    fn match_by_prefix(
        &self,
        record: &RawRecord,
        existing: &[CanonicalTransaction],
    ) -> Option<DuplicateMatch> {
        let ext = record.external_id.as_deref()?;
        let prefix = record.source.id_prefix()?;

        let mut variants: Vec<String> = vec![format!("{}{}", prefix, ext)];
        if let Some(stripped) = ext.strip_prefix(prefix) {
            variants.push(stripped.to_string());
        }

        for variant in &variants {
            if let Some((index, tx)) = existing.iter().enumerate().find(|(_, tx)| {
                tx.id == *variant || tx.external_id.as_deref() == Some(variant.as_str())
            }) {
                return Some(DuplicateMatch {
                    transaction_id: tx.id.clone(),
                    index,
                    match_type: MatchType::Exact,
                    strategy: MatchStrategy::PrefixNormalized,
                    reason: format!("Prefix-normalized id match: {} ≈ {}", ext, variant),
                });
            }
        }
        None
    }

    /// Strategy 4 (expense-only): supplier equality required in all cases,
    /// then either the order numbers match (exact) or the amounts match
    /// (probable).
    fn match_by_supplier(
        &self,
        record: &RawRecord,
        existing: &[CanonicalTransaction],
    ) -> Option<DuplicateMatch> {
        let supplier = record.supplier.as_deref().map(str::trim)?;
        if supplier.is_empty() {
            return None;
        }

        for (index, tx) in existing.iter().enumerate() {
            let tx_supplier = match tx.supplier.as_deref().map(str::trim) {
                Some(s) if !s.is_empty() => s,
                _ => continue,
            };
            if !tx_supplier.eq_ignore_ascii_case(supplier) {
                continue;
            }

            let order_match = match (
                record.supplier_order_number.as_deref().map(str::trim),
                tx.supplier_order_number.as_deref().map(str::trim),
            ) {
                (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => a == b,
                _ => false,
            };
            if order_match {
                return Some(DuplicateMatch {
                    transaction_id: tx.id.clone(),
                    index,
                    match_type: MatchType::Exact,
                    strategy: MatchStrategy::SupplierOrder,
                    reason: format!("Supplier + order number match: {}", supplier),
                });
            }

            let amount_match = record
                .total
                .map(|t| (t - tx.amount).abs() <= self.amount_tolerance)
                .unwrap_or(false);
            if amount_match {
                return Some(DuplicateMatch {
                    transaction_id: tx.id.clone(),
                    index,
                    match_type: MatchType::Probable,
                    strategy: MatchStrategy::SupplierAmount,
                    reason: format!(
                        "Supplier + amount match: {} | ${:.2}",
                        supplier, tx.amount
                    ),
                });
            }
        }
        None
    }
}

impl Default for DuplicateResolver {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordSource;
    use crate::transaction::{TransactionStatus, TransactionType};
    use chrono::Utc;

    fn stored(id: &str, external_id: Option<&str>) -> CanonicalTransaction {
        CanonicalTransaction {
            id: id.to_string(),
            external_id: external_id.map(|s| s.to_string()),
            source: RecordSource::Manual,
            transaction_type: TransactionType::Sale,
            date: Utc::now(),
            amount: 100.0,
            pre_tax_amount: 91.85,
            tax_amount: 8.15,
            is_taxable: true,
            tip: 0.0,
            discount: 0.0,
            supplier: None,
            supplier_order_number: None,
            customer: None,
            client_name: None,
            dog_name: None,
            trainer: None,
            training_agency: None,
            products: vec![],
            payment_method: "Unknown".to_string(),
            notes: None,
            status: TransactionStatus::Completed,
            profit: None,
        }
    }

    fn stored_expense(id: &str, supplier: &str, order: Option<&str>, amount: f64) -> CanonicalTransaction {
        let mut tx = stored(id, None);
        tx.transaction_type = TransactionType::Expense;
        tx.supplier = Some(supplier.to_string());
        tx.supplier_order_number = order.map(|s| s.to_string());
        tx.amount = amount;
        tx
    }

    fn incoming(external_id: &str, source: RecordSource) -> RawRecord {
        let mut r = RawRecord::new(source);
        r.external_id = Some(external_id.to_string());
        r.total = Some(100.0);
        r
    }

    #[test]
    fn test_external_id_match() {
        let resolver = DuplicateResolver::new();
        let existing = vec![stored("tx1", Some("ABC123"))];
        let record = incoming("ABC123", RecordSource::Square);
        let m = resolver
            .find_existing_match(&record, TransactionType::Sale, &existing)
            .unwrap();
        assert_eq!(m.strategy, MatchStrategy::ExternalId);
        assert_eq!(m.match_type, MatchType::Exact);
        assert_eq!(m.transaction_id, "tx1");
    }

    #[test]
    fn test_internal_id_match() {
        let resolver = DuplicateResolver::new();
        let existing = vec![stored("ABC123", None)];
        let record = incoming("ABC123", RecordSource::Manual);
        let m = resolver
            .find_existing_match(&record, TransactionType::Sale, &existing)
            .unwrap();
        assert_eq!(m.strategy, MatchStrategy::InternalId);
    }

    #[test]
    fn test_prefix_normalized_match() {
        // Incoming "ABC123" from Square, stored internal id "square_ABC123"
        let resolver = DuplicateResolver::new();
        let existing = vec![stored("square_ABC123", None)];
        let record = incoming("ABC123", RecordSource::Square);
        let m = resolver
            .find_existing_match(&record, TransactionType::Sale, &existing)
            .unwrap();
        assert_eq!(m.strategy, MatchStrategy::PrefixNormalized);
        assert_eq!(m.match_type, MatchType::Exact);
    }

    #[test]
    fn test_prefix_stripping_direction() {
        // Incoming already carries the prefix, stored id does not
        let resolver = DuplicateResolver::new();
        let existing = vec![stored("tx9", Some("ABC123"))];
        let record = incoming("square_ABC123", RecordSource::Square);
        let m = resolver
            .find_existing_match(&record, TransactionType::Sale, &existing)
            .unwrap();
        assert_eq!(m.strategy, MatchStrategy::PrefixNormalized);
    }

    #[test]
    fn test_supplier_order_match_is_exact() {
        let resolver = DuplicateResolver::new();
        let existing = vec![stored_expense("tx1", "Acme Kibble Co", Some("PO-1009"), 250.0)];
        let mut record = RawRecord::new(RecordSource::Excel);
        record.supplier = Some("acme kibble co".to_string());
        record.supplier_order_number = Some("PO-1009".to_string());
        record.total = Some(999.0); // amount differs, order number decides
        let m = resolver
            .find_existing_match(&record, TransactionType::Expense, &existing)
            .unwrap();
        assert_eq!(m.strategy, MatchStrategy::SupplierOrder);
        assert_eq!(m.match_type, MatchType::Exact);
    }

    #[test]
    fn test_supplier_amount_match_is_probable() {
        let resolver = DuplicateResolver::new();
        let existing = vec![stored_expense("tx1", "Acme Kibble Co", None, 250.0)];
        let mut record = RawRecord::new(RecordSource::Excel);
        record.supplier = Some("Acme Kibble Co".to_string());
        record.total = Some(250.0);
        let m = resolver
            .find_existing_match(&record, TransactionType::Expense, &existing)
            .unwrap();
        assert_eq!(m.strategy, MatchStrategy::SupplierAmount);
        assert_eq!(m.match_type, MatchType::Probable);
    }

    #[test]
    fn test_supplier_rules_skip_non_expense_records() {
        let resolver = DuplicateResolver::new();
        let existing = vec![stored_expense("tx1", "Acme Kibble Co", None, 250.0)];
        let mut record = RawRecord::new(RecordSource::Excel);
        record.supplier = Some("Acme Kibble Co".to_string());
        record.total = Some(250.0);
        let m = resolver.find_existing_match(&record, TransactionType::Sale, &existing);
        assert!(m.is_none());
    }

    #[test]
    fn test_no_match_means_import_as_new() {
        let resolver = DuplicateResolver::new();
        let existing = vec![stored("tx1", Some("OTHER"))];
        let record = incoming("ABC123", RecordSource::Manual);
        assert!(resolver
            .find_existing_match(&record, TransactionType::Sale, &existing)
            .is_none());
    }

    #[test]
    fn test_resolver_is_deterministic() {
        let resolver = DuplicateResolver::new();
        let existing = vec![
            stored("tx1", Some("ABC123")),
            stored("tx2", Some("ABC123")),
        ];
        let record = incoming("ABC123", RecordSource::Square);
        let a = resolver
            .find_existing_match(&record, TransactionType::Sale, &existing)
            .unwrap();
        let b = resolver
            .find_existing_match(&record, TransactionType::Sale, &existing)
            .unwrap();
        assert_eq!(a.transaction_id, b.transaction_id);
        assert_eq!(a.transaction_id, "tx1");
    }
}
