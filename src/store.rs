// 🗄️ Collaborator Interfaces - Transaction store and product catalog
// The engine performs no I/O itself; callers supply these seams

use std::collections::HashMap;

use crate::transaction::{CanonicalTransaction, CatalogProduct};

// ============================================================================
// TRAITS
// ============================================================================

/// External transaction store. Query results are unordered sequences.
pub trait TransactionStore {
    /// All persisted transactions, for the duplicate resolver to scan
    fn transactions(&self) -> Vec<CanonicalTransaction>;

    /// Insert or replace by internal id
    fn upsert(&mut self, transaction: CanonicalTransaction);
}

/// External product catalog. The engine only reads it, never mutates.
pub trait ProductCatalog {
    /// All active products, for similarity matching
    fn active_products(&self) -> Vec<CatalogProduct>;

    /// Cost lookup by catalog id
    fn find_by_id(&self, id: &str) -> Option<CatalogProduct>;
}

// ============================================================================
// IN-MEMORY IMPLEMENTATIONS (tests + demo binary)
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryStore {
    by_id: HashMap<String, CanonicalTransaction>,
    order: Vec<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl TransactionStore for InMemoryStore {
    fn transactions(&self) -> Vec<CanonicalTransaction> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }

    fn upsert(&mut self, transaction: CanonicalTransaction) {
        if !self.by_id.contains_key(&transaction.id) {
            self.order.push(transaction.id.clone());
        }
        self.by_id.insert(transaction.id.clone(), transaction);
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: Vec<CatalogProduct>,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<CatalogProduct>) -> Self {
        InMemoryCatalog { products }
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn active_products(&self) -> Vec<CatalogProduct> {
        self.products.clone()
    }

    fn find_by_id(&self, id: &str) -> Option<CatalogProduct> {
        self.products.iter().find(|p| p.id == id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordSource;
    use crate::transaction::{TransactionStatus, TransactionType};
    use chrono::Utc;

    fn tx(id: &str) -> CanonicalTransaction {
        CanonicalTransaction {
            id: id.to_string(),
            external_id: None,
            source: RecordSource::Manual,
            transaction_type: TransactionType::Sale,
            date: Utc::now(),
            amount: 10.0,
            pre_tax_amount: 9.18,
            tax_amount: 0.82,
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

    #[test]
    fn test_upsert_replaces_by_id() {
        let mut store = InMemoryStore::new();
        store.upsert(tx("a"));
        let mut updated = tx("a");
        updated.amount = 20.0;
        store.upsert(updated);
        assert_eq!(store.len(), 1);
        assert_eq!(store.transactions()[0].amount, 20.0);
    }

    #[test]
    fn test_catalog_find_by_id() {
        let catalog = InMemoryCatalog::new(vec![CatalogProduct {
            id: "p1".to_string(),
            name: "Dog Treats".to_string(),
            retail_price: 12.0,
            last_purchase_price: None,
            average_cost: Some(5.0),
        }]);
        assert!(catalog.find_by_id("p1").is_some());
        assert!(catalog.find_by_id("p2").is_none());
    }
}
