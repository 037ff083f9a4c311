// 📦 Payload Normalizer - Assemble the canonical transaction shape
// Pure assembly: classified type + derived amounts + resolved line items in,
// CanonicalTransaction out. Missing required fields are surfaced, never guessed.

use uuid::Uuid;

use crate::classifier::Classification;
use crate::derivation::DerivedAmounts;
use crate::record::{RawRecord, RecordError};
use crate::transaction::{
    round2, CanonicalTransaction, LineItem, TransactionStatus, TransactionType,
};

// ============================================================================
// NORMALIZER
// ============================================================================

pub struct PayloadNormalizer {
    /// Trainer name forced onto training rows that arrive without one
    pub default_trainer: String,

    /// Documented default when a row carries no payment method
    pub default_payment_method: String,
}

impl PayloadNormalizer {
    pub fn new() -> Self {
        PayloadNormalizer {
            default_trainer: "Lead Trainer".to_string(),
            default_payment_method: "Unknown".to_string(),
        }
    }

    /// Assemble a CanonicalTransaction from the upstream components' outputs.
    ///
    /// Amounts arrive at full precision and are rounded to 2 decimals here,
    /// the point of storage. The canonical amount is
    /// `pre_tax + tax + tip − discount`, so the amount invariant holds by
    /// construction.
    pub fn normalize(
        &self,
        record: &RawRecord,
        classification: &Classification,
        amounts: &DerivedAmounts,
        products: Vec<LineItem>,
    ) -> Result<CanonicalTransaction, RecordError> {
        let row = record.row_number;

        let date = record
            .date
            .as_ref()
            .and_then(|d| d.parse())
            .ok_or_else(|| RecordError {
                row,
                field: "date".to_string(),
                message: "Missing or unparseable date".to_string(),
            })?;
        let date = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| RecordError {
                row,
                field: "date".to_string(),
                message: "Date has no valid midnight timestamp".to_string(),
            })?
            .and_utc();

        let rounded = amounts.rounded();
        let amount = round2(rounded.amount());

        let mut tx = CanonicalTransaction {
            id: self.internal_id(record),
            external_id: record.external_id.clone(),
            source: record.source,
            transaction_type: classification.transaction_type,
            date,
            amount,
            pre_tax_amount: rounded.pre_tax,
            tax_amount: rounded.tax,
            is_taxable: rounded.tax > 0.0,
            tip: rounded.tip,
            discount: rounded.discount,
            supplier: None,
            supplier_order_number: None,
            customer: None,
            client_name: None,
            dog_name: None,
            trainer: None,
            training_agency: None,
            products,
            payment_method: record
                .payment_method
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| self.default_payment_method.clone()),
            notes: record.notes.clone(),
            status: TransactionStatus::Completed,
            profit: None,
        };

        // Type-specific field mapping: exactly one field group is populated
        match classification.transaction_type {
            TransactionType::Expense => {
                tx.supplier = non_empty(&record.supplier);
                tx.supplier_order_number = non_empty(&record.supplier_order_number);
            }
            TransactionType::Sale => {
                tx.customer = non_empty(&record.customer);
            }
            TransactionType::Training => {
                tx.client_name =
                    Some(non_empty(&record.training_client).ok_or_else(|| RecordError {
                        row,
                        field: "client".to_string(),
                        message: "Training row without a client name".to_string(),
                    })?);
                tx.dog_name = non_empty(&record.dog_name);
                tx.training_agency = non_empty(&record.training_agency);
                tx.trainer = Some(
                    non_empty(&record.trainer).unwrap_or_else(|| self.default_trainer.clone()),
                );
            }
        }

        Ok(tx)
    }

    /// Internal id: sources that prefix their ids get `prefix + external id`
    /// so re-imports resolve through the prefix-normalization dedup strategy;
    /// everything else gets a fresh UUID.
    fn internal_id(&self, record: &RawRecord) -> String {
        match (record.source.id_prefix(), record.external_id.as_deref()) {
            (Some(prefix), Some(ext)) if ext.starts_with(prefix) => ext.to_string(),
            (Some(prefix), Some(ext)) => format!("{}{}", prefix, ext),
            _ => Uuid::new_v4().to_string(),
        }
    }
}

impl Default for PayloadNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

// ============================================================================
// TESTS
// ============================================================================
