// 🏷️ Transaction Classifier - Decide sale / expense / training from raw signals
// Total function: every row classifies to exactly one type, no "unknown"

use serde::{Deserialize, Serialize};

use crate::record::RawRecord;
use crate::transaction::TransactionType;

// ============================================================================
// CLASSIFICATION RESULT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub transaction_type: TransactionType,

    /// True when the row carried both a training signal and an expense signal.
    /// Training wins by fixed priority; the flag marks the row for human
    /// review since the heuristic is lossy.
    pub mixed_signals: bool,
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct TransactionClassifier;

impl TransactionClassifier {
    pub fn new() -> Self {
        TransactionClassifier
    }

    /// Classify a raw record, in priority order:
    /// 1. non-empty training-client field → training
    /// 2. expense heuristic → expense
    /// 3. everything else → sale
    pub fn classify(&self, record: &RawRecord) -> Classification {
        let expense_signal = self.is_expense(record);

        let has_training_client = record
            .training_client
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false);

        if has_training_client {
            return Classification {
                transaction_type: TransactionType::Training,
                mixed_signals: expense_signal,
            };
        }

        let transaction_type = if expense_signal {
            TransactionType::Expense
        } else {
            TransactionType::Sale
        };

        Classification {
            transaction_type,
            mixed_signals: false,
        }
    }

    /// Expense heuristic: revenue zero/absent AND at least one of
    /// (a) positive wholesale cost, (b) supplier name + order number both
    /// present, (c) any positive named expense-category amount.
    fn is_expense(&self, record: &RawRecord) -> bool {
        if record.has_revenue() {
            return false;
        }

        let wholesale = record.wholesale_cost.map(|c| c > 0.0).unwrap_or(false);

        let supplier_pair = record
            .supplier
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
            && record
                .supplier_order_number
                .as_deref()
                .map(|n| !n.trim().is_empty())
                .unwrap_or(false);

        let category_amount = record.expense_amounts.values().any(|&v| v > 0.0);

        wholesale || supplier_pair || category_amount
    }
}

impl Default for TransactionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
