// 💰 Profit Attribution - Allocate tax, fees and cost across line items
// proportionally to revenue share

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::record::RecordSource;
use crate::store::ProductCatalog;
use crate::transaction::{round2, CanonicalTransaction, ItemProfit, ProfitCalculation};

// ============================================================================
// CREDIT-CARD FEE MODEL
// ============================================================================

/// Percentage + fixed fee charged by one card processor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessorFee {
    pub rate: f64,
    pub fixed: f64,
}

/// Per-source fee schedule. The fee applies once per transaction, not per
/// line; a cash-equivalent peer-transfer payment method is always exempt
/// regardless of source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub fees: HashMap<RecordSource, ProcessorFee>,

    /// Payment method exempt from processor fees, matched case-insensitively
    pub exempt_payment_method: String,
}

impl FeeSchedule {
    /// Observed processor rates: Square 2.6% + $0.10, Shopify 2.9% + $0.30.
    /// Manual/Gmail/Excel records carry no processor fee.
    pub fn new() -> Self {
        let mut fees = HashMap::new();
        fees.insert(
            RecordSource::Square,
            ProcessorFee {
                rate: 0.026,
                fixed: 0.10,
            },
        );
        fees.insert(
            RecordSource::Shopify,
            ProcessorFee {
                rate: 0.029,
                fixed: 0.30,
            },
        );
        FeeSchedule {
            fees,
            exempt_payment_method: "venmo".to_string(),
        }
    }

    /// Fee for one transaction
    pub fn fee_for(&self, source: RecordSource, payment_method: &str, amount: f64) -> f64 {
        if payment_method.trim().eq_ignore_ascii_case(&self.exempt_payment_method) {
            return 0.0;
        }
        match self.fees.get(&source) {
            Some(fee) => amount * fee.rate + fee.fixed,
            None => 0.0,
        }
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// PROFIT ENGINE
// ============================================================================

pub struct ProfitEngine {
    pub fee_schedule: FeeSchedule,
}

impl ProfitEngine {
    pub fn new() -> Self {
        ProfitEngine {
            fee_schedule: FeeSchedule::new(),
        }
    }

    /// Compute the profit breakdown for a transaction.
    ///
    /// Pure over its inputs: recomputation is idempotent and never mutates
    /// the transaction or the catalog. Items whose line resolves to a catalog
    /// product with a known cost contribute to cost/profit; items without
    /// cost data still count toward revenue and are tallied separately.
    ///
    /// The aggregate `total_profit = revenue − cost − tax − fees` is the
    /// authoritative figure; per-item profits are informational and may not
    /// sum to it exactly because of rounding.
    pub fn attribute_profit(
        &self,
        transaction: &CanonicalTransaction,
        catalog: &dyn ProductCatalog,
    ) -> ProfitCalculation {
        let total_revenue: f64 = transaction.products.iter().map(|p| p.revenue()).sum();
        let total_tax = transaction.tax_amount;
        let total_fee = self.fee_schedule.fee_for(
            transaction.source,
            &transaction.payment_method,
            transaction.amount,
        );

        let mut items = Vec::with_capacity(transaction.products.len());
        let mut total_cost = 0.0;
        let mut items_without_cost = 0;

        for line in &transaction.products {
            let revenue = line.revenue();

            // Zero-revenue items (and empty transactions) take zero share;
            // never divide by zero here
            let share = if total_revenue > 0.0 && revenue > 0.0 {
                revenue / total_revenue
            } else {
                0.0
            };
            let tax_share = total_tax * share;
            let fee_share = total_fee * share;

            let unit_cost = line
                .catalog_id
                .as_deref()
                .and_then(|id| catalog.find_by_id(id))
                .and_then(|p| p.unit_cost());

            match unit_cost {
                Some(cost_each) => {
                    let cost = cost_each * line.quantity;
                    total_cost += cost;
                    items.push(ItemProfit {
                        name: line.name.clone(),
                        revenue: round2(revenue),
                        cost: round2(cost),
                        profit: round2(revenue - cost - tax_share - fee_share),
                        has_cost_data: true,
                    });
                }
                None => {
                    items_without_cost += 1;
                    items.push(ItemProfit {
                        name: line.name.clone(),
                        revenue: round2(revenue),
                        cost: 0.0,
                        profit: 0.0,
                        has_cost_data: false,
                    });
                }
            }
        }

        ProfitCalculation {
            items,
            total_revenue: round2(total_revenue),
            total_cost: round2(total_cost),
            total_profit: round2(total_revenue - total_cost - total_tax - total_fee),
            items_without_cost,
            credit_card_fees: round2(total_fee),
        }
    }
}

impl Default for ProfitEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
