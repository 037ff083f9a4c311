// 📒 Canonical Transaction Model
// The persisted shape every import path converges on

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::RecordSource;

// ============================================================================
// TRANSACTION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Sale,
    Expense,
    Training,
}

impl TransactionType {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            TransactionType::Sale => "Sale",
            TransactionType::Expense => "Expense",
            TransactionType::Training => "Training",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
    Cancelled,
    Refunded,
}

// ============================================================================
// LINE ITEM
// ============================================================================

/// One product/expense line within a transaction.
///
/// Invariant: `total_price ≈ unit_price × quantity`, unless the total came
/// straight from a detailed-format "spend" field, in which case unit_price is
/// the derived value `total_price / quantity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Display name (possibly a raw unmatched string)
    pub name: String,

    /// Quantity, may be fractional (e.g. 0.5 lb of treats)
    pub quantity: f64,

    pub unit_price: f64,
    pub total_price: f64,

    /// Catalog reference when similarity matching resolved this line
    pub catalog_id: Option<String>,
    pub catalog_name: Option<String>,

    /// Pre-match name, kept when matching overrode the display name
    pub original_name: Option<String>,
}

impl LineItem {
    /// Build a line from unit price and quantity
    pub fn from_unit_price(name: &str, quantity: f64, unit_price: f64) -> Self {
        LineItem {
            name: name.to_string(),
            quantity,
            unit_price,
            total_price: unit_price * quantity,
            catalog_id: None,
            catalog_name: None,
            original_name: None,
        }
    }

    /// Build a line from a total spend, deriving the unit price.
    /// Zero quantity is guarded: unit price falls back to the spend itself.
    pub fn from_spend(name: &str, quantity: f64, spend: f64) -> Self {
        let unit_price = if quantity.abs() > f64::EPSILON {
            spend / quantity
        } else {
            spend
        };
        LineItem {
            name: name.to_string(),
            quantity,
            unit_price,
            total_price: spend,
            catalog_id: None,
            catalog_name: None,
            original_name: None,
        }
    }

    /// Revenue this line contributes to the parent transaction
    pub fn revenue(&self) -> f64 {
        self.total_price
    }
}

// ============================================================================
// CANONICAL TRANSACTION
// ============================================================================

/// The persisted transaction shape.
///
/// Invariants:
/// - `amount ≈ pre_tax_amount + tax_amount + tip − discount` (2 decimal places)
/// - exactly one of the supplier / customer / training field groups is
///   populated, matching `transaction_type`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    /// Internal id (UUID, assigned by the normalizer)
    pub id: String,

    /// External-source id, used for dedup (Square/Shopify order id, etc.)
    pub external_id: Option<String>,

    /// Which channel produced this transaction; drives the card-fee model
    pub source: RecordSource,

    pub transaction_type: TransactionType,
    pub date: DateTime<Utc>,

    /// Total, tax-inclusive
    pub amount: f64,
    pub pre_tax_amount: f64,
    pub tax_amount: f64,
    pub is_taxable: bool,
    pub tip: f64,
    pub discount: f64,

    // Expense-only fields
    pub supplier: Option<String>,
    pub supplier_order_number: Option<String>,

    // Sale/training fields
    pub customer: Option<String>,
    pub client_name: Option<String>,
    pub dog_name: Option<String>,
    pub trainer: Option<String>,
    pub training_agency: Option<String>,

    pub products: Vec<LineItem>,
    pub payment_method: String,
    pub notes: Option<String>,
    pub status: TransactionStatus,

    /// Advisory, recomputable — never treated as authoritative once stale
    pub profit: Option<ProfitCalculation>,
}

impl CanonicalTransaction {
    /// Check the amount invariant at 2-decimal precision
    pub fn amount_invariant_holds(&self) -> bool {
        let derived = round2(self.pre_tax_amount + self.tax_amount + self.tip - self.discount);
        (derived - round2(self.amount)).abs() < 0.005
    }

    /// Sum of line-item revenue (the "natural" total before tip/discount)
    pub fn natural_total(&self) -> f64 {
        self.products.iter().map(|p| p.revenue()).sum()
    }
}

// ============================================================================
// CATALOG PRODUCT (external collaborator entity, read-only here)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    pub retail_price: f64,
    pub last_purchase_price: Option<f64>,
    pub average_cost: Option<f64>,
}

impl CatalogProduct {
    /// Best available cost proxy: average cost, falling back to last purchase
    pub fn unit_cost(&self) -> Option<f64> {
        self.average_cost.or(self.last_purchase_price)
    }
}

// ============================================================================
// PROFIT CALCULATION (derived state)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemProfit {
    pub name: String,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub has_cost_data: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitCalculation {
    pub items: Vec<ItemProfit>,
    pub total_revenue: f64,
    pub total_cost: f64,

    /// Authoritative aggregate: revenue − cost − tax − fees.
    /// The per-item sum is informational and may differ by rounding.
    pub total_profit: f64,

    pub items_without_cost: usize,
    pub credit_card_fees: f64,
}

impl ProfitCalculation {
    pub fn summary(&self) -> String {
        format!(
            "Revenue ${:.2}, cost ${:.2}, fees ${:.2}, profit ${:.2} ({} items without cost data)",
            self.total_revenue,
            self.total_cost,
            self.credit_card_fees,
            self.total_profit,
            self.items_without_cost
        )
    }
}

// ============================================================================
// ROUNDING
// ============================================================================

/// Round to 2 decimal places at the point of storage.
/// Intermediate math keeps full precision to avoid compounding error.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// TESTS
// ============================================================================
