// 🧾 Tax/Amount Derivation - Split tax-inclusive totals into pre-tax, tax,
// tip and discount
// Core rule: preTax = total / (1 + rate), tax = total − preTax

use serde::{Deserialize, Serialize};

use crate::transaction::round2;

// ============================================================================
// DERIVED AMOUNTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedAmounts {
    pub pre_tax: f64,
    pub tax: f64,
    pub tip: f64,
    pub discount: f64,
}

impl DerivedAmounts {
    /// The canonical stored amount: pre-tax + tax + tip − discount.
    /// Defined this way so the amount invariant holds by construction.
    pub fn amount(&self) -> f64 {
        self.pre_tax + self.tax + self.tip - self.discount
    }

    /// Round every component to 2 decimals for storage. Intermediate math
    /// stays at full precision until this point.
    pub fn rounded(&self) -> Self {
        DerivedAmounts {
            pre_tax: round2(self.pre_tax),
            tax: round2(self.tax),
            tip: round2(self.tip),
            discount: round2(self.discount),
        }
    }
}

// ============================================================================
// DERIVATION MODE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DerivationMode {
    /// Plain inclusive-tax split of the total
    Standard,

    /// A manually entered total alongside the natural (line-item) total.
    /// Excess over natural becomes tip; shortfall becomes discount.
    WithNaturalTotal(f64),

    /// Training revenue billed through a designated agency: tax-exempt
    /// pass-through, sale == revenue. Takes precedence over the standard
    /// inclusive formula.
    AgencyExempt,
}

// ============================================================================
// TAX ENGINE
// ============================================================================

pub struct TaxEngine {
    /// Sales-tax rate embedded in tax-inclusive totals.
    /// Jurisdiction-specific configuration (NYC retail: 0.08875).
    pub tax_rate: f64,
}

impl TaxEngine {
    pub fn new(tax_rate: f64) -> Self {
        TaxEngine { tax_rate }
    }

    /// Derive pre-tax / tax / tip / discount from a tax-inclusive total.
    /// Pure function: identical inputs always yield identical output.
    pub fn derive(&self, total: f64, mode: DerivationMode) -> DerivedAmounts {
        match mode {
            DerivationMode::AgencyExempt => DerivedAmounts {
                pre_tax: total,
                tax: 0.0,
                tip: 0.0,
                discount: 0.0,
            },

            DerivationMode::Standard => {
                let (pre_tax, tax) = self.split(total);
                DerivedAmounts {
                    pre_tax,
                    tax,
                    tip: 0.0,
                    discount: 0.0,
                }
            }

            DerivationMode::WithNaturalTotal(natural) => {
                if total > natural {
                    // Excess is tip; tip is not taxed, so the split stays on
                    // the natural total
                    let (pre_tax, tax) = self.split(natural);
                    DerivedAmounts {
                        pre_tax,
                        tax,
                        tip: total - natural,
                        discount: 0.0,
                    }
                } else if total < natural {
                    // Shortfall is discount; tax recomputes from the manual
                    // (discounted) total, not the natural one
                    let (pre_tax, tax) = self.split(total);
                    DerivedAmounts {
                        pre_tax,
                        tax,
                        tip: 0.0,
                        discount: natural - total,
                    }
                } else {
                    let (pre_tax, tax) = self.split(total);
                    DerivedAmounts {
                        pre_tax,
                        tax,
                        tip: 0.0,
                        discount: 0.0,
                    }
                }
            }
        }
    }

    /// Inclusive-tax split: recover the pre-tax base by backward division
    fn split(&self, total: f64) -> (f64, f64) {
        let pre_tax = total / (1.0 + self.tax_rate);
        (pre_tax, total - pre_tax)
    }
}

// ============================================================================
// TESTS
// ============================================================================
