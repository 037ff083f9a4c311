// 📥 Raw Record Layer
// Loosely-typed rows from spreadsheets and external APIs, before classification

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::transaction::LineItem;

// ============================================================================
// RECORD SOURCE
// ============================================================================

/// RecordSource - Identifies which channel a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    Manual,
    Square,
    Shopify,
    Gmail,
    Excel,
}

impl RecordSource {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            RecordSource::Manual => "Manual",
            RecordSource::Square => "Square",
            RecordSource::Shopify => "Shopify",
            RecordSource::Gmail => "Gmail",
            RecordSource::Excel => "Excel",
        }
    }

    /// Literal prefix some sources prepend to internal ids ("square_ABC123")
    pub fn id_prefix(&self) -> Option<&str> {
        match self {
            RecordSource::Square => Some("square_"),
            RecordSource::Shopify => Some("shopify_"),
            _ => None,
        }
    }
}

// ============================================================================
// EXPENSE CATEGORIES
// ============================================================================

/// The fixed set of named expense-category columns a tabular row may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Software,
    Ads,
    Equipment,
    Misc,
    PrintMedia,
    Shipping,
    Transit,
    DryIce,
    Packaging,
    SpaceRental,
    PawsabilityRent,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 12] = [
        ExpenseCategory::Software,
        ExpenseCategory::Ads,
        ExpenseCategory::Equipment,
        ExpenseCategory::Misc,
        ExpenseCategory::PrintMedia,
        ExpenseCategory::Shipping,
        ExpenseCategory::Transit,
        ExpenseCategory::DryIce,
        ExpenseCategory::Packaging,
        ExpenseCategory::SpaceRental,
        ExpenseCategory::PawsabilityRent,
        ExpenseCategory::Other,
    ];

    /// Spreadsheet header this category maps from (lowercase)
    pub fn header(&self) -> &str {
        match self {
            ExpenseCategory::Software => "software",
            ExpenseCategory::Ads => "ads",
            ExpenseCategory::Equipment => "equipment",
            ExpenseCategory::Misc => "misc",
            ExpenseCategory::PrintMedia => "print media",
            ExpenseCategory::Shipping => "shipping",
            ExpenseCategory::Transit => "transit",
            ExpenseCategory::DryIce => "dry ice",
            ExpenseCategory::Packaging => "packaging",
            ExpenseCategory::SpaceRental => "space rental",
            ExpenseCategory::PawsabilityRent => "pawsability rent",
            ExpenseCategory::Other => "other",
        }
    }
}

// ============================================================================
// RAW DATE
// ============================================================================

/// A date as it arrives: text in one of a few formats, or an Excel serial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDate {
    Text(String),
    Serial(f64),
}

impl RawDate {
    /// Parse into a calendar date. Supports MM/DD/YYYY, YYYY-MM-DD, and
    /// Excel serials (epoch 1899-12-30, accounting for the 1900 leap-year bug).
    pub fn parse(&self) -> Option<NaiveDate> {
        match self {
            RawDate::Text(s) => {
                let s = s.trim();
                if let Ok(date) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
                    return Some(date);
                }
                if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    return Some(date);
                }
                None
            }
            RawDate::Serial(serial) => {
                let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
                base.checked_add_signed(chrono::Duration::days(*serial as i64))
            }
        }
    }
}

// ============================================================================
// RAW RECORD
// ============================================================================

/// Pre-normalized line item from an external API payload (Square/Shopify)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLineItem {
    pub name: String,
    pub quantity: f64,
    pub price: f64,
    pub variant_id: Option<String>,
    pub sku: Option<String>,
}

/// RawRecord - an externally sourced, loosely-typed row.
/// Created transiently per import batch; discarded once converted into a
/// CanonicalTransaction or rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub external_id: Option<String>,
    pub date: Option<RawDate>,

    /// Manually entered / source-reported total (tax-inclusive)
    pub total: Option<f64>,

    /// Revenue amount, when the row reports one directly
    pub revenue: Option<f64>,

    pub wholesale_cost: Option<f64>,
    pub expense_amounts: HashMap<ExpenseCategory, f64>,

    /// String-encoded product mapping: `{"name": qty}` or
    /// `{"name": {"qty": n, "spend": x}}`
    pub products_blob: Option<String>,

    /// Pre-normalized API line items (take precedence over the blob)
    pub line_items: Vec<RawLineItem>,

    pub supplier: Option<String>,
    pub supplier_order_number: Option<String>,

    pub customer: Option<String>,
    pub training_client: Option<String>,
    pub dog_name: Option<String>,
    pub trainer: Option<String>,
    pub training_agency: Option<String>,

    pub payment_method: Option<String>,
    pub notes: Option<String>,

    pub source: RecordSource,

    /// Row number in the original file, for error reporting
    pub row_number: usize,
}

impl RawRecord {
    /// Empty record from a given source
    pub fn new(source: RecordSource) -> Self {
        RawRecord {
            external_id: None,
            date: None,
            total: None,
            revenue: None,
            wholesale_cost: None,
            expense_amounts: HashMap::new(),
            products_blob: None,
            line_items: Vec::new(),
            supplier: None,
            supplier_order_number: None,
            customer: None,
            training_client: None,
            dog_name: None,
            trainer: None,
            training_agency: None,
            payment_method: None,
            notes: None,
            source,
            row_number: 0,
        }
    }

    /// True if any revenue was reported on this row
    pub fn has_revenue(&self) -> bool {
        self.revenue.map(|r| r > 0.0).unwrap_or(false)
    }
}

// ============================================================================
// RECORD ERROR (per-record, never aborts a batch)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordError {
    /// Row number in the source file
    pub row: usize,
    /// The specific field that failed to parse or was missing
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}, field '{}': {}", self.row, self.field, self.message)
    }
}

impl std::error::Error for RecordError {}

// ============================================================================
// MONEY PARSING
// ============================================================================

/// Parse a money string: strips `$`, commas and quotes, accepts
/// parenthesized negatives. Returns None on non-numeric input.
pub fn parse_money(raw: &str) -> Option<f64> {
    let s = raw.replace(',', "").replace('"', "").replace('$', "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().map(|v| -v);
    }
    s.parse().ok()
}

// ============================================================================
// PRODUCTS BLOB DECODING
// ============================================================================

/// Decode the string-encoded products mapping into line items.
///
/// Two accepted encodings:
/// - simple:   `{"Dog Treats": 2}` (quantity only, unit price unknown)
/// - detailed: `{"Dog Treats": {"qty": 2, "spend": 25.0}}` ("count" also accepted)
pub fn decode_products_blob(blob: &str, row: usize) -> Result<Vec<LineItem>, RecordError> {
    let value: Value = serde_json::from_str(blob).map_err(|e| RecordError {
        row,
        field: "products".to_string(),
        message: format!("Not a valid product mapping: {}", e),
    })?;

    let map = value.as_object().ok_or_else(|| RecordError {
        row,
        field: "products".to_string(),
        message: "Product mapping must be an object".to_string(),
    })?;

    let mut items = Vec::new();
    for (name, entry) in map {
        match entry {
            // Simple form: quantity only
            Value::Number(n) => {
                let qty = n.as_f64().unwrap_or(0.0);
                items.push(LineItem::from_unit_price(name, qty, 0.0));
            }
            // Detailed form: {count|qty, spend}
            Value::Object(detail) => {
                let qty = detail
                    .get("qty")
                    .or_else(|| detail.get("count"))
                    .and_then(|v| v.as_f64())
                    .ok_or_else(|| RecordError {
                        row,
                        field: "products".to_string(),
                        message: format!("Product '{}' is missing qty/count", name),
                    })?;
                let spend = detail.get("spend").and_then(|v| v.as_f64());
                match spend {
                    Some(spend) => items.push(LineItem::from_spend(name, qty, spend)),
                    None => items.push(LineItem::from_unit_price(name, qty, 0.0)),
                }
            }
            _ => {
                return Err(RecordError {
                    row,
                    field: "products".to_string(),
                    message: format!("Product '{}' has an unrecognized value shape", name),
                })
            }
        }
    }
    Ok(items)
}

// ============================================================================
// ROW MAPPER - fixed header-to-field table
// ============================================================================

/// Maps a generic tabular row (header → cell text) onto a RawRecord.
///
/// Headers are matched case-insensitively against a fixed table. Missing
/// required columns flag the record loudly instead of silently defaulting;
/// the one documented default is payment method → "Unknown" (applied later
/// by the normalizer).
pub struct RowMapper {
    pub source: RecordSource,
}

impl RowMapper {
    pub fn new(source: RecordSource) -> Self {
        RowMapper { source }
    }

    /// Map one row. `cells` keys are the spreadsheet headers.
    pub fn map_row(
        &self,
        row_number: usize,
        cells: &HashMap<String, String>,
    ) -> Result<RawRecord, RecordError> {
        // Normalize headers once
        let lower: HashMap<String, &str> = cells
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim()))
            .collect();

        let mut record = RawRecord::new(self.source);
        record.row_number = row_number;

        record.external_id = lower.get("id").map(|s| s.to_string());

        // Date is required
        let date_cell = lower.get("date").ok_or_else(|| RecordError {
            row: row_number,
            field: "date".to_string(),
            message: "Required column is missing or empty".to_string(),
        })?;
        let raw_date = match date_cell.parse::<f64>() {
            Ok(serial) => RawDate::Serial(serial),
            Err(_) => RawDate::Text(date_cell.to_string()),
        };
        if raw_date.parse().is_none() {
            return Err(RecordError {
                row: row_number,
                field: "date".to_string(),
                message: format!("Unparseable date '{}'", date_cell),
            });
        }
        record.date = Some(raw_date);

        record.total = self.money_field(row_number, &lower, "total")?;
        record.revenue = self.money_field(row_number, &lower, "revenue")?;
        record.wholesale_cost = self.money_field(row_number, &lower, "wholesale cost")?;

        for category in ExpenseCategory::ALL {
            if let Some(amount) = self.money_field(row_number, &lower, category.header())? {
                record.expense_amounts.insert(category, amount);
            }
        }

        // At least one amount column must be present
        if record.total.is_none()
            && record.revenue.is_none()
            && record.wholesale_cost.is_none()
            && record.expense_amounts.is_empty()
        {
            return Err(RecordError {
                row: row_number,
                field: "total".to_string(),
                message: "Row carries no amount in any recognized column".to_string(),
            });
        }

        record.products_blob = lower.get("products").map(|s| s.to_string());
        record.supplier = lower.get("supplier").map(|s| s.to_string());
        record.supplier_order_number = lower.get("order number").map(|s| s.to_string());
        record.customer = lower.get("customer").map(|s| s.to_string());
        record.training_client = lower.get("client").map(|s| s.to_string());
        record.dog_name = lower.get("dog").map(|s| s.to_string());
        record.trainer = lower.get("trainer").map(|s| s.to_string());
        record.training_agency = lower.get("agency").map(|s| s.to_string());
        record.payment_method = lower.get("payment method").map(|s| s.to_string());
        record.notes = lower.get("notes").map(|s| s.to_string());

        Ok(record)
    }

    fn money_field(
        &self,
        row: usize,
        lower: &HashMap<String, &str>,
        header: &str,
    ) -> Result<Option<f64>, RecordError> {
        match lower.get(header) {
            None => Ok(None),
            Some(cell) => parse_money(cell).map(Some).ok_or_else(|| RecordError {
                row,
                field: header.to_string(),
                message: format!("Non-numeric amount '{}'", cell),
            }),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("1,234.56"), Some(1234.56));
        assert_eq!(parse_money("$50.00"), Some(50.0));
        assert_eq!(parse_money("(25.00)"), Some(-25.0));
        assert_eq!(parse_money("  -42.50 "), Some(-42.5));
        assert_eq!(parse_money("not money"), None);
        assert_eq!(parse_money(""), None);
    }

    #[test]
    fn test_raw_date_text_formats() {
        assert_eq!(
            RawDate::Text("01/15/2025".to_string()).parse(),
            NaiveDate::from_ymd_opt(2025, 1, 15)
        );
        assert_eq!(
            RawDate::Text("2025-01-15".to_string()).parse(),
            NaiveDate::from_ymd_opt(2025, 1, 15)
        );
        assert_eq!(RawDate::Text("yesterday".to_string()).parse(), None);
    }

    #[test]
    fn test_raw_date_excel_serial() {
        assert_eq!(
            RawDate::Serial(45667.0).parse(),
            NaiveDate::from_ymd_opt(2025, 1, 10)
        );
    }

    #[test]
    fn test_decode_simple_blob() {
        let items = decode_products_blob(r#"{"Dog Treats": 2}"#, 1).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Dog Treats");
        assert_eq!(items[0].quantity, 2.0);
        assert_eq!(items[0].unit_price, 0.0);
    }

    #[test]
    fn test_decode_detailed_blob() {
        let items =
            decode_products_blob(r#"{"Dog Treats": {"qty": 4, "spend": 50.0}}"#, 1).unwrap();
        assert_eq!(items[0].total_price, 50.0);
        assert_eq!(items[0].unit_price, 12.5);
    }

    #[test]
    fn test_decode_detailed_blob_count_key() {
        let items =
            decode_products_blob(r#"{"Leash": {"count": 2, "spend": 30.0}}"#, 1).unwrap();
        assert_eq!(items[0].quantity, 2.0);
    }

    #[test]
    fn test_decode_blob_rejects_garbage() {
        let err = decode_products_blob("not json", 7).unwrap_err();
        assert_eq!(err.row, 7);
        assert_eq!(err.field, "products");
    }

    #[test]
    fn test_map_row_basic_sale() {
        let mapper = RowMapper::new(RecordSource::Excel);
        let record = mapper
            .map_row(
                2,
                &row(&[
                    ("Date", "01/15/2025"),
                    ("Total", "$108.75"),
                    ("Revenue", "108.75"),
                    ("Customer", "Jane Doe"),
                ]),
            )
            .unwrap();
        assert_eq!(record.total, Some(108.75));
        assert!(record.has_revenue());
        assert_eq!(record.customer.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_map_row_missing_date_fails_loudly() {
        let mapper = RowMapper::new(RecordSource::Excel);
        let err = mapper
            .map_row(3, &row(&[("Total", "10.00")]))
            .unwrap_err();
        assert_eq!(err.field, "date");
        assert_eq!(err.row, 3);
    }

    #[test]
    fn test_map_row_unparseable_amount_names_the_field() {
        let mapper = RowMapper::new(RecordSource::Excel);
        let err = mapper
            .map_row(4, &row(&[("Date", "01/15/2025"), ("Shipping", "abc")]))
            .unwrap_err();
        assert_eq!(err.field, "shipping");
    }

    #[test]
    fn test_map_row_no_amount_at_all() {
        let mapper = RowMapper::new(RecordSource::Excel);
        let err = mapper
            .map_row(5, &row(&[("Date", "01/15/2025"), ("Customer", "Jane")]))
            .unwrap_err();
        assert_eq!(err.field, "total");
    }

    #[test]
    fn test_map_row_expense_categories() {
        let mapper = RowMapper::new(RecordSource::Excel);
        let record = mapper
            .map_row(
                6,
                &row(&[
                    ("Date", "01/15/2025"),
                    ("Software", "29.99"),
                    ("Dry Ice", "15.00"),
                ]),
            )
            .unwrap();
        assert_eq!(
            record.expense_amounts.get(&ExpenseCategory::Software),
            Some(&29.99)
        );
        assert_eq!(
            record.expense_amounts.get(&ExpenseCategory::DryIce),
            Some(&15.00)
        );
    }

    #[test]
    fn test_source_prefixes() {
        assert_eq!(RecordSource::Square.id_prefix(), Some("square_"));
        assert_eq!(RecordSource::Shopify.id_prefix(), Some("shopify_"));
        assert_eq!(RecordSource::Manual.id_prefix(), None);
    }
}
