// Counterbook - Transaction Reconciliation & Profit/Tax Derivation Engine
// Exposes all modules for use in route handlers, the CLI, and tests

pub mod record;
pub mod transaction;
pub mod matching;
pub mod classifier;
pub mod dedup;
pub mod derivation;
pub mod profit;
pub mod normalize;
pub mod engine;
pub mod store;

// Re-export commonly used types
pub use record::{
    decode_products_blob, parse_money, ExpenseCategory, RawDate, RawLineItem, RawRecord,
    RecordError, RecordSource, RowMapper,
};
pub use transaction::{
    round2, CanonicalTransaction, CatalogProduct, ItemProfit, LineItem, ProfitCalculation,
    TransactionStatus, TransactionType,
};
pub use matching::{MatchOutcome, MatchOverrides, ScoredCandidate, SimilarityMatcher};
pub use classifier::{Classification, TransactionClassifier};
pub use dedup::{DuplicateMatch, DuplicateResolver, MatchStrategy, MatchType};
pub use derivation::{DerivationMode, DerivedAmounts, TaxEngine};
pub use profit::{FeeSchedule, ProcessorFee, ProfitEngine};
pub use normalize::PayloadNormalizer;
pub use engine::{BatchReport, DuplicateRecord, ImportEngine};
pub use store::{InMemoryCatalog, InMemoryStore, ProductCatalog, TransactionStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
