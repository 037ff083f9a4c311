// 🔍 Similarity Matcher - Fuzzy product-name matching against the catalog
// Token overlap + substring containment + length similarity, with a penalty
// for bulk-variant catalog entries

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::transaction::CatalogProduct;

// ============================================================================
// MATCH OUTCOME
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub product: CatalogProduct,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// Score reached the auto-select threshold
    Matched(ScoredCandidate),

    /// Scores in the potential band: surfaced for human disambiguation,
    /// never auto-selected
    Potential(Vec<ScoredCandidate>),

    /// Nothing scored above the potential floor; caller should leave the
    /// line item unmatched (zero-cost placeholder) or prompt a human
    Unmatched,
}

impl MatchOutcome {
    pub fn matched(&self) -> Option<&ScoredCandidate> {
        match self {
            MatchOutcome::Matched(candidate) => Some(candidate),
            _ => None,
        }
    }
}

// ============================================================================
// MANUAL MATCH OVERRIDES
// ============================================================================

/// User-confirmed product mappings, consulted before automatic scoring.
///
/// The engine only reads and records entries in memory; persisting a confirmed
/// mapping to the outside world is the caller's side effect, not ours.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchOverrides {
    entries: HashMap<String, String>,
}

impl MatchOverrides {
    pub fn new() -> Self {
        MatchOverrides {
            entries: HashMap::new(),
        }
    }

    /// Record a confirmed query → catalog-product-id mapping
    pub fn record(&mut self, query: &str, product_id: &str) {
        self.entries
            .insert(normalize(query), product_id.to_string());
    }

    /// Look up a confirmed mapping for this query
    pub fn lookup(&self, query: &str) -> Option<&str> {
        self.entries.get(&normalize(query)).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

// ============================================================================
// SIMILARITY MATCHER
// ============================================================================

pub struct SimilarityMatcher {
    /// Minimum score for an automatic match (default: 40.0)
    pub auto_threshold: f64,

    /// Floor of the "potential" band surfaced for human review (default: 20.0)
    pub potential_floor: f64,

    /// Multiplier applied to the whole score when the candidate name
    /// contains "bulk" (default: 0.5)
    pub bulk_penalty: f64,
}

impl SimilarityMatcher {
    pub fn new() -> Self {
        SimilarityMatcher {
            auto_threshold: 40.0,
            potential_floor: 20.0,
            bulk_penalty: 0.5,
        }
    }

    /// Score how well a catalog candidate name matches a free-text query.
    /// Pure function, range [0, 100+]; exact (case-folded) equality
    /// short-circuits to 100 before any bonus or penalty.
    pub fn score(&self, candidate_name: &str, query_name: &str) -> f64 {
        let candidate = normalize(candidate_name);
        let query = normalize(query_name);

        if candidate == query {
            return 100.0;
        }

        let c_len = candidate.chars().count() as f64;
        let q_len = query.chars().count() as f64;
        let mut score = 0.0;

        // Containment bonus
        if c_len > 0.0 && q_len > 0.0 {
            if candidate.contains(&query) {
                score += 75.0 * (q_len / c_len);
            } else if query.contains(&candidate) {
                score += 60.0 * (c_len / q_len);
            }
        }

        // Token-overlap bonus
        let c_tokens: Vec<&str> = candidate.split_whitespace().collect();
        let q_tokens: Vec<&str> = query.split_whitespace().collect();
        let max_tokens = c_tokens.len().max(q_tokens.len());
        if max_tokens > 0 {
            let matching = q_tokens
                .iter()
                .filter(|t| c_tokens.contains(t))
                .count();
            score += 50.0 * (matching as f64 / max_tokens as f64);
        }

        // Length-similarity bonus
        let max_len = c_len.max(q_len);
        if max_len > 0.0 {
            score += 20.0 * (1.0 - (c_len - q_len).abs() / max_len);
        }

        // Bulk penalty applies to the entire accumulated score
        if candidate.contains("bulk") {
            score *= self.bulk_penalty;
        }

        score
    }

    /// Find the best catalog match for a query.
    ///
    /// Ties are stable: the first candidate encountered wins. Scores in the
    /// potential band are returned for human disambiguation, sorted descending.
    pub fn find_best_match(&self, candidates: &[CatalogProduct], query: &str) -> MatchOutcome {
        let mut best: Option<ScoredCandidate> = None;
        let mut potentials: Vec<ScoredCandidate> = Vec::new();

        for product in candidates {
            let score = self.score(&product.name, query);
            if score >= self.potential_floor && score < self.auto_threshold {
                potentials.push(ScoredCandidate {
                    product: product.clone(),
                    score,
                });
            }
            // Strictly greater keeps the first candidate on ties
            let better = best.as_ref().map(|b| score > b.score).unwrap_or(true);
            if better {
                best = Some(ScoredCandidate {
                    product: product.clone(),
                    score,
                });
            }
        }

        match best {
            Some(candidate) if candidate.score >= self.auto_threshold => {
                MatchOutcome::Matched(candidate)
            }
            _ if !potentials.is_empty() => {
                potentials.sort_by(|a, b| {
                    b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
                });
                MatchOutcome::Potential(potentials)
            }
            _ => MatchOutcome::Unmatched,
        }
    }

    /// Resolve a query against the catalog, consulting the manual override
    /// table before automatic scoring. An override hit counts as a full match.
    pub fn resolve(
        &self,
        overrides: &MatchOverrides,
        candidates: &[CatalogProduct],
        query: &str,
    ) -> MatchOutcome {
        if let Some(product_id) = overrides.lookup(query) {
            if let Some(product) = candidates.iter().find(|p| p.id == product_id) {
                return MatchOutcome::Matched(ScoredCandidate {
                    product: product.clone(),
                    score: 100.0,
                });
            }
        }
        self.find_best_match(candidates, query)
    }
}

impl Default for SimilarityMatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
