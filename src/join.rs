// 🔗 Join Engine - attach geographic and product context to transactions
//
// Three left joins, resolved through hash indexes built once per run:
//   1. Transaction.delivery_region_id → Region.id          (state)
//   2. Region.state                   → StateRegion.state  (region, households)
//   3. Transaction.product_id         → Product.id         (product name)
//
// Each foreign key matches at most one dimension row, so the output has
// exactly one row per input transaction. Misses are counted, not raised.

use crate::schema::{EnrichedTransaction, Product, Region, StateRegion, Transaction};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// JOIN REPORT
// ============================================================================

/// Diagnostics for unresolved foreign keys and ignored duplicate dimension keys
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinReport {
    pub input_rows: usize,
    pub output_rows: usize,

    /// Region id → number of transactions that referenced it
    pub unmatched_region_ids: BTreeMap<i64, usize>,

    /// State name → number of transactions whose state had no StateRegion row
    pub unmatched_states: BTreeMap<String, usize>,

    pub unmatched_product_ids: BTreeMap<i64, usize>,

    /// Dimension keys seen more than once; the first row wins
    pub duplicate_dimension_keys: Vec<String>,
}

impl JoinReport {
    pub fn unmatched_region_rows(&self) -> usize {
        self.unmatched_region_ids.values().sum()
    }

    pub fn unmatched_state_rows(&self) -> usize {
        self.unmatched_states.values().sum()
    }

    pub fn unmatched_product_rows(&self) -> usize {
        self.unmatched_product_ids.values().sum()
    }

    pub fn is_fully_matched(&self) -> bool {
        self.unmatched_region_ids.is_empty()
            && self.unmatched_states.is_empty()
            && self.unmatched_product_ids.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} → {} rows | unmatched: {} region, {} state, {} product | {} duplicate dimension keys",
            self.input_rows,
            self.output_rows,
            self.unmatched_region_rows(),
            self.unmatched_state_rows(),
            self.unmatched_product_rows(),
            self.duplicate_dimension_keys.len()
        )
    }
}

// ============================================================================
// JOIN ENGINE
// ============================================================================

pub struct JoinEngine<'a> {
    regions: HashMap<i64, &'a Region>,
    state_regions: HashMap<&'a str, &'a StateRegion>,
    products: HashMap<i64, &'a Product>,
    duplicate_keys: Vec<String>,
}

impl<'a> JoinEngine<'a> {
    /// Index the dimension tables. Duplicate keys keep their first row.
    pub fn new(
        regions: &'a [Region],
        state_regions: &'a [StateRegion],
        products: &'a [Product],
    ) -> Self {
        let mut duplicate_keys = Vec::new();

        let mut region_index = HashMap::with_capacity(regions.len());
        for region in regions {
            if region_index.contains_key(&region.id) {
                duplicate_keys.push(format!("Regions.id={}", region.id));
                continue;
            }
            region_index.insert(region.id, region);
        }

        let mut state_index = HashMap::with_capacity(state_regions.len());
        for state_region in state_regions {
            if state_index.contains_key(state_region.state.as_str()) {
                duplicate_keys.push(format!("StateRegions.State={}", state_region.state));
                continue;
            }
            state_index.insert(state_region.state.as_str(), state_region);
        }

        let mut product_index = HashMap::with_capacity(products.len());
        for product in products {
            if product_index.contains_key(&product.id) {
                duplicate_keys.push(format!("Products.id={}", product.id));
                continue;
            }
            product_index.insert(product.id, product);
        }

        for key in &duplicate_keys {
            log::warn!("duplicate dimension key ignored: {}", key);
        }

        JoinEngine {
            regions: region_index,
            state_regions: state_index,
            products: product_index,
            duplicate_keys,
        }
    }

    /// Join 1: delivery region
    pub fn lookup_region(&self, tx: &Transaction) -> Option<&'a Region> {
        self.regions.get(&tx.delivery_region_id).copied()
    }

    /// Join 2: state → geographic region. Exact, case-sensitive match.
    pub fn lookup_state_region(&self, state: &str) -> Option<&'a StateRegion> {
        self.state_regions.get(state).copied()
    }

    /// Join 3: product catalog
    pub fn lookup_product(&self, tx: &Transaction) -> Option<&'a Product> {
        self.products.get(&tx.product_id).copied()
    }

    /// Left-join every transaction against all three dimensions
    pub fn enrich(&self, transactions: &[Transaction]) -> (Vec<EnrichedTransaction>, JoinReport) {
        let mut report = JoinReport {
            input_rows: transactions.len(),
            duplicate_dimension_keys: self.duplicate_keys.clone(),
            ..JoinReport::default()
        };

        let mut enriched = Vec::with_capacity(transactions.len());

        for tx in transactions {
            let state = match self.lookup_region(tx) {
                Some(region) => Some(region.state.clone()),
                None => {
                    *report
                        .unmatched_region_ids
                        .entry(tx.delivery_region_id)
                        .or_insert(0) += 1;
                    None
                }
            };

            let state_region = match state.as_deref() {
                Some(name) => {
                    let found = self.lookup_state_region(name);
                    if found.is_none() {
                        *report.unmatched_states.entry(name.to_string()).or_insert(0) += 1;
                    }
                    found
                }
                None => None,
            };

            let product_name = match self.lookup_product(tx) {
                Some(product) => Some(product.product_name.clone()),
                None => {
                    *report
                        .unmatched_product_ids
                        .entry(tx.product_id)
                        .or_insert(0) += 1;
                    None
                }
            };

            enriched.push(EnrichedTransaction {
                transaction: tx.clone(),
                state,
                region: state_region.map(|sr| sr.region.clone()),
                households: state_region.map(|sr| sr.households),
                product_name,
            });
        }

        report.output_rows = enriched.len();

        if !report.is_fully_matched() {
            log::warn!("join: {}", report.summary());
        } else {
            log::info!("join: {}", report.summary());
        }

        (enriched, report)
    }
}
