//! Potential-duplicate detection across the item catalog.
//!
//! Names are compared with a token-sort similarity; every name pair above
//! the threshold is annotated with corroborating supplier/size/price flags.
//! Nothing is merged or suppressed.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::catalog::{CatalogIndex, ParsedItem};
use crate::config::DuplicateConfig;
use crate::error::AuditError;
use crate::model::{DuplicateCandidate, DuplicateMap, FieldMatch};

pub trait DuplicateFinder {
    fn find_potential_duplicates(&self, catalog: &CatalogIndex) -> Result<DuplicateMap, AuditError>;
}

/// Scores every named item against every other one.
#[derive(Debug, Clone)]
pub struct PairwiseScan {
    name_threshold: u8,
    max_candidates: usize,
    size_tolerance: f64,
    price_tolerance: f64,
    parallel: bool,
    timeout: Option<Duration>,
}

impl PairwiseScan {
    pub fn new(config: &DuplicateConfig) -> Self {
        Self {
            name_threshold: config.name_threshold,
            max_candidates: config.max_candidates,
            size_tolerance: config.size_tolerance,
            price_tolerance: config.price_tolerance,
            parallel: config.parallel,
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn scan_item(
        &self,
        source: usize,
        source_key: &str,
        named: &[(usize, &str, String)],
        catalog: &CatalogIndex,
    ) -> Vec<DuplicateCandidate> {
        let mut ranked: Vec<(u8, usize, &str)> = named
            .iter()
            .filter(|(i, _, _)| *i != source)
            .map(|(i, name, key)| (sorted_ratio(source_key, key), *i, *name))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let source_item = catalog.parsed_item(source);
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();

        for (score, _, name) in ranked.into_iter().take(self.max_candidates) {
            if score < self.name_threshold {
                continue;
            }
            for &matched in catalog.indices_for(name) {
                if matched == source || !seen.insert(matched) {
                    continue;
                }
                let other = catalog.parsed_item(matched);
                out.push(DuplicateCandidate {
                    item: source,
                    matched,
                    matched_name: catalog.record(matched).name.clone().unwrap_or_default(),
                    name_score: score,
                    supplier: supplier_match(source_item, other),
                    size: numeric_match(source_item.size, other.size, self.size_tolerance),
                    price: numeric_match(source_item.price, other.price, self.price_tolerance),
                });
            }
        }
        out
    }
}

impl DuplicateFinder for PairwiseScan {
    fn find_potential_duplicates(&self, catalog: &CatalogIndex) -> Result<DuplicateMap, AuditError> {
        let started = Instant::now();
        // (index, normalized name, token-sorted name)
        let named: Vec<(usize, &str, String)> = catalog
            .parsed()
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.name.as_deref().map(|n| (i, n, sort_tokens(n))))
            .collect();

        let check_deadline = || match self.timeout {
            Some(limit) if started.elapsed() >= limit => Err(AuditError::DuplicateScanTimeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
            _ => Ok(()),
        };

        let scan = |(source, _, key): &(usize, &str, String)| -> Result<(usize, Vec<DuplicateCandidate>), AuditError> {
            check_deadline()?;
            Ok((*source, self.scan_item(*source, key, &named, catalog)))
        };

        let results: Vec<(usize, Vec<DuplicateCandidate>)> = if self.parallel {
            named.par_iter().map(scan).collect::<Result<_, _>>()?
        } else {
            named.iter().map(scan).collect::<Result<_, _>>()?
        };

        Ok(results.into_iter().filter(|(_, c)| !c.is_empty()).collect())
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

fn sort_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn sorted_ratio(a: &str, b: &str) -> u8 {
    (strsim::normalized_levenshtein(a, b) * 100.0).round() as u8
}

/// Word-order-insensitive similarity, 0..=100.
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    sorted_ratio(&sort_tokens(a), &sort_tokens(b))
}

fn supplier_match(a: &ParsedItem, b: &ParsedItem) -> Option<FieldMatch> {
    match (&a.supplier, &b.supplier) {
        (Some(x), Some(y)) if x == y => Some(FieldMatch::Yes),
        (Some(_), Some(_)) => Some(FieldMatch::No),
        _ => None,
    }
}

/// Relative-tolerance comparison. `None` when neither side has a value.
pub fn numeric_match(a: Option<f64>, b: Option<f64>, tolerance: f64) -> Option<FieldMatch> {
    match (a, b) {
        (Some(x), Some(y)) => {
            if x == 0.0 && y == 0.0 {
                Some(FieldMatch::BothZero)
            } else if (x - y).abs() <= tolerance * x.abs().max(y.abs()) {
                Some(FieldMatch::Yes)
            } else {
                Some(FieldMatch::No)
            }
        }
        (Some(_), None) | (None, Some(_)) => Some(FieldMatch::Partial),
        (None, None) => None,
    }
}

/// `Potential_Duplicates_Info` cell text.
pub fn annotation(candidates: &[DuplicateCandidate]) -> String {
    if candidates.is_empty() {
        return "None".into();
    }
    candidates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemRecord;

    fn item(name: &str, supplier: &str, size: &str, price: &str) -> ItemRecord {
        let cell = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
        ItemRecord {
            name: cell(name),
            supplier: cell(supplier),
            size: cell(size),
            price: cell(price),
            ..Default::default()
        }
    }

    fn scan(records: Vec<ItemRecord>, parallel: bool) -> DuplicateMap {
        let config = DuplicateConfig { parallel, ..Default::default() };
        PairwiseScan::new(&config)
            .find_potential_duplicates(&CatalogIndex::from_records(records))
            .unwrap()
    }

    #[test]
    fn token_order_does_not_matter() {
        assert_eq!(token_sort_ratio("olive oil extra virgin", "extra virgin olive oil"), 100);
        assert_eq!(token_sort_ratio("abc", "xyz"), 0);
    }

    #[test]
    fn olive_oil_pair_is_mutual() {
        let dups = scan(
            vec![
                item("Olive Oil 1L", "Acme", "1", "8.00"),
                item("Olive Oil 1 L", "ACME ", "1", "8.04"),
                item("Sugar", "Acme", "1", "1.00"),
            ],
            true,
        );
        assert_eq!(dups.len(), 2);
        let a = &dups[&0][0];
        assert_eq!(a.matched, 1);
        assert!(a.name_score >= 85);
        assert_eq!(a.supplier, Some(FieldMatch::Yes));
        assert_eq!(a.price, Some(FieldMatch::Yes));
        assert_eq!(dups[&1][0].matched, 0);
        assert!(annotation(&dups[&0]).starts_with("Item:'Olive Oil 1 L' (Idx:1,NameScore:"));
    }

    #[test]
    fn same_name_items_expand_to_every_index() {
        let dups = scan(
            vec![item("Salt", "", "", ""), item("salt", "", "", ""), item("SALT ", "", "", "")],
            false,
        );
        let matched: Vec<usize> = dups[&0].iter().map(|c| c.matched).collect();
        assert_eq!(matched, vec![1, 2]);
        assert_eq!(dups[&0][0].name_score, 100);
        assert_eq!(dups[&0][0].to_string(), "Item:'salt' (Idx:1,NameScore:100)");
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let records: Vec<ItemRecord> = (0..40)
            .map(|i| item(&format!("item number {}", i % 13), "acme", &format!("{i}"), "1.0"))
            .collect();
        assert_eq!(scan(records.clone(), true), scan(records, false));
    }

    #[test]
    fn unnamed_and_distinct_items_have_no_candidates() {
        let dups = scan(vec![item("", "", "", ""), item("Flour", "", "", ""), item("Pepper", "", "", "")], true);
        assert!(dups.is_empty());
        assert_eq!(annotation(&[]), "None");
    }

    #[test]
    fn numeric_flags() {
        assert_eq!(numeric_match(Some(0.0), Some(0.0), 0.01), Some(FieldMatch::BothZero));
        assert_eq!(numeric_match(Some(100.0), Some(101.0), 0.01), Some(FieldMatch::Yes));
        assert_eq!(numeric_match(Some(100.0), Some(102.0), 0.01), Some(FieldMatch::No));
        assert_eq!(numeric_match(Some(0.0), Some(1.0), 0.01), Some(FieldMatch::No));
        assert_eq!(numeric_match(None, Some(1.0), 0.01), Some(FieldMatch::Partial));
        assert_eq!(numeric_match(None, None, 0.01), None);
    }

    #[test]
    fn supplier_flag_omitted_when_one_side_blank() {
        let dups = scan(vec![item("Basil", "Acme", "", ""), item("Basil", "", "", "")], false);
        assert_eq!(dups[&0][0].supplier, None);
        let dups = scan(vec![item("Basil", "Acme", "", ""), item("Basil", "Other", "", "")], false);
        assert_eq!(dups[&0][0].supplier, Some(FieldMatch::No));
    }

    #[test]
    fn zero_timeout_fails_the_scan() {
        let catalog = CatalogIndex::from_records(vec![item("Basil", "", "", ""), item("Basil", "", "", "")]);
        let err = PairwiseScan::new(&DuplicateConfig::default())
            .with_timeout(Duration::ZERO)
            .find_potential_duplicates(&catalog)
            .unwrap_err();
        assert!(matches!(err, AuditError::DuplicateScanTimeout { .. }));
    }
}
