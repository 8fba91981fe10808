//! Relaxed (lenient) alignment of strictly unmatched spans.
//!
//! Every overlapping pair of a `missing` gold span and an `extra` system
//! span is a conflict. Conflicts are scored by attribute agreement and
//! resolved by a greedy best-score assignment: each gold span takes the
//! highest-scoring system span still available, a strictly better score
//! steals (releasing the previously held system span), ties keep the first
//! encounter, and a zero score never pairs.
//!
//! This is a greedy bipartite matching, not a globally optimal one; the
//! greedy behavior is part of the metric definition and must not be replaced
//! by an optimal assignment.

use std::collections::HashMap;

use crate::document::Annotation;
use crate::error::{Error, Result};
use crate::eval::diff::{DiffEntry, LayerDiff};
use crate::eval::reduce::{BASIC_ATTRIBUTES, POINT_ATTRIBUTES};

/// One greedily matched gold/system span pair.
#[derive(Debug, Clone)]
pub struct MatchedPair {
    /// Gold span `(start, end)`.
    pub gold_span: (usize, usize),
    /// System span `(start, end)`.
    pub system_span: (usize, usize),
    /// Gold annotation.
    pub gold: Annotation,
    /// System annotation.
    pub system: Annotation,
    /// Attribute agreement score of the pair.
    pub score: u32,
}

/// Result of relaxed conflict resolution.
#[derive(Debug, Clone, Default)]
pub struct RelaxedAlignment {
    /// Matched pairs, ordered by gold span position.
    pub pairs: Vec<MatchedPair>,
}

impl RelaxedAlignment {
    /// Number of matched pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when no conflict was resolved into a pair.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// True when the given gold span was matched.
    #[must_use]
    pub fn matches_gold(&self, span: (usize, usize)) -> bool {
        self.pairs.iter().any(|p| p.gold_span == span)
    }

    /// True when the given system span was matched.
    #[must_use]
    pub fn matches_system(&self, span: (usize, usize)) -> bool {
        self.pairs.iter().any(|p| p.system_span == span)
    }
}

/// Attribute agreement score between two annotations: two points per
/// matching primary attribute, one per matching secondary attribute.
#[must_use]
pub fn match_score(gold: &Annotation, system: &Annotation) -> u32 {
    let mut score = 0;
    for &attr in &["type", "value"] {
        if gold.get(attr) == system.get(attr) {
            score += 2;
        }
    }
    for &attr in BASIC_ATTRIBUTES
        .iter()
        .filter(|a| !matches!(**a, "type" | "value"))
        .chain(POINT_ATTRIBUTES.iter())
    {
        if gold.get(attr) == system.get(attr) {
            score += 1;
        }
    }
    score
}

fn overlaps(a: &DiffEntry, b: &DiffEntry) -> bool {
    a.start < b.end && b.start < a.end
}

/// Resolve conflicts between strictly missing and extra spans.
///
/// Conflicts are visited gold-major in span order, so encounter order (and
/// with it tie-breaking) is deterministic.
pub fn relax_conflicts(diff: &LayerDiff) -> Result<RelaxedAlignment> {
    let mut gold_to_system: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
    let mut system_to_gold: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
    let mut best_score: HashMap<(usize, usize), u32> = HashMap::new();

    for gold_entry in diff.missing() {
        for system_entry in diff.extra() {
            if !overlaps(gold_entry, system_entry) {
                continue;
            }
            let gold_annotation = gold_entry.gold.as_ref().expect("missing entry has gold");
            let system_annotation = system_entry
                .system
                .as_ref()
                .expect("extra entry has system");
            let score = match_score(gold_annotation, system_annotation);
            let gold_key = (gold_entry.start, gold_entry.end);
            let system_key = (system_entry.start, system_entry.end);
            if score > best_score.get(&gold_key).copied().unwrap_or(0)
                && !system_to_gold.contains_key(&system_key)
            {
                if let Some(old_system) = gold_to_system.remove(&gold_key) {
                    system_to_gold.remove(&old_system);
                }
                gold_to_system.insert(gold_key, system_key);
                system_to_gold.insert(system_key, gold_key);
                best_score.insert(gold_key, score);
            }
        }
    }
    if gold_to_system.len() != system_to_gold.len() {
        return Err(Error::evaluation(
            "relaxed matching produced an inconsistent pairing".to_string(),
        ));
    }

    let mut gold_keys: Vec<(usize, usize)> = gold_to_system.keys().copied().collect();
    gold_keys.sort();
    let mut pairs = Vec::with_capacity(gold_keys.len());
    for gold_key in gold_keys {
        let system_key = gold_to_system[&gold_key];
        let gold_entry = diff
            .missing()
            .find(|e| (e.start, e.end) == gold_key)
            .expect("paired gold span exists");
        let system_entry = diff
            .extra()
            .find(|e| (e.start, e.end) == system_key)
            .expect("paired system span exists");
        let gold = gold_entry.gold.clone().expect("missing entry has gold");
        let system = system_entry.system.clone().expect("extra entry has system");
        let score = match_score(&gold, &system);
        pairs.push(MatchedPair {
            gold_span: gold_key,
            system_span: system_key,
            gold,
            system,
            score,
        });
    }
    Ok(RelaxedAlignment { pairs })
}
