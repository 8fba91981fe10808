//! Aggregated alignment statistics.
//!
//! [`DiffStats`] is a plain integer-count accumulator: one document's counts
//! are folded in with [`DiffStats::accumulate`], and accumulators combine
//! associatively with [`DiffStats::merge`], so the same type serves
//! per-document, per-subcorpus and whole-corpus reporting from a single
//! streaming pass.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::eval::align::RelaxedAlignment;
use crate::eval::diff::LayerDiff;
use crate::eval::reduce::BASIC_ATTRIBUTES;

/// Per-attribute agreement counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrCounts {
    /// Spans (unchanged or modified) where the attribute values agree.
    pub matching: u64,
    /// Spans (unchanged or modified) where the attribute was compared.
    pub total: u64,
    /// Matched spans where gold carries a value (relevant pool).
    pub relevant: u64,
    /// Matched spans where the system carries a value (retrieved pool).
    pub retrieved: u64,
    /// Matched spans where both carry the same value.
    pub correct: u64,
}

impl AttrCounts {
    /// Sum counts from another accumulator.
    pub fn merge(&mut self, other: &AttrCounts) {
        self.matching += other.matching;
        self.total += other.total;
        self.relevant += other.relevant;
        self.retrieved += other.retrieved;
        self.correct += other.correct;
    }
}

/// Integer-count accumulator over one or more documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Number of documents folded in.
    pub documents: u64,
    /// Gold span count (strict).
    pub gold_spans: u64,
    /// System span count (strict).
    pub auto_spans: u64,
    /// Spans identical in extent and attributes.
    pub unchanged_spans: u64,
    /// Spans identical in extent with differing attributes.
    pub modified_spans: u64,
    /// Gold spans without a strict counterpart.
    pub missing_spans: u64,
    /// System spans without a strict counterpart.
    pub extra_spans: u64,
    /// Gold span count after lenient conflict resolution.
    pub gold_spans_lenient: u64,
    /// System span count after lenient conflict resolution.
    pub auto_spans_lenient: u64,
    /// Missing spans remaining after lenient conflict resolution.
    pub missing_spans_lenient: u64,
    /// Extra spans remaining after lenient conflict resolution.
    pub extra_spans_lenient: u64,
    /// Total gold annotations.
    pub total_gold_annotations: u64,
    /// Total system annotations.
    pub total_auto_annotations: u64,
    /// Per-attribute agreement counts, keyed by attribute name.
    pub attributes: BTreeMap<String, AttrCounts>,
}

impl DiffStats {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one document's diff and relaxed alignment into the accumulator.
    pub fn accumulate(&mut self, diff: &LayerDiff, relaxed: &RelaxedAlignment) -> Result<()> {
        self.documents += 1;

        // span extent, strict
        let gold_spans = diff.unchanged_spans + diff.modified_spans + diff.missing_spans;
        let auto_spans = diff.unchanged_spans + diff.modified_spans + diff.extra_spans;
        self.gold_spans += gold_spans;
        self.auto_spans += auto_spans;
        self.unchanged_spans += diff.unchanged_spans;
        self.modified_spans += diff.modified_spans;
        self.missing_spans += diff.missing_spans;
        self.extra_spans += diff.extra_spans;

        // span extent, lenient: every resolved conflict leaves both tallies
        let matched = relaxed.len() as u64;
        if matched > diff.missing_spans || matched > diff.extra_spans {
            return Err(Error::evaluation(format!(
                "relaxed matching resolved {matched} conflicts but only {} missing / {} extra spans exist",
                diff.missing_spans, diff.extra_spans
            )));
        }
        let missing_lenient = diff.missing_spans - matched;
        let extra_lenient = diff.extra_spans - matched;
        self.missing_spans_lenient += missing_lenient;
        self.extra_spans_lenient += extra_lenient;
        self.gold_spans_lenient += diff.unchanged_spans + diff.modified_spans + missing_lenient;
        self.auto_spans_lenient += diff.unchanged_spans + diff.modified_spans + extra_lenient;

        // annotation totals
        self.total_gold_annotations += diff.unchanged_annotations + diff.missing_annotations;
        self.total_auto_annotations += diff.unchanged_annotations + diff.extra_annotations;

        // per-attribute accuracy over full span matches
        for &attr in BASIC_ATTRIBUTES {
            let counts = self.attributes.entry(attr.to_string()).or_default();
            counts.matching += diff.unchanged_annotations;
            counts.total += diff.unchanged_annotations;
        }
        for entry in diff.matched() {
            if entry.status != crate::eval::diff::SpanStatus::Modified {
                continue;
            }
            let gold = entry.gold.as_ref().expect("matched entry has gold");
            let system = entry.system.as_ref().expect("matched entry has system");
            for &attr in BASIC_ATTRIBUTES {
                let counts = self.attributes.entry(attr.to_string()).or_default();
                counts.total += 1;
                if gold.get(attr) == system.get(attr) {
                    counts.matching += 1;
                }
            }
        }

        // per-attribute precision/recall pools: full matches plus the
        // greedily matched partial pairs
        for entry in diff.matched() {
            let gold = entry.gold.as_ref().expect("matched entry has gold");
            let system = entry.system.as_ref().expect("matched entry has system");
            self.count_attribute_pools(gold, system);
        }
        for pair in &relaxed.pairs {
            self.count_attribute_pools(&pair.gold, &pair.system);
        }
        Ok(())
    }

    fn count_attribute_pools(
        &mut self,
        gold: &crate::document::Annotation,
        system: &crate::document::Annotation,
    ) {
        for &attr in BASIC_ATTRIBUTES {
            let counts = self.attributes.entry(attr.to_string()).or_default();
            let gold_value = gold.get(attr);
            let system_value = system.get(attr);
            if !gold_value.is_null() {
                counts.relevant += 1;
            }
            if !system_value.is_null() {
                counts.retrieved += 1;
            }
            if !gold_value.is_null() && !system_value.is_null() && gold_value == system_value {
                counts.correct += 1;
            }
        }
    }

    /// Combine with another accumulator. Associative and commutative, so
    /// per-document accumulators can roll up into subcorpus and corpus
    /// accumulators in any grouping.
    pub fn merge(&mut self, other: &DiffStats) {
        self.documents += other.documents;
        self.gold_spans += other.gold_spans;
        self.auto_spans += other.auto_spans;
        self.unchanged_spans += other.unchanged_spans;
        self.modified_spans += other.modified_spans;
        self.missing_spans += other.missing_spans;
        self.extra_spans += other.extra_spans;
        self.gold_spans_lenient += other.gold_spans_lenient;
        self.auto_spans_lenient += other.auto_spans_lenient;
        self.missing_spans_lenient += other.missing_spans_lenient;
        self.extra_spans_lenient += other.extra_spans_lenient;
        self.total_gold_annotations += other.total_gold_annotations;
        self.total_auto_annotations += other.total_auto_annotations;
        for (attr, counts) in &other.attributes {
            self.attributes
                .entry(attr.clone())
                .or_default()
                .merge(counts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Annotation, Layer, Span};
    use crate::eval::align::relax_conflicts;
    use crate::eval::diff::diff_layers;
    use crate::eval::reduce::COMPARED_ATTRIBUTES;

    fn layer(name: &str, spans: &[(usize, usize, &str, &str)]) -> Layer {
        let mut layer = Layer::new(name, COMPARED_ATTRIBUTES);
        for &(start, end, kind, value) in spans {
            layer
                .add_annotation(
                    Span::new(start, end),
                    Annotation::new().with("type", kind).with("value", value),
                )
                .unwrap();
        }
        layer
    }

    fn stats_for(gold: &Layer, system: &Layer) -> DiffStats {
        let diff = diff_layers(gold, system).unwrap();
        let relaxed = relax_conflicts(&diff).unwrap();
        let mut stats = DiffStats::new();
        stats.accumulate(&diff, &relaxed).unwrap();
        stats
    }

    #[test]
    fn test_full_match_counts() {
        let gold = layer("gold", &[(0, 10, "DATE", "1999-01-01")]);
        let system = layer("system", &[(0, 10, "DATE", "1999-01-01")]);
        let stats = stats_for(&gold, &system);
        assert_eq!(stats.unchanged_spans, 1);
        assert_eq!(stats.gold_spans, 1);
        assert_eq!(stats.auto_spans, 1);
        assert_eq!(stats.missing_spans_lenient, 0);
        let type_counts = &stats.attributes["type"];
        assert_eq!(type_counts.relevant, 1);
        assert_eq!(type_counts.retrieved, 1);
        assert_eq!(type_counts.correct, 1);
    }

    #[test]
    fn test_lenient_subtraction_invariant() {
        let gold = layer("gold", &[(0, 10, "DATE", "1999")]);
        let system = layer("system", &[(2, 10, "DATE", "1999")]);
        let diff = diff_layers(&gold, &system).unwrap();
        let relaxed = relax_conflicts(&diff).unwrap();
        let mut stats = DiffStats::new();
        stats.accumulate(&diff, &relaxed).unwrap();
        assert_eq!(
            stats.missing_spans_lenient + relaxed.len() as u64,
            stats.missing_spans
        );
        assert_eq!(
            stats.extra_spans_lenient + relaxed.len() as u64,
            stats.extra_spans
        );
        // the greedy pair feeds the attribute pools
        assert_eq!(stats.attributes["type"].correct, 1);
        assert_eq!(stats.attributes["value"].correct, 1);
    }

    #[test]
    fn test_merge_matches_joint_accumulation() {
        let gold_a = layer("gold", &[(0, 10, "DATE", "1999")]);
        let system_a = layer("system", &[(0, 10, "DATE", "1998")]);
        let gold_b = layer("gold", &[(5, 9, "TIME", "T12")]);
        let system_b = layer("system", &[(20, 24, "DATE", "2000")]);

        let mut merged = stats_for(&gold_a, &system_a);
        merged.merge(&stats_for(&gold_b, &system_b));

        assert_eq!(merged.documents, 2);
        assert_eq!(merged.gold_spans, 2);
        assert_eq!(merged.auto_spans, 2);
        assert_eq!(merged.modified_spans, 1);
        assert_eq!(merged.missing_spans, 1);
        assert_eq!(merged.extra_spans, 1);
        let value_counts = &merged.attributes["value"];
        // only the modified span feeds the pools; gold and system each carry
        // a value there but they differ
        assert_eq!(value_counts.relevant, 1);
        assert_eq!(value_counts.retrieved, 1);
        assert_eq!(value_counts.correct, 0);
        assert_eq!(value_counts.total, 1);
        assert_eq!(value_counts.matching, 0);
    }
}
