//! Property tests for the alignment and scoring engine.

use proptest::prelude::*;

use timex_eval::eval::{
    diff_layers, relax_conflicts, reduce_timex_layer, DiffStats, EvalReport,
};
use timex_eval::builder::TIMEX_LAYER_ATTRIBUTES;
use timex_eval::{Annotation, Layer, Span};

fn arb_spans() -> impl Strategy<Value = Vec<(usize, usize, u8, u8)>> {
    // (start, length, type index, value index); spans are deduplicated by
    // start so layers stay valid
    proptest::collection::vec((0usize..60, 1usize..8, 0u8..3, 0u8..4), 0..8)
}

fn build_layer(name: &str, spans: &[(usize, usize, u8, u8)]) -> Layer {
    const TYPES: [&str; 3] = ["DATE", "TIME", "DURATION"];
    const VALUES: [&str; 4] = ["1999", "2000", "T12", "P1W"];
    let mut layer = Layer::new(name, TIMEX_LAYER_ATTRIBUTES);
    let mut seen: Vec<(usize, usize)> = Vec::new();
    for &(start, len, kind, value) in spans {
        let span = (start, start + len);
        if seen.contains(&span) {
            continue;
        }
        seen.push(span);
        layer
            .add_annotation(
                Span::new(span.0, span.1),
                Annotation::new()
                    .with("type", TYPES[kind as usize])
                    .with("value", VALUES[value as usize]),
            )
            .unwrap();
    }
    layer
}

fn stats_of(gold: &Layer, system: &Layer) -> (DiffStats, usize) {
    let gold_reduced = reduce_timex_layer(gold, "g").unwrap();
    let system_reduced = reduce_timex_layer(system, "s").unwrap();
    let diff = diff_layers(&gold_reduced, &system_reduced).unwrap();
    let relaxed = relax_conflicts(&diff).unwrap();
    let mut stats = DiffStats::new();
    stats.accumulate(&diff, &relaxed).unwrap();
    (stats, relaxed.len())
}

proptest! {
    #[test]
    fn metrics_stay_in_unit_interval(
        gold_spans in arb_spans(),
        system_spans in arb_spans(),
    ) {
        let gold = build_layer("gold", &gold_spans);
        let system = build_layer("system", &system_spans);
        let (stats, _) = stats_of(&gold, &system);
        let report = EvalReport::from_stats(&stats);
        for row in [report.extent_strict, report.extent_relaxed]
            .into_iter()
            .chain(report.attributes.iter().map(|(_, row, _)| *row))
        {
            prop_assert!((0.0..=1.0).contains(&row.recall));
            prop_assert!((0.0..=1.0).contains(&row.precision));
            prop_assert!((0.0..=1.0).contains(&row.f1));
        }
    }

    #[test]
    fn lenient_counts_never_oversubtract(
        gold_spans in arb_spans(),
        system_spans in arb_spans(),
    ) {
        let gold = build_layer("gold", &gold_spans);
        let system = build_layer("system", &system_spans);
        let (stats, matched) = stats_of(&gold, &system);
        prop_assert_eq!(
            stats.missing_spans_lenient + matched as u64,
            stats.missing_spans
        );
        prop_assert_eq!(
            stats.extra_spans_lenient + matched as u64,
            stats.extra_spans
        );
    }

    #[test]
    fn greedy_matching_is_deterministic(
        gold_spans in arb_spans(),
        system_spans in arb_spans(),
    ) {
        let gold = build_layer("gold", &gold_spans);
        let system = build_layer("system", &system_spans);
        let gold_reduced = reduce_timex_layer(&gold, "g").unwrap();
        let system_reduced = reduce_timex_layer(&system, "s").unwrap();
        let diff = diff_layers(&gold_reduced, &system_reduced).unwrap();
        let first = relax_conflicts(&diff).unwrap();
        let second = relax_conflicts(&diff).unwrap();
        let pairs = |a: &timex_eval::eval::RelaxedAlignment| {
            a.pairs
                .iter()
                .map(|p| (p.gold_span, p.system_span, p.score))
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(pairs(&first), pairs(&second));
    }

    #[test]
    fn merge_is_associative(
        spans_a in arb_spans(),
        spans_b in arb_spans(),
        spans_c in arb_spans(),
    ) {
        let stats: Vec<DiffStats> = [&spans_a, &spans_b, &spans_c]
            .iter()
            .map(|spans| {
                let gold = build_layer("gold", spans);
                let system = build_layer("system", &spans_b);
                stats_of(&gold, &system).0
            })
            .collect();

        let mut left = stats[0].clone();
        left.merge(&stats[1]);
        left.merge(&stats[2]);

        let mut tail = stats[1].clone();
        tail.merge(&stats[2]);
        let mut right = stats[0].clone();
        right.merge(&tail);

        prop_assert_eq!(left, right);
    }
}
