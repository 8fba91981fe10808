//! Building normalized span layers from resolved records.
//!
//! Two producers feed this module: linked timex records (tag-embedded and
//! TimeML imports) and resolved Brat entities/relations. Both end up as
//! schema-checked [`Layer`]s on a [`Document`].
//!
//! The hard part is reconciling a record's recorded phrase with the
//! reconstructed text. The phrase was annotated against a different
//! tokenization, so the slice at the recorded offsets may disagree with it;
//! a fixed ladder of match strategies recovers the true location, and a
//! record falling off the ladder is a fatal offset error.

use std::collections::HashMap;

use crate::document::{Annotation, AttrValue, Document, Layer, Span};
use crate::error::{Error, Result};
use crate::record::{PointRef, RawRelation, TimexRecord};

/// Attribute schema of a normalized timex layer.
pub const TIMEX_LAYER_ATTRIBUTES: &[&str] = &[
    "tid",
    "type",
    "value",
    "temporal_function",
    "anchor_time_id",
    "mod",
    "quant",
    "freq",
    "begin_point",
    "end_point",
    "part_of_interval",
    "comment",
];

/// Name of the flat base layer holding minimal Brat entity spans.
pub const BRAT_BASE_LAYER: &str = "brat_entities";

/// Build a flat timex layer from resolved records.
///
/// Records with a recorded phrase go through the location ladder; records
/// without one are trusted at their offsets.
pub fn build_timex_layer(
    document: &Document,
    records: &[TimexRecord],
    layer_name: &str,
) -> Result<Layer> {
    let chars: Vec<char> = document.text().chars().collect();
    let mut layer = Layer::new(layer_name, TIMEX_LAYER_ATTRIBUTES);
    for record in records {
        let (start, end) = resolve_location(&chars, record)?;
        layer.add_annotation(Span::new(start, end), timex_annotation(record))?;
    }
    Ok(layer)
}

fn timex_annotation(record: &TimexRecord) -> Annotation {
    let mut ann = Annotation::new()
        .with("tid", record.tid.as_str())
        .with("type", record.kind.as_str());
    if let Some(v) = &record.value {
        ann.set("value", v.as_str());
    }
    if let Some(b) = record.temporal_function {
        ann.set("temporal_function", b);
    }
    if let Some(v) = &record.anchor_time_id {
        ann.set("anchor_time_id", v.as_str());
    }
    if let Some(v) = &record.modifier {
        ann.set("mod", v.as_str());
    }
    if let Some(v) = &record.quant {
        ann.set("quant", v.as_str());
    }
    if let Some(v) = &record.freq {
        ann.set("freq", v.as_str());
    }
    if let Some(p) = &record.begin_point {
        ann.set("begin_point", point_value(p));
    }
    if let Some(p) = &record.end_point {
        ann.set("end_point", point_value(p));
    }
    if let Some(r) = &record.part_of_interval {
        ann.set("part_of_interval", r.clone());
    }
    if let Some(v) = &record.comment {
        ann.set("comment", v.as_str());
    }
    ann
}

fn point_value(point: &PointRef) -> AttrValue {
    match point {
        PointRef::Id(id) => AttrValue::Str(id.clone()),
        PointRef::Embedded(record) => AttrValue::Record(record.clone()),
    }
}

/// Determine the exact location of a record in the reconstructed text.
///
/// Strategy order, preserved exactly (later branches are best-effort
/// heuristics and must not be "improved" ahead of earlier ones):
///
/// 1. no recorded phrase: trust the offsets;
/// 2. phrase equals the slice once whitespace is stripped from the phrase;
/// 3. phrase equals the slice once whitespace is stripped from both;
/// 4. phrase is a substring of the slice: relocate by forward search;
/// 5. phrase only overlaps the slice: search all occurrences (first of the
///    phrase, then of the despaced phrase) overlapping the recorded
///    location, and require exactly one candidate.
fn resolve_location(chars: &[char], record: &TimexRecord) -> Result<(usize, usize)> {
    let (start, end) = (record.start, record.end);
    let Some(literal) = record.text.as_deref() else {
        return Ok((start, end));
    };
    let slice: String = chars
        .get(start..end)
        .ok_or_else(|| {
            Error::offset_resolution(format!(
                "offsets ({start}, {end}) fall outside the text for timex {:?}",
                record.tid
            ))
        })?
        .iter()
        .collect();

    if despace(literal) == slice || despace(literal) == despace(&slice) {
        return Ok((start, end));
    }

    let literal_chars: Vec<char> = literal.chars().collect();
    if slice.contains(literal) {
        if let Some(i) = char_find(chars, &literal_chars, start) {
            if i + literal_chars.len() <= end {
                return Ok((i, i + literal_chars.len()));
            }
        }
        return Err(Error::offset_resolution(format!(
            "unable to detect location of timex {:?} with text {literal:?}",
            record.tid
        )));
    }

    let mut candidates = overlapping_occurrences(chars, &literal_chars, start, end);
    if candidates.is_empty() {
        let despaced: Vec<char> = despace(literal).chars().collect();
        candidates = overlapping_occurrences(chars, &despaced, start, end);
    }
    match candidates.len() {
        1 => Ok(candidates[0]),
        0 => Err(Error::offset_resolution(format!(
            "unable to detect location of timex {:?} with text {literal:?}",
            record.tid
        ))),
        _ => Err(Error::offset_resolution(format!(
            "multiple possible locations {candidates:?} detected for timex {:?} with text {literal:?}",
            record.tid
        ))),
    }
}

/// All occurrences of `needle` that overlap the location `[a, b]`.
fn overlapping_occurrences(
    chars: &[char],
    needle: &[char],
    a: usize,
    b: usize,
) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    if needle.is_empty() {
        return found;
    }
    let mut i = 0;
    while let Some(pos) = char_find(chars, needle, i) {
        let j = pos + needle.len();
        if locations_overlap(a, b, pos, j) && !found.contains(&(pos, j)) {
            found.push((pos, j));
        }
        i = j;
    }
    found
}

/// Inclusive-bound overlap test between locations `[a:b]` and `[x:y]`.
fn locations_overlap(a: usize, b: usize, x: usize, y: usize) -> bool {
    (a <= x && y <= b) || (x <= a && b <= y) || (a <= x && x <= b) || (x <= b && b <= y)
}

fn despace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Find `needle` in `haystack` at or after character position `from`.
fn char_find(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

// =============================================================================
// Brat layers
// =============================================================================

/// A Brat entity whose offsets are already corrected and text-verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
    /// Brat identifier (`T1`, `T2`, ...).
    pub id: String,
    /// Entity category (`Timex`, `Event`, `Entity`).
    pub kind: String,
    /// Corrected character ranges, one per sub-span.
    pub spans: Vec<(usize, usize)>,
    /// Merged attributes (stand-off attribute lines plus note contents).
    pub attrs: HashMap<String, String>,
}

const EVENT_ATTRIBUTES: &[&str] = &[
    "brat_id",
    "class",
    "class_confidence",
    "duration",
    "duration_confidence",
    "comment",
];

const BRAT_TIMEX_ATTRIBUTES: &[&str] = &[
    "brat_id",
    "tid",
    "type",
    "value",
    "mod",
    "anchor_time_id",
    "comment",
];

const RELATION_ATTRIBUTES: &[&str] = &["brat_id", "a_text", "rel_type", "b_text", "b_index"];

/// Relation types that swap when arguments are reordered.
fn reversed_relation_type(kind: &str) -> String {
    match kind {
        "AFTER" => "BEFORE".to_string(),
        "BEFORE" => "AFTER".to_string(),
        "INCLUDES" => "IS_INCLUDED".to_string(),
        "IS_INCLUDED" => "INCLUDES".to_string(),
        "has_Argument" => "is_Argument_of".to_string(),
        other => other.to_string(),
    }
}

/// Build the full Brat layer set on a document: a flat base layer of minimal
/// spans, enveloping layers per entity category, and relation layers.
pub fn build_brat_layers(
    document: &mut Document,
    entities: &[ResolvedEntity],
    relations: &[RawRelation],
) -> Result<()> {
    let mut base = Layer::new(BRAT_BASE_LAYER, &["brat_id"]);
    let mut events = Layer::new("events", EVENT_ATTRIBUTES).enveloping(BRAT_BASE_LAYER);
    let mut timexes = Layer::new("timexes", BRAT_TIMEX_ATTRIBUTES).enveloping(BRAT_BASE_LAYER);
    let mut plain = Layer::new("entities", &["brat_id"]).enveloping(BRAT_BASE_LAYER);

    let mut locations: HashMap<&str, &[(usize, usize)]> = HashMap::new();
    for entity in entities {
        for &(s, e) in &entity.spans {
            base.add_annotation(
                Span::new(s, e),
                Annotation::new().with("brat_id", entity.id.as_str()),
            )?;
        }
        locations.insert(entity.id.as_str(), &entity.spans);

        let span = Span::multi(entity.spans.clone())?;
        match entity.kind.as_str() {
            "Event" => events.add_annotation(span, schema_annotation(entity, EVENT_ATTRIBUTES))?,
            "Timex" => {
                timexes.add_annotation(span, schema_annotation(entity, BRAT_TIMEX_ATTRIBUTES))?
            }
            "Entity" => plain.add_annotation(span, schema_annotation(entity, &["brat_id"]))?,
            other => {
                log::warn!("entity {} has unmapped category {other:?}", entity.id);
            }
        }
    }

    document.add_layer(base)?;
    document.add_layer(events)?;
    document.add_layer(timexes)?;
    document.add_layer(plain)?;

    let tlinks = build_relation_layer(document, "tlinks", relations, &locations, false)?;
    document.add_layer(tlinks)?;
    let arguments =
        build_relation_layer(document, "event_arguments", relations, &locations, true)?;
    document.add_layer(arguments)?;
    Ok(())
}

/// Keep only the entity attributes belonging to the target schema; the
/// source carries bookkeeping keys (the literal text, extra note attributes)
/// that have no slot in the enveloping layers.
fn schema_annotation(entity: &ResolvedEntity, schema: &[&str]) -> Annotation {
    let mut ann = Annotation::new().with("brat_id", entity.id.as_str());
    for (key, value) in &entity.attrs {
        if key != "brat_id" && schema.contains(&key.as_str()) {
            ann.set(key.clone(), value.as_str());
        }
    }
    ann
}

/// Build one relation layer, reordering arguments so that the one starting
/// first is always Arg1. Directional relation types are relabeled on swap.
fn build_relation_layer(
    document: &Document,
    layer_name: &str,
    relations: &[RawRelation],
    locations: &HashMap<&str, &[(usize, usize)]>,
    argument_relations: bool,
) -> Result<Layer> {
    let mut layer = Layer::new(layer_name, RELATION_ATTRIBUTES)
        .enveloping(BRAT_BASE_LAYER)
        .ambiguous();
    for relation in relations {
        if (relation.kind == "has_Argument") != argument_relations {
            continue;
        }
        let (Some(&arg1_loc), Some(&arg2_loc)) = (
            locations.get(relation.arg1.as_str()),
            locations.get(relation.arg2.as_str()),
        ) else {
            log::warn!(
                "relation {} references unknown entity ({} / {}); skipped",
                relation.id,
                relation.arg1,
                relation.arg2
            );
            continue;
        };
        let mut kind = relation.kind.clone();
        let (mut a_loc, mut b_loc) = (arg1_loc, arg2_loc);
        if a_loc[0] > b_loc[0] {
            std::mem::swap(&mut a_loc, &mut b_loc);
            kind = reversed_relation_type(&kind);
        }
        let a_text = joined_text(document, a_loc);
        let b_text = joined_text(document, b_loc);
        let ann = Annotation::new()
            .with("brat_id", relation.id.as_str())
            .with("rel_type", kind)
            .with("a_text", a_text)
            .with("b_text", b_text)
            .with("b_index", a_loc.len().to_string());
        let mut ranges = a_loc.to_vec();
        ranges.extend_from_slice(b_loc);
        layer.add_annotation(Span::multi(ranges)?, ann)?;
    }
    Ok(layer)
}

fn joined_text(document: &Document, ranges: &[(usize, usize)]) -> String {
    ranges
        .iter()
        .map(|&(s, e)| document.slice(s, e))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(start: usize, end: usize, text: Option<&str>) -> TimexRecord {
        TimexRecord {
            tid: "t1".into(),
            kind: "DATE".into(),
            value: Some("1999".into()),
            temporal_function: None,
            anchor_time_id: None,
            modifier: None,
            quant: None,
            freq: None,
            begin_point: None,
            end_point: None,
            part_of_interval: None,
            comment: None,
            start,
            end,
            text: text.map(str::to_string),
        }
    }

    #[test]
    fn test_location_without_literal_is_trusted() {
        let chars: Vec<char> = "31.12.1997 saabus".chars().collect();
        assert_eq!(
            resolve_location(&chars, &record(0, 10, None)).unwrap(),
            (0, 10)
        );
    }

    #[test]
    fn test_literal_matches_after_despacing_phrase() {
        // phrase "31. 12. 1997" vs reconstructed token "31.12.1997"
        let chars: Vec<char> = "31.12.1997 saabus".chars().collect();
        assert_eq!(
            resolve_location(&chars, &record(0, 10, Some("31. 12. 1997"))).unwrap(),
            (0, 10)
        );
    }

    #[test]
    fn test_literal_matches_after_despacing_both() {
        // phrase "kell 19. 08" vs slice "kell 19.08"
        let chars: Vec<char> = "täna kell 19.08 õhtul".chars().collect();
        assert_eq!(
            resolve_location(&chars, &record(5, 15, Some("kell 19. 08"))).unwrap(),
            (5, 15)
        );
    }

    #[test]
    fn test_literal_substring_relocates() {
        // phrase "1899-" inside token "1899-1902"
        let chars: Vec<char> = "aastatel 1899-1902 elas".chars().collect();
        let loc = resolve_location(&chars, &record(9, 18, Some("1899-"))).unwrap();
        assert_eq!(loc, (9, 14));
        let s: String = chars[loc.0..loc.1].iter().collect();
        assert_eq!(s, "1899-");
    }

    #[test]
    fn test_overlap_search_single_candidate() {
        // phrase extends past the recorded location but occurs once there
        let chars: Vec<char> = "eile kell kuus toimus".chars().collect();
        let loc = resolve_location(&chars, &record(5, 9, Some("kell kuus"))).unwrap();
        assert_eq!(loc, (5, 14));
    }

    #[test]
    fn test_unresolvable_literal_is_fatal() {
        let chars: Vec<char> = "homme hommikul".chars().collect();
        let err = resolve_location(&chars, &record(0, 5, Some("eile"))).unwrap_err();
        assert!(matches!(err, Error::OffsetResolution(_)));
    }

    #[test]
    fn test_ambiguous_overlap_is_fatal() {
        // the despaced literal occurs twice inside the recorded location
        let chars: Vec<char> = "kell kell".chars().collect();
        let err = resolve_location(&chars, &record(0, 9, Some("ke ll"))).unwrap_err();
        assert!(matches!(err, Error::OffsetResolution(_)));
    }

    #[test]
    fn test_relation_arguments_reordered_with_type_swap() {
        let mut doc = Document::new("homme tuleb koosolek");
        let entities = vec![
            ResolvedEntity {
                id: "T1".into(),
                kind: "Timex".into(),
                spans: vec![(0, 5)],
                attrs: HashMap::new(),
            },
            ResolvedEntity {
                id: "T2".into(),
                kind: "Event".into(),
                spans: vec![(12, 20)],
                attrs: HashMap::new(),
            },
        ];
        let relations = vec![RawRelation {
            id: "R1".into(),
            kind: "AFTER".into(),
            arg1: "T2".into(),
            arg2: "T1".into(),
        }];
        build_brat_layers(&mut doc, &entities, &relations).unwrap();
        let tlinks = doc.layer("tlinks").unwrap();
        assert_eq!(tlinks.len(), 1);
        let ann = &tlinks.spans()[0].annotations[0];
        assert_eq!(ann.get("rel_type").as_str(), Some("BEFORE"));
        assert_eq!(ann.get("a_text").as_str(), Some("homme"));
        assert_eq!(ann.get("b_text").as_str(), Some("koosolek"));
        assert_eq!(ann.get("b_index").as_str(), Some("1"));
        assert!(tlinks.spans()[0].span.start() <= 5);
    }

    #[test]
    fn test_dangling_relation_endpoint_skipped() {
        let mut doc = Document::new("homme tuleb koosolek");
        let entities = vec![ResolvedEntity {
            id: "T1".into(),
            kind: "Timex".into(),
            spans: vec![(0, 5)],
            attrs: HashMap::new(),
        }];
        let relations = vec![RawRelation {
            id: "R1".into(),
            kind: "BEFORE".into(),
            arg1: "T1".into(),
            arg2: "T9".into(),
        }];
        build_brat_layers(&mut doc, &entities, &relations).unwrap();
        assert!(doc.layer("tlinks").unwrap().is_empty());
    }
}
