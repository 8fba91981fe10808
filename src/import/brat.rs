//! Importer for Brat stand-off annotation files (`.txt` / `.ann` pairs).
//!
//! A `.ann` file mixes four record kinds, recognized by fixed line-prefix
//! patterns: entity lines (`T…`, single- or multi-span), attribute lines
//! (`A…`), annotator notes (`#…`, either a re-encoded original tag or a free
//! comment) and relation lines (`R…`). Unrecognized non-empty lines are
//! reported and skipped.
//!
//! Offsets in the `.ann` file are defined against a text variant where every
//! newline counts as two characters; the importer inverts that convention
//! before slicing, and every corrected span must reproduce the literal text
//! attached to the entity line.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

use crate::builder::{build_brat_layers, ResolvedEntity};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::record::RawRelation;
use crate::tag::{parse_tag_attributes, QuoteStyle};

static ENTITY_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^T[0-9]+\t.*").expect("valid regex"));
static ATTRIB_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^A[0-9]+\t.*").expect("valid regex"));
static NOTES_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9]+\t+AnnotatorNotes.*").expect("valid regex"));
static RELATION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^R[0-9]+\t.*").expect("valid regex"));

static SIMPLE_ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(T[0-9]+)\t+(\S+) ([0-9]+) ([0-9]+)\t(.+)$").expect("valid regex")
});
static ATTRIB_ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(A[0-9]+)\t(\S+) (T[0-9]+) (\S+)$").expect("valid regex"));
static NOTES_ORIGINAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(#[0-9]+)\tAnnotatorNotes (\S+)\tOriginal: (.+)$").expect("valid regex")
});
static NOTES_SUBRECORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(part_of_interval|begin_point|end_point)=\{[^}]+\}").expect("valid regex")
});
static NOTES_FREEFORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#[0-9]+)\tAnnotatorNotes (\S+)\t(.+)$").expect("valid regex"));
static TLINK_RELATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(R[0-9]+)\tTlink_(\S+) Arg1:(\S+) Arg2:(\S+)\t.*$").expect("valid regex")
});
static ARGUMENT_RELATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(R[0-9]+)\thas_Argument Arg1:(\S+) Arg2:(\S+)\t.*$").expect("valid regex")
});

/// A parsed entity line, offsets still in `.ann` coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BratEntity {
    /// Brat identifier (`T1`, `T2`, ...).
    pub id: String,
    /// Entity category (`Timex`, `Event`, `Entity`).
    pub kind: String,
    /// Uncorrected `(start, end)` pairs, one per sub-span.
    pub spans: Vec<(usize, usize)>,
    /// Literal text fragments; one per sub-span when counts agree.
    pub texts: Vec<String>,
    /// Attributes merged from stand-off attribute lines and notes.
    pub attrs: HashMap<String, String>,
    /// True when the entity line used the multi-span form.
    pub multiword: bool,
}

/// All annotations of one `.ann` file, attributes and notes already merged
/// onto their entities.
#[derive(Debug, Clone, Default)]
pub struct BratAnnotations {
    /// Entity records, in file order.
    pub entities: Vec<BratEntity>,
    /// Relation records, in file order.
    pub relations: Vec<RawRelation>,
}

/// Parse a `.ann` file's content.
pub fn parse_ann(content: &str) -> Result<BratAnnotations> {
    let mut entities: Vec<BratEntity> = Vec::new();
    let mut attr_lines: Vec<(String, String, String)> = Vec::new();
    let mut note_lines: Vec<Note> = Vec::new();
    let mut relations: Vec<RawRelation> = Vec::new();

    for line in content.lines() {
        let line = line.trim_end_matches('\n');
        if line.is_empty() {
            continue;
        }
        if ENTITY_LINE.is_match(line) {
            entities.push(parse_entity_line(line)?);
        } else if ATTRIB_LINE.is_match(line) {
            attr_lines.push(parse_attrib_line(line)?);
        } else if NOTES_LINE.is_match(line) {
            note_lines.push(parse_notes_line(line)?);
        } else if RELATION_LINE.is_match(line) {
            relations.push(parse_relation_line(line)?);
        } else {
            log::warn!("cannot parse annotation {line:?}");
        }
    }

    for (entity_id, name, value) in attr_lines {
        let Some(entity) = entities.iter_mut().find(|e| e.id == entity_id) else {
            log::warn!("cannot find entity {entity_id:?} to add attribute value {name}={value}");
            continue;
        };
        merge_attr(&mut entity.attrs, &name, &value)?;
    }
    for note in note_lines {
        match note {
            Note::TimexAttribs { entity_id, attribs } => {
                let Some(entity) = entities.iter_mut().find(|e| e.id == entity_id) else {
                    log::warn!("cannot find entity {entity_id:?} to add attribute values");
                    continue;
                };
                for (name, value) in attribs {
                    merge_attr(&mut entity.attrs, &name, &value)?;
                }
            }
            Note::Comment { entity_id, content } => {
                let Some(entity) = entities.iter_mut().find(|e| e.id == entity_id) else {
                    log::warn!("cannot find entity {entity_id:?} to add comment {content:?}");
                    continue;
                };
                entity
                    .attrs
                    .entry("comment".to_string())
                    .and_modify(|c| {
                        c.push_str(" | ");
                        c.push_str(&content);
                    })
                    .or_insert(content);
            }
        }
    }
    Ok(BratAnnotations {
        entities,
        relations,
    })
}

fn merge_attr(attrs: &mut HashMap<String, String>, name: &str, value: &str) -> Result<()> {
    if let Some(previous) = attrs.get(name) {
        if previous != value {
            return Err(Error::conflicting_attribute(format!(
                "conflicting values for entity attribute {name:?}: {previous:?} vs {value:?}"
            )));
        }
    }
    attrs.insert(name.to_string(), value.to_string());
    Ok(())
}

fn parse_entity_line(line: &str) -> Result<BratEntity> {
    if let Some(caps) = SIMPLE_ENTITY.captures(line) {
        let text = caps[5].to_string();
        let mut attrs = HashMap::new();
        attrs.insert("text".to_string(), text.clone());
        return Ok(BratEntity {
            id: caps[1].to_string(),
            kind: caps[2].to_string(),
            spans: vec![(parse_offset(&caps[3], line)?, parse_offset(&caps[4], line)?)],
            texts: vec![text],
            attrs,
            multiword: false,
        });
    }
    // Multi-span form: "T22\tEvent 1786 1795;1796 1805\tpikendada tellimust"
    if !line.contains(';') {
        return Err(Error::parse(format!(
            "unexpected entity annotation line: {line:?}"
        )));
    }
    let items: Vec<&str> = line.split('\t').collect();
    if items.len() < 3 {
        return Err(Error::parse(format!(
            "unexpected entity annotation line: {line:?}"
        )));
    }
    let type_and_locs: Vec<&str> = items[1].split(' ').collect();
    let kind = type_and_locs
        .first()
        .copied()
        .unwrap_or_default()
        .to_string();
    if kind.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::parse(format!("unexpected entity type {kind:?}")));
    }
    let mut raw_locs: Vec<usize> = Vec::new();
    for loc_str in &type_and_locs[1..] {
        if loc_str.chars().all(|c| c.is_ascii_digit()) && !loc_str.is_empty() {
            raw_locs.push(parse_offset(loc_str, line)?);
        } else if loc_str.contains(';') {
            for part in loc_str.split(';') {
                raw_locs.push(parse_offset(part, line)?);
            }
        } else {
            return Err(Error::parse(format!("unexpected entity loc: {loc_str:?}")));
        }
    }
    if raw_locs.len() % 2 != 0 {
        return Err(Error::parse(format!(
            "uneven number of raw locations in: {line:?}"
        )));
    }
    let spans: Vec<(usize, usize)> = raw_locs.chunks(2).map(|c| (c[0], c[1])).collect();
    let texts: Vec<String> = items[2].split(' ').map(str::to_string).collect();
    if spans.len() != texts.len() {
        log::warn!(
            "different number of entity texts {texts:?} and locations {spans:?} in {line:?}"
        );
    }
    let mut attrs = HashMap::new();
    attrs.insert("text".to_string(), items[2].to_string());
    Ok(BratEntity {
        id: items[0].to_string(),
        kind,
        spans,
        texts,
        attrs,
        multiword: true,
    })
}

fn parse_offset(s: &str, line: &str) -> Result<usize> {
    s.parse()
        .map_err(|_| Error::parse(format!("invalid offset {s:?} in line {line:?}")))
}

fn parse_attrib_line(line: &str) -> Result<(String, String, String)> {
    let caps = ATTRIB_ANNOTATION.captures(line).ok_or_else(|| {
        Error::parse(format!("unexpected attribute annotation line: {line:?}"))
    })?;
    Ok((caps[3].to_string(), caps[2].to_string(), caps[4].to_string()))
}

enum Note {
    TimexAttribs {
        entity_id: String,
        attribs: Vec<(String, String)>,
    },
    Comment {
        entity_id: String,
        content: String,
    },
}

fn parse_notes_line(line: &str) -> Result<Note> {
    if let Some(caps) = NOTES_ORIGINAL.captures(line) {
        let entity_id = caps[2].to_string();
        // Inline sub-records (begin/end points, enclosing intervals) are not
        // re-imported from the note; they get rebuilt by the linker.
        let note_content = NOTES_SUBRECORD.replace_all(&caps[3], "").into_owned();
        let attribs = parse_tag_attributes(&note_content, QuoteStyle::Single)?;
        let mut attribs: Vec<(String, String)> = attribs.into_iter().collect();
        attribs.sort();
        return Ok(Note::TimexAttribs { entity_id, attribs });
    }
    if let Some(caps) = NOTES_FREEFORM.captures(line) {
        return Ok(Note::Comment {
            entity_id: caps[2].to_string(),
            content: caps[3].to_string(),
        });
    }
    Err(Error::parse(format!(
        "unexpected annotation notes line: {line:?}"
    )))
}

fn parse_relation_line(line: &str) -> Result<RawRelation> {
    if let Some(caps) = TLINK_RELATION.captures(line) {
        return Ok(RawRelation {
            id: caps[1].to_string(),
            kind: caps[2].to_string(),
            arg1: caps[3].to_string(),
            arg2: caps[4].to_string(),
        });
    }
    if let Some(caps) = ARGUMENT_RELATION.captures(line) {
        return Ok(RawRelation {
            id: caps[1].to_string(),
            kind: "has_Argument".to_string(),
            arg1: caps[2].to_string(),
            arg2: caps[3].to_string(),
        });
    }
    Err(Error::parse(format!(
        "unexpected relation annotation line: {line:?}"
    )))
}

/// Map a `.ann` offset back onto the plain text: subtract one position per
/// newline preceding the offset. Returns the corrected start and the shift
/// to apply to the matching end offset.
fn corrected_start_and_delta(chars: &[char], start: usize) -> (usize, isize) {
    let mut corrected = start;
    let mut delta: isize = 0;
    let mut i = 0;
    while i < corrected {
        if chars[i] == '\n' {
            corrected -= 1;
            delta -= 1;
        }
        i += 1;
    }
    (corrected, delta)
}

/// Import one Brat document from its `.txt` content and `.ann` content.
pub fn import_brat_document(text: &str, ann: &str, file_stem: &str) -> Result<Document> {
    let annotations = parse_ann(ann)?;
    let chars: Vec<char> = text.chars().collect();

    let mut resolved: Vec<ResolvedEntity> = Vec::new();
    for entity in &annotations.entities {
        let corrected = correct_entity_offsets(&chars, entity, file_stem)?;
        resolved.push(ResolvedEntity {
            id: entity.id.clone(),
            kind: entity.kind.clone(),
            spans: corrected,
            attrs: entity.attrs.clone(),
        });
    }

    let mut document = Document::new(text);
    document
        .meta
        .insert("file".to_string(), file_stem.to_string());
    build_brat_layers(&mut document, &resolved, &annotations.relations)?;
    Ok(document)
}

/// Correct one entity's offsets and verify each sub-span against its literal
/// text fragment. With fewer offset pairs than fragments, substring
/// containment is accepted instead of exact equality.
fn correct_entity_offsets(
    chars: &[char],
    entity: &BratEntity,
    file_stem: &str,
) -> Result<Vec<(usize, usize)>> {
    let mut corrected: Vec<(usize, usize)> = Vec::new();
    let exact = entity.spans.len() == entity.texts.len();
    if !exact && entity.spans.len() > entity.texts.len() {
        return Err(Error::offset_resolution(format!(
            "mismatching number of locations and texts in entity {} of {file_stem:?}",
            entity.id
        )));
    }
    for (idx, &(start, end)) in entity.spans.iter().enumerate() {
        let (corrected_start, delta) = corrected_start_and_delta(chars, start);
        let corrected_end = end
            .checked_add_signed(delta)
            .filter(|&e| corrected_start <= e && e <= chars.len())
            .ok_or_else(|| {
                Error::offset_resolution(format!(
                    "corrected offsets fall outside the text for entity {} of {file_stem:?}",
                    entity.id
                ))
            })?;
        let snippet: String = chars[corrected_start..corrected_end].iter().collect();
        if exact {
            if snippet != entity.texts[idx] {
                return Err(Error::offset_resolution(format!(
                    "{file_stem:?} has mismatching entity texts {snippet:?} vs {:?} in entity {}",
                    entity.texts[idx], entity.id
                )));
            }
        } else {
            if !entity.texts.iter().any(|t| snippet.contains(t.as_str())) {
                return Err(Error::offset_resolution(format!(
                    "{file_stem:?} has mismatching entity texts {snippet:?} vs {:?} in entity {}",
                    entity.texts, entity.id
                )));
            }
            log::warn!(
                "entity {} of {file_stem:?} verified by containment only ({} locations for {} fragments)",
                entity.id,
                entity.spans.len(),
                entity.texts.len()
            );
        }
        corrected.push((corrected_start, corrected_end));
    }
    Ok(corrected)
}

/// Import every `.txt`/`.ann` pair of a folder, sorted by file name.
/// A file missing its counterpart is an error.
pub fn import_brat_folder(folder: impl AsRef<Path>) -> Result<Vec<Document>> {
    let folder = folder.as_ref();
    let mut stems: Vec<String> = Vec::new();
    let mut have_txt: HashMap<String, bool> = HashMap::new();
    let mut have_ann: HashMap<String, bool> = HashMap::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        let (Some(stem), Some(ext)) = (
            path.file_stem().map(|s| s.to_string_lossy().into_owned()),
            path.extension().and_then(|e| e.to_str()),
        ) else {
            continue;
        };
        match ext {
            "txt" => {
                have_txt.insert(stem.clone(), true);
            }
            "ann" => {
                have_ann.insert(stem.clone(), true);
            }
            _ => continue,
        }
        if !stems.contains(&stem) {
            stems.push(stem);
        }
    }
    stems.sort();
    let mut documents = Vec::new();
    for stem in stems {
        if !have_txt.contains_key(&stem) {
            return Err(Error::parse(format!(
                "annotations file {stem:?} is missing its .txt part"
            )));
        }
        if !have_ann.contains_key(&stem) {
            return Err(Error::parse(format!(
                "annotations file {stem:?} is missing its .ann part"
            )));
        }
        let text = std::fs::read_to_string(folder.join(format!("{stem}.txt")))?;
        let ann = std::fs::read_to_string(folder.join(format!("{stem}.ann")))?;
        documents.push(import_brat_document(&text, &ann, &stem)?);
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_entity_line() {
        let e = parse_entity_line("T1\tTimex 0 13\tÜleeilne päev").unwrap();
        assert_eq!(e.id, "T1");
        assert_eq!(e.kind, "Timex");
        assert_eq!(e.spans, vec![(0, 13)]);
        assert_eq!(e.texts, vec!["Üleeilne päev".to_string()]);
        assert!(!e.multiword);
    }

    #[test]
    fn test_multiword_entity_line() {
        let e = parse_entity_line("T16\tEvent 1315 1318;1329 1333;1334 1337\toli kõne all").unwrap();
        assert_eq!(e.spans, vec![(1315, 1318), (1329, 1333), (1334, 1337)]);
        assert_eq!(
            e.texts,
            vec!["oli".to_string(), "kõne".to_string(), "all".to_string()]
        );
        assert!(e.multiword);
    }

    #[test]
    fn test_attribute_merge_conflict() {
        let ann = "T1\tTimex 0 4\thomme\nA1\ttype T1 DATE\nA2\ttype T1 TIME\n";
        let err = parse_ann(ann).unwrap_err();
        assert!(matches!(err, Error::ConflictingAttribute(_)));
    }

    #[test]
    fn test_attribute_merge_idempotent() {
        let ann = "T1\tTimex 0 4\thomme\nA1\ttype T1 DATE\nA2\ttype T1 DATE\n";
        let parsed = parse_ann(ann).unwrap();
        assert_eq!(
            parsed.entities[0].attrs.get("type").map(String::as_str),
            Some("DATE")
        );
    }

    #[test]
    fn test_note_with_original_tag() {
        let ann = "T1\tTimex 0 4\thomme\n\
            #1\tAnnotatorNotes T1\tOriginal: <TIMEX text='homme' tid='t1' type='DATE' value='1998-06-13' temporal_function=True>\n";
        let parsed = parse_ann(ann).unwrap();
        let attrs = &parsed.entities[0].attrs;
        assert_eq!(attrs.get("tid").map(String::as_str), Some("t1"));
        assert_eq!(attrs.get("value").map(String::as_str), Some("1998-06-13"));
        // unquoted boolean is not an attribute pair and is dropped
        assert!(!attrs.contains_key("temporal_function"));
    }

    #[test]
    fn test_note_with_inline_subrecord_stripped() {
        let ann = "T11\tTimex 0 4\t10.-\n\
            #11\tAnnotatorNotes T11\tOriginal: <TIMEX text='10.-' tid='t10' type='DATE' value='2001-09-10' part_of_interval={'tid': 't12', 'type': 'DURATION'}>\n";
        let parsed = parse_ann(ann).unwrap();
        let attrs = &parsed.entities[0].attrs;
        assert_eq!(attrs.get("tid").map(String::as_str), Some("t10"));
        assert!(!attrs.contains_key("part_of_interval"));
    }

    #[test]
    fn test_freeform_note_appended_as_comment() {
        let ann = "T1\tTimex 0 4\thomme\n\
            #1\tAnnotatorNotes T1\tfirst remark\n\
            #2\tAnnotatorNotes T1\tsecond remark\n";
        let parsed = parse_ann(ann).unwrap();
        assert_eq!(
            parsed.entities[0].attrs.get("comment").map(String::as_str),
            Some("first remark | second remark")
        );
    }

    #[test]
    fn test_relation_lines() {
        let ann = "T1\tTimex 0 4\thomme\nT2\tEvent 6 10\ttuli\n\
            R1\tTlink_SIMULTANEOUS Arg1:T1 Arg2:T2\t\nR2\thas_Argument Arg1:T2 Arg2:T1\t\n";
        let parsed = parse_ann(ann).unwrap();
        assert_eq!(parsed.relations.len(), 2);
        assert_eq!(parsed.relations[0].kind, "SIMULTANEOUS");
        assert_eq!(parsed.relations[1].kind, "has_Argument");
    }

    #[test]
    fn test_unrecognized_line_is_skipped() {
        let ann = "T1\tTimex 0 4\thomme\nXYZ not an annotation\n";
        let parsed = parse_ann(ann).unwrap();
        assert_eq!(parsed.entities.len(), 1);
    }

    #[test]
    fn test_newline_offset_correction() {
        // ann offsets count every newline twice: "homme" starts at plain
        // offset 5 but ann offset 6 (one newline precedes it)
        let text = "Tere\nhomme tuleb koosolek";
        let ann = "T1\tTimex 6 11\thomme\n";
        let doc = import_brat_document(text, ann, "doc1").unwrap();
        let layer = doc.layer("timexes").unwrap();
        let span = &layer.spans()[0].span;
        assert_eq!(doc.span_text(span), "homme");
        assert_eq!((span.start(), span.end()), (5, 10));
    }

    #[test]
    fn test_text_mismatch_is_fatal() {
        let text = "Tere homme";
        let ann = "T1\tTimex 0 4\thomme\n";
        let err = import_brat_document(text, ann, "doc1").unwrap_err();
        assert!(matches!(err, Error::OffsetResolution(_)));
    }

    #[test]
    fn test_fewer_locations_than_fragments_accepts_containment() {
        let text = "ta oli seal kõige parem mees";
        // two locations, three fragments: per-span containment check
        let ann = "T1\tEvent 3 11;18 23\toli kõige parem\n";
        let doc = import_brat_document(text, ann, "doc1").unwrap();
        let layer = doc.layer("events").unwrap();
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.spans()[0].span.ranges().len(), 2);
    }
}
