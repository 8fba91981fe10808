//! Exporter to Brat stand-off format.
//!
//! Writes one `.txt`/`.ann` pair per document plus the `annotation.conf`
//! schema file and an `entity_mapping.conf` cross-reference of Brat
//! identifiers to original timex identifiers.
//!
//! Brat counts every newline as two index positions, so exported offsets are
//! shifted by the number of preceding newlines; the Brat importer inverts
//! the same convention.

use std::path::Path;

use crate::document::{AttrValue, Document, Layer};
use crate::error::{Error, Result};
use crate::record::EmbeddedTimex;

/// One exported document: plain text, annotation file content, and the
/// Brat-id to timex-id mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BratExport {
    /// Content of the `.txt` file.
    pub text: String,
    /// Content of the `.ann` file.
    pub ann: String,
    /// `(brat_id, timex_id)` pairs, in annotation order.
    pub mapping: Vec<(String, String)>,
}

/// Convert one document's timex layer to Brat stand-off annotations.
pub fn export_brat_document(
    document: &Document,
    layer_name: &str,
    correct_indexes: bool,
) -> Result<BratExport> {
    let layer = document.layer(layer_name).ok_or_else(|| {
        Error::schema_violation(format!("document has no layer named {layer_name:?}"))
    })?;
    let mut triggers: Vec<String> = Vec::new();
    let mut attributes: Vec<String> = Vec::new();
    let mut notes: Vec<String> = Vec::new();
    let mut mapping: Vec<(String, String)> = Vec::new();

    for (idx, span) in layer.iter().enumerate() {
        let number = idx + 1;
        let annotation = &span.annotations[0];
        let mut start = span.span.start();
        let mut end = span.span.end();
        if correct_indexes {
            start += newlines_before(document.text(), start);
            end += newlines_before(document.text(), end);
        }
        let text = document.span_text(&span.span);
        triggers.push(format!("T{number}\tTimex {start} {end}\t{text}"));
        let kind = display_value(annotation.get("type"));
        attributes.push(format!("A{}\ttype T{number} {kind}", attributes.len() + 1));
        notes.push(format!(
            "#{}\tAnnotatorNotes T{number}\tOriginal: {}",
            notes.len() + 1,
            original_tag(layer, &text, annotation)
        ));
        let tid = annotation
            .get("tid")
            .as_str()
            .unwrap_or_default()
            .to_string();
        mapping.push((format!("T{number}"), tid));
    }

    let ann = format!(
        "{}\n{}\n{}",
        triggers.join("\n"),
        attributes.join("\n"),
        notes.join("\n")
    );
    Ok(BratExport {
        text: document.text().to_string(),
        ann,
        mapping,
    })
}

fn newlines_before(text: &str, char_pos: usize) -> usize {
    text.chars().take(char_pos).filter(|&c| c == '\n').count()
}

/// Re-encode an annotation as the original inline tag, attribute order
/// following the layer schema.
fn original_tag(layer: &Layer, text: &str, annotation: &crate::document::Annotation) -> String {
    let mut out = String::from("<TIMEX");
    out.push_str(&format!(" text={}", quoted(text)));
    for attr in layer.attributes() {
        let value = annotation.get(attr);
        if value.is_null() {
            continue;
        }
        out.push_str(&format!(" {attr}={}", value_repr(value)));
    }
    out.push('>');
    out
}

/// Render a value the way the annotation notes encode them: strings
/// single-quoted, booleans bare `True`/`False`, embedded records as
/// key-value maps in canonical attribute order.
fn value_repr(value: &AttrValue) -> String {
    match value {
        AttrValue::Null => "None".to_string(),
        AttrValue::Str(s) => quoted(s),
        AttrValue::Bool(true) => "True".to_string(),
        AttrValue::Bool(false) => "False".to_string(),
        AttrValue::Record(record) => record_repr(record),
    }
}

fn quoted(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn record_repr(record: &EmbeddedTimex) -> String {
    let mut pairs: Vec<String> = Vec::new();
    let mut push = |key: &str, value: Option<String>| {
        if let Some(value) = value {
            pairs.push(format!("{}: {value}", quoted(key)));
        }
    };
    push("tid", record.tid.as_deref().map(quoted));
    push("type", record.kind.as_deref().map(quoted));
    push("value", record.value.as_deref().map(quoted));
    push(
        "temporal_function",
        record
            .temporal_function
            .map(|b| if b { "True" } else { "False" }.to_string()),
    );
    push("mod", record.modifier.as_deref().map(quoted));
    push("anchor_time_id", record.anchor_time_id.as_deref().map(quoted));
    push("quant", record.quant.as_deref().map(quoted));
    push("freq", record.freq.as_deref().map(quoted));
    push("begin_point", record.begin_point.as_deref().map(quoted));
    push("end_point", record.end_point.as_deref().map(quoted));
    push("comment", record.comment.as_deref().map(quoted));
    format!("{{{}}}", pairs.join(", "))
}

fn display_value(value: &AttrValue) -> String {
    match value {
        AttrValue::Str(s) => s.clone(),
        AttrValue::Bool(true) => "True".to_string(),
        AttrValue::Bool(false) => "False".to_string(),
        AttrValue::Null => "None".to_string(),
        AttrValue::Record(_) => "RECORD".to_string(),
    }
}

/// Content of the Brat `annotation.conf` schema file.
///
/// Attributes cannot be assigned to relations in Brat, so each relation
/// type gets its own TLINK entry.
#[must_use]
pub fn annotation_conf() -> String {
    "[entities]\n\
     Timex\n\
     Event\n\
     Entity\n\
     \n\
     [relations]\n\
     Tlink_BEFORE\tArg1:Timex,\tArg2:Event\n\
     Tlink_AFTER\tArg1:Timex,\tArg2:Event\n\
     Tlink_IS_INCLUDED\tArg1:Timex,\tArg2:Event\n\
     Tlink_INCLUDES\tArg1:Timex,\tArg2:Event\n\
     Tlink_SIMULTANEOUS\tArg1:Timex,\tArg2:Event\n\
     Tlink_VAGUE\tArg1:Timex,\tArg2:Event\n\
     \n\
     Tlink_BEFORE\tArg1:Timex,\tArg2:Entity\n\
     Tlink_AFTER\tArg1:Timex,\tArg2:Entity\n\
     Tlink_IS_INCLUDED\tArg1:Timex,\tArg2:Entity\n\
     Tlink_INCLUDES\tArg1:Timex,\tArg2:Entity\n\
     Tlink_SIMULTANEOUS\tArg1:Timex,\tArg2:Entity\n\
     Tlink_VAGUE\tArg1:Timex,\tArg2:Entity\n\
     \n\
     has_Argument\tArg1:Event,\tArg2:Event\n\
     \n\
     [events]\n\
     \n\
     [attributes]\n\
     type\tArg:Timex, Value:DATE|TIME|DURATION|SET\n\
     class\tArg:Event, Value:OCCURRENCE|REPORTING|PERCEPTION|ASPECTUAL|I_ACTION|I_STATE|STATE|MODAL\n\
     class_confidence\tArg:Event, Value:high|neutral|low\n\
     duration\tArg:Event, Value:instant|seconds|minutes|hours|days|weeks|months|years|centuries|forever\n\
     duration_confidence\tArg:Event, Value:high|neutral|low\n"
        .to_string()
}

/// Export a set of documents into a Brat folder: `.txt`/`.ann` pairs plus
/// `annotation.conf` and `entity_mapping.conf`. With `dry_run`, nothing is
/// written and only the mapping line count is reported.
pub fn write_brat_folder(
    documents: &[(String, Document)],
    out_dir: impl AsRef<Path>,
    layer_name: &str,
    dry_run: bool,
) -> Result<usize> {
    let out_dir = out_dir.as_ref();
    if !dry_run {
        std::fs::create_dir_all(out_dir)?;
    }
    let mut entity_mapping: Vec<String> = Vec::new();
    for (name, document) in documents {
        let export = export_brat_document(document, layer_name, true)?;
        for (brat_id, timex_id) in &export.mapping {
            entity_mapping.push(format!("{name}\t{brat_id} {timex_id}"));
        }
        if !dry_run {
            std::fs::write(out_dir.join(format!("{name}.txt")), &export.text)?;
            std::fs::write(out_dir.join(format!("{name}.ann")), &export.ann)?;
        }
    }
    let exported = entity_mapping.len();
    if !dry_run {
        let mut mapping_content = entity_mapping.join("\n");
        mapping_content.push('\n');
        std::fs::write(out_dir.join("entity_mapping.conf"), mapping_content)?;
        let mut conf = annotation_conf();
        conf.push('\n');
        std::fs::write(out_dir.join("annotation.conf"), conf)?;
    }
    Ok(exported)
}
