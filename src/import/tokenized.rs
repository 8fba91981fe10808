//! Importer for the tag-embedded token corpus format.
//!
//! Input is line-oriented: one token or one tag per line. Word-analysis
//! lines carry several 4-space-separated fields, the first being the surface
//! token. Text is reconstructed by joining tokens with configurable token,
//! sentence and paragraph separators while tracking the running character
//! offset; annotation tags open and close scopes on a stack, so offsets for
//! the annotated phrases come out in reconstructed-text coordinates.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

use crate::builder::build_timex_layer;
use crate::document::{Document, Layer, Span};
use crate::error::{Error, Result};
use crate::import::GOLD_TIMEX_LAYER;
use crate::link::link_raw_timexes;
use crate::record::RawTimex;
use crate::tag::{parse_tag_attributes, QuoteStyle};

static SINGLE_TAG_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(<[^<>]+>)\s*$").expect("valid regex"));

/// Field separator of word-analysis lines.
const ANALYSIS_SEP: &str = "    ";

/// Separators and naming used while reconstructing text.
#[derive(Debug, Clone)]
pub struct TokenizedImportOptions {
    /// String joining consecutive tokens.
    pub token_sep: String,
    /// String appended at every sentence end.
    pub sentence_sep: String,
    /// String inserted at paragraph boundaries.
    pub paragraph_sep: String,
    /// Name of the produced timex layer.
    pub layer_name: String,
    /// Derive a subcorpus name from the file name.
    pub add_subcorpus_name: bool,
}

impl Default for TokenizedImportOptions {
    fn default() -> Self {
        Self {
            token_sep: " ".to_string(),
            sentence_sep: "\n".to_string(),
            paragraph_sep: "\n\n".to_string(),
            layer_name: GOLD_TIMEX_LAYER.to_string(),
            add_subcorpus_name: true,
        }
    }
}

/// Import one corpus file. Returns `None` for files without any tokens.
pub fn import_tokenized_file(
    path: impl AsRef<Path>,
    options: &TokenizedImportOptions,
) -> Result<Option<Document>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    import_tokenized_str(&content, &file_name, options)
}

/// Import one corpus document from its file content.
pub fn import_tokenized_str(
    content: &str,
    file_name: &str,
    options: &TokenizedImportOptions,
) -> Result<Option<Document>> {
    let mut ignore_part: Vec<String> = Vec::new();
    let mut inside_ignore = false;
    let mut prev_was_sent_end = false;
    let mut metadata: Vec<BTreeMap<String, String>> = Vec::new();
    let mut tokens: Vec<String> = Vec::new();
    let mut text_len = 0usize;
    let mut token_count = 0usize;
    let mut sentence_locs: Vec<(usize, Option<usize>)> = Vec::new();
    let mut raw_timexes: Vec<RawTimex> = Vec::new();
    let mut open_timexes: Vec<(RawTimex, usize)> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if let Some(caps) = SINGLE_TAG_LINE.captures(line) {
            let tag_str = caps.get(1).map_or("", |m| m.as_str());
            let lower = tag_str.to_lowercase();
            if lower.starts_with("<timex") {
                let attribs = parse_tag_attributes(tag_str, QuoteStyle::Double)?;
                if lower.trim_end().ends_with("/>") {
                    // span-less record: document creation time or an
                    // implicit interval/time point
                    raw_timexes.push(RawTimex::from_attrs(attribs));
                } else {
                    let mut start_pos = text_len;
                    if !tokens.is_empty() && !prev_was_sent_end {
                        start_pos += options.token_sep.chars().count();
                    }
                    open_timexes.push((RawTimex::from_attrs(attribs), start_pos));
                }
            } else if lower.starts_with("</timex") {
                let Some((mut timex, start_pos)) = open_timexes.pop() else {
                    return Err(Error::parse(format!(
                        "closing tag without a matching opening tag: {tag_str}"
                    )));
                };
                timex.start = Some(start_pos);
                timex.end = Some(text_len);
                if timex.tid().is_none() {
                    return Err(Error::parse(format!(
                        "timex missing attribute \"tid\": {}",
                        timex.describe()
                    )));
                }
                if timex.kind().is_none() {
                    return Err(Error::parse(format!(
                        "timex missing attribute \"type\": {}",
                        timex.describe()
                    )));
                }
                raw_timexes.push(timex);
            } else if lower.starts_with("<ignoreeri") {
                inside_ignore = true;
            } else if lower.starts_with("</ignoreeri") {
                inside_ignore = false;
                let cur_metadata = parse_doc_metadata(&ignore_part)?;
                ignore_part.clear();
                if !metadata.is_empty() && !tokens.is_empty() {
                    // repeated metadata block: this position is a paragraph
                    // boundary
                    if tokens.last().map(String::as_str) == Some(options.sentence_sep.as_str())
                        && options.paragraph_sep.contains(&options.sentence_sep)
                    {
                        text_len += options.paragraph_sep.chars().count()
                            - options.sentence_sep.chars().count();
                        *tokens.last_mut().expect("non-empty") = options.paragraph_sep.clone();
                    } else {
                        tokens.push(options.paragraph_sep.clone());
                        text_len += options.paragraph_sep.chars().count();
                    }
                } else {
                    metadata.push(cur_metadata);
                }
            } else if lower.starts_with("<s>") {
                sentence_locs.push((text_len, None));
            } else if lower.starts_with("</s>") {
                tokens.push(options.sentence_sep.clone());
                text_len += options.sentence_sep.chars().count();
                match sentence_locs.last_mut() {
                    Some(loc) if loc.1.is_none() => loc.1 = Some(text_len),
                    _ => {
                        return Err(Error::parse(format!(
                            "sentence end without a matching sentence start: {tag_str}"
                        )))
                    }
                }
                prev_was_sent_end = true;
            }
        } else if inside_ignore {
            ignore_part.push(line.to_string());
        } else if line.contains(ANALYSIS_SEP) {
            let word_token = line.split(ANALYSIS_SEP).next().unwrap_or("");
            if !tokens.is_empty() && !prev_was_sent_end {
                tokens.push(options.token_sep.clone());
                text_len += options.token_sep.chars().count();
            }
            text_len += word_token.chars().count();
            tokens.push(word_token.to_string());
            token_count += 1;
            prev_was_sent_end = false;
        } else if !line.is_empty() {
            return Err(Error::parse(format!("unexpected line format {line:?}")));
        }
    }

    if let Some((timex, _)) = open_timexes.pop() {
        return Err(Error::parse(format!(
            "annotation scope left open at end of file: {}",
            timex.describe()
        )));
    }
    if inside_ignore {
        return Err(Error::parse(
            "metadata block left open at end of file".to_string(),
        ));
    }
    if tokens.is_empty() {
        return Ok(None);
    }
    if metadata.is_empty() {
        return Err(Error::parse(format!(
            "no metadata block found in {file_name:?}"
        )));
    }
    if metadata.len() > 1 {
        log::warn!(
            "unexpected number of metadata blocks ({}); using only the first",
            metadata.len()
        );
    }

    let text: String = tokens.concat();
    debug_assert_eq!(text.chars().count(), text_len);

    let mut document = Document::new(text);
    document
        .meta
        .insert("source_file".to_string(), file_name.to_string());
    for (k, v) in &metadata[0] {
        document.meta.insert(k.clone(), v.clone());
    }
    document
        .meta
        .insert("_original_token_count".to_string(), token_count.to_string());
    if options.add_subcorpus_name && metadata.len() == 1 {
        document
            .meta
            .insert("_subcorpus".to_string(), subcorpus_name(file_name)?);
    }

    let linked = link_raw_timexes(&raw_timexes)?;
    if let Some((value, comment)) = &linked.dct {
        document
            .meta
            .insert("document_creation_time".to_string(), value.clone());
        if let Some(comment) = comment {
            document
                .meta
                .insert("dct_comment".to_string(), comment.clone());
        }
    }

    let mut sentences = Layer::new("sentences", &[]);
    for (start, end) in sentence_locs {
        if let Some(end) = end {
            sentences.add_annotation(Span::new(start, end), Default::default())?;
        }
    }
    document.add_layer(sentences)?;

    let timex_layer = build_timex_layer(&document, &linked.records, &options.layer_name)?;
    document.add_layer(timex_layer)?;
    Ok(Some(document))
}

/// Extract document metadata from the content of an ignore block:
/// pipe-delimited `key: value` fields.
fn parse_doc_metadata(ignore_content: &[String]) -> Result<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::new();
    let ignore_str = ignore_content.join(" ");
    for field_str in ignore_str.split('|') {
        let field_str = field_str.trim();
        if field_str.is_empty() || !field_str.contains(' ') {
            continue;
        }
        let mut parts = field_str.split_whitespace();
        let first = parts.next().unwrap_or("");
        if let Some(key) = first.strip_suffix(':') {
            let value = parts.collect::<Vec<_>>().join(" ");
            if let Some(previous) = metadata.get(key) {
                if previous != &value {
                    log::warn!(
                        "conflicting metadata for key {key:?}: {previous:?} vs {value:?}; using the last value"
                    );
                }
            }
            metadata.insert(key.to_string(), value);
        } else {
            return Err(Error::parse(format!(
                "unexpected metadata field: {field_str:?}"
            )));
        }
    }
    Ok(metadata)
}

/// Derive the subcorpus name from a corpus file name (the prefix before the
/// first underscore, with historical short forms expanded).
fn subcorpus_name(file_name: &str) -> Result<String> {
    if !file_name.contains('_') {
        return Err(Error::parse(format!(
            "cannot derive subcorpus name from file name {file_name:?}"
        )));
    }
    let prefix = file_name.split('_').next().unwrap_or("");
    Ok(match prefix {
        "sea" => "seadused".to_string(),
        "rkogu" => "riigikogu_stenogrammid".to_string(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::AttrValue;

    const SAMPLE: &str = "<ignoreeri>\n\
        allikas: aja_EPL_1998 | kuup: 12.06.1998\n\
        </ignoreeri>\n\
        <s>\n\
        <TIMEX tid=\"t1\" type=\"DATE\" value=\"1998-06-10\" temporalFunction=\"true\">\n\
        Üleeilne    üleeilne+0\n\
        päev    päev+0\n\
        </TIMEX>\n\
        oli    olema+0\n\
        soe    soe+0\n\
        </s>\n\
        <TIMEX tid=\"t0\" type=\"DATE\" value=\"1998-06-12\" functionInDocument=\"CREATION_TIME\"/>\n";

    #[test]
    fn test_text_reconstruction_and_offsets() {
        let options = TokenizedImportOptions::default();
        let doc = import_tokenized_str(SAMPLE, "aja_epl_1998.t3", &options)
            .unwrap()
            .unwrap();
        assert_eq!(doc.text(), "Üleeilne päev oli soe\n");
        let layer = doc.layer(GOLD_TIMEX_LAYER).unwrap();
        assert_eq!(layer.len(), 1);
        let span = &layer.spans()[0];
        assert_eq!((span.span.start(), span.span.end()), (0, 13));
        assert_eq!(doc.span_text(&span.span), "Üleeilne päev");
        assert_eq!(
            span.annotations[0].get("value").as_str(),
            Some("1998-06-10")
        );
        assert_eq!(
            span.annotations[0].get("temporal_function"),
            &AttrValue::Bool(true)
        );
    }

    #[test]
    fn test_metadata_and_creation_time() {
        let options = TokenizedImportOptions::default();
        let doc = import_tokenized_str(SAMPLE, "aja_epl_1998.t3", &options)
            .unwrap()
            .unwrap();
        assert_eq!(
            doc.meta.get("allikas").map(String::as_str),
            Some("aja_EPL_1998")
        );
        assert_eq!(
            doc.meta.get("document_creation_time").map(String::as_str),
            Some("1998-06-12")
        );
        assert_eq!(doc.meta.get("_subcorpus").map(String::as_str), Some("aja"));
        assert_eq!(
            doc.meta.get("_original_token_count").map(String::as_str),
            Some("4")
        );
    }

    #[test]
    fn test_sentence_layer_recorded() {
        let options = TokenizedImportOptions::default();
        let doc = import_tokenized_str(SAMPLE, "aja_epl_1998.t3", &options)
            .unwrap()
            .unwrap();
        let sentences = doc.layer("sentences").unwrap();
        assert_eq!(sentences.len(), 1);
        let span = &sentences.spans()[0].span;
        assert_eq!((span.start(), span.end()), (0, 22));
    }

    #[test]
    fn test_repeated_metadata_becomes_paragraph_boundary() {
        let input = "<ignoreeri>\nallikas: a_1\n</ignoreeri>\n\
            <s>\nüks    üks+0\n</s>\n\
            <ignoreeri>\nallikas: a_1\n</ignoreeri>\n\
            <s>\nkaks    kaks+0\n</s>\n";
        let options = TokenizedImportOptions::default();
        let doc = import_tokenized_str(input, "aja_x.t3", &options)
            .unwrap()
            .unwrap();
        assert_eq!(doc.text(), "üks\n\nkaks\n");
    }

    #[test]
    fn test_unclosed_scope_is_fatal() {
        let input = "<ignoreeri>\nallikas: a_1\n</ignoreeri>\n\
            <TIMEX tid=\"t1\" type=\"DATE\">\nhomme    homme+0\n";
        let options = TokenizedImportOptions::default();
        let err = import_tokenized_str(input, "aja_x.t3", &options).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_unexpected_line_is_fatal() {
        let input = "<ignoreeri>\nallikas: a_1\n</ignoreeri>\nplain token line\n";
        let options = TokenizedImportOptions::default();
        let err = import_tokenized_str(input, "aja_x.t3", &options).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_empty_file_yields_no_document() {
        let options = TokenizedImportOptions::default();
        assert!(import_tokenized_str("", "aja_x.t3", &options)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_subcorpus_short_forms() {
        assert_eq!(subcorpus_name("sea_001.t3").unwrap(), "seadused");
        assert_eq!(
            subcorpus_name("rkogu_2001.t3").unwrap(),
            "riigikogu_stenogrammid"
        );
        assert_eq!(subcorpus_name("aja_epl.t3").unwrap(), "aja");
        assert!(subcorpus_name("nounderscore").is_err());
    }
}
