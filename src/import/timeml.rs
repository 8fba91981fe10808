//! Importer for TimeML-style XML files.
//!
//! The file's layout is preserved as-is: after stripping the XML prolog and
//! the root element, the content is scanned character by character. Runs of
//! consecutive tags are extracted greedily; everything else accumulates into
//! the plain text buffer, so annotation offsets are simply the number of
//! plain characters seen so far.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::builder::build_timex_layer;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::import::GOLD_TIMEX_LAYER;
use crate::link::link_raw_timexes;
use crate::record::RawTimex;
use crate::tag::{parse_tag_attributes, QuoteStyle};

static XML_PROLOG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\?xml[^<>]+>").expect("valid regex"));
static ROOT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?TimeML>").expect("valid regex"));

/// Characters stripped from the start of an annotated phrase.
const TRIM_LEADING: &[char] = &['«'];
/// Characters stripped from the end of an annotated phrase.
const TRIM_TRAILING: &[char] = &['?', ',', '!', '»'];

/// Import one TimeML file. Returns `None` when the file has no text content.
pub fn import_timeml_file(
    path: impl AsRef<Path>,
    layer_name: &str,
) -> Result<Option<Document>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    import_timeml_str(&content, &file_name, layer_name)
}

/// Import one TimeML document from its file content.
pub fn import_timeml_str(
    content: &str,
    file_name: &str,
    layer_name: &str,
) -> Result<Option<Document>> {
    let content = XML_PROLOG.replace_all(content, "");
    let content = ROOT_TAG.replace_all(&content, "");
    let content = content.trim();
    let chars: Vec<char> = content.chars().collect();

    let mut clean_text: Vec<char> = Vec::new();
    let mut raw_timexes: Vec<RawTimex> = Vec::new();
    let mut open_timexes: Vec<RawTimex> = Vec::new();

    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '<' {
            let (tags, last) = extract_tags_from_position(&chars, i);
            if tags.is_empty() {
                return Err(Error::parse(format!(
                    "unterminated tag at position {i} in {file_name:?}"
                )));
            }
            for tag_str in &tags {
                let lower = tag_str.to_lowercase();
                if lower.starts_with("<timex") {
                    let attribs = parse_tag_attributes(tag_str, QuoteStyle::Double)?;
                    if lower.trim_end().ends_with("/>") {
                        raw_timexes.push(RawTimex::from_attrs(attribs));
                    } else {
                        let mut timex = RawTimex::from_attrs(attribs);
                        timex.start = Some(clean_text.len());
                        open_timexes.push(timex);
                    }
                } else if lower.starts_with("</timex") {
                    let Some(mut timex) = open_timexes.pop() else {
                        return Err(Error::parse(format!(
                            "closing tag without a matching opening tag: {tag_str}"
                        )));
                    };
                    timex.end = Some(clean_text.len());
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
                }
            }
            i = last;
        } else {
            clean_text.push(chars[i]);
        }
        i += 1;
    }
    if let Some(timex) = open_timexes.pop() {
        return Err(Error::parse(format!(
            "annotation scope left open at end of file: {}",
            timex.describe()
        )));
    }
    if clean_text.is_empty() {
        return Ok(None);
    }

    trim_timex_bounds(&clean_text, &mut raw_timexes)?;

    let text: String = clean_text.iter().collect();
    let token_count = text.split_whitespace().count();
    let mut document = Document::new(text);
    document
        .meta
        .insert("source_file".to_string(), file_name.to_string());
    document
        .meta
        .insert("_original_token_count".to_string(), token_count.to_string());

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
    let timex_layer = build_timex_layer(&document, &linked.records, layer_name)?;
    document.add_layer(timex_layer)?;
    Ok(Some(document))
}

/// Convenience wrapper using the default gold layer name.
pub fn import_timeml(content: &str, file_name: &str) -> Result<Option<Document>> {
    import_timeml_str(content, file_name, GOLD_TIMEX_LAYER)
}

/// Extract all consecutive tags starting at `pos`. Returns the tags and the
/// position of the final tag's closing `>`.
fn extract_tags_from_position(content: &[char], pos: usize) -> (Vec<String>, usize) {
    let mut tags = Vec::new();
    let mut pos = pos;
    if content.get(pos) == Some(&'<') {
        let mut cur_tag: Vec<char> = Vec::new();
        while pos < content.len() {
            let symbol = content[pos];
            cur_tag.push(symbol);
            if symbol == '>' {
                tags.push(cur_tag.iter().collect());
                if content.get(pos + 1) == Some(&'<') {
                    cur_tag = Vec::new();
                } else {
                    break;
                }
            }
            pos += 1;
        }
    }
    (tags, pos)
}

/// Trim annotated-phrase bounds: leading whitespace and opening guillemets
/// are skipped, trailing whitespace and stray sentence punctuation dropped.
fn trim_timex_bounds(clean_text: &[char], raw_timexes: &mut [RawTimex]) -> Result<()> {
    for timex in raw_timexes.iter_mut() {
        let (Some(mut start), Some(mut end)) = (timex.start, timex.end) else {
            continue;
        };
        if start >= clean_text.len() || end > clean_text.len() {
            return Err(Error::offset_resolution(format!(
                "offsets ({start}, {end}) fall outside the text for {}",
                timex.describe()
            )));
        }
        while start < end
            && (clean_text[start].is_whitespace() || TRIM_LEADING.contains(&clean_text[start]))
        {
            start += 1;
        }
        while end > start
            && (clean_text[end - 1].is_whitespace() || TRIM_TRAILING.contains(&clean_text[end - 1]))
        {
            end -= 1;
        }
        if start >= end {
            return Err(Error::offset_resolution(format!(
                "annotated phrase is empty after boundary trimming: {}",
                timex.describe()
            )));
        }
        timex.start = Some(start);
        timex.end = Some(end);
    }
    Ok(())
}
