//! Attribute extraction from inline markup tags.
//!
//! Both the tag-embedded corpus format and the Brat note re-encodings carry
//! `key='value'` / `key="value"` attribute pairs inside a single tag string.
//! The quoting convention depends on the source format.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::error::{Error, Result};

static DOUBLE_QUOTED_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([^= ]+)="([^"]+?)""#).expect("valid regex"));

static SINGLE_QUOTED_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^= ]+)='([^']+?)'").expect("valid regex"));

/// Quoting convention of a markup tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `key='value'` pairs (Brat note re-encodings).
    Single,
    /// `key="value"` pairs (corpus tag format).
    Double,
}

impl QuoteStyle {
    fn quote_char(self) -> char {
        match self {
            QuoteStyle::Single => '\'',
            QuoteStyle::Double => '"',
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            QuoteStyle::Single => &SINGLE_QUOTED_ATTR,
            QuoteStyle::Double => &DOUBLE_QUOTED_ATTR,
        }
    }
}

/// Extract names and values of attributes from a markup tag string.
///
/// An odd number of quote characters is a malformed tag. A key repeated with
/// a different value is a conflict; repeating a key with the identical value
/// is tolerated.
pub fn parse_tag_attributes(tag: &str, quote: QuoteStyle) -> Result<HashMap<String, String>> {
    let quotes = tag.chars().filter(|&c| c == quote.quote_char()).count();
    if quotes % 2 != 0 {
        return Err(Error::malformed_tag(format!(
            "uneven number of quotation marks in: {tag}"
        )));
    }
    let mut attribs = HashMap::new();
    for caps in quote.pattern().captures_iter(tag) {
        let key = caps.get(1).map_or("", |m| m.as_str());
        let value = caps.get(2).map_or("", |m| m.as_str());
        if let Some(previous) = attribs.get(key) {
            if previous != value {
                return Err(Error::conflicting_attribute(format!(
                    "attribute {key:?} appears more than once with conflicting values in: {tag}"
                )));
            }
        }
        attribs.insert(key.to_string(), value.to_string());
    }
    Ok(attribs)
}
