//! Identifier linking across raw annotation records.
//!
//! Interval records reference their begin/end points by identifier, and time
//! points may exist only through such references. Linking resolves these
//! cross-references into embedded records, drops redundant implicit
//! intervals, and extracts the document creation time.
//!
//! All lookups go through an explicit identifier table built once per
//! document; cyclic and dangling references surface as key lookups instead of
//! traversal bugs.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::record::{parse_bool_attr, EmbeddedTimex, PointRef, RawTimex, TimexRecord};

/// Identifier of the document creation time record; never treated as an
/// interval point.
const DCT_TID: &str = "t0";

/// Output of linking one document's raw records.
#[derive(Debug, Clone, Default)]
pub struct LinkedTimexes {
    /// Resolved span-bearing records, in input order.
    pub records: Vec<TimexRecord>,
    /// Document creation time `(value, comment)`, when declared.
    pub dct: Option<(String, Option<String>)>,
}

/// Resolve identifier references across one document's raw records.
///
/// Only span-bearing records become [`TimexRecord`]s; span-less records act
/// as the document creation time or as implicit interval points that get
/// embedded where they are referenced.
pub fn link_raw_timexes(raw_timexes: &[RawTimex]) -> Result<LinkedTimexes> {
    check_point_references(raw_timexes)?;

    let mut linked = LinkedTimexes {
        dct: find_creation_time(raw_timexes)?,
        ..LinkedTimexes::default()
    };

    for timex in raw_timexes {
        if !timex.has_span() {
            continue;
        }
        let tid = timex.tid().ok_or_else(|| {
            Error::parse(format!("timex missing attribute \"tid\": {}", timex.describe()))
        })?;
        let kind = timex.kind().ok_or_else(|| {
            Error::parse(format!("timex missing attribute \"type\": {}", timex.describe()))
        })?;

        // A record that serves as some interval's begin or end point carries
        // the interval inline.
        let mut part_of_interval = None;
        if let Some(parent) = parent_interval(timex, raw_timexes) {
            if parent.kind() == Some("DURATION") {
                part_of_interval = Some(EmbeddedTimex::from_raw(parent));
            } else {
                return Err(Error::parse(format!(
                    "unexpected interval timex {} for timex {}",
                    parent.describe(),
                    timex.describe()
                )));
            }
        }

        // An implicit interval whose both points are explicit in text only
        // anchors those points; keeping it would duplicate the annotation.
        if is_removable_interval(timex, raw_timexes) {
            continue;
        }

        let (begin_implicit, end_implicit) = implicit_points(timex, raw_timexes);
        let begin_point = resolve_point(timex.attr("beginPoint"), begin_implicit, raw_timexes);
        let end_point = resolve_point(timex.attr("endPoint"), end_implicit, raw_timexes);

        linked.records.push(TimexRecord {
            tid: tid.to_string(),
            kind: kind.to_string(),
            value: timex.attr("value").map(str::to_string),
            temporal_function: timex.attr("temporalFunction").and_then(parse_bool_attr),
            anchor_time_id: timex.attr("anchorTimeID").map(str::to_string),
            modifier: timex.attr("mod").map(str::to_string),
            quant: timex.attr("quant").map(str::to_string),
            freq: timex.attr("freq").map(str::to_string),
            begin_point,
            end_point,
            part_of_interval,
            comment: timex.attr("comment").map(str::to_string),
            start: timex.start.expect("span presence checked"),
            end: timex.end.expect("span presence checked"),
            text: timex.text().map(str::to_string),
        });
    }
    Ok(linked)
}

/// Turn a begin/end point reference into its resolved form: an embedded copy
/// when the point is implicit, otherwise the plain identifier.
fn resolve_point(
    reference: Option<&str>,
    implicit: Option<&RawTimex>,
    all: &[RawTimex],
) -> Option<PointRef> {
    if let Some(point) = implicit {
        return Some(PointRef::Embedded(EmbeddedTimex::from_raw(point)));
    }
    let id = reference?;
    if id != DCT_TID && !all.iter().any(|t| t.tid() == Some(id)) {
        log::warn!("point reference to unknown timex identifier {id:?}");
    }
    Some(PointRef::Id(id.to_string()))
}

/// Find the interval record (if any) that uses `timex` as its begin or end
/// point. First match wins.
fn parent_interval<'a>(timex: &RawTimex, all: &'a [RawTimex]) -> Option<&'a RawTimex> {
    let tid = timex.tid()?;
    all.iter()
        .find(|other| other.attr("beginPoint") == Some(tid) || other.attr("endPoint") == Some(tid))
}

/// Look up the records referenced by `timex`'s begin/end point attributes.
///
/// With `only_implicit`, points that are themselves anchored in text are
/// discarded. References to the document creation time are never points.
fn child_points<'a>(
    timex: &RawTimex,
    all: &'a [RawTimex],
    only_implicit: bool,
) -> (Option<&'a RawTimex>, Option<&'a RawTimex>) {
    let mut begin = None;
    let mut end = None;
    if timex.attr("beginPoint").is_some() || timex.attr("endPoint").is_some() {
        for other in all {
            let Some(other_tid) = other.tid() else {
                continue;
            };
            if other_tid == DCT_TID {
                continue;
            }
            if timex.attr("beginPoint") == Some(other_tid) {
                begin = Some(other);
            }
            if timex.attr("endPoint") == Some(other_tid) {
                end = Some(other);
            }
        }
    }
    if only_implicit {
        if begin.is_some_and(RawTimex::is_explicit) {
            begin = None;
        }
        if end.is_some_and(RawTimex::is_explicit) {
            end = None;
        }
    }
    (begin, end)
}

fn implicit_points<'a>(
    timex: &RawTimex,
    all: &'a [RawTimex],
) -> (Option<&'a RawTimex>, Option<&'a RawTimex>) {
    child_points(timex, all, true)
}

/// True iff the record is a DURATION interval whose begin and end points are
/// both explicit, text-bearing annotations.
fn is_removable_interval(timex: &RawTimex, all: &[RawTimex]) -> bool {
    if timex.kind() != Some("DURATION") {
        return false;
    }
    let (begin, end) = child_points(timex, all, false);
    begin.is_some_and(|b| b.start.is_some()) && end.is_some_and(|e| e.start.is_some())
}

/// Extract the document creation time record's value and comment.
fn find_creation_time(raw_timexes: &[RawTimex]) -> Result<Option<(String, Option<String>)>> {
    for timex in raw_timexes {
        if timex.attr("functionInDocument") == Some("CREATION_TIME") {
            let value = timex.attr("value").ok_or_else(|| {
                Error::parse(format!(
                    "creation time record has no value: {}",
                    timex.describe()
                ))
            })?;
            return Ok(Some((
                value.to_string(),
                timex.attr("comment").map(str::to_string),
            )));
        }
    }
    Ok(None)
}

/// Fail fast when begin/end point references form a cycle.
///
/// Walks the reference graph through the identifier table; a record revisited
/// on the current walk is a cycle.
fn check_point_references(raw_timexes: &[RawTimex]) -> Result<()> {
    let mut by_tid: HashMap<&str, &RawTimex> = HashMap::new();
    for timex in raw_timexes {
        if let Some(tid) = timex.tid() {
            by_tid.entry(tid).or_insert(timex);
        }
    }
    // Every identifier on a cycle can reach itself; checking each start
    // catches all cycles without tracking full paths.
    for timex in raw_timexes {
        let Some(start_tid) = timex.tid() else {
            continue;
        };
        let mut visited: HashSet<&str> = HashSet::new();
        let mut frontier = point_successors(&by_tid, start_tid);
        while let Some(tid) = frontier.pop() {
            if tid == start_tid {
                return Err(Error::cyclic_reference(format!(
                    "begin/end point references form a cycle through {start_tid:?}: {}",
                    timex.describe()
                )));
            }
            if !visited.insert(tid) {
                continue;
            }
            frontier.extend(point_successors(&by_tid, tid));
        }
    }
    Ok(())
}

fn point_successors<'a>(by_tid: &HashMap<&'a str, &'a RawTimex>, tid: &str) -> Vec<&'a str> {
    by_tid
        .get(tid)
        .map(|record| {
            [record.attr("beginPoint"), record.attr("endPoint")]
                .into_iter()
                .flatten()
                .filter(|&next| next != DCT_TID)
                .collect()
        })
        .unwrap_or_default()
}
