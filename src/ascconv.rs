//! Vendor-specific ASCCONV header parsing (spec §4.B, §6, §9).
//!
//! The header is an ASCII block embedded inside a (possibly large) binary
//! payload file, delimited by the literal lines `### ASCCONV BEGIN` and
//! `### ASCCONV END`. The payload is opened read-only and memory-mapped so
//! only the window between the markers is ever materialized.
use std::collections::BTreeMap;

use camino::Utf8Path;

use crate::error::AscconvError;

const BEGIN_MARKER: &[u8] = b"### ASCCONV BEGIN";
const END_MARKER: &[u8] = b"### ASCCONV END";

/// A parsed ASCCONV value. The format's actual value grammar is a closed
/// enumeration of integer, float, or string.
#[derive(Debug, Clone, PartialEq)]
pub enum AscconvValue {
    Int(i64),
    Float(f64),
    Str(String),
}

/// A nested ASCCONV entry: either a leaf value or a further mapping, built by
/// splitting each `dotted.key` on `.`.
#[derive(Debug, Clone, PartialEq)]
pub enum AscconvNode {
    Leaf(AscconvValue),
    Branch(AscconvTree),
}

pub type AscconvTree = BTreeMap<String, AscconvNode>;

/// Render a parsed tree as `serde_json::Value`, for telemetry sinks that
/// only speak JSON (e.g. [`crate::nats_backend::NatsTelemetry`]).
pub fn ascconv_tree_to_json(tree: &AscconvTree) -> serde_json::Value {
    serde_json::Value::Object(
        tree.iter()
            .map(|(k, v)| (k.clone(), ascconv_node_to_json(v)))
            .collect(),
    )
}

fn ascconv_node_to_json(node: &AscconvNode) -> serde_json::Value {
    match node {
        AscconvNode::Leaf(AscconvValue::Int(i)) => serde_json::Value::from(*i),
        AscconvNode::Leaf(AscconvValue::Float(f)) => serde_json::Value::from(*f),
        AscconvNode::Leaf(AscconvValue::Str(s)) => serde_json::Value::from(s.clone()),
        AscconvNode::Branch(branch) => ascconv_tree_to_json(branch),
    }
}

/// Open `payload_path` read-only, memory-map it, locate the ASCCONV window,
/// and parse it into a nested tree.
pub fn parse_ascconv(payload_path: &Utf8Path) -> Result<AscconvTree, AscconvError> {
    let file = std::fs::File::open(payload_path).map_err(|e| AscconvError::Open(payload_path.to_owned(), e))?;
    // Safety: the file is opened read-only for the lifetime of this mapping and
    // not concurrently truncated by this process; this mirrors the teacher's
    // convention of trusting locally-staged files during a single invocation.
    let mmap = unsafe {
        memmap2::Mmap::map(&file).map_err(|e| AscconvError::Map(payload_path.to_owned(), e))?
    };
    let bytes: &[u8] = &mmap;

    let begin_at = find_subslice(bytes, BEGIN_MARKER)
        .ok_or_else(|| AscconvError::MissingBegin(payload_path.to_owned()))?;
    let end_at = find_subslice(bytes, END_MARKER)
        .ok_or_else(|| AscconvError::MissingEnd(payload_path.to_owned()))?;

    let after_begin_line = bytes[begin_at..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| begin_at + i + 1)
        .unwrap_or(bytes.len());
    let window = if after_begin_line <= end_at {
        &bytes[after_begin_line..end_at]
    } else {
        &bytes[after_begin_line..after_begin_line]
    };

    if !window.is_ascii() {
        return Err(AscconvError::NotAscii(payload_path.to_owned()));
    }
    let text = std::str::from_utf8(window).expect("ascii implies valid utf8");

    let mut tree = AscconvTree::new();
    for line in text.lines() {
        if let Some((key, value)) = parse_line(line) {
            insert_dotted(&mut tree, &key, value);
        }
    }
    Ok(tree)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_line(line: &str) -> Option<(String, AscconvValue)> {
    let mut parts = line.splitn(2, '=');
    let key = parts.next()?.trim();
    let raw_value = parts.next()?.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), parse_value(raw_value)))
}

fn parse_value(raw: &str) -> AscconvValue {
    let unescaped = raw.replace("\"\"", "\"");
    if let Ok(i) = unescaped.parse::<i64>() {
        return AscconvValue::Int(i);
    }
    if let Ok(f) = unescaped.parse::<f64>() {
        return AscconvValue::Float(f);
    }
    if unescaped.len() >= 2 && unescaped.starts_with('"') && unescaped.ends_with('"') {
        return AscconvValue::Str(unescaped[1..unescaped.len() - 1].to_string());
    }
    AscconvValue::Str(unescaped)
}

fn insert_dotted(tree: &mut AscconvTree, dotted_key: &str, value: AscconvValue) {
    let mut segments = dotted_key.split('.').peekable();
    let mut current = tree;
    loop {
        let segment = match segments.next() {
            Some(s) => s,
            None => return,
        };
        if segments.peek().is_none() {
            current.insert(segment.to_string(), AscconvNode::Leaf(value));
            return;
        }
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| AscconvNode::Branch(AscconvTree::new()));
        match entry {
            AscconvNode::Branch(branch) => current = branch,
            AscconvNode::Leaf(_) => {
                *entry = AscconvNode::Branch(AscconvTree::new());
                match entry {
                    AscconvNode::Branch(branch) => current = branch,
                    AscconvNode::Leaf(_) => unreachable!(),
                }
            }
        }
    }
}
