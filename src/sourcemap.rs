//! Source-map construction for the generated module.
//!
//! Implements the subset of the source-map v3 format the generator needs:
//! interned sources with embedded content, line-level mappings and
//! base64-VLQ serialization of the `mappings` field. Maps are seeded under
//! a content-hashed virtual filename so dev-server caches never serve a
//! stale map for a recompiled file.

use crate::cache::hash_sum;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// Lines that carry no mappable code: blank or a bare `//` comment.
    static ref BLANK_LINE_RE: Regex = Regex::new(r"^(?://)?\s*$").unwrap();
}

const BASE64_CHARS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// One mapping. Generated line is 1-based, columns are 0-based; a mapping
/// without `original_line` maps generated output to no source at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_column: u32,
    pub source: Option<u32>,
    pub original_line: Option<u32>,
    pub original_column: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub file: Option<String>,
    pub sources: Vec<String>,
    pub sources_content: Vec<Option<String>>,
    pub names: Vec<String>,
    pub mappings: Vec<Mapping>,
}

/// The serialized v3 shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSourceMap {
    pub version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub sources: Vec<String>,
    pub sources_content: Vec<Option<String>>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a source path, returning its index.
    pub fn source_index(&mut self, source: &str) -> u32 {
        if let Some(pos) = self.sources.iter().position(|s| s == source) {
            return pos as u32;
        }
        self.sources.push(source.to_string());
        self.sources_content.push(None);
        (self.sources.len() - 1) as u32
    }

    pub fn set_source_content(&mut self, source: &str, content: &str) {
        let index = self.source_index(source) as usize;
        self.sources_content[index] = Some(content.to_string());
    }

    pub fn add_mapping(&mut self, mapping: Mapping) {
        self.mappings.push(mapping);
    }

    /// Column-0 line mapping, the granularity the generator works at.
    pub fn add_line_mapping(&mut self, source: &str, original_line: u32, generated_line: u32) {
        let index = self.source_index(source);
        self.mappings.push(Mapping {
            generated_line,
            generated_column: 0,
            source: Some(index),
            original_line: Some(original_line),
            original_column: Some(0),
        });
    }

    pub fn to_raw(&self) -> RawSourceMap {
        RawSourceMap {
            version: 3,
            file: self.file.clone(),
            sources: self.sources.clone(),
            sources_content: self.sources_content.clone(),
            names: self.names.clone(),
            mappings: serialize_mappings(&self.mappings),
        }
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&self.to_raw()).unwrap_or_default()
    }
}

/// Cache-busting virtual filename: `basename?<hash(path + content)>`.
pub fn map_file_name(file_path: &str, content: &str) -> String {
    let base = file_path
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_path);
    format!("{}?{}", base, hash_sum(&format!("{}{}", file_path, content)))
}

/// Map every code-carrying line of `generated` onto itself, with the full
/// original file embedded as source content. Used to seed the input map a
/// script or style backend composes against.
pub fn identity_map(file_name: &str, source: &str, generated: &str) -> SourceMap {
    let mut map = SourceMap::new();
    map.set_source_content(file_name, source);

    for (index, line) in generated.split('\n').enumerate() {
        if !BLANK_LINE_RE.is_match(line.trim_end_matches('\r')) {
            map.add_line_mapping(file_name, index as u32 + 1, index as u32 + 1);
        }
    }
    map
}

fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq: u64 = if value < 0 {
        (((-value) as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };

    loop {
        let mut digit = (vlq & 0b1_1111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b10_0000;
        }
        out.push(BASE64_CHARS[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

fn serialize_mappings(mappings: &[Mapping]) -> String {
    let mut sorted: Vec<&Mapping> = mappings.iter().collect();
    sorted.sort_by_key(|m| (m.generated_line, m.generated_column));

    let max_line = sorted.last().map(|m| m.generated_line).unwrap_or(0);
    let mut out = String::new();
    let mut iter = sorted.into_iter().peekable();

    // Source index and original position deltas run across lines; the
    // generated column delta resets per line.
    let mut prev_source: i64 = 0;
    let mut prev_orig_line: i64 = 0;
    let mut prev_orig_col: i64 = 0;

    for line in 1..=max_line {
        if line > 1 {
            out.push(';');
        }
        let mut prev_gen_col: i64 = 0;
        let mut first = true;

        while iter.peek().map(|m| m.generated_line) == Some(line) {
            let mapping = iter.next().expect("peeked mapping");
            if !first {
                out.push(',');
            }
            first = false;

            let gen_col = mapping.generated_column as i64;
            encode_vlq(gen_col - prev_gen_col, &mut out);
            prev_gen_col = gen_col;

            if let (Some(source), Some(original_line)) = (mapping.source, mapping.original_line) {
                encode_vlq(source as i64 - prev_source, &mut out);
                prev_source = source as i64;

                let orig_line = original_line as i64 - 1;
                encode_vlq(orig_line - prev_orig_line, &mut out);
                prev_orig_line = orig_line;

                let orig_col = mapping.original_column.unwrap_or(0) as i64;
                encode_vlq(orig_col - prev_orig_col, &mut out);
                prev_orig_col = orig_col;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vlq_known_values() {
        let mut out = String::new();
        encode_vlq(0, &mut out);
        assert_eq!(out, "A");

        let mut out = String::new();
        encode_vlq(1, &mut out);
        assert_eq!(out, "C");

        let mut out = String::new();
        encode_vlq(-1, &mut out);
        assert_eq!(out, "D");

        let mut out = String::new();
        encode_vlq(16, &mut out);
        assert_eq!(out, "gB");
    }

    #[test]
    fn test_identity_map_skips_blank_and_comment_lines() {
        let map = identity_map("app.sfc?abc", "full file", "let a = 1\n\n//\nlet b = 2");
        let lines: Vec<u32> = map
            .mappings
            .iter()
            .map(|m| m.original_line.unwrap())
            .collect();
        assert_eq!(lines, vec![1, 4]);
        assert_eq!(map.sources, vec!["app.sfc?abc".to_string()]);
        assert_eq!(map.sources_content[0].as_deref(), Some("full file"));
    }

    #[test]
    fn test_map_file_name_is_content_addressed() {
        let a = map_file_name("dir/app.sfc", "one");
        let b = map_file_name("dir/app.sfc", "two");
        assert!(a.starts_with("app.sfc?"));
        assert!(b.starts_with("app.sfc?"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_serialized_shape_is_v3() {
        let mut map = SourceMap::new();
        map.set_source_content("x?1", "content");
        map.add_line_mapping("x?1", 1, 1);
        map.add_line_mapping("x?1", 2, 2);

        let raw = map.to_raw();
        assert_eq!(raw.version, 3);
        // Line 1: [0, 0, 0, 0]; line 2: [0, 0, +1, 0].
        assert_eq!(raw.mappings, "AAAA;AACA");

        let json = map.to_json_string();
        assert!(json.contains("\"version\":3"));
        assert!(json.contains("\"sourcesContent\""));
    }

    #[test]
    fn test_mappings_without_source_emit_single_field() {
        let mut map = SourceMap::new();
        map.add_mapping(Mapping {
            generated_line: 1,
            generated_column: 0,
            source: None,
            original_line: None,
            original_column: None,
        });
        assert_eq!(map.to_raw().mappings, "A");
    }
}
