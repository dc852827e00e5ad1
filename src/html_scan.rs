//! Pattern-based extraction of asset references from markup.
//!
//! A tag-scoped scan over quoted attribute values; the leading comment
//! alternative in the tag pattern keeps commented-out markup from being
//! rewritten. Unquoted and malformed attribute values are intentionally
//! not handled.

use regex::{Captures, Regex};

/// One (tag, attributes) pair the template rewriter looks at.
#[derive(Debug, Clone)]
pub struct TransformElement {
    pub tag: String,
    pub attrs: Vec<String>,
}

impl TransformElement {
    pub fn new(tag: &str, attrs: &[&str]) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: attrs.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Image `src`/`srcset` and picture-source `srcset`.
pub fn default_transform_elements() -> Vec<TransformElement> {
    vec![
        TransformElement::new("img", &["src", "srcset"]),
        TransformElement::new("source", &["srcset"]),
    ]
}

/// Start-tag pattern. The first alternative swallows comments so a
/// commented-out tag never matches the capturing branch.
fn tag_regex(tag: &str) -> Regex {
    Regex::new(&format!(
        r"(?is)(<!--[\s\S]*?)(?:-->|$)|<{}([^>]*?)/?>",
        regex::escape(tag)
    ))
    .expect("valid tag pattern")
}

/// Quoted attribute-value pattern; `multiline` admits newlines inside the
/// value (srcset lists are commonly wrapped).
fn attr_regex(attr: &str, multiline: bool) -> Regex {
    let value = if multiline { r"[\s\S]" } else { "." };
    Regex::new(&format!(
        r#"(?i)(\s+{}\s*)=\s*(?:"({}+?)"|'({}+?)')"#,
        regex::escape(attr),
        value,
        value
    ))
    .expect("valid attribute pattern")
}

/// Split a `srcset` value list into its URL candidates, de-duplicated.
pub fn srcset_to_urls(value: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for candidate in value.split(',') {
        if let Some(url) = candidate.split_whitespace().next() {
            if !url.is_empty() && !urls.iter().any(|u| u == url) {
                urls.push(url.to_string());
            }
        }
    }
    urls
}

struct AttrParser {
    re: Regex,
    split_srcset: bool,
}

fn attr_parsers(attrs: &[String]) -> Vec<AttrParser> {
    let mut seen: Vec<String> = Vec::new();
    let mut parsers = Vec::new();

    for attr in attrs {
        let name = attr.to_lowercase();
        if seen.contains(&name) {
            continue;
        }
        seen.push(name.clone());

        let split_srcset = name == "srcset";
        parsers.push(AttrParser {
            re: attr_regex(&name, split_srcset),
            split_srcset,
        });
    }
    parsers
}

fn replace_attr_value<F>(parser: &AttrParser, attr_text: &str, replacer: &mut F) -> String
where
    F: FnMut(&str, &[String]) -> String,
{
    let Some(caps) = parser.re.captures(attr_text) else {
        return attr_text.to_string();
    };
    let value = caps
        .get(2)
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
        .unwrap_or("");
    if value.is_empty() {
        return attr_text.to_string();
    }

    let urls = if parser.split_srcset {
        srcset_to_urls(value)
    } else {
        vec![value.to_string()]
    };
    let replacement = replacer(&caps[0], &urls);
    attr_text.replacen(&caps[0], &replacement, 1)
}

/// Rewrite the configured attributes of every `tag` occurrence in
/// `content`. The replacer receives the full matched attribute fragment
/// and its URL candidates and returns the fragment's replacement.
pub fn rewrite_tag_urls<F>(content: &str, tag: &str, attrs: &[String], mut replacer: F) -> String
where
    F: FnMut(&str, &[String]) -> String,
{
    let tag_re = tag_regex(tag);
    let parsers = attr_parsers(attrs);

    tag_re
        .replace_all(content, |caps: &Captures| {
            if caps.get(1).is_some() {
                // Commented-out markup passes through untouched.
                return caps[0].to_string();
            }
            let full = &caps[0];
            let Some(attr_match) = caps.get(2) else {
                return full.to_string();
            };
            let attr_text = attr_match.as_str();

            let mut updated = attr_text.to_string();
            for parser in &parsers {
                updated = replace_attr_value(parser, &updated, &mut replacer);
            }

            if updated != attr_text {
                full.replacen(attr_text, &updated, 1)
            } else {
                full.to_string()
            }
        })
        .into_owned()
}
