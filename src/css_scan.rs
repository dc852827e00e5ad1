//! Pattern-based extraction of asset references from style text.
//!
//! Covers the documented constructs only: `url(...)`, the legacy IE
//! `src=` filter argument, `image-set(...)` and `@import` targets.
//! Quote handling is expressed as alternations because backreferences are
//! not available here.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    /// `url(...)` with a single-, double- or unquoted target.
    static ref CSS_URL_RE: Regex = Regex::new(
        r#"(?i)url\s*\(\s*(?:"([^"\)]+)"|'([^'\)]+)'|([^'"\s\)][^'"\)]*?))\s*\)"#
    )
    .unwrap();

    /// Quoted `@import "x"` targets, trailing media list included in the
    /// match so the whole statement stays one fragment. The `@import
    /// url(x)` form is already covered by the `url()` scan.
    static ref CSS_IMPORT_RE: Regex = Regex::new(
        r#"(?i)@import\s+(?:"([^"]+)"|'([^']+)')[^;]*"#
    )
    .unwrap();

    /// Legacy `src='x'` as used by IE alpha image loader filters.
    static ref CSS_SRC_RE: Regex =
        Regex::new(r#"(?i)\bsrc\s*=\s*(?:"([^"\s\)]+)"|'([^'\s\)]+)')"#).unwrap();

    /// `image-set(...)` with quoted candidates.
    static ref IMAGE_SET_RE: Regex =
        Regex::new(r#"(?i)image-set\(\s*(['"][\s\S]*?)\)"#).unwrap();

    static ref QUOTED_RE: Regex = Regex::new(r#""([^"]+)"|'([^']+)'"#).unwrap();
}

fn first_group<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
        .unwrap_or("")
}

/// Scan `url()`, `src=` and `image-set()` forms, feeding every matched
/// fragment and its URL candidates through `replacer`; the replacer's
/// return value substitutes the fragment.
pub fn scan_url_resources<F>(content: &str, mut replacer: F) -> String
where
    F: FnMut(&str, &[String]) -> String,
{
    let pass = CSS_URL_RE.replace_all(content, |caps: &Captures| {
        replacer(&caps[0], &[first_group(caps).to_string()])
    });

    let pass = CSS_SRC_RE.replace_all(&pass, |caps: &Captures| {
        let url = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or("");
        replacer(&caps[0], &[url.to_string()])
    });

    let pass = IMAGE_SET_RE.replace_all(&pass, |caps: &Captures| {
        let mut urls: Vec<String> = Vec::new();
        for quoted in QUOTED_RE.captures_iter(&caps[1]) {
            let url = quoted
                .get(1)
                .or_else(|| quoted.get(2))
                .map(|m| m.as_str())
                .unwrap_or("");
            if !url.is_empty() && !urls.iter().any(|u| u == url) {
                urls.push(url.to_string());
            }
        }
        replacer(&caps[0], &urls)
    });

    pass.into_owned()
}

/// Scan `@import` statements the same way.
pub fn scan_import_resources<F>(content: &str, mut replacer: F) -> String
where
    F: FnMut(&str, &[String]) -> String,
{
    CSS_IMPORT_RE
        .replace_all(content, |caps: &Captures| {
            replacer(&caps[0], &[first_group(caps).to_string()])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(content: &str, imports: bool) -> Vec<String> {
        let mut seen = Vec::new();
        let replacer = |matched: &str, urls: &[String]| {
            seen.extend(urls.iter().cloned());
            matched.to_string()
        };
        if imports {
            scan_import_resources(content, replacer);
        } else {
            scan_url_resources(content, replacer);
        }
        seen
    }

    #[test]
    fn test_url_forms() {
        let css = ".a { background: url(./a.png); } .b { background: url( \"b.png\" ); } .c { background: url('c.png'); }";
        assert_eq!(collect(css, false), vec!["./a.png", "b.png", "c.png"]);
    }

    #[test]
    fn test_legacy_src_form() {
        let css = ".a { filter: progid:DXImageTransform(src='x.png'); }";
        assert_eq!(collect(css, false), vec!["x.png"]);
    }

    #[test]
    fn test_image_set_dedupes_candidates() {
        let css = ".a { background: image-set(\"a.png\" 1x, \"b.png\" 2x, \"a.png\" 3x); }";
        assert_eq!(collect(css, false), vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_import_forms() {
        let css = "@import \"./b.css\";\n@import './d.css' screen;";
        assert_eq!(collect(css, true), vec!["./b.css", "./d.css"]);
    }

    #[test]
    fn test_import_url_form_belongs_to_the_url_scan() {
        let css = "@import url(./c.css);";
        assert!(collect(css, true).is_empty());
        assert_eq!(collect(css, false), vec!["./c.css"]);
    }

    #[test]
    fn test_replacement_is_textual() {
        let css = ".a { background: url(./a.png); }";
        let out = scan_url_resources(css, |matched, urls| {
            matched.replacen(urls[0].as_str(), "../rew/a.png", 1)
        });
        assert_eq!(out, ".a { background: url(../rew/a.png); }");
    }
}
