//! Local-path math and the URL rewrite core shared by markup and style
//! scanning.
//!
//! Paths are handled lexically with forward slashes; nothing here touches
//! the filesystem. A URL is "external" when it carries a scheme or is
//! protocol-relative; external URLs are never rewritten and never recorded
//! as dependencies.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PROTOCOL_RELATIVE_RE: Regex = Regex::new(r"^//").unwrap();
    static ref SCHEME_RE: Regex = Regex::new(r"(?i)^[a-z][a-z0-9+.\-]+:").unwrap();
}

pub fn is_local_path(path: &str) -> bool {
    !(PROTOCOL_RELATIVE_RE.is_match(path) || SCHEME_RE.is_match(path))
}

/// Lexically normalize a path: forward slashes, `.` and `..` resolved.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');
    let mut stack: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if stack.last().map(|s| *s != "..").unwrap_or(false) {
                    stack.pop();
                } else if !absolute {
                    stack.push("..");
                }
            }
            other => stack.push(other),
        }
    }

    let joined = stack.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

pub fn dirname(path: &str) -> &str {
    match path.rfind(|c| c == '/' || c == '\\') {
        Some(0) => "/",
        Some(pos) => &path[..pos],
        None => ".",
    }
}

/// Resolve a relative reference against the file that contains it.
/// External and root-relative references come back unchanged.
pub fn resolve_path(relative: &str, base_file: &str) -> String {
    if !is_local_path(relative) || relative.starts_with('/') {
        return relative.to_string();
    }
    let relative = normalize_path(relative);
    let base_file = normalize_path(base_file);
    normalize_path(&format!("{}/{}", dirname(&base_file), relative))
}

/// Re-express a reference found in `refer_file` so it stays correct when
/// the surrounding text is emitted at `rebase_file`.
pub fn rebase_path(file_path: &str, refer_file: &str, rebase_file: &str) -> String {
    if !is_local_path(file_path) || file_path.starts_with('/') {
        return file_path.to_string();
    }
    let relative = relative_dir(dirname(rebase_file), dirname(refer_file));
    if relative.is_empty() {
        normalize_path(file_path)
    } else {
        normalize_path(&format!("{}/{}", relative, file_path))
    }
}

fn relative_dir(from: &str, to: &str) -> String {
    let from = normalize_path(from);
    let to = normalize_path(to);
    if from == to {
        return String::new();
    }

    let from_parts: Vec<&str> = if from == "." {
        Vec::new()
    } else {
        from.split('/').collect()
    };
    let to_parts: Vec<&str> = if to == "." {
        Vec::new()
    } else {
        to.split('/').collect()
    };

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = from_parts[common..].iter().map(|_| "..".to_string()).collect();
    parts.extend(to_parts[common..].iter().map(|s| s.to_string()));
    parts.join("/")
}

/// How local URLs found in markup and styles are rewritten.
pub enum UrlRewrite {
    /// Rebase local URLs against the rewrite target. The default.
    Rebase,
    /// Leave every URL untouched and collect no dependencies.
    Disabled,
    /// Caller-supplied rewriter; returning `None` vetoes the rewrite.
    Custom(Box<dyn Fn(&str, &RewriteContext) -> Option<String>>),
}

impl Default for UrlRewrite {
    fn default() -> Self {
        UrlRewrite::Rebase
    }
}

/// Where a URL was found and where the rewritten text will live.
pub struct RewriteContext<'a> {
    pub file_path: &'a str,
    pub rewrite_target: Option<&'a str>,
}

fn rewrite_one(
    url: &str,
    ctx: &RewriteContext,
    mode: &UrlRewrite,
    deps: &mut Vec<String>,
) -> Option<String> {
    match mode {
        UrlRewrite::Disabled => None,
        UrlRewrite::Custom(rewrite) => rewrite(url, ctx),
        UrlRewrite::Rebase => {
            if !is_local_path(url) {
                return Some(url.to_string());
            }
            let absolute = resolve_path(url, ctx.file_path);
            if !deps.contains(&absolute) {
                deps.push(absolute);
            }
            Some(rebase_path(
                url,
                ctx.file_path,
                ctx.rewrite_target.unwrap_or("default"),
            ))
        }
    }
}

/// Substitute every rewritten URL inside its original matched fragment,
/// preserving the surrounding syntax. A vetoed URL leaves the fragment
/// untouched at that position.
pub fn rewrite_match(
    matched: &str,
    urls: &[String],
    ctx: &RewriteContext,
    mode: &UrlRewrite,
    deps: &mut Vec<String>,
) -> String {
    let mut out = matched.to_string();
    for url in urls {
        if let Some(replacement) = rewrite_one(url, ctx, mode, deps) {
            out = out.replacen(url.as_str(), &replacement, 1);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_local_path() {
        assert!(is_local_path("./a.png"));
        assert!(is_local_path("../img/b.png"));
        assert!(is_local_path("/assets/c.png"));
        assert!(!is_local_path("http://cdn/x.png"));
        assert!(!is_local_path("https://cdn/x.png"));
        assert!(!is_local_path("//cdn/x.png"));
        assert!(!is_local_path("data:image/png;base64,xxxx"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a/./b/../c"), "a/c");
        assert_eq!(normalize_path("a\\b\\c"), "a/b/c");
        assert_eq!(normalize_path("../x"), "../x");
        assert_eq!(normalize_path("a/../../b"), "../b");
        assert_eq!(normalize_path("/a/../b"), "/b");
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("./a.png", "src/comp/widget.sfc"), "src/comp/a.png");
        assert_eq!(resolve_path("../a.png", "src/comp/widget.sfc"), "src/a.png");
        assert_eq!(resolve_path("/abs/a.png", "src/comp/widget.sfc"), "/abs/a.png");
        assert_eq!(resolve_path("http://cdn/x.png", "src/w.sfc"), "http://cdn/x.png");
    }

    #[test]
    fn test_rebase_path() {
        // Reference moves from src/comp/widget.sfc into dist/main.css.
        assert_eq!(
            rebase_path("./a.png", "src/comp/widget.sfc", "dist/main.css"),
            "../src/comp/a.png"
        );
        assert_eq!(rebase_path("/abs/a.png", "src/w.sfc", "dist/m.css"), "/abs/a.png");
        assert_eq!(
            rebase_path("http://cdn/x.png", "src/w.sfc", "dist/m.css"),
            "http://cdn/x.png"
        );
        // Same directory: unchanged apart from normalization.
        assert_eq!(rebase_path("./a.png", "src/w.sfc", "src/out.css"), "a.png");
    }

    #[test]
    fn test_rewrite_match_registers_each_dep_once() {
        let ctx = RewriteContext {
            file_path: "src/w.sfc",
            rewrite_target: Some("dist/m.css"),
        };
        let mut deps = Vec::new();
        let out = rewrite_match(
            "url(./a.png)",
            &["./a.png".to_string()],
            &ctx,
            &UrlRewrite::Rebase,
            &mut deps,
        );
        assert_eq!(out, "url(../src/a.png)");

        rewrite_match(
            "url(./a.png)",
            &["./a.png".to_string()],
            &ctx,
            &UrlRewrite::Rebase,
            &mut deps,
        );
        assert_eq!(deps, vec!["src/a.png".to_string()]);
    }

    #[test]
    fn test_rewrite_match_leaves_external_urls() {
        let ctx = RewriteContext {
            file_path: "src/w.sfc",
            rewrite_target: None,
        };
        let mut deps = Vec::new();
        let out = rewrite_match(
            "url(http://cdn/x.png)",
            &["http://cdn/x.png".to_string()],
            &ctx,
            &UrlRewrite::Rebase,
            &mut deps,
        );
        assert_eq!(out, "url(http://cdn/x.png)");
        assert!(deps.is_empty());
    }

    #[test]
    fn test_custom_rewrite_can_veto() {
        let ctx = RewriteContext {
            file_path: "src/w.sfc",
            rewrite_target: None,
        };
        let veto = UrlRewrite::Custom(Box::new(|_, _| None));
        let mut deps = Vec::new();
        let out = rewrite_match(
            "url(./a.png)",
            &["./a.png".to_string()],
            &ctx,
            &veto,
            &mut deps,
        );
        assert_eq!(out, "url(./a.png)");
        assert!(deps.is_empty());
    }

    #[test]
    fn test_custom_rewrite_result_is_used_verbatim() {
        let ctx = RewriteContext {
            file_path: "src/w.sfc",
            rewrite_target: None,
        };
        let custom = UrlRewrite::Custom(Box::new(|url, _| Some(format!("/cdn{}", &url[1..]))));
        let mut deps = Vec::new();
        let out = rewrite_match(
            "url(./a.png)",
            &["./a.png".to_string()],
            &ctx,
            &custom,
            &mut deps,
        );
        assert_eq!(out, "url(/cdn/a.png)");
    }
}
