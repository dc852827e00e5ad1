//! Markup rewriting and render-function delegation.
//!
//! The template pipeline rewrites asset references over the configured
//! (tag, attribute) set, then either hands the markup to the injected
//! render backend or returns it verbatim (optionally post-processed, and
//! minified for production). Results are memoized under a hash of
//! (component id, scoped flag, post-rewrite markup).

use crate::cache::{cache_key, LruCache};
use crate::component::RenderFn;
use crate::html_scan::{self, TransformElement};
use crate::urls::{self, rewrite_match, RewriteContext, UrlRewrite};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

lazy_static! {
    static ref HTML_COMMENT_RE: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref INTER_TAG_WS_RE: Regex = Regex::new(r">\s+<").unwrap();
    static ref WS_RUN_RE: Regex = Regex::new(r"[ \t\r\n]+").unwrap();
}

/// What the render backend sees: the rewritten markup plus a dependency
/// sink and path helpers rooted at the template's file.
pub struct RenderContext<'a> {
    pub file_path: &'a str,
    pub content: &'a str,
    deps: &'a mut Vec<String>,
}

impl<'a> RenderContext<'a> {
    pub fn resolve_path(&self, url: &str) -> String {
        urls::resolve_path(url, self.file_path)
    }

    pub fn rebase_path(&self, url: &str, rebase_target: &str) -> String {
        urls::rebase_path(url, self.file_path, rebase_target)
    }

    pub fn add_dep(&mut self, dep: String) {
        if !self.deps.contains(&dep) {
            self.deps.push(dep);
        }
    }
}

/// Backend that turns markup into a render-function representation.
pub trait RenderCompiler {
    fn compile_to_render(&self, ctx: &mut RenderContext, options: &Value) -> RenderResult;
}

/// Render backend output; `error` wins over the function pair.
#[derive(Debug, Clone, Default)]
pub struct RenderResult {
    pub render: String,
    pub static_render_fns: String,
    pub deps: Vec<String>,
    pub error: Option<String>,
}

/// Template section options.
pub struct TemplateOptions {
    pub lang: Option<String>,
    pub compile: bool,
    pub backend_options: Value,
    /// (tag, attribute) pairs scanned for asset references.
    pub transform_ele: Vec<TransformElement>,
    pub url_rewrite: UrlRewrite,
    pub url_rewrite_target: Option<String>,
    /// Render backend; `None` keeps the markup textual.
    pub compile_to_render: Option<Box<dyn RenderCompiler>>,
    /// Applied to the markup before asset rewriting.
    pub preprocess: Option<Box<dyn Fn(&str, &str) -> String>>,
    /// Applied to the rewritten markup when render compilation is off.
    pub post_template: Option<Box<dyn Fn(&str, &str) -> String>>,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        TemplateOptions {
            lang: None,
            compile: true,
            backend_options: Value::Null,
            transform_ele: html_scan::default_transform_elements(),
            url_rewrite: UrlRewrite::Rebase,
            url_rewrite_target: None,
            compile_to_render: None,
            preprocess: None,
            post_template: None,
        }
    }
}

/// Cached template pipeline output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCompileOutput {
    pub code: Option<String>,
    pub render: Option<RenderFn>,
    pub deps: Vec<String>,
    pub error: Option<String>,
}

/// Collapse comments and inter-tag whitespace; the production path for
/// raw templates. A pattern-based pass over documented constructs only.
pub fn minify_html(content: &str) -> String {
    let stripped = HTML_COMMENT_RE.replace_all(content, "");
    let collapsed = INTER_TAG_WS_RE.replace_all(&stripped, "><");
    WS_RUN_RE.replace_all(&collapsed, " ").trim().to_string()
}

fn rewrite_markup_urls(
    markup: &str,
    file_path: &str,
    opts: &TemplateOptions,
    deps: &mut Vec<String>,
) -> String {
    let ctx = RewriteContext {
        file_path,
        rewrite_target: opts.url_rewrite_target.as_deref(),
    };

    let mut current = markup.to_string();
    for element in &opts.transform_ele {
        current = html_scan::rewrite_tag_urls(&current, &element.tag, &element.attrs, |matched, urls| {
            rewrite_match(matched, urls, &ctx, &opts.url_rewrite, deps)
        });
    }
    current
}

/// Run the template pipeline for one section, memoized.
pub fn compile_template(
    cache: &mut LruCache<Arc<TemplateCompileOutput>>,
    id: &str,
    scoped: bool,
    file_path: &str,
    markup: &str,
    opts: &TemplateOptions,
    is_production: bool,
) -> Arc<TemplateCompileOutput> {
    let preprocessed = match &opts.preprocess {
        Some(hook) => hook(file_path, markup),
        None => markup.to_string(),
    };

    let mut deps = Vec::new();
    let rewritten = rewrite_markup_urls(&preprocessed, file_path, opts, &mut deps);

    let key = cache_key(&format!("{}!!{}{}", id, rewritten, scoped as u8));
    if let Some(hit) = cache.get(key) {
        return hit;
    }

    let output = match &opts.compile_to_render {
        Some(backend) => {
            let mut ctx = RenderContext {
                file_path,
                content: &rewritten,
                deps: &mut deps,
            };
            let result = backend.compile_to_render(&mut ctx, &opts.backend_options);
            for dep in result.deps {
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
            match result.error {
                Some(error) => TemplateCompileOutput {
                    code: None,
                    render: None,
                    deps,
                    error: Some(error),
                },
                None => TemplateCompileOutput {
                    code: None,
                    render: Some(RenderFn {
                        render: result.render,
                        static_render_fns: result.static_render_fns,
                    }),
                    deps,
                    error: None,
                },
            }
        }
        None => {
            let mut code = rewritten;
            if let Some(hook) = &opts.post_template {
                code = hook(file_path, &code);
            }
            if is_production {
                code = minify_html(&code);
            }
            TemplateCompileOutput {
                code: Some(code),
                render: None,
                deps,
                error: None,
            }
        }
    };

    let output = Arc::new(output);
    if output.error.is_none() {
        cache.insert(key, output.clone());
    }
    output
}
