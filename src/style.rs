//! Post-processing pipeline for backend-compiled CSS.
//!
//! On a cache miss the pipeline runs, in order: caller-supplied style
//! transforms, the scoping plugin (scoped sections only), and the URL
//! rewrite plugin, always last. Results are memoized under a hash of
//! (component id, scoped flag, raw CSS) and shared, so a repeated compile
//! of unchanged style text returns the identical allocation.

use crate::cache::{cache_key, LruCache};
use crate::css_scan;
use crate::scoping::scope_css;
use crate::sourcemap::SourceMap;
use crate::urls::{rewrite_match, RewriteContext, UrlRewrite};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A caller-supplied style transform. Errors abort the pipeline for this
/// section and surface as the result's `error`.
pub type StylePlugin = Box<dyn Fn(&str) -> Result<String, String>>;

/// Source-map behavior of the style pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleMapOptions {
    pub inline: bool,
    pub annotation: bool,
    pub sources_content: bool,
    #[serde(skip)]
    pub prev: Option<SourceMap>,
}

/// How the caller hands in style transforms.
pub enum StylePluginConfig {
    None,
    /// Plain plugin list.
    Plugins(Vec<StylePlugin>),
    /// Factory invoked per pipeline run.
    Factory(Box<dyn Fn() -> Vec<StylePlugin>>),
    /// Plugins plus pipeline options; the `map` settings merge with the
    /// default map configuration.
    Descriptor {
        plugins: Vec<StylePlugin>,
        map: Option<StyleMapOptions>,
    },
}

impl Default for StylePluginConfig {
    fn default() -> Self {
        StylePluginConfig::None
    }
}

/// Style section options.
pub struct StyleOptions {
    pub lang: Option<String>,
    pub compile: bool,
    pub backend_options: Value,
    pub plugin_config: StylePluginConfig,
    pub url_rewrite: UrlRewrite,
    pub url_rewrite_target: Option<String>,
}

impl Default for StyleOptions {
    fn default() -> Self {
        StyleOptions {
            lang: None,
            compile: true,
            backend_options: Value::Null,
            plugin_config: StylePluginConfig::None,
            url_rewrite: UrlRewrite::Rebase,
            url_rewrite_target: None,
        }
    }
}

/// Output of the style pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleResult {
    pub code: String,
    pub map: Option<SourceMap>,
    pub deps: Vec<String>,
    pub error: Option<String>,
}

/// Overlay the pipeline defaults onto caller map settings: an input map is
/// carried through, never inlined or annotated into the output text.
fn merge_map_options(custom: Option<&StyleMapOptions>, input_map: Option<SourceMap>) -> StyleMapOptions {
    let mut merged = custom.cloned().unwrap_or_default();
    merged.inline = false;
    merged.annotation = false;
    merged.prev = input_map;
    merged
}

fn run_pipeline(
    file_path: &str,
    id: &str,
    css: &str,
    scoped: bool,
    opts: &StyleOptions,
    input_map: Option<SourceMap>,
) -> StyleResult {
    let owned_plugins;
    let (plugins, custom_map): (&[StylePlugin], Option<&StyleMapOptions>) =
        match &opts.plugin_config {
            StylePluginConfig::None => (&[], None),
            StylePluginConfig::Plugins(list) => (list.as_slice(), None),
            StylePluginConfig::Factory(factory) => {
                owned_plugins = factory();
                (owned_plugins.as_slice(), None)
            }
            StylePluginConfig::Descriptor { plugins, map } => (plugins.as_slice(), map.as_ref()),
        };

    let map_options = merge_map_options(custom_map, input_map);

    let mut current = css.to_string();
    for plugin in plugins {
        match plugin(&current) {
            Ok(next) => current = next,
            Err(error) => {
                return StyleResult {
                    error: Some(error),
                    ..StyleResult::default()
                }
            }
        }
    }

    if scoped {
        current = scope_css(&current, id);
    }

    // URL rewriting always runs last so it sees the final selector text.
    let ctx = RewriteContext {
        file_path,
        rewrite_target: opts.url_rewrite_target.as_deref(),
    };
    let mut deps = Vec::new();
    current = css_scan::scan_import_resources(&current, |matched, urls| {
        rewrite_match(matched, urls, &ctx, &opts.url_rewrite, &mut deps)
    });
    current = css_scan::scan_url_resources(&current, |matched, urls| {
        rewrite_match(matched, urls, &ctx, &opts.url_rewrite, &mut deps)
    });

    StyleResult {
        code: current,
        map: map_options.prev,
        deps,
        error: None,
    }
}

/// Rewrite one backend-compiled style section, memoized.
pub fn rewrite_style(
    cache: &mut LruCache<Arc<StyleResult>>,
    file_path: &str,
    id: &str,
    css: &str,
    scoped: bool,
    opts: &StyleOptions,
    input_map: Option<SourceMap>,
) -> Arc<StyleResult> {
    let key = cache_key(&format!("{}!!{}{}", id, css, scoped as u8));
    if let Some(hit) = cache.get(key) {
        return hit;
    }

    let result = Arc::new(run_pipeline(file_path, id, css, scoped, opts, input_map));
    if result.error.is_none() {
        cache.insert(key, result.clone());
    }
    result
}
