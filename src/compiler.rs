//! The compiler session: registry, memoization caches and per-component
//! previous-result state, plus the top-level compile entry point.
//!
//! One `SfcCompiler` is instantiated per process and passed into every
//! call; it owns all cross-call state, so there are no hidden module-level
//! singletons. `compile` takes `&mut self`, which is the single-threaded
//! contract made explicit — a multi-threaded host wraps the session in its
//! own lock.

use crate::cache::{cache_key, hash_sum, LruCache, CACHE_LIMIT};
use crate::component::{CompileOutput, ComponentSource, SectionKind};
use crate::error::CompileError;
use crate::generate;
use crate::processor::{self, ProcessOptions};
use crate::registry::{CompilerRegistry, SourceMapRequest};
use crate::sourcemap::{self, SourceMap};
use crate::style::{self, StyleOptions, StyleResult};
use crate::template::{self, TemplateCompileOutput, TemplateOptions};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_SCOPED_CSS_PREFIX: &str = "data-v-";

/// Collaborator notified once per failing section after a compile call
/// completes, never mid-pipeline.
pub trait Logger {
    fn error(&self, message: &str);
}

/// Default logger: stderr with the crate tag.
pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn error(&self, message: &str) {
        eprintln!("[sfc-compiler] {}", message);
    }
}

/// Module id override for emitted `require(...)` calls.
pub enum ModulePath {
    Default,
    Fixed(String),
    /// Receives the default id, returns the one to emit.
    Resolver(Box<dyn Fn(&str) -> String>),
}

impl Default for ModulePath {
    fn default() -> Self {
        ModulePath::Default
    }
}

/// Replacement for the live-patch update statement.
pub enum UpdateCode {
    Default,
    Fixed(String),
    /// Receives the component id.
    Generator(Box<dyn Fn(&str) -> String>),
}

impl Default for UpdateCode {
    fn default() -> Self {
        UpdateCode::Default
    }
}

/// Script section options.
pub struct ScriptOptions {
    pub lang: Option<String>,
    pub compile: bool,
    pub backend_options: Value,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        ScriptOptions {
            lang: None,
            compile: true,
            backend_options: Value::Null,
        }
    }
}

/// Options recognized by a compile call.
pub struct CompileOptions {
    pub source_map: bool,
    pub is_production: bool,
    pub is_server: bool,
    /// Emit styles to a separate artifact instead of inlining injection.
    pub extract_style: bool,
    pub scoped_css_prefix: Option<String>,
    pub template: TemplateOptions,
    pub script: ScriptOptions,
    pub style: StyleOptions,
    pub hot_reload_api_path: ModulePath,
    pub insert_css_path: ModulePath,
    pub hot_reload_update_code: UpdateCode,
    pub logger: Option<Box<dyn Logger>>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            source_map: false,
            is_production: false,
            is_server: false,
            extract_style: false,
            scoped_css_prefix: None,
            template: TemplateOptions::default(),
            script: ScriptOptions::default(),
            style: StyleOptions::default(),
            hot_reload_api_path: ModulePath::Default,
            insert_css_path: ModulePath::Default,
            hot_reload_update_code: UpdateCode::Default,
            logger: None,
        }
    }
}

/// Process-wide compiler session.
pub struct SfcCompiler {
    registry: CompilerRegistry,
    parse_cache: LruCache<Arc<ComponentSource>>,
    template_cache: LruCache<Arc<TemplateCompileOutput>>,
    style_cache: LruCache<Arc<StyleResult>>,
    file_ids: HashMap<String, String>,
    previous: HashMap<String, Arc<crate::component::ResolvedComponent>>,
}

impl Default for SfcCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SfcCompiler {
    pub fn new() -> Self {
        SfcCompiler {
            registry: CompilerRegistry::new(),
            parse_cache: LruCache::new(CACHE_LIMIT),
            template_cache: LruCache::new(CACHE_LIMIT),
            style_cache: LruCache::new(CACHE_LIMIT),
            file_ids: HashMap::new(),
            previous: HashMap::new(),
        }
    }

    pub fn registry(&mut self) -> &mut CompilerRegistry {
        &mut self.registry
    }

    /// Stable per-path component file id, memoized for the process.
    pub fn generate_file_id(&mut self, file_path: &str) -> String {
        self.file_ids
            .entry(file_path.to_string())
            .or_insert_with(|| hash_sum(file_path))
            .clone()
    }

    /// Memoize the caller's raw-split step under a (path + content) hash.
    pub fn parse<F>(&mut self, file_path: &str, content: &str, parser: F) -> Arc<ComponentSource>
    where
        F: FnOnce(&str, &str) -> ComponentSource,
    {
        let key = cache_key(&format!("{}{}", file_path, content));
        if let Some(hit) = self.parse_cache.get(key) {
            return hit;
        }
        let parsed = Arc::new(parser(file_path, content));
        self.parse_cache.insert(key, parsed.clone());
        parsed
    }

    /// Compile one component. Always returns a result object carrying any
    /// section errors; only a missing backend dependency aborts.
    pub fn compile(
        &mut self,
        source: &ComponentSource,
        options: &CompileOptions,
    ) -> Result<CompileOutput, CompileError> {
        let prefix = options
            .scoped_css_prefix
            .as_deref()
            .unwrap_or(DEFAULT_SCOPED_CSS_PREFIX);
        let id = format!("{}{}", prefix, self.generate_file_id(&source.file_path));

        let need_map = options.source_map;
        let has_scoped = source.styles.iter().any(|s| s.scoped);
        let hashed_file = sourcemap::map_file_name(&source.file_path, &source.content);

        // Template: backend pass, then the rewrite/render pipeline.
        let template_opts = &options.template;
        let mut template = processor::process(
            &self.registry,
            source.template.as_ref(),
            SectionKind::Template,
            &source.file_path,
            &ProcessOptions {
                lang: template_opts.lang.as_deref(),
                compile: template_opts.compile,
                backend_options: &template_opts.backend_options,
            },
            if need_map {
                SourceMapRequest::Generate
            } else {
                SourceMapRequest::None
            },
        )?;

        if let Some(section) = template.as_mut() {
            if section.error.is_none() && template_opts.compile {
                let markup = section.code.clone().unwrap_or_default();
                let compiled = template::compile_template(
                    &mut self.template_cache,
                    &id,
                    has_scoped,
                    &section.file_path,
                    &markup,
                    template_opts,
                    options.is_production,
                );
                for dep in &compiled.deps {
                    section.push_dep(dep.clone());
                }
                if let Some(error) = &compiled.error {
                    section.error = Some(error.clone());
                } else {
                    section.render = compiled.render.clone();
                    if let Some(code) = &compiled.code {
                        section.code = Some(code.clone());
                    }
                }
            }
        }

        // Script: inline sections get an identity input map the backend
        // can compose against.
        let script_opts = &options.script;
        let script_request = if !need_map {
            SourceMapRequest::None
        } else {
            match identity_for_inline(source.script.as_ref().map(|s| (s.src.is_none(), s.content.as_deref())), &hashed_file, &source.content) {
                Some(map) => SourceMapRequest::Input(map),
                None => SourceMapRequest::Generate,
            }
        };
        let script = processor::process(
            &self.registry,
            source.script.as_ref(),
            SectionKind::Script,
            &source.file_path,
            &ProcessOptions {
                lang: script_opts.lang.as_deref(),
                compile: script_opts.compile,
                backend_options: &script_opts.backend_options,
            },
            script_request,
        )?;

        // Styles, strictly in order.
        let style_opts = &options.style;
        let mut styles = Vec::with_capacity(source.styles.len());
        for style_section in &source.styles {
            let request = if !need_map {
                SourceMapRequest::None
            } else {
                match identity_for_inline(
                    Some((style_section.src.is_none(), style_section.content.as_deref())),
                    &hashed_file,
                    &source.content,
                ) {
                    Some(map) => SourceMapRequest::Input(map),
                    None => SourceMapRequest::Generate,
                }
            };
            let processed = processor::process(
                &self.registry,
                Some(style_section),
                SectionKind::Style,
                &source.file_path,
                &ProcessOptions {
                    lang: style_opts.lang.as_deref(),
                    compile: style_opts.compile,
                    backend_options: &style_opts.backend_options,
                },
                request,
            )?;
            let Some(mut result) = processed else {
                continue;
            };

            if result.error.is_none() && style_opts.compile {
                let css = result
                    .code
                    .as_deref()
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                let rewritten = style::rewrite_style(
                    &mut self.style_cache,
                    &result.file_path,
                    &id,
                    &css,
                    style_section.scoped,
                    style_opts,
                    result.map.clone(),
                );
                if let Some(error) = &rewritten.error {
                    result.error = Some(error.clone());
                } else {
                    result.code = Some(rewritten.code.clone());
                    result.map = rewritten.map.clone();
                    for dep in &rewritten.deps {
                        result.push_dep(dep.clone());
                    }
                }
            }
            styles.push(result);
        }

        let resolved = Arc::new(crate::component::ResolvedComponent {
            id: id.clone(),
            file_path: source.file_path.clone(),
            content: source.content.clone(),
            template,
            script,
            styles,
        });

        // Report every section error, after the pipeline has finished.
        let console = ConsoleLogger;
        let logger: &dyn Logger = match &options.logger {
            Some(logger) => logger.as_ref(),
            None => &console,
        };
        for error in resolved.errors() {
            logger.error(error);
        }

        // Previous result drives the live-patch classification; the new
        // result replaces it unconditionally.
        let previous = self.previous.get(&id).cloned();
        self.previous.insert(id.clone(), resolved.clone());

        let change = generate::classify_changes(
            previous.as_deref(),
            &resolved,
            options.template.compile_to_render.is_some(),
        );

        let generated = generate::generate(&resolved, &change, options);
        Ok(CompileOutput {
            content: generated.content,
            map: generated.map.map(|m| m.to_json_string()),
            resolved,
        })
    }
}

/// Identity input map for an inline section; external references carry no
/// seeded map.
fn identity_for_inline(
    section: Option<(bool, Option<&str>)>,
    hashed_file: &str,
    file_content: &str,
) -> Option<SourceMap> {
    match section {
        Some((true, Some(content))) => Some(sourcemap::identity_map(
            hashed_file,
            file_content,
            content,
        )),
        _ => None,
    }
}
