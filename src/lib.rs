//! Single-file-component compiler.
//!
//! Compiles a pre-split component definition (markup template, executable
//! script, style sheets) into one runnable JS module, for development
//! (with live-patch bootstrap) and production builds. The pipeline
//! delegates each section to a pluggable language backend, rewrites local
//! asset references in markup and styles, scopes per-component CSS,
//! stitches per-section source maps into one map, and memoizes work under
//! content-addressed keys. A session object owns all cross-call state; a
//! recompile for the same component id is classified against the previous
//! result to drive the emitted live-patch code.

mod cache;
mod component;
mod compiler;
mod css_scan;
mod error;
mod generate;
mod html_scan;
mod processor;
mod registry;
mod scoping;
mod sourcemap;
mod style;
mod template;
mod urls;

pub use cache::{cache_key, hash_sum, LruCache, CACHE_LIMIT};
pub use compiler::{
    CompileOptions, ConsoleLogger, Logger, ModulePath, ScriptOptions, SfcCompiler, UpdateCode,
    DEFAULT_SCOPED_CSS_PREFIX,
};
pub use component::{
    CompileOutput, ComponentSource, RenderFn, ResolvedComponent, Section, SectionKind,
    SectionResult,
};
pub use error::{BackendDiagnostic, CompileError, PluginFailure};
pub use generate::{ChangeInfo, DEFAULT_HOT_RELOAD_API_PATH, DEFAULT_INSERT_CSS_PATH};
pub use html_scan::{default_transform_elements, srcset_to_urls, TransformElement};
pub use processor::deindent;
pub use registry::{
    lang_for_extension, CompiledCode, CompilerRegistry, PluginOutput, SectionCompiler,
    SourceMapRequest,
};
pub use scoping::scope_css;
pub use sourcemap::{Mapping, RawSourceMap, SourceMap};
pub use style::{StyleMapOptions, StyleOptions, StylePlugin, StylePluginConfig, StyleResult};
pub use template::{
    minify_html, RenderCompiler, RenderContext, RenderResult, TemplateCompileOutput,
    TemplateOptions,
};
pub use urls::{is_local_path, normalize_path, rebase_path, resolve_path, RewriteContext, UrlRewrite};
