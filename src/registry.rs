//! Language-tag keyed registry of section compiler plugins.
//!
//! A plugin is one capability: turn section text into code (optionally
//! with a map and dependency list). Its real backend resolves lazily on
//! first use; a backend that cannot be resolved is a fatal configuration
//! error, not something the pipeline retries.

use crate::error::PluginFailure;
use crate::sourcemap::SourceMap;
use serde_json::Value;
use std::collections::HashMap;

/// Source-map request forwarded to a backend.
pub enum SourceMapRequest {
    None,
    /// Produce a map from scratch.
    Generate,
    /// Compose against this input map.
    Input(SourceMap),
}

impl SourceMapRequest {
    pub fn wanted(&self) -> bool {
        !matches!(self, SourceMapRequest::None)
    }
}

/// Structured output a backend may return instead of bare code.
#[derive(Debug, Clone, Default)]
pub struct CompiledCode {
    pub code: String,
    pub map: Option<SourceMap>,
    pub deps: Vec<String>,
}

/// Backends return either a bare string or the structured shape; the
/// processor normalizes both before anything else sees them.
#[derive(Debug, Clone)]
pub enum PluginOutput {
    Code(String),
    Full(CompiledCode),
}

/// One pluggable language backend.
pub trait SectionCompiler {
    fn compile(
        &self,
        text: &str,
        file_path: &str,
        options: &Value,
        source_map: &SourceMapRequest,
    ) -> Result<PluginOutput, PluginFailure>;
}

pub struct RegisteredCompiler {
    plugin: Box<dyn SectionCompiler>,
    default_options: Value,
}

impl RegisteredCompiler {
    /// Run the plugin with its defaults shallow-merged under the
    /// per-section backend options.
    pub fn compile(
        &self,
        text: &str,
        file_path: &str,
        section_options: &Value,
        source_map: &SourceMapRequest,
    ) -> Result<PluginOutput, PluginFailure> {
        let merged = merge_options(&self.default_options, section_options);
        self.plugin.compile(text, file_path, &merged, source_map)
    }
}

fn merge_options(defaults: &Value, overrides: &Value) -> Value {
    match (defaults, overrides) {
        (Value::Object(base), Value::Object(extra)) => {
            let mut merged = base.clone();
            for (key, value) in extra {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (_, Value::Null) => defaults.clone(),
        _ => overrides.clone(),
    }
}

#[derive(Default)]
pub struct CompilerRegistry {
    compilers: HashMap<String, RegisteredCompiler>,
}

impl CompilerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, lang: &str) -> Option<&RegisteredCompiler> {
        self.compilers.get(lang)
    }

    /// Register a plugin for a language tag, replacing any existing one.
    pub fn register(
        &mut self,
        lang: &str,
        plugin: Box<dyn SectionCompiler>,
        default_options: Value,
    ) {
        self.compilers.insert(
            lang.to_string(),
            RegisteredCompiler {
                plugin,
                default_options,
            },
        );
    }
}

/// Backend language implied by a file extension, for external section
/// files that declare no `lang`.
pub fn lang_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "less" => Some("less"),
        "styl" => Some("stylus"),
        "scss" | "sass" => Some("sass"),
        "es" => Some("babel"),
        "coffee" => Some("coffee"),
        "jade" => Some("jade"),
        "pug" => Some("pug"),
        _ => None,
    }
}
