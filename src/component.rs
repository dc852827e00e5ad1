//! Data model for a compile call.
//!
//! A `ComponentSource` is the already-split component handed in by the
//! caller; it is never mutated. Every per-section outcome is normalized
//! into a `SectionResult` at the processor boundary, so nothing downstream
//! branches on a raw backend return shape.

use crate::sourcemap::SourceMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One of template/script/style, either inline or referencing an external
/// file. Immutable after construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Inline text, when the section is not an external reference.
    pub content: Option<String>,
    /// External file reference, relative to the owning component file.
    pub src: Option<String>,
    /// Declared backend language; falls back to the per-section option.
    pub lang: Option<String>,
    /// Styles only: constrain selectors to this component instance.
    #[serde(default)]
    pub scoped: bool,
}

impl Section {
    pub fn inline(content: &str) -> Self {
        Section {
            content: Some(content.to_string()),
            ..Section::default()
        }
    }

    pub fn external(src: &str) -> Self {
        Section {
            src: Some(src.to_string()),
            ..Section::default()
        }
    }
}

/// The parsed component a compile call receives. The raw-text split into
/// sections happens outside this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSource {
    pub file_path: String,
    /// Full original file text, embedded into the emitted source map.
    pub content: String,
    pub template: Option<Section>,
    pub script: Option<Section>,
    pub styles: Vec<Section>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    Template,
    Script,
    Style,
}

/// Render-function representation produced by a template backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFn {
    pub render: String,
    pub static_render_fns: String,
}

/// Normalized per-section output. Has `code` or `error`, never neither.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionResult {
    pub kind: SectionKind,
    /// The file the content came from: the resolved external reference
    /// when the section has one, else the owning component file.
    pub file_path: String,
    pub src: Option<String>,
    #[serde(default)]
    pub scoped: bool,
    pub code: Option<String>,
    /// Templates only, when render compilation is enabled.
    pub render: Option<RenderFn>,
    pub map: Option<SourceMap>,
    pub deps: Vec<String>,
    pub error: Option<String>,
}

impl SectionResult {
    pub fn new(kind: SectionKind, file_path: &str) -> Self {
        SectionResult {
            kind,
            file_path: file_path.to_string(),
            src: None,
            scoped: false,
            code: None,
            render: None,
            map: None,
            deps: Vec::new(),
            error: None,
        }
    }

    pub fn push_dep(&mut self, dep: String) {
        if !self.deps.contains(&dep) {
            self.deps.push(dep);
        }
    }
}

/// Everything one compile call produced for a component, kept around so
/// the next call for the same id can be classified against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedComponent {
    /// Scope id: configured prefix + stable hash of the file path.
    pub id: String,
    pub file_path: String,
    pub content: String,
    pub template: Option<SectionResult>,
    pub script: Option<SectionResult>,
    pub styles: Vec<SectionResult>,
}

impl ResolvedComponent {
    pub fn has_scoped_style(&self) -> bool {
        self.styles.iter().any(|s| s.scoped)
    }

    /// Section errors in template, script, style order.
    pub fn errors(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let Some(error) = self.template.as_ref().and_then(|t| t.error.as_deref()) {
            out.push(error);
        }
        if let Some(error) = self.script.as_ref().and_then(|s| s.error.as_deref()) {
            out.push(error);
        }
        for style in &self.styles {
            if let Some(error) = style.error.as_deref() {
                out.push(error);
            }
        }
        out
    }
}

/// What a compile call returns.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// Generated module body.
    pub content: String,
    /// Serialized source map, when requested.
    pub map: Option<String>,
    pub resolved: Arc<ResolvedComponent>,
}
