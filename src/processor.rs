//! Runs one component section through its language backend.
//!
//! This is the normalization boundary: whatever a backend returns (bare
//! string, structured object, diagnostic, panic-free error) leaves here as
//! a `SectionResult`. A failed section never aborts the compile — only a
//! missing backend dependency does.

use crate::component::{Section, SectionKind, SectionResult};
use crate::error::{CompileError, PluginFailure};
use crate::registry::{lang_for_extension, CompilerRegistry, PluginOutput, SourceMapRequest};
use crate::urls::resolve_path;
use serde_json::Value;
use std::fs;

/// Per-section processing options, a borrow into the caller's option tree.
pub struct ProcessOptions<'a> {
    pub lang: Option<&'a str>,
    pub compile: bool,
    pub backend_options: &'a Value,
}

fn load_src(src: &str, file_path: &str) -> (String, Result<String, String>) {
    let src_path = resolve_path(src, file_path);
    let loaded = fs::read_to_string(&src_path).map_err(|_| {
        format!(
            "Failed to load src: \"{}\" from file: \"{}\"",
            src, file_path
        )
    });
    (src_path, loaded)
}

/// Strip the common leading whitespace of all non-blank lines, so
/// indentation-sensitive backends see column-0 content.
pub fn deindent(text: &str) -> String {
    let min_indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    if min_indent == 0 {
        return text.to_string();
    }

    text.split('\n')
        .map(|line| {
            let mut stripped = 0;
            let mut rest = line;
            while stripped < min_indent {
                match rest.chars().next() {
                    Some(c @ (' ' | '\t')) => {
                        rest = &rest[c.len_utf8()..];
                        stripped += 1;
                    }
                    _ => break,
                }
            }
            rest
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Process one section. `None` when the section is absent. An unreadable
/// external file or a backend rejection is recorded on the result; the
/// only error that propagates is a missing backend.
pub fn process(
    registry: &CompilerRegistry,
    section: Option<&Section>,
    kind: SectionKind,
    file_path: &str,
    opts: &ProcessOptions,
    source_map: SourceMapRequest,
) -> Result<Option<SectionResult>, CompileError> {
    let Some(section) = section else {
        return Ok(None);
    };

    let (content, resolved_path) = match &section.src {
        Some(src) => {
            let (src_path, loaded) = load_src(src, file_path);
            let mut result = SectionResult::new(kind, &src_path);
            result.src = Some(src.clone());
            result.scoped = section.scoped;
            match loaded {
                Ok(content) => (content, src_path),
                Err(error) => {
                    result.error = Some(error);
                    return Ok(Some(result));
                }
            }
        }
        None => (
            section.content.clone().unwrap_or_default(),
            file_path.to_string(),
        ),
    };

    let mut result = SectionResult::new(kind, &resolved_path);
    result.src = section.src.clone();
    result.scoped = section.scoped;

    let data = deindent(&content);

    // Declared language wins over the per-section option; an external
    // reference may still imply one through its extension.
    let lang = section
        .lang
        .as_deref()
        .or(opts.lang)
        .or_else(|| {
            section
                .src
                .as_deref()
                .and_then(|src| src.rsplit('.').next())
                .and_then(lang_for_extension)
        });

    let compiler = if opts.compile {
        lang.and_then(|l| registry.find(l))
    } else {
        None
    };

    let Some(compiler) = compiler else {
        result.code = Some(data);
        return Ok(Some(result));
    };

    match compiler.compile(&data, file_path, opts.backend_options, &source_map) {
        Ok(PluginOutput::Code(code)) => {
            result.code = Some(code);
        }
        Ok(PluginOutput::Full(compiled)) => {
            result.code = Some(compiled.code);
            result.map = compiled.map;
            for dep in compiled.deps {
                result.push_dep(dep);
            }
        }
        Err(PluginFailure::MissingBackend { name, targets }) => {
            return Err(CompileError::missing_backend(&name, &targets));
        }
        Err(PluginFailure::Diagnostic(diagnostic)) => {
            result.error = Some(diagnostic.report());
        }
    }

    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendDiagnostic;
    use crate::registry::{CompiledCode, SectionCompiler};

    struct Doubler;

    impl SectionCompiler for Doubler {
        fn compile(
            &self,
            text: &str,
            _file_path: &str,
            _options: &Value,
            _source_map: &SourceMapRequest,
        ) -> Result<PluginOutput, PluginFailure> {
            Ok(PluginOutput::Full(CompiledCode {
                code: format!("{}{}", text, text),
                map: None,
                deps: vec!["shared.lib".to_string()],
            }))
        }
    }

    struct Failing;

    impl SectionCompiler for Failing {
        fn compile(
            &self,
            _text: &str,
            _file_path: &str,
            _options: &Value,
            _source_map: &SourceMapRequest,
        ) -> Result<PluginOutput, PluginFailure> {
            Err(PluginFailure::Diagnostic(BackendDiagnostic {
                message: "bad input".to_string(),
                code_frame: Some("frame> bad input".to_string()),
            }))
        }
    }

    struct Unresolvable;

    impl SectionCompiler for Unresolvable {
        fn compile(
            &self,
            _text: &str,
            _file_path: &str,
            _options: &Value,
            _source_map: &SourceMapRequest,
        ) -> Result<PluginOutput, PluginFailure> {
            Err(PluginFailure::MissingBackend {
                name: "sass".to_string(),
                targets: vec!["node-sass".to_string()],
            })
        }
    }

    fn opts(lang: Option<&'static str>, compile: bool) -> ProcessOptions<'static> {
        ProcessOptions {
            lang,
            compile,
            backend_options: &Value::Null,
        }
    }

    #[test]
    fn test_absent_section_is_noop() {
        let registry = CompilerRegistry::new();
        let result = process(
            &registry,
            None,
            SectionKind::Script,
            "a.sfc",
            &opts(None, true),
            SourceMapRequest::None,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_deindent() {
        assert_eq!(deindent("    a\n      b\n    c"), "a\n  b\nc");
        assert_eq!(deindent("a\n  b"), "a\n  b");
        assert_eq!(deindent("\t\ta\n\t\tb"), "a\nb");
        // Blank lines do not pin the indent at zero.
        assert_eq!(deindent("  a\n\n  b"), "a\n\nb");
    }

    #[test]
    fn test_passthrough_without_backend() {
        let registry = CompilerRegistry::new();
        let section = Section::inline("  let x = 1");
        let result = process(
            &registry,
            Some(&section),
            SectionKind::Script,
            "a.sfc",
            &opts(Some("babel"), true),
            SourceMapRequest::None,
        )
        .unwrap()
        .unwrap();
        assert_eq!(result.code.as_deref(), Some("let x = 1"));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_compile_disabled_passes_through() {
        let mut registry = CompilerRegistry::new();
        registry.register("babel", Box::new(Doubler), Value::Null);

        let section = Section {
            lang: Some("babel".to_string()),
            ..Section::inline("x")
        };
        let result = process(
            &registry,
            Some(&section),
            SectionKind::Script,
            "a.sfc",
            &opts(None, false),
            SourceMapRequest::None,
        )
        .unwrap()
        .unwrap();
        assert_eq!(result.code.as_deref(), Some("x"));
    }

    #[test]
    fn test_structured_output_is_normalized() {
        let mut registry = CompilerRegistry::new();
        registry.register("babel", Box::new(Doubler), Value::Null);

        let section = Section::inline("ab");
        let result = process(
            &registry,
            Some(&section),
            SectionKind::Script,
            "a.sfc",
            &opts(Some("babel"), true),
            SourceMapRequest::None,
        )
        .unwrap()
        .unwrap();
        assert_eq!(result.code.as_deref(), Some("abab"));
        assert_eq!(result.deps, vec!["shared.lib"]);
    }

    #[test]
    fn test_backend_error_is_captured_with_code_frame() {
        let mut registry = CompilerRegistry::new();
        registry.register("babel", Box::new(Failing), Value::Null);

        let section = Section::inline("x");
        let result = process(
            &registry,
            Some(&section),
            SectionKind::Script,
            "a.sfc",
            &opts(Some("babel"), true),
            SourceMapRequest::None,
        )
        .unwrap()
        .unwrap();
        assert_eq!(result.error.as_deref(), Some("frame> bad input"));
        assert!(result.code.is_none());
    }

    #[test]
    fn test_missing_backend_is_fatal() {
        let mut registry = CompilerRegistry::new();
        registry.register("sass", Box::new(Unresolvable), Value::Null);

        let section = Section::inline("x");
        let err = process(
            &registry,
            Some(&section),
            SectionKind::Style,
            "a.sfc",
            &opts(Some("sass"), true),
            SourceMapRequest::None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("node-sass"));
    }

    #[test]
    fn test_unreadable_src_is_nonfatal() {
        let registry = CompilerRegistry::new();
        let section = Section::external("./missing-part.css");
        let result = process(
            &registry,
            Some(&section),
            SectionKind::Style,
            "some/dir/a.sfc",
            &opts(None, true),
            SourceMapRequest::None,
        )
        .unwrap()
        .unwrap();
        let error = result.error.expect("load error");
        assert!(error.contains("Failed to load src"));
        assert!(error.contains("./missing-part.css"));
        assert_eq!(result.file_path, "some/dir/missing-part.css");
    }

    #[test]
    fn test_external_src_implies_lang() {
        let dir = std::env::temp_dir().join("sfc-compiler-processor-test");
        std::fs::create_dir_all(&dir).unwrap();
        let style_path = dir.join("part.styl");
        std::fs::write(&style_path, "body\n  color red\n").unwrap();

        let mut registry = CompilerRegistry::new();
        registry.register("stylus", Box::new(Doubler), Value::Null);

        let owner = dir.join("widget.sfc");
        let section = Section::external("./part.styl");
        let result = process(
            &registry,
            Some(&section),
            SectionKind::Style,
            owner.to_str().unwrap(),
            &opts(None, true),
            SourceMapRequest::None,
        )
        .unwrap()
        .unwrap();
        // The stylus backend ran purely because of the file extension.
        let code = result.code.expect("compiled output");
        assert!(code.starts_with("body"));
        assert_eq!(code.matches("color red").count(), 2);
    }
}
