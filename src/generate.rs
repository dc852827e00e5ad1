//! Assembles the final module body and stitches the source map.
//!
//! Segment order is fixed: style injection, wrapped script plus export
//! shims, template assignment, scoped-style id, live-patch bootstrap.
//! Script mappings are re-emitted by enumerating the input map and
//! shifting every generated line by the line count of the segments in
//! front of the script; template and style segments contribute no
//! mappings.

use crate::compiler::{CompileOptions, ModulePath, UpdateCode};
use crate::component::{ResolvedComponent, SectionResult};
use crate::sourcemap::{self, Mapping, SourceMap};

const STYLE_DISPOSE_VAR: &str = "__sfc_style_dispose__";
const EXPORT_VAR: &str = "__sfc_exported__";
const OPTIONS_VAR: &str = "__sfc_options__";

pub const DEFAULT_INSERT_CSS_PATH: &str = "sfc-compiler/runtime/insert-css";
pub const DEFAULT_HOT_RELOAD_API_PATH: &str = "sfc-hot-reload-api";

/// How this compile differs from the previous one for the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeInfo {
    pub script_changed: bool,
    pub template_changed: bool,
}

pub struct GeneratedModule {
    pub content: String,
    pub map: Option<SourceMap>,
}

fn section_code(section: Option<&SectionResult>) -> Option<&str> {
    section.and_then(|s| s.code.as_deref())
}

/// Compare against the previous compile. No previous entry means
/// everything counts as changed from nothing.
pub fn classify_changes(
    prev: Option<&ResolvedComponent>,
    curr: &ResolvedComponent,
    render_mode: bool,
) -> ChangeInfo {
    let Some(prev) = prev else {
        return ChangeInfo {
            script_changed: true,
            template_changed: true,
        };
    };

    let script_changed = section_code(prev.script.as_ref()) != section_code(curr.script.as_ref());

    let template_changed = if render_mode {
        let render = |c: &ResolvedComponent| c.template.as_ref().and_then(|t| t.render.clone());
        render(prev) != render(curr)
    } else {
        section_code(prev.template.as_ref()) != section_code(curr.template.as_ref())
    };

    ChangeInfo {
        script_changed,
        template_changed,
    }
}

fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

fn resolve_module_path(path: &ModulePath, default: &str) -> String {
    match path {
        ModulePath::Default => default.to_string(),
        ModulePath::Fixed(fixed) if !fixed.is_empty() => fixed.clone(),
        ModulePath::Fixed(_) => default.to_string(),
        ModulePath::Resolver(resolve) => {
            let resolved = resolve(default);
            if resolved.is_empty() {
                default.to_string()
            } else {
                resolved
            }
        }
    }
}

fn build_style_snippet(resolved: &ResolvedComponent, options: &CompileOptions) -> Option<String> {
    if options.is_server || options.extract_style || resolved.styles.is_empty() {
        return None;
    }

    let css = resolved
        .styles
        .iter()
        .map(|style| style.code.as_deref().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");

    let path = resolve_module_path(&options.insert_css_path, DEFAULT_INSERT_CSS_PATH);
    Some(format!(
        "var {} = require(\"{}\").insert({})\n",
        STYLE_DISPOSE_VAR,
        path,
        js_string(&css)
    ))
}

fn build_script_segment(resolved: &ResolvedComponent) -> String {
    let code = section_code(resolved.script.as_ref()).unwrap_or("");
    let mut out = format!(";(function(){{\n{}\n}})();\n", code);
    // Default-export unwrapping, then function-vs-object normalization.
    out.push_str(&format!(
        "var {export_var} = module.exports.__esModule ? module.exports.default : module.exports;\n",
        export_var = EXPORT_VAR
    ));
    out.push_str(&format!(
        "var {options_var} = (typeof {export_var} === \"function\"? {export_var}.options: {export_var})\n",
        options_var = OPTIONS_VAR,
        export_var = EXPORT_VAR
    ));
    out
}

fn build_template_segment(resolved: &ResolvedComponent) -> String {
    let Some(template) = &resolved.template else {
        return String::new();
    };

    if let Some(render) = &template.render {
        format!(
            "{v}.render = {}\n{v}.staticRenderFns = {}\n",
            render.render,
            render.static_render_fns,
            v = OPTIONS_VAR
        )
    } else if let Some(code) = &template.code {
        format!("{}.template = {}\n", OPTIONS_VAR, js_string(code))
    } else {
        String::new()
    }
}

fn build_live_patch(
    resolved: &ResolvedComponent,
    change: &ChangeInfo,
    options: &CompileOptions,
) -> String {
    let api_path = resolve_module_path(&options.hot_reload_api_path, DEFAULT_HOT_RELOAD_API_PATH);
    let id = &resolved.id;

    let dispose_style = if !resolved.styles.is_empty() && !options.extract_style {
        format!("  module.hot.dispose({})\n", STYLE_DISPOSE_VAR)
    } else {
        String::new()
    };

    let update = match &options.hot_reload_update_code {
        UpdateCode::Fixed(code) => code.clone(),
        UpdateCode::Generator(generate) => generate(id),
        UpdateCode::Default => {
            // Script changes force a full reload; template-only changes
            // re-render the view in place.
            if change.script_changed {
                format!("    hotAPI.reload(\"{}\", {})\n", id, OPTIONS_VAR)
            } else if change.template_changed {
                format!("    hotAPI.rerender(\"{}\", {})\n", id, OPTIONS_VAR)
            } else {
                String::new()
            }
        }
    };

    [
        "if (module.hot) {(function () {".to_string(),
        format!("  var hotAPI = require(\"{}\")\n", api_path),
        "  hotAPI.install()\n".to_string(),
        "  if (!hotAPI.compatible) return\n".to_string(),
        "  module.hot.accept()\n".to_string(),
        dispose_style,
        "  if (!module.hot.data) {\n".to_string(),
        format!("    hotAPI.createRecord(\"{}\", {})\n", id, OPTIONS_VAR),
        "  } else {\n".to_string(),
        update,
        "  }\n".to_string(),
        "})()}".to_string(),
    ]
    .concat()
}

/// Seed the final map with the original file under a content-hashed
/// virtual filename, then re-emit the script mappings shifted past the
/// segments generated in front of the script.
fn stitch_script_map(resolved: &ResolvedComponent, before: &str) -> SourceMap {
    let hashed = sourcemap::map_file_name(&resolved.file_path, &resolved.content);
    let mut map = SourceMap::new();
    map.set_source_content(&hashed, &resolved.content);

    let Some(script) = &resolved.script else {
        return map;
    };
    let Some(code) = &script.code else {
        return map;
    };

    let offset = if before.is_empty() {
        0
    } else {
        before.lines().count() as u32
    } + 1;

    match &script.map {
        Some(input) => {
            for mapping in &input.mappings {
                // Mappings with no originating line are dropped.
                let Some(original_line) = mapping.original_line else {
                    continue;
                };
                let source = map.source_index(&hashed);
                map.add_mapping(Mapping {
                    generated_line: mapping.generated_line + offset,
                    generated_column: 0,
                    source: Some(source),
                    original_line: Some(original_line),
                    original_column: Some(0),
                });
            }
        }
        None => {
            for (index, _) in code.lines().enumerate() {
                let line = index as u32 + 1;
                map.add_line_mapping(&hashed, line, line + offset);
            }
        }
    }

    map
}

/// Assemble the module body for one resolved component.
pub fn generate(
    resolved: &ResolvedComponent,
    change: &ChangeInfo,
    options: &CompileOptions,
) -> GeneratedModule {
    let mut output = String::new();

    if let Some(snippet) = build_style_snippet(resolved, options) {
        output.push_str(&snippet);
    }

    let map = if options.source_map {
        Some(stitch_script_map(resolved, &output))
    } else {
        None
    };

    output.push_str(&build_script_segment(resolved));
    output.push_str(&build_template_segment(resolved));

    if resolved.has_scoped_style() {
        output.push_str(&format!(
            "{}._scopeId = \"{}\"\n",
            OPTIONS_VAR, resolved.id
        ));
    }

    if !options.is_production && !options.is_server {
        output.push_str(&build_live_patch(resolved, change, options));
    }

    GeneratedModule {
        content: output,
        map,
    }
}
