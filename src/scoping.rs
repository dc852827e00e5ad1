//! Per-component CSS scoping.
//!
//! For every rule with a selector, each comma branch gets an attribute
//! selector `[scopeId]` inserted immediately after its last non-pseudo
//! component, so pseudo-classes and pseudo-elements stay trailing:
//! `.b:hover` becomes `.b[scopeId]:hover`. Nested-rule at-rules
//! (`@media`, `@supports`) are recursed into; selector-less rule bodies
//! (keyframe frames, `@font-face`) are left alone. This is a deliberately
//! lightweight scan over brace structure, not a CSS grammar.

fn skip_comment(css: &str, start: usize) -> Option<usize> {
    if css[start..].starts_with("/*") {
        match css[start + 2..].find("*/") {
            Some(end) => Some(start + 2 + end + 2),
            None => Some(css.len()),
        }
    } else {
        None
    }
}

/// Byte offset just past the brace block opened at `open` (which must
/// point at `{`), comments skipped.
fn matching_brace(css: &str, open: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while i < css.len() {
        if let Some(next) = skip_comment(css, i) {
            i = next;
            continue;
        }
        match css.as_bytes()[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    css.len()
}

fn at_rule_name(prelude: &str) -> Option<&str> {
    let trimmed = prelude.trim_start();
    let rest = trimmed.strip_prefix('@')?;
    Some(
        rest.split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or(""),
    )
}

/// Add `[scope_id]` to every scopeable selector in `css`.
pub fn scope_css(css: &str, scope_id: &str) -> String {
    let mut out = String::with_capacity(css.len() + 64);
    let mut i = 0;

    while i < css.len() {
        if let Some(next) = skip_comment(css, i) {
            out.push_str(&css[i..next]);
            i = next;
            continue;
        }

        let Some(offset) = css[i..].find(|c: char| c == '{' || c == ';' || c == '}') else {
            out.push_str(&css[i..]);
            break;
        };
        let pos = i + offset;

        match css.as_bytes()[pos] {
            // At-statement (@import ...;) or stray terminator.
            b';' | b'}' => {
                out.push_str(&css[i..pos + 1]);
                i = pos + 1;
            }
            _ => {
                let prelude = &css[i..pos];
                let end = matching_brace(css, pos);
                let body_end = end.saturating_sub(1).max(pos + 1);
                let body = &css[pos + 1..body_end];

                match at_rule_name(prelude) {
                    Some(name) if name.eq_ignore_ascii_case("media")
                        || name.eq_ignore_ascii_case("supports") =>
                    {
                        out.push_str(prelude);
                        out.push('{');
                        out.push_str(&scope_css(body, scope_id));
                        out.push_str(&css[body_end..end]);
                    }
                    Some(_) => {
                        // Keyframes, font-face and friends: no selectors.
                        out.push_str(&css[i..end]);
                    }
                    None => {
                        out.push_str(&scope_selector_list(prelude, scope_id));
                        out.push_str(&css[pos..end]);
                    }
                }
                i = end;
            }
        }
    }

    out
}

/// Scope each comma branch of a selector list, preserving the prelude's
/// surrounding whitespace.
fn scope_selector_list(prelude: &str, scope_id: &str) -> String {
    let trimmed = prelude.trim();
    if trimmed.is_empty() {
        return prelude.to_string();
    }

    let leading = &prelude[..prelude.len() - prelude.trim_start().len()];
    let trailing = &prelude[prelude.trim_end().len()..];

    let scoped = split_branches(trimmed)
        .into_iter()
        .map(|branch| scope_branch(branch.trim(), scope_id))
        .collect::<Vec<_>>()
        .join(", ");

    format!("{}{}{}", leading, scoped, trailing)
}

/// Split on top-level commas (commas inside `(...)`/`[...]` stay put).
fn split_branches(selector: &str) -> Vec<&str> {
    let mut branches = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (pos, c) in selector.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                branches.push(&selector[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    branches.push(&selector[start..]);
    branches
}

fn skip_balanced(chars: &[(usize, char)], mut index: usize, open: char, close: char) -> usize {
    let mut depth = 0usize;
    while index < chars.len() {
        let c = chars[index].1;
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return index + 1;
            }
        }
        index += 1;
    }
    chars.len()
}

/// Insert `[scope_id]` after the last selector component that is not a
/// pseudo-class/pseudo-element.
fn scope_branch(branch: &str, scope_id: &str) -> String {
    let chars: Vec<(usize, char)> = branch.char_indices().collect();
    let mut insert_at: Option<usize> = None;
    let mut i = 0;

    let byte_end = |index: usize| {
        if index < chars.len() {
            chars[index].0
        } else {
            branch.len()
        }
    };

    while i < chars.len() {
        let c = chars[i].1;

        if c.is_whitespace() || c == '>' || c == '+' || c == '~' {
            // Combinator run; counts as a non-pseudo component.
            let mut j = i;
            while j < chars.len() {
                let ch = chars[j].1;
                if ch.is_whitespace() || ch == '>' || ch == '+' || ch == '~' {
                    j += 1;
                } else {
                    break;
                }
            }
            insert_at = Some(byte_end(j));
            i = j;
        } else if c == ':' {
            // Pseudo: `:hover`, `::after`, `:not(...)`.
            let mut j = i + 1;
            if j < chars.len() && chars[j].1 == ':' {
                j += 1;
            }
            while j < chars.len() {
                let ch = chars[j].1;
                if ch.is_alphanumeric() || ch == '-' {
                    j += 1;
                } else {
                    break;
                }
            }
            if j < chars.len() && chars[j].1 == '(' {
                j = skip_balanced(&chars, j, '(', ')');
            }
            i = j;
        } else {
            // Type/class/id/attribute/universal compound piece.
            let mut j = i;
            while j < chars.len() {
                let ch = chars[j].1;
                if ch == ':' || ch.is_whitespace() || ch == '>' || ch == '+' || ch == '~' {
                    break;
                }
                if ch == '(' {
                    j = skip_balanced(&chars, j, '(', ')');
                    continue;
                }
                if ch == '[' {
                    j = skip_balanced(&chars, j, '[', ']');
                    continue;
                }
                j += 1;
            }
            insert_at = Some(byte_end(j));
            i = j;
        }
    }

    match insert_at {
        Some(pos) => format!("{}[{}]{}", &branch[..pos], scope_id, &branch[pos..]),
        None => format!("[{}]{}", scope_id, branch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "data-v-123";

    #[test]
    fn test_trailing_pseudo_stays_trailing() {
        let css = ".a, .b:hover { color: red; }";
        assert_eq!(
            scope_css(css, ID),
            ".a[data-v-123], .b[data-v-123]:hover { color: red; }"
        );
    }

    #[test]
    fn test_descendant_combinators() {
        assert_eq!(
            scope_css(".a .b { x: y; }", ID),
            ".a .b[data-v-123] { x: y; }"
        );
        assert_eq!(
            scope_css(".a > .b:first-child { x: y; }", ID),
            ".a > .b[data-v-123]:first-child { x: y; }"
        );
    }

    #[test]
    fn test_pseudo_element() {
        assert_eq!(
            scope_css("div::after { content: ''; }", ID),
            "div[data-v-123]::after { content: ''; }"
        );
    }

    #[test]
    fn test_pseudo_function_is_skipped() {
        assert_eq!(
            scope_css(".a:not(.b) { x: y; }", ID),
            ".a[data-v-123]:not(.b) { x: y; }"
        );
    }

    #[test]
    fn test_attribute_selector_extends_component() {
        assert_eq!(
            scope_css("input[type=\"text\"] { x: y; }", ID),
            "input[type=\"text\"][data-v-123] { x: y; }"
        );
    }

    #[test]
    fn test_media_queries_are_recursed() {
        let css = "@media (min-width: 100px) { .a { x: y; } }";
        assert_eq!(
            scope_css(css, ID),
            "@media (min-width: 100px) { .a[data-v-123] { x: y; } }"
        );
    }

    #[test]
    fn test_keyframes_left_untouched() {
        let css = "@keyframes spin { from { transform: none; } to { transform: rotate(1turn); } }";
        assert_eq!(scope_css(css, ID), css);
    }

    #[test]
    fn test_import_statement_left_untouched() {
        let css = "@import \"./base.css\";\n.a { x: y; }";
        assert_eq!(scope_css(css, ID), "@import \"./base.css\";\n.a[data-v-123] { x: y; }");
    }

    #[test]
    fn test_comments_preserved() {
        let css = "/* .not-a-rule {} */\n.a { x: y; }";
        assert_eq!(scope_css(css, ID), "/* .not-a-rule {} */\n.a[data-v-123] { x: y; }");
    }

    #[test]
    fn test_multiple_rules_keep_formatting() {
        let css = ".a { x: y; }\n.b { z: w; }";
        assert_eq!(
            scope_css(css, ID),
            ".a[data-v-123] { x: y; }\n.b[data-v-123] { z: w; }"
        );
    }
}
