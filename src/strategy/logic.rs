//! Strategies for logic and type-mismatch defects, including the two
//! cross-file repairs: flipping an arithmetic operator in a traced callee
//! and capturing the bindings of a dynamic execution.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::Defect;
use crate::util::indent_of;

use super::{Edit, StrategyCtx};

static CALL_SITE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\s*\(").expect("call pattern"));
static BARE_EXEC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)exec\(([^,()]+)\)\s*$").expect("exec pattern"));
static CONCAT_OPERAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\+\s*)(\w+)").expect("concat pattern"));
static FIRST_ACCESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\s*[\[(.]").expect("access pattern"));

fn target_line<'a>(defect: &Defect, lines: &'a [String]) -> Option<&'a str> {
    if defect.line == 0 || defect.line > lines.len() {
        return None;
    }
    Some(&lines[defect.line - 1])
}

/// A bare assignment inside a conditional guard is promoted to an equality
/// comparison, exactly once per line.
pub fn promote_assignment_in_guard(defect: &Defect, lines: &[String], _ctx: &StrategyCtx) -> Edit {
    let Some(line) = target_line(defect, lines) else {
        return Edit::None;
    };
    let code = line.trim_start();
    let is_guard = ["if ", "elif ", "while "].iter().any(|kw| code.starts_with(kw));
    if !is_guard {
        return Edit::None;
    }

    let bytes = line.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] != b'=' {
            continue;
        }
        let prev = if i > 0 { bytes[i - 1] } else { b' ' };
        let next = if i + 1 < bytes.len() { bytes[i + 1] } else { b' ' };
        // Skip ==, !=, <=, >= and augmented assignments
        if next == b'='
            || matches!(prev, b'=' | b'!' | b'<' | b'>' | b'+' | b'-' | b'*' | b'/' | b'%')
        {
            continue;
        }
        let mut text = line.to_string();
        text.insert(i, '=');
        return Edit::SameFile {
            line: defect.line,
            text,
        };
    }
    Edit::None
}

/// Loosen a strict inequality to its inclusive counterpart, `>` before `<`,
/// once per line.
pub fn loosen_strict_inequality(defect: &Defect, lines: &[String], _ctx: &StrategyCtx) -> Edit {
    let Some(line) = target_line(defect, lines) else {
        return Edit::None;
    };
    let bytes = line.as_bytes();

    for target in [b'>', b'<'] {
        for i in 0..bytes.len() {
            if bytes[i] != target {
                continue;
            }
            let prev = if i > 0 { bytes[i - 1] } else { b' ' };
            let next = if i + 1 < bytes.len() { bytes[i + 1] } else { b' ' };
            // Leave >=, <=, shifts, and arrows alone
            if next == b'=' || next == target || prev == target || prev == b'-' {
                continue;
            }
            let mut text = line.to_string();
            text.insert(i + 1, '=');
            return Edit::SameFile {
                line: defect.line,
                text,
            };
        }
    }
    Edit::None
}

fn flip_operator(c: char) -> char {
    match c {
        '+' => '-',
        '-' => '+',
        '*' => '/',
        '/' => '*',
        _ => c,
    }
}

fn swap_first_arithmetic_op(code: &str) -> Option<String> {
    // Operators inside comments are off-limits
    let limit = code.find('#').unwrap_or(code.len());
    let mut prev = '\0';
    for (i, c) in code.char_indices() {
        if i >= limit {
            break;
        }
        if matches!(c, '+' | '-' | '*' | '/') {
            // Skip **, //, augmented forms and arrows
            let next = code[i + c.len_utf8()..].chars().next().unwrap_or('\0');
            if next == c || prev == c || next == '=' || (c == '-' && next == '>') {
                prev = c;
                continue;
            }
            let mut out = code.to_string();
            out.replace_range(i..i + 1, &flip_operator(c).to_string());
            return Some(out);
        }
        prev = c;
    }
    None
}

/// Cross-file: the symptom is an assertion mismatch referencing a call to a
/// function defined elsewhere. The first arithmetic operator in a
/// return-bearing line of that function (or, failing that, an assignment
/// line) is swapped for its natural counterpart.
pub fn flip_callee_operator(defect: &Defect, _lines: &[String], ctx: &StrategyCtx) -> Edit {
    let callees: Vec<String> = CALL_SITE
        .captures_iter(&defect.message)
        .map(|c| c[1].to_string())
        .filter(|name| name != "assert")
        .collect();
    if callees.is_empty() {
        return Edit::None;
    }

    for rel in ctx.python_sources() {
        let Some(lines) = ctx.read_lines(&rel) else {
            continue;
        };
        let rel_str = rel.to_string_lossy().to_string();
        if rel_str == defect.file {
            continue;
        }

        for callee in &callees {
            let def_prefix = format!("def {}", callee);
            let Some(def_idx) = lines.iter().position(|l| {
                let code = l.trim_start();
                code.starts_with(&def_prefix)
                    && code[def_prefix.len()..].trim_start().starts_with('(')
                    || code.starts_with(&format!("{}(", def_prefix))
            }) else {
                continue;
            };

            let def_indent = indent_of(&lines[def_idx]).len();
            let body: Vec<usize> = (def_idx + 1..lines.len())
                .take_while(|&i| {
                    lines[i].trim().is_empty() || indent_of(&lines[i]).len() > def_indent
                })
                .collect();

            // return-bearing lines first, then assignments
            let return_line = body
                .iter()
                .find(|&&i| lines[i].trim_start().starts_with("return "));
            let assign_line = body.iter().find(|&&i| {
                let code = lines[i].trim_start();
                !code.starts_with("return ") && code.contains('=') && !code.contains("==")
            });

            for &idx in return_line.into_iter().chain(assign_line) {
                if let Some(swapped) = swap_first_arithmetic_op(&lines[idx]) {
                    return Edit::CrossFile {
                        file: rel_str,
                        line: idx + 1,
                        text: swapped,
                    };
                }
            }
        }
    }
    Edit::None
}

/// Cross-file: a dynamically-executed definition whose result is reported
/// absent. An `exec` call without a namespace capture is rewritten to bind
/// into an isolated namespace and return the invocation of the function it
/// defined. Only triggered when the message explicitly indicates a
/// `None`/absent result.
pub fn capture_dynamic_definition(defect: &Defect, _lines: &[String], ctx: &StrategyCtx) -> Edit {
    let msg = defect.message.to_lowercase();
    if !msg.contains("none") {
        return Edit::None;
    }

    for rel in ctx.python_sources() {
        let Some(lines) = ctx.read_lines(&rel) else {
            continue;
        };
        for (idx, line) in lines.iter().enumerate() {
            let Some(cap) = BARE_EXEC.captures(line) else {
                continue;
            };
            let indent = &cap[1];
            let arg = cap[2].trim();
            let text = format!(
                "{i}namespace = {{}}\n{i}exec({arg}, namespace)\n{i}return [value for value in namespace.values() if callable(value)][0]()",
                i = indent,
                arg = arg,
            );
            return Edit::CrossFile {
                file: rel.to_string_lossy().to_string(),
                line: idx + 1,
                text,
            };
        }
    }
    Edit::None
}

/// Wrap the operand after a `+` in `str()` when the message reports a
/// str/int operand mismatch.
pub fn coerce_str_concat(defect: &Defect, lines: &[String], _ctx: &StrategyCtx) -> Edit {
    let msg = defect.message.to_lowercase();
    if !(msg.contains("str") && msg.contains("int")) {
        return Edit::None;
    }
    let Some(line) = target_line(defect, lines) else {
        return Edit::None;
    };
    if line.contains("str(") {
        return Edit::None;
    }

    let Some(cap) = CONCAT_OPERAND.captures(line) else {
        return Edit::None;
    };
    let replacement = format!("{}str({})", &cap[1], &cap[2]);
    let text = CONCAT_OPERAND.replace(line, replacement.as_str()).to_string();
    Edit::SameFile {
        line: defect.line,
        text,
    }
}

/// Guard a `'NoneType' object is not ...` access site behind an
/// `is not None` check.
pub fn guard_none_access(defect: &Defect, lines: &[String], _ctx: &StrategyCtx) -> Edit {
    if !defect.message.to_lowercase().contains("nonetype") {
        return Edit::None;
    }
    let Some(line) = target_line(defect, lines) else {
        return Edit::None;
    };

    let Some(cap) = FIRST_ACCESS.captures(line.trim_start()) else {
        return Edit::None;
    };
    let var = &cap[1];
    let indent = indent_of(line);
    Edit::SameFile {
        line: defect.line,
        text: format!(
            "{i}if {v} is not None:\n{i}    {body}",
            i = indent,
            v = var,
            body = line.trim_start(),
        ),
    }
}
