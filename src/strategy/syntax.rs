//! Same-file strategies for syntax and indentation defects.

use crate::model::Defect;
use crate::util::indent_of;

use super::{Edit, StrategyCtx};

fn target_line<'a>(defect: &Defect, lines: &'a [String]) -> Option<&'a str> {
    if defect.line == 0 || defect.line > lines.len() {
        return None;
    }
    Some(&lines[defect.line - 1])
}

/// Whether a (left-trimmed) line opens a compound statement.
fn opens_block(code: &str) -> bool {
    const PREFIXED: &[&str] = &[
        "def ", "class ", "if ", "elif ", "for ", "while ", "with ", "except ",
    ];
    const BARE: &[&str] = &["try", "else", "except", "finally"];

    if PREFIXED.iter().any(|kw| code.starts_with(kw)) {
        return true;
    }
    BARE.iter().any(|kw| {
        code == *kw
            || code.strip_prefix(kw).map(|rest| rest.starts_with(':')).unwrap_or(false)
    })
}

/// A compound-statement line missing its trailing colon gets one appended.
/// When the following lines are not deeper indented the block would be
/// empty, so a placeholder `pass` body is inserted with the candidate.
pub fn append_block_terminator(defect: &Defect, lines: &[String], _ctx: &StrategyCtx) -> Edit {
    let Some(line) = target_line(defect, lines) else {
        return Edit::None;
    };
    let stripped = line.trim_end();
    let code = stripped.trim_start();
    if !opens_block(code) || stripped.ends_with(':') || code.is_empty() {
        return Edit::None;
    }

    let indent = indent_of(stripped);
    let with_colon = format!("{}:", stripped);

    let body_exists = lines
        .iter()
        .skip(defect.line)
        .find(|l| !l.trim().is_empty())
        .map(|l| indent_of(l).len() > indent.len())
        .unwrap_or(false);

    if body_exists {
        Edit::SameFile {
            line: defect.line,
            text: with_colon,
        }
    } else {
        Edit::SameFile {
            line: defect.line,
            text: format!("{}\n{}    pass", with_colon, indent),
        }
    }
}

const BRACKET_PAIRS: &[(char, char)] = &[('(', ')'), ('[', ']'), ('{', '}')];

/// Compare open/close counts per bracket pair on the line: append missing
/// closers, or strip surplus closers from the end of the line.
pub fn balance_delimiters(defect: &Defect, lines: &[String], _ctx: &StrategyCtx) -> Edit {
    let Some(line) = target_line(defect, lines) else {
        return Edit::None;
    };

    for &(open, close) in BRACKET_PAIRS {
        let opens = line.matches(open).count();
        let closes = line.matches(close).count();

        if opens > closes {
            let mut text = line.trim_end().to_string();
            for _ in 0..(opens - closes) {
                text.push(close);
            }
            return Edit::SameFile {
                line: defect.line,
                text,
            };
        }

        if closes > opens {
            let mut text = line.trim_end().to_string();
            let mut surplus = closes - opens;
            while surplus > 0 && text.ends_with(close) {
                text.pop();
                surplus -= 1;
            }
            if text != line.trim_end() {
                return Edit::SameFile {
                    line: defect.line,
                    text,
                };
            }
        }
    }

    Edit::None
}

fn unescaped_count(line: &str, quote: char) -> usize {
    let mut count = 0;
    let mut prev = '\0';
    for c in line.chars() {
        if c == quote && prev != '\\' {
            count += 1;
        }
        prev = c;
    }
    count
}

/// An odd number of unescaped quotes of one style gets a closing quote of
/// that style appended.
pub fn balance_quotes(defect: &Defect, lines: &[String], _ctx: &StrategyCtx) -> Edit {
    let Some(line) = target_line(defect, lines) else {
        return Edit::None;
    };

    for quote in ['\'', '"'] {
        if unescaped_count(line, quote) % 2 != 0 {
            return Edit::SameFile {
                line: defect.line,
                text: format!("{}{}", line.trim_end(), quote),
            };
        }
    }
    Edit::None
}

/// Trailing characters that cannot end a statement (dangling operators,
/// stray commas, a lone continuation backslash) are stripped.
pub fn strip_trailing_garbage(defect: &Defect, lines: &[String], _ctx: &StrategyCtx) -> Edit {
    const GARBAGE: &[char] = &['+', '-', '*', '/', '%', ',', '.', '\\', '|', '&', '^'];

    let Some(line) = target_line(defect, lines) else {
        return Edit::None;
    };

    let mut text = line.trim_end();
    while text.ends_with(GARBAGE) {
        text = text[..text.len() - 1].trim_end();
    }

    if text.trim().is_empty() || text == line {
        return Edit::None;
    }
    Edit::SameFile {
        line: defect.line,
        text: text.to_string(),
    }
}

/// Dedent keywords that close one level relative to their block header.
const DEDENT_PREFIXES: &[&str] = &["else:", "elif ", "except", "finally:"];

/// Realign the line against the nearest prior non-empty line: inherit its
/// indentation, one level deeper when that line opens a block, one level
/// shallower for dedent keywords.
pub fn realign_indentation(defect: &Defect, lines: &[String], _ctx: &StrategyCtx) -> Edit {
    let Some(line) = target_line(defect, lines) else {
        return Edit::None;
    };
    let content = line.trim_start();
    if content.is_empty() {
        return Edit::None;
    }

    if defect.line < 2 {
        return Edit::SameFile {
            line: defect.line,
            text: content.to_string(),
        };
    }

    let mut prev_indent = String::new();
    for prior in lines[..defect.line - 1]
        .iter()
        .rev()
        .take(5)
    {
        if prior.trim().is_empty() {
            continue;
        }
        prev_indent = indent_of(prior).to_string();
        if prior.trim_end().ends_with(':') {
            prev_indent.push_str("    ");
        }
        break;
    }

    if DEDENT_PREFIXES.iter().any(|kw| content.starts_with(kw)) && prev_indent.len() >= 4 {
        prev_indent.truncate(prev_indent.len() - 4);
    }

    Edit::SameFile {
        line: defect.line,
        text: format!("{}{}", prev_indent, content),
    }
}

/// Replace tabs in the leading whitespace with four-space indents.
pub fn normalize_tabs(defect: &Defect, lines: &[String], _ctx: &StrategyCtx) -> Edit {
    let Some(line) = target_line(defect, lines) else {
        return Edit::None;
    };
    let indent = indent_of(line);
    if !indent.contains('\t') {
        return Edit::None;
    }
    let fixed_indent = indent.replace('\t', "    ");
    Edit::SameFile {
        line: defect.line,
        text: format!("{}{}", fixed_indent, &line[indent.len()..]),
    }
}
