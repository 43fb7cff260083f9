// Ordinal substitution: standalone digit runs become column references

use super::lexer::bracket;
use crate::catalog::FieldCatalog;
use crate::error::{EngineError, EngineResult};

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Replace every standalone run of digits with the bracketed name of the
/// column at that 1-based position.
///
/// A run counts as standalone when it is not glued to a letter, digit or
/// underscore on either side, so `Sales2024` and `1e3` are left alone while
/// `1.5` becomes two references. Text inside `[...]` is never rewritten.
pub fn substitute_ordinals(raw: &str, catalog: &FieldCatalog) -> EngineResult<String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut in_bracket = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_bracket {
            out.push(c);
            if c == ']' {
                if chars.get(i + 1) == Some(&']') {
                    out.push(']');
                    i += 2;
                    continue;
                }
                in_bracket = false;
            }
            i += 1;
            continue;
        }

        if c == '[' {
            in_bracket = true;
            out.push(c);
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let run: String = chars[start..i].iter().collect();
            let glued_before = start > 0 && is_word_char(chars[start - 1]);
            let glued_after = i < chars.len() && is_word_char(chars[i]);
            if glued_before || glued_after {
                out.push_str(&run);
                continue;
            }

            let position = run.parse::<usize>().map_err(|_| EngineError::OutOfRange {
                position: usize::MAX,
                count: catalog.len(),
            })?;
            let name = catalog.resolve_ordinal(position)?;
            out.push_str(&bracket(name));
            continue;
        }

        out.push(c);
        i += 1;
    }

    Ok(out)
}
