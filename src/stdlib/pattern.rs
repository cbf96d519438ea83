// Lua pattern matching over host regexes
// A Lua pattern is translated once into a byte-oriented regex through a
// static class table (%a -> [[:alpha:]], lazy '-' -> '*?', anchors kept) and
// then driven by the regex engine. Balanced matches (%b) and frontier
// patterns (%f) are not supported; neither are pattern back references, which
// the host engine cannot express.

use regex::bytes::{CaptureLocations, Regex, RegexBuilder};

use crate::lua_vm::{LuaError, LuaResult};

/// One translated pattern plus the capture layout needed to build Lua-level
/// results.
pub struct LuaPattern {
    regex: Regex,
    pub anchored: bool,
    /// For each capture group: true when it is a position capture `()`.
    pub positions: Vec<bool>,
}

/// POSIX class bodies for the Lua character classes, spliceable inside sets.
fn class_body(c: u8) -> Option<&'static str> {
    Some(match c {
        b'a' => "[:alpha:]",
        b'A' => "[:^alpha:]",
        b'c' => "[:cntrl:]",
        b'C' => "[:^cntrl:]",
        b'd' => "[:digit:]",
        b'D' => "[:^digit:]",
        b'l' => "[:lower:]",
        b'L' => "[:^lower:]",
        b'p' => "[:punct:]",
        b'P' => "[:^punct:]",
        b's' => "[:space:]",
        b'S' => "[:^space:]",
        b'u' => "[:upper:]",
        b'U' => "[:^upper:]",
        b'w' => "[:alnum:]",
        b'W' => "[:^alnum:]",
        b'x' => "[:xdigit:]",
        b'X' => "[:^xdigit:]",
        _ => return None,
    })
}

fn escape_literal(out: &mut String, c: char) {
    if c.is_ascii_alphanumeric() {
        out.push(c);
    } else {
        out.push_str(&regex::escape(&c.to_string()));
    }
}

pub fn translate(pattern: &str) -> LuaResult<LuaPattern> {
    let bytes = pattern.as_bytes();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut positions = Vec::new();
    let mut i = 0;
    let mut anchored = false;

    if bytes.first() == Some(&b'^') {
        anchored = true;
        out.push('^');
        i = 1;
    }

    let malformed = |what: &str| LuaError::runtime(format!("malformed pattern ({})", what));

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'%' => {
                i += 1;
                let Some(&next) = bytes.get(i) else {
                    return Err(malformed("ends with '%'"));
                };
                if let Some(body) = class_body(next) {
                    out.push('[');
                    out.push_str(body);
                    out.push(']');
                } else if next == b'b' {
                    return Err(malformed("balanced match is not supported"));
                } else if next == b'f' {
                    return Err(malformed("frontier pattern is not supported"));
                } else if next.is_ascii_digit() {
                    return Err(malformed("back references are not supported"));
                } else {
                    escape_literal(&mut out, next as char);
                }
                i += 1;
            }
            b'[' => {
                i += 1;
                out.push('[');
                if bytes.get(i) == Some(&b'^') {
                    out.push('^');
                    i += 1;
                }
                // a leading ']' is a literal member
                if bytes.get(i) == Some(&b']') {
                    out.push_str("\\]");
                    i += 1;
                }
                loop {
                    let Some(&sc) = bytes.get(i) else {
                        return Err(malformed("missing ']'"));
                    };
                    match sc {
                        b']' => {
                            out.push(']');
                            i += 1;
                            break;
                        }
                        b'%' => {
                            i += 1;
                            let Some(&esc) = bytes.get(i) else {
                                return Err(malformed("ends with '%'"));
                            };
                            if let Some(body) = class_body(esc) {
                                out.push_str(body);
                            } else {
                                escape_in_set(&mut out, esc as char);
                            }
                            i += 1;
                        }
                        b'-' => {
                            // range dash; regex reads it the same way
                            out.push('-');
                            i += 1;
                        }
                        other => {
                            escape_in_set(&mut out, other as char);
                            i += 1;
                        }
                    }
                }
            }
            b'(' => {
                if bytes.get(i + 1) == Some(&b')') {
                    positions.push(true);
                    out.push_str("()");
                    i += 2;
                } else {
                    positions.push(false);
                    out.push('(');
                    i += 1;
                }
            }
            b')' => {
                out.push(')');
                i += 1;
            }
            b'.' => {
                out.push('.');
                i += 1;
            }
            b'*' | b'+' | b'?' => {
                out.push(c as char);
                i += 1;
            }
            b'-' => {
                // Lua's lazy repetition
                out.push_str("*?");
                i += 1;
            }
            b'$' => {
                if i + 1 == bytes.len() {
                    out.push('$');
                } else {
                    out.push_str("\\$");
                }
                i += 1;
            }
            b'^' => {
                out.push_str("\\^");
                i += 1;
            }
            _ => {
                // pattern input is a &str, so multibyte sequences come
                // through as whole chars
                let ch = pattern[i..].chars().next().unwrap_or('\u{fffd}');
                escape_literal(&mut out, ch);
                i += ch.len_utf8();
            }
        }
    }

    let regex = RegexBuilder::new(&out)
        .unicode(false)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| LuaError::runtime(format!("malformed pattern ({})", e)))?;

    Ok(LuaPattern {
        regex,
        anchored,
        positions,
    })
}

fn escape_in_set(out: &mut String, c: char) {
    match c {
        ']' | '\\' | '^' | '-' | '[' | '&' | '~' => {
            out.push('\\');
            out.push(c);
        }
        _ => out.push(c),
    }
}

/// One capture as Lua sees it: matched text or a 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureValue {
    Text(Vec<u8>),
    Position(usize),
}

#[derive(Debug)]
pub struct MatchResult {
    /// Byte range of the whole match in the subject.
    pub start: usize,
    pub end: usize,
    /// Explicit captures; empty when the pattern has none.
    pub captures: Vec<CaptureValue>,
}

impl LuaPattern {
    /// Find the first match at or after `init` (a byte offset).
    pub fn first_match(&self, subject: &[u8], init: usize) -> Option<MatchResult> {
        if init > subject.len() {
            return None;
        }
        let slice = &subject[init..];
        let mut locs: CaptureLocations = self.regex.capture_locations();
        let m = self.regex.captures_read(&mut locs, slice)?;
        let (start, end) = (m.start() + init, m.end() + init);

        let mut captures = Vec::new();
        for g in 1..locs.len() {
            match locs.get(g) {
                Some((s, e)) => {
                    if self.positions.get(g - 1).copied().unwrap_or(false) {
                        captures.push(CaptureValue::Position(s + init + 1));
                    } else {
                        captures.push(CaptureValue::Text(slice[s..e].to_vec()));
                    }
                }
                None => captures.push(CaptureValue::Text(Vec::new())),
            }
        }
        Some(MatchResult {
            start,
            end,
            captures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(pattern: &str, subject: &str) -> Option<(usize, usize)> {
        let p = translate(pattern).unwrap();
        p.first_match(subject.as_bytes(), 0).map(|m| (m.start, m.end))
    }

    #[test]
    fn classes_translate() {
        assert_eq!(find("%d+", "abc123def"), Some((3, 6)));
        assert_eq!(find("%a+", "  hello  "), Some((2, 7)));
        assert_eq!(find("%s", "ab cd"), Some((2, 3)));
        assert_eq!(find("%w+", "--token--"), Some((2, 7)));
    }

    #[test]
    fn lazy_quantifier() {
        let p = translate("<(.-)>").unwrap();
        let m = p.first_match(b"<a><b>", 0).unwrap();
        assert_eq!(m.end, 3);
        assert_eq!(m.captures, vec![CaptureValue::Text(b"a".to_vec())]);
    }

    #[test]
    fn anchors() {
        assert_eq!(find("^ab", "abc"), Some((0, 2)));
        assert_eq!(find("^bc", "abc"), None);
        assert_eq!(find("bc$", "abc"), Some((1, 3)));
    }

    #[test]
    fn sets_and_ranges() {
        assert_eq!(find("[a-c]+", "zzabccz"), Some((2, 6)));
        assert_eq!(find("[^%s]+", "  word  "), Some((2, 6)));
    }

    #[test]
    fn position_captures() {
        let p = translate("()a()").unwrap();
        let m = p.first_match(b"xa", 0).unwrap();
        assert_eq!(
            m.captures,
            vec![CaptureValue::Position(2), CaptureValue::Position(3)]
        );
    }

    #[test]
    fn unsupported_forms_error() {
        assert!(translate("%b()").is_err());
        assert!(translate("%f[%a]").is_err());
        assert!(translate("(a)%1").is_err());
    }
}
