//! Hand-written tag literals such as `[{name: 'Peak', x: 0.5, y: 0.3,}]`.
//!
//! Authors write tag lists the way they would in a script: bare keys, either
//! quote style and trailing commas. [`normalize_relaxed_literal`] rewrites such
//! text into strict JSON in a single pass that tracks string boundaries, so a
//! colon or comma inside a quoted name is left alone.

use crate::model::GeoTag;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LiteralError {
    #[error("文字列が閉じられていません (位置 {0})")]
    UnterminatedString(usize),
    #[error("配列リテラルではありません")]
    NotAnArray,
    #[error("不正なエスケープシーケンスです (位置 {0})")]
    InvalidEscape(usize),
}

#[derive(Debug, Error)]
pub enum TagParseError {
    #[error(transparent)]
    Literal(#[from] LiteralError),
    #[error("タグのJSONを解析できませんでした: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn parse_geo_tags(literal: &str) -> Result<Vec<GeoTag>, TagParseError> {
    let trimmed = literal.trim();
    if !trimmed.starts_with('[') {
        return Err(LiteralError::NotAnArray.into());
    }
    let json = normalize_relaxed_literal(trimmed)?;
    Ok(serde_json::from_str::<Vec<GeoTag>>(&json)?)
}

/// Value of an expression that is exactly one string literal in either quote
/// style, e.g. `"a.jpg"` or `'Summit'`. Anything else yields `None`.
pub fn parse_string_literal(literal: &str) -> Option<String> {
    let chars: Vec<(usize, char)> = literal.trim().char_indices().collect();
    match chars.first() {
        Some((_, '\'' | '"')) => {}
        _ => return None,
    }
    let (text, next) = read_string(&chars, 0).ok()?;
    (next == chars.len()).then_some(text)
}

/// Rewrites a relaxed literal into strict JSON:
/// bare object keys are quoted, single-quoted strings become double-quoted and
/// commas directly before `]` or `}` are dropped.
pub fn normalize_relaxed_literal(input: &str) -> Result<String, LiteralError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut i = 0usize;

    while i < chars.len() {
        let ch = chars[i].1;
        match ch {
            '\'' | '"' => {
                let (text, next) = read_string(&chars, i)?;
                push_json_string(&mut out, &text);
                i = next;
            }
            ',' => {
                let next = skip_whitespace(&chars, i + 1);
                let closes = chars
                    .get(next)
                    .map(|(_, c)| *c == ']' || *c == '}')
                    .unwrap_or(false);
                if !closes {
                    out.push(',');
                }
                i += 1;
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_continue(chars[i].1) {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                let next = skip_whitespace(&chars, i);
                let is_key = chars.get(next).map(|(_, c)| *c == ':').unwrap_or(false);
                if is_key {
                    push_json_string(&mut out, &ident);
                } else {
                    out.push_str(&ident);
                }
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }

    Ok(out)
}

fn read_string(chars: &[(usize, char)], open: usize) -> Result<(String, usize), LiteralError> {
    let (start_pos, quote) = chars[open];
    let mut text = String::new();
    let mut i = open + 1;

    while i < chars.len() {
        let ch = chars[i].1;
        if ch == '\\' {
            let Some(&(_, escaped)) = chars.get(i + 1) else {
                break;
            };
            match escaped {
                'n' => text.push('\n'),
                't' => text.push('\t'),
                'r' => text.push('\r'),
                'b' => text.push('\u{8}'),
                'f' => text.push('\u{c}'),
                'u' => {
                    let (decoded, next) = read_unicode_escape(chars, i)?;
                    text.push(decoded);
                    i = next;
                    continue;
                }
                other => text.push(other),
            }
            i += 2;
            continue;
        }
        if ch == quote {
            return Ok((text, i + 1));
        }
        text.push(ch);
        i += 1;
    }

    Err(LiteralError::UnterminatedString(start_pos))
}

/// Decodes `\uXXXX` starting at the backslash at `at`, joining a UTF-16
/// surrogate pair when the first unit is a high surrogate.
fn read_unicode_escape(
    chars: &[(usize, char)],
    at: usize,
) -> Result<(char, usize), LiteralError> {
    let invalid = || LiteralError::InvalidEscape(chars[at].0);
    let high = hex_unit(chars, at + 2).ok_or_else(invalid)?;
    let mut next = at + 6;

    let code = if (0xD800..0xDC00).contains(&high) {
        let paired = chars.get(next).map(|(_, c)| *c) == Some('\\')
            && chars.get(next + 1).map(|(_, c)| *c) == Some('u');
        let low = if paired { hex_unit(chars, next + 2) } else { None };
        match low {
            Some(low) if (0xDC00..0xE000).contains(&low) => {
                next += 6;
                0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
            }
            _ => return Err(invalid()),
        }
    } else {
        high
    };

    let decoded = char::from_u32(code).ok_or_else(invalid)?;
    Ok((decoded, next))
}

fn hex_unit(chars: &[(usize, char)], from: usize) -> Option<u32> {
    let digits = chars.get(from..from + 4)?;
    digits
        .iter()
        .try_fold(0u32, |acc, (_, c)| c.to_digit(16).map(|d| acc * 16 + d))
}

fn push_json_string(out: &mut String, text: &str) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn skip_whitespace(chars: &[(usize, char)], mut i: usize) -> usize {
    while i < chars.len() && chars[i].1.is_whitespace() {
        i += 1;
    }
    i
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relaxed_literal_becomes_one_tag() {
        let tags = parse_geo_tags("[{name: 'Peak', x: 0.5, y: 0.3,}]").expect("must parse");
        assert_eq!(
            tags,
            vec![GeoTag {
                name: "Peak".to_string(),
                x: 0.5,
                y: 0.3,
            }]
        );
    }

    #[test]
    fn strict_json_passes_through() {
        let literal = r#"[{"name": "A", "x": 1, "y": 2}, {"name": "B", "x": -0.1, "y": 1.5}]"#;
        let tags = parse_geo_tags(literal).expect("must parse");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].name, "B");
        assert_eq!(tags[1].x, -0.1);
        assert_eq!(tags[1].y, 1.5);
    }

    #[test]
    fn multiline_literal_with_trailing_commas() {
        let literal = concat!(
            "[\n",
            "  { name: \"玉山主峰\", x: 0.42, y: 0.18 },\n",
            "  { name: 'Dongfeng', x: 0.7, y: 0.25, },\n",
            "]",
        );
        let tags = parse_geo_tags(literal).expect("must parse");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "玉山主峰");
        assert_eq!(tags[1].name, "Dongfeng");
    }

    #[test]
    fn colons_and_commas_inside_names_survive() {
        let tags = parse_geo_tags("[{name: 'Trail: north, upper', x: 0.1, y: 0.2}]")
            .expect("must parse");
        assert_eq!(tags[0].name, "Trail: north, upper");
    }

    #[test]
    fn quotes_inside_single_quoted_names_are_escaped() {
        let json = normalize_relaxed_literal(r#"[{name: 'the "saddle"'}]"#).expect("normalize");
        assert_eq!(json, r#"[{"name": "the \"saddle\""}]"#);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = parse_geo_tags("[{name: 'Peak, x: 0.5}]").expect_err("must fail");
        assert!(matches!(
            err,
            TagParseError::Literal(LiteralError::UnterminatedString(_))
        ));
    }

    #[test]
    fn missing_coordinate_is_an_error() {
        let err = parse_geo_tags("[{name: 'Peak', x: 0.5}]").expect_err("must fail");
        assert!(matches!(err, TagParseError::Json(_)));
    }

    #[test]
    fn non_array_is_rejected() {
        let err = parse_geo_tags("{name: 'Peak'}").expect_err("must fail");
        assert!(matches!(err, TagParseError::Literal(LiteralError::NotAnArray)));
    }

    #[test]
    fn empty_array_is_fine() {
        assert!(parse_geo_tags("[]").expect("must parse").is_empty());
        assert!(parse_geo_tags(" [ ] ").expect("must parse").is_empty());
    }

    #[test]
    fn unicode_escapes_are_decoded() {
        let tags = parse_geo_tags(r"[{name: 'Caf\u00e9', x: 0, y: 0}]").expect("must parse");
        assert_eq!(tags[0].name, "Café");

        let tags = parse_geo_tags(r#"[{name: "\ud83c\udfd4 \u7389\u5c71", x: 0, y: 0}]"#)
            .expect("must parse");
        assert_eq!(tags[0].name, "\u{1f3d4} 玉山");
    }

    #[test]
    fn malformed_unicode_escape_is_an_error() {
        for literal in [
            r"[{name: '\u00zz', x: 0, y: 0}]",
            r"[{name: '\u00e', x: 0, y: 0}]",
            r"[{name: '\ud83c alone', x: 0, y: 0}]",
        ] {
            let err = parse_geo_tags(literal).expect_err("must fail");
            assert!(
                matches!(err, TagParseError::Literal(LiteralError::InvalidEscape(_))),
                "{literal}: {err:?}"
            );
        }
    }

    #[test]
    fn single_string_literal_is_recognized() {
        assert_eq!(parse_string_literal(r#" "a/b.jpg" "#).as_deref(), Some("a/b.jpg"));
        assert_eq!(parse_string_literal("'Summit'").as_deref(), Some("Summit"));
        assert_eq!(parse_string_literal(r"'It\'s'").as_deref(), Some("It's"));
        assert_eq!(parse_string_literal("'a' + 'b'"), None);
        assert_eq!(parse_string_literal("caption"), None);
        assert_eq!(parse_string_literal("'open"), None);
    }
}
