//! Decoder for album documents.
//!
//! A document is a `---` delimited YAML header followed by a
//! body in which `<Row cols={n}>` blocks wrap self-closing
//! `<Photo itemKey="..." caption="..." tags={[...]} />` declarations. Text
//! outside those elements is ignored. Attribute order and whitespace are free;
//! attribute strings may use either quote style; `{...}` values are kept as raw
//! expression text with nested braces and quoted strings balanced. An
//! `itemKey` or `caption` written as an expression counts only when the
//! expression is a single string literal.

use crate::model::{AlbumDocument, AlbumHeader, GeoTag, PhotoDeclaration, Row};
use crate::relaxed::{parse_geo_tags, parse_string_literal, TagParseError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Text(String),
    Expression(String),
}

impl AttrValue {
    pub fn as_str(&self) -> &str {
        match self {
            AttrValue::Text(v) | AttrValue::Expression(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub attrs: Vec<(String, AttrValue)>,
    pub self_closing: bool,
    /// Byte offset of the opening `<`.
    pub start: usize,
    /// Byte offset just past the closing `>`.
    pub end: usize,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// Attributes of one `<Photo ... />`, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoElement {
    pub item_key: Option<String>,
    pub caption: Option<String>,
    pub tags: Option<AttrValue>,
    pub offset: usize,
}

impl PhotoElement {
    fn from_element(element: &Element) -> Self {
        let item_key = element
            .attr("itemKey")
            .and_then(string_value)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let caption = element.attr("caption").and_then(string_value);
        Self {
            item_key,
            caption,
            tags: element.attr("tags").cloned(),
            offset: element.start,
        }
    }

    /// Decodes the tag list. A missing attribute is an empty list; a tag list
    /// written as a plain string is not a literal and fails.
    pub fn decode_tags(&self) -> Result<Vec<GeoTag>, TagParseError> {
        match &self.tags {
            None => Ok(Vec::new()),
            Some(value) => parse_geo_tags(value.as_str()),
        }
    }
}

fn string_value(value: &AttrValue) -> Option<String> {
    match value {
        AttrValue::Text(text) => Some(text.clone()),
        AttrValue::Expression(expr) => parse_string_literal(expr),
    }
}

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("ヘッダーを解析できませんでした: {0}")]
    Header(#[from] serde_yaml::Error),
    #[error("itemKeyのないPhotoがあります (位置 {0})")]
    MissingItemKey(usize),
    #[error("Rowが閉じられていません (位置 {0})")]
    UnclosedRow(usize),
    #[error("タグを解析できませんでした: {item_key}: {source}")]
    Tags {
        item_key: String,
        #[source]
        source: TagParseError,
    },
}

/// Splits off the `---` header block. Documents without one have no header.
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (None, text);
    };

    let mut offset = 0usize;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(header), body);
        }
        offset += line.len();
    }

    (None, text)
}

/// Deserializes the header block. Unknown keys are ignored and missing ones
/// take their defaults; an empty block is an all-default header.
pub fn parse_header(header: &str) -> Result<AlbumHeader, serde_yaml::Error> {
    if header.trim().is_empty() {
        return Ok(AlbumHeader::default());
    }
    serde_yaml::from_str(header)
}

/// Every self-closing `<Photo ... />` in `body`, in order of appearance.
pub fn photo_elements(body: &str) -> Vec<PhotoElement> {
    find_elements(body, "Photo")
        .iter()
        .filter(|element| element.self_closing)
        .map(PhotoElement::from_element)
        .collect()
}

/// Strict decode of a whole document into rows of declarations.
pub fn decode_album_document(text: &str) -> Result<AlbumDocument, MarkupError> {
    let (header, body) = split_front_matter(text);
    let header = header.map(parse_header).transpose()?.unwrap_or_default();

    let mut rows = Vec::new();
    for row in find_elements(body, "Row") {
        if row.self_closing {
            continue;
        }
        let Some(close) = body[row.end..].find("</Row>") else {
            return Err(MarkupError::UnclosedRow(row.start));
        };
        let inner = &body[row.end..row.end + close];

        let mut photos = Vec::new();
        for element in photo_elements(inner) {
            let Some(item_key) = element.item_key.clone() else {
                return Err(MarkupError::MissingItemKey(row.end + element.offset));
            };
            let tags = element.decode_tags().map_err(|source| MarkupError::Tags {
                item_key: item_key.clone(),
                source,
            })?;
            photos.push(PhotoDeclaration {
                item_key,
                caption: element.caption,
                tags,
            });
        }

        let column_count = row
            .attr("cols")
            .and_then(|v| v.as_str().trim().parse::<usize>().ok())
            .unwrap_or(photos.len());
        rows.push(Row {
            column_count,
            photos,
        });
    }

    Ok(AlbumDocument { header, rows })
}

/// Opening tags named `name`. A tag that never closes is skipped.
pub fn find_elements(text: &str, name: &str) -> Vec<Element> {
    let open = format!("<{}", name);
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut cursor = 0usize;

    while let Some(found) = text[cursor..].find(&open) {
        let start = cursor + found;
        let after = start + open.len();
        let boundary = bytes
            .get(after)
            .map(|b| b.is_ascii_whitespace() || *b == b'/' || *b == b'>')
            .unwrap_or(false);
        if !boundary {
            cursor = after;
            continue;
        }

        match parse_attributes(text, after) {
            Some((attrs, self_closing, end)) => {
                out.push(Element {
                    attrs,
                    self_closing,
                    start,
                    end,
                });
                cursor = end;
            }
            None => cursor = after,
        }
    }

    out
}

type ParsedAttributes = (Vec<(String, AttrValue)>, bool, usize);

fn parse_attributes(text: &str, from: usize) -> Option<ParsedAttributes> {
    let bytes = text.as_bytes();
    let mut attrs = Vec::new();
    let mut cursor = from;

    loop {
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            return None;
        }
        if bytes[cursor] == b'/' && bytes.get(cursor + 1) == Some(&b'>') {
            return Some((attrs, true, cursor + 2));
        }
        if bytes[cursor] == b'>' {
            return Some((attrs, false, cursor + 1));
        }
        if bytes[cursor] == b'<' {
            // Next tag started before this one closed.
            return None;
        }

        let name_start = cursor;
        while cursor < bytes.len()
            && !bytes[cursor].is_ascii_whitespace()
            && !matches!(bytes[cursor], b'=' | b'/' | b'>' | b'<')
        {
            cursor += 1;
        }
        if name_start == cursor {
            cursor += 1;
            continue;
        }
        let name = text[name_start..cursor].to_string();

        let mut lookahead = cursor;
        while lookahead < bytes.len() && bytes[lookahead].is_ascii_whitespace() {
            lookahead += 1;
        }
        if lookahead >= bytes.len() || bytes[lookahead] != b'=' {
            attrs.push((name, AttrValue::Expression("true".to_string())));
            continue;
        }
        cursor = lookahead + 1;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            return None;
        }

        let value = match bytes[cursor] {
            quote @ (b'"' | b'\'') => {
                let value_start = cursor + 1;
                let close = text[value_start..].find(quote as char)? + value_start;
                cursor = close + 1;
                AttrValue::Text(unescape_entities(&text[value_start..close]))
            }
            b'{' => {
                let close = matching_brace(bytes, cursor)?;
                let inner = text[cursor + 1..close].trim().to_string();
                cursor = close + 1;
                AttrValue::Expression(inner)
            }
            _ => {
                let value_start = cursor;
                while cursor < bytes.len()
                    && !bytes[cursor].is_ascii_whitespace()
                    && bytes[cursor] != b'>'
                    && !(bytes[cursor] == b'/' && bytes.get(cursor + 1) == Some(&b'>'))
                {
                    cursor += 1;
                }
                AttrValue::Text(text[value_start..cursor].to_string())
            }
        };
        attrs.push((name, value));
    }
}

fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut cursor = open;

    while cursor < bytes.len() {
        match bytes[cursor] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(cursor);
                }
            }
            quote @ (b'"' | b'\'' | b'`') => {
                cursor += 1;
                while cursor < bytes.len() && bytes[cursor] != quote {
                    if bytes[cursor] == b'\\' {
                        cursor += 1;
                    }
                    cursor += 1;
                }
            }
            _ => {}
        }
        cursor += 1;
    }

    None
}

pub fn escape_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_entities(input: &str) -> String {
    input
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
