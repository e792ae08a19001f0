use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};
use std::io::Cursor;
use thiserror::Error;

/// Capture-time tags in priority order: original capture, modification, digitization.
const CAPTURE_TIME_TAGS: &[Tag] = &[
    Tag::DateTimeOriginal,
    Tag::DateTime,
    Tag::DateTimeDigitized,
];

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("EXIFが含まれていません")]
    Missing,
    #[error("EXIFを解析できませんでした: {0}")]
    Corrupt(String),
}

/// Capture time of an image, or `None` when it cannot be determined for any reason.
pub fn read_capture_time(bytes: &[u8]) -> Option<NaiveDateTime> {
    inspect_capture_time(bytes).ok().flatten()
}

/// Like [`read_capture_time`] but reports why metadata could not be decoded.
///
/// `Ok(None)` means the metadata was readable but carried no usable timestamp.
pub fn inspect_capture_time(bytes: &[u8]) -> Result<Option<NaiveDateTime>, MetadataError> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .map_err(|err| match err {
            exif::Error::NotFound(_) => MetadataError::Missing,
            other => MetadataError::Corrupt(other.to_string()),
        })?;

    let Some(field) = CAPTURE_TIME_TAGS
        .iter()
        .find_map(|tag| exif.get_field(*tag, In::PRIMARY))
    else {
        return Ok(None);
    };

    let raw = match &field.value {
        Value::Ascii(values) => values
            .first()
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .unwrap_or_default(),
        _ => field.display_value().to_string(),
    };

    Ok(parse_exif_timestamp(&raw))
}

/// Parses `YYYY:MM:DD HH:MM:SS`, rewriting the date separators first.
pub fn parse_exif_timestamp(input: &str) -> Option<NaiveDateTime> {
    let trimmed = input.trim().trim_matches('"').trim_end_matches('\0');
    let normalized = rewrite_date_separators(trimmed);

    let candidates = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];

    candidates
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
}

fn rewrite_date_separators(input: &str) -> String {
    let bytes = input.as_bytes();
    if bytes.len() >= 10 && bytes[4] == b':' && bytes[7] == b':' {
        let mut out = String::with_capacity(input.len());
        out.push_str(&input[..4]);
        out.push('-');
        out.push_str(&input[5..7]);
        out.push('-');
        out.push_str(&input[8..]);
        out
    } else {
        input.to_string()
    }
}
