use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One image file and the capture time recovered from its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub filename: String,
    pub captured_at: Option<NaiveDateTime>,
}

impl ImageRecord {
    pub fn new(filename: impl Into<String>, captured_at: Option<NaiveDateTime>) -> Self {
        Self {
            filename: filename.into(),
            captured_at,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlbumRefError {
    #[error("<folder>/<album> の形式で指定してください: {0}")]
    Malformed(String),
    #[error("スラッグに使用できない文字が含まれています: {0}")]
    InvalidSlug(String),
}

/// A `<folder>/<album>` pair identifying one album directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlbumRef {
    pub folder: String,
    pub album: String,
}

impl AlbumRef {
    pub fn new(folder: &str, album: &str) -> Result<Self, AlbumRefError> {
        validate_slug(folder)?;
        validate_slug(album)?;
        Ok(Self {
            folder: folder.to_string(),
            album: album.to_string(),
        })
    }

    /// Storage lookup key for a file inside this album.
    pub fn item_key(&self, filename: &str) -> String {
        format!("{}/{}/{}", self.folder, self.album, filename)
    }
}

impl FromStr for AlbumRef {
    type Err = AlbumRefError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim().trim_matches('/');
        let mut parts = trimmed.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(folder), Some(album), None) => Self::new(folder, album),
            _ => Err(AlbumRefError::Malformed(input.to_string())),
        }
    }
}

impl fmt::Display for AlbumRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.folder, self.album)
    }
}

fn validate_slug(slug: &str) -> Result<(), AlbumRefError> {
    if slug.is_empty() {
        return Err(AlbumRefError::Malformed(slug.to_string()));
    }
    if slug == "."
        || slug == ".."
        || slug
            .chars()
            .any(|ch| matches!(ch, '/' | '\\' | '"' | '<' | '>') || ch.is_control())
    {
        return Err(AlbumRefError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

/// Ordered photo list of an album about to be rendered. The cover is always
/// the first ordered photo, so an empty draft cannot be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumDraft {
    album: AlbumRef,
    ordered_photos: Vec<String>,
}

impl AlbumDraft {
    pub fn new(album: AlbumRef, ordered_photos: Vec<String>) -> Option<Self> {
        if ordered_photos.is_empty() {
            return None;
        }
        Some(Self {
            album,
            ordered_photos,
        })
    }

    pub fn album(&self) -> &AlbumRef {
        &self.album
    }

    pub fn ordered_photos(&self) -> &[String] {
        &self.ordered_photos
    }

    pub fn cover_filename(&self) -> &str {
        &self.ordered_photos[0]
    }

    pub fn cover_key(&self) -> String {
        self.album.item_key(self.cover_filename())
    }
}

/// Named marker at a normalized position on a photo. Coordinates are not
/// range-checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTag {
    pub name: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoDeclaration {
    pub item_key: String,
    pub caption: Option<String>,
    pub tags: Vec<GeoTag>,
}

impl PhotoDeclaration {
    /// Declaration as first generated: empty caption, no tags.
    pub fn blank(item_key: String) -> Self {
        Self {
            item_key,
            caption: Some(String::new()),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub column_count: usize,
    pub photos: Vec<PhotoDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlbumHeader {
    pub title: String,
    pub cover_key: String,
    pub order: i64,
    pub folder: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumDocument {
    pub header: AlbumHeader,
    pub rows: Vec<Row>,
}

impl AlbumDocument {
    pub fn photos(&self) -> impl Iterator<Item = &PhotoDeclaration> {
        self.rows.iter().flat_map(|row| row.photos.iter())
    }
}

/// A photo declaration joined with the album it was found in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoWithTags {
    pub item_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub tags: Vec<GeoTag>,
    pub album_title: String,
    pub album_id: String,
    pub folder: String,
}
