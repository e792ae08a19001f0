use crate::markup::{parse_header, photo_elements, split_front_matter};
use crate::model::{AlbumHeader, PhotoWithTags};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

const DOCUMENT_EXTENSIONS: &[&str] = &["mdx", "md"];

/// One persisted album document. `id` is its path below the albums directory
/// without extension, `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub id: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Loads every album document below `albums_dir`, sorted by path. Unreadable
/// files are logged and left out.
pub fn load_corpus(albums_dir: &Path) -> Result<Vec<SourceDocument>> {
    if !albums_dir.is_dir() {
        anyhow::bail!(
            "アルバムフォルダが存在しません: {}",
            albums_dir.display()
        );
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(albums_dir).sort_by_file_name() {
        let entry = entry.with_context(|| {
            format!("フォルダ走査に失敗しました: {}", albums_dir.display())
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_document(path) {
            continue;
        }

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "アルバムファイルを読めませんでした"
                );
                continue;
            }
        };
        out.push(SourceDocument {
            id: document_id(albums_dir, path),
            text,
        });
    }

    Ok(out)
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            DOCUMENT_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

fn document_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Every keyed photo declaration of one document, in order of appearance.
///
/// Declarations without an item key are dropped. A header that is not valid
/// YAML is logged and replaced by defaults. A tag list that cannot be
/// decoded is logged and replaced by an empty list; it never affects other
/// declarations.
pub fn extract_document(doc: &SourceDocument) -> Vec<PhotoWithTags> {
    let (header, body) = split_front_matter(&doc.text);
    let header = match header.map(parse_header).transpose() {
        Ok(header) => header.unwrap_or_default(),
        Err(err) => {
            warn!(
                document = %doc.id,
                error = %err,
                "ヘッダーを解析できませんでした。既定値として扱います"
            );
            AlbumHeader::default()
        }
    };

    photo_elements(body)
        .into_iter()
        .filter_map(|element| {
            let item_key = element.item_key.clone()?;
            let tags = match element.decode_tags() {
                Ok(tags) => tags,
                Err(err) => {
                    warn!(
                        document = %doc.id,
                        item_key = %item_key,
                        error = %err,
                        "タグを解析できませんでした。空のタグとして扱います"
                    );
                    Vec::new()
                }
            };
            Some(PhotoWithTags {
                item_key,
                caption: element.caption,
                tags,
                album_title: header.title.clone(),
                album_id: doc.id.clone(),
                folder: header.folder.clone(),
            })
        })
        .collect()
}

/// Extracts all documents in parallel; output keeps document order, then
/// declaration order.
pub fn extract_all(docs: &[SourceDocument]) -> Vec<PhotoWithTags> {
    docs.par_iter()
        .map(extract_document)
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

pub fn extract_unique_tag_names(docs: &[SourceDocument]) -> BTreeSet<String> {
    extract_all(docs)
        .into_iter()
        .flat_map(|photo| photo.tags.into_iter().map(|tag| tag.name))
        .collect()
}
