use crate::markup::escape_entities;
use crate::model::{AlbumDocument, AlbumDraft, AlbumHeader, GeoTag, PhotoDeclaration, Row};
use std::fmt::Write;
use std::num::NonZeroUsize;

/// Lays out a draft as a new album document: cover from the first photo,
/// `row_width` photos per row (the last row holds the remainder) and blank
/// captions and tag lists left for manual curation.
pub fn build_album_document(
    draft: &AlbumDraft,
    title: &str,
    row_width: NonZeroUsize,
) -> AlbumDocument {
    let album = draft.album();
    let rows = draft
        .ordered_photos()
        .chunks(row_width.get())
        .map(|chunk| Row {
            column_count: chunk.len(),
            photos: chunk
                .iter()
                .map(|filename| PhotoDeclaration::blank(album.item_key(filename)))
                .collect(),
        })
        .collect();

    AlbumDocument {
        header: AlbumHeader {
            title: title.to_string(),
            cover_key: draft.cover_key(),
            order: 0,
            folder: album.folder.clone(),
        },
        rows,
    }
}

pub fn render_album_document(draft: &AlbumDraft, title: &str, row_width: NonZeroUsize) -> String {
    encode_album_document(&build_album_document(draft, title, row_width))
}

/// Serializes a document. Identical input always yields identical text.
pub fn encode_album_document(doc: &AlbumDocument) -> String {
    let mut out = String::new();
    out.push_str("---\n");
    push_header_line(&mut out, "title", &json_string(&doc.header.title));
    push_header_line(&mut out, "coverKey", &json_string(&doc.header.cover_key));
    push_header_line(&mut out, "order", &doc.header.order.to_string());
    push_header_line(&mut out, "folder", &json_string(&doc.header.folder));
    out.push_str("---\n\n");

    let rows: Vec<String> = doc.rows.iter().map(encode_row).collect();
    out.push_str(&rows.join("\n\n"));
    out.push('\n');
    out
}

fn push_header_line(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}

fn encode_row(row: &Row) -> String {
    let mut out = format!("<Row cols={{{}}}>\n", row.column_count);
    for photo in &row.photos {
        out.push_str("  ");
        out.push_str(&encode_photo(photo));
        out.push('\n');
    }
    out.push_str("</Row>");
    out
}

pub fn encode_photo(photo: &PhotoDeclaration) -> String {
    let mut out = format!("<Photo itemKey=\"{}\"", escape_entities(&photo.item_key));
    if let Some(caption) = &photo.caption {
        let _ = write!(out, " caption=\"{}\"", escape_entities(caption));
    }
    let _ = write!(out, " tags={{{}}} />", encode_tags(&photo.tags));
    out
}

/// Tag lists are written in the relaxed style authors use by hand.
pub fn encode_tags(tags: &[GeoTag]) -> String {
    let items: Vec<String> = tags
        .iter()
        .map(|tag| {
            format!(
                "{{ name: {}, x: {}, y: {} }}",
                json_string(&tag.name),
                tag.x,
                tag.y
            )
        })
        .collect();
    format!("[{}]", items.join(", "))
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
