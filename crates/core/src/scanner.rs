use crate::error::PipelineError;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "avif"];

/// Filenames of recognized images directly inside `dir`.
///
/// The result carries no ordering; callers sort it themselves. An empty set is
/// returned as-is, it is up to the caller to treat that as "no images".
pub fn scan_images(dir: &Path) -> Result<HashSet<String>> {
    if !dir.is_dir() {
        return Err(PipelineError::AlbumSourceNotFound(dir.to_path_buf()).into());
    }

    let mut out = HashSet::new();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("フォルダを読めませんでした: {}", dir.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("エントリ読み取り失敗: {}", dir.display()))?;
        let path = entry.path();
        if path.is_dir() || !is_image(&path) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|v| v.to_str()) {
            out.insert(name.to_string());
        }
    }

    Ok(out)
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn keeps_only_allowed_extensions_case_insensitively() {
        let temp = tempdir().expect("tempdir");
        let names = [
            "a.JPG", "b.jpeg", "c.png", "d.WebP", "e.avif", "notes.txt", "raw.dng", "noext",
        ];
        for name in names {
            fs::write(temp.path().join(name), b"x").expect("write");
        }
        fs::create_dir_all(temp.path().join("nested.jpg")).expect("dir named like an image");

        let found = scan_images(temp.path()).expect("scan");
        let expected: HashSet<String> = ["a.JPG", "b.jpeg", "c.png", "d.WebP", "e.avif"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn empty_directory_is_not_an_error() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("readme.md"), b"x").expect("write");
        let found = scan_images(temp.path()).expect("scan");
        assert!(found.is_empty());
    }

    #[test]
    fn missing_directory_is_reported() {
        let temp = tempdir().expect("tempdir");
        let err = scan_images(&temp.path().join("missing")).expect_err("must fail");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::AlbumSourceNotFound(_))
        ));
    }
}
