use crate::config::PipelineConfig;
use crate::document::render_album_document;
use crate::error::PipelineError;
use crate::exif_reader::{inspect_capture_time, MetadataError};
use crate::model::{AlbumDraft, AlbumRef, ImageRecord};
use crate::scanner::scan_images;
use crate::sorter::sort_chronologically;
use crate::writer::{write_if_absent, WriteOutcome};
use anyhow::Result;
use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlbumOutcome {
    Written {
        path: PathBuf,
        photos: usize,
        rows: usize,
    },
    Skipped {
        path: PathBuf,
    },
    NoImages {
        dir: PathBuf,
    },
}

/// Generates the document for one album unless it already exists.
///
/// Only a missing source directory is an error here; an existing document or
/// an album without images is reported through [`AlbumOutcome`].
pub fn generate_album(
    config: &PipelineConfig,
    album: &AlbumRef,
    title: &str,
) -> Result<AlbumOutcome> {
    let row_width = config.row_width()?;
    let source_dir = config.album_source_dir(album);
    if !source_dir.is_dir() {
        return Err(PipelineError::AlbumSourceNotFound(source_dir).into());
    }

    let target = config.document_path(album);
    if target.exists() {
        info!(
            album = %album,
            path = %target.display(),
            "既存のアルバムがあるためスキップしました"
        );
        return Ok(AlbumOutcome::Skipped { path: target });
    }

    let filenames = scan_images(&source_dir)?;
    if filenames.is_empty() {
        warn!(
            album = %album,
            dir = %source_dir.display(),
            "画像が見つからないためスキップしました"
        );
        return Ok(AlbumOutcome::NoImages { dir: source_dir });
    }

    let records = read_image_records(&source_dir, album, filenames);
    let ordered = sort_chronologically(records);
    let Some(draft) = AlbumDraft::new(album.clone(), ordered) else {
        return Ok(AlbumOutcome::NoImages { dir: source_dir });
    };

    let content = render_album_document(&draft, title, row_width);
    let photos = draft.ordered_photos().len();
    let rows = photos.div_ceil(row_width.get());

    match write_if_absent(&target, &content)? {
        WriteOutcome::Written => {
            info!(
                album = %album,
                path = %target.display(),
                photos,
                rows,
                "アルバムを作成しました"
            );
            Ok(AlbumOutcome::Written {
                path: target,
                photos,
                rows,
            })
        }
        WriteOutcome::Skipped => {
            info!(
                album = %album,
                path = %target.display(),
                "既存のアルバムがあるためスキップしました"
            );
            Ok(AlbumOutcome::Skipped { path: target })
        }
    }
}

/// Single-album mode: an existing target or an empty album is fatal.
pub fn create_album(
    config: &PipelineConfig,
    album: &AlbumRef,
    title: &str,
) -> Result<AlbumOutcome> {
    match generate_album(config, album, title)? {
        AlbumOutcome::Skipped { path } => Err(PipelineError::AlbumExists(path).into()),
        AlbumOutcome::NoImages { dir } => Err(PipelineError::NoImages(dir).into()),
        written => Ok(written),
    }
}

/// Reads every image's capture time in parallel. All reads finish before this
/// returns.
pub fn read_image_records(
    dir: &Path,
    album: &AlbumRef,
    filenames: HashSet<String>,
) -> Vec<ImageRecord> {
    let mut names: Vec<String> = filenames.into_iter().collect();
    names.sort();

    names
        .into_par_iter()
        .map(|name| {
            let captured_at = capture_time_for(&dir.join(&name), &album.item_key(&name));
            ImageRecord::new(name, captured_at)
        })
        .collect()
}

fn capture_time_for(path: &Path, item_key: &str) -> Option<NaiveDateTime> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(
                item_key,
                error = %err,
                "画像を読み込めませんでした。撮影日時なしとして扱います"
            );
            return None;
        }
    };

    match inspect_capture_time(&bytes) {
        Ok(Some(date)) => Some(date),
        Ok(None) | Err(MetadataError::Missing) => {
            debug!(item_key, "撮影日時がありません");
            None
        }
        Err(err) => {
            warn!(
                item_key,
                error = %err,
                "メタデータを解析できませんでした。撮影日時なしとして扱います"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif_reader::tests::tiff_with_date;
    use crate::markup::{decode_album_document, photo_elements};
    use tempfile::{tempdir, TempDir};

    fn setup(files: &[(&str, Vec<u8>)]) -> (TempDir, PipelineConfig, AlbumRef) {
        let temp = tempdir().expect("tempdir");
        let config = PipelineConfig {
            images_root: temp.path().join("r2"),
            albums_dir: temp.path().join("albums"),
            ..PipelineConfig::default()
        };
        let album = AlbumRef::new("taiwan", "jade").expect("valid");
        let dir = config.album_source_dir(&album);
        fs::create_dir_all(&dir).expect("album dir");
        for (name, bytes) in files {
            fs::write(dir.join(name), bytes).expect("write image");
        }
        (temp, config, album)
    }

    #[test]
    fn orders_by_capture_time_then_filename() {
        let (_temp, config, album) = setup(&[
            ("img10.jpg", b"no exif".to_vec()),
            ("img2.jpg", b"no exif".to_vec()),
            ("late.tif", Vec::new()),
            ("late.jpg", tiff_with_date(0x9003, "2024:06:02 09:00:00")),
            ("early.png", tiff_with_date(0x9003, "2024:06:01 09:00:00")),
        ]);

        let outcome = generate_album(&config, &album, "Jade").expect("generate");
        let AlbumOutcome::Written { path, photos, rows } = outcome else {
            panic!("expected a written album");
        };
        assert_eq!(photos, 4);
        assert_eq!(rows, 2);

        let text = fs::read_to_string(path).expect("read");
        let keys: Vec<String> = photo_elements(&text)
            .into_iter()
            .filter_map(|p| p.item_key)
            .collect();
        assert_eq!(
            keys,
            vec![
                "taiwan/jade/early.png",
                "taiwan/jade/late.jpg",
                "taiwan/jade/img2.jpg",
                "taiwan/jade/img10.jpg",
            ]
        );
        let doc = decode_album_document(&text).expect("decode");
        assert_eq!(doc.header.cover_key, "taiwan/jade/early.png");
        assert_eq!(doc.header.title, "Jade");
    }

    #[test]
    fn second_run_is_a_no_op() {
        let (_temp, config, album) = setup(&[("a.jpg", b"x".to_vec()), ("b.jpg", b"y".to_vec())]);

        let first = generate_album(&config, &album, "").expect("first");
        assert!(matches!(first, AlbumOutcome::Written { .. }));
        let path = config.document_path(&album);
        let before = fs::read_to_string(&path).expect("read");

        fs::write(config.album_source_dir(&album).join("0.jpg"), b"new").expect("add image");
        let second = generate_album(&config, &album, "other").expect("second");
        assert_eq!(second, AlbumOutcome::Skipped { path: path.clone() });
        assert_eq!(fs::read_to_string(&path).expect("read"), before);
    }

    #[test]
    fn regeneration_is_byte_identical() {
        let (_temp, config, album) = setup(&[
            ("c.jpg", b"x".to_vec()),
            ("a.jpg", b"x".to_vec()),
            ("b.webp", b"x".to_vec()),
        ]);
        let path = config.document_path(&album);

        generate_album(&config, &album, "t").expect("first");
        let first = fs::read_to_string(&path).expect("read");
        fs::remove_file(&path).expect("remove");
        generate_album(&config, &album, "t").expect("second");
        assert_eq!(fs::read_to_string(&path).expect("read"), first);
    }

    #[test]
    fn empty_album_writes_nothing() {
        let (_temp, config, album) = setup(&[("notes.txt", b"x".to_vec())]);
        let outcome = generate_album(&config, &album, "").expect("generate");
        assert!(matches!(outcome, AlbumOutcome::NoImages { .. }));
        assert!(!config.document_path(&album).exists());
    }

    #[test]
    fn create_album_treats_existing_and_empty_as_fatal() {
        let (_temp, config, album) = setup(&[("a.jpg", b"x".to_vec())]);
        create_album(&config, &album, "").expect("first create");
        let err = create_album(&config, &album, "").expect_err("exists");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::AlbumExists(_))
        ));

        let (_temp, config, album) = setup(&[]);
        let err = create_album(&config, &album, "").expect_err("empty");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NoImages(_))
        ));
    }

    #[test]
    fn missing_source_is_fatal() {
        let (_temp, config, _) = setup(&[]);
        let other = AlbumRef::new("taiwan", "missing").expect("valid");
        let err = generate_album(&config, &other, "").expect_err("must fail");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::AlbumSourceNotFound(_))
        ));
    }
}
