use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::generator::{generate_album, AlbumOutcome};
use crate::markup::{parse_header, split_front_matter};
use crate::model::AlbumRef;
use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlbumStatus {
    Written {
        path: PathBuf,
        photos: usize,
        rows: usize,
    },
    Skipped {
        path: PathBuf,
        /// Folder named by the existing document when it belongs to a
        /// different folder with the same album slug.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        collides_with: Option<String>,
    },
    NoImages,
    Failed {
        error: String,
    },
}

impl From<AlbumOutcome> for AlbumStatus {
    fn from(outcome: AlbumOutcome) -> Self {
        match outcome {
            AlbumOutcome::Written { path, photos, rows } => Self::Written { path, photos, rows },
            AlbumOutcome::Skipped { path } => Self::Skipped {
                path,
                collides_with: None,
            },
            AlbumOutcome::NoImages { .. } => Self::NoImages,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumReport {
    pub folder: String,
    pub album: String,
    pub status: AlbumStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BatchStats {
    pub albums: usize,
    pub written: usize,
    pub skipped: usize,
    pub no_images: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub albums: Vec<AlbumReport>,
    pub stats: BatchStats,
}

/// Generates documents for every `<folder>/<album>` directory under the images
/// root. Only a missing root aborts; every album-level problem is recorded in
/// the report and the batch moves on.
pub fn run_batch(config: &PipelineConfig) -> Result<BatchReport> {
    config.validate()?;
    let root = &config.images_root;
    if !root.is_dir() {
        return Err(PipelineError::ImagesRootNotFound(root.clone()).into());
    }

    let pairs = collect_album_dirs(root);
    info!(
        root = %root.display(),
        albums = pairs.len(),
        "アルバムフォルダを検出しました"
    );

    let albums: Vec<AlbumReport> = if config.parallel_albums {
        pairs
            .par_iter()
            .map(|(folder, album)| process_pair(config, folder, album))
            .collect()
    } else {
        pairs
            .iter()
            .map(|(folder, album)| process_pair(config, folder, album))
            .collect()
    };

    let mut stats = BatchStats {
        albums: albums.len(),
        ..BatchStats::default()
    };
    for report in &albums {
        match report.status {
            AlbumStatus::Written { .. } => stats.written += 1,
            AlbumStatus::Skipped { .. } => stats.skipped += 1,
            AlbumStatus::NoImages => stats.no_images += 1,
            AlbumStatus::Failed { .. } => stats.failed += 1,
        }
    }

    Ok(BatchReport { albums, stats })
}

fn process_pair(config: &PipelineConfig, folder: &str, album: &str) -> AlbumReport {
    let status = match AlbumRef::new(folder, album) {
        Ok(album_ref) => match generate_album(config, &album_ref, "") {
            Ok(AlbumOutcome::Skipped { path }) if !config.nest_by_folder => {
                let collides_with = colliding_folder(&path, folder);
                if let Some(other) = &collides_with {
                    warn!(
                        folder,
                        album,
                        other_folder = %other,
                        path = %path.display(),
                        "同名アルバムが別フォルダの文書と衝突しています"
                    );
                }
                AlbumStatus::Skipped {
                    path,
                    collides_with,
                }
            }
            Ok(outcome) => outcome.into(),
            Err(err) => {
                let error = format!("{err:#}");
                warn!(folder, album, error = %error, "アルバムの生成に失敗しました");
                AlbumStatus::Failed { error }
            }
        },
        Err(err) => {
            warn!(
                folder,
                album,
                error = %err,
                "アルバム名が不正なためスキップしました"
            );
            AlbumStatus::Failed {
                error: err.to_string(),
            }
        }
    };

    AlbumReport {
        folder: folder.to_string(),
        album: album.to_string(),
        status,
    }
}

/// Folder recorded in the header of the document at `path`, when it differs
/// from `folder`. Unreadable documents and headers without a folder count as
/// no collision.
fn colliding_folder(path: &Path, folder: &str) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let header = parse_header(split_front_matter(&text).0?).ok()?;
    (!header.folder.is_empty() && header.folder != folder).then_some(header.folder)
}

/// `(folder, album)` names of second-level directories, sorted, hidden
/// entries excluded.
fn collect_album_dirs(root: &Path) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let walker = WalkDir::new(root)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(
                    root = %root.display(),
                    error = %err,
                    "フォルダ走査に失敗しました"
                );
                continue;
            }
        };
        if entry.depth() != 2 || !entry.file_type().is_dir() {
            continue;
        }
        let album = entry.file_name().to_string_lossy().to_string();
        let folder = entry
            .path()
            .parent()
            .and_then(|p| p.file_name())
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default();
        out.push((folder, album));
    }
    out
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn config_in(temp: &TempDir) -> PipelineConfig {
        PipelineConfig {
            images_root: temp.path().join("r2"),
            albums_dir: temp.path().join("albums"),
            ..PipelineConfig::default()
        }
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent");
        }
        fs::write(path, b"x").expect("write");
    }

    #[test]
    fn walks_every_pair_and_skips_empty_albums() {
        let temp = tempdir().expect("tempdir");
        let config = config_in(&temp);
        let root = &config.images_root;
        touch(&root.join("yama/hike/a.jpg"));
        touch(&root.join("yama/hike/b.jpg"));
        touch(&root.join("yama/hike/c.jpg"));
        fs::create_dir_all(root.join("yama/empty")).expect("empty album");
        touch(&root.join("dalin/river/x.png"));
        touch(&root.join("dalin/loose.jpg"));
        touch(&root.join(".cache/thumbs/t.jpg"));

        let report = run_batch(&config).expect("batch");
        let names: Vec<(String, String)> = report
            .albums
            .iter()
            .map(|r| (r.folder.clone(), r.album.clone()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("dalin".to_string(), "river".to_string()),
                ("yama".to_string(), "empty".to_string()),
                ("yama".to_string(), "hike".to_string()),
            ]
        );
        assert_eq!(report.stats.written, 2);
        assert_eq!(report.stats.no_images, 1);
        assert_eq!(report.stats.failed, 0);
        assert!(config.albums_dir.join("hike.mdx").exists());
        assert!(config.albums_dir.join("river.mdx").exists());
        assert!(!config.albums_dir.join("empty.mdx").exists());
    }

    #[test]
    fn rerun_skips_existing_documents() {
        let temp = tempdir().expect("tempdir");
        let mut config = config_in(&temp);
        config.parallel_albums = true;
        touch(&config.images_root.join("k/one/a.jpg"));
        touch(&config.images_root.join("k/two/a.jpg"));

        let first = run_batch(&config).expect("first");
        assert_eq!(first.stats.written, 2);
        let second = run_batch(&config).expect("second");
        assert_eq!(second.stats.written, 0);
        assert_eq!(second.stats.skipped, 2);
    }

    #[test]
    fn nested_layout_keeps_same_album_slug_in_different_folders_apart() {
        let temp = tempdir().expect("tempdir");
        let mut config = config_in(&temp);
        config.nest_by_folder = true;
        touch(&config.images_root.join("a/spring/1.jpg"));
        touch(&config.images_root.join("b/spring/1.jpg"));

        let report = run_batch(&config).expect("batch");
        assert_eq!(report.stats.written, 2);
        assert!(config.albums_dir.join("a/spring.mdx").exists());
        assert!(config.albums_dir.join("b/spring.mdx").exists());
    }

    #[test]
    fn missing_root_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let config = config_in(&temp);
        let err = run_batch(&config).expect_err("must fail");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ImagesRootNotFound(_))
        ));
    }

    #[test]
    fn flat_layout_reports_slug_collision_between_folders() {
        let temp = tempdir().expect("tempdir");
        let config = config_in(&temp);
        touch(&config.images_root.join("a/spring/1.jpg"));
        touch(&config.images_root.join("b/spring/1.jpg"));

        let report = run_batch(&config).expect("batch");
        assert_eq!(report.stats.written, 1);
        assert_eq!(report.stats.skipped, 1);
        match &report.albums[1].status {
            AlbumStatus::Skipped {
                path,
                collides_with,
            } => {
                assert_eq!(path, &config.albums_dir.join("spring.mdx"));
                assert_eq!(collides_with.as_deref(), Some("a"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        let rerun = run_batch(&config).expect("rerun");
        assert!(matches!(
            &rerun.albums[0].status,
            AlbumStatus::Skipped {
                collides_with: None,
                ..
            }
        ));
    }
}
