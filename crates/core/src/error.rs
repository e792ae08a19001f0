use std::path::PathBuf;
use thiserror::Error;

/// Conditions that stop a generation run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("画像ルートフォルダが存在しません: {0}")]
    ImagesRootNotFound(PathBuf),
    #[error("アルバムの画像フォルダが存在しません: {0}")]
    AlbumSourceNotFound(PathBuf),
    #[error("画像が見つかりませんでした: {0}")]
    NoImages(PathBuf),
    #[error("アルバムは既に存在します: {0}")]
    AlbumExists(PathBuf),
}
