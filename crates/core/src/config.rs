use crate::model::AlbumRef;
use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Images live at `<images_root>/<folder>/<album>/<file>`.
    pub images_root: PathBuf,
    pub albums_dir: PathBuf,
    pub document_extension: String,
    pub row_width: usize,
    /// Place documents at `<albums_dir>/<folder>/<album>.<ext>`.
    pub nest_by_folder: bool,
    pub parallel_albums: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            images_root: PathBuf::from("public/r2"),
            albums_dir: PathBuf::from("src/content/albums"),
            document_extension: "mdx".to_string(),
            row_width: 2,
            nest_by_folder: false,
            parallel_albums: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.row_width == 0 {
            bail!("row_width は1以上にしてください");
        }
        let ext = self.document_extension.trim_start_matches('.');
        if ext.is_empty() || ext.contains(['/', '\\']) {
            bail!("document_extension が不正です: {:?}", self.document_extension);
        }
        Ok(())
    }

    pub fn row_width(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.row_width).context("row_width は1以上にしてください")
    }

    pub fn album_source_dir(&self, album: &AlbumRef) -> PathBuf {
        self.images_root.join(&album.folder).join(&album.album)
    }

    pub fn document_path(&self, album: &AlbumRef) -> PathBuf {
        let file_name = format!(
            "{}.{}",
            album.album,
            self.document_extension.trim_start_matches('.')
        );
        if self.nest_by_folder {
            self.albums_dir.join(&album.folder).join(file_name)
        } else {
            self.albums_dir.join(file_name)
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "album-forge", "album-forge")
        .context("OS標準設定ディレクトリを取得できませんでした")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

/// Loads `path`, or the platform config file when `path` is `None`. A missing
/// file yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => app_paths()?.config_path,
    };
    if !config_path.exists() {
        return Ok(PipelineConfig::default());
    }

    let raw = fs::read_to_string(&config_path).with_context(|| {
        format!(
            "設定ファイルを読めませんでした: {}",
            config_path.display()
        )
    })?;

    let config = toml::from_str::<PipelineConfig>(&raw).with_context(|| {
        format!(
            "設定ファイルのパースに失敗しました: {}",
            config_path.display()
        )
    })?;
    config.validate()?;
    Ok(config)
}

/// Writes `config` to `path` unless a file is already there. Returns whether
/// it was written.
pub fn save_config_if_absent(config: &PipelineConfig, path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| {
            format!(
                "設定ディレクトリを作成できませんでした: {}",
                dir.display()
            )
        })?;
    }
    let body =
        toml::to_string_pretty(config).context("設定のシリアライズに失敗しました")?;
    fs::write(path, body).with_context(|| {
        format!(
            "設定ファイルを書き込めませんでした: {}",
            path.display()
        )
    })?;
    Ok(true)
}
