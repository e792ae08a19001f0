use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static STAGE_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOutcome {
    Written,
    Skipped,
}

/// Writes `content` to `target` only if nothing exists there yet.
///
/// An existing document is never opened, read or modified; hand-added captions
/// and tags survive any number of reruns. The content is staged in a sibling
/// file and linked into place, so `target` either appears complete or not at
/// all.
pub fn write_if_absent(target: &Path, content: &str) -> Result<WriteOutcome> {
    install_new(target, |file| {
        file.write_all(content.as_bytes())?;
        file.sync_all()
    })
}

fn install_new<F>(target: &Path, write: F) -> Result<WriteOutcome>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    if target.exists() {
        return Ok(WriteOutcome::Skipped);
    }

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| {
            format!("出力フォルダを作成できませんでした: {}", parent.display())
        })?;
    }

    let staged = staging_path_for(target);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&staged)
        .with_context(|| {
            format!("一時ファイルを作成できませんでした: {}", staged.display())
        })?;

    if let Err(err) = write(&mut file) {
        drop(file);
        let _ = fs::remove_file(&staged);
        return Err(anyhow::Error::from(err).context(format!(
            "アルバムファイルを書き込めませんでした: {}",
            target.display()
        )));
    }
    drop(file);

    // hard_link refuses an existing target, unlike rename.
    let linked = fs::hard_link(&staged, target);
    let _ = fs::remove_file(&staged);
    match linked {
        Ok(()) => Ok(WriteOutcome::Written),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(WriteOutcome::Skipped),
        Err(err) => Err(anyhow::Error::from(err).context(format!(
            "アルバムファイルを作成できませんでした: {}",
            target.display()
        ))),
    }
}

fn staging_path_for(target: &Path) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    let file_name = target
        .file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| "album".to_string());
    let index = STAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
    parent.join(format!(
        ".album_forge_tmp_{}_{}_{}_{}.tmp",
        std::process::id(),
        now,
        index,
        file_name
    ))
}
