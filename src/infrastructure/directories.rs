use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::config::{DirectoryConfig, FeedConfig};

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    pub db_path: PathBuf,
    pub feed_path: PathBuf,
}

/// Creates the log and data directories and checks the data directory is
/// writable before the database is opened there.
pub fn ensure_directories(dirs: &DirectoryConfig, feed: &FeedConfig) -> Result<ResolvedPaths> {
    let logs_dir = ensure_dir(Path::new(&dirs.logs_dir))?;
    let data_dir = ensure_dir(Path::new(&dirs.data_dir))?;

    let probe = data_dir.join(".write-test");
    fs::write(&probe, b"ok")
        .with_context(|| format!("data directory {} is not writable", data_dir.display()))?;
    fs::remove_file(&probe)?;

    Ok(ResolvedPaths {
        logs_dir,
        db_path: data_dir.join(&dirs.db_filename),
        feed_path: PathBuf::from(&feed.path),
    })
}

fn ensure_dir(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory {}", path.display()))?;
    }
    Ok(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()))
}
