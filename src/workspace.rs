// workspace.rs - Per-request temporary files that remove themselves on drop
use std::io;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, TempPath};

#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh UUID-based stem, unique per call.
    pub fn unique_stem(prefix: &str) -> String {
        format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
    }

    /// A path under the workspace that nothing has created yet. The file, if
    /// one is written there, is deleted when the guard drops.
    pub fn temp_path(&self, prefix: &str, extension: &str) -> io::Result<TempPath> {
        let name = format!("{}.{}", Self::unique_stem(prefix), extension.trim_start_matches('.'));
        TempPath::try_from_path(self.dir.join(name))
    }

    /// Private directory for tools that write several files (yt-dlp
    /// fragments, partial downloads). Removed with its contents on drop.
    pub fn temp_dir(&self, prefix: &str) -> io::Result<TempDir> {
        tempfile::Builder::new()
            .prefix(&format!("{}_", prefix))
            .tempdir_in(&self.dir)
    }
}
