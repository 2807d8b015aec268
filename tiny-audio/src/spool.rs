//! Spool directory for file-backed audio
//!
//! Streamed resources are written once, interleaved, into a per-session
//! temporary directory. Each directory holds a locked `.owner` file for as
//! long as the session is alive, so directories left behind by a crashed
//! process can be told apart from live ones and swept on the next start.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use tempfile::{TempDir, TempPath};
use tiny_pcm::ChannelData;
use tracing::{debug, info, warn};

/// Directory name prefix for spool directories
const DIR_PREFIX: &str = "tiny-audio-";

/// Lock file marking a directory as owned by a live session
const OWNER_FILE: &str = ".owner";

/// Write buffer for spooling (512 KiB)
const WRITE_BUFFER: usize = 512 * 1024;

/// The directory itself, shared by the session and every file in it
#[derive(Debug)]
struct SpoolDir {
    // Declared first so the lock is released before the directory goes away
    owner: File,
    dir: TempDir,
}

/// A session's spool directory.
///
/// Cheap to clone. The directory (with its contents) is removed once the
/// last `Spool` and the last `SpoolFile` written into it are gone.
#[derive(Debug, Clone)]
pub struct Spool {
    inner: Arc<SpoolDir>,
}

impl Spool {
    /// Create a new spool directory under `root` (or the system temp directory)
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(DIR_PREFIX);
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        let owner = File::create(dir.path().join(OWNER_FILE))?;
        owner.try_lock_exclusive()?;

        debug!("Created spool directory {}", dir.path().display());
        Ok(Self {
            inner: Arc::new(SpoolDir { owner, dir }),
        })
    }

    pub fn path(&self) -> &Path {
        self.inner.dir.path()
    }

    /// Write `data` as interleaved internal-format frames into a new spool file
    pub fn write(&self, data: &ChannelData) -> io::Result<SpoolFile> {
        let file = tempfile::Builder::new()
            .prefix("tiny")
            .suffix(".sound")
            .tempfile_in(self.path())?;

        let mut writer = BufWriter::with_capacity(WRITE_BUFFER, file);
        data.write_interleaved(&mut writer)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.as_file().sync_data()?;

        let path = file.into_temp_path();
        debug!(
            "Spooled {} bytes to {}",
            data.interleaved_len(),
            path.display()
        );
        Ok(SpoolFile {
            path: Arc::new(path),
            _dir: self.inner.clone(),
            len: data.interleaved_len(),
        })
    }

    /// Release this handle to the directory.
    ///
    /// If nothing else uses it, the directory is removed now and failures are
    /// reported. Otherwise removal waits for the last spooled file to drop.
    pub fn close(self) -> io::Result<()> {
        match Arc::try_unwrap(self.inner) {
            Ok(SpoolDir { owner, dir }) => {
                drop(owner);
                dir.close()
            }
            Err(inner) => {
                debug!(
                    "Spool directory {} still in use ({} handles), removing it later",
                    inner.dir.path().display(),
                    Arc::strong_count(&inner) - 1
                );
                Ok(())
            }
        }
    }
}

/// Remove spool directories whose owner is gone.
///
/// A directory counts as stale when its `.owner` file can be locked. Returns
/// how many directories were removed.
pub fn sweep_stale(root: Option<&Path>) -> usize {
    let root: PathBuf = root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
    let entries = match fs::read_dir(&root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot scan {} for stale spools: {}", root.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let is_spool = entry.file_name().to_string_lossy().starts_with(DIR_PREFIX)
            && entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_spool {
            continue;
        }

        let path = entry.path();
        // No owner file yet: a session may be creating it right now
        let Ok(owner) = File::open(path.join(OWNER_FILE)) else {
            continue;
        };
        if owner.try_lock_exclusive().is_err() {
            continue;
        }
        drop(owner);

        match fs::remove_dir_all(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove stale spool {}: {}", path.display(), e),
        }
    }

    if removed > 0 {
        info!("Removed {} stale spool directories", removed);
    }
    removed
}

/// One spooled resource. Cheap to clone; the file is deleted when the last
/// clone is dropped, and keeps its directory alive until then.
#[derive(Debug, Clone)]
pub struct SpoolFile {
    // Declared before `_dir` so the file goes before its directory
    path: Arc<TempPath>,
    _dir: Arc<SpoolDir>,
    len: u64,
}

impl SpoolFile {
    /// Open a new read handle positioned at the start
    pub fn open(&self) -> io::Result<File> {
        File::open(&**self.path)
    }

    /// Interleaved length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn stereo() -> ChannelData {
        ChannelData::from_interleaved(&[1, 0, 2, 0, 3, 0, 4, 0])
    }

    #[test]
    fn test_write_interleaves_frames() {
        let root = tempfile::tempdir().unwrap();
        let spool = Spool::create(Some(root.path())).unwrap();

        let file = spool.write(&stereo()).unwrap();
        assert_eq!(file.len(), 8);
        assert!(file.path().starts_with(spool.path()));

        let mut bytes = Vec::new();
        file.open().unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, vec![1, 0, 2, 0, 3, 0, 4, 0]);
    }

    #[test]
    fn test_mono_written_to_both_sides() {
        let root = tempfile::tempdir().unwrap();
        let spool = Spool::create(Some(root.path())).unwrap();

        let file = spool.write(&ChannelData::from_mono(vec![5, 0])).unwrap();
        let mut bytes = Vec::new();
        file.open().unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, vec![5, 0, 5, 0]);
    }

    #[test]
    fn test_file_removed_with_last_clone() {
        let root = tempfile::tempdir().unwrap();
        let spool = Spool::create(Some(root.path())).unwrap();

        let file = spool.write(&stereo()).unwrap();
        let path = file.path().to_path_buf();
        let clone = file.clone();
        drop(file);
        assert!(path.exists());
        drop(clone);
        assert!(!path.exists());
    }

    #[test]
    fn test_close_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let spool = Spool::create(Some(root.path())).unwrap();
        let dir = spool.path().to_path_buf();
        spool.close().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_close_waits_for_spooled_files() {
        let root = tempfile::tempdir().unwrap();
        let spool = Spool::create(Some(root.path())).unwrap();
        let dir = spool.path().to_path_buf();

        let file = spool.write(&stereo()).unwrap();
        let path = file.path().to_path_buf();
        spool.close().unwrap();

        // Still readable after the session let go
        assert!(dir.exists());
        let mut bytes = Vec::new();
        file.open().unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 8);

        // And still owned, so a sweep leaves it alone
        assert_eq!(sweep_stale(Some(root.path())), 0);

        drop(file);
        assert!(!path.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_sweep_skips_live_spool() {
        let root = tempfile::tempdir().unwrap();
        let spool = Spool::create(Some(root.path())).unwrap();

        assert_eq!(sweep_stale(Some(root.path())), 0);
        assert!(spool.path().exists());
    }

    #[test]
    fn test_sweep_removes_abandoned_spool() {
        let root = tempfile::tempdir().unwrap();
        let stale = root.path().join("tiny-audio-crashed");
        fs::create_dir(&stale).unwrap();
        File::create(stale.join(OWNER_FILE)).unwrap();
        File::create(stale.join("tiny1234.sound")).unwrap();

        // Unrelated directories are left alone
        let other = root.path().join("something-else");
        fs::create_dir(&other).unwrap();

        assert_eq!(sweep_stale(Some(root.path())), 1);
        assert!(!stale.exists());
        assert!(other.exists());
    }
}
