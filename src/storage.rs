//! On-disk userlist file.

use anyhow::{Context, Result, bail};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::crypto::random::secure_random;

/// Permission bits for the written userlist: owner read/write only.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// A userlist file on disk.
///
/// Writes are atomic and the resulting file is readable only by its owner,
/// since it holds material that allows offline password guessing.
#[derive(Clone, Debug)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns `true` if the file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the whole file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not UTF-8.
    pub fn load(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))
    }

    /// Replaces the file contents atomically.
    ///
    /// 1. Write to a fresh temp file next to the target (mode 0600 on Unix)
    /// 2. fsync the temp file
    /// 3. Rename it over the target
    /// 4. fsync the parent directory so the rename survives a crash
    ///
    /// Readers see either the old or the new contents, never a partial
    /// write. Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails; the temp file is removed.
    pub fn save(&self, data: &str) -> Result<()> {
        self.write_with(data, |tmp| self.atomic_replace(tmp))
    }

    /// Like [`Storage::save`], but never replaces an existing file.
    ///
    /// The temp file is hard-linked to the target, which fails if the target
    /// exists at that moment, so a file created concurrently is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the target already exists or any step fails.
    pub fn save_new(&self, data: &str) -> Result<()> {
        self.write_with(data, |tmp| self.link_new(tmp))
    }

    fn write_with(&self, data: &str, publish: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
        let parent = self.parent();
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;

        let tmp_path = self.random_tmp_path()?;

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(FILE_MODE);
        }

        let mut tmp_file = options
            .open(&tmp_path)
            .context("failed to create temporary file")?;

        let written = tmp_file
            .write_all(data.as_bytes())
            .and_then(|_| tmp_file.sync_all());
        drop(tmp_file);

        if let Err(e) = written
            .context("failed to write temporary file")
            .and_then(|_| publish(&tmp_path))
        {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        #[cfg(unix)]
        {
            File::open(parent)
                .and_then(|dir| dir.sync_all())
                .with_context(|| format!("failed to sync directory {}", parent.display()))?;
        }

        tracing::debug!(path = %self.path.display(), bytes = data.len(), "userlist written");
        Ok(())
    }

    /// Publishes `tmp_path` under the target name only if nothing is there yet.
    fn link_new(&self, tmp_path: &Path) -> Result<()> {
        match fs::hard_link(tmp_path, &self.path) {
            Ok(()) => {
                // the target now holds the data; a leftover temp name is harmless
                let _ = fs::remove_file(tmp_path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                bail!("{} already exists", self.path.display())
            }
            Err(e) => Err(e).context("failed to create userlist file"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    /// Temp file path in the same directory: `<name>.tmp.<16 hex chars>`.
    fn random_tmp_path(&self) -> Result<PathBuf> {
        let mut buf = [0u8; 8];
        secure_random(&mut buf)?;

        let suffix: String = buf.iter().map(|b| format!("{b:02x}")).collect();
        let file_name = self
            .path
            .file_name()
            .context("userlist path has no file name")?
            .to_string_lossy();

        Ok(self.parent().join(format!("{file_name}.tmp.{suffix}")))
    }

    /// `ReplaceFileW` with write-through; it requires an existing target,
    /// so a first write falls back to a plain rename.
    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

        if !self.path.exists() {
            fs::rename(tmp_path, &self.path).context("rename failed")?;
            return Ok(());
        }

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        let target_w = to_wide(self.path.as_os_str());
        let tmp_w = to_wide(tmp_path.as_os_str());

        // SAFETY: both buffers are NUL-terminated UTF-16 and outlive the call.
        let result = unsafe {
            ReplaceFileW(
                target_w.as_ptr(),
                tmp_w.as_ptr(),
                std::ptr::null(),
                REPLACEFILE_WRITE_THROUGH,
                std::ptr::null(),
                std::ptr::null(),
            )
        };

        if result == 0 {
            let err = std::io::Error::last_os_error();
            return Err(err).context("atomic replace failed");
        }

        Ok(())
    }

    /// `rename()` is atomic within one filesystem.
    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        fs::rename(tmp_path, &self.path).context("rename failed")?;
        Ok(())
    }
}
