//! Where the detector saves annotated output.
//!
//! Each save lands in `<root>/<name>`, `<root>/<name>2`, `<root>/<name>3`, ...
//! so successive predictions never overwrite each other unless `exist_ok` is set.
//! With [`RunsDir::keep_last`] only the newest directories survive a save.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug)]
pub struct RunsDir {
    root: PathBuf,
    name: String,
    exist_ok: bool,
    /// Zero keeps everything
    keep: usize,
    /// Lowest suffix that might still be free
    next_index: AtomicU32,
}

impl Clone for RunsDir {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            name: self.name.clone(),
            exist_ok: self.exist_ok,
            keep: self.keep,
            next_index: AtomicU32::new(self.next_index.load(Ordering::Relaxed)),
        }
    }
}

impl RunsDir {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
            exist_ok: false,
            keep: 0,
            next_index: AtomicU32::new(1),
        }
    }

    /// Reuse `<root>/<name>` for every save instead of incrementing.
    pub fn exist_ok(mut self, exist_ok: bool) -> Self {
        self.exist_ok = exist_ok;
        self
    }

    /// Remove all but the `keep` newest save directories after each save.
    pub fn keep_last(mut self, keep: usize) -> Self {
        self.keep = keep;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<name>`, without creating it.
    pub fn base(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    fn dir_for(&self, n: u32) -> PathBuf {
        if n == 1 {
            self.base()
        } else {
            self.root.join(format!("{}{}", self.name, n))
        }
    }

    /// Suffix of a save directory name, `<name>` being 1.
    fn index_of(&self, file_name: &str) -> Option<u32> {
        let suffix = file_name.strip_prefix(&self.name)?;
        if suffix.is_empty() {
            return Some(1);
        }
        if !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        suffix.parse().ok().filter(|n| *n >= 2)
    }

    /// Create and return the directory for the next save.
    pub fn next_save_dir(&self) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.root)?;

        if self.exist_ok {
            let base = self.base();
            fs::create_dir_all(&base)?;
            return Ok(base);
        }

        let mut n = self.next_index.load(Ordering::Relaxed).max(1);
        let created = loop {
            let candidate = self.dir_for(n);

            // create_dir is atomic, so two concurrent saves never share a directory
            match fs::create_dir(&candidate) {
                Ok(()) => break candidate,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e),
            }
        };
        self.next_index.fetch_max(n + 1, Ordering::Relaxed);

        if self.keep > 0 {
            self.prune();
        }

        Ok(created)
    }

    /// Delete the oldest save directories beyond the retention count.
    fn prune(&self) {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "Failed to list save directories");
                return;
            }
        };

        let mut runs: Vec<(u32, PathBuf)> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| {
                let index = self.index_of(entry.file_name().to_str()?)?;
                Some((index, entry.path()))
            })
            .collect();

        if runs.len() <= self.keep {
            return;
        }

        runs.sort_unstable_by_key(|(index, _)| *index);
        let excess = runs.len() - self.keep;
        for (_, path) in runs.into_iter().take(excess) {
            match fs::remove_dir_all(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed old save directory"),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove old save directory")
                }
            }
        }
    }
}
