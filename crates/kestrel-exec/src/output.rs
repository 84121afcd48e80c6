use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::trace;

use kestrel_model::TaskId;

/// Per-task directory holding captured `stdout` / `stderr`.
#[derive(Debug)]
pub(crate) struct OutputDir {
    dir: PathBuf,
    stdout: PathBuf,
    stderr: PathBuf,
}

impl OutputDir {
    /// Create `<base>/<prefix>-<id>/`, with `base` defaulting to the system temp dir.
    pub(crate) fn create(base: Option<&Path>, prefix: &str, id: &TaskId) -> io::Result<Self> {
        let base = base.map_or_else(std::env::temp_dir, Path::to_path_buf);
        let dir = base.join(format!("{prefix}-{id}"));
        fs::create_dir_all(&dir)?;
        trace!(target: "kestrel.exec.output", dir = %dir.display(), "output directory created");

        Ok(Self {
            stdout: dir.join("stdout"),
            stderr: dir.join("stderr"),
            dir,
        })
    }

    pub(crate) fn stdout(&self) -> &Path {
        &self.stdout
    }

    pub(crate) fn stderr(&self) -> &Path {
        &self.stderr
    }

    pub(crate) fn create_stdout(&self) -> io::Result<File> {
        File::create(&self.stdout)
    }

    pub(crate) fn create_stderr(&self) -> io::Result<File> {
        File::create(&self.stderr)
    }

    /// Remove the directory and everything in it. Removing twice is fine.
    pub(crate) fn remove(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_remove() {
        let id = TaskId::random();
        let out = OutputDir::create(None, "output-test", &id).unwrap();
        out.create_stdout().unwrap();
        out.create_stderr().unwrap();

        assert!(out.stdout().exists());
        assert!(out.stdout().parent().unwrap().ends_with(format!("output-test-{id}")));

        out.remove().unwrap();
        assert!(!out.stdout().exists());
        out.remove().unwrap();
    }
}
