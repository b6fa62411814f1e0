// Job Workspace Manager
// One directory per job under a fixed root; creation only, cleanup belongs to the caller

use std::io;
use std::path::{Path, PathBuf};

/// Prefix of every job directory name
pub const WORKSPACE_DIR_PREFIX: &str = "autoeditor-job-";

/// Allocates per-job directories under `root`
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    root: PathBuf,
}

impl JobWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory path for `job_id` (not created)
    pub fn path_for(&self, job_id: &str) -> PathBuf {
        self.root.join(format!("{}{}", WORKSPACE_DIR_PREFIX, job_id))
    }

    /// Create the job directory (and missing parents) if absent.
    ///
    /// Idempotent: repeated calls for the same id return the same path.
    ///
    /// # Errors
    /// - InvalidInput if the id is empty or could escape the root
    /// - any other filesystem error from directory creation
    pub async fn allocate(&self, job_id: &str) -> io::Result<PathBuf> {
        if job_id.is_empty()
            || job_id.contains('/')
            || job_id.contains('\\')
            || job_id.contains("..")
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("job id not usable as a directory name: {:?}", job_id),
            ));
        }

        let dir = self.path_for(job_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// `<dir>/output.<ext>`
    pub fn output_file(dir: &Path, ext: &str) -> PathBuf {
        dir.join(format!("output.{}", ext))
    }
}

impl Default for JobWorkspace {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}
