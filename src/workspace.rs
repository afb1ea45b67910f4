use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// The directory under which every job gets its own subdirectory, named after
/// the job
#[derive(Clone, Debug, PartialEq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub const DEFAULT: &'static str = "OrcaCache";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// the directory for the job called `name`
    pub fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// create the root directory if it doesn't exist yet
    pub fn setup(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// remove the root directory and everything in it. a missing root is
    /// not an error
    pub fn takedown(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.root) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            r => r,
        }
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}
