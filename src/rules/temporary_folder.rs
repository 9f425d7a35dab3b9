//! A scratch directory created before each test and removed after it.

use super::external_resource::{self, Resource};
use super::TestRule;
use crate::failure::{ConfigError, TestError};
use crate::statement::{Description, StatementRef};
use log::warn;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const FOLDER_PREFIX: &str = "rulekit";

#[derive(Clone)]
pub struct TemporaryFolder {
    state: Arc<FolderState>,
}

struct FolderState {
    parent: Option<PathBuf>,
    assure_deletion: bool,
    dir: Mutex<Option<TempDir>>,
}

impl Default for TemporaryFolder {
    fn default() -> Self {
        Self::new()
    }
}

impl TemporaryFolder {
    pub fn new() -> Self {
        Self::build(None, false)
    }

    /// Creates the folder under `parent` instead of the system temp dir.
    pub fn in_dir(parent: impl Into<PathBuf>) -> Self {
        Self::build(Some(parent.into()), false)
    }

    /// Turns a failed clean-up into a test failure instead of a warning.
    pub fn assure_deletion(self) -> Self {
        Self::build(self.state.parent.clone(), true)
    }

    fn build(parent: Option<PathBuf>, assure_deletion: bool) -> Self {
        Self {
            state: Arc::new(FolderState {
                parent,
                assure_deletion,
                dir: Mutex::new(None),
            }),
        }
    }

    pub fn create(&self) -> Result<(), TestError> {
        self.state.create()
    }

    pub fn delete(&self) -> Result<(), TestError> {
        self.state.delete()
    }

    pub fn root(&self) -> Result<PathBuf, TestError> {
        self.state
            .dir
            .lock()
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
            .ok_or_else(|| ConfigError::FolderNotCreated.into())
    }

    /// Creates an empty file directly under the root.
    pub fn new_file(&self, name: &str) -> Result<PathBuf, TestError> {
        let path = self.root()?.join(name);
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        Ok(path)
    }

    /// Creates a directory (and any missing parents) under the root.
    pub fn new_folder(&self, relative: impl AsRef<Path>) -> Result<PathBuf, TestError> {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            return Err(TestError::fail(format!(
                "folder path {} must be relative to the temporary folder",
                relative.display()
            )));
        }
        let path = self.root()?.join(relative);
        fs::create_dir_all(&path)?;
        Ok(path)
    }
}

impl FolderState {
    fn create(&self) -> Result<(), TestError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(FOLDER_PREFIX);
        let dir = match &self.parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        *self.dir.lock() = Some(dir);
        Ok(())
    }

    fn delete(&self) -> Result<(), TestError> {
        let Some(dir) = self.dir.lock().take() else {
            return Ok(());
        };
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => Ok(()),
            Err(err) if self.assure_deletion => Err(TestError::fail(format!(
                "unable to clean up temporary folder {}: {err}",
                path.display()
            ))),
            Err(err) => {
                warn!(
                    "event=temporary_folder_cleanup_failed path={} error={err}",
                    path.display()
                );
                Ok(())
            }
        }
    }
}

impl Resource for FolderState {
    fn before(&self) -> Result<(), TestError> {
        self.create()
    }

    fn after(&self) -> Result<(), TestError> {
        self.delete()
    }
}

impl TestRule for TemporaryFolder {
    fn apply(&self, base: StatementRef, _description: &Description) -> StatementRef {
        external_resource::statement(base, Arc::clone(&self.state))
    }
}
