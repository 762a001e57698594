use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::info;

use crate::app::ports::{ScriptWriteError, ScriptWriter};

/// Writes scripts through a temporary sibling file so a failed run never
/// leaves a truncated script behind.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsScriptWriter;

impl FsScriptWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ScriptWriter for FsScriptWriter {
    fn write_script(&self, path: &Path, script: &str) -> Result<PathBuf, ScriptWriteError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|source| ScriptWriteError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let write_err = |source| ScriptWriteError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut file = NamedTempFile::new_in(&dir).map_err(write_err)?;
        file.write_all(script.as_bytes()).map_err(write_err)?;
        file.flush().map_err(write_err)?;
        file.persist(path).map_err(|e| write_err(e.error))?;

        info!(path = %path.display(), bytes = script.len(), "script written");
        Ok(path.to_path_buf())
    }
}
