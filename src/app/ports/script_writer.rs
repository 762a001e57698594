use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ScriptWriteError {
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait ScriptWriter: Send + Sync {
    fn write_script(&self, path: &Path, script: &str) -> Result<PathBuf, ScriptWriteError>;
}
