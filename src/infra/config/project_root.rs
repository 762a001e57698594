use std::path::{Path, PathBuf};

use super::generator_config::CONFIG_FILE_NAME;

/// Nearest ancestor of `start` holding a config file or a `.git` directory.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).is_file() || current.join(".git").is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}
