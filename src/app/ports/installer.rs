use async_trait::async_trait;

/// A delete function already present in the target schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledFunction {
    pub schema: String,
    pub name: String,
    /// Identity argument list, e.g. `integer[], caller integer`.
    pub arguments: String,
}

impl InstalledFunction {
    pub fn signature(&self) -> String {
        format!("{}.{}({})", self.schema, self.name, self.arguments)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstallError {
    #[error("command not found: {0}")]
    CommandNotFound(String),
    #[error("installation failed: {0}")]
    Failed(String),
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("operation timed out")]
    Timeout,
}

/// Replaces previously generated delete functions with a new script.
#[async_trait]
pub trait FunctionInstaller: Send + Sync {
    async fn list_installed(
        &self,
        schema: &str,
        prefix: &str,
    ) -> Result<Vec<InstalledFunction>, InstallError>;

    /// Runs the `drops` statements followed by `script` as one transaction.
    async fn install(&self, drops: &[String], script: &str) -> Result<(), InstallError>;
}
