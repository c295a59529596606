use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Result of a finished `create` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub success: bool,
    /// stdout followed by stderr.
    pub output: String,
}

/// Registers a model with the daemon from a model-definition file.
#[async_trait]
pub trait ModelCreator: Send + Sync {
    async fn create(&self, name: &str, definition: &Path) -> std::io::Result<CreateOutcome>;
}

/// Runs `<ollama> create <name> -f <definition>`.
#[derive(Debug, Clone)]
pub struct OllamaCli {
    program: PathBuf,
}

impl OllamaCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for OllamaCli {
    fn default() -> Self {
        Self::new("ollama")
    }
}

#[async_trait]
impl ModelCreator for OllamaCli {
    async fn create(&self, name: &str, definition: &Path) -> std::io::Result<CreateOutcome> {
        debug!(
            "running {} create {} -f {}",
            self.program.display(),
            name,
            definition.display()
        );
        let output = Command::new(&self.program)
            .arg("create")
            .arg(name)
            .arg("-f")
            .arg(definition)
            .stdin(Stdio::null())
            .output()
            .await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CreateOutcome {
            success: output.status.success(),
            output: combined,
        })
    }
}
