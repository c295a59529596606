use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use super::OllamaClient;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ollama not responding: {0}")]
    NotResponding(#[source] reqwest::Error),
}

/// The supervised `ollama serve` child. Created once at startup and handed to
/// exactly one teardown path.
#[derive(Debug)]
pub struct DaemonProcess {
    child: Option<Child>,
}

impl DaemonProcess {
    /// Spawn `<program> serve`, give it `startup_delay` to come up, then probe
    /// the API once. Either failure is fatal; the child is killed on error.
    pub async fn start(
        program: &Path,
        client: &OllamaClient,
        startup_delay: Duration,
    ) -> Result<Self, SupervisorError> {
        info!("Starting Ollama ({} serve)...", program.display());
        let child = Command::new(program)
            .arg("serve")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        let mut daemon = Self { child: Some(child) };
        tokio::time::sleep(startup_delay).await;

        if let Err(e) = client.ping().await {
            daemon.shutdown().await;
            return Err(SupervisorError::NotResponding(e));
        }
        info!("Ollama is up at {}", client.base_url());
        Ok(daemon)
    }

    /// Attach to a daemon this process does not own. Only the liveness check
    /// runs; shutdown leaves the daemon alone.
    pub async fn attach(client: &OllamaClient) -> Result<Self, SupervisorError> {
        client.ping().await.map_err(SupervisorError::NotResponding)?;
        info!("Using external Ollama at {}", client.base_url());
        Ok(Self { child: None })
    }

    #[cfg(test)]
    pub(crate) fn from_child(child: Child) -> Self {
        Self { child: Some(child) }
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Forcibly terminate the child. Safe to call any number of times.
    pub async fn shutdown(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        info!("Stopping Ollama (pid {:?})", child.id());
        if let Err(e) = child.kill().await {
            warn!("Failed to kill Ollama: {}", e);
        }
    }
}

/// Waits for Ctrl-C or SIGTERM, then kills the daemon. Owns the only
/// termination call on the process handle.
pub async fn shutdown_signal(mut daemon: DaemonProcess) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    daemon.shutdown().await;
}
