use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Command-line configuration. Every flag can also be set from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "ollama-relay", version, about)]
pub struct Config {
    /// Address the HTTP server binds to.
    #[arg(long, env = "RELAY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the HTTP server listens on.
    #[arg(long, env = "RELAY_PORT", default_value_t = 8081)]
    pub port: u16,

    /// Base URL of the Ollama HTTP API.
    #[arg(long, env = "OLLAMA_URL", default_value = "http://localhost:11434")]
    pub ollama_url: String,

    /// Ollama executable used for `serve` and `create`.
    #[arg(long, env = "OLLAMA_BIN", default_value = "ollama")]
    pub ollama_bin: PathBuf,

    /// Directory holding the browser UI.
    #[arg(long, env = "RELAY_STATIC_DIR", default_value = "./static")]
    pub static_dir: PathBuf,

    /// Where uploaded model files are staged. Defaults to the system temp dir.
    #[arg(long, env = "RELAY_STAGING_DIR")]
    pub staging_dir: Option<PathBuf>,

    /// Seconds to wait after spawning the daemon before probing it.
    #[arg(long, env = "OLLAMA_STARTUP_DELAY", default_value_t = 3)]
    pub startup_delay_secs: u64,

    /// Use an already running daemon instead of spawning one.
    #[arg(long, env = "OLLAMA_EXTERNAL")]
    pub external_daemon: bool,
}

impl Config {
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        Ok(addr.parse()?)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    /// Absolute staging directory, so synthesized definitions never carry a
    /// relative weights path.
    pub fn staging_dir(&self) -> std::io::Result<PathBuf> {
        let dir = self.staging_dir.clone().unwrap_or_else(std::env::temp_dir);
        std::path::absolute(dir)
    }
}
