//! Process manager for llama-server.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::LlamaCppClient;
use crate::error::LocalModelError;
use crate::{DEFAULT_CTX_SIZE, DEFAULT_PORT};

const STOP_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Manager for the llama-server process.
pub struct LlamaCppServer {
    binary: PathBuf,
    model: PathBuf,
    port: u16,
    ctx_size: u32,
    process: Option<Child>,
}

impl LlamaCppServer {
    /// Create a new server manager serving `model` with `binary`.
    pub fn new(binary: impl Into<PathBuf>, model: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
            port: DEFAULT_PORT,
            ctx_size: DEFAULT_CTX_SIZE,
            process: None,
        }
    }

    /// Set a custom port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the context window size.
    pub fn with_ctx_size(mut self, ctx_size: u32) -> Self {
        self.ctx_size = ctx_size;
        self
    }

    /// Get the port this server is configured to use.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Check if the server binary exists.
    pub fn binary_exists(&self) -> bool {
        self.binary.is_file()
    }

    /// Check if the model file exists.
    pub fn model_exists(&self) -> bool {
        self.model.is_file()
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("--model")
            .arg(&self.model)
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(self.port.to_string())
            .arg("--ctx-size")
            .arg(self.ctx_size.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }

    /// Start the llama-server process.
    ///
    /// Refuses to spawn when something already answers health checks on the
    /// configured port.
    pub async fn start(&mut self) -> Result<(), LocalModelError> {
        if !self.binary_exists() {
            return Err(LocalModelError::ServerBinaryNotFound(
                self.binary.display().to_string(),
            ));
        }

        if !self.model_exists() {
            return Err(LocalModelError::ModelNotFound(
                self.model.display().to_string(),
            ));
        }

        if self.client().check_health().await.is_ok() {
            return Err(LocalModelError::ServerStartFailed(format!(
                "port {} is already served by another process",
                self.port
            )));
        }

        info!(
            "Starting llama-server on port {} with model {:?}",
            self.port, self.model
        );

        let child = self
            .command()
            .spawn()
            .map_err(|e| LocalModelError::ServerStartFailed(e.to_string()))?;

        debug!("llama-server process started with PID: {}", child.id());
        self.process = Some(child);

        Ok(())
    }

    /// Wait for the server to become ready.
    ///
    /// Fails early with [`LocalModelError::ServerDied`] if the process exits
    /// before it reports healthy, which is how llama.cpp signals corrupt or
    /// unsupported weights. The child is checked before each health check so
    /// a foreign listener on the port is never taken for it.
    pub async fn wait_ready(&mut self, timeout: Duration) -> Result<(), LocalModelError> {
        let client = self.client();
        let start = std::time::Instant::now();
        let check_interval = Duration::from_millis(500);

        info!("Waiting for llama-server to become ready...");

        while start.elapsed() < timeout {
            let Some(ref mut process) = self.process else {
                return Err(LocalModelError::ServerNotRunning(
                    "llama-server was not started".to_string(),
                ));
            };
            if let Ok(Some(status)) = process.try_wait() {
                self.process = None;
                return Err(LocalModelError::ServerDied(status.to_string()));
            }

            match client.check_health().await {
                Ok(()) => {
                    info!("llama-server is ready");
                    return Ok(());
                }
                Err(_) => {
                    debug!("Server not ready yet, PID: {}", process.id());
                    sleep(check_interval).await;
                }
            }
        }

        Err(LocalModelError::ServerStartTimeout)
    }

    /// Stop the server process.
    ///
    /// Sends SIGTERM and returns. A background thread reaps the child and
    /// kills it if it is still alive after the grace period.
    pub fn stop(&mut self) -> Result<(), LocalModelError> {
        if let Some(mut child) = self.process.take() {
            info!("Stopping llama-server (PID: {})", child.id());

            // Try graceful shutdown first
            #[cfg(unix)]
            unsafe {
                libc::kill(child.id() as i32, libc::SIGTERM);
            }

            std::thread::spawn(move || {
                #[cfg(unix)]
                std::thread::sleep(STOP_GRACE_PERIOD);

                match child.try_wait() {
                    Ok(Some(status)) => {
                        debug!("Server exited with status: {:?}", status);
                    }
                    Ok(None) => {
                        warn!("Server didn't exit gracefully, killing...");
                        let _ = child.kill();
                        let _ = child.wait();
                    }
                    Err(e) => {
                        warn!("Error checking server status: {}", e);
                        let _ = child.kill();
                    }
                }
            });
        }
        Ok(())
    }

    /// Check if the server process is running.
    pub fn is_running(&mut self) -> bool {
        if let Some(ref mut child) = self.process {
            match child.try_wait() {
                Ok(Some(_)) => {
                    self.process = None;
                    false
                }
                Ok(None) => true,
                Err(_) => false,
            }
        } else {
            false
        }
    }

    /// Get a client connected to this server.
    pub fn client(&self) -> LlamaCppClient {
        LlamaCppClient::with_port(self.port)
    }
}

impl Drop for LlamaCppServer {
    fn drop(&mut self) {
        if self.process.is_some() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubServer;
    use tempfile::tempdir;

    #[test]
    fn test_server_config() {
        let server = LlamaCppServer::new("/opt/llama-server", "/app/models/test-model.gguf")
            .with_port(9999)
            .with_ctx_size(4096);
        assert_eq!(server.port(), 9999);

        let command = server.command();
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "--model",
                "/app/models/test-model.gguf",
                "--host",
                "127.0.0.1",
                "--port",
                "9999",
                "--ctx-size",
                "4096",
            ]
        );
    }

    #[tokio::test]
    async fn test_start_without_binary() {
        let dir = tempdir().unwrap();
        let mut server = LlamaCppServer::new(dir.path().join("llama-server"), "model.gguf");
        let err = server.start().await.unwrap_err();
        assert!(matches!(err, LocalModelError::ServerBinaryNotFound(_)));
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_start_without_model() {
        let dir = tempdir().unwrap();
        let binary = dir.path().join("llama-server");
        std::fs::write(&binary, b"").unwrap();

        let mut server = LlamaCppServer::new(&binary, dir.path().join("missing.gguf"));
        let err = server.start().await.unwrap_err();
        assert!(matches!(err, LocalModelError::ModelNotFound(_)));
    }

    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_refuses_occupied_port() {
        let stub = StubServer::start(|_| (200, br#"{"status":"ok"}"#.to_vec())).await;
        let dir = tempdir().unwrap();
        let model = dir.path().join("m.gguf");
        std::fs::write(&model, b"weights").unwrap();

        let mut server = LlamaCppServer::new("/bin/false", &model).with_port(stub.port());
        let err = server.start().await.unwrap_err();
        assert!(matches!(err, LocalModelError::ServerStartFailed(_)));
        assert!(err.to_string().contains(&stub.port().to_string()));
        assert!(!server.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wait_ready_reports_early_exit() {
        let dir = tempdir().unwrap();
        let model = dir.path().join("m.gguf");
        std::fs::write(&model, b"weights").unwrap();

        let mut server = LlamaCppServer::new("/bin/false", &model).with_port(free_port());
        server.start().await.unwrap();
        let err = server
            .wait_ready(Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LocalModelError::ServerDied(_)));
        assert!(!server.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dead_child_is_not_masked_by_foreign_listener() {
        let stub = StubServer::start(|_| (200, br#"{"status":"ok"}"#.to_vec())).await;

        let mut child = Command::new("/bin/false").spawn().unwrap();
        child.wait().unwrap();
        let mut server = LlamaCppServer::new("/bin/false", "m.gguf").with_port(stub.port());
        server.process = Some(child);

        let err = server
            .wait_ready(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, LocalModelError::ServerDied(_)));
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn test_wait_ready_without_start() {
        let mut server = LlamaCppServer::new("/bin/false", "m.gguf").with_port(free_port());
        let err = server
            .wait_ready(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LocalModelError::ServerNotRunning(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_does_not_block_on_grace_period() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id() as i32;
        let mut server = LlamaCppServer::new("sleep", "m.gguf");
        server.process = Some(child);
        assert!(server.is_running());

        let started = std::time::Instant::now();
        server.stop().unwrap();
        assert!(started.elapsed() < STOP_GRACE_PERIOD);
        assert!(!server.is_running());

        // The reaper collects the child shortly after.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while unsafe { libc::kill(pid, 0) } == 0 {
            assert!(std::time::Instant::now() < deadline, "child {pid} still alive");
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}
