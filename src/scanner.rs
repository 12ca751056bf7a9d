// scanner.rs - Malware scanning of incoming files with the clamscan CLI
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Signature name reported by the scanner.
    #[error("File is infected: {0}")]
    Infected(String),

    #[error("Malware scanner unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MalwareScanner: Send + Sync {
    /// `Ok(())` means the file is clean.
    async fn scan(&self, path: &Path) -> Result<(), ScanError>;
}

/// Whether scanning runs, and whether an unreachable scanner blocks uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPolicy {
    pub enabled: bool,
    pub allow_unavailable: bool,
}

impl ScanPolicy {
    /// Apply the policy to one file. Infection is always an error.
    pub async fn enforce(&self, scanner: &dyn MalwareScanner, path: &Path) -> Result<(), ScanError> {
        if !self.enabled {
            tracing::debug!(path = %path.display(), "malware scan disabled, skipping");
            return Ok(());
        }

        match scanner.scan(path).await {
            Err(ScanError::Unavailable(reason)) if self.allow_unavailable => {
                tracing::warn!(path = %path.display(), reason = %reason, "scanner unavailable, accepting unscanned file");
                Ok(())
            }
            other => other,
        }
    }
}

pub struct ClamScanner {
    program: String,
    timeout: Duration,
}

impl ClamScanner {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MalwareScanner for ClamScanner {
    async fn scan(&self, path: &Path) -> Result<(), ScanError> {
        let start = Instant::now();
        let child = Command::new(&self.program)
            .arg("--no-summary")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ScanError::Unavailable(format!("failed to run {}: {}", self.program, e)));
            }
            Err(_) => {
                return Err(ScanError::Unavailable(format!(
                    "scan timed out after {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        match output.status.code() {
            Some(0) => {
                tracing::info!(
                    path = %path.display(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "File scan completed: clean"
                );
                Ok(())
            }
            Some(1) => {
                let signature = parse_signature(&String::from_utf8_lossy(&output.stdout));
                tracing::warn!(path = %path.display(), virus = %signature, "File scan detected virus");
                Err(ScanError::Infected(signature))
            }
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                tracing::error!(status = %output.status, stderr = %stderr.trim(), "clamscan failed");
                Err(ScanError::Unavailable(format!("clamscan exited with {}", output.status)))
            }
        }
    }
}

/// Pull the signature out of a `path: Signature FOUND` report line.
fn parse_signature(report: &str) -> String {
    report
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_suffix(" FOUND"))
        .and_then(|line| line.rsplit(": ").next())
        .map(|sig| sig.trim().to_string())
        .filter(|sig| !sig.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
