//! Hand-off of the day's files to a remote host.
//!
//! Uploading is best effort: every implementation reports failure as an
//! [`UploadError`] and the caller logs it. Nothing in the run depends on an
//! upload having succeeded.

use crate::config::UploadSettings;
use crate::error::UploadError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Transfers the current measurement file and log file.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Uploads both files; `log_file` is absent when the journal has no file.
    async fn upload(&self, measurement_file: &Path, log_file: Option<&Path>)
        -> Result<(), UploadError>;
}

/// Builds the uploader described by the settings.
pub fn from_settings(settings: &UploadSettings) -> Box<dyn Uploader> {
    if settings.enabled {
        Box::new(ScpUploader::new(settings))
    } else {
        Box::new(DisabledUploader)
    }
}

/// Copies files with an external `scp`-compatible program.
#[derive(Debug, Clone)]
pub struct ScpUploader {
    program: String,
    destination: String,
    measurement_dir: String,
    log_dir: String,
}

impl ScpUploader {
    /// Creates an uploader from the upload settings.
    pub fn new(settings: &UploadSettings) -> Self {
        Self {
            program: settings.program.clone(),
            destination: settings.destination.clone().unwrap_or_default(),
            measurement_dir: settings.measurement_dir.clone(),
            log_dir: settings.log_dir.clone(),
        }
    }

    fn target(&self, dir: &str) -> String {
        format!("{}:{}/", self.destination, dir.trim_end_matches('/'))
    }

    async fn copy(&self, file: &Path, dir: &str) -> Result<(), UploadError> {
        if !file.exists() {
            debug!(file = %file.display(), "Nothing to upload");
            return Ok(());
        }
        let output = Command::new(&self.program)
            .arg("-q")
            .arg(file)
            .arg(self.target(dir))
            .output()
            .await
            .map_err(|source| UploadError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(UploadError::Failed {
                file: file.to_path_buf(),
                status: output.status.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Uploader for ScpUploader {
    async fn upload(
        &self,
        measurement_file: &Path,
        log_file: Option<&Path>,
    ) -> Result<(), UploadError> {
        self.copy(measurement_file, &self.measurement_dir).await?;
        if let Some(log_file) = log_file {
            self.copy(log_file, &self.log_dir).await?;
        }
        info!(destination = %self.destination, "Uploaded files");
        Ok(())
    }
}

/// Uploader used when no remote is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledUploader;

#[async_trait]
impl Uploader for DisabledUploader {
    async fn upload(&self, _: &Path, _: Option<&Path>) -> Result<(), UploadError> {
        Ok(())
    }
}

/// Uploader that remembers what it was asked to upload, optionally failing.
#[derive(Debug, Default)]
pub struct RecordingUploader {
    fail: bool,
    calls: Mutex<Vec<(PathBuf, Option<PathBuf>)>>,
}

impl RecordingUploader {
    /// Uploader that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploader that always fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Requested uploads, in order.
    pub fn calls(&self) -> Vec<(PathBuf, Option<PathBuf>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn upload(
        &self,
        measurement_file: &Path,
        log_file: Option<&Path>,
    ) -> Result<(), UploadError> {
        self.calls.lock().push((
            measurement_file.to_path_buf(),
            log_file.map(Path::to_path_buf),
        ));
        if self.fail {
            return Err(UploadError::Failed {
                file: measurement_file.to_path_buf(),
                status: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(program: &str) -> UploadSettings {
        UploadSettings {
            enabled: true,
            program: program.to_string(),
            destination: Some("user@host".to_string()),
            measurement_dir: "/data/measurements/".to_string(),
            log_dir: "/data/logs".to_string(),
        }
    }

    #[test]
    fn remote_target_joins_destination_and_dir() {
        let uploader = ScpUploader::new(&settings("scp"));
        assert_eq!(uploader.target("/data/measurements/"), "user@host:/data/measurements/");
        assert_eq!(uploader.target("/data/logs"), "user@host:/data/logs/");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("20211205.txt");
        std::fs::write(&file, "x\n").unwrap();

        let uploader = ScpUploader::new(&settings("/nonexistent/scp-binary"));
        let err = uploader.upload(&file, None).await.unwrap_err();
        assert!(matches!(err, UploadError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_a_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("20211205.txt");
        std::fs::write(&file, "x\n").unwrap();

        let err = ScpUploader::new(&settings("false"))
            .upload(&file, None)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Failed { .. }));

        ScpUploader::new(&settings("true"))
            .upload(&file, Some(&file))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn absent_files_are_skipped() {
        let uploader = ScpUploader::new(&settings("/nonexistent/scp-binary"));
        uploader
            .upload(Path::new("/nonexistent/20211205.txt"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn disabled_uploader_always_succeeds() {
        let disabled = from_settings(&UploadSettings::default());
        disabled.upload(Path::new("a"), Some(Path::new("b"))).await.unwrap();
    }
}
