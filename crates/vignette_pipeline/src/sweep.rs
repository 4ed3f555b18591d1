//! TTL sweep of finished job directories.
//!
//! Job working directories accumulate page images and reference caches.
//! The sweeper removes directories whose last modification is older than
//! the configured TTL; durable blobs are left alone, so a swept job's
//! artifacts remain retrievable.

use std::time::{Duration, SystemTime};
use vignette_core::VignetteConfig;
use vignette_error::{StorageError, StorageErrorKind, VignetteResult};

/// Remove job directories untouched for longer than the sweep TTL.
/// Returns the swept job ids.
///
/// # Errors
///
/// Fails only when the jobs directory itself is unreadable; individual
/// directory removals are best-effort.
#[tracing::instrument(skip(config))]
pub async fn sweep_expired_jobs(config: &VignetteConfig) -> VignetteResult<Vec<String>> {
    let jobs_dir = config.data_dir().join("jobs");
    let ttl = Duration::from_secs(*config.sweep_ttl_hours() * 3600);
    let now = SystemTime::now();
    let mut swept = Vec::new();

    let mut entries = match tokio::fs::read_dir(&jobs_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(swept),
        Err(e) => {
            return Err(StorageError::new(StorageErrorKind::Read(format!(
                "{}: {}",
                jobs_dir.display(),
                e
            )))
            .into());
        }
    };

    while let Some(entry) = entries.next_entry().await.map_err(|e| {
        StorageError::new(StorageErrorKind::Read(format!("{}: {}", jobs_dir.display(), e)))
    })? {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let age = entry
            .metadata()
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|modified| now.duration_since(modified).ok());
        let Some(age) = age else { continue };
        if age < ttl {
            continue;
        }
        let job_id = entry.file_name().to_string_lossy().to_string();
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                tracing::info!(job_id, age_hours = age.as_secs() / 3600, "Swept job directory");
                swept.push(job_id);
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Sweep failed for job directory");
            }
        }
    }
    Ok(swept)
}
