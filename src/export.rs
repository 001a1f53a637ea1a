use crate::config::ExportConfig;
use crate::error::{PhotoboothError, Result};
use crate::frame::FrameVariant;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What kind of artifact a download carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Static composed strip
    Strip,
    /// Looping animation of the set
    Animation,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Strip => "png",
            ArtifactKind::Animation => "gif",
        }
    }
}

/// Proof that a download landed on disk
#[derive(Debug, Clone)]
pub struct DownloadReceipt {
    pub filename: String,
    pub path: PathBuf,
    pub bytes: usize,
    /// Staged handle; revoked shortly after the download starts
    pub handle: Uuid,
    pub saved_at: SystemTime,
}

#[derive(Debug)]
struct StagedArtifact {
    filename: String,
    bytes: Arc<Vec<u8>>,
}

/// Writes artifacts into the output directory the way a browser saves a download
pub struct ExportAdapter {
    output_dir: PathBuf,
    filename_prefix: String,
    revoke_after: Duration,
    staged: Arc<Mutex<HashMap<Uuid, StagedArtifact>>>,
}

impl ExportAdapter {
    pub fn new(config: &ExportConfig) -> Self {
        Self::with_output_dir(config, config.output_path())
    }

    pub fn with_output_dir<P: Into<PathBuf>>(config: &ExportConfig, output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
            filename_prefix: config.filename_prefix.clone(),
            revoke_after: config.revoke_after(),
            staged: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<prefix>-<variant>.<ext>`, e.g. `valentine-2026-pixel.gif`
    pub fn filename_for(&self, kind: ArtifactKind, variant: FrameVariant) -> String {
        format!("{}-{}.{}", self.filename_prefix, variant.label(), kind.extension())
    }

    /// Save `bytes` as `filename` in the output directory
    ///
    /// The bytes stay staged under a fresh handle until `revoke_after` has
    /// passed; the file itself is written to a hidden `.part` sibling and
    /// renamed into place so a reader never sees a half-written download.
    pub async fn download_as_file(&self, bytes: &[u8], filename: &str) -> Result<DownloadReceipt> {
        validate_filename(filename)?;

        let handle = Uuid::new_v4();
        let staged = Arc::new(bytes.to_vec());
        self.staged.lock().insert(
            handle,
            StagedArtifact {
                filename: filename.to_string(),
                bytes: Arc::clone(&staged),
            },
        );
        debug!("Staged {} ({} bytes) as {}", filename, staged.len(), handle);

        let written = self.write_atomically(&staged, filename).await;
        // Revocation is deferred even when the write failed
        self.schedule_revoke(handle);
        let path = written?;

        info!("Saved {} ({} bytes) to {}", filename, staged.len(), path.display());

        Ok(DownloadReceipt {
            filename: filename.to_string(),
            path,
            bytes: staged.len(),
            handle,
            saved_at: SystemTime::now(),
        })
    }

    async fn write_atomically(&self, bytes: &[u8], filename: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let final_path = self.output_dir.join(filename);
        let part_path = self.output_dir.join(format!(".{}.part", filename));

        if let Err(e) = tokio::fs::write(&part_path, bytes).await {
            warn!("Failed to write {}: {}", part_path.display(), e);
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&part_path, &final_path).await {
            warn!("Failed to move {} into place: {}", filename, e);
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(e.into());
        }

        Ok(final_path)
    }

    fn schedule_revoke(&self, handle: Uuid) {
        let staged = Arc::clone(&self.staged);
        let delay = self.revoke_after;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(artifact) = staged.lock().remove(&handle) {
                debug!("Revoked staged handle {} for {}", handle, artifact.filename);
            }
        });
    }

    /// Whether `handle` still refers to staged bytes
    pub fn is_staged(&self, handle: &Uuid) -> bool {
        self.staged.lock().contains_key(handle)
    }

    /// Staged bytes behind a live handle
    pub fn staged_bytes(&self, handle: &Uuid) -> Option<Arc<Vec<u8>>> {
        self.staged.lock().get(handle).map(|a| Arc::clone(&a.bytes))
    }

    pub fn staged_count(&self) -> usize {
        self.staged.lock().len()
    }
}

/// A download name must be a bare file name
pub fn validate_filename(filename: &str) -> Result<()> {
    let trimmed = filename.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(PhotoboothError::export(format!("invalid filename '{}'", filename)));
    }
    if filename.contains(['/', '\\', '\0']) {
        return Err(PhotoboothError::export(format!(
            "filename '{}' must not contain path separators",
            filename
        )));
    }
    Ok(())
}
