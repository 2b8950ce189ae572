use crate::error::CleanupError;
use crate::services::stage::StagedFile;
use tokio::fs;

/// Deletes the staged copy. The pipeline calls this exactly once per staged
/// file, after the remote transfer has resolved either way; local disk is
/// never a long-term store.
///
/// A delete failure is returned so the caller can record it. It only
/// escalates into the caller-visible result when the transfer itself also
/// failed, in which case the orphaned path is compounded into the error.
pub async fn discard(staged: &StagedFile) -> Result<(), CleanupError> {
    match fs::remove_file(&staged.path).await {
        Ok(()) => {
            tracing::debug!(path = %staged.path.display(), "staged copy deleted");
            Ok(())
        }
        Err(source) => Err(CleanupError {
            path: staged.path.clone(),
            source,
        }),
    }
}
