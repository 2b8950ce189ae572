use crate::config::UploadPolicy;
use crate::error::{RejectedAttribute, StageError, UploadError};
use crate::services::cleanup;
use crate::services::remote::{RemoteDescriptor, RemoteOptions, RemoteStore};
use crate::services::stage::Stager;
use crate::utils::validation;
use std::sync::Arc;
use tokio::io::AsyncRead;

/// One file as handed over by the transport layer. Lives only for the
/// duration of a request; the byte stream is consumed by staging.
pub struct IncomingFile<R> {
    pub field: String,
    pub original_name: String,
    pub declared_mime: Option<String>,
    /// Advisory; the stager enforces the hard ceiling while streaming.
    pub declared_size: Option<u64>,
    pub reader: R,
}

/// Outcome of the pipeline for one file in a multi-file request.
#[derive(Debug)]
pub enum FileOutcome {
    Stored(RemoteDescriptor),
    Failed(UploadError),
}

impl From<Result<RemoteDescriptor, UploadError>> for FileOutcome {
    fn from(result: Result<RemoteDescriptor, UploadError>) -> Self {
        match result {
            Ok(descriptor) => FileOutcome::Stored(descriptor),
            Err(err) => FileOutcome::Failed(err),
        }
    }
}

/// Runs receive → validate → stage → transfer → cleanup for each file.
///
/// The three pipeline stages of a single file are strictly ordered; files
/// within one request are processed independently, so a sibling's failure
/// never aborts files that follow it.
pub struct UploadPipeline {
    stager: Stager,
    remote: Arc<dyn RemoteStore>,
}

impl UploadPipeline {
    pub fn new(stager: Stager, remote: Arc<dyn RemoteStore>) -> Self {
        Self { stager, remote }
    }

    /// Full pipeline for one incoming file.
    ///
    /// Validation runs strictly before staging: a rejected file never
    /// reaches the filesystem. After staging, exactly one delete attempt is
    /// made for the staged copy whether or not the transfer succeeded.
    pub async fn ingest<R>(
        &self,
        file: IncomingFile<R>,
        policy: &UploadPolicy,
        fixed_key: Option<String>,
    ) -> Result<RemoteDescriptor, UploadError>
    where
        R: AsyncRead + Unpin,
    {
        validation::validate(
            &file.original_name,
            file.declared_mime.as_deref(),
            file.declared_size.unwrap_or(0),
            policy,
        )?;

        let staged = match self
            .stager
            .stage(file.reader, &file.original_name, policy.max_bytes)
            .await
        {
            Ok(staged) => staged,
            // The streaming ceiling is a size rejection from the caller's
            // point of view, not an infrastructure fault.
            Err(StageError::TooLarge { limit }) => {
                return Err(UploadError::ValidationRejected {
                    attribute: RejectedAttribute::Size,
                    reason: format!("payload exceeds the {limit} byte limit"),
                });
            }
            Err(err) => return Err(UploadError::StageFailed(err)),
        };

        let options = RemoteOptions {
            folder: policy.remote_folder.clone(),
            // A pinned key is caller input like a filename is; strip any
            // directory part before it becomes an object key.
            fixed_key: if policy.allow_fixed_key {
                fixed_key.map(|key| validation::sanitize_filename(&key))
            } else {
                None
            },
            resource_kind: policy.resource_kind,
            transformations: policy.transformations.clone(),
        };

        let transferred = self.remote.put(&staged, &options).await;
        let cleaned = cleanup::discard(&staged).await;

        match transferred {
            Ok(descriptor) => {
                // The file is safely in remote storage; a failed local
                // delete is an operator concern, not a caller error.
                if let Err(err) = cleaned {
                    tracing::warn!(%err, "cleanup failed after successful transfer");
                }
                tracing::info!(
                    field = %file.field,
                    remote_id = %descriptor.remote_id,
                    bytes = descriptor.bytes,
                    "upload stored remotely"
                );
                Ok(descriptor)
            }
            Err(transfer_err) => {
                let mut detail = transfer_err.detail;
                let orphaned = match cleaned {
                    Ok(()) => None,
                    Err(cleanup_err) => {
                        tracing::error!(%cleanup_err, "cleanup failed after failed transfer");
                        detail.push_str(&format!(
                            "; staged copy could not be removed: {}",
                            cleanup_err.path.display()
                        ));
                        Some(cleanup_err.path)
                    }
                };
                Err(UploadError::TransferFailed { detail, orphaned })
            }
        }
    }
}
