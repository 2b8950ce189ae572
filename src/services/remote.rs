use crate::config::{ResourceKind, Transformation, directive_list, final_dimensions};
use crate::error::TransferError;
use crate::services::stage::StagedFile;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Per-file instructions for the remote store.
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    /// Target namespace/folder under the bucket.
    pub folder: String,
    /// Optional pinned key for overwrite-by-convention cases
    /// ("latest avatar for user X"). A fresh key is generated otherwise.
    pub fixed_key: Option<String>,
    pub resource_kind: ResourceKind,
    /// Applied by the remote store, not locally.
    pub transformations: Vec<Transformation>,
}

/// What the remote store reports back after a successful transfer.
/// Immutable once returned.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RemoteDescriptor {
    pub remote_id: String,
    pub url: String,
    pub format: String,
    pub bytes: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// The authoritative object store files are transferred to. One atomic call
/// per file from the pipeline's point of view: a complete descriptor comes
/// back, or the transfer failed with provider detail and no partial remote
/// state is assumed. No retries happen at this layer.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn put(
        &self,
        staged: &StagedFile,
        options: &RemoteOptions,
    ) -> Result<RemoteDescriptor, TransferError>;

    async fn delete(&self, remote_id: &str) -> Result<(), TransferError>;
}

/// S3-compatible implementation. Transformation directives ride along as
/// object metadata for the remote side to interpret.
pub struct S3RemoteStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3RemoteStore {
    pub fn new(client: Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url,
        }
    }

    fn object_key(&self, options: &RemoteOptions, format: &str) -> String {
        match &options.fixed_key {
            Some(fixed) => format!("{}/{}", options.folder, fixed),
            None => format!("{}/{}.{}", options.folder, Uuid::new_v4(), format),
        }
    }
}

#[async_trait]
impl RemoteStore for S3RemoteStore {
    async fn put(
        &self,
        staged: &StagedFile,
        options: &RemoteOptions,
    ) -> Result<RemoteDescriptor, TransferError> {
        let format = staged_format(staged);
        let key = self.object_key(options, &format);

        let body = ByteStream::from_path(&staged.path).await.map_err(|e| {
            TransferError::new(format!("could not open staged file for transfer: {e}"))
        })?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type_for(&format))
            .metadata("resource-kind", options.resource_kind.as_str())
            .body(body);

        if let Some(directives) = directive_list(&options.transformations) {
            request = request.metadata("transform", directives);
        }

        request
            .send()
            .await
            .map_err(|e| TransferError::new(format!("{}", DisplayErrorContext(&e))))?;

        let (width, height) = final_dimensions(&options.transformations);

        Ok(RemoteDescriptor {
            url: format!(
                "{}/{}/{}",
                self.public_base_url.trim_end_matches('/'),
                self.bucket,
                key
            ),
            remote_id: key,
            format,
            bytes: staged.size,
            width,
            height,
        })
    }

    async fn delete(&self, remote_id: &str) -> Result<(), TransferError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(remote_id)
            .send()
            .await
            .map_err(|e| TransferError::new(format!("{}", DisplayErrorContext(&e))))?;
        Ok(())
    }
}

fn staged_format(staged: &StagedFile) -> String {
    staged
        .path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

fn content_type_for(format: &str) -> &'static str {
    match format {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
