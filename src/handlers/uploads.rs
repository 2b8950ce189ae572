use crate::AppState;
use crate::config::UploadPolicy;
use crate::error::{AppError, UploadError};
use crate::services::pipeline::{FileOutcome, IncomingFile};
use crate::services::remote::RemoteDescriptor;
use axum::{
    Json,
    extract::{Multipart, Path, Query, State, multipart::Field},
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use utoipa::{IntoParams, ToSchema};

/// Upper bound on files accepted by the batch route in one request.
const MAX_BATCH_FILES: usize = 10;

#[derive(Serialize, ToSchema)]
pub struct StoredFileResponse {
    pub original_name: String,
    pub remote: RemoteDescriptor,
}

/// Per-file status in multi-file responses, so the caller can tell which
/// uploads succeeded.
#[derive(Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcomeBody {
    Stored {
        original_name: String,
        remote: RemoteDescriptor,
    },
    Failed {
        original_name: String,
        reason: String,
        error: String,
    },
}

impl UploadOutcomeBody {
    fn new(original_name: String, outcome: FileOutcome) -> Self {
        match outcome {
            FileOutcome::Stored(remote) => UploadOutcomeBody::Stored {
                original_name,
                remote,
            },
            FileOutcome::Failed(err) => UploadOutcomeBody::Failed {
                original_name,
                reason: err.reason().to_string(),
                error: err.to_string(),
            },
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct BatchUploadResponse {
    pub field: String,
    /// Ordered per-file outcomes, one per submitted file.
    pub files: Vec<UploadOutcomeBody>,
}

#[derive(Serialize, ToSchema)]
pub struct ListingUploadResponse {
    /// Outcomes grouped by the multipart field they arrived under.
    pub fields: BTreeMap<String, Vec<UploadOutcomeBody>>,
}

#[derive(Deserialize, IntoParams)]
pub struct UploadParams {
    /// Pinned remote key, honored only for categories that allow
    /// overwrite-by-convention.
    pub key: Option<String>,
}

fn lookup_policy(state: &AppState, category: &str) -> Result<UploadPolicy, AppError> {
    state
        .policies
        .get(category)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("unknown upload category '{category}'")))
}

async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>, AppError> {
    multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed multipart body: {e}")))
}

/// Adapts a multipart file field into the pipeline's transport-agnostic
/// shape, without buffering the body.
fn incoming_from_field(field: Field<'_>) -> IncomingFile<impl AsyncRead + Unpin + '_> {
    let name = field.name().unwrap_or_default().to_string();
    let original_name = field.file_name().unwrap_or("unnamed").to_string();
    let declared_mime = field.content_type().map(|s| s.to_string());
    let reader = StreamReader::new(
        field.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err)),
    );

    IncomingFile {
        field: name,
        original_name,
        declared_mime,
        declared_size: None,
        reader,
    }
}

#[utoipa::path(
    post,
    path = "/uploads/{category}",
    params(
        ("category" = String, Path, description = "Upload category (image, avatar, document)"),
        UploadParams
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "Single file under the category's field name"),
    responses(
        (status = 200, description = "File stored remotely", body = StoredFileResponse),
        (status = 400, description = "Missing file or validation rejection"),
        (status = 404, description = "Unknown category"),
        (status = 413, description = "Payload too large"),
        (status = 502, description = "Remote transfer failed")
    ),
    tag = "uploads"
)]
pub async fn upload_single(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<StoredFileResponse>, AppError> {
    let policy = lookup_policy(&state, &category)?;
    let mut result: Option<(String, Result<RemoteDescriptor, UploadError>)> = None;

    while let Some(field) = next_field(&mut multipart).await? {
        if field.file_name().is_none() {
            // Accompanying plain-text form fields are tolerated.
            let _ = field.text().await;
            continue;
        }
        let field_name = field.name().unwrap_or_default();
        if field_name != policy.field {
            tracing::warn!(field = field_name, "ignoring file under unexpected field");
            continue;
        }
        if result.is_some() {
            tracing::warn!("ignoring extra file in single-file request");
            continue;
        }

        let incoming = incoming_from_field(field);
        let original_name = incoming.original_name.clone();
        let outcome = state
            .pipeline
            .ingest(incoming, &policy, params.key.clone())
            .await;
        result = Some((original_name, outcome));
    }

    // Zero files is a caller error, distinct from a validation rejection.
    let (original_name, outcome) = result.ok_or_else(|| {
        AppError::Upload(UploadError::NoFilePresent {
            field: policy.field.clone(),
        })
    })?;

    let remote = outcome?;
    Ok(Json(StoredFileResponse {
        original_name,
        remote,
    }))
}

#[utoipa::path(
    post,
    path = "/uploads/{category}/batch",
    params(
        ("category" = String, Path, description = "Upload category (image, avatar, document)")
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "Several files under the category's field name"),
    responses(
        (status = 200, description = "Ordered per-file outcomes", body = BatchUploadResponse),
        (status = 400, description = "No file present"),
        (status = 404, description = "Unknown category")
    ),
    tag = "uploads"
)]
pub async fn upload_batch(
    State(state): State<AppState>,
    Path(category): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<BatchUploadResponse>, AppError> {
    let policy = lookup_policy(&state, &category)?;
    let mut files = Vec::new();

    while let Some(field) = next_field(&mut multipart).await? {
        if field.file_name().is_none() {
            let _ = field.text().await;
            continue;
        }
        let field_name = field.name().unwrap_or_default();
        if field_name != policy.field {
            tracing::warn!(field = field_name, "ignoring file under unexpected field");
            continue;
        }
        if files.len() >= MAX_BATCH_FILES {
            tracing::warn!("batch file limit reached, ignoring extra file");
            continue;
        }

        // Every file is processed independently: one file's rejection does
        // not abort its siblings.
        let incoming = incoming_from_field(field);
        let original_name = incoming.original_name.clone();
        let outcome = state.pipeline.ingest(incoming, &policy, None).await;
        files.push(UploadOutcomeBody::new(original_name, outcome.into()));
    }

    if files.is_empty() {
        return Err(UploadError::NoFilePresent {
            field: policy.field.clone(),
        }
        .into());
    }

    Ok(Json(BatchUploadResponse {
        field: policy.field.clone(),
        files,
    }))
}

#[utoipa::path(
    post,
    path = "/uploads/listing",
    request_body(content = String, content_type = "multipart/form-data", description = "Photos and attachments for one listing"),
    responses(
        (status = 200, description = "Per-field, per-file outcomes", body = ListingUploadResponse),
        (status = 400, description = "No file present")
    ),
    tag = "uploads"
)]
pub async fn upload_listing(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ListingUploadResponse>, AppError> {
    let bindings = state.listing.clone();
    let mut fields: BTreeMap<String, Vec<UploadOutcomeBody>> = bindings
        .iter()
        .map(|b| (b.field.clone(), Vec::new()))
        .collect();

    while let Some(field) = next_field(&mut multipart).await? {
        if field.file_name().is_none() {
            let _ = field.text().await;
            continue;
        }
        let field_name = field.name().unwrap_or_default().to_string();
        let Some(binding) = bindings.iter().find(|b| b.field == field_name) else {
            tracing::warn!(field = %field_name, "ignoring file under unbound field");
            continue;
        };
        let taken = fields.get(&field_name).map(Vec::len).unwrap_or(0);
        if taken >= binding.max_files {
            tracing::warn!(field = %field_name, "field file limit reached, ignoring extra file");
            continue;
        }

        let incoming = incoming_from_field(field);
        let original_name = incoming.original_name.clone();
        let outcome = state.pipeline.ingest(incoming, &binding.policy, None).await;
        fields
            .entry(field_name)
            .or_default()
            .push(UploadOutcomeBody::new(original_name, outcome.into()));
    }

    if fields.values().all(Vec::is_empty) {
        let expected = bindings
            .iter()
            .map(|b| b.field.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(UploadError::NoFilePresent { field: expected }.into());
    }

    Ok(Json(ListingUploadResponse { fields }))
}
