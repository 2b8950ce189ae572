pub mod config;
pub mod error;
pub mod handlers;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::{FieldBinding, PolicyRegistry, UploadConfig};
use crate::services::pipeline::UploadPipeline;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::uploads::upload_single,
        handlers::uploads::upload_batch,
        handlers::uploads::upload_listing,
    ),
    components(
        schemas(
            handlers::uploads::StoredFileResponse,
            handlers::uploads::UploadOutcomeBody,
            handlers::uploads::BatchUploadResponse,
            handlers::uploads::ListingUploadResponse,
            services::remote::RemoteDescriptor,
        )
    ),
    tags(
        (name = "uploads", description = "Staged upload endpoints"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<UploadPipeline>,
    pub policies: Arc<PolicyRegistry>,
    pub listing: Arc<Vec<FieldBinding>>,
}

impl AppState {
    pub fn new(pipeline: UploadPipeline, config: &UploadConfig) -> Self {
        let policies = PolicyRegistry::from_config(config);
        let listing = policies.listing_bindings();
        Self {
            pipeline: Arc::new(pipeline),
            policies: Arc::new(policies),
            listing: Arc::new(listing),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health::health))
        .route("/uploads/listing", post(handlers::uploads::upload_listing))
        .route("/uploads/:category", post(handlers::uploads::upload_single))
        .route(
            "/uploads/:category/batch",
            post(handlers::uploads::upload_batch),
        )
        .with_state(state)
}
