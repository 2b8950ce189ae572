pub mod policy;

pub use policy::{
    FieldBinding, PolicyRegistry, ResourceKind, Transformation, UploadPolicy, directive_list,
    final_dimensions,
};

use std::env;
use std::path::PathBuf;

/// Upload service configuration.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Local scratch directory staged files are written to (default: ./staging)
    pub staging_dir: PathBuf,

    /// Hard ceiling on the whole request body in bytes (default: 32 MiB)
    pub max_request_bytes: usize,

    /// Per-category size ceilings in bytes
    pub image_max_bytes: u64,
    pub avatar_max_bytes: u64,
    pub document_max_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("./staging"),
            max_request_bytes: 32 * 1024 * 1024,
            image_max_bytes: 5 * 1024 * 1024,
            avatar_max_bytes: 2 * 1024 * 1024,
            document_max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl UploadConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            staging_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            max_request_bytes: env::var("MAX_REQUEST_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_request_bytes),

            image_max_bytes: env::var("IMAGE_MAX_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.image_max_bytes),

            avatar_max_bytes: env::var("AVATAR_MAX_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.avatar_max_bytes),

            document_max_bytes: env::var("DOCUMENT_MAX_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.document_max_bytes),
        }
    }
}
