use super::UploadConfig;
use std::collections::HashMap;

/// How the remote store should interpret the bytes it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Document,
    Raw,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Image => "image",
            ResourceKind::Document => "document",
            ResourceKind::Raw => "raw",
        }
    }
}

/// A transformation directive applied by the remote store, never locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transformation {
    /// Scale down to fit within the given box, preserving aspect ratio.
    FitWithin { width: u32, height: u32 },
    /// Crop to exactly the given dimensions, filling the frame.
    FillCrop { width: u32, height: u32 },
    QualityAuto,
    FormatAuto,
}

impl Transformation {
    /// Compact directive form understood by the remote side,
    /// e.g. `w_1920,h_1080,c_fit`.
    pub fn directive(&self) -> String {
        match self {
            Transformation::FitWithin { width, height } => {
                format!("w_{width},h_{height},c_fit")
            }
            Transformation::FillCrop { width, height } => {
                format!("w_{width},h_{height},c_fill")
            }
            Transformation::QualityAuto => "q_auto".to_string(),
            Transformation::FormatAuto => "f_auto".to_string(),
        }
    }
}

/// Joins an ordered directive list into the single header value the remote
/// store expects, or `None` when no transformation applies.
pub fn directive_list(transformations: &[Transformation]) -> Option<String> {
    if transformations.is_empty() {
        return None;
    }
    Some(
        transformations
            .iter()
            .map(Transformation::directive)
            .collect::<Vec<_>>()
            .join("|"),
    )
}

/// Final dimensions implied by the directive list, when they are knowable
/// up front. Only a fill-crop pins both dimensions.
pub fn final_dimensions(transformations: &[Transformation]) -> (Option<u32>, Option<u32>) {
    for t in transformations {
        if let Transformation::FillCrop { width, height } = t {
            return (Some(*width), Some(*height));
        }
    }
    (None, None)
}

/// Validation and transfer rules for one upload category. Immutable after
/// startup; looked up by route.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub name: String,
    /// Multipart field name the file is expected under.
    pub field: String,
    /// Lowercase, without the leading dot.
    pub allowed_extensions: Vec<String>,
    /// Normalized `type/subtype` media types.
    pub allowed_mime_types: Vec<String>,
    pub max_bytes: u64,
    pub remote_folder: String,
    pub resource_kind: ResourceKind,
    pub transformations: Vec<Transformation>,
    /// Whether the caller may pin the remote key (overwrite-by-convention).
    pub allow_fixed_key: bool,
}

impl UploadPolicy {
    pub fn allows_extension(&self, ext: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }

    pub fn allows_mime(&self, mime: &str) -> bool {
        self.allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime))
    }
}

/// A multipart field bound to a policy in multi-field mode.
#[derive(Debug, Clone)]
pub struct FieldBinding {
    pub field: String,
    pub policy: UploadPolicy,
    pub max_files: usize,
}

/// All upload policies known at startup, keyed by category name.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, UploadPolicy>,
}

impl PolicyRegistry {
    /// The built-in categories, with size ceilings taken from config.
    pub fn from_config(config: &UploadConfig) -> Self {
        let mut registry = Self::default();
        registry.insert(UploadPolicy {
            name: "image".to_string(),
            field: "file".to_string(),
            allowed_extensions: strings(&["jpg", "jpeg", "png", "gif", "webp"]),
            allowed_mime_types: strings(&["image/jpeg", "image/png", "image/gif", "image/webp"]),
            max_bytes: config.image_max_bytes,
            remote_folder: "images".to_string(),
            resource_kind: ResourceKind::Image,
            transformations: vec![
                Transformation::FitWithin {
                    width: 1920,
                    height: 1080,
                },
                Transformation::QualityAuto,
                Transformation::FormatAuto,
            ],
            allow_fixed_key: false,
        });
        registry.insert(UploadPolicy {
            name: "avatar".to_string(),
            field: "avatar".to_string(),
            allowed_extensions: strings(&["jpg", "jpeg", "png"]),
            allowed_mime_types: strings(&["image/jpeg", "image/png"]),
            max_bytes: config.avatar_max_bytes,
            remote_folder: "avatars".to_string(),
            resource_kind: ResourceKind::Image,
            transformations: vec![
                Transformation::FillCrop {
                    width: 256,
                    height: 256,
                },
                Transformation::QualityAuto,
            ],
            allow_fixed_key: true,
        });
        registry.insert(UploadPolicy {
            name: "document".to_string(),
            field: "file".to_string(),
            allowed_extensions: strings(&["pdf", "doc", "docx", "txt"]),
            allowed_mime_types: strings(&[
                "application/pdf",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "text/plain",
            ]),
            max_bytes: config.document_max_bytes,
            remote_folder: "documents".to_string(),
            resource_kind: ResourceKind::Document,
            transformations: Vec::new(),
            allow_fixed_key: false,
        });
        registry
    }

    pub fn insert(&mut self, policy: UploadPolicy) {
        self.policies.insert(policy.name.clone(), policy);
    }

    pub fn get(&self, name: &str) -> Option<&UploadPolicy> {
        self.policies.get(name)
    }

    /// Field map for the multi-field listing route: up to 6 photos and
    /// 3 attachments per request.
    pub fn listing_bindings(&self) -> Vec<FieldBinding> {
        let mut bindings = Vec::new();
        if let Some(image) = self.get("image") {
            bindings.push(FieldBinding {
                field: "photos".to_string(),
                policy: image.clone(),
                max_files: 6,
            });
        }
        if let Some(document) = self.get("document") {
            bindings.push(FieldBinding {
                field: "attachments".to_string(),
                policy: document.clone(),
                max_files: 3,
            });
        }
        bindings
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}
