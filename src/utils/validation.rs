use crate::config::UploadPolicy;
use crate::error::{RejectedAttribute, UploadError};
use std::path::Path;

/// Sanitizes a client-supplied filename for use as a path component.
/// Strips any directory part, replaces reserved characters, and caps the
/// length. Never fails: an unusable name falls back to `"upload"`.
pub fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';')
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Keep names comfortably below common filesystem limits; the stager
    // appends a timestamp and random suffix of its own.
    if sanitized.len() > 128 {
        let mut end = 128;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized.truncate(end);
    }

    let trimmed = sanitized.trim_start_matches('.');
    if trimmed.is_empty() {
        return "upload".to_string();
    }
    trimmed.to_string()
}

/// Lowercased extension of a filename, without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Normalizes a declared media type to its `type/subtype` essence.
fn normalize_mime(raw: &str) -> Option<String> {
    raw.trim()
        .parse::<mime::Mime>()
        .ok()
        .map(|m| m.essence_str().to_ascii_lowercase())
}

/// Pure gate run strictly before staging: checks the declared extension,
/// MIME type, and size against the policy. Both the extension and the MIME
/// check must pass, which defends against extension/MIME spoofing.
///
/// The declared size is advisory; the stager independently enforces a hard
/// byte ceiling while the stream is written.
pub fn validate(
    filename: &str,
    declared_mime: Option<&str>,
    declared_size: u64,
    policy: &UploadPolicy,
) -> Result<(), UploadError> {
    let sanitized = sanitize_filename(filename);

    let Some(ext) = file_extension(&sanitized) else {
        return Err(UploadError::ValidationRejected {
            attribute: RejectedAttribute::Extension,
            reason: format!("filename '{sanitized}' has no extension"),
        });
    };
    if !policy.allows_extension(&ext) {
        return Err(UploadError::ValidationRejected {
            attribute: RejectedAttribute::Extension,
            reason: format!(
                "extension '.{ext}' is not allowed for {} uploads",
                policy.name
            ),
        });
    }

    let Some(mime) = declared_mime.and_then(normalize_mime) else {
        return Err(UploadError::ValidationRejected {
            attribute: RejectedAttribute::MimeType,
            reason: "missing or unparseable media type".to_string(),
        });
    };
    if !policy.allows_mime(&mime) {
        return Err(UploadError::ValidationRejected {
            attribute: RejectedAttribute::MimeType,
            reason: format!("media type '{mime}' is not allowed for {} uploads", policy.name),
        });
    }

    if declared_size > policy.max_bytes {
        return Err(UploadError::ValidationRejected {
            attribute: RejectedAttribute::Size,
            reason: format!(
                "declared size {declared_size} bytes exceeds the {} byte limit",
                policy.max_bytes
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PolicyRegistry, UploadConfig};

    fn image_policy() -> UploadPolicy {
        PolicyRegistry::from_config(&UploadConfig::default())
            .get("image")
            .unwrap()
            .clone()
    }

    fn rejected_attribute(err: UploadError) -> RejectedAttribute {
        match err {
            UploadError::ValidationRejected { attribute, .. } => attribute,
            other => panic!("expected validation rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_filename("my file.png"), "my file.png");
        assert_eq!(sanitize_filename("a<b>.gif"), "a_b_.gif");
        assert_eq!(sanitize_filename("../../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..\\..\\boot.ini"), "_.._boot.ini");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("測試.png"), "測試.png");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("noext"), None);
    }

    #[test]
    fn test_case_insensitive_extension_accepted() {
        let policy = image_policy();
        assert!(validate("photo.JPG", Some("image/jpeg"), 2048, &policy).is_ok());
    }

    #[test]
    fn test_rejects_disallowed_extension() {
        let policy = image_policy();
        let err = validate(
            "malware.exe",
            Some("application/x-msdownload"),
            100,
            &policy,
        )
        .unwrap_err();
        assert_eq!(rejected_attribute(err), RejectedAttribute::Extension);
    }

    #[test]
    fn test_rejects_mime_mismatch() {
        // Allowed extension but spoofed media type must still fail.
        let policy = image_policy();
        let err = validate("photo.jpg", Some("application/pdf"), 100, &policy).unwrap_err();
        assert_eq!(rejected_attribute(err), RejectedAttribute::MimeType);
    }

    #[test]
    fn test_rejects_missing_mime() {
        let policy = image_policy();
        let err = validate("photo.jpg", None, 100, &policy).unwrap_err();
        assert_eq!(rejected_attribute(err), RejectedAttribute::MimeType);
    }

    #[test]
    fn test_mime_parameters_are_ignored() {
        let policy = image_policy();
        assert!(validate("photo.jpg", Some("image/jpeg; charset=binary"), 1, &policy).is_ok());
    }

    #[test]
    fn test_size_boundary() {
        let policy = image_policy();
        let max = policy.max_bytes;
        assert!(validate("photo.jpg", Some("image/jpeg"), max, &policy).is_ok());
        let err = validate("photo.jpg", Some("image/jpeg"), max + 1, &policy).unwrap_err();
        assert_eq!(rejected_attribute(err), RejectedAttribute::Size);
    }
}
