//! Object storage for uploaded résumé and job-description files.
//!
//! Keys follow `resumes/<uuid><.ext>` / `jobs/<uuid><.ext>`; the extension is
//! derived from the original filename, falling back to the mime type, then
//! `.bin`.

use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;

/// Mime types accepted for uploads.
pub const ALLOWED_MIME_TYPES: [&str; 4] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

/// Maximum upload size: 10 MiB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Shared wrapper over the S3-compatible client (Cloudflare R2 in production,
/// MinIO locally). Built once at boot.
#[derive(Clone)]
pub struct ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl ObjectStore {
    pub async fn from_config(config: &Config) -> Self {
        let credentials = Credentials::new(
            &config.r2_access_key_id,
            &config.r2_secret_access_key,
            None,
            None,
            "skillsync-static",
        );

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("auto"))
            .credentials_provider(credentials)
            .endpoint_url(&config.r2_endpoint)
            .load()
            .await;

        Self {
            client: aws_sdk_s3::Client::new(&s3_config),
            bucket: config.r2_bucket.clone(),
        }
    }

    pub async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("put {key}: {e}")))?;
        Ok(())
    }

    pub async fn get_object_bytes(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("get {key}: {e}")))?;

        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("read {key}: {e}")))?;
        Ok(bytes.into_bytes().to_vec())
    }
}

/// Builds the storage key for an uploaded document.
pub fn object_key(prefix: &str, id: Uuid, filename: &str, mime_type: &str) -> String {
    format!("{prefix}/{id}{}", file_extension(filename, mime_type))
}

/// Extension derivation: original filename extension → mime map → `.bin`.
fn file_extension(filename: &str, mime_type: &str) -> String {
    if let Some((_, ext)) = filename.rsplit_once('.') {
        if !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return format!(".{}", ext.to_lowercase());
        }
    }
    match mime_type {
        "application/pdf" => ".pdf".to_string(),
        "application/msword" => ".doc".to_string(),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            ".docx".to_string()
        }
        "text/plain" => ".txt".to_string(),
        _ => ".bin".to_string(),
    }
}

pub fn is_allowed_mime_type(mime_type: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_filename_wins() {
        assert_eq!(file_extension("resume.PDF", "text/plain"), ".pdf");
        assert_eq!(file_extension("cv.docx", "application/pdf"), ".docx");
    }

    #[test]
    fn test_extension_falls_back_to_mime_map() {
        assert_eq!(file_extension("resume", "application/pdf"), ".pdf");
        assert_eq!(file_extension("notes", "text/plain"), ".txt");
        assert_eq!(
            file_extension(
                "cv",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            ".docx"
        );
    }

    #[test]
    fn test_extension_falls_back_to_bin() {
        assert_eq!(file_extension("blob", "application/octet-stream"), ".bin");
    }

    #[test]
    fn test_suspicious_extensions_are_ignored() {
        // Overly long or non-alphanumeric trailing segments are not extensions.
        assert_eq!(file_extension("archive.tar.gz.backup999x", "text/plain"), ".txt");
        assert_eq!(file_extension("weird.", "text/plain"), ".txt");
    }

    #[test]
    fn test_object_key_convention() {
        let id = Uuid::nil();
        assert_eq!(
            object_key("resumes", id, "resume.txt", "text/plain"),
            format!("resumes/{id}.txt")
        );
        assert_eq!(
            object_key("jobs", id, "jd", "application/pdf"),
            format!("jobs/{id}.pdf")
        );
    }

    #[test]
    fn test_allowed_mime_types() {
        assert!(is_allowed_mime_type("application/pdf"));
        assert!(is_allowed_mime_type("text/plain"));
        assert!(!is_allowed_mime_type("image/png"));
    }
}
