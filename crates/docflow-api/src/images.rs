//! Markdown image rewriting against an S3-compatible object store.
//!
//! When a caller requests `upload_images=true`, every local image reference
//! in the returned Markdown is uploaded under `images/{uuid}{ext}` and the
//! reference is replaced with an HTML `<img>` tag pointing at the store.
//! Per-image failures are logged and leave the original reference untouched.

use std::path::Path;
use std::sync::LazyLock;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use regex::Regex;
use tracing::{info, warn};

static IMAGE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").unwrap());

/// Environment configuration for the object store.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    /// Endpoint URL including scheme, e.g. `https://minio.internal:9000`
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
}

impl ObjectStoreConfig {
    /// Read the standard environment variables; `None` when unset.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            endpoint: std::env::var("DOCFLOW_S3_ENDPOINT").ok()?,
            access_key: std::env::var("DOCFLOW_S3_ACCESS_KEY").ok()?,
            secret_key: std::env::var("DOCFLOW_S3_SECRET_KEY").ok()?,
            bucket: std::env::var("DOCFLOW_S3_BUCKET").ok()?,
        })
    }
}

pub struct ImageUploader {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base: String,
}

impl ImageUploader {
    pub async fn connect(config: ObjectStoreConfig) -> Self {
        let base = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&base)
            .endpoint_url(&config.endpoint)
            .credentials_provider(Credentials::new(
                config.access_key,
                config.secret_key,
                None,
                None,
                "docflow",
            ))
            .force_path_style(true)
            .build();

        info!(endpoint = %config.endpoint, bucket = %config.bucket, "Object store configured");
        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            public_base: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket,
        }
    }

    /// Upload one image and return its public URL.
    async fn upload_image(&self, path: &Path) -> Result<String, String> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        let key = format!("images/{}{}", uuid::Uuid::new_v4(), extension);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| e.to_string())?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .content_type(content_type_for(&extension))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        Ok(format!("{}/{}/{}", self.public_base, self.bucket, key))
    }

    /// Rewrite `![alt](path)` references whose targets exist under `image_dir`.
    pub async fn rewrite_markdown(&self, content: &str, image_dir: &Path) -> String {
        let mut out = String::with_capacity(content.len());
        let mut last = 0;

        for caps in IMAGE_REF.captures_iter(content) {
            let whole = caps.get(0).expect("group 0 always present");
            out.push_str(&content[last..whole.start()]);
            last = whole.end();

            let alt = &caps[1];
            let reference = &caps[2];
            let file_name = Path::new(reference)
                .file_name()
                .map(|n| image_dir.join(n));

            let replacement = match file_name {
                Some(local) if local.exists() => match self.upload_image(&local).await {
                    Ok(url) => format!("<img src=\"{}\" alt=\"{}\">", url, alt),
                    Err(err) => {
                        warn!(image = %local.display(), error = %err, "Image upload failed, keeping original reference");
                        whole.as_str().to_string()
                    }
                },
                _ => whole.as_str().to_string(),
            };
            out.push_str(&replacement);
        }

        out.push_str(&content[last..]);
        out
    }
}

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_reference_regex() {
        let md = "before ![figure 1](images/fig1.png) after ![](x.jpg)";
        let matches: Vec<_> = IMAGE_REF.captures_iter(md).collect();
        assert_eq!(matches.len(), 2);
        assert_eq!(&matches[0][1], "figure 1");
        assert_eq!(&matches[0][2], "images/fig1.png");
        assert_eq!(&matches[1][1], "");
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(".png"), "image/png");
        assert_eq!(content_type_for(".jpeg"), "image/jpeg");
        assert_eq!(content_type_for(".svg"), "application/octet-stream");
    }
}
