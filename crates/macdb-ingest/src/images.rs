//! Local storage for app icons and screenshots.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use macdb_core::AppConfig;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "icns"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Icon,
    Screenshot,
}

impl ImageKind {
    fn dir_name(self) -> &'static str {
        match self {
            ImageKind::Icon => "icons",
            ImageKind::Screenshot => "screenshots",
        }
    }
}

/// Downloads a remote image and returns the path it is served under.
///
/// Failures are never fatal to an import; implementations log and return
/// `None`.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn fetch_and_store(
        &self,
        url: &str,
        kind: ImageKind,
        owner_external_id: Option<&str>,
    ) -> Option<String>;
}

/// Writes images under `root/<kind>/<owner>/<sha256(url)>.<ext>`.
///
/// The name is derived from the URL, so an already-stored image is not
/// downloaded again.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    client: reqwest::Client,
    root: PathBuf,
    public_prefix: String,
}

impl LocalImageStore {
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(
        root: impl Into<PathBuf>,
        public_prefix: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_owned(),
        })
    }

    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            config.image_dir.clone(),
            &config.image_public_prefix,
            config.scraper_request_timeout_secs,
            &config.scraper_user_agent,
        )
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative_path(url: &str, kind: ImageKind, owner_external_id: Option<&str>) -> PathBuf {
        let mut path = PathBuf::from(kind.dir_name());
        if let Some(owner) = owner_external_id.map(sanitize_segment).filter(|o| !o.is_empty()) {
            path.push(owner);
        }
        path.push(format!("{}.{}", sha256_hex(url.as_bytes()), extension_of(url)));
        path
    }

    fn public_path(&self, relative: &Path) -> String {
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{relative}", self.public_prefix)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let Some(dir) = path.parent() else {
            return Err(std::io::Error::other("image path has no parent directory"));
        };
        fs::create_dir_all(dir).await?;
        let temp_path = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);
        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn fetch_and_store(
        &self,
        url: &str,
        kind: ImageKind,
        owner_external_id: Option<&str>,
    ) -> Option<String> {
        let relative = Self::relative_path(url, kind, owner_external_id);
        let absolute = self.root.join(&relative);

        if fs::try_exists(&absolute).await.unwrap_or(false) {
            return Some(self.public_path(&relative));
        }

        let bytes = match self.download(url).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                tracing::warn!(url, "image response was empty");
                return None;
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "image download failed");
                return None;
            }
        };

        if let Err(e) = Self::write_atomic(&absolute, &bytes).await {
            tracing::warn!(url, path = %absolute.display(), error = %e, "failed to store image");
            return None;
        }
        Some(self.public_path(&relative))
    }
}

fn sha256_hex(input: &[u8]) -> String {
    format!("{:x}", Sha256::digest(input))
}

fn extension_of(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    ext.and_then(|e| IMAGE_EXTENSIONS.iter().find(|known| **known == e).copied())
        .unwrap_or("png")
}

fn sanitize_segment(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn extension_is_taken_from_url_path() {
        assert_eq!(extension_of("https://cdn.example.com/a/icon.JPG?w=64"), "jpg");
        assert_eq!(extension_of("https://cdn.example.com/a/icon"), "png");
        assert_eq!(extension_of("https://cdn.example.com/a/file.exe"), "png");
    }

    #[test]
    fn relative_path_is_keyed_by_url_hash() {
        let a = LocalImageStore::relative_path("https://x/a.png", ImageKind::Icon, Some("v/1"));
        let b = LocalImageStore::relative_path("https://x/a.png", ImageKind::Icon, Some("v/1"));
        assert_eq!(a, b);
        assert!(a.starts_with("icons/v1"));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("png"));
    }

    #[tokio::test]
    async fn downloads_once_and_returns_public_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/shot.webp"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1_u8, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path(), "/uploads/", 5, "test").unwrap();
        let url = format!("{}/shot.webp", server.uri());

        let first = store
            .fetch_and_store(&url, ImageKind::Screenshot, None)
            .await
            .expect("stored");
        let second = store
            .fetch_and_store(&url, ImageKind::Screenshot, None)
            .await
            .expect("cached");

        assert_eq!(first, second);
        assert!(first.starts_with("/uploads/screenshots/"));
        assert!(first.ends_with(".webp"));
    }

    #[tokio::test]
    async fn failed_download_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path(), "/uploads", 5, "test").unwrap();
        let url = format!("{}/missing.png", server.uri());

        assert!(store.fetch_and_store(&url, ImageKind::Icon, None).await.is_none());
    }
}
