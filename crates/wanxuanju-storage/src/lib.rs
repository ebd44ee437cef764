//! Binary object storage: a named bucket backed by a local directory.
//!
//! Stands in for the managed storage service: non-overwriting uploads,
//! tolerant removal, public URLs, and HMAC-signed URLs with an expiry.
//! Each object carries a small sidecar with its content type so the
//! serving side can answer with correct headers.

use std::path::{Component, Path, PathBuf};

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

const META_SUFFIX: &str = ".meta.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    #[error("object already exists at {0}")]
    AlreadyExists(String),

    #[error("object not found at {0}")]
    NotFound(String),

    #[error("signed URL expired")]
    Expired,

    #[error("signed URL token mismatch")]
    BadSignature,

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object metadata unreadable: {0}")]
    Meta(#[from] serde_json::Error),
}

/// Headers recorded next to each object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub content_type: String,
    pub cache_control: String,
}

pub struct UploadOptions<'a> {
    pub content_type: &'a str,
    pub cache_control: &'a str,
    pub upsert: bool,
}

impl Default for UploadOptions<'_> {
    fn default() -> Self {
        Self {
            content_type: "application/octet-stream",
            cache_control: "3600",
            upsert: false,
        }
    }
}

pub struct BucketConfig {
    pub name: String,
    pub root: PathBuf,
    pub public_base_url: String,
    pub signing_secret: String,
}

/// A named bucket of objects addressed by slash-separated paths.
pub struct Bucket {
    name: String,
    root: PathBuf,
    public_base_url: String,
    signing_key: Vec<u8>,
}

impl Bucket {
    pub async fn new(config: BucketConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.root).await?;
        info!("Bucket '{}' rooted at {}", config.name, config.root.display());
        Ok(Self {
            name: config.name,
            root: config.root,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            signing_key: config.signing_secret.into_bytes(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write an object. With `upsert` off the write fails if the path is
    /// already taken, so a caller-generated path can never clobber another
    /// object silently.
    pub async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        options: &UploadOptions<'_>,
    ) -> Result<(), StorageError> {
        let dest = self.object_path(path)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut open = fs::OpenOptions::new();
        open.write(true);
        if options.upsert {
            open.create(true).truncate(true);
        } else {
            open.create_new(true);
        }

        let mut file = open.open(&dest).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                StorageError::AlreadyExists(path.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        file.write_all(bytes).await?;
        file.flush().await?;

        let meta = ObjectMeta {
            content_type: options.content_type.to_string(),
            cache_control: options.cache_control.to_string(),
        };
        fs::write(self.meta_path(&dest), serde_json::to_vec(&meta)?).await?;

        Ok(())
    }

    /// Read an object and its recorded headers.
    pub async fn read(&self, path: &str) -> Result<(Vec<u8>, ObjectMeta), StorageError> {
        let src = self.object_path(path)?;
        let bytes = match fs::read(&src).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let meta = match fs::read(self.meta_path(&src)).await {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(_) => ObjectMeta {
                content_type: "application/octet-stream".into(),
                cache_control: "3600".into(),
            },
        };
        Ok((bytes, meta))
    }

    pub async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let src = self.object_path(path)?;
        Ok(fs::try_exists(&src).await?)
    }

    /// Remove one or more objects. A missing object is not an error —
    /// removal is used from best-effort cleanup paths.
    pub async fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        for path in paths {
            let target = self.object_path(path)?;
            match fs::remove_file(&target).await {
                Ok(()) => {
                    let _ = fs::remove_file(self.meta_path(&target)).await;
                    info!("Removed object {}", path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("Object {} already gone", path);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Public URL for an object path. Pure derivation, no I/O.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.name, path)
    }

    /// Time-limited URL for an object. The object must exist.
    pub async fn signed_url(&self, path: &str, expires_in: u64) -> Result<String, StorageError> {
        if !self.exists(path).await? {
            return Err(StorageError::NotFound(path.to_string()));
        }
        let expires = chrono::Utc::now().timestamp() + expires_in as i64;
        let token = self.sign(path, expires);
        Ok(format!(
            "{}/{}/{}?expires={}&token={}",
            self.public_base_url, self.name, path, expires, token
        ))
    }

    /// Validate the token of a signed URL for the serving side.
    pub fn verify_signed(&self, path: &str, expires: i64, token: &str) -> Result<(), StorageError> {
        if expires < chrono::Utc::now().timestamp() {
            return Err(StorageError::Expired);
        }
        if self.sign(path, expires) != token {
            return Err(StorageError::BadSignature);
        }
        Ok(())
    }

    fn sign(&self, path: &str, expires: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{}:{}", path, expires).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Resolve an object path under the bucket root, rejecting anything
    /// that could escape it.
    fn object_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        if path.is_empty() || path.starts_with('/') || path.contains('\\') {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        let relative = Path::new(path);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(StorageError::InvalidPath(path.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }

    fn meta_path(&self, object: &Path) -> PathBuf {
        let mut name = object.as_os_str().to_os_string();
        name.push(META_SUFFIX);
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_bucket(dir: &Path) -> Bucket {
        Bucket::new(BucketConfig {
            name: "wanxuanju-files".into(),
            root: dir.to_path_buf(),
            public_base_url: "http://localhost:8080/storage".into(),
            signing_secret: "test-secret".into(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn upload_is_non_overwriting_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = test_bucket(dir.path()).await;

        let opts = UploadOptions::default();
        bucket.upload("a/b.txt", b"first", &opts).await.unwrap();

        let err = bucket.upload("a/b.txt", b"second", &opts).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        let (bytes, meta) = bucket.read("a/b.txt").await.unwrap();
        assert_eq!(bytes, b"first");
        assert_eq!(meta.content_type, "application/octet-stream");

        let upsert = UploadOptions {
            upsert: true,
            ..UploadOptions::default()
        };
        bucket.upload("a/b.txt", b"second", &upsert).await.unwrap();
        let (bytes, _) = bucket.read("a/b.txt").await.unwrap();
        assert_eq!(bytes, b"second");
    }

    #[tokio::test]
    async fn remove_tolerates_missing_objects() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = test_bucket(dir.path()).await;

        bucket
            .upload("x.bin", b"data", &UploadOptions::default())
            .await
            .unwrap();

        bucket
            .remove(&["x.bin".to_string(), "never-existed.bin".to_string()])
            .await
            .unwrap();
        assert!(!bucket.exists("x.bin").await.unwrap());
    }

    #[tokio::test]
    async fn traversal_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = test_bucket(dir.path()).await;

        for bad in ["../escape", "a/../../escape", "/absolute", ""] {
            let err = bucket
                .upload(bad, b"x", &UploadOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, StorageError::InvalidPath(_)), "path: {bad}");
        }
    }

    #[tokio::test]
    async fn signed_urls_verify_and_reject_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = test_bucket(dir.path()).await;

        bucket
            .upload("doc.pdf", b"pdf", &UploadOptions::default())
            .await
            .unwrap();

        let url = bucket.signed_url("doc.pdf", 3600).await.unwrap();
        let query = url.split_once('?').unwrap().1;
        let mut expires = 0i64;
        let mut token = String::new();
        for pair in query.split('&') {
            let (k, v) = pair.split_once('=').unwrap();
            match k {
                "expires" => expires = v.parse().unwrap(),
                "token" => token = v.to_string(),
                _ => {}
            }
        }

        bucket.verify_signed("doc.pdf", expires, &token).unwrap();

        let err = bucket
            .verify_signed("other.pdf", expires, &token)
            .unwrap_err();
        assert!(matches!(err, StorageError::BadSignature));

        let past = chrono::Utc::now().timestamp() - 10;
        let stale = bucket.sign("doc.pdf", past);
        let err = bucket.verify_signed("doc.pdf", past, &stale).unwrap_err();
        assert!(matches!(err, StorageError::Expired));
    }

    #[tokio::test]
    async fn signed_url_requires_object() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = test_bucket(dir.path()).await;

        let err = bucket.signed_url("missing.png", 60).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn public_url_shape() {
        let bucket = Bucket {
            name: "wanxuanju-files".into(),
            root: PathBuf::from("/tmp/unused"),
            public_base_url: "http://localhost:8080/storage".into(),
            signing_key: b"k".to_vec(),
        };
        assert_eq!(
            bucket.public_url("announcements/a1/file.png"),
            "http://localhost:8080/storage/wanxuanju-files/announcements/a1/file.png"
        );
    }
}
