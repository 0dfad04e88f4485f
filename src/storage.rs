use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// StorageError
///
/// Failures of the media object store. The feed core only ever treats these as
/// internal failures; their text is logged, never returned to a client.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("upload of `{key}` failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("delete of `{key}` failed: {reason}")]
    Delete { key: String, reason: String },

    #[error("object key `{0}` is empty after sanitizing")]
    InvalidKey(String),
}

// 1. StorageService Contract
/// StorageService
///
/// The media collaborator: stores uploaded bytes under a key, deletes them again and
/// turns a stored key into a public URL. Handlers and services only see this trait,
/// so tests run against `MockStorageService` without any network.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the configured bucket if missing. Only called in `Env::Local` (MinIO).
    async fn ensure_bucket_exists(&self);

    /// Stores `bytes` under `name` and returns the stored path.
    async fn save(&self, bytes: Vec<u8>, name: &str, content_type: &str) -> Result<String, StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Public URL a client can fetch the object from.
    fn url(&self, path: &str) -> String;
}

// 2. The Real Implementation (S3/MinIO/Supabase)
/// S3StorageClient
///
/// `aws-sdk-s3` backed store. Works against a local MinIO container and the Supabase
/// Storage S3 gateway alike; both need path-style addressing.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_base_url: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_base_url: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // MinIO and Supabase both reject virtual-hosted bucket addressing.
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket on an existing bucket fails harmlessly.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!("create_bucket for {}: {:?}", self.bucket_name, e);
        }
    }

    async fn save(&self, bytes: Vec<u8>, name: &str, content_type: &str) -> Result<String, StorageError> {
        let key = sanitize_key(name)?;
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.clone(),
                reason: e.to_string(),
            })?;
        Ok(key)
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let key = sanitize_key(path)?;
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(|e| StorageError::Delete {
                key,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path)
    }
}

/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a caller-supplied name can never escape the
/// bucket prefix it was meant for.
pub fn sanitize_key(key: &str) -> Result<String, StorageError> {
    let cleaned = key
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");
    if cleaned.is_empty() {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(cleaned)
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// Keeps objects in a shared map. With `should_fail` every write and delete fails.
#[derive(Clone, Default)]
pub struct MockStorageService {
    pub should_fail: bool,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.objects.lock().await.contains_key(path)
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn save(&self, bytes: Vec<u8>, name: &str, _content_type: &str) -> Result<String, StorageError> {
        let key = sanitize_key(name)?;
        if self.should_fail {
            return Err(StorageError::Upload {
                key,
                reason: "simulated failure".into(),
            });
        }
        self.objects.lock().await.insert(key.clone(), bytes);
        Ok(key)
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Delete {
                key: path.to_string(),
                reason: "simulated failure".into(),
            });
        }
        self.objects.lock().await.remove(path);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("http://localhost:9000/mock-bucket/{}", path)
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
