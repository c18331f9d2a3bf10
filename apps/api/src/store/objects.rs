//! Object store contract for résumé files, with the S3 / MinIO implementation.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object '{0}' not found")]
    NotFound(String),

    #[error("object store error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub url: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, ObjectStoreError>;

    async fn delete(&self, path: &str) -> Result<(), ObjectStoreError>;

    async fn fetch(&self, path: &str) -> Result<Bytes, ObjectStoreError>;
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    endpoint: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, endpoint: String) -> Self {
        Self {
            client,
            bucket,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, path)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, ObjectStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(format!("S3 upload failed: {e}")))?;

        info!("Uploaded s3://{}/{}", self.bucket, path);
        Ok(StoredObject {
            path: path.to_string(),
            url: self.url_for(path),
        })
    }

    async fn delete(&self, path: &str) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(format!("S3 delete failed: {e}")))?;

        info!("Deleted s3://{}/{}", self.bucket, path);
        Ok(())
    }

    async fn fetch(&self, path: &str) -> Result<Bytes, ObjectStoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map_or(false, |se| se.is_no_such_key()) {
                    ObjectStoreError::NotFound(path.to_string())
                } else {
                    ObjectStoreError::Backend(format!("S3 download failed: {e}"))
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::Backend(format!("S3 body read failed: {e}")))?;
        Ok(data.into_bytes())
    }
}
