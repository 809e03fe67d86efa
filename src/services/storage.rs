use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use uuid::Uuid;

/// Storage collaborator for synthesized audio artifacts.
///
/// The worker writes one object per phrase, keyed by job and position, and
/// only after every phrase of the job has synthesized.
#[async_trait]
pub trait AudioStore: Send + Sync {
    async fn store_result(
        &self,
        job_id: Uuid,
        phrase_index: usize,
        audio: &[u8],
    ) -> Result<(), StorageError>;
}

/// Audio artifact store backed by S3-compatible object storage (R2).
pub struct R2AudioStore {
    bucket: Box<Bucket>,
}

impl R2AudioStore {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }
}

#[async_trait]
impl AudioStore for R2AudioStore {
    async fn store_result(
        &self,
        job_id: Uuid,
        phrase_index: usize,
        audio: &[u8],
    ) -> Result<(), StorageError> {
        let key = format!("jobs/{job_id}/{phrase_index}.mp3");
        self.bucket
            .put_object_with_content_type(&key, audio, "audio/mpeg")
            .await
            .map_err(StorageError::S3)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}
