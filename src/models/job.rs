use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a synthesis job in the async queue.
///
/// `processing -> queued` is the only backward transition, used when a
/// retryable provider failure rolls the job back for a later attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
}

/// Terminal error code recorded on a failed job.
///
/// This is the only failure detail surfaced to users; raw provider bodies
/// and crypto diagnostics stay in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobErrorCode {
    InvalidKey,
    QuotaExceeded,
    Timeout,
    ProviderError,
    CredentialError,
    InternalError,
}

/// One unit of text to synthesize, with its target voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phrase {
    pub text: String,
    pub voice_id: String,
    pub language_code: String,
}

/// A speech synthesis job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub user_id: Uuid,
    pub phrases: Vec<Phrase>,
    pub status: JobStatus,
    pub error_code: Option<JobErrorCode>,
    pub attempt_count: i32,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
