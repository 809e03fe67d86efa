use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::db::job_store::{JobStore, StoreError};
use crate::models::job::{Job, JobErrorCode, JobStatus};
use crate::services::retry::{RetryDecision, RetryPolicy};
use crate::services::storage::{AudioStore, StorageError};
use crate::services::synth::SpeechSynthesizer;
use crate::services::vault::CredentialVault;

/// Result of a single `process_job` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every phrase synthesized; artifacts stored; job is terminal.
    Succeeded,
    /// Job is terminal with the recorded error code.
    Failed(JobErrorCode),
    /// Retryable failure; the job went back to `queued` for a later attempt.
    Requeued,
    /// Another worker holds a live claim on this job; nothing was done.
    AlreadyClaimed,
}

/// Orchestrates one job through its full lifecycle: claim, decrypt the
/// owner's credential, synthesize each phrase in order, persist artifacts
/// or errors, and release the claim.
///
/// The worker is the sole writer of job status and lock fields while it
/// holds a claim. Phrases are processed sequentially: artifact ordering is
/// significant and provider rate limits favor serialization.
pub struct JobWorker {
    store: Arc<dyn JobStore>,
    audio: Arc<dyn AudioStore>,
    vault: Arc<CredentialVault>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    policy: RetryPolicy,
    worker_id: String,
    stale_threshold: Duration,
}

impl JobWorker {
    pub fn new(
        store: Arc<dyn JobStore>,
        audio: Arc<dyn AudioStore>,
        vault: Arc<CredentialVault>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        policy: RetryPolicy,
        worker_id: String,
        stale_threshold: Duration,
    ) -> Self {
        Self {
            store,
            audio,
            vault,
            synthesizer,
            policy,
            worker_id,
            stale_threshold,
        }
    }

    /// Drive one job to a terminal state, a requeue, or a benign no-op.
    ///
    /// An `Err` here means even the failure bookkeeping could not be
    /// written; the claim's staleness threshold makes the job reclaimable.
    pub async fn process_job(&self, job_id: Uuid) -> Result<JobOutcome, WorkerError> {
        let Some(job) = self
            .store
            .claim_job(job_id, &self.worker_id, self.stale_threshold)
            .await?
        else {
            tracing::debug!(job_id = %job_id, "job already claimed, skipping");
            return Ok(JobOutcome::AlreadyClaimed);
        };

        tracing::info!(
            job_id = %job.id,
            user_id = %job.user_id,
            attempt = job.attempt_count,
            phrases = job.phrases.len(),
            "processing synthesis job"
        );

        let outcome = match self.run_claimed(&job).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(job_id = %job.id, error = %err, "unexpected fault while processing job");
                self.store
                    .update_job_status(
                        job.id,
                        JobStatus::Failed,
                        Some(JobErrorCode::InternalError),
                        job.attempt_count,
                    )
                    .await?;
                JobOutcome::Failed(JobErrorCode::InternalError)
            }
        };

        match outcome {
            JobOutcome::Succeeded => metrics::counter!("synthesis_jobs_succeeded").increment(1),
            JobOutcome::Failed(_) => metrics::counter!("synthesis_jobs_failed").increment(1),
            JobOutcome::Requeued => metrics::counter!("synthesis_jobs_requeued").increment(1),
            JobOutcome::AlreadyClaimed => {}
        }

        Ok(outcome)
    }

    async fn run_claimed(&self, job: &Job) -> Result<JobOutcome, WorkerError> {
        let Some(credential) = self.store.get_credential(job.user_id).await? else {
            tracing::warn!(job_id = %job.id, "no stored credential for job owner");
            return self.fail(job, JobErrorCode::CredentialError).await;
        };

        // Decryption failure is terminal regardless of attempt count; a
        // broken secret requires user intervention.
        let api_key = match self.vault.decrypt(
            &credential.ciphertext,
            &credential.iv,
            &credential.auth_tag,
        ) {
            Ok(plaintext) => match String::from_utf8(plaintext) {
                Ok(key) => key,
                Err(_) => {
                    tracing::warn!(job_id = %job.id, "decrypted credential is not valid UTF-8");
                    return self.fail(job, JobErrorCode::CredentialError).await;
                }
            },
            Err(err) => {
                tracing::warn!(job_id = %job.id, error = %err, "credential failed authenticated decryption");
                return self.fail(job, JobErrorCode::CredentialError).await;
            }
        };

        // Artifacts are buffered until every phrase has synthesized; no
        // partial audio is exposed before the job reaches a terminal state.
        let mut artifacts: Vec<Vec<u8>> = Vec::with_capacity(job.phrases.len());
        for (index, phrase) in job.phrases.iter().enumerate() {
            let started = std::time::Instant::now();
            match self.synthesizer.synthesize(&api_key, phrase).await {
                Ok(audio) => {
                    metrics::histogram!("synthesis_phrase_seconds")
                        .record(started.elapsed().as_secs_f64());
                    artifacts.push(audio);
                }
                Err(err) => {
                    let code = err.error_code();
                    tracing::warn!(
                        job_id = %job.id,
                        phrase_index = index,
                        error = %err,
                        code = %code,
                        "phrase synthesis failed"
                    );
                    return match self.policy.decide(code, job.attempt_count) {
                        RetryDecision::Retry => {
                            // The attempt counter was already incremented
                            // at claim time.
                            self.store
                                .update_job_status(
                                    job.id,
                                    JobStatus::Queued,
                                    None,
                                    job.attempt_count,
                                )
                                .await?;
                            tracing::info!(job_id = %job.id, attempt = job.attempt_count, "job requeued for retry");
                            Ok(JobOutcome::Requeued)
                        }
                        RetryDecision::Permanent(code) => self.fail(job, code).await,
                    };
                }
            }
        }

        for (index, audio) in artifacts.iter().enumerate() {
            self.audio.store_result(job.id, index, audio).await?;
        }

        self.store
            .update_job_status(job.id, JobStatus::Succeeded, None, job.attempt_count)
            .await?;

        tracing::info!(job_id = %job.id, phrases = job.phrases.len(), "job succeeded");
        Ok(JobOutcome::Succeeded)
    }

    async fn fail(&self, job: &Job, code: JobErrorCode) -> Result<JobOutcome, WorkerError> {
        self.store
            .update_job_status(job.id, JobStatus::Failed, Some(code), job.attempt_count)
            .await?;
        tracing::info!(job_id = %job.id, code = %code, "job failed");
        Ok(JobOutcome::Failed(code))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
