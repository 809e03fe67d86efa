use crate::models::job::JobErrorCode;

/// What the worker should do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Roll the job back to `queued` for a later attempt.
    Retry,
    /// Mark the job `failed` with this code.
    Permanent(JobErrorCode),
}

/// Pure retry decision function, decoupled from transport and persistence.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: i32,
}

impl RetryPolicy {
    pub fn new(max_attempts: i32) -> Self {
        Self { max_attempts }
    }

    /// Decide whether the attempt that just failed with `code` should be
    /// retried. `attempt_count` includes the failed attempt.
    ///
    /// Errors that require user intervention (bad key, exhausted quota,
    /// broken credential) are never retried; transient provider faults are
    /// retried until the attempt budget runs out.
    pub fn decide(&self, code: JobErrorCode, attempt_count: i32) -> RetryDecision {
        match code {
            JobErrorCode::InvalidKey
            | JobErrorCode::QuotaExceeded
            | JobErrorCode::CredentialError
            | JobErrorCode::InternalError => RetryDecision::Permanent(code),

            JobErrorCode::Timeout | JobErrorCode::ProviderError => {
                if attempt_count < self.max_attempts {
                    RetryDecision::Retry
                } else {
                    RetryDecision::Permanent(code)
                }
            }
        }
    }
}
