use serde::Deserialize;

/// Worker configuration, deserialized from the environment once at startup.
///
/// Components never query the environment themselves; they receive values
/// from this struct.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// AES-256-GCM key for credentials at rest (64 hex characters, 32 bytes)
    pub encryption_key: String,

    /// Speech provider API root
    #[serde(default = "default_tts_endpoint")]
    pub tts_endpoint: String,

    /// Identity recorded in job claims
    #[serde(default = "default_worker_id")]
    pub worker_id: String,

    /// Attempt budget for retryable provider failures
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,

    /// Age after which another worker may reclaim a held job
    #[serde(default = "default_claim_stale_secs")]
    pub claim_stale_secs: u64,

    /// Minimum delay before a requeued job is picked up again
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    /// Sleep between empty polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request timeout for provider calls
    #[serde(default = "default_synthesis_timeout_secs")]
    pub synthesis_timeout_secs: u64,

    /// Prometheus exporter bind address
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,

    /// R2 bucket name for audio artifacts
    pub r2_bucket: String,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: String,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: String,

    /// R2 endpoint URL
    pub r2_endpoint: String,
}

fn default_tts_endpoint() -> String {
    "https://texttospeech.googleapis.com".to_string()
}

fn default_worker_id() -> String {
    format!("worker-{}", std::process::id())
}

fn default_max_attempts() -> i32 {
    3
}

fn default_claim_stale_secs() -> u64 {
    300
}

fn default_retry_backoff_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_synthesis_timeout_secs() -> u64 {
    30
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: AppConfig = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Startup checks that must fail fast, before any job is processed.
    fn validate(&self) -> Result<(), ConfigError> {
        let key = &self.encryption_key;
        if key.len() != 64 || !key.bytes().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::MalformedEncryptionKey);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envy::Error),

    #[error("ENCRYPTION_KEY must be exactly 64 hexadecimal characters")]
    MalformedEncryptionKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(key: &str) -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/phrasecast".to_string(),
            encryption_key: key.to_string(),
            tts_endpoint: default_tts_endpoint(),
            worker_id: default_worker_id(),
            max_attempts: default_max_attempts(),
            claim_stale_secs: default_claim_stale_secs(),
            retry_backoff_secs: default_retry_backoff_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            synthesis_timeout_secs: default_synthesis_timeout_secs(),
            metrics_addr: default_metrics_addr(),
            r2_bucket: "audio".to_string(),
            r2_access_key: "ak".to_string(),
            r2_secret_key: "sk".to_string(),
            r2_endpoint: "https://example.r2.cloudflarestorage.com".to_string(),
        }
    }

    #[test]
    fn accepts_a_64_char_hex_key() {
        let key = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
        assert!(config_with_key(key).validate().is_ok());
    }

    #[test]
    fn rejects_keys_of_the_wrong_length() {
        assert!(config_with_key("abc123").validate().is_err());
        let short = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcde";
        assert!(config_with_key(short).validate().is_err());
        let long = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0";
        assert!(config_with_key(long).validate().is_err());
    }

    #[test]
    fn rejects_non_hex_characters() {
        let key = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdeg";
        assert!(config_with_key(key).validate().is_err());
    }
}
