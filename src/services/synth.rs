use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::models::job::{JobErrorCode, Phrase};

/// Trait for speech synthesis providers.
///
/// One request per call, no retries here; retry/backoff belongs to the
/// retry policy and the worker. The API key is a call parameter because it
/// is per-user, decrypted just before use.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize one phrase, returning raw audio bytes.
    async fn synthesize(&self, api_key: &str, phrase: &Phrase) -> Result<Vec<u8>, SynthesisError>;
}

/// Client for the Google Cloud Text-to-Speech REST API.
pub struct GoogleTtsClient {
    http: Client,
    endpoint: String,
}

const AUDIO_ENCODING: &str = "MP3";
const SAMPLE_RATE_HERTZ: u32 = 24_000;
const SPEAKING_RATE: f32 = 1.0;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    sample_rate_hertz: u32,
    speaking_rate: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

impl GoogleTtsClient {
    /// `endpoint` is the API root, e.g. `https://texttospeech.googleapis.com`.
    pub fn new(endpoint: String, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http, endpoint })
    }

    fn request_body(phrase: &Phrase) -> SynthesizeRequest<'_> {
        SynthesizeRequest {
            input: SynthesisInput { text: &phrase.text },
            voice: VoiceSelection {
                language_code: &phrase.language_code,
                name: &phrase.voice_id,
            },
            audio_config: AudioConfig {
                audio_encoding: AUDIO_ENCODING,
                sample_rate_hertz: SAMPLE_RATE_HERTZ,
                speaking_rate: SPEAKING_RATE,
            },
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTtsClient {
    async fn synthesize(&self, api_key: &str, phrase: &Phrase) -> Result<Vec<u8>, SynthesisError> {
        let url = format!("{}/v1/text:synthesize", self.endpoint);

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&Self::request_body(phrase))
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            // Error bodies are logged for operators, never parsed for
            // control flow: the status code alone drives classification.
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, detail = %detail, "provider rejected synthesis request");
            return Err(classify_status(status));
        }

        let parsed: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::Provider(format!("malformed response: {e}")))?;

        base64::engine::general_purpose::STANDARD
            .decode(&parsed.audio_content)
            .map_err(|e| SynthesisError::Provider(format!("invalid audio payload: {e}")))
    }
}

fn classify_status(status: StatusCode) -> SynthesisError {
    match status.as_u16() {
        400 => SynthesisError::InvalidKey,
        402 => SynthesisError::QuotaExceeded,
        504 => SynthesisError::Timeout,
        code => SynthesisError::Provider(format!("unexpected status {code}")),
    }
}

fn classify_transport_error(err: reqwest::Error) -> SynthesisError {
    if err.is_timeout() {
        SynthesisError::Timeout
    } else {
        SynthesisError::Provider(err.to_string())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SynthesisError {
    #[error("provider rejected the API key")]
    InvalidKey,

    #[error("provider quota exhausted")]
    QuotaExceeded,

    #[error("provider request timed out")]
    Timeout,

    #[error("provider request failed: {0}")]
    Provider(String),
}

impl SynthesisError {
    /// The job error code this failure maps to.
    pub fn error_code(&self) -> JobErrorCode {
        match self {
            SynthesisError::InvalidKey => JobErrorCode::InvalidKey,
            SynthesisError::QuotaExceeded => JobErrorCode::QuotaExceeded,
            SynthesisError::Timeout => JobErrorCode::Timeout,
            SynthesisError::Provider(_) => JobErrorCode::ProviderError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_fixed_taxonomy() {
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST),
            SynthesisError::InvalidKey
        ));
        assert!(matches!(
            classify_status(StatusCode::PAYMENT_REQUIRED),
            SynthesisError::QuotaExceeded
        ));
        assert!(matches!(
            classify_status(StatusCode::GATEWAY_TIMEOUT),
            SynthesisError::Timeout
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            SynthesisError::Provider(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            SynthesisError::Provider(_)
        ));
    }

    #[test]
    fn synthesis_errors_map_to_job_error_codes() {
        assert_eq!(SynthesisError::InvalidKey.error_code(), JobErrorCode::InvalidKey);
        assert_eq!(SynthesisError::QuotaExceeded.error_code(), JobErrorCode::QuotaExceeded);
        assert_eq!(SynthesisError::Timeout.error_code(), JobErrorCode::Timeout);
        assert_eq!(
            SynthesisError::Provider("boom".into()).error_code(),
            JobErrorCode::ProviderError
        );
    }

    #[test]
    fn request_body_matches_provider_wire_contract() {
        let phrase = Phrase {
            text: "good morning".to_string(),
            voice_id: "en-US-Neural2-C".to_string(),
            language_code: "en-US".to_string(),
        };

        let body = serde_json::to_value(GoogleTtsClient::request_body(&phrase)).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "input": { "text": "good morning" },
                "voice": { "languageCode": "en-US", "name": "en-US-Neural2-C" },
                "audioConfig": {
                    "audioEncoding": "MP3",
                    "sampleRateHertz": 24000,
                    "speakingRate": 1.0
                }
            })
        );
    }
}
