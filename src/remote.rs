//! Removal-service client — submits `{image, mask}` and reports the
//! acknowledgment or failure.
//!
//! The service consumes the source image by reference (an already-uploaded
//! URL) and the mask as a base64 data URL at full natural resolution. This
//! subsystem does not poll for job completion; a sibling surface does that
//! with the returned event id. Submission failure never touches local mask
//! state, so the user can retry without redrawing.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::{log_err, log_info};

/// Request body for the remove-object endpoint.
#[derive(Debug, Serialize)]
pub struct RemoveObjectRequest {
    /// Source image reference (already-uploaded URL).
    pub image: String,
    /// Mask as a base64 data URL.
    pub mask: String,
}

/// Service response envelope.
#[derive(Debug, Deserialize)]
struct RemoveObjectResponse {
    code: Option<i64>,
    msg: Option<String>,
    data: Option<RemovalAck>,
}

/// Acknowledgment for a submitted removal job.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemovalAck {
    pub event_id: Option<String>,
}

/// Error type for removal-service submission.
#[derive(Debug)]
pub enum RemoteError {
    /// Network-level failure (DNS, connect, timeout).
    Transport(String),
    /// Non-success HTTP status.
    Status(u16),
    /// The service answered but rejected the job.
    Api { code: i64, msg: String },
    /// The response body was not the expected envelope.
    Decode(String),
}

impl RemoteError {
    /// Whether the shell should offer a retry without further changes.
    /// Local mask state is intact in every case.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport(_) => true,
            RemoteError::Status(code) => *code >= 500 || *code == 429,
            RemoteError::Api { .. } => false,
            RemoteError::Decode(_) => false,
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Transport(e) => write!(f, "Network error: {}", e),
            RemoteError::Status(code) => write!(f, "Removal service returned HTTP {}", code),
            RemoteError::Api { code, msg } => {
                write!(f, "Removal service rejected the job (code {}): {}", code, msg)
            }
            RemoteError::Decode(e) => write!(f, "Unexpected removal service response: {}", e),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Blocking client for the object-removal endpoint.
pub struct RemovalClient {
    endpoint: String,
    agent: ureq::Agent,
}

impl RemovalClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            agent: ureq::AgentBuilder::new()
                .timeout(std::time::Duration::from_secs(30))
                .build(),
        }
    }

    /// Encode mask bytes as the data URL the service expects.
    pub fn mask_data_url(mask_bytes: &[u8], mime: &str) -> String {
        format!("data:{};base64,{}", mime, BASE64.encode(mask_bytes))
    }

    /// Submit an image reference plus encoded mask. Returns the job
    /// acknowledgment, or a classified error.
    pub fn submit(
        &self,
        image_ref: &str,
        mask_bytes: &[u8],
        mask_mime: &str,
    ) -> Result<RemovalAck, RemoteError> {
        let body = RemoveObjectRequest {
            image: image_ref.to_string(),
            mask: Self::mask_data_url(mask_bytes, mask_mime),
        };

        let response = self
            .agent
            .post(&self.endpoint)
            .send_json(&body)
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => RemoteError::Status(code),
                ureq::Error::Transport(t) => RemoteError::Transport(t.to_string()),
            })?;

        let envelope: RemoveObjectResponse = response
            .into_json()
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        match envelope.code {
            Some(code) if code != 0 => {
                let msg = envelope.msg.unwrap_or_default();
                log_err!("Removal submission rejected: code {} msg {:?}", code, msg);
                Err(RemoteError::Api { code, msg })
            }
            _ => {
                let ack = envelope.data.unwrap_or(RemovalAck { event_id: None });
                log_info!("Removal job accepted: event_id {:?}", ack.event_id);
                Ok(ack)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_data_url_carries_mime_and_base64_payload() {
        let url = RemovalClient::mask_data_url(&[0xff, 0xd8, 0xff], "image/jpeg");
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert!(url.ends_with(&BASE64.encode([0xffu8, 0xd8, 0xff])));
    }

    #[test]
    fn retry_classification() {
        assert!(RemoteError::Transport("timed out".into()).is_retryable());
        assert!(RemoteError::Status(503).is_retryable());
        assert!(RemoteError::Status(429).is_retryable());
        assert!(!RemoteError::Status(400).is_retryable());
        assert!(
            !RemoteError::Api {
                code: 1,
                msg: "bad mask".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn envelope_decodes_with_missing_fields() {
        let env: RemoveObjectResponse = serde_json::from_str("{}").unwrap();
        assert!(env.code.is_none());
        assert!(env.data.is_none());

        let env: RemoveObjectResponse =
            serde_json::from_str(r#"{"code":0,"data":{"event_id":"abc"}}"#).unwrap();
        assert_eq!(env.data.unwrap().event_id.as_deref(), Some("abc"));
    }
}
