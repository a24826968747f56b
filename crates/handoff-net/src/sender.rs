use std::time::{Duration, Instant};

use bytes::Bytes;
use handoff_core::{
    Mechanism, NetConfig, RoundError, RoundRunner, UploadReceipt, random_payload, sha256_hex,
};
use reqwest::Client;
use tracing::debug;

use crate::receiver::UPLOAD_PATH;

/// HTTP producer and benchmark round driver.
pub struct NetSender {
    client: Client,
    url: String,
    timeout: Duration,
}

impl NetSender {
    pub fn new(config: &NetConfig) -> Result<Self, RoundError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RoundError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: config.upload_url(UPLOAD_PATH),
            timeout: config.timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Upload `payload` and decode the receiver's receipt. Bounded by the
    /// client timeout; nothing is retried.
    pub async fn send_payload(&self, payload: Bytes) -> Result<UploadReceipt, RoundError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RoundError::HttpStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        serde_json::from_slice(&body)
            .map_err(|e| RoundError::Transport(format!("Invalid upload receipt: {}", e)))
    }

    fn transport_error(&self, e: reqwest::Error) -> RoundError {
        if e.is_timeout() {
            RoundError::Timeout(self.timeout)
        } else {
            RoundError::Transport(e.to_string())
        }
    }
}

/// Compare the receipt against what was sent. A mismatch is corruption,
/// not a network failure.
pub fn verify_receipt(expected_len: u64, expected_sha256: &str, receipt: &UploadReceipt) -> Result<(), RoundError> {
    if receipt.len != expected_len || receipt.sha256 != expected_sha256 {
        return Err(RoundError::ChecksumMismatch {
            expected_len,
            actual_len: receipt.len,
            expected_sha256: expected_sha256.to_string(),
            actual_sha256: receipt.sha256.clone(),
        });
    }
    Ok(())
}

impl RoundRunner for NetSender {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Net
    }

    async fn run_round(&mut self, size: usize, rep: u32) -> Result<Duration, RoundError> {
        let payload = random_payload(size);
        let expected_sha256 = sha256_hex(&payload);
        debug!("Round start: size={} rep={} url={}", size, rep, self.url);

        let started = Instant::now();
        let receipt = self.send_payload(payload).await?;
        verify_receipt(size as u64, &expected_sha256, &receipt)?;
        Ok(started.elapsed())
    }
}
