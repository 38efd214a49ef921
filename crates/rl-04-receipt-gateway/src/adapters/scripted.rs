//! Scripted issuer for demos and tests.
//!
//! Answers from a queue of scripted results, falling back to synthesized
//! tokens once the queue is empty. Every request is recorded.

use crate::domain::IssueReceiptRequest;
use crate::error::{GatewayError, GatewayResult};
use crate::ports::ReceiptIssuer;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::Receipt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// In-process [`ReceiptIssuer`] with scripted answers.
#[derive(Debug)]
pub struct ScriptedIssuer {
    base_url: String,
    script: Mutex<VecDeque<GatewayResult<Receipt>>>,
    fallback_error: Option<GatewayError>,
    delay: Duration,
    calls: AtomicU64,
    requests: Mutex<Vec<IssueReceiptRequest>>,
}

impl ScriptedIssuer {
    /// Issuer that always succeeds with `tok_<n>` tokens.
    pub fn succeeding(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            script: Mutex::new(VecDeque::new()),
            fallback_error: None,
            delay: Duration::ZERO,
            calls: AtomicU64::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Issuer that always fails with `error`.
    pub fn failing(error: GatewayError) -> Self {
        let mut issuer = Self::succeeding("http://localhost");
        issuer.fallback_error = Some(error);
        issuer
    }

    /// Answer every call after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue one answer ahead of the default behavior.
    pub fn push(&self, result: GatewayResult<Receipt>) {
        self.script.lock().push_back(result);
    }

    /// Number of issue calls received.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<IssueReceiptRequest> {
        self.requests.lock().clone()
    }

    fn synthesize(&self, n: u64) -> Receipt {
        let token_id = format!("tok_{n}");
        let base = self.base_url.trim_end_matches('/');
        Receipt {
            public_url: format!("{base}/r/{token_id}"),
            qr_url: format!("{base}/r/{token_id}/qr.png"),
            preview_url: format!("{base}/r/{token_id}/preview"),
            token_id,
        }
    }
}

#[async_trait]
impl ReceiptIssuer for ScriptedIssuer {
    async fn issue(&self, request: &IssueReceiptRequest) -> GatewayResult<Receipt> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(scripted) = self.script.lock().pop_front() {
            return scripted;
        }
        match &self.fallback_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.synthesize(n)),
        }
    }
}
