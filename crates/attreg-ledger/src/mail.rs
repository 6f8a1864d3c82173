//! # Mail Service Interface
//!
//! Every successful status change sends one templated mail to the
//! attendee. The template key is the new status wire string; the mail
//! service owns the template text and language selection.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A templated mail request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailRequest {
    /// Template key, e.g. `cancelled`.
    pub template: String,
    /// Recipient address.
    pub email: String,
    /// Substitution variables for the template.
    pub variables: BTreeMap<String, String>,
}

impl MailRequest {
    /// A request with no variables.
    pub fn new(template: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            email: email.into(),
            variables: BTreeMap::new(),
        }
    }

    /// Add one substitution variable.
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

/// Errors from the mail service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    /// Service unreachable or failed to accept the request.
    #[error("mail service unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },

    /// The call did not complete within its budget.
    #[error("mail service timed out after {elapsed_ms}ms")]
    Timeout {
        /// Budget that elapsed.
        elapsed_ms: u64,
    },
}

/// Contract for sending templated notifications.
#[async_trait]
pub trait MailService: Send + Sync {
    /// Render `request.template` with its variables and send it.
    async fn send_templated(&self, request: MailRequest) -> Result<(), MailError>;

    /// Human-readable name of this implementation.
    fn adapter_name(&self) -> &str;
}

#[derive(Debug, Default)]
struct Outbox {
    sent: Vec<MailRequest>,
    fail_next: Option<String>,
    latency: Option<Duration>,
}

/// Mail service that records requests instead of sending them.
#[derive(Debug, Default)]
pub struct InMemoryMailService {
    outbox: Mutex<Outbox>,
}

impl InMemoryMailService {
    /// An empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests accepted so far, oldest first.
    pub fn sent(&self) -> Vec<MailRequest> {
        self.outbox.lock().sent.clone()
    }

    /// Forget accepted requests.
    pub fn clear(&self) {
        self.outbox.lock().sent.clear();
    }

    /// Make the next send fail with [`MailError::Unavailable`].
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.outbox.lock().fail_next = Some(reason.into());
    }

    /// Delay every send by `latency`. `None` removes the delay.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.outbox.lock().latency = latency;
    }
}

#[async_trait]
impl MailService for InMemoryMailService {
    async fn send_templated(&self, request: MailRequest) -> Result<(), MailError> {
        let latency = self.outbox.lock().latency;
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        let mut outbox = self.outbox.lock();
        if let Some(reason) = outbox.fail_next.take() {
            return Err(MailError::Unavailable { reason });
        }
        tracing::debug!(template = %request.template, email = %request.email, "mail accepted");
        outbox.sent.push(request);
        Ok(())
    }

    fn adapter_name(&self) -> &str {
        "InMemoryMailService"
    }
}
