// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::error::NotifyError;

/// Delivers the run summary to the operator
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// A shared reference to a notifier
pub type SharedNotifier = Arc<dyn Notifier>;

/// Notifier that only writes the message to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn shared() -> SharedNotifier {
        Arc::new(Self)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(subject, "{body}");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<&'a str>,
    subject: &'a str,
    body: &'a str,
}

/// Notifier that POSTs the message as JSON to an HTTP endpoint
///
/// The payload is `{"to": ..., "subject": ..., "body": ...}`, suitable for
/// mail relays and chat webhooks.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: Url,
    recipient: Option<String>,
}

impl WebhookNotifier {
    pub fn new(endpoint: Url, recipient: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            recipient,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let message = WebhookMessage {
            to: self.recipient.as_deref(),
            subject,
            body,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }

        info!(endpoint = %self.endpoint, recipient = ?self.recipient, "notification sent");
        Ok(())
    }
}
