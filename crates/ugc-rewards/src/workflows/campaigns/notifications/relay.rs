use serde::Serialize;
use tokio::runtime::Handle;

use super::{EmailError, EmailMessage, EmailSender};
use crate::config::EmailRelayConfig;

/// Delivers mail through an HTTP relay that accepts `{from, to, subject, text, html}`.
pub struct HttpEmailSender {
    http: reqwest::Client,
    runtime: Handle,
    endpoint: String,
    api_key: String,
    from: String,
}

#[derive(Debug, Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

impl HttpEmailSender {
    pub fn new(config: &EmailRelayConfig, from: &str, runtime: Handle) -> Self {
        Self {
            http: reqwest::Client::new(),
            runtime,
            endpoint: config.url.clone(),
            api_key: config.api_key.clone(),
            from: from.to_string(),
        }
    }
}

impl std::fmt::Debug for HttpEmailSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmailSender")
            .field("endpoint", &self.endpoint)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

impl EmailSender for HttpEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let payload = RelayPayload {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
            html: &message.html,
        };

        let status = self.runtime.block_on(async {
            self.http
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await
                .map(|response| response.status())
                .map_err(|err| EmailError::Transport(err.to_string()))
        })?;

        if status.is_success() {
            Ok(())
        } else {
            Err(EmailError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
