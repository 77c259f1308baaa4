//! Templated customer and operator email.
//!
//! Each event kind has a styled default. Merchants may override the subject and body per
//! kind; overrides go through `{{placeholder}}` substitution before delivery.

mod relay;
mod templates;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::repository::{RepositoryError, TemplateRepository};

pub use relay::HttpEmailSender;
pub use templates::{default_message, html_from_text, render_placeholders};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmation,
    Approved,
    Rejected,
    ManualFulfillment,
}

impl NotificationKind {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationKind::Confirmation => "confirmation",
            NotificationKind::Approved => "approved",
            NotificationKind::Rejected => "rejected",
            NotificationKind::ManualFulfillment => "manual_fulfillment",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for NotificationKind {
    type Err = UnknownNotificationKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "confirmation" => Ok(Self::Confirmation),
            "approved" | "approval" => Ok(Self::Approved),
            "rejected" | "rejection" => Ok(Self::Rejected),
            "manual_fulfillment" => Ok(Self::ManualFulfillment),
            _ => Err(UnknownNotificationKind(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown notification kind '{0}'")]
pub struct UnknownNotificationKind(pub String);

/// Merchant override for one notification kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Values available to templates. Placeholder names are the camelCase keys in [`lookup`].
///
/// [`lookup`]: TemplateVariables::lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVariables {
    pub content_type: Option<String>,
    pub status: Option<String>,
    pub additional_message: Option<String>,
    pub discount_code: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub reward_value: Option<String>,
    pub product_name: Option<String>,
    pub shop_name: Option<String>,
    pub submission_number: Option<String>,
    pub paypal_email: Option<String>,
    pub job_title: Option<String>,
    pub expires_on: Option<String>,
}

impl TemplateVariables {
    pub fn lookup(&self, name: &str) -> Option<&str> {
        let value = match name {
            "type" => &self.content_type,
            "status" => &self.status,
            "additionalMessage" => &self.additional_message,
            "discountCode" => &self.discount_code,
            "customerName" => &self.customer_name,
            "customerEmail" => &self.customer_email,
            "rewardValue" => &self.reward_value,
            "productName" => &self.product_name,
            "shopName" => &self.shop_name,
            "submissionNumber" => &self.submission_number,
            "paypalEmail" => &self.paypal_email,
            "jobTitle" => &self.job_title,
            "expiresOn" => &self.expires_on,
            _ => return None,
        };
        value.as_deref()
    }

    fn greeting_name(&self) -> &str {
        self.customer_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("there")
    }

    fn shop(&self) -> &str {
        self.shop_name.as_deref().unwrap_or("our store")
    }

    fn content(&self) -> &str {
        self.content_type.as_deref().unwrap_or("content")
    }
}

/// Outbound email transport.
pub trait EmailSender: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email transport unavailable: {0}")]
    Transport(String),
    #[error("email relay rejected the message with status {status}")]
    Rejected { status: u16 },
    #[error("email runtime unavailable: {0}")]
    Runtime(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("could not load email template: {0}")]
    Template(#[from] RepositoryError),
    #[error(transparent)]
    Delivery(#[from] EmailError),
}

/// Composes messages from merchant or default templates and hands them to the sender.
pub struct NotificationDispatcher {
    templates: Arc<dyn TemplateRepository>,
    sender: Arc<dyn EmailSender>,
}

impl NotificationDispatcher {
    pub fn new(templates: Arc<dyn TemplateRepository>, sender: Arc<dyn EmailSender>) -> Self {
        Self { templates, sender }
    }

    pub fn compose(
        &self,
        shop_domain: &str,
        kind: NotificationKind,
        to: &str,
        variables: &TemplateVariables,
    ) -> Result<EmailMessage, NotificationError> {
        let custom = self.templates.fetch_template(shop_domain, kind)?;
        let default = default_message(kind, variables);
        let custom = custom.unwrap_or_default();

        let subject = custom
            .subject
            .filter(|subject| !subject.trim().is_empty())
            .map(|subject| render_placeholders(&subject, variables))
            .unwrap_or(default.subject);

        let (text, html) = match custom.body.filter(|body| !body.trim().is_empty()) {
            Some(body) => {
                let text = render_placeholders(&body, variables);
                let html = html_from_text(&text);
                (text, html)
            }
            None => (default.text, default.html),
        };

        Ok(EmailMessage {
            to: to.to_string(),
            subject,
            text,
            html,
        })
    }

    pub fn dispatch(
        &self,
        shop_domain: &str,
        kind: NotificationKind,
        to: &str,
        variables: &TemplateVariables,
    ) -> Result<EmailMessage, NotificationError> {
        let message = self.compose(shop_domain, kind, to, variables)?;
        self.sender.send(&message)?;
        Ok(message)
    }
}

impl fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDispatcher").finish_non_exhaustive()
    }
}
