use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Identifier wrapper for merchant jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

/// Identifier wrapper for customer submissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

/// Identifier wrapper for reward ledger rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RewardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of content a job asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Photo,
    Video,
    Review,
}

impl ContentType {
    pub const fn label(self) -> &'static str {
        match self {
            ContentType::Photo => "photo",
            ContentType::Video => "video",
            ContentType::Review => "review",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Paused,
    Completed,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
        }
    }
}

/// Flat reward discriminant as merchants and the ledger see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    Percentage,
    Fixed,
    Product,
    GiftCard,
    Cash,
    None,
}

impl RewardType {
    pub const fn label(self) -> &'static str {
        match self {
            RewardType::Percentage => "percentage",
            RewardType::Fixed => "fixed",
            RewardType::Product => "product",
            RewardType::GiftCard => "giftcard",
            RewardType::Cash => "cash",
            RewardType::None => "none",
        }
    }

    /// Rewards that carry a platform discount code once minted.
    pub const fn is_code_bearing(self) -> bool {
        matches!(
            self,
            RewardType::Percentage | RewardType::Fixed | RewardType::Product
        )
    }
}

/// Catalog product handed out by free-product jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardProduct {
    pub product_id: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl RewardProduct {
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.handle.as_deref())
            .unwrap_or("your free product")
    }
}

/// Validated reward terms. Each variant carries exactly what its fulfillment branch needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reward_type", rename_all = "lowercase")]
pub enum RewardTerms {
    Percentage {
        percent: Decimal,
    },
    #[serde(rename = "fixed")]
    FixedAmount {
        amount: Decimal,
    },
    #[serde(rename = "product")]
    FreeProduct {
        product: RewardProduct,
    },
    #[serde(rename = "giftcard")]
    GiftCard {
        amount: Decimal,
    },
    Cash {
        amount: Decimal,
    },
    None,
}

impl RewardTerms {
    pub fn reward_type(&self) -> RewardType {
        match self {
            RewardTerms::Percentage { .. } => RewardType::Percentage,
            RewardTerms::FixedAmount { .. } => RewardType::Fixed,
            RewardTerms::FreeProduct { .. } => RewardType::Product,
            RewardTerms::GiftCard { .. } => RewardType::GiftCard,
            RewardTerms::Cash { .. } => RewardType::Cash,
            RewardTerms::None => RewardType::None,
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            RewardTerms::Percentage { percent } => Some(*percent),
            RewardTerms::FixedAmount { amount }
            | RewardTerms::GiftCard { amount }
            | RewardTerms::Cash { amount } => Some(*amount),
            RewardTerms::FreeProduct { product } => product.price,
            RewardTerms::None => None,
        }
    }

    /// Human readable value used in email copy.
    pub fn describe(&self) -> String {
        match self {
            RewardTerms::Percentage { percent } => format!("{}% off", percent.normalize()),
            RewardTerms::FixedAmount { amount } => format!("${:.2} off", amount),
            RewardTerms::FreeProduct { product } => format!("a free {}", product.display_name()),
            RewardTerms::GiftCard { amount } => format!("a ${:.2} gift card", amount),
            RewardTerms::Cash { amount } => format!("${:.2} cash", amount),
            RewardTerms::None => "no reward".to_string(),
        }
    }
}

/// Merchant job with reward terms and capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub shop_domain: String,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub content_type: ContentType,
    pub status: JobStatus,
    pub reward: RewardTerms,
    pub spots_available: u32,
    pub spots_filled: u32,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_full(&self) -> bool {
        self.spots_filled >= self.spots_available
    }

    pub fn remaining_spots(&self) -> u32 {
        self.spots_available.saturating_sub(self.spots_filled)
    }

    /// Active, not full, and not past its deadline.
    pub fn accepts_submissions(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Active
            && !self.is_full()
            && self.deadline.map_or(true, |deadline| deadline > now)
    }
}

/// Loosely typed job request as submitted by the admin UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: String,
    pub content_type: ContentType,
    pub reward_type: RewardType,
    #[serde(default)]
    pub reward_value: Option<Decimal>,
    #[serde(default)]
    pub reward_product: Option<RewardProduct>,
    #[serde(default)]
    pub reward_giftcard_amount: Option<Decimal>,
    #[serde(default = "default_spots")]
    pub spots_available: u32,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

fn default_spots() -> u32 {
    1
}

impl JobSpec {
    /// Map the flat reward fields onto typed terms, rejecting incomplete configurations.
    pub fn reward_terms(&self) -> Result<RewardTerms, ValidationError> {
        let reward_type = self.reward_type;
        let positive = |value: Option<Decimal>| -> Result<Decimal, ValidationError> {
            let value = value.ok_or(ValidationError::MissingRewardValue { reward_type })?;
            if value <= Decimal::ZERO {
                return Err(ValidationError::NonPositiveRewardValue { reward_type, value });
            }
            Ok(value)
        };

        match reward_type {
            RewardType::Percentage => {
                let percent = positive(self.reward_value)?;
                if percent > Decimal::ONE_HUNDRED {
                    return Err(ValidationError::PercentageOutOfRange(percent));
                }
                Ok(RewardTerms::Percentage { percent })
            }
            RewardType::Fixed => Ok(RewardTerms::FixedAmount {
                amount: positive(self.reward_value)?,
            }),
            RewardType::Product => {
                let product = self
                    .reward_product
                    .clone()
                    .filter(|product| !product.product_id.trim().is_empty())
                    .ok_or(ValidationError::MissingRewardProduct)?;
                Ok(RewardTerms::FreeProduct { product })
            }
            RewardType::GiftCard => Ok(RewardTerms::GiftCard {
                amount: positive(self.reward_giftcard_amount.or(self.reward_value))?,
            }),
            RewardType::Cash => Ok(RewardTerms::Cash {
                amount: positive(self.reward_value)?,
            }),
            RewardType::None => Ok(RewardTerms::None),
        }
    }
}

/// Validated job ready for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub shop_domain: String,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub content_type: ContentType,
    pub reward: RewardTerms,
    pub spots_available: u32,
    pub deadline: Option<DateTime<Utc>>,
}

/// Admin edits. Capacity counters are deliberately absent; they only move through the
/// registry's increment and decrement operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub spots_available: Option<u32>,
    #[serde(default)]
    pub deadline: Option<Option<DateTime<Utc>>>,
}

impl JobChanges {
    pub fn apply_to(self, job: &mut Job) {
        if let Some(title) = self.title {
            job.title = title;
        }
        if let Some(description) = self.description {
            job.description = description;
        }
        if let Some(requirements) = self.requirements {
            job.requirements = requirements;
        }
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(spots) = self.spots_available {
            job.spots_available = spots;
        }
        if let Some(deadline) = self.deadline {
            job.deadline = deadline;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

/// Customer content entry, optionally linked to a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub shop_domain: String,
    pub shop_submission_number: u64,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub content_type: ContentType,
    pub content: String,
    pub media_url: Option<String>,
    pub status: SubmissionStatus,
    pub job_id: Option<JobId>,
    pub paypal_email: Option<String>,
    pub reward_sent: bool,
    pub reward_sent_at: Option<DateTime<Utc>>,
    pub reward_fulfilled: bool,
    pub reward_fulfilled_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub shop_domain: String,
    pub customer_email: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub content_type: ContentType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub paypal_email: Option<String>,
}

/// Partial submission update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionChanges {
    pub status: Option<SubmissionStatus>,
    pub media_url: Option<String>,
    pub paypal_email: Option<String>,
    pub reward_sent: Option<bool>,
    pub reward_sent_at: Option<DateTime<Utc>>,
    pub reward_fulfilled: Option<bool>,
    pub reward_fulfilled_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl SubmissionChanges {
    pub fn status(status: SubmissionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply_to(self, submission: &mut Submission) {
        if let Some(status) = self.status {
            submission.status = status;
        }
        if let Some(url) = self.media_url {
            submission.media_url = Some(url);
        }
        if let Some(email) = self.paypal_email {
            submission.paypal_email = Some(email);
        }
        if let Some(sent) = self.reward_sent {
            submission.reward_sent = sent;
        }
        if let Some(at) = self.reward_sent_at {
            submission.reward_sent_at = Some(at);
        }
        if let Some(fulfilled) = self.reward_fulfilled {
            submission.reward_fulfilled = fulfilled;
        }
        if let Some(at) = self.reward_fulfilled_at {
            submission.reward_fulfilled_at = Some(at);
        }
        if let Some(at) = self.approved_at {
            submission.approved_at = Some(at);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardStatus {
    Pending,
    PendingFulfillment,
    Sent,
    Fulfilled,
}

impl RewardStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RewardStatus::Pending => "pending",
            RewardStatus::PendingFulfillment => "pending_fulfillment",
            RewardStatus::Sent => "sent",
            RewardStatus::Fulfilled => "fulfilled",
        }
    }
}

/// Ledger record of what was promised or delivered for one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub submission_id: SubmissionId,
    pub shop_domain: String,
    pub reward_type: RewardType,
    pub value: Option<Decimal>,
    pub code: Option<String>,
    pub status: RewardStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub price_rule_id: Option<String>,
    pub discount_code_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub fulfillment_notes: Option<String>,
    pub paypal_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReward {
    pub submission_id: SubmissionId,
    pub shop_domain: String,
    pub reward_type: RewardType,
    pub value: Option<Decimal>,
    pub code: Option<String>,
    pub status: RewardStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub price_rule_id: Option<String>,
    pub discount_code_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl NewReward {
    /// Reward awaiting an operator: no code, nothing promised yet.
    pub fn pending_fulfillment(submission: &Submission, terms: &RewardTerms) -> Self {
        Self {
            submission_id: submission.id.clone(),
            shop_domain: submission.shop_domain.clone(),
            reward_type: terms.reward_type(),
            value: terms.value(),
            code: None,
            status: RewardStatus::PendingFulfillment,
            expires_at: None,
            price_rule_id: None,
            discount_code_id: None,
            sent_at: None,
        }
    }
}

/// Partial reward update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardChanges {
    pub code: Option<String>,
    pub status: Option<RewardStatus>,
    pub expires_at: Option<DateTime<Utc>>,
    pub price_rule_id: Option<String>,
    pub discount_code_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub fulfillment_notes: Option<String>,
    pub paypal_transaction_id: Option<String>,
}

impl RewardChanges {
    pub fn apply_to(self, reward: &mut Reward) {
        if let Some(code) = self.code {
            reward.code = Some(code);
        }
        if let Some(status) = self.status {
            reward.status = status;
        }
        if let Some(at) = self.expires_at {
            reward.expires_at = Some(at);
        }
        if let Some(id) = self.price_rule_id {
            reward.price_rule_id = Some(id);
        }
        if let Some(id) = self.discount_code_id {
            reward.discount_code_id = Some(id);
        }
        if let Some(at) = self.sent_at {
            reward.sent_at = Some(at);
        }
        if let Some(at) = self.fulfilled_at {
            reward.fulfilled_at = Some(at);
        }
        if let Some(notes) = self.fulfillment_notes {
            reward.fulfillment_notes = Some(notes);
        }
        if let Some(id) = self.paypal_transaction_id {
            reward.paypal_transaction_id = Some(id);
        }
    }
}

/// Per-shop installation record written when the app is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopInstallation {
    pub shop_domain: String,
    #[serde(default)]
    pub shop_name: Option<String>,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub notification_email: Option<String>,
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
}

impl ShopInstallation {
    pub fn new(shop_domain: impl Into<String>) -> Self {
        Self {
            shop_domain: shop_domain.into(),
            shop_name: None,
            plan_name: None,
            notification_email: None,
            access_token: None,
        }
    }
}
