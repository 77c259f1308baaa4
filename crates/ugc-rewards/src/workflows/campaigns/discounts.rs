use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{RewardProduct, RewardTerms};

/// Days a minted code stays redeemable.
pub const CODE_VALIDITY_DAYS: i64 = 30;

/// What the minted code should take off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountKind {
    Percentage(Decimal),
    FixedAmount(Decimal),
    FreeProduct(RewardProduct),
}

impl DiscountKind {
    /// Only code-bearing terms map to a discount; manual and empty rewards return `None`.
    pub fn from_terms(terms: &RewardTerms) -> Option<Self> {
        match terms {
            RewardTerms::Percentage { percent } => Some(Self::Percentage(*percent)),
            RewardTerms::FixedAmount { amount } => Some(Self::FixedAmount(*amount)),
            RewardTerms::FreeProduct { product } => Some(Self::FreeProduct(product.clone())),
            RewardTerms::GiftCard { .. } | RewardTerms::Cash { .. } | RewardTerms::None => None,
        }
    }
}

/// Single-use discount request for one customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountRequest {
    pub shop_domain: String,
    pub kind: DiscountKind,
    pub code: String,
    pub title: String,
    pub customer_email: String,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub usage_limit: u32,
}

impl DiscountRequest {
    pub fn new(
        shop_domain: &str,
        kind: DiscountKind,
        customer_email: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            shop_domain: shop_domain.to_string(),
            kind,
            code: generate_code(),
            title: format!("UGC reward for {customer_email}"),
            customer_email: customer_email.to_string(),
            starts_at: now,
            expires_at: now + Duration::days(CODE_VALIDITY_DAYS),
            usage_limit: 1,
        }
    }
}

/// Code returned by the platform, plus the ids needed to manage it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub price_rule_id: Option<String>,
    pub discount_code_id: Option<String>,
}

/// External discount platform. Implementations either return a redeemable code or fail;
/// a timeout is a failure like any other.
pub trait DiscountIssuer: Send + Sync {
    fn mint(&self, request: &DiscountRequest) -> Result<IssuedCode, DiscountError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DiscountError {
    #[error("no access token stored for {0}")]
    MissingCredentials(String),
    #[error("discount platform request failed: {0}")]
    Transport(String),
    #[error("discount platform timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("discount platform rejected the code: {0}")]
    Rejected(String),
    #[error("discount runtime unavailable: {0}")]
    Runtime(String),
}

/// `UGC-` followed by eight uppercase alphanumerics.
pub fn generate_code() -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    format!("UGC-{}", raw[..8].to_ascii_uppercase())
}
