//! UGC reward campaigns: merchant jobs, customer submissions, moderation and rewards.
//!
//! [`CampaignService`] is the single entry point. It is synchronous; collaborators that
//! reach the network (discount minting, email relay) block the calling thread, so async
//! callers go through `spawn_blocking` as [`campaign_router`] does.

pub mod approval;
pub mod clock;
pub mod discounts;
pub mod domain;
pub mod error;
pub mod fulfillment;
pub mod jobs;
pub mod memory;
pub mod notifications;
pub mod plans;
pub mod repository;
pub mod router;
pub mod service;
pub mod shopify;
pub mod storage;
pub mod submissions;

#[cfg(test)]
mod tests;

pub use approval::{ApprovalOutcome, NotificationReport, RejectionOutcome};
pub use clock::{Clock, FixedClock, SystemClock};
pub use discounts::{
    DiscountError, DiscountIssuer, DiscountKind, DiscountRequest, IssuedCode, CODE_VALIDITY_DAYS,
};
pub use domain::{
    ContentType, Job, JobChanges, JobId, JobSpec, JobStatus, NewJob, NewReward, NewSubmission,
    Reward, RewardChanges, RewardId, RewardProduct, RewardStatus, RewardTerms, RewardType,
    ShopInstallation, Submission, SubmissionChanges, SubmissionId, SubmissionStatus,
};
pub use error::{CampaignError, UpgradeReason, ValidationError};
pub use fulfillment::{CashFulfillment, FulfillmentOutcome, GiftCardFulfillment};
pub use jobs::JobRegistry;
pub use memory::{InMemoryOutbox, InMemoryStore};
pub use notifications::{
    EmailError, EmailMessage, EmailSender, EmailTemplate, HttpEmailSender, NotificationDispatcher,
    NotificationError, NotificationKind, TemplateVariables,
};
pub use plans::{
    resolve_entitlements, Entitlements, FeatureFlags, Limit, PlanCatalog, PlanLimits, PlanTier,
};
pub use repository::{
    CapacityChange, InstallationRepository, JobRepository, RepositoryError, RewardLedger,
    SubmissionRepository, TemplateRepository,
};
pub use router::{campaign_router, SHOP_DOMAIN_HEADER};
pub use service::{
    CampaignDependencies, CampaignService, CampaignSettings, IntakeOutcome, NotificationStatus,
    PlanView, RedactionReport, SubmissionRequest,
};
pub use shopify::ShopifyDiscountClient;
pub use storage::{LocalMediaStorage, MediaStorage, MediaUpload, StorageError};
pub use submissions::{month_bounds, SubmissionStore};
