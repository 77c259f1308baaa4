use chrono::{DateTime, Utc};

use super::discounts::IssuedCode;
use super::domain::{
    Job, JobChanges, JobId, JobStatus, NewJob, NewReward, NewSubmission, Reward, RewardChanges,
    RewardId, RewardStatus, ShopInstallation, Submission, SubmissionChanges, SubmissionId,
};
use super::notifications::{EmailTemplate, NotificationKind};

/// Result of a conditional capacity increment.
#[derive(Debug, Clone, PartialEq)]
pub enum CapacityChange {
    /// A spot was taken; the job reflects the new `spots_filled`.
    Reserved(Job),
    /// The job was already full and nothing changed.
    Full(Job),
}

impl CapacityChange {
    pub fn job(&self) -> &Job {
        match self {
            CapacityChange::Reserved(job) | CapacityChange::Full(job) => job,
        }
    }
}

/// Job storage. Capacity moves only through the two counter operations, which
/// implementations must perform as single conditional updates.
pub trait JobRepository: Send + Sync {
    fn insert(&self, job: NewJob) -> Result<Job, RepositoryError>;
    fn fetch(&self, id: &JobId) -> Result<Option<Job>, RepositoryError>;
    fn apply(&self, id: &JobId, changes: JobChanges) -> Result<Job, RepositoryError>;
    /// Increment `spots_filled` only while it is below `spots_available`.
    fn increment_spots_filled(&self, id: &JobId) -> Result<CapacityChange, RepositoryError>;
    /// Decrement `spots_filled`, flooring at zero.
    fn decrement_spots_filled(&self, id: &JobId) -> Result<Job, RepositoryError>;
    fn set_status(&self, id: &JobId, status: JobStatus) -> Result<Job, RepositoryError>;
    fn list_by_shop(&self, shop_domain: &str) -> Result<Vec<Job>, RepositoryError>;
}

/// Submission storage. `insert` assigns the id and the next per-shop sequence number
/// atomically with respect to other inserts for the same shop, and refuses a second
/// entry from the same email to the same job with [`RepositoryError::Conflict`].
pub trait SubmissionRepository: Send + Sync {
    fn insert(&self, submission: NewSubmission) -> Result<Submission, RepositoryError>;
    fn fetch(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError>;
    fn apply(
        &self,
        id: &SubmissionId,
        changes: SubmissionChanges,
    ) -> Result<Submission, RepositoryError>;
    /// Approved submissions whose `approved_at` falls in `[start, end)`.
    fn count_approved_between(
        &self,
        shop_domain: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
    fn exists_for_job(&self, customer_email: &str, job_id: &JobId) -> Result<bool, RepositoryError>;
    fn list_by_shop(&self, shop_domain: &str) -> Result<Vec<Submission>, RepositoryError>;
    /// Erase every submission a customer made to a shop. Returns how many were removed.
    fn delete_by_customer(
        &self,
        shop_domain: &str,
        customer_email: &str,
    ) -> Result<usize, RepositoryError>;
}

/// Reward ledger. One row per submission; a second `create` for the same submission is a
/// [`RepositoryError::Conflict`].
pub trait RewardLedger: Send + Sync {
    fn create(&self, reward: NewReward) -> Result<Reward, RepositoryError>;
    fn update(&self, id: &RewardId, changes: RewardChanges) -> Result<Reward, RepositoryError>;
    fn get_by_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<Reward>, RepositoryError>;
    fn list_by_status(
        &self,
        shop_domain: &str,
        status: RewardStatus,
    ) -> Result<Vec<Reward>, RepositoryError>;

    /// Attach a freshly minted code and flip the row to `sent` in one update.
    fn mark_sent(
        &self,
        id: &RewardId,
        issued: &IssuedCode,
        at: DateTime<Utc>,
    ) -> Result<Reward, RepositoryError> {
        self.update(
            id,
            RewardChanges {
                code: Some(issued.code.clone()),
                status: Some(RewardStatus::Sent),
                expires_at: Some(issued.expires_at),
                price_rule_id: issued.price_rule_id.clone(),
                discount_code_id: issued.discount_code_id.clone(),
                sent_at: Some(at),
                ..RewardChanges::default()
            },
        )
    }
}

pub trait InstallationRepository: Send + Sync {
    fn fetch(&self, shop_domain: &str) -> Result<Option<ShopInstallation>, RepositoryError>;
    fn upsert(&self, installation: ShopInstallation) -> Result<(), RepositoryError>;
}

/// Per-merchant email template overrides.
pub trait TemplateRepository: Send + Sync {
    fn fetch_template(
        &self,
        shop_domain: &str,
        kind: NotificationKind,
    ) -> Result<Option<EmailTemplate>, RepositoryError>;
    fn save_template(
        &self,
        shop_domain: &str,
        kind: NotificationKind,
        template: EmailTemplate,
    ) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
