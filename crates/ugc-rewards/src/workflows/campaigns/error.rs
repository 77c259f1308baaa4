use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{JobId, RewardId, RewardStatus, RewardType, SubmissionId, SubmissionStatus};
use super::plans::PlanTier;
use super::repository::RepositoryError;
use super::storage::StorageError;

/// Malformed job or submission input, rejected before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{} rewards require a reward value", .reward_type.label())]
    MissingRewardValue { reward_type: RewardType },
    #[error("{} reward value must be positive, got {}", .reward_type.label(), .value)]
    NonPositiveRewardValue { reward_type: RewardType, value: Decimal },
    #[error("percentage rewards must be at most 100, got {0}")]
    PercentageOutOfRange(Decimal),
    #[error("product rewards require a reward product")]
    MissingRewardProduct,
    #[error("jobs need at least one available spot")]
    NoSpotsAvailable,
    #[error("spots_available ({requested}) cannot drop below spots_filled ({filled})")]
    SpotsBelowFilled { requested: u32, filled: u32 },
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("job {0} is not accepting submissions")]
    JobClosed(JobId),
    #[error("job status can only be set to active or paused")]
    ManualCompletion,
}

/// Plan limits that block an action until the merchant upgrades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpgradeReason {
    #[error("monthly approval limit of {limit} reached on the {} plan", .tier.label())]
    MonthlyApprovals { tier: PlanTier, limit: u32, used: u64 },
    #[error("active job limit of {limit} reached on the {} plan", .tier.label())]
    ActiveJobs { tier: PlanTier, limit: u32 },
    #[error("{} rewards are not included in the {} plan", .reward_type.label(), .tier.label())]
    RewardNotIncluded {
        tier: PlanTier,
        reward_type: RewardType,
    },
    #[error("cash rewards are not included in the {} plan", .tier.label())]
    CashRewards { tier: PlanTier },
}

/// Error taxonomy shared by the campaign services and the approval workflow.
#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} {id} belongs to another shop")]
    Forbidden { entity: &'static str, id: String },
    #[error("upgrade required: {0}")]
    UpgradeRequired(UpgradeReason),
    #[error("job {job_id} has no open spots")]
    CapacityExhausted { job_id: JobId },
    #[error("{email} already submitted to job {job_id}")]
    DuplicateSubmission { email: String, job_id: JobId },
    #[error("submission cannot move from {} to {}", .from.label(), .to.label())]
    InvalidTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },
    #[error("submission {submission_id} is {}; only approved submissions are fulfilled", .status.label())]
    SubmissionNotApproved {
        submission_id: SubmissionId,
        status: SubmissionStatus,
    },
    #[error("reward {reward_id} is {}; expected {}", .actual.label(), .expected.label())]
    RewardNotFulfillable {
        reward_id: RewardId,
        actual: RewardStatus,
        expected: RewardStatus,
    },
    #[error("reward for submission {submission_id} is {}, not {}", .actual.label(), .expected.label())]
    RewardTypeMismatch {
        submission_id: SubmissionId,
        actual: RewardType,
        expected: RewardType,
    },
    #[error("discount code could not be issued for submission {submission_id}; it stays pending: {reason}")]
    MintFailed {
        submission_id: SubmissionId,
        reward_id: RewardId,
        reason: String,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("background task failed: {0}")]
    Runtime(String),
}

impl CampaignError {
    pub(crate) fn job_not_found(id: &JobId) -> Self {
        Self::NotFound {
            entity: "job",
            id: id.0.clone(),
        }
    }

    pub(crate) fn submission_not_found(id: &SubmissionId) -> Self {
        Self::NotFound {
            entity: "submission",
            id: id.0.clone(),
        }
    }
}
