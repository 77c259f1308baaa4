//! Approval and rejection of submissions.
//!
//! Job-linked approvals reserve a spot before anything else happens, so the capacity
//! check is authoritative: a full job rejects the approval before a code is minted.
//! Every failure after the reservation gives the spot back.
//!
//! Code-bearing rewards (percentage, fixed amount, free product) approve only after the
//! code exists. A failed mint leaves the submission pending with a `pending_fulfillment`
//! ledger row and reports a retryable error. Gift card and cash rewards never block: the
//! ledger row waits for an operator while the submission is approved at once.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::discounts::{DiscountKind, DiscountRequest, IssuedCode};
use super::domain::{
    Job, NewReward, Reward, RewardStatus, RewardTerms, Submission, SubmissionChanges,
    SubmissionId, SubmissionStatus,
};
use super::error::{CampaignError, UpgradeReason};
use super::notifications::NotificationKind;
use super::repository::{CapacityChange, RepositoryError};
use super::service::{CampaignService, NotificationStatus, ShopContext};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationReport {
    pub customer: Option<NotificationStatus>,
    pub operator: Option<NotificationStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    pub submission: Submission,
    pub job: Option<Job>,
    pub reward: Option<Reward>,
    /// The submission was approved before this call; nothing was changed.
    pub already_approved: bool,
    pub notifications: NotificationReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectionOutcome {
    pub submission: Submission,
    pub job: Option<Job>,
    pub already_rejected: bool,
    pub notification: Option<NotificationStatus>,
}

impl CampaignService {
    /// Approve a pending submission and run its reward branch.
    pub fn approve(
        &self,
        shop_domain: &str,
        id: &SubmissionId,
        additional_message: Option<&str>,
    ) -> Result<ApprovalOutcome, CampaignError> {
        let (submission, job) = self.owned_submission(shop_domain, id)?;

        match submission.status {
            SubmissionStatus::Pending => {}
            SubmissionStatus::Approved => {
                let reward = self.rewards.get_by_submission(id)?;
                return Ok(ApprovalOutcome {
                    submission,
                    job,
                    reward,
                    already_approved: true,
                    notifications: NotificationReport::default(),
                });
            }
            SubmissionStatus::Rejected => {
                return Err(CampaignError::InvalidTransition {
                    from: SubmissionStatus::Rejected,
                    to: SubmissionStatus::Approved,
                });
            }
        }

        let context = self.shop_context(shop_domain)?;
        self.check_quota(&context)?;

        let job = match job {
            Some(job) => job,
            None => return self.approve_plain(&context, submission, None, additional_message),
        };

        if matches!(job.reward, RewardTerms::Cash { .. }) && !context.entitlements.features.cash_rewards
        {
            info!(shop = shop_domain, submission_id = %id, "cash reward blocked by plan");
            return Err(CampaignError::UpgradeRequired(UpgradeReason::CashRewards {
                tier: context.entitlements.tier,
            }));
        }

        let reserved = self.reserve_spot(&job)?;
        let terms = reserved.reward.clone();
        let result = match &terms {
            RewardTerms::Percentage { .. }
            | RewardTerms::FixedAmount { .. }
            | RewardTerms::FreeProduct { .. } => {
                self.approve_with_code(&context, &submission, reserved, &terms, additional_message)
            }
            RewardTerms::GiftCard { .. } | RewardTerms::Cash { .. } => {
                self.approve_manual(&context, &submission, reserved, &terms, additional_message)
            }
            RewardTerms::None => {
                self.approve_plain(&context, submission.clone(), Some(reserved), additional_message)
            }
        };

        if let Err(err) = &result {
            self.release_spot(&job, err);
        }
        result
    }

    fn check_quota(&self, context: &ShopContext) -> Result<(), CampaignError> {
        let limit = context.entitlements.limits.monthly_approvals;
        let used = self
            .submissions
            .count_approved_this_month(&context.shop_domain)?;
        if limit.allows(used) {
            return Ok(());
        }
        info!(shop = %context.shop_domain, used, "monthly approval quota reached");
        Err(CampaignError::UpgradeRequired(
            UpgradeReason::MonthlyApprovals {
                tier: context.entitlements.tier,
                limit: limit.bound().unwrap_or_default(),
                used,
            },
        ))
    }

    fn reserve_spot(&self, job: &Job) -> Result<Job, CampaignError> {
        match self.jobs.increment(&job.id)? {
            CapacityChange::Reserved(job) => Ok(job),
            CapacityChange::Full(job) => {
                info!(job_id = %job.id, spots = job.spots_available, "approval refused; job is full");
                Err(CampaignError::CapacityExhausted { job_id: job.id })
            }
        }
    }

    fn release_spot(&self, job: &Job, cause: &CampaignError) {
        match self.jobs.decrement(&job.id) {
            Ok(job) => warn!(
                job_id = %job.id,
                spots_filled = job.spots_filled,
                cause = %cause,
                "approval failed; reserved spot released"
            ),
            Err(err) => warn!(
                job_id = %job.id,
                cause = %cause,
                error = %err,
                "approval failed and the reserved spot could not be released"
            ),
        }
    }

    fn approve_with_code(
        &self,
        context: &ShopContext,
        submission: &Submission,
        job: Job,
        terms: &RewardTerms,
        additional_message: Option<&str>,
    ) -> Result<ApprovalOutcome, CampaignError> {
        let now = self.clock.now();
        let existing = self.rewards.get_by_submission(&submission.id)?;

        let reward = match existing {
            // A previous attempt minted and recorded the code but did not finish approving.
            Some(reward) if reward.code.is_some() => reward,
            existing => {
                let kind = DiscountKind::from_terms(terms).ok_or_else(|| {
                    CampaignError::Runtime(format!(
                        "{} rewards carry no discount code",
                        terms.reward_type().label()
                    ))
                })?;
                let request =
                    DiscountRequest::new(&context.shop_domain, kind, &submission.customer_email, now);
                match self.discounts.mint(&request) {
                    Ok(issued) => self.record_code(submission, terms, existing, &issued, now)?,
                    Err(err) => {
                        let reward = match existing {
                            Some(reward) => reward,
                            None => self.record_pending(submission, terms)?,
                        };
                        warn!(
                            shop = %context.shop_domain,
                            submission_id = %submission.id,
                            reward_id = %reward.id,
                            error = %err,
                            "discount mint failed; submission kept pending"
                        );
                        return Err(CampaignError::MintFailed {
                            submission_id: submission.id.clone(),
                            reward_id: reward.id,
                            reason: err.to_string(),
                        });
                    }
                }
            }
        };

        let submission = self.mark_approved(submission, now)?;
        let mut variables = self.variables(context, &submission);
        variables.status = Some(SubmissionStatus::Approved.label().to_string());
        variables.discount_code = reward.code.clone();
        variables.reward_value = Some(terms.describe());
        variables.expires_on = reward
            .expires_at
            .map(|at| at.format("%B %-d, %Y").to_string());
        variables.job_title = Some(job.title.clone());
        variables.additional_message = additional_message.map(str::to_string);
        if let RewardTerms::FreeProduct { product } = terms {
            variables.product_name = Some(product.display_name().to_string());
        }

        let customer = self.notify(
            &context.shop_domain,
            NotificationKind::Approved,
            &submission.customer_email,
            &variables,
        );
        let submission = if customer.is_sent() {
            self.mark_reward_sent(submission, self.clock.now())
        } else {
            submission
        };

        info!(
            shop = %context.shop_domain,
            submission_id = %submission.id,
            reward_id = %reward.id,
            job_id = %job.id,
            "submission approved with discount code"
        );
        Ok(ApprovalOutcome {
            submission,
            job: Some(job),
            reward: Some(reward),
            already_approved: false,
            notifications: NotificationReport {
                customer: Some(customer),
                operator: None,
            },
        })
    }

    fn record_code(
        &self,
        submission: &Submission,
        terms: &RewardTerms,
        existing: Option<Reward>,
        issued: &IssuedCode,
        now: DateTime<Utc>,
    ) -> Result<Reward, CampaignError> {
        let recorded = match existing {
            Some(reward) => self.rewards.mark_sent(&reward.id, issued, now),
            None => self.rewards.create(NewReward {
                submission_id: submission.id.clone(),
                shop_domain: submission.shop_domain.clone(),
                reward_type: terms.reward_type(),
                value: terms.value(),
                code: Some(issued.code.clone()),
                status: RewardStatus::Sent,
                expires_at: Some(issued.expires_at),
                price_rule_id: issued.price_rule_id.clone(),
                discount_code_id: issued.discount_code_id.clone(),
                sent_at: Some(now),
            }),
        };
        recorded.map_err(|err| {
            warn!(
                submission_id = %submission.id,
                code = %issued.code,
                error = %err,
                "minted code could not be recorded"
            );
            CampaignError::from(err)
        })
    }

    /// Ledger row for a reward that an operator has to finish. Reuses an existing row.
    fn record_pending(
        &self,
        submission: &Submission,
        terms: &RewardTerms,
    ) -> Result<Reward, CampaignError> {
        match self
            .rewards
            .create(NewReward::pending_fulfillment(submission, terms))
        {
            Ok(reward) => Ok(reward),
            Err(RepositoryError::Conflict) => self
                .rewards
                .get_by_submission(&submission.id)?
                .ok_or_else(|| CampaignError::Repository(RepositoryError::NotFound)),
            Err(err) => Err(err.into()),
        }
    }

    fn approve_manual(
        &self,
        context: &ShopContext,
        submission: &Submission,
        job: Job,
        terms: &RewardTerms,
        additional_message: Option<&str>,
    ) -> Result<ApprovalOutcome, CampaignError> {
        let now = self.clock.now();
        let reward = self.record_pending(submission, terms)?;
        let submission = self.mark_approved(submission, now)?;

        let mut variables = self.variables(context, &submission);
        variables.status = Some(SubmissionStatus::Approved.label().to_string());
        variables.reward_value = Some(terms.describe());
        variables.job_title = Some(job.title.clone());

        let operator = match context.operator_email(self.settings.fallback_notification_email.as_deref()) {
            Some(to) => self.notify(
                &context.shop_domain,
                NotificationKind::ManualFulfillment,
                &to,
                &variables,
            ),
            None => {
                warn!(
                    shop = %context.shop_domain,
                    reward_id = %reward.id,
                    "no notification address for manual fulfillment"
                );
                NotificationStatus::Skipped
            }
        };

        variables.additional_message = additional_message.map(str::to_string);
        let customer = self.notify(
            &context.shop_domain,
            NotificationKind::Approved,
            &submission.customer_email,
            &variables,
        );

        info!(
            shop = %context.shop_domain,
            submission_id = %submission.id,
            reward_id = %reward.id,
            reward = reward.reward_type.label(),
            "submission approved; reward awaits manual fulfillment"
        );
        Ok(ApprovalOutcome {
            submission,
            job: Some(job),
            reward: Some(reward),
            already_approved: false,
            notifications: NotificationReport {
                customer: Some(customer),
                operator: Some(operator),
            },
        })
    }

    fn approve_plain(
        &self,
        context: &ShopContext,
        submission: Submission,
        job: Option<Job>,
        additional_message: Option<&str>,
    ) -> Result<ApprovalOutcome, CampaignError> {
        let submission = self.mark_approved(&submission, self.clock.now())?;

        let mut variables = self.variables(context, &submission);
        variables.job_title = job.as_ref().map(|job| job.title.clone());
        variables.additional_message = additional_message.map(str::to_string);
        let customer = self.notify(
            &context.shop_domain,
            NotificationKind::Approved,
            &submission.customer_email,
            &variables,
        );

        info!(shop = %context.shop_domain, submission_id = %submission.id, "submission approved");
        Ok(ApprovalOutcome {
            submission,
            job,
            reward: None,
            already_approved: false,
            notifications: NotificationReport {
                customer: Some(customer),
                operator: None,
            },
        })
    }

    fn mark_approved(
        &self,
        submission: &Submission,
        at: DateTime<Utc>,
    ) -> Result<Submission, CampaignError> {
        self.submissions.update(
            &submission.id,
            SubmissionChanges {
                status: Some(SubmissionStatus::Approved),
                approved_at: Some(at),
                ..SubmissionChanges::default()
            },
        )
    }

    fn mark_reward_sent(&self, submission: Submission, at: DateTime<Utc>) -> Submission {
        let changes = SubmissionChanges {
            reward_sent: Some(true),
            reward_sent_at: Some(at),
            ..SubmissionChanges::default()
        };
        match self.submissions.update(&submission.id, changes) {
            Ok(updated) => updated,
            Err(err) => {
                warn!(submission_id = %submission.id, error = %err, "could not flag reward as sent");
                submission
            }
        }
    }

    /// Reject a submission. Reversing an approval gives the job its spot back.
    pub fn reject(
        &self,
        shop_domain: &str,
        id: &SubmissionId,
        additional_message: Option<&str>,
    ) -> Result<RejectionOutcome, CampaignError> {
        let (submission, job) = self.owned_submission(shop_domain, id)?;
        if submission.status == SubmissionStatus::Rejected {
            return Ok(RejectionOutcome {
                submission,
                job,
                already_rejected: true,
                notification: None,
            });
        }

        let previous = submission.status;
        let context = self.shop_context(shop_domain)?;
        let submission = self
            .submissions
            .update_status(id, SubmissionStatus::Rejected)?;

        let job = match job {
            Some(job) if previous == SubmissionStatus::Approved => {
                let job = self.jobs.decrement(&job.id)?;
                info!(job_id = %job.id, spots_filled = job.spots_filled, "approval reversed");
                Some(job)
            }
            other => other,
        };

        let mut variables = self.variables(&context, &submission);
        variables.additional_message = additional_message.map(str::to_string);
        variables.job_title = job.as_ref().map(|job| job.title.clone());
        let notification = self.notify(
            shop_domain,
            NotificationKind::Rejected,
            &submission.customer_email,
            &variables,
        );

        info!(shop = shop_domain, submission_id = %id, reversed = previous == SubmissionStatus::Approved, "submission rejected");
        Ok(RejectionOutcome {
            submission,
            job,
            already_rejected: false,
            notification: Some(notification),
        })
    }
}
