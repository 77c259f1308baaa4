use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    Reward, RewardChanges, RewardStatus, RewardType, Submission, SubmissionChanges, SubmissionId,
    SubmissionStatus,
};
use super::error::{CampaignError, ValidationError};
use super::notifications::NotificationKind;
use super::service::{CampaignService, NotificationStatus};

/// Operator entry for a cash payout sent outside the app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFulfillment {
    pub paypal_transaction_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Operator entry for a gift card created in the store admin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftCardFulfillment {
    pub gift_card_code: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentOutcome {
    pub reward: Reward,
    pub submission: Submission,
    pub notification: Option<NotificationStatus>,
}

impl CampaignService {
    /// Record a cash payout and close the reward.
    pub fn fulfill_cash(
        &self,
        shop_domain: &str,
        id: &SubmissionId,
        fulfillment: CashFulfillment,
    ) -> Result<FulfillmentOutcome, CampaignError> {
        let transaction_id = fulfillment.paypal_transaction_id.trim().to_string();
        if transaction_id.is_empty() {
            return Err(ValidationError::EmptyField("paypal_transaction_id").into());
        }

        let (submission, reward) = self.fulfillable(shop_domain, id, RewardType::Cash)?;
        let now = self.clock.now();
        let reward = self.rewards.update(
            &reward.id,
            RewardChanges {
                status: Some(RewardStatus::Fulfilled),
                fulfilled_at: Some(now),
                fulfillment_notes: fulfillment.notes,
                paypal_transaction_id: Some(transaction_id),
                ..RewardChanges::default()
            },
        )?;
        let submission = self.submissions.update(
            &submission.id,
            SubmissionChanges {
                reward_fulfilled: Some(true),
                reward_fulfilled_at: Some(now),
                ..SubmissionChanges::default()
            },
        )?;

        info!(shop = shop_domain, submission_id = %id, reward_id = %reward.id, "cash reward fulfilled");
        Ok(FulfillmentOutcome {
            reward,
            submission,
            notification: None,
        })
    }

    /// Record the gift card an operator created and email it to the customer.
    pub fn fulfill_gift_card(
        &self,
        shop_domain: &str,
        id: &SubmissionId,
        fulfillment: GiftCardFulfillment,
    ) -> Result<FulfillmentOutcome, CampaignError> {
        let code = fulfillment.gift_card_code.trim().to_string();
        if code.is_empty() {
            return Err(ValidationError::EmptyField("gift_card_code").into());
        }

        let (submission, reward) = self.fulfillable(shop_domain, id, RewardType::GiftCard)?;
        let now = self.clock.now();
        let reward = self.rewards.update(
            &reward.id,
            RewardChanges {
                code: Some(code.clone()),
                status: Some(RewardStatus::Fulfilled),
                sent_at: Some(now),
                fulfilled_at: Some(now),
                fulfillment_notes: fulfillment.notes,
                ..RewardChanges::default()
            },
        )?;
        let submission = self.submissions.update(
            &submission.id,
            SubmissionChanges {
                reward_fulfilled: Some(true),
                reward_fulfilled_at: Some(now),
                ..SubmissionChanges::default()
            },
        )?;

        let context = self.shop_context(shop_domain)?;
        let mut variables = self.variables(&context, &submission);
        variables.discount_code = Some(code);
        variables.reward_value = reward
            .value
            .map(|amount| format!("a ${:.2} gift card", amount));
        let notification = self.notify(
            shop_domain,
            NotificationKind::Approved,
            &submission.customer_email,
            &variables,
        );
        let submission = if notification.is_sent() {
            self.submissions.update(
                &submission.id,
                SubmissionChanges {
                    reward_sent: Some(true),
                    reward_sent_at: Some(self.clock.now()),
                    ..SubmissionChanges::default()
                },
            )?
        } else {
            submission
        };

        info!(shop = shop_domain, submission_id = %id, reward_id = %reward.id, "gift card fulfilled");
        Ok(FulfillmentOutcome {
            reward,
            submission,
            notification: Some(notification),
        })
    }

    /// Rewards waiting for an operator, oldest first. Rewards of rejected or erased
    /// submissions are left out.
    pub fn pending_rewards(&self, shop_domain: &str) -> Result<Vec<Reward>, CampaignError> {
        let mut rewards = Vec::new();
        for reward in self
            .rewards
            .list_by_status(shop_domain, RewardStatus::PendingFulfillment)?
        {
            match self.submissions.find(&reward.submission_id)? {
                Some(submission) if submission.status != SubmissionStatus::Rejected => {
                    rewards.push(reward)
                }
                _ => {}
            }
        }
        rewards.sort_by_key(|reward| reward.created_at);
        Ok(rewards)
    }

    fn fulfillable(
        &self,
        shop_domain: &str,
        id: &SubmissionId,
        expected: RewardType,
    ) -> Result<(Submission, Reward), CampaignError> {
        let (submission, _) = self.owned_submission(shop_domain, id)?;
        let reward = self
            .rewards
            .get_by_submission(id)?
            .ok_or_else(|| CampaignError::NotFound {
                entity: "reward",
                id: id.0.clone(),
            })?;

        if reward.reward_type != expected {
            return Err(CampaignError::RewardTypeMismatch {
                submission_id: id.clone(),
                actual: reward.reward_type,
                expected,
            });
        }
        if reward.status != RewardStatus::PendingFulfillment {
            return Err(CampaignError::RewardNotFulfillable {
                reward_id: reward.id,
                actual: reward.status,
                expected: RewardStatus::PendingFulfillment,
            });
        }
        if submission.status != SubmissionStatus::Approved {
            return Err(CampaignError::SubmissionNotApproved {
                submission_id: submission.id,
                status: submission.status,
            });
        }
        Ok((submission, reward))
    }
}
