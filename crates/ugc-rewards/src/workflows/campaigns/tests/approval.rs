use std::sync::Arc;

use chrono::TimeZone;

use super::common::*;
use crate::workflows::campaigns::domain::{
    JobStatus, RewardStatus, RewardType, ShopInstallation, SubmissionId, SubmissionStatus,
};
use crate::workflows::campaigns::plans::{Entitlements, Limit, PlanCatalog, PlanLimits};
use crate::workflows::campaigns::repository::RewardLedger;
use crate::workflows::campaigns::{CampaignError, NotificationStatus, UpgradeReason};

#[test]
fn percentage_approval_mints_code_and_completes_job() {
    let harness = harness();
    let job = create_job(&harness, job_spec(RewardType::Percentage, Some(20), 1));
    let submission = submit(&harness, "robin@example.com", Some(&job.id));

    let outcome = harness
        .service
        .approve(SHOP, &submission.id, Some("Loved the lighting"))
        .expect("approval succeeds");

    let reward = outcome.reward.expect("reward recorded");
    let code = reward.code.clone().expect("code persisted");
    assert!(code.starts_with("UGC-"));
    assert_eq!(reward.status, RewardStatus::Sent);
    assert_eq!(reward.reward_type, RewardType::Percentage);
    assert_eq!(outcome.submission.status, SubmissionStatus::Approved);
    assert_eq!(outcome.submission.approved_at, Some(start_time()));
    assert!(outcome.submission.reward_sent);

    let stored = fetch_job(&harness, &job.id);
    assert_eq!(stored.spots_filled, 1);
    assert_eq!(stored.status, JobStatus::Completed);

    let request = harness.issuer.requests().pop().expect("mint requested");
    assert_eq!(request.usage_limit, 1);
    assert!(request.title.contains("robin@example.com"));

    let emails = messages_to(&harness, "robin@example.com");
    let approved = emails.last().expect("approval email");
    assert!(approved.text.contains(&code));
    assert!(approved.text.contains("20% off"));
    assert!(approved.text.contains("Loved the lighting"));
}

#[test]
fn second_approval_on_last_spot_is_refused_before_minting() {
    let harness = harness();
    let job = create_job(&harness, job_spec(RewardType::Percentage, Some(20), 1));
    let first = submit(&harness, "a@example.com", Some(&job.id));
    let second = submit(&harness, "b@example.com", Some(&job.id));

    harness
        .service
        .approve(SHOP, &first.id, None)
        .expect("first approval");
    let error = harness
        .service
        .approve(SHOP, &second.id, None)
        .expect_err("job is full");

    assert!(matches!(error, CampaignError::CapacityExhausted { .. }));
    assert_eq!(harness.issuer.calls(), 1);
    let second = harness
        .service
        .get_submission(SHOP, &second.id)
        .expect("second exists");
    assert_eq!(second.status, SubmissionStatus::Pending);
    assert!(harness
        .store
        .get_by_submission(&second.id)
        .expect("ledger readable")
        .is_none());
    assert_eq!(fetch_job(&harness, &job.id).spots_filled, 1);
}

#[test]
fn mint_failure_keeps_submission_pending_and_releases_the_spot() {
    let harness = harness();
    let job = create_job(&harness, product_spec(2));
    let submission = submit(&harness, "robin@example.com", Some(&job.id));
    harness.issuer.set_failing(true);

    let error = harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect_err("mint fails");

    let reward_id = match error {
        CampaignError::MintFailed { reward_id, .. } => reward_id,
        other => panic!("expected mint failure, got {other:?}"),
    };
    let pending = harness
        .store
        .get_by_submission(&submission.id)
        .expect("ledger readable")
        .expect("pending row recorded");
    assert_eq!(pending.id, reward_id);
    assert_eq!(pending.status, RewardStatus::PendingFulfillment);
    assert!(pending.code.is_none());

    let stored = harness
        .service
        .get_submission(SHOP, &submission.id)
        .expect("submission exists");
    assert_eq!(stored.status, SubmissionStatus::Pending);
    let reopened = fetch_job(&harness, &job.id);
    assert_eq!(reopened.spots_filled, 0);
    assert_eq!(reopened.status, JobStatus::Active);
    assert!(messages_to(&harness, "robin@example.com")
        .iter()
        .all(|message| !message.subject.contains("approved")));

    harness.issuer.set_failing(false);
    let outcome = harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect("retry succeeds");
    let reward = outcome.reward.expect("reward");
    assert_eq!(reward.id, reward_id);
    assert_eq!(reward.status, RewardStatus::Sent);
    assert!(reward.code.is_some());
    assert_eq!(outcome.submission.status, SubmissionStatus::Approved);
    assert_eq!(fetch_job(&harness, &job.id).spots_filled, 1);

    let email = messages_to(&harness, "robin@example.com")
        .pop()
        .expect("approval email");
    assert!(email.text.contains("Canvas Tote"));
}

#[test]
fn gift_card_approval_never_waits_for_fulfillment() {
    let harness = harness();
    let mut spec = job_spec(RewardType::GiftCard, None, 1);
    spec.reward_giftcard_amount = Some(rust_decimal::Decimal::new(25, 0));
    let job = create_job(&harness, spec);
    let submission = submit(&harness, "robin@example.com", Some(&job.id));

    let outcome = harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect("gift card approval");

    assert_eq!(outcome.submission.status, SubmissionStatus::Approved);
    let reward = outcome.reward.expect("reward row");
    assert_eq!(reward.status, RewardStatus::PendingFulfillment);
    assert!(reward.code.is_none());
    assert_eq!(harness.issuer.calls(), 0);
    assert_eq!(outcome.notifications.operator, Some(NotificationStatus::Sent));
    assert_eq!(fetch_job(&harness, &job.id).status, JobStatus::Completed);

    let alert = messages_to(&harness, OWNER_EMAIL)
        .pop()
        .expect("operator alert");
    assert!(alert.subject.contains("$25.00 gift card"));
    assert!(alert.text.contains("robin@example.com"));
}

#[test]
fn cash_approval_includes_paypal_email_for_the_operator() {
    let harness = harness();
    let job = create_job(&harness, job_spec(RewardType::Cash, Some(50), 3));
    let mut request = photo_request("robin@example.com", Some(&job.id));
    request.paypal_email = Some("robin.pay@example.com".to_string());
    let submission = harness
        .service
        .submit(SHOP, request)
        .expect("submitted")
        .submission;

    let outcome = harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect("cash approval");

    assert_eq!(outcome.submission.status, SubmissionStatus::Approved);
    assert_eq!(
        outcome.reward.map(|reward| reward.status),
        Some(RewardStatus::PendingFulfillment)
    );
    let alert = messages_to(&harness, OWNER_EMAIL)
        .pop()
        .expect("operator alert");
    assert!(alert.text.contains("robin.pay@example.com"));
    assert!(alert.text.contains("$50.00 cash"));
}

#[test]
fn cash_approval_after_downgrade_requires_upgrade_and_changes_nothing() {
    let harness = harness();
    let job = create_job(&harness, job_spec(RewardType::Cash, Some(50), 3));
    let submission = submit(&harness, "robin@example.com", Some(&job.id));
    harness
        .service
        .register_installation(ShopInstallation {
            plan_name: Some("growth".to_string()),
            ..ShopInstallation::new(SHOP)
        })
        .expect("downgraded");

    let error = harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect_err("cash gated");

    assert!(matches!(
        error,
        CampaignError::UpgradeRequired(UpgradeReason::CashRewards { .. })
    ));
    let stored = harness
        .service
        .get_submission(SHOP, &submission.id)
        .expect("exists");
    assert_eq!(stored.status, SubmissionStatus::Pending);
    assert_eq!(fetch_job(&harness, &job.id).spots_filled, 0);
    assert!(harness
        .store
        .get_by_submission(&submission.id)
        .expect("ledger readable")
        .is_none());
}

#[test]
fn monthly_quota_blocks_the_fourth_approval_until_next_month() {
    let plans = PlanCatalog::new(Entitlements {
        limits: PlanLimits {
            max_jobs: Limit::Unbounded,
            monthly_approvals: Limit::Bounded(3),
        },
        ..Entitlements::pro()
    });
    let harness = build_harness(plans, "pro", None);
    let submissions: Vec<_> = (0..4)
        .map(|index| submit(&harness, &format!("fan{index}@example.com"), None))
        .collect();

    for submission in &submissions[..3] {
        harness
            .service
            .approve(SHOP, &submission.id, None)
            .expect("within quota");
    }
    let error = harness
        .service
        .approve(SHOP, &submissions[3].id, None)
        .expect_err("quota exhausted");

    match error {
        CampaignError::UpgradeRequired(UpgradeReason::MonthlyApprovals { limit, used, .. }) => {
            assert_eq!(limit, 3);
            assert_eq!(used, 3);
        }
        other => panic!("expected quota error, got {other:?}"),
    }
    let fourth = harness
        .service
        .get_submission(SHOP, &submissions[3].id)
        .expect("exists");
    assert_eq!(fourth.status, SubmissionStatus::Pending);

    harness.clock.set(
        chrono::Utc
            .with_ymd_and_hms(2026, 4, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp"),
    );
    let outcome = harness
        .service
        .approve(SHOP, &submissions[3].id, None)
        .expect("new month resets quota");
    assert_eq!(outcome.submission.status, SubmissionStatus::Approved);
}

#[test]
fn approving_twice_is_a_no_op() {
    let harness = harness();
    let job = create_job(&harness, job_spec(RewardType::Fixed, Some(10), 5));
    let submission = submit(&harness, "robin@example.com", Some(&job.id));

    let first = harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect("approved");
    let second = harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect("repeat approval");

    assert!(!first.already_approved);
    assert!(second.already_approved);
    assert_eq!(second.reward.map(|reward| reward.id), first.reward.map(|reward| reward.id));
    assert_eq!(harness.issuer.calls(), 1);
    assert_eq!(fetch_job(&harness, &job.id).spots_filled, 1);
}

#[test]
fn rejected_submissions_cannot_be_approved() {
    let harness = harness();
    let submission = submit(&harness, "robin@example.com", None);
    harness
        .service
        .reject(SHOP, &submission.id, None)
        .expect("rejected");

    let error = harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect_err("invalid transition");
    assert!(matches!(
        error,
        CampaignError::InvalidTransition {
            from: SubmissionStatus::Rejected,
            to: SubmissionStatus::Approved
        }
    ));
}

#[test]
fn rejecting_an_approval_reopens_the_completed_job() {
    let harness = harness();
    let job = create_job(&harness, job_spec(RewardType::Percentage, Some(15), 1));
    let submission = submit(&harness, "robin@example.com", Some(&job.id));
    harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect("approved");
    assert_eq!(fetch_job(&harness, &job.id).status, JobStatus::Completed);

    let outcome = harness
        .service
        .reject(SHOP, &submission.id, Some("The product is not visible"))
        .expect("rejected");

    assert_eq!(outcome.submission.status, SubmissionStatus::Rejected);
    let reopened = outcome.job.expect("job returned");
    assert_eq!(reopened.spots_filled, 0);
    assert_eq!(reopened.status, JobStatus::Active);
    assert_eq!(outcome.notification, Some(NotificationStatus::Sent));

    let email = messages_to(&harness, "robin@example.com")
        .pop()
        .expect("rejection email");
    assert!(email.text.contains("The product is not visible"));

    let again = harness
        .service
        .reject(SHOP, &submission.id, None)
        .expect("repeat rejection");
    assert!(again.already_rejected);
    assert_eq!(fetch_job(&harness, &job.id).spots_filled, 0);
}

#[test]
fn other_shops_cannot_moderate_and_unknown_ids_are_not_found() {
    let harness = harness();
    let submission = submit(&harness, "robin@example.com", None);

    let forbidden = harness
        .service
        .approve(OTHER_SHOP, &submission.id, None)
        .expect_err("foreign shop");
    assert!(matches!(forbidden, CampaignError::Forbidden { .. }));

    let missing = harness
        .service
        .approve(SHOP, &SubmissionId("sub-999999".to_string()), None)
        .expect_err("unknown id");
    assert!(matches!(missing, CampaignError::NotFound { .. }));
}

#[test]
fn email_failure_does_not_undo_a_minted_approval() {
    let harness = build_harness(PlanCatalog::standard(), "pro", Some(Arc::new(FailingSender)));
    let job = create_job(&harness, job_spec(RewardType::Percentage, Some(20), 2));
    let submission = submit(&harness, "robin@example.com", Some(&job.id));

    let outcome = harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect("approval stands");

    assert_eq!(outcome.submission.status, SubmissionStatus::Approved);
    assert!(!outcome.submission.reward_sent);
    assert!(matches!(
        outcome.notifications.customer,
        Some(NotificationStatus::Failed { .. })
    ));
    assert_eq!(
        outcome.reward.map(|reward| reward.status),
        Some(RewardStatus::Sent)
    );
}

#[test]
fn submissions_without_a_job_or_reward_approve_without_a_ledger_row() {
    let harness = harness();
    let loose = submit(&harness, "robin@example.com", None);
    let outcome = harness
        .service
        .approve(SHOP, &loose.id, None)
        .expect("approved");
    assert!(outcome.reward.is_none());
    assert!(outcome.job.is_none());

    let job = create_job(&harness, job_spec(RewardType::None, None, 1));
    let linked = submit(&harness, "sam@example.com", Some(&job.id));
    let outcome = harness
        .service
        .approve(SHOP, &linked.id, None)
        .expect("approved");
    assert!(outcome.reward.is_none());
    let job = outcome.job.expect("job");
    assert_eq!(job.spots_filled, 1);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(harness.issuer.calls(), 0);
}
