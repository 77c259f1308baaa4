use std::sync::Arc;

use super::common::*;
use crate::workflows::campaigns::domain::{
    RewardStatus, RewardType, ShopInstallation, SubmissionStatus,
};
use crate::workflows::campaigns::notifications::{
    EmailTemplate, NotificationDispatcher, NotificationError, NotificationKind, TemplateVariables,
};
use crate::workflows::campaigns::repository::{RewardLedger, TemplateRepository};
use crate::workflows::campaigns::{
    CampaignError, CashFulfillment, GiftCardFulfillment, InMemoryStore, NotificationStatus,
    ValidationError,
};

fn gift_card_job(harness: &Harness) -> crate::workflows::campaigns::Job {
    create_job(harness, job_spec(RewardType::GiftCard, Some(25), 5))
}

#[test]
fn merchant_templates_fill_placeholders_and_keep_unknown_ones() {
    let harness = harness();
    harness
        .service
        .save_template(
            SHOP,
            NotificationKind::Approved,
            EmailTemplate {
                subject: Some("{{shopName}} says thanks, {{customerName}}".to_string()),
                body: Some(
                    "Your {{type}} earned {{rewardValue}}.\n\nCode: {{discountCode}} {{favoriteColor}}"
                        .to_string(),
                ),
            },
        )
        .expect("template saved");
    let job = create_job(&harness, job_spec(RewardType::Percentage, Some(15), 2));
    let submission = submit(&harness, "robin@example.com", Some(&job.id));

    let outcome = harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect("approved");
    let code = outcome
        .reward
        .and_then(|reward| reward.code)
        .expect("code minted");

    let email = messages_to(&harness, "robin@example.com")
        .pop()
        .expect("approval email");
    assert_eq!(email.subject, "North Trail Outfitters says thanks, Robin");
    assert_eq!(
        email.text,
        format!("Your photo earned 15% off.\n\nCode: {code} {{{{favoriteColor}}}}")
    );
    assert!(email.html.contains("<p"));
}

#[test]
fn blank_template_fields_fall_back_to_defaults() {
    let harness = harness();
    harness
        .service
        .save_template(
            SHOP,
            NotificationKind::Rejected,
            EmailTemplate {
                subject: Some("About submission #{{submissionNumber}}".to_string()),
                body: Some("   ".to_string()),
            },
        )
        .expect("template saved");
    let submission = submit(&harness, "robin@example.com", None);
    harness
        .service
        .reject(SHOP, &submission.id, Some("Too blurry"))
        .expect("rejected");

    let email = messages_to(&harness, "robin@example.com")
        .pop()
        .expect("rejection email");
    assert_eq!(email.subject, "About submission #1");
    assert!(email.text.contains("Note from the team: Too blurry"));
}

#[test]
fn dispatcher_surfaces_delivery_errors() {
    let store = InMemoryStore::new();
    let dispatcher = NotificationDispatcher::new(Arc::new(store.clone()), Arc::new(FailingSender));
    let error = dispatcher
        .dispatch(
            SHOP,
            NotificationKind::Confirmation,
            "robin@example.com",
            &TemplateVariables::default(),
        )
        .expect_err("sender offline");
    assert!(matches!(error, NotificationError::Delivery(_)));

    store
        .save_template(SHOP, NotificationKind::Confirmation, EmailTemplate::default())
        .expect("saved");
    let message = dispatcher
        .compose(
            SHOP,
            NotificationKind::Confirmation,
            "robin@example.com",
            &TemplateVariables::default(),
        )
        .expect("composed");
    assert_eq!(message.subject, "We received your content submission");
    assert!(message.text.starts_with("Hi there,"));
}

#[test]
fn operator_alerts_fall_back_to_the_configured_address() {
    let harness = harness();
    harness
        .service
        .register_installation(ShopInstallation {
            plan_name: Some("pro".to_string()),
            notification_email: Some("  ".to_string()),
            ..ShopInstallation::new(SHOP)
        })
        .expect("reinstalled");
    let job = gift_card_job(&harness);
    let submission = submit(&harness, "robin@example.com", Some(&job.id));

    let outcome = harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect("approved");
    assert_eq!(outcome.notifications.operator, Some(NotificationStatus::Sent));
    assert_eq!(messages_to(&harness, FALLBACK_EMAIL).len(), 1);
    assert!(messages_to(&harness, OWNER_EMAIL).is_empty());
}

#[test]
fn gift_card_fulfillment_records_the_code_and_emails_it() {
    let harness = harness();
    let job = gift_card_job(&harness);
    let submission = submit(&harness, "robin@example.com", Some(&job.id));
    harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect("approved");
    assert_eq!(harness.service.pending_rewards(SHOP).expect("pending").len(), 1);

    let outcome = harness
        .service
        .fulfill_gift_card(
            SHOP,
            &submission.id,
            GiftCardFulfillment {
                gift_card_code: " GIFT-7Q2M-KX ".to_string(),
                notes: Some("Created in admin".to_string()),
            },
        )
        .expect("fulfilled");

    assert_eq!(outcome.reward.status, RewardStatus::Fulfilled);
    assert_eq!(outcome.reward.code.as_deref(), Some("GIFT-7Q2M-KX"));
    assert_eq!(outcome.reward.sent_at, Some(start_time()));
    assert_eq!(outcome.reward.fulfillment_notes.as_deref(), Some("Created in admin"));
    assert!(outcome.submission.reward_fulfilled);
    assert!(outcome.submission.reward_sent);
    assert_eq!(outcome.notification, Some(NotificationStatus::Sent));

    let email = messages_to(&harness, "robin@example.com")
        .pop()
        .expect("gift card email");
    assert!(email.text.contains("GIFT-7Q2M-KX"));
    assert!(email.text.contains("$25.00 gift card"));
    assert!(harness.service.pending_rewards(SHOP).expect("pending").is_empty());
}

#[test]
fn cash_fulfillment_records_the_transaction_without_email() {
    let harness = harness();
    let job = create_job(&harness, job_spec(RewardType::Cash, Some(40), 2));
    let submission = submit(&harness, "robin@example.com", Some(&job.id));
    harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect("approved");
    let sent_before = harness.outbox.messages().len();

    let blank = harness
        .service
        .fulfill_cash(SHOP, &submission.id, CashFulfillment::default())
        .expect_err("transaction id required");
    assert!(matches!(
        blank,
        CampaignError::Validation(ValidationError::EmptyField("paypal_transaction_id"))
    ));

    let outcome = harness
        .service
        .fulfill_cash(
            SHOP,
            &submission.id,
            CashFulfillment {
                paypal_transaction_id: "8TX12345AB".to_string(),
                notes: None,
            },
        )
        .expect("fulfilled");
    assert_eq!(outcome.reward.status, RewardStatus::Fulfilled);
    assert_eq!(
        outcome.reward.paypal_transaction_id.as_deref(),
        Some("8TX12345AB")
    );
    assert_eq!(outcome.reward.fulfilled_at, Some(start_time()));
    assert!(outcome.notification.is_none());
    assert_eq!(harness.outbox.messages().len(), sent_before);
}

#[test]
fn fulfillment_checks_reward_type_and_status() {
    let harness = harness();
    let job = gift_card_job(&harness);
    let submission = submit(&harness, "robin@example.com", Some(&job.id));
    harness
        .service
        .approve(SHOP, &submission.id, None)
        .expect("approved");

    let mismatch = harness
        .service
        .fulfill_cash(
            SHOP,
            &submission.id,
            CashFulfillment {
                paypal_transaction_id: "8TX".to_string(),
                notes: None,
            },
        )
        .expect_err("wrong branch");
    assert!(matches!(
        mismatch,
        CampaignError::RewardTypeMismatch {
            actual: RewardType::GiftCard,
            expected: RewardType::Cash,
            ..
        }
    ));

    let fulfillment = GiftCardFulfillment {
        gift_card_code: "GIFT-1".to_string(),
        notes: None,
    };
    harness
        .service
        .fulfill_gift_card(SHOP, &submission.id, fulfillment.clone())
        .expect("first fulfillment");
    let again = harness
        .service
        .fulfill_gift_card(SHOP, &submission.id, fulfillment)
        .expect_err("already fulfilled");
    assert!(matches!(
        again,
        CampaignError::RewardNotFulfillable {
            actual: RewardStatus::Fulfilled,
            ..
        }
    ));

    let plain = submit(&harness, "sam@example.com", None);
    let missing = harness
        .service
        .fulfill_gift_card(
            SHOP,
            &plain.id,
            GiftCardFulfillment {
                gift_card_code: "GIFT-2".to_string(),
                notes: None,
            },
        )
        .expect_err("no reward row");
    assert!(matches!(
        missing,
        CampaignError::NotFound {
            entity: "reward",
            ..
        }
    ));
}

#[test]
fn rejected_submissions_leave_the_queue_and_are_never_paid() {
    let harness = harness();
    let gift = gift_card_job(&harness);
    let cash = create_job(&harness, job_spec(RewardType::Cash, Some(40), 5));
    let gift_entry = submit(&harness, "robin@example.com", Some(&gift.id));
    let cash_entry = submit(&harness, "sam@example.com", Some(&cash.id));
    for submission in [&gift_entry, &cash_entry] {
        harness
            .service
            .approve(SHOP, &submission.id, None)
            .expect("approved");
    }
    assert_eq!(harness.service.pending_rewards(SHOP).expect("pending").len(), 2);

    for submission in [&gift_entry, &cash_entry] {
        harness
            .service
            .reject(SHOP, &submission.id, Some("Content removed after review"))
            .expect("rejected");
    }
    assert!(harness.service.pending_rewards(SHOP).expect("pending").is_empty());

    let cash_error = harness
        .service
        .fulfill_cash(
            SHOP,
            &cash_entry.id,
            CashFulfillment {
                paypal_transaction_id: "8TX12345AB".to_string(),
                notes: None,
            },
        )
        .expect_err("rejected entries are not paid");
    assert!(matches!(
        cash_error,
        CampaignError::SubmissionNotApproved {
            status: SubmissionStatus::Rejected,
            ..
        }
    ));

    let sent_before = messages_to(&harness, "robin@example.com").len();
    let gift_error = harness
        .service
        .fulfill_gift_card(
            SHOP,
            &gift_entry.id,
            GiftCardFulfillment {
                gift_card_code: "GIFT-7Q2M-KX".to_string(),
                notes: None,
            },
        )
        .expect_err("rejected entries are not paid");
    assert!(matches!(
        gift_error,
        CampaignError::SubmissionNotApproved {
            status: SubmissionStatus::Rejected,
            ..
        }
    ));
    assert_eq!(messages_to(&harness, "robin@example.com").len(), sent_before);

    let reward = harness
        .store
        .get_by_submission(&cash_entry.id)
        .expect("ledger reads")
        .expect("reward kept");
    assert_eq!(reward.status, RewardStatus::PendingFulfillment);
    assert!(reward.paypal_transaction_id.is_none());
}

#[test]
fn pending_rewards_list_oldest_first_and_skip_minted_codes() {
    let harness = harness();
    let gift = gift_card_job(&harness);
    let cash = create_job(&harness, job_spec(RewardType::Cash, Some(40), 5));
    let coded = create_job(&harness, job_spec(RewardType::Percentage, Some(10), 5));

    let first = submit(&harness, "a@example.com", Some(&gift.id));
    let second = submit(&harness, "b@example.com", Some(&cash.id));
    let third = submit(&harness, "c@example.com", Some(&coded.id));
    for submission in [&first, &second, &third] {
        harness
            .service
            .approve(SHOP, &submission.id, None)
            .expect("approved");
    }

    let pending: Vec<_> = harness
        .service
        .pending_rewards(SHOP)
        .expect("pending")
        .into_iter()
        .map(|reward| (reward.submission_id, reward.reward_type))
        .collect();
    assert_eq!(
        pending,
        vec![
            (first.id, RewardType::GiftCard),
            (second.id, RewardType::Cash)
        ]
    );
    assert!(harness
        .service
        .pending_rewards(OTHER_SHOP)
        .expect("pending")
        .is_empty());
}
