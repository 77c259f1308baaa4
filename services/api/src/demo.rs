use crate::infra::{LoggingOutbox, SimulatedDiscountIssuer};
use clap::Args;
use rust_decimal::Decimal;
use std::sync::Arc;
use ugc_rewards::error::AppError;
use ugc_rewards::workflows::campaigns::{
    ApprovalOutcome, CampaignDependencies, CampaignError, CampaignService, CampaignSettings,
    ContentType, JobSpec, LocalMediaStorage, RewardType, ShopInstallation, SubmissionRequest,
};

const DEMO_SHOP: &str = "demo-outfitters.myshopify.com";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Spots on the demo job. With one spot the second approval is refused.
    #[arg(long, default_value_t = 1)]
    pub(crate) spots: u32,
    /// Percentage discount offered by the demo job.
    #[arg(long, default_value_t = 20)]
    pub(crate) percent: u32,
    /// Make the first discount mint fail to show a submission kept pending and retried.
    #[arg(long)]
    pub(crate) fail_first_mint: bool,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            spots: 1,
            percent: 20,
            fail_first_mint: false,
        }
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        spots,
        percent,
        fail_first_mint,
    } = args;

    let issuer = Arc::new(if fail_first_mint {
        SimulatedDiscountIssuer::failing_once()
    } else {
        SimulatedDiscountIssuer::default()
    });
    let outbox = LoggingOutbox::default();
    let media = LocalMediaStorage::new(
        std::env::temp_dir().join("ugc-rewards-demo"),
        "/uploads",
    );
    let dependencies = CampaignDependencies::in_memory(
        ugc_rewards::workflows::campaigns::InMemoryStore::new(),
        issuer.clone(),
        Arc::new(outbox.clone()),
        Arc::new(media),
    );
    let service = CampaignService::new(dependencies, CampaignSettings::default());

    service.register_installation(ShopInstallation {
        shop_name: Some("Demo Outfitters".to_string()),
        plan_name: Some("growth".to_string()),
        notification_email: Some("team@demo-outfitters.test".to_string()),
        ..ShopInstallation::new(DEMO_SHOP)
    })?;

    let job = service.create_job(
        DEMO_SHOP,
        JobSpec {
            title: "Show us your trail setup".to_string(),
            description: "A photo of our gear in the wild".to_string(),
            requirements: "Product clearly visible".to_string(),
            content_type: ContentType::Photo,
            reward_type: RewardType::Percentage,
            reward_value: Some(Decimal::from(percent)),
            reward_product: None,
            reward_giftcard_amount: None,
            spots_available: spots,
            deadline: None,
        },
    )?;
    println!("UGC rewards demo");
    println!(
        "Job {} '{}' | {} | {} spot(s)",
        job.id,
        job.title,
        job.reward.describe(),
        job.spots_available
    );

    let customers = ["avery@example.com", "blake@example.com"];
    let mut submissions = Vec::with_capacity(customers.len());
    for email in customers {
        let outcome = service.submit(
            DEMO_SHOP,
            SubmissionRequest {
                customer_email: email.to_string(),
                customer_name: None,
                content_type: ContentType::Photo,
                content: "Camp at the ridge".to_string(),
                job_id: Some(job.id.clone()),
                paypal_email: None,
                media_url: Some(format!("https://cdn.demo.test/{email}.jpg")),
                media: None,
            },
        )?;
        println!(
            "- submission #{} from {} is {}",
            outcome.submission.shop_submission_number,
            email,
            outcome.submission.status.label()
        );
        submissions.push(outcome.submission);
    }

    println!("\nModeration");
    for submission in &submissions {
        let mut attempt = service.approve(DEMO_SHOP, &submission.id, None);
        if let Err(CampaignError::MintFailed { reward_id, .. }) = &attempt {
            println!(
                "- #{}: discount platform unavailable; kept pending with reward {} (retrying)",
                submission.shop_submission_number, reward_id
            );
            attempt = service.approve(DEMO_SHOP, &submission.id, None);
        }
        render_attempt(submission.shop_submission_number, attempt)?;
    }

    let job = service.jobs().get(&job.id)?;
    println!(
        "\nJob {} is {} with {}/{} spots filled; {} code(s) minted",
        job.id,
        job.status.label(),
        job.spots_filled,
        job.spots_available,
        issuer.minted()
    );

    let messages = outbox.outbox.messages();
    println!("\nOutbox ({} message(s))", messages.len());
    for message in messages {
        println!("- to {}: {}", message.to, message.subject);
    }

    Ok(())
}

fn render_attempt(
    number: u64,
    attempt: Result<ApprovalOutcome, CampaignError>,
) -> Result<(), AppError> {
    match attempt {
        Ok(outcome) => {
            let code = outcome
                .reward
                .as_ref()
                .and_then(|reward| reward.code.as_deref())
                .unwrap_or("none");
            println!(
                "- #{number}: {} with code {code}",
                outcome.submission.status.label()
            );
            Ok(())
        }
        Err(err @ CampaignError::CapacityExhausted { .. })
        | Err(err @ CampaignError::UpgradeRequired(_))
        | Err(err @ CampaignError::MintFailed { .. }) => {
            println!("- #{number}: not approved ({err})");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_runs_to_completion() {
        run_demo(DemoArgs::default()).expect("demo succeeds");
    }

    #[test]
    fn demo_recovers_from_a_failed_mint() {
        run_demo(DemoArgs {
            spots: 2,
            fail_first_mint: true,
            ..DemoArgs::default()
        })
        .expect("demo succeeds");
    }
}
