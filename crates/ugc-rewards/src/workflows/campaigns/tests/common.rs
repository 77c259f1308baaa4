use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::workflows::campaigns::discounts::{
    DiscountError, DiscountIssuer, DiscountRequest, IssuedCode,
};
use crate::workflows::campaigns::domain::{
    ContentType, Job, JobId, JobSpec, RewardProduct, RewardType, ShopInstallation, Submission,
};
use crate::workflows::campaigns::notifications::{EmailError, EmailMessage, EmailSender};
use crate::workflows::campaigns::storage::{MediaStorage, MediaUpload, StorageError};
use crate::workflows::campaigns::{
    CampaignDependencies, CampaignService, CampaignSettings, FixedClock, InMemoryOutbox,
    InMemoryStore, PlanCatalog, SubmissionRequest,
};

pub(super) const SHOP: &str = "north-trail.myshopify.com";
pub(super) const OTHER_SHOP: &str = "rival-gear.myshopify.com";
pub(super) const OWNER_EMAIL: &str = "owner@north-trail.test";
pub(super) const FALLBACK_EMAIL: &str = "ops@rewards.test";

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Discount issuer that echoes the requested code, or fails while `failing` is set.
#[derive(Default)]
pub(super) struct StubIssuer {
    failing: AtomicBool,
    calls: AtomicUsize,
    requests: Mutex<Vec<DiscountRequest>>,
}

impl StubIssuer {
    pub(super) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) fn requests(&self) -> Vec<DiscountRequest> {
        self.requests.lock().expect("requests mutex").clone()
    }
}

impl DiscountIssuer for StubIssuer {
    fn mint(&self, request: &DiscountRequest) -> Result<IssuedCode, DiscountError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("requests mutex")
            .push(request.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(DiscountError::Timeout(Duration::from_secs(10)));
        }
        Ok(IssuedCode {
            code: request.code.clone(),
            expires_at: request.expires_at,
            price_rule_id: Some("gid://shopify/DiscountCodeNode/1".to_string()),
            discount_code_id: Some("gid://shopify/DiscountRedeemCode/1".to_string()),
        })
    }
}

pub(super) struct FailingSender;

impl EmailSender for FailingSender {
    fn send(&self, _message: &EmailMessage) -> Result<(), EmailError> {
        Err(EmailError::Transport("relay offline".to_string()))
    }
}

/// Media storage that hands back a CDN-style URL without touching disk.
pub(super) struct MemoryMedia;

impl MediaStorage for MemoryMedia {
    fn store(&self, upload: &MediaUpload) -> Result<String, StorageError> {
        if upload.bytes.is_empty() {
            return Err(StorageError::Empty);
        }
        Ok(format!("https://cdn.test/{}", upload.filename))
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<CampaignService>,
    pub(super) store: InMemoryStore,
    pub(super) issuer: Arc<StubIssuer>,
    pub(super) outbox: InMemoryOutbox,
    pub(super) clock: Arc<FixedClock>,
}

pub(super) fn harness() -> Harness {
    build_harness(PlanCatalog::standard(), "pro", None)
}

pub(super) fn harness_on_plan(plan_name: &str) -> Harness {
    build_harness(PlanCatalog::standard(), plan_name, None)
}

pub(super) fn build_harness(
    plans: PlanCatalog,
    plan_name: &str,
    sender: Option<Arc<dyn EmailSender>>,
) -> Harness {
    let store = InMemoryStore::new();
    let issuer = Arc::new(StubIssuer::default());
    let outbox = InMemoryOutbox::default();
    let clock = Arc::new(FixedClock::new(start_time()));
    let sender: Arc<dyn EmailSender> = sender.unwrap_or_else(|| Arc::new(outbox.clone()));

    let dependencies =
        CampaignDependencies::in_memory(store.clone(), issuer.clone(), sender, Arc::new(MemoryMedia))
            .with_clock(clock.clone());
    let settings = CampaignSettings {
        plans,
        fallback_notification_email: Some(FALLBACK_EMAIL.to_string()),
    };
    let service = Arc::new(CampaignService::new(dependencies, settings));

    service
        .register_installation(ShopInstallation {
            shop_domain: SHOP.to_string(),
            shop_name: Some("North Trail Outfitters".to_string()),
            plan_name: Some(plan_name.to_string()),
            notification_email: Some(OWNER_EMAIL.to_string()),
            access_token: None,
        })
        .expect("installation stored");

    Harness {
        service,
        store,
        issuer,
        outbox,
        clock,
    }
}

pub(super) fn job_spec(reward_type: RewardType, value: Option<i64>, spots: u32) -> JobSpec {
    JobSpec {
        title: "Trail-tested photo".to_string(),
        description: "Show our packs on the trail".to_string(),
        requirements: "Landscape orientation".to_string(),
        content_type: ContentType::Photo,
        reward_type,
        reward_value: value.map(|value| Decimal::new(value, 0)),
        reward_product: None,
        reward_giftcard_amount: None,
        spots_available: spots,
        deadline: None,
    }
}

pub(super) fn product_spec(spots: u32) -> JobSpec {
    JobSpec {
        reward_product: Some(RewardProduct {
            product_id: "gid://shopify/Product/4242".to_string(),
            handle: Some("canvas-tote".to_string()),
            title: Some("Canvas Tote".to_string()),
            image_url: None,
            price: Some(Decimal::new(2400, 2)),
        }),
        ..job_spec(RewardType::Product, None, spots)
    }
}

pub(super) fn create_job(harness: &Harness, spec: JobSpec) -> Job {
    harness
        .service
        .create_job(SHOP, spec)
        .expect("job created")
}

pub(super) fn photo_request(email: &str, job_id: Option<&JobId>) -> SubmissionRequest {
    SubmissionRequest {
        customer_email: email.to_string(),
        customer_name: Some("Robin".to_string()),
        content_type: ContentType::Photo,
        content: "Summit at dawn".to_string(),
        job_id: job_id.cloned(),
        paypal_email: None,
        media_url: Some("https://cdn.test/summit.jpg".to_string()),
        media: None,
    }
}

pub(super) fn submit(harness: &Harness, email: &str, job_id: Option<&JobId>) -> Submission {
    harness
        .service
        .submit(SHOP, photo_request(email, job_id))
        .expect("submission accepted")
        .submission
}

pub(super) fn fetch_job(harness: &Harness, id: &JobId) -> Job {
    harness.service.jobs().get(id).expect("job exists")
}

pub(super) fn messages_to(harness: &Harness, to: &str) -> Vec<EmailMessage> {
    harness
        .outbox
        .messages()
        .into_iter()
        .filter(|message| message.to == to)
        .collect()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
