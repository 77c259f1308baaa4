use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{ContentType, JobChanges, JobId, JobSpec, SubmissionId};
use super::error::CampaignError;
use super::fulfillment::{CashFulfillment, GiftCardFulfillment};
use super::notifications::{EmailTemplate, NotificationKind};
use super::repository::RepositoryError;
use super::service::{CampaignService, SubmissionRequest};
use super::storage::{MediaUpload, StorageError};

/// Header carrying the authenticated merchant's shop domain. Set by the embedding layer.
pub const SHOP_DOMAIN_HEADER: &str = "x-shop-domain";

/// Router builder exposing the merchant, storefront and webhook endpoints.
pub fn campaign_router(service: Arc<CampaignService>) -> Router {
    Router::new()
        .route("/api/v1/jobs", post(create_job_handler).get(list_jobs_handler))
        .route("/api/v1/jobs/:job_id", patch(edit_job_handler))
        .route("/api/v1/storefront/:shop/jobs", get(storefront_jobs_handler))
        .route(
            "/api/v1/storefront/:shop/submissions",
            post(submit_handler),
        )
        .route("/api/v1/submissions", get(list_submissions_handler))
        .route("/api/v1/submissions/:submission_id", get(submission_handler))
        .route(
            "/api/v1/submissions/:submission_id/approve",
            post(approve_handler),
        )
        .route(
            "/api/v1/submissions/:submission_id/reject",
            post(reject_handler),
        )
        .route(
            "/api/v1/submissions/:submission_id/rewards/cash-fulfill",
            post(cash_fulfill_handler),
        )
        .route(
            "/api/v1/submissions/:submission_id/rewards/giftcard-fulfill",
            post(gift_card_fulfill_handler),
        )
        .route("/api/v1/rewards/pending", get(pending_rewards_handler))
        .route("/api/v1/email-templates/:kind", put(save_template_handler))
        .route("/api/v1/plan", get(plan_handler))
        .route("/webhooks/customers/redact", post(redact_handler))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DecisionPayload {
    #[serde(default)]
    pub(crate) additional_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MediaPayload {
    pub(crate) filename: String,
    /// Standard base64 of the file bytes.
    pub(crate) data: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionPayload {
    pub(crate) customer_email: String,
    #[serde(default)]
    pub(crate) customer_name: Option<String>,
    pub(crate) content_type: ContentType,
    #[serde(default)]
    pub(crate) content: String,
    #[serde(default)]
    pub(crate) job_id: Option<JobId>,
    #[serde(default)]
    pub(crate) paypal_email: Option<String>,
    #[serde(default)]
    pub(crate) media_url: Option<String>,
    #[serde(default)]
    pub(crate) media: Option<MediaPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RedactPayload {
    pub(crate) shop_domain: String,
    pub(crate) customer: RedactCustomer,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RedactCustomer {
    pub(crate) email: String,
}

fn shop_from(headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get(SHOP_DOMAIN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            let payload = json!({ "error": "missing X-Shop-Domain header" });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })
}

/// Run a service call on the blocking pool; collaborators may block on network I/O.
async fn run_blocking<T, F>(service: Arc<CampaignService>, call: F) -> Result<T, CampaignError>
where
    T: Send + 'static,
    F: FnOnce(&CampaignService) -> Result<T, CampaignError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || call(&service))
        .await
        .map_err(|err| CampaignError::Runtime(err.to_string()))?
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, CampaignError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn create_job_handler(
    State(service): State<Arc<CampaignService>>,
    headers: HeaderMap,
    Json(spec): Json<JobSpec>,
) -> Response {
    let shop = match shop_from(&headers) {
        Ok(shop) => shop,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| service.create_job(&shop, spec)).await;
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn list_jobs_handler(
    State(service): State<Arc<CampaignService>>,
    headers: HeaderMap,
) -> Response {
    let shop = match shop_from(&headers) {
        Ok(shop) => shop,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| service.list_jobs(&shop)).await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn edit_job_handler(
    State(service): State<Arc<CampaignService>>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
    Json(changes): Json<JobChanges>,
) -> Response {
    let shop = match shop_from(&headers) {
        Ok(shop) => shop,
        Err(response) => return response,
    };
    let id = JobId(job_id);
    let result =
        run_blocking(service, move |service| service.edit_job(&shop, &id, changes)).await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn storefront_jobs_handler(
    State(service): State<Arc<CampaignService>>,
    Path(shop): Path<String>,
) -> Response {
    let shop = shop.trim().to_ascii_lowercase();
    let result = run_blocking(service, move |service| service.storefront_jobs(&shop)).await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn submit_handler(
    State(service): State<Arc<CampaignService>>,
    Path(shop): Path<String>,
    Json(payload): Json<SubmissionPayload>,
) -> Response {
    let shop = shop.trim().to_ascii_lowercase();
    let media = match payload.media {
        Some(media) => match base64::engine::general_purpose::STANDARD.decode(media.data.trim()) {
            Ok(bytes) => Some(MediaUpload {
                filename: media.filename,
                bytes,
            }),
            Err(err) => {
                let payload = json!({ "error": format!("media data is not valid base64: {err}") });
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
            }
        },
        None => None,
    };

    let request = SubmissionRequest {
        customer_email: payload.customer_email,
        customer_name: payload.customer_name,
        content_type: payload.content_type,
        content: payload.content,
        job_id: payload.job_id,
        paypal_email: payload.paypal_email,
        media_url: payload.media_url,
        media,
    };
    let result = run_blocking(service, move |service| service.submit(&shop, request)).await;
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn list_submissions_handler(
    State(service): State<Arc<CampaignService>>,
    headers: HeaderMap,
) -> Response {
    let shop = match shop_from(&headers) {
        Ok(shop) => shop,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| service.list_submissions(&shop)).await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn submission_handler(
    State(service): State<Arc<CampaignService>>,
    headers: HeaderMap,
    Path(submission_id): Path<String>,
) -> Response {
    let shop = match shop_from(&headers) {
        Ok(shop) => shop,
        Err(response) => return response,
    };
    let id = SubmissionId(submission_id);
    let result =
        run_blocking(service, move |service| service.get_submission(&shop, &id)).await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn approve_handler(
    State(service): State<Arc<CampaignService>>,
    headers: HeaderMap,
    Path(submission_id): Path<String>,
    payload: Option<Json<DecisionPayload>>,
) -> Response {
    let shop = match shop_from(&headers) {
        Ok(shop) => shop,
        Err(response) => return response,
    };
    let id = SubmissionId(submission_id);
    let message = payload.and_then(|Json(payload)| payload.additional_message);
    let result = run_blocking(service, move |service| {
        service.approve(&shop, &id, message.as_deref())
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn reject_handler(
    State(service): State<Arc<CampaignService>>,
    headers: HeaderMap,
    Path(submission_id): Path<String>,
    payload: Option<Json<DecisionPayload>>,
) -> Response {
    let shop = match shop_from(&headers) {
        Ok(shop) => shop,
        Err(response) => return response,
    };
    let id = SubmissionId(submission_id);
    let message = payload.and_then(|Json(payload)| payload.additional_message);
    let result = run_blocking(service, move |service| {
        service.reject(&shop, &id, message.as_deref())
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn cash_fulfill_handler(
    State(service): State<Arc<CampaignService>>,
    headers: HeaderMap,
    Path(submission_id): Path<String>,
    Json(fulfillment): Json<CashFulfillment>,
) -> Response {
    let shop = match shop_from(&headers) {
        Ok(shop) => shop,
        Err(response) => return response,
    };
    let id = SubmissionId(submission_id);
    let result = run_blocking(service, move |service| {
        service.fulfill_cash(&shop, &id, fulfillment)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn gift_card_fulfill_handler(
    State(service): State<Arc<CampaignService>>,
    headers: HeaderMap,
    Path(submission_id): Path<String>,
    Json(fulfillment): Json<GiftCardFulfillment>,
) -> Response {
    let shop = match shop_from(&headers) {
        Ok(shop) => shop,
        Err(response) => return response,
    };
    let id = SubmissionId(submission_id);
    let result = run_blocking(service, move |service| {
        service.fulfill_gift_card(&shop, &id, fulfillment)
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn pending_rewards_handler(
    State(service): State<Arc<CampaignService>>,
    headers: HeaderMap,
) -> Response {
    let shop = match shop_from(&headers) {
        Ok(shop) => shop,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| service.pending_rewards(&shop)).await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn save_template_handler(
    State(service): State<Arc<CampaignService>>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Json(template): Json<EmailTemplate>,
) -> Response {
    let shop = match shop_from(&headers) {
        Ok(shop) => shop,
        Err(response) => return response,
    };
    let kind: NotificationKind = match kind.parse() {
        Ok(kind) => kind,
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
        }
    };
    let result = run_blocking(service, move |service| {
        service
            .save_template(&shop, kind, template.clone())
            .map(|()| json!({ "kind": kind, "template": template }))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn plan_handler(
    State(service): State<Arc<CampaignService>>,
    headers: HeaderMap,
) -> Response {
    let shop = match shop_from(&headers) {
        Ok(shop) => shop,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| service.plan(&shop)).await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn redact_handler(
    State(service): State<Arc<CampaignService>>,
    Json(payload): Json<RedactPayload>,
) -> Response {
    let shop = payload.shop_domain.trim().to_ascii_lowercase();
    let email = payload.customer.email;
    let result =
        run_blocking(service, move |service| service.redact_customer(&shop, &email)).await;
    respond(StatusCode::OK, result)
}

impl IntoResponse for CampaignError {
    fn into_response(self) -> Response {
        let status = match &self {
            CampaignError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CampaignError::NotFound { .. } => StatusCode::NOT_FOUND,
            CampaignError::Forbidden { .. } => StatusCode::FORBIDDEN,
            CampaignError::UpgradeRequired(reason) => {
                let payload = json!({
                    "error": self.to_string(),
                    "upgrade_required": true,
                    "reason": reason,
                });
                return (StatusCode::PAYMENT_REQUIRED, Json(payload)).into_response();
            }
            CampaignError::CapacityExhausted { .. }
            | CampaignError::DuplicateSubmission { .. }
            | CampaignError::InvalidTransition { .. }
            | CampaignError::SubmissionNotApproved { .. }
            | CampaignError::RewardNotFulfillable { .. }
            | CampaignError::RewardTypeMismatch { .. } => StatusCode::CONFLICT,
            CampaignError::MintFailed {
                submission_id,
                reward_id,
                ..
            } => {
                let payload = json!({
                    "error": self.to_string(),
                    "submission_id": submission_id,
                    "reward_id": reward_id,
                    "kept_pending": true,
                    "retry": true,
                });
                return (StatusCode::SERVICE_UNAVAILABLE, Json(payload)).into_response();
            }
            CampaignError::Storage(StorageError::Empty)
            | CampaignError::Storage(StorageError::UnsupportedMediaType(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CampaignError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            CampaignError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            CampaignError::Storage(_)
            | CampaignError::Repository(_)
            | CampaignError::Runtime(_) => {
                error!(error = %self, "campaign request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let payload = json!({ "error": self.to_string() });
        (status, Json(payload)).into_response()
    }
}
