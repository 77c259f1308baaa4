use crate::infra::AppState;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use ugc_rewards::workflows::campaigns::{
    campaign_router, CampaignError, CampaignService, ShopInstallation, SHOP_DOMAIN_HEADER,
};

/// Installation callback from the embedding app after OAuth completes.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct InstallationRequest {
    #[serde(default)]
    pub(crate) shop_name: Option<String>,
    #[serde(default)]
    pub(crate) plan_name: Option<String>,
    #[serde(default)]
    pub(crate) notification_email: Option<String>,
    #[serde(default)]
    pub(crate) access_token: Option<String>,
}

pub(crate) fn with_campaign_routes(service: Arc<CampaignService>) -> axum::Router {
    campaign_router(service.clone())
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/installation",
            axum::routing::put(installation_endpoint),
        )
        .layer(Extension(service))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn installation_endpoint(
    Extension(service): Extension<Arc<CampaignService>>,
    headers: HeaderMap,
    Json(request): Json<InstallationRequest>,
) -> Response {
    let shop = match headers
        .get(SHOP_DOMAIN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
    {
        Some(shop) => shop,
        None => {
            let payload = json!({ "error": "missing X-Shop-Domain header" });
            return (StatusCode::UNAUTHORIZED, Json(payload)).into_response();
        }
    };

    let installation = ShopInstallation {
        shop_domain: shop.clone(),
        shop_name: request.shop_name,
        plan_name: request.plan_name,
        notification_email: request.notification_email,
        access_token: request.access_token,
    };
    let result = tokio::task::spawn_blocking(move || {
        service.register_installation(installation)?;
        service.plan(&shop)
    })
    .await
    .map_err(|err| CampaignError::Runtime(err.to_string()))
    .and_then(|result| result);

    match result {
        Ok(plan) => (StatusCode::OK, Json(plan)).into_response(),
        Err(err) => err.into_response(),
    }
}
