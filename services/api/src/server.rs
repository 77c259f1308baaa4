use crate::cli::ServeArgs;
use crate::infra::{AppState, LoggingOutbox, SimulatedDiscountIssuer, TokenAwareIssuer};
use crate::routes::with_campaign_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;
use ugc_rewards::config::{AppConfig, AppEnvironment};
use ugc_rewards::error::AppError;
use ugc_rewards::telemetry;
use ugc_rewards::workflows::campaigns::{
    CampaignDependencies, CampaignService, CampaignSettings, EmailSender, HttpEmailSender,
    InMemoryStore, InstallationRepository, LocalMediaStorage, PlanCatalog, ShopifyDiscountClient,
};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = InMemoryStore::new();
    let installations: Arc<dyn InstallationRepository> = Arc::new(store.clone());
    let runtime = Handle::current();

    let live = ShopifyDiscountClient::new(&config.shopify, runtime.clone(), installations.clone())?;
    let issuer = TokenAwareIssuer {
        live,
        simulated: SimulatedDiscountIssuer::default(),
        installations,
        allow_simulation: config.environment != AppEnvironment::Production,
    };

    let email: Arc<dyn EmailSender> = match &config.notifications.relay {
        Some(relay) => Arc::new(HttpEmailSender::new(
            relay,
            &config.notifications.from_address,
            runtime,
        )),
        None => {
            info!("no email relay configured; messages stay in the local outbox");
            Arc::new(LoggingOutbox::default())
        }
    };
    let media = LocalMediaStorage::new(
        &config.media.upload_dir,
        config.media.public_base_url.clone(),
    );

    let dependencies =
        CampaignDependencies::in_memory(store, Arc::new(issuer), email, Arc::new(media));
    let settings = CampaignSettings {
        plans: PlanCatalog::standard(),
        fallback_notification_email: config.notifications.fallback_email.clone(),
    };
    let campaign_service = Arc::new(CampaignService::new(dependencies, settings));

    let app = with_campaign_routes(campaign_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "ugc rewards service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
