use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use ugc_rewards::workflows::campaigns::{
    DiscountError, DiscountIssuer, DiscountRequest, EmailError, EmailMessage, EmailSender,
    InMemoryOutbox, InstallationRepository, IssuedCode,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Issues codes locally without calling the platform. Used by the demo and by development
/// shops that have no access token yet.
#[derive(Debug, Default)]
pub(crate) struct SimulatedDiscountIssuer {
    minted: AtomicUsize,
    fail_next: AtomicBool,
}

impl SimulatedDiscountIssuer {
    pub(crate) fn failing_once() -> Self {
        Self {
            minted: AtomicUsize::new(0),
            fail_next: AtomicBool::new(true),
        }
    }

    pub(crate) fn minted(&self) -> usize {
        self.minted.load(Ordering::SeqCst)
    }
}

impl DiscountIssuer for SimulatedDiscountIssuer {
    fn mint(&self, request: &DiscountRequest) -> Result<IssuedCode, DiscountError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(DiscountError::Transport(
                "simulated discount platform outage".to_string(),
            ));
        }
        self.minted.fetch_add(1, Ordering::SeqCst);
        info!(shop = %request.shop_domain, code = %request.code, "simulated discount code issued");
        Ok(IssuedCode {
            code: request.code.clone(),
            expires_at: request.expires_at,
            price_rule_id: None,
            discount_code_id: None,
        })
    }
}

/// Routes mints to the live client when the shop has an access token. Outside production a
/// shop without one gets a simulated code instead of a credentials error.
pub(crate) struct TokenAwareIssuer<L> {
    pub(crate) live: L,
    pub(crate) simulated: SimulatedDiscountIssuer,
    pub(crate) installations: Arc<dyn InstallationRepository>,
    pub(crate) allow_simulation: bool,
}

impl<L: DiscountIssuer> DiscountIssuer for TokenAwareIssuer<L> {
    fn mint(&self, request: &DiscountRequest) -> Result<IssuedCode, DiscountError> {
        let has_token = self
            .installations
            .fetch(&request.shop_domain)
            .map_err(|err| DiscountError::Transport(err.to_string()))?
            .and_then(|installation| installation.access_token)
            .is_some_and(|token| !token.trim().is_empty());

        if has_token || !self.allow_simulation {
            self.live.mint(request)
        } else {
            self.simulated.mint(request)
        }
    }
}

/// Keeps mail in memory and logs each message. Stands in for the relay in development.
#[derive(Debug, Default, Clone)]
pub(crate) struct LoggingOutbox {
    pub(crate) outbox: InMemoryOutbox,
}

impl EmailSender for LoggingOutbox {
    fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.outbox.send(message).map_err(|err| {
            warn!(to = %message.to, error = %err, "local outbox rejected message");
            err
        })?;
        info!(to = %message.to, subject = %message.subject, "email kept in local outbox");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use ugc_rewards::workflows::campaigns::{DiscountKind, InMemoryStore, ShopInstallation};

    struct RefusingIssuer;

    impl DiscountIssuer for RefusingIssuer {
        fn mint(&self, request: &DiscountRequest) -> Result<IssuedCode, DiscountError> {
            Err(DiscountError::MissingCredentials(request.shop_domain.clone()))
        }
    }

    fn request() -> DiscountRequest {
        DiscountRequest::new(
            "dev-shop.myshopify.com",
            DiscountKind::Percentage(Decimal::new(20, 0)),
            "robin@example.com",
            Utc::now(),
        )
    }

    fn issuer(store: &InMemoryStore, allow_simulation: bool) -> TokenAwareIssuer<RefusingIssuer> {
        TokenAwareIssuer {
            live: RefusingIssuer,
            simulated: SimulatedDiscountIssuer::default(),
            installations: Arc::new(store.clone()),
            allow_simulation,
        }
    }

    #[test]
    fn shops_without_tokens_are_simulated_in_development() {
        let store = InMemoryStore::new();
        let issuer = issuer(&store, true);
        let request = request();

        let issued = issuer.mint(&request).expect("simulated");
        assert_eq!(issued.code, request.code);
        assert_eq!(issuer.simulated.minted(), 1);
    }

    #[test]
    fn shops_with_tokens_and_production_use_the_live_client() {
        let store = InMemoryStore::new();
        store
            .upsert(ShopInstallation {
                access_token: Some("shpat_test".to_string()),
                ..ShopInstallation::new("dev-shop.myshopify.com")
            })
            .expect("installed");
        assert!(matches!(
            issuer(&store, true).mint(&request()),
            Err(DiscountError::MissingCredentials(_))
        ));

        let production = issuer(&InMemoryStore::new(), false);
        assert!(production.mint(&request()).is_err());
        assert_eq!(production.simulated.minted(), 0);
    }

    #[test]
    fn failing_once_recovers_on_the_next_mint() {
        let issuer = SimulatedDiscountIssuer::failing_once();
        assert!(issuer.mint(&request()).is_err());
        assert!(issuer.mint(&request()).is_ok());
        assert_eq!(issuer.minted(), 1);
    }

    #[test]
    fn logging_outbox_keeps_messages() {
        let sender = LoggingOutbox::default();
        sender
            .send(&EmailMessage {
                to: "robin@example.com".to_string(),
                subject: "Hello".to_string(),
                text: "Hi".to_string(),
                html: "<p>Hi</p>".to_string(),
            })
            .expect("sent");
        assert_eq!(sender.outbox.messages().len(), 1);
    }
}
