use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::discounts::DiscountIssuer;
use super::domain::{
    ContentType, Job, JobChanges, JobId, JobSpec, JobStatus, NewSubmission, ShopInstallation,
    Submission, SubmissionId,
};
use super::error::{CampaignError, ValidationError};
use super::jobs::JobRegistry;
use super::memory::InMemoryStore;
use super::notifications::{
    EmailSender, EmailTemplate, NotificationDispatcher, NotificationKind, TemplateVariables,
};
use super::plans::{Entitlements, PlanCatalog};
use super::repository::{
    InstallationRepository, JobRepository, RewardLedger, SubmissionRepository, TemplateRepository,
};
use super::storage::{MediaStorage, MediaUpload};
use super::submissions::SubmissionStore;

/// Collaborators the campaign service is wired from.
pub struct CampaignDependencies {
    pub jobs: Arc<dyn JobRepository>,
    pub submissions: Arc<dyn SubmissionRepository>,
    pub rewards: Arc<dyn RewardLedger>,
    pub installations: Arc<dyn InstallationRepository>,
    pub templates: Arc<dyn TemplateRepository>,
    pub discounts: Arc<dyn DiscountIssuer>,
    pub email: Arc<dyn EmailSender>,
    pub media: Arc<dyn MediaStorage>,
    pub clock: Arc<dyn Clock>,
}

impl CampaignDependencies {
    /// Every repository backed by one shared in-memory store.
    pub fn in_memory(
        store: InMemoryStore,
        discounts: Arc<dyn DiscountIssuer>,
        email: Arc<dyn EmailSender>,
        media: Arc<dyn MediaStorage>,
    ) -> Self {
        let store = Arc::new(store);
        Self {
            jobs: store.clone(),
            submissions: store.clone(),
            rewards: store.clone(),
            installations: store.clone(),
            templates: store,
            discounts,
            email,
            media,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CampaignSettings {
    pub plans: PlanCatalog,
    /// Receives manual-fulfillment alerts for shops without their own address.
    pub fallback_notification_email: Option<String>,
}

/// Result of a best-effort email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    Failed { reason: String },
    Skipped,
}

impl NotificationStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotificationStatus::Sent)
    }
}

/// Customer submission as received from the storefront.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub content_type: ContentType,
    pub content: String,
    pub job_id: Option<JobId>,
    pub paypal_email: Option<String>,
    pub media_url: Option<String>,
    pub media: Option<MediaUpload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntakeOutcome {
    pub submission: Submission,
    pub confirmation: NotificationStatus,
}

/// Plan summary shown to the merchant.
#[derive(Debug, Clone, Serialize)]
pub struct PlanView {
    pub plan_name: Option<String>,
    pub entitlements: Entitlements,
    pub approvals_this_month: u64,
    pub active_jobs: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionReport {
    pub shop_domain: String,
    pub submissions_removed: usize,
}

/// Installation and resolved plan for the shop acting on a request.
#[derive(Debug, Clone)]
pub(super) struct ShopContext {
    pub(super) shop_domain: String,
    pub(super) installation: Option<ShopInstallation>,
    pub(super) entitlements: Entitlements,
}

impl ShopContext {
    pub(super) fn shop_name(&self) -> String {
        self.installation
            .as_ref()
            .and_then(|installation| installation.shop_name.clone())
            .unwrap_or_else(|| self.shop_domain.clone())
    }

    pub(super) fn operator_email(&self, fallback: Option<&str>) -> Option<String> {
        self.installation
            .as_ref()
            .and_then(|installation| installation.notification_email.clone())
            .filter(|email| !email.trim().is_empty())
            .or_else(|| fallback.map(str::to_string))
    }
}

/// Entry point for every merchant and storefront operation on campaigns.
pub struct CampaignService {
    pub(super) jobs: JobRegistry,
    pub(super) submissions: SubmissionStore,
    pub(super) rewards: Arc<dyn RewardLedger>,
    pub(super) installations: Arc<dyn InstallationRepository>,
    pub(super) templates: Arc<dyn TemplateRepository>,
    pub(super) discounts: Arc<dyn DiscountIssuer>,
    pub(super) notifications: NotificationDispatcher,
    pub(super) media: Arc<dyn MediaStorage>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) settings: CampaignSettings,
}

impl CampaignService {
    pub fn new(dependencies: CampaignDependencies, settings: CampaignSettings) -> Self {
        let CampaignDependencies {
            jobs,
            submissions,
            rewards,
            installations,
            templates,
            discounts,
            email,
            media,
            clock,
        } = dependencies;

        Self {
            jobs: JobRegistry::new(jobs, clock.clone()),
            submissions: SubmissionStore::new(submissions, clock.clone()),
            rewards,
            installations,
            notifications: NotificationDispatcher::new(templates.clone(), email),
            templates,
            discounts,
            media,
            clock,
            settings,
        }
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub fn submissions(&self) -> &SubmissionStore {
        &self.submissions
    }

    pub fn register_installation(&self, installation: ShopInstallation) -> Result<(), CampaignError> {
        info!(shop = %installation.shop_domain, plan = ?installation.plan_name, "installation recorded");
        Ok(self.installations.upsert(installation)?)
    }

    pub(super) fn shop_context(&self, shop_domain: &str) -> Result<ShopContext, CampaignError> {
        let installation = self.installations.fetch(shop_domain)?;
        let entitlements = self
            .settings
            .plans
            .resolve(installation.as_ref().and_then(|i| i.plan_name.as_deref()))
            .clone();
        Ok(ShopContext {
            shop_domain: shop_domain.to_string(),
            installation,
            entitlements,
        })
    }

    pub fn entitlements_for(&self, shop_domain: &str) -> Result<Entitlements, CampaignError> {
        Ok(self.shop_context(shop_domain)?.entitlements)
    }

    pub fn create_job(&self, shop_domain: &str, spec: JobSpec) -> Result<Job, CampaignError> {
        let context = self.shop_context(shop_domain)?;
        self.jobs.create(shop_domain, spec, &context.entitlements)
    }

    pub fn edit_job(
        &self,
        shop_domain: &str,
        job_id: &JobId,
        changes: JobChanges,
    ) -> Result<Job, CampaignError> {
        let context = self.shop_context(shop_domain)?;
        self.jobs.edit(shop_domain, job_id, changes, &context.entitlements)
    }

    pub fn list_jobs(&self, shop_domain: &str) -> Result<Vec<Job>, CampaignError> {
        self.jobs.list_by_shop(shop_domain)
    }

    pub fn storefront_jobs(&self, shop_domain: &str) -> Result<Vec<Job>, CampaignError> {
        self.jobs.list_active(shop_domain)
    }

    /// Storefront intake: validate, store media, number the submission and confirm by email.
    pub fn submit(
        &self,
        shop_domain: &str,
        request: SubmissionRequest,
    ) -> Result<IntakeOutcome, CampaignError> {
        let SubmissionRequest {
            customer_email,
            customer_name,
            content_type,
            content,
            job_id,
            paypal_email,
            media_url,
            media,
        } = request;
        let customer_email = customer_email.trim().to_string();
        let paypal_email = paypal_email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());
        let context = self.shop_context(shop_domain)?;

        let job = match &job_id {
            Some(id) => {
                let job = self.jobs.get_owned(shop_domain, id)?;
                if !job.accepts_submissions(self.clock.now()) {
                    return Err(ValidationError::JobClosed(id.clone()).into());
                }
                if self.submissions.check_duplicate(&customer_email, id)? {
                    return Err(CampaignError::DuplicateSubmission {
                        email: customer_email.clone(),
                        job_id: id.clone(),
                    });
                }
                Some(job)
            }
            None => None,
        };

        let mut submission = NewSubmission {
            shop_domain: shop_domain.to_string(),
            customer_email,
            customer_name: customer_name.filter(|name| !name.trim().is_empty()),
            content_type,
            content,
            media_url: media_url.filter(|url| !url.trim().is_empty()),
            job_id,
            paypal_email,
        };
        super::submissions::validate_submission(&submission)?;

        let needs_media = matches!(content_type, ContentType::Photo | ContentType::Video);
        match media {
            Some(upload) => submission.media_url = Some(self.media.store(&upload)?),
            None if needs_media && submission.media_url.is_none() => {
                return Err(ValidationError::EmptyField("media").into());
            }
            None => {}
        }

        let submission = self.submissions.create(submission)?;
        info!(
            shop = shop_domain,
            submission_id = %submission.id,
            number = submission.shop_submission_number,
            "submission received"
        );

        let mut variables = self.variables(&context, &submission);
        variables.job_title = job.map(|job| job.title);
        let confirmation = self.notify(
            shop_domain,
            NotificationKind::Confirmation,
            &submission.customer_email,
            &variables,
        );

        Ok(IntakeOutcome {
            submission,
            confirmation,
        })
    }

    /// Load a submission and its job, enforcing that the shop owns one of them.
    pub(super) fn owned_submission(
        &self,
        shop_domain: &str,
        id: &SubmissionId,
    ) -> Result<(Submission, Option<Job>), CampaignError> {
        let submission = self.submissions.get(id)?;
        let job = match &submission.job_id {
            Some(job_id) => Some(self.jobs.get(job_id)?),
            None => None,
        };

        let owned = submission.shop_domain == shop_domain
            || job.as_ref().map_or(false, |job| job.shop_domain == shop_domain);
        if !owned {
            return Err(CampaignError::Forbidden {
                entity: "submission",
                id: id.0.clone(),
            });
        }
        Ok((submission, job))
    }

    pub fn get_submission(
        &self,
        shop_domain: &str,
        id: &SubmissionId,
    ) -> Result<Submission, CampaignError> {
        Ok(self.owned_submission(shop_domain, id)?.0)
    }

    pub fn list_submissions(&self, shop_domain: &str) -> Result<Vec<Submission>, CampaignError> {
        self.submissions.list_by_shop(shop_domain)
    }

    pub fn save_template(
        &self,
        shop_domain: &str,
        kind: NotificationKind,
        template: EmailTemplate,
    ) -> Result<(), CampaignError> {
        self.templates.save_template(shop_domain, kind, template)?;
        info!(shop = shop_domain, kind = %kind, "email template saved");
        Ok(())
    }

    pub fn plan(&self, shop_domain: &str) -> Result<PlanView, CampaignError> {
        let context = self.shop_context(shop_domain)?;
        let approvals_this_month = self.submissions.count_approved_this_month(shop_domain)?;
        let active_jobs = self
            .jobs
            .list_by_shop(shop_domain)?
            .iter()
            .filter(|job| job.status == JobStatus::Active)
            .count();
        Ok(PlanView {
            plan_name: context
                .installation
                .and_then(|installation| installation.plan_name),
            entitlements: context.entitlements,
            approvals_this_month,
            active_jobs,
        })
    }

    /// Privacy webhook: erase a customer's submissions. Reward rows stay for bookkeeping.
    pub fn redact_customer(
        &self,
        shop_domain: &str,
        customer_email: &str,
    ) -> Result<RedactionReport, CampaignError> {
        let removed = self.submissions.redact_customer(shop_domain, customer_email)?;
        info!(shop = shop_domain, removed, "customer data redacted");
        Ok(RedactionReport {
            shop_domain: shop_domain.to_string(),
            submissions_removed: removed,
        })
    }

    pub(super) fn variables(&self, context: &ShopContext, submission: &Submission) -> TemplateVariables {
        TemplateVariables {
            content_type: Some(submission.content_type.label().to_string()),
            status: Some(submission.status.label().to_string()),
            customer_name: submission.customer_name.clone(),
            customer_email: Some(submission.customer_email.clone()),
            shop_name: Some(context.shop_name()),
            submission_number: Some(submission.shop_submission_number.to_string()),
            paypal_email: submission.paypal_email.clone(),
            ..TemplateVariables::default()
        }
    }

    /// Send an email without letting a delivery failure undo the caller's work.
    pub(super) fn notify(
        &self,
        shop_domain: &str,
        kind: NotificationKind,
        to: &str,
        variables: &TemplateVariables,
    ) -> NotificationStatus {
        match self.notifications.dispatch(shop_domain, kind, to, variables) {
            Ok(_) => NotificationStatus::Sent,
            Err(err) => {
                warn!(shop = shop_domain, kind = %kind, error = %err, "notification delivery failed");
                NotificationStatus::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}

impl std::fmt::Debug for CampaignService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CampaignService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
