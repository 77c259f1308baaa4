use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};

use super::clock::Clock;
use super::domain::{
    ContentType, JobId, NewSubmission, Submission, SubmissionChanges, SubmissionId,
    SubmissionStatus,
};
use super::error::{CampaignError, ValidationError};
use super::repository::{RepositoryError, SubmissionRepository};

/// Submission bookkeeping: validation, per-shop numbering (delegated to the repository)
/// and the monthly approval count used for quota checks.
pub struct SubmissionStore {
    repository: Arc<dyn SubmissionRepository>,
    clock: Arc<dyn Clock>,
}

impl SubmissionStore {
    pub fn new(repository: Arc<dyn SubmissionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub fn create(&self, mut submission: NewSubmission) -> Result<Submission, CampaignError> {
        submission.customer_email = submission.customer_email.trim().to_string();
        submission.paypal_email = submission
            .paypal_email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());
        validate_submission(&submission)?;
        let (email, job_id) = (submission.customer_email.clone(), submission.job_id.clone());
        match self.repository.insert(submission) {
            Ok(submission) => Ok(submission),
            Err(RepositoryError::Conflict) => match job_id {
                Some(job_id) => Err(CampaignError::DuplicateSubmission { email, job_id }),
                None => Err(RepositoryError::Conflict.into()),
            },
            Err(err) => Err(err.into()),
        }
    }

    pub fn get(&self, id: &SubmissionId) -> Result<Submission, CampaignError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| CampaignError::submission_not_found(id))
    }

    pub fn find(&self, id: &SubmissionId) -> Result<Option<Submission>, CampaignError> {
        Ok(self.repository.fetch(id)?)
    }

    pub fn update_status(
        &self,
        id: &SubmissionId,
        status: SubmissionStatus,
    ) -> Result<Submission, CampaignError> {
        self.update(id, SubmissionChanges::status(status))
    }

    pub fn update(
        &self,
        id: &SubmissionId,
        changes: SubmissionChanges,
    ) -> Result<Submission, CampaignError> {
        Ok(self.repository.apply(id, changes)?)
    }

    /// Approvals whose `approved_at` falls in the current UTC calendar month.
    pub fn count_approved_this_month(&self, shop_domain: &str) -> Result<u64, CampaignError> {
        let (start, end) = month_bounds(self.clock.now());
        Ok(self
            .repository
            .count_approved_between(shop_domain, start, end)?)
    }

    pub fn check_duplicate(&self, customer_email: &str, job_id: &JobId) -> Result<bool, CampaignError> {
        Ok(self.repository.exists_for_job(customer_email.trim(), job_id)?)
    }

    pub fn list_by_shop(&self, shop_domain: &str) -> Result<Vec<Submission>, CampaignError> {
        Ok(self.repository.list_by_shop(shop_domain)?)
    }

    pub fn redact_customer(
        &self,
        shop_domain: &str,
        customer_email: &str,
    ) -> Result<usize, CampaignError> {
        Ok(self
            .repository
            .delete_by_customer(shop_domain, customer_email.trim())?)
    }
}

impl std::fmt::Debug for SubmissionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionStore").finish_non_exhaustive()
    }
}

/// `[first instant of the month, first instant of the next month)` in UTC.
pub fn month_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = first_of_month(now.year(), now.month());
    let end = if now.month() == 12 {
        first_of_month(now.year() + 1, 1)
    } else {
        first_of_month(now.year(), now.month() + 1)
    };
    (start, end)
}

fn first_of_month(year: i32, month: u32) -> DateTime<Utc> {
    // Midnight UTC on day one always exists.
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub(crate) fn validate_submission(submission: &NewSubmission) -> Result<(), ValidationError> {
    if submission.shop_domain.trim().is_empty() {
        return Err(ValidationError::EmptyField("shop_domain"));
    }
    if !is_valid_email(&submission.customer_email) {
        return Err(ValidationError::InvalidEmail(
            submission.customer_email.clone(),
        ));
    }
    if let Some(paypal) = &submission.paypal_email {
        if !is_valid_email(paypal) {
            return Err(ValidationError::InvalidEmail(paypal.clone()));
        }
    }
    if submission.content_type == ContentType::Review && submission.content.trim().is_empty() {
        return Err(ValidationError::EmptyField("content"));
    }
    Ok(())
}

pub(crate) fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}
