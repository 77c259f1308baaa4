//! Process-local store backing every repository trait. Used by the development server,
//! the CLI demo and the test suites. A single mutex serializes all mutations, which gives
//! the capacity counter and per-shop numbering their atomicity.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    Job, JobChanges, JobId, JobStatus, NewJob, NewReward, NewSubmission, Reward, RewardChanges,
    RewardId, RewardStatus, ShopInstallation, Submission, SubmissionChanges, SubmissionId,
    SubmissionStatus,
};
use super::notifications::{
    EmailError, EmailMessage, EmailSender, EmailTemplate, NotificationKind,
};
use super::repository::{
    CapacityChange, InstallationRepository, JobRepository, RepositoryError, RewardLedger,
    SubmissionRepository, TemplateRepository,
};

#[derive(Debug, Default)]
struct State {
    next_job: u64,
    next_submission: u64,
    next_reward: u64,
    jobs: BTreeMap<JobId, Job>,
    submissions: BTreeMap<SubmissionId, Submission>,
    shop_sequences: HashMap<String, u64>,
    rewards: BTreeMap<RewardId, Reward>,
    installations: HashMap<String, ShopInstallation>,
    templates: HashMap<(String, NotificationKind), EmailTemplate>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl JobRepository for InMemoryStore {
    fn insert(&self, job: NewJob) -> Result<Job, RepositoryError> {
        let mut state = self.state()?;
        state.next_job += 1;
        let now = Utc::now();
        let job = Job {
            id: JobId(format!("job-{:06}", state.next_job)),
            shop_domain: job.shop_domain,
            title: job.title,
            description: job.description,
            requirements: job.requirements,
            content_type: job.content_type,
            status: JobStatus::Active,
            reward: job.reward,
            spots_available: job.spots_available,
            spots_filled: 0,
            deadline: job.deadline,
            created_at: now,
            updated_at: now,
        };
        state.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    fn fetch(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.state()?.jobs.get(id).cloned())
    }

    fn apply(&self, id: &JobId, changes: JobChanges) -> Result<Job, RepositoryError> {
        let mut state = self.state()?;
        let job = state.jobs.get_mut(id).ok_or(RepositoryError::NotFound)?;
        changes.apply_to(job);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    fn increment_spots_filled(&self, id: &JobId) -> Result<CapacityChange, RepositoryError> {
        let mut state = self.state()?;
        let job = state.jobs.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if job.spots_filled < job.spots_available {
            job.spots_filled += 1;
            job.updated_at = Utc::now();
            Ok(CapacityChange::Reserved(job.clone()))
        } else {
            Ok(CapacityChange::Full(job.clone()))
        }
    }

    fn decrement_spots_filled(&self, id: &JobId) -> Result<Job, RepositoryError> {
        let mut state = self.state()?;
        let job = state.jobs.get_mut(id).ok_or(RepositoryError::NotFound)?;
        job.spots_filled = job.spots_filled.saturating_sub(1);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    fn set_status(&self, id: &JobId, status: JobStatus) -> Result<Job, RepositoryError> {
        let mut state = self.state()?;
        let job = state.jobs.get_mut(id).ok_or(RepositoryError::NotFound)?;
        job.status = status;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    fn list_by_shop(&self, shop_domain: &str) -> Result<Vec<Job>, RepositoryError> {
        Ok(self
            .state()?
            .jobs
            .values()
            .filter(|job| job.shop_domain == shop_domain)
            .cloned()
            .collect())
    }
}

impl SubmissionRepository for InMemoryStore {
    fn insert(&self, submission: NewSubmission) -> Result<Submission, RepositoryError> {
        let mut state = self.state()?;
        if let Some(job_id) = &submission.job_id {
            let taken = state.submissions.values().any(|existing| {
                existing.job_id.as_ref() == Some(job_id)
                    && existing
                        .customer_email
                        .eq_ignore_ascii_case(&submission.customer_email)
            });
            if taken {
                return Err(RepositoryError::Conflict);
            }
        }
        state.next_submission += 1;
        let id = SubmissionId(format!("sub-{:06}", state.next_submission));
        let number = {
            let sequence = state
                .shop_sequences
                .entry(submission.shop_domain.clone())
                .or_insert(0);
            *sequence += 1;
            *sequence
        };
        let now = Utc::now();
        let submission = Submission {
            id: id.clone(),
            shop_domain: submission.shop_domain,
            shop_submission_number: number,
            customer_email: submission.customer_email,
            customer_name: submission.customer_name,
            content_type: submission.content_type,
            content: submission.content,
            media_url: submission.media_url,
            status: SubmissionStatus::Pending,
            job_id: submission.job_id,
            paypal_email: submission.paypal_email,
            reward_sent: false,
            reward_sent_at: None,
            reward_fulfilled: false,
            reward_fulfilled_at: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        state.submissions.insert(id, submission.clone());
        Ok(submission)
    }

    fn fetch(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        Ok(self.state()?.submissions.get(id).cloned())
    }

    fn apply(
        &self,
        id: &SubmissionId,
        changes: SubmissionChanges,
    ) -> Result<Submission, RepositoryError> {
        let mut state = self.state()?;
        let submission = state
            .submissions
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        changes.apply_to(submission);
        submission.updated_at = Utc::now();
        Ok(submission.clone())
    }

    fn count_approved_between(
        &self,
        shop_domain: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let count = self
            .state()?
            .submissions
            .values()
            .filter(|submission| {
                submission.shop_domain == shop_domain
                    && submission.status == SubmissionStatus::Approved
                    && submission
                        .approved_at
                        .map_or(false, |at| at >= start && at < end)
            })
            .count();
        Ok(count as u64)
    }

    fn exists_for_job(&self, customer_email: &str, job_id: &JobId) -> Result<bool, RepositoryError> {
        Ok(self.state()?.submissions.values().any(|submission| {
            submission.job_id.as_ref() == Some(job_id)
                && submission.customer_email.eq_ignore_ascii_case(customer_email)
        }))
    }

    fn list_by_shop(&self, shop_domain: &str) -> Result<Vec<Submission>, RepositoryError> {
        let mut submissions: Vec<Submission> = self
            .state()?
            .submissions
            .values()
            .filter(|submission| submission.shop_domain == shop_domain)
            .cloned()
            .collect();
        submissions.sort_by_key(|submission| submission.shop_submission_number);
        Ok(submissions)
    }

    fn delete_by_customer(
        &self,
        shop_domain: &str,
        customer_email: &str,
    ) -> Result<usize, RepositoryError> {
        let mut state = self.state()?;
        let before = state.submissions.len();
        state.submissions.retain(|_, submission| {
            !(submission.shop_domain == shop_domain
                && submission.customer_email.eq_ignore_ascii_case(customer_email))
        });
        Ok(before - state.submissions.len())
    }
}

impl RewardLedger for InMemoryStore {
    fn create(&self, reward: NewReward) -> Result<Reward, RepositoryError> {
        let mut state = self.state()?;
        if state
            .rewards
            .values()
            .any(|existing| existing.submission_id == reward.submission_id)
        {
            return Err(RepositoryError::Conflict);
        }
        state.next_reward += 1;
        let now = Utc::now();
        let reward = Reward {
            id: RewardId(format!("rwd-{:06}", state.next_reward)),
            submission_id: reward.submission_id,
            shop_domain: reward.shop_domain,
            reward_type: reward.reward_type,
            value: reward.value,
            code: reward.code,
            status: reward.status,
            expires_at: reward.expires_at,
            price_rule_id: reward.price_rule_id,
            discount_code_id: reward.discount_code_id,
            sent_at: reward.sent_at,
            fulfilled_at: None,
            fulfillment_notes: None,
            paypal_transaction_id: None,
            created_at: now,
            updated_at: now,
        };
        state.rewards.insert(reward.id.clone(), reward.clone());
        Ok(reward)
    }

    fn update(&self, id: &RewardId, changes: RewardChanges) -> Result<Reward, RepositoryError> {
        let mut state = self.state()?;
        let reward = state.rewards.get_mut(id).ok_or(RepositoryError::NotFound)?;
        changes.apply_to(reward);
        reward.updated_at = Utc::now();
        Ok(reward.clone())
    }

    fn get_by_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<Reward>, RepositoryError> {
        Ok(self
            .state()?
            .rewards
            .values()
            .find(|reward| &reward.submission_id == submission_id)
            .cloned())
    }

    fn list_by_status(
        &self,
        shop_domain: &str,
        status: RewardStatus,
    ) -> Result<Vec<Reward>, RepositoryError> {
        Ok(self
            .state()?
            .rewards
            .values()
            .filter(|reward| reward.shop_domain == shop_domain && reward.status == status)
            .cloned()
            .collect())
    }
}

impl InstallationRepository for InMemoryStore {
    fn fetch(&self, shop_domain: &str) -> Result<Option<ShopInstallation>, RepositoryError> {
        Ok(self.state()?.installations.get(shop_domain).cloned())
    }

    fn upsert(&self, installation: ShopInstallation) -> Result<(), RepositoryError> {
        self.state()?
            .installations
            .insert(installation.shop_domain.clone(), installation);
        Ok(())
    }
}

impl TemplateRepository for InMemoryStore {
    fn fetch_template(
        &self,
        shop_domain: &str,
        kind: NotificationKind,
    ) -> Result<Option<EmailTemplate>, RepositoryError> {
        Ok(self
            .state()?
            .templates
            .get(&(shop_domain.to_string(), kind))
            .cloned())
    }

    fn save_template(
        &self,
        shop_domain: &str,
        kind: NotificationKind,
        template: EmailTemplate,
    ) -> Result<(), RepositoryError> {
        self.state()?
            .templates
            .insert((shop_domain.to_string(), kind), template);
        Ok(())
    }
}

/// Email sender that keeps every message in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOutbox {
    messages: Arc<Mutex<Vec<EmailMessage>>>,
}

impl InMemoryOutbox {
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.messages
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl EmailSender for InMemoryOutbox {
    fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.messages
            .lock()
            .map_err(|_| EmailError::Transport("outbox mutex poisoned".to_string()))?
            .push(message.clone());
        Ok(())
    }
}
