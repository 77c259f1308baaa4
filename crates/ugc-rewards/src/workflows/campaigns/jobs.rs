use std::sync::Arc;

use tracing::info;

use super::clock::Clock;
use super::domain::{Job, JobChanges, JobId, JobSpec, JobStatus, NewJob, RewardTerms};
use super::error::{CampaignError, UpgradeReason, ValidationError};
use super::plans::Entitlements;
use super::repository::{CapacityChange, JobRepository};

/// Job lifecycle on top of a [`JobRepository`]: validation, plan gating and the
/// completed/active transitions that follow capacity changes.
pub struct JobRegistry {
    repository: Arc<dyn JobRepository>,
    clock: Arc<dyn Clock>,
}

impl JobRegistry {
    pub fn new(repository: Arc<dyn JobRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Validate and persist a new job as `active` with no spots filled.
    pub fn create(
        &self,
        shop_domain: &str,
        spec: JobSpec,
        entitlements: &Entitlements,
    ) -> Result<Job, CampaignError> {
        let title = spec.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::EmptyField("title").into());
        }
        if spec.spots_available == 0 {
            return Err(ValidationError::NoSpotsAvailable.into());
        }
        let reward = spec.reward_terms()?;
        self.check_plan(shop_domain, &reward, entitlements)?;

        let job = self.repository.insert(NewJob {
            shop_domain: shop_domain.to_string(),
            title,
            description: spec.description,
            requirements: spec.requirements,
            content_type: spec.content_type,
            reward,
            spots_available: spec.spots_available,
            deadline: spec.deadline,
        })?;
        info!(shop = shop_domain, job_id = %job.id, reward = job.reward.reward_type().label(), "job created");
        Ok(job)
    }

    fn check_plan(
        &self,
        shop_domain: &str,
        reward: &RewardTerms,
        entitlements: &Entitlements,
    ) -> Result<(), CampaignError> {
        let reward_type = reward.reward_type();
        if matches!(reward, RewardTerms::Cash { .. }) && !entitlements.features.cash_rewards {
            return Err(CampaignError::UpgradeRequired(UpgradeReason::CashRewards {
                tier: entitlements.tier,
            }));
        }
        if !entitlements.allows_reward(reward_type) {
            return Err(CampaignError::UpgradeRequired(
                UpgradeReason::RewardNotIncluded {
                    tier: entitlements.tier,
                    reward_type,
                },
            ));
        }
        self.check_active_slot(shop_domain, entitlements)
    }

    /// One more active job must fit under the plan's `max_jobs`.
    fn check_active_slot(
        &self,
        shop_domain: &str,
        entitlements: &Entitlements,
    ) -> Result<(), CampaignError> {
        let active = self
            .repository
            .list_by_shop(shop_domain)?
            .iter()
            .filter(|job| job.status == JobStatus::Active)
            .count();
        let max_jobs = entitlements.limits.max_jobs;
        if !max_jobs.allows(active as u64) {
            return Err(CampaignError::UpgradeRequired(UpgradeReason::ActiveJobs {
                tier: entitlements.tier,
                limit: max_jobs.bound().unwrap_or_default(),
            }));
        }
        Ok(())
    }

    pub fn get(&self, id: &JobId) -> Result<Job, CampaignError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| CampaignError::job_not_found(id))
    }

    /// Fetch a job the given shop owns.
    pub fn get_owned(&self, shop_domain: &str, id: &JobId) -> Result<Job, CampaignError> {
        let job = self.get(id)?;
        if job.shop_domain != shop_domain {
            return Err(CampaignError::Forbidden {
                entity: "job",
                id: id.0.clone(),
            });
        }
        Ok(job)
    }

    /// Take one spot. A job that becomes full moves to `completed`.
    pub fn increment(&self, id: &JobId) -> Result<CapacityChange, CampaignError> {
        match self.repository.increment_spots_filled(id)? {
            CapacityChange::Reserved(job) if job.is_full() && job.status != JobStatus::Completed => {
                let job = self.repository.set_status(id, JobStatus::Completed)?;
                info!(job_id = %id, spots = job.spots_available, "job completed");
                Ok(CapacityChange::Reserved(job))
            }
            change => Ok(change),
        }
    }

    /// Give a spot back. A completed job with room again returns to `active`.
    pub fn decrement(&self, id: &JobId) -> Result<Job, CampaignError> {
        let job = self.repository.decrement_spots_filled(id)?;
        if job.status == JobStatus::Completed && !job.is_full() {
            let job = self.repository.set_status(id, JobStatus::Active)?;
            info!(job_id = %id, spots_filled = job.spots_filled, "job reopened");
            return Ok(job);
        }
        Ok(job)
    }

    pub fn update_status(&self, id: &JobId, status: JobStatus) -> Result<Job, CampaignError> {
        self.get(id)?;
        Ok(self.repository.set_status(id, status)?)
    }

    /// Merchant edit. Completion is never set by hand; it follows capacity. Resuming a
    /// paused job takes an active slot like a new job does.
    pub fn edit(
        &self,
        shop_domain: &str,
        id: &JobId,
        mut changes: JobChanges,
        entitlements: &Entitlements,
    ) -> Result<Job, CampaignError> {
        let job = self.get_owned(shop_domain, id)?;

        if changes.status == Some(JobStatus::Completed) {
            return Err(ValidationError::ManualCompletion.into());
        }
        if job.status == JobStatus::Paused && changes.status == Some(JobStatus::Active) {
            self.check_active_slot(shop_domain, entitlements)?;
        }
        if let Some(title) = changes.title.as_mut() {
            *title = title.trim().to_string();
            if title.is_empty() {
                return Err(ValidationError::EmptyField("title").into());
            }
        }
        if let Some(requested) = changes.spots_available {
            if requested == 0 {
                return Err(ValidationError::NoSpotsAvailable.into());
            }
            if requested < job.spots_filled {
                return Err(ValidationError::SpotsBelowFilled {
                    requested,
                    filled: job.spots_filled,
                }
                .into());
            }
        }

        let job = self.repository.apply(id, changes)?;
        let settled = match job.status {
            JobStatus::Active if job.is_full() => Some(JobStatus::Completed),
            JobStatus::Completed if !job.is_full() => Some(JobStatus::Active),
            _ => None,
        };
        match settled {
            Some(status) => Ok(self.repository.set_status(id, status)?),
            None => Ok(job),
        }
    }

    /// Jobs open to the storefront right now.
    pub fn list_active(&self, shop_domain: &str) -> Result<Vec<Job>, CampaignError> {
        let now = self.clock.now();
        Ok(self
            .repository
            .list_by_shop(shop_domain)?
            .into_iter()
            .filter(|job| job.accepts_submissions(now))
            .collect())
    }

    pub fn list_by_shop(&self, shop_domain: &str) -> Result<Vec<Job>, CampaignError> {
        Ok(self.repository.list_by_shop(shop_domain)?)
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry").finish_non_exhaustive()
    }
}
