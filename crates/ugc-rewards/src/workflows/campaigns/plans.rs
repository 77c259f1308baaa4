//! Subscription plan catalog and entitlement resolution.
//!
//! Plans are an immutable table built once at startup. Resolution is total: any name the
//! catalog does not know, including a missing one, maps to the base tier.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::domain::RewardType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Starter,
    Growth,
    Pro,
}

impl PlanTier {
    pub const fn label(self) -> &'static str {
        match self {
            PlanTier::Starter => "starter",
            PlanTier::Growth => "growth",
            PlanTier::Pro => "pro",
        }
    }
}

/// Numeric plan limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limit {
    Bounded(u32),
    Unbounded,
}

impl Limit {
    /// Whether one more unit fits when `used` units are already consumed.
    pub fn allows(self, used: u64) -> bool {
        match self {
            Limit::Bounded(limit) => used < u64::from(limit),
            Limit::Unbounded => true,
        }
    }

    pub fn bound(self) -> Option<u32> {
        match self {
            Limit::Bounded(limit) => Some(limit),
            Limit::Unbounded => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_jobs: Limit,
    pub monthly_approvals: Limit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub cash_rewards: bool,
    pub advanced_styling: bool,
    pub priority_support: bool,
}

/// Limits and features derived from a merchant's plan name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlements {
    pub tier: PlanTier,
    pub limits: PlanLimits,
    pub reward_types: BTreeSet<RewardType>,
    pub features: FeatureFlags,
}

impl Entitlements {
    pub fn starter() -> Self {
        Self {
            tier: PlanTier::Starter,
            limits: PlanLimits {
                max_jobs: Limit::Bounded(3),
                monthly_approvals: Limit::Bounded(25),
            },
            reward_types: [RewardType::None, RewardType::Percentage, RewardType::Fixed]
                .into_iter()
                .collect(),
            features: FeatureFlags::default(),
        }
    }

    pub fn growth() -> Self {
        Self {
            tier: PlanTier::Growth,
            limits: PlanLimits {
                max_jobs: Limit::Bounded(10),
                monthly_approvals: Limit::Bounded(250),
            },
            reward_types: [
                RewardType::None,
                RewardType::Percentage,
                RewardType::Fixed,
                RewardType::Product,
                RewardType::GiftCard,
            ]
            .into_iter()
            .collect(),
            features: FeatureFlags {
                advanced_styling: true,
                ..FeatureFlags::default()
            },
        }
    }

    pub fn pro() -> Self {
        Self {
            tier: PlanTier::Pro,
            limits: PlanLimits {
                max_jobs: Limit::Unbounded,
                monthly_approvals: Limit::Unbounded,
            },
            reward_types: [
                RewardType::None,
                RewardType::Percentage,
                RewardType::Fixed,
                RewardType::Product,
                RewardType::GiftCard,
                RewardType::Cash,
            ]
            .into_iter()
            .collect(),
            features: FeatureFlags {
                cash_rewards: true,
                advanced_styling: true,
                priority_support: true,
            },
        }
    }

    pub fn allows_reward(&self, reward_type: RewardType) -> bool {
        self.reward_types.contains(&reward_type)
    }
}

/// Immutable lookup table from plan name to entitlements.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    base: Entitlements,
    plans: BTreeMap<String, Entitlements>,
}

impl PlanCatalog {
    /// Catalog with only a base tier; every name resolves to it until plans are added.
    pub fn new(base: Entitlements) -> Self {
        Self {
            base,
            plans: BTreeMap::new(),
        }
    }

    pub fn standard() -> Self {
        Self::new(Entitlements::starter())
            .with_plan(&["starter", "free", "basic"], Entitlements::starter())
            .with_plan(&["growth"], Entitlements::growth())
            .with_plan(&["pro", "premium", "professional"], Entitlements::pro())
    }

    pub fn with_plan(mut self, names: &[&str], entitlements: Entitlements) -> Self {
        for name in names {
            self.plans
                .insert(name.trim().to_ascii_lowercase(), entitlements.clone());
        }
        self
    }

    pub fn resolve(&self, plan_name: Option<&str>) -> &Entitlements {
        plan_name
            .map(|name| name.trim().to_ascii_lowercase())
            .and_then(|name| self.plans.get(&name))
            .unwrap_or(&self.base)
    }

    pub fn base(&self) -> &Entitlements {
        &self.base
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// Resolve against the process-wide standard catalog.
pub fn resolve_entitlements(plan_name: Option<&str>) -> &'static Entitlements {
    static CATALOG: OnceLock<PlanCatalog> = OnceLock::new();
    CATALOG.get_or_init(PlanCatalog::standard).resolve(plan_name)
}
