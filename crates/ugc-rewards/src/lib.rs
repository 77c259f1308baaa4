//! Merchant-run UGC reward campaigns: jobs with capped spots, customer submissions,
//! moderation, and single-use discount or manual rewards.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
