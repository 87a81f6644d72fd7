//! Cohorts: named filter snapshots with cached counts.
//!
//! A cohort is created in [`CohortStatus::Processing`], moves to
//! [`CohortStatus::Active`] once its counts are computed, and to
//! [`CohortStatus::Error`] if that fails. Cached counts are served only
//! while they are younger than the configured TTL.

use std::fmt;
use std::time::Duration;

use audience_rs_core::AudienceResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assembler::{AudienceCounts, SqlQueryAssembler};
use crate::executor::{ExecutionContext, WarehouseExecutor};
use crate::filter::CohortFilters;
use crate::model::AudienceConfig;

/// Lifecycle state of a cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CohortStatus {
    /// Counts are being computed.
    Processing,
    /// Counts are available.
    Active,
    /// The last count computation failed.
    Error,
}

impl fmt::Display for CohortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Active => write!(f, "active"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A named filter snapshot over an audience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cohort {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// The audience the filters apply to.
    pub audience_id: String,
    /// The filter snapshot.
    pub filters: CohortFilters,
    /// Cached parent count.
    #[serde(default)]
    pub company_count: Option<i64>,
    /// Cached child count.
    #[serde(default)]
    pub people_count: Option<i64>,
    /// Lifecycle state.
    pub status: CohortStatus,
    /// Reason of the last failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the cached counts were computed.
    #[serde(default)]
    pub counts_refreshed_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Cohort {
    /// Creates a cohort in the processing state.
    pub fn new(
        name: impl Into<String>,
        audience_id: impl Into<String>,
        filters: CohortFilters,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            audience_id: audience_id.into(),
            filters,
            company_count: None,
            people_count: None,
            status: CohortStatus::Processing,
            error_message: None,
            counts_refreshed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Stores freshly computed counts and activates the cohort.
    pub fn mark_active(&mut self, counts: AudienceCounts, now: DateTime<Utc>) {
        self.company_count = Some(counts.company_count);
        self.people_count = Some(counts.people_count);
        self.counts_refreshed_at = Some(now);
        self.status = CohortStatus::Active;
        self.error_message = None;
    }

    /// Records a failed count computation.
    ///
    /// Previously cached counts are kept but no longer served.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = CohortStatus::Error;
        self.error_message = Some(message.into());
    }

    /// Returns `true` if the cohort is active and its counts are younger
    /// than `ttl` at `now`.
    pub fn counts_are_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        if self.status != CohortStatus::Active {
            return false;
        }
        let Some(refreshed_at) = self.counts_refreshed_at else {
            return false;
        };
        chrono::Duration::from_std(ttl).map_or(true, |ttl| now - refreshed_at < ttl)
    }

    /// Returns the cached counts if they are still fresh.
    pub fn cached_counts(&self, now: DateTime<Utc>, ttl: Duration) -> Option<AudienceCounts> {
        if !self.counts_are_fresh(now, ttl) {
            return None;
        }
        Some(AudienceCounts {
            company_count: self.company_count?,
            people_count: self.people_count?,
        })
    }
}

/// Recomputes a cohort's counts and moves it to `active` or `error`.
pub async fn refresh_cohort_counts(
    cohort: &mut Cohort,
    assembler: &SqlQueryAssembler,
    executor: &dyn WarehouseExecutor,
    ctx: &ExecutionContext,
    config: &AudienceConfig,
) -> AudienceResult<AudienceCounts> {
    cohort.status = CohortStatus::Processing;
    match assembler
        .get_counts(executor, ctx, &cohort.filters, config)
        .await
    {
        Ok(counts) => {
            cohort.mark_active(counts, Utc::now());
            tracing::info!(cohort = %cohort.id, "Cohort counts refreshed");
            Ok(counts)
        }
        Err(e) => {
            tracing::warn!(cohort = %cohort.id, error = %e, "Cohort count refresh failed");
            cohort.mark_failed(e.to_string());
            Err(e)
        }
    }
}
