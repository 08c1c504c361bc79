//! Dated ESG metric snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::company::CompanyId;

/// Store-assigned snapshot identifier.
pub type SnapshotId = i64;

/// Environmental metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalMetrics {
    /// tonnes CO2e
    pub co2_emissions: Option<f64>,
    /// MWh
    pub energy_consumption: Option<f64>,
    /// m³
    pub water_usage: Option<f64>,
    /// tonnes
    pub waste_generated: Option<f64>,
    /// percent
    pub renewable_energy_percent: Option<f64>,
}

/// Social metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialMetrics {
    /// Headcount.
    pub employee_count: Option<i64>,
    /// percent
    pub diversity_ratio: Option<f64>,
    /// Recorded incidents in the period.
    pub safety_incidents: Option<i64>,
    /// Hours per employee.
    pub training_hours: Option<f64>,
    /// Currency amount.
    pub community_investment: Option<f64>,
}

/// Governance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernanceMetrics {
    /// percent
    pub board_independence: Option<f64>,
    /// percent
    pub board_diversity: Option<f64>,
    /// Recorded violations in the period.
    pub ethics_violations: Option<i64>,
    /// Recorded breaches in the period.
    pub data_breaches: Option<i64>,
    /// Short description of the ethics policy in force.
    #[serde(default)]
    pub ethics_policy: Option<String>,
}

/// Qualitative risk assessment, one text per ESG category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Environmental risk summary.
    #[serde(default)]
    pub environmental: Option<String>,
    /// Social risk summary.
    #[serde(default)]
    pub social: Option<String>,
    /// Governance risk summary.
    #[serde(default)]
    pub governance: Option<String>,
}

/// One dated set of ESG metrics for a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsgSnapshot {
    /// Store-assigned identifier.
    pub id: SnapshotId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Measurement date.
    pub date: DateTime<Utc>,
    /// Environmental group.
    pub environmental: EnvironmentalMetrics,
    /// Social group.
    pub social: SocialMetrics,
    /// Governance group.
    pub governance: GovernanceMetrics,
    /// Risk texts.
    #[serde(default)]
    pub risks: RiskAssessment,
}

impl EsgSnapshot {
    /// Ordering key for "most recent": date, then id.
    pub fn recency_key(&self) -> (DateTime<Utc>, SnapshotId) {
        (self.date, self.id)
    }
}

/// A snapshot that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSnapshot {
    /// Owning company (must exist).
    pub company_id: CompanyId,
    /// Measurement date.
    pub date: DateTime<Utc>,
    /// Environmental group.
    pub environmental: EnvironmentalMetrics,
    /// Social group.
    pub social: SocialMetrics,
    /// Governance group.
    pub governance: GovernanceMetrics,
    /// Risk texts.
    #[serde(default)]
    pub risks: RiskAssessment,
}

impl NewSnapshot {
    /// Snapshot with every metric unset.
    pub fn empty(company_id: CompanyId, date: DateTime<Utc>) -> Self {
        Self {
            company_id,
            date,
            environmental: EnvironmentalMetrics::default(),
            social: SocialMetrics::default(),
            governance: GovernanceMetrics::default(),
            risks: RiskAssessment::default(),
        }
    }

    /// Attach the store-assigned id.
    pub fn into_snapshot(self, id: SnapshotId) -> EsgSnapshot {
        EsgSnapshot {
            id,
            company_id: self.company_id,
            date: self.date,
            environmental: self.environmental,
            social: self.social,
            governance: self.governance,
            risks: self.risks,
        }
    }
}
