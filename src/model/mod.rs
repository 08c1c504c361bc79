//! Core record types: companies and their ESG snapshots.

pub mod company;
pub mod snapshot;

pub use company::{Company, CompanyId, CompanyUpdate, NewCompany, Patch};
pub use snapshot::{
    EnvironmentalMetrics, EsgSnapshot, GovernanceMetrics, NewSnapshot, RiskAssessment,
    SnapshotId, SocialMetrics,
};
