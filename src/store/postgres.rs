//! PostgreSQL ESG store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (default: postgresql://localhost/esg)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)
//!
//! ## Locking
//!
//! Company updates take the row lock with `FOR UPDATE NOWAIT`, so a row held
//! by another writer fails fast with SQLSTATE `55P03` instead of queueing.
//! That code, serialization failures (`40001`) and deadlocks (`40P01`) are
//! classified as [`StoreErrorKind::LockContention`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

use crate::model::{
    Company, CompanyId, CompanyUpdate, EnvironmentalMetrics, EsgSnapshot, GovernanceMetrics,
    NewCompany, NewSnapshot, RiskAssessment, SocialMetrics,
};
use super::{ClassifyError, EsgStore, StoreErrorKind};

/// DDL for the ESG tables, one statement per entry.
///
/// Every statement is idempotent; [`PostgresEsgStore::ensure_schema`] runs them in order.
pub const ESG_SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS companies (
    id BIGSERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    industry VARCHAR(50),
    size VARCHAR(20),
    country VARCHAR(50),
    description TEXT,
    environmental_highlight TEXT,
    social_highlight TEXT,
    governance_highlight TEXT
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS esg_snapshots (
    id BIGSERIAL PRIMARY KEY,
    company_id BIGINT NOT NULL REFERENCES companies(id),
    date TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    co2_emissions DOUBLE PRECISION,
    energy_consumption DOUBLE PRECISION,
    water_usage DOUBLE PRECISION,
    waste_generated DOUBLE PRECISION,
    renewable_energy_percent DOUBLE PRECISION,

    employee_count BIGINT,
    diversity_ratio DOUBLE PRECISION,
    safety_incidents BIGINT,
    training_hours DOUBLE PRECISION,
    community_investment DOUBLE PRECISION,

    board_independence DOUBLE PRECISION,
    board_diversity DOUBLE PRECISION,
    ethics_violations BIGINT,
    data_breaches BIGINT,
    ethics_policy TEXT,

    environmental_risks TEXT,
    social_risks TEXT,
    governance_risks TEXT
)
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_esg_snapshots_company_date
    ON esg_snapshots(company_id, date DESC, id DESC)
"#,
];

const COMPANY_COLUMNS: &str = "id, name, industry, size, country, description, \
     environmental_highlight, social_highlight, governance_highlight";

const SNAPSHOT_COLUMNS: &str = "id, company_id, date, \
     co2_emissions, energy_consumption, water_usage, waste_generated, renewable_energy_percent, \
     employee_count, diversity_ratio, safety_incidents, training_hours, community_investment, \
     board_independence, board_diversity, ethics_violations, data_breaches, ethics_policy, \
     environmental_risks, social_risks, governance_risks";

/// Configuration for PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        }

        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/esg".to_string()),
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// PostgreSQL ESG store.
pub struct PostgresEsgStore {
    pool: PgPool,
}

impl PostgresEsgStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the ESG tables if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        for statement in ESG_SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!(statements = ESG_SCHEMA.len(), "ESG schema ensured");
        Ok(())
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    fn parse_company_row(row: &PgRow) -> Result<Company, sqlx::Error> {
        Ok(Company {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            industry: row.try_get("industry")?,
            size: row.try_get("size")?,
            country: row.try_get("country")?,
            description: row.try_get("description")?,
            environmental_highlight: row.try_get("environmental_highlight")?,
            social_highlight: row.try_get("social_highlight")?,
            governance_highlight: row.try_get("governance_highlight")?,
        })
    }

    fn parse_snapshot_row(row: &PgRow) -> Result<EsgSnapshot, sqlx::Error> {
        let date: DateTime<Utc> = row.try_get("date")?;

        Ok(EsgSnapshot {
            id: row.try_get("id")?,
            company_id: row.try_get("company_id")?,
            date,
            environmental: EnvironmentalMetrics {
                co2_emissions: row.try_get("co2_emissions")?,
                energy_consumption: row.try_get("energy_consumption")?,
                water_usage: row.try_get("water_usage")?,
                waste_generated: row.try_get("waste_generated")?,
                renewable_energy_percent: row.try_get("renewable_energy_percent")?,
            },
            social: SocialMetrics {
                employee_count: row.try_get("employee_count")?,
                diversity_ratio: row.try_get("diversity_ratio")?,
                safety_incidents: row.try_get("safety_incidents")?,
                training_hours: row.try_get("training_hours")?,
                community_investment: row.try_get("community_investment")?,
            },
            governance: GovernanceMetrics {
                board_independence: row.try_get("board_independence")?,
                board_diversity: row.try_get("board_diversity")?,
                ethics_violations: row.try_get("ethics_violations")?,
                data_breaches: row.try_get("data_breaches")?,
                ethics_policy: row.try_get("ethics_policy")?,
            },
            risks: RiskAssessment {
                environmental: row.try_get("environmental_risks")?,
                social: row.try_get("social_risks")?,
                governance: row.try_get("governance_risks")?,
            },
        })
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

/// Error type for PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Snapshot references a company that does not exist.
    #[error("Company not found: {0}")]
    UnknownCompany(CompanyId),
}

impl ClassifyError for PostgresError {
    fn kind(&self) -> StoreErrorKind {
        match self {
            Self::UnknownCompany(_) => StoreErrorKind::MissingCompany,
            Self::Database(sqlx::Error::Database(db)) => match db.code().as_deref() {
                Some("55P03") | Some("40001") | Some("40P01") => StoreErrorKind::LockContention,
                Some("23503") => StoreErrorKind::MissingCompany,
                _ => StoreErrorKind::Other,
            },
            Self::Database(_) => StoreErrorKind::Other,
        }
    }
}

#[async_trait]
impl EsgStore for PostgresEsgStore {
    type Error = PostgresError;

    async fn list_companies(&self) -> Result<Vec<Company>, Self::Error> {
        let rows = sqlx::query(&format!("SELECT {COMPANY_COLUMNS} FROM companies ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(Self::parse_company_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(PostgresError::from)
    }

    async fn get_company(&self, id: CompanyId) -> Result<Option<Company>, Self::Error> {
        let row = sqlx::query(&format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(Self::parse_company_row(r)?)),
            None => Ok(None),
        }
    }

    async fn create_company(&self, company: NewCompany) -> Result<Company, Self::Error> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO companies (name, industry, size, country, description,
                                   environmental_highlight, social_highlight, governance_highlight)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COMPANY_COLUMNS}
            "#
        ))
        .bind(&company.name)
        .bind(&company.industry)
        .bind(&company.size)
        .bind(&company.country)
        .bind(&company.description)
        .bind(&company.environmental_highlight)
        .bind(&company.social_highlight)
        .bind(&company.governance_highlight)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::parse_company_row(&row)?)
    }

    async fn update_company(&self, update: &CompanyUpdate) -> Result<Option<Company>, Self::Error> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1 FOR UPDATE NOWAIT"
        ))
        .bind(update.id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            // Dropping the transaction rolls it back.
            return Ok(None);
        };

        let mut company = Self::parse_company_row(&row)?;
        update.apply_to(&mut company);

        sqlx::query(
            r#"
            UPDATE companies
            SET description = $2,
                environmental_highlight = $3,
                social_highlight = $4,
                governance_highlight = $5
            WHERE id = $1
            "#,
        )
        .bind(company.id)
        .bind(&company.description)
        .bind(&company.environmental_highlight)
        .bind(&company.social_highlight)
        .bind(&company.governance_highlight)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(company))
    }

    async fn list_snapshots(
        &self,
        company_id: Option<CompanyId>,
    ) -> Result<Vec<EsgSnapshot>, Self::Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SNAPSHOT_COLUMNS}
            FROM esg_snapshots
            WHERE $1::BIGINT IS NULL OR company_id = $1
            ORDER BY id
            "#
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(Self::parse_snapshot_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(PostgresError::from)
    }

    async fn latest_snapshot(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<EsgSnapshot>, Self::Error> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SNAPSHOT_COLUMNS}
            FROM esg_snapshots
            WHERE company_id = $1
            ORDER BY date DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(Self::parse_snapshot_row(r)?)),
            None => Ok(None),
        }
    }

    async fn insert_snapshots(
        &self,
        snapshots: Vec<NewSnapshot>,
    ) -> Result<Vec<EsgSnapshot>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(snapshots.len());

        for snapshot in snapshots {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM companies WHERE id = $1)")
                    .bind(snapshot.company_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists {
                return Err(PostgresError::UnknownCompany(snapshot.company_id));
            }

            let env = &snapshot.environmental;
            let social = &snapshot.social;
            let gov = &snapshot.governance;
            let risks = &snapshot.risks;

            let row = sqlx::query(&format!(
                r#"
                INSERT INTO esg_snapshots (
                    company_id, date,
                    co2_emissions, energy_consumption, water_usage, waste_generated,
                    renewable_energy_percent,
                    employee_count, diversity_ratio, safety_incidents, training_hours,
                    community_investment,
                    board_independence, board_diversity, ethics_violations, data_breaches,
                    ethics_policy,
                    environmental_risks, social_risks, governance_risks
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                        $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
                RETURNING {SNAPSHOT_COLUMNS}
                "#
            ))
            .bind(snapshot.company_id)
            .bind(snapshot.date)
            .bind(env.co2_emissions)
            .bind(env.energy_consumption)
            .bind(env.water_usage)
            .bind(env.waste_generated)
            .bind(env.renewable_energy_percent)
            .bind(social.employee_count)
            .bind(social.diversity_ratio)
            .bind(social.safety_incidents)
            .bind(social.training_hours)
            .bind(social.community_investment)
            .bind(gov.board_independence)
            .bind(gov.board_diversity)
            .bind(gov.ethics_violations)
            .bind(gov.data_breaches)
            .bind(&gov.ethics_policy)
            .bind(&risks.environmental)
            .bind(&risks.social)
            .bind(&risks.governance)
            .fetch_one(&mut *tx)
            .await?;

            stored.push(Self::parse_snapshot_row(&row)?);
        }

        tx.commit().await?;
        Ok(stored)
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}
