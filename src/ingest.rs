//! Boundary validation of incoming payloads.
//!
//! Request bodies are checked field by field here, before anything reaches a
//! store, and every failure becomes an [`EsgError::Validation`] naming the
//! offending entry and field.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EsgError, EsgResult};
use crate::model::{
    CompanyUpdate, EnvironmentalMetrics, GovernanceMetrics, NewCompany, NewSnapshot,
    RiskAssessment, SocialMetrics,
};

/// Longest company name the store accepts, in characters.
pub const NAME_MAX_CHARS: usize = 100;
/// Longest industry.
pub const INDUSTRY_MAX_CHARS: usize = 50;
/// Longest size class.
pub const SIZE_MAX_CHARS: usize = 20;
/// Longest country.
pub const COUNTRY_MAX_CHARS: usize = 50;

fn check_length(field: &str, value: Option<&str>, max: usize) -> EsgResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(EsgError::Validation(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

/// Body of `POST /api/companies`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCompanyRequest {
    /// Required, non-blank.
    #[serde(default)]
    pub name: Option<String>,
    /// Industry.
    #[serde(default)]
    pub industry: Option<String>,
    /// Size class.
    #[serde(default)]
    pub size: Option<String>,
    /// Country.
    #[serde(default)]
    pub country: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Environmental narrative.
    #[serde(default)]
    pub environmental_highlight: Option<String>,
    /// Social narrative.
    #[serde(default)]
    pub social_highlight: Option<String>,
    /// Governance narrative.
    #[serde(default)]
    pub governance_highlight: Option<String>,
}

impl CreateCompanyRequest {
    /// Check required fields and the column widths of the short text fields.
    pub fn validate(self) -> EsgResult<NewCompany> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| EsgError::Validation("name is required".to_string()))?;

        check_length("name", Some(&name), NAME_MAX_CHARS)?;
        check_length("industry", self.industry.as_deref(), INDUSTRY_MAX_CHARS)?;
        check_length("size", self.size.as_deref(), SIZE_MAX_CHARS)?;
        check_length("country", self.country.as_deref(), COUNTRY_MAX_CHARS)?;

        Ok(NewCompany {
            name,
            industry: self.industry,
            size: self.size,
            country: self.country,
            description: self.description,
            environmental_highlight: self.environmental_highlight,
            social_highlight: self.social_highlight,
            governance_highlight: self.governance_highlight,
        })
    }
}

/// Body of `PUT /api/companies/batch-update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchUpdateRequest {
    /// Updates in application order.
    pub updates: Vec<CompanyUpdate>,
}

/// Parse the body of `POST /api/esg-data/batch`.
///
/// Every entry needs `company_id`, `date` and the three metric groups with
/// every metric key present; `null` values are allowed and stored as unset.
/// `governance.ethics_policy` and `risks` are optional. The first invalid
/// entry rejects the whole batch.
pub fn parse_snapshot_batch(body: &Value) -> EsgResult<Vec<NewSnapshot>> {
    let entries = body
        .get("esg_data")
        .and_then(Value::as_array)
        .ok_or_else(|| EsgError::Validation("esg_data must be an array".to_string()))?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            parse_snapshot(entry)
                .map_err(|msg| EsgError::Validation(format!("esg_data[{index}]: {msg}")))
        })
        .collect()
}

fn parse_snapshot(entry: &Value) -> Result<NewSnapshot, String> {
    let fields = entry
        .as_object()
        .ok_or_else(|| "entry must be an object".to_string())?;

    let company_id = fields
        .get("company_id")
        .ok_or_else(|| "missing required field company_id".to_string())?
        .as_i64()
        .ok_or_else(|| "company_id must be an integer".to_string())?;

    let raw_date = fields
        .get("date")
        .ok_or_else(|| "missing required field date".to_string())?
        .as_str()
        .ok_or_else(|| "date must be a string".to_string())?;
    let date = parse_timestamp(raw_date).ok_or_else(|| format!("invalid date: {raw_date}"))?;

    let env = Group::required(fields, "environmental")?;
    let social = Group::required(fields, "social")?;
    let gov = Group::required(fields, "governance")?;

    Ok(NewSnapshot {
        company_id,
        date,
        environmental: EnvironmentalMetrics {
            co2_emissions: env.float("co2_emissions")?,
            energy_consumption: env.float("energy_consumption")?,
            water_usage: env.float("water_usage")?,
            waste_generated: env.float("waste_generated")?,
            renewable_energy_percent: env.float("renewable_energy_percent")?,
        },
        social: SocialMetrics {
            employee_count: social.integer("employee_count")?,
            diversity_ratio: social.float("diversity_ratio")?,
            safety_incidents: social.integer("safety_incidents")?,
            training_hours: social.float("training_hours")?,
            community_investment: social.float("community_investment")?,
        },
        governance: GovernanceMetrics {
            board_independence: gov.float("board_independence")?,
            board_diversity: gov.float("board_diversity")?,
            ethics_violations: gov.integer("ethics_violations")?,
            data_breaches: gov.integer("data_breaches")?,
            ethics_policy: gov.optional_text("ethics_policy")?,
        },
        risks: match Group::optional(fields, "risks")? {
            Some(risks) => RiskAssessment {
                environmental: risks.optional_text("environmental")?,
                social: risks.optional_text("social")?,
                governance: risks.optional_text("governance")?,
            },
            None => RiskAssessment::default(),
        },
    })
}

/// A named JSON object inside a snapshot entry.
struct Group<'a> {
    name: &'static str,
    fields: &'a Map<String, Value>,
}

impl<'a> Group<'a> {
    fn required(parent: &'a Map<String, Value>, name: &'static str) -> Result<Self, String> {
        Self::optional(parent, name)?.ok_or_else(|| format!("missing required group {name}"))
    }

    fn optional(parent: &'a Map<String, Value>, name: &'static str) -> Result<Option<Self>, String> {
        match parent.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(fields)) => Ok(Some(Self { name, fields })),
            Some(_) => Err(format!("{name} must be an object")),
        }
    }

    fn present(&self, key: &str) -> Result<&'a Value, String> {
        self.fields
            .get(key)
            .ok_or_else(|| format!("missing required field {}.{key}", self.name))
    }

    fn float(&self, key: &str) -> Result<Option<f64>, String> {
        match self.present(key)? {
            Value::Null => Ok(None),
            value => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| format!("{}.{key} must be a number", self.name)),
        }
    }

    fn integer(&self, key: &str) -> Result<Option<i64>, String> {
        match self.present(key)? {
            Value::Null => Ok(None),
            value => value
                .as_i64()
                .or_else(|| value.as_f64().filter(|f| whole_i64(*f)).map(|f| f as i64))
                .map(Some)
                .ok_or_else(|| format!("{}.{key} must be an integer", self.name)),
        }
    }

    fn optional_text(&self, key: &str) -> Result<Option<String>, String> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(format!("{}.{key} must be a string", self.name)),
        }
    }
}

/// A float that converts to `i64` exactly. `as` would saturate.
fn whole_i64(f: f64) -> bool {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

/// Parse an ISO-8601 timestamp: RFC 3339, a naive date-time, or a bare date.
/// Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(company_id: i64) -> Value {
        json!({
            "company_id": company_id,
            "date": "2024-01-15T10:30:00",
            "environmental": {
                "co2_emissions": 1200.5,
                "energy_consumption": 5000,
                "water_usage": null,
                "waste_generated": 30.0,
                "renewable_energy_percent": 45.2
            },
            "social": {
                "employee_count": 5000,
                "diversity_ratio": 41.0,
                "safety_incidents": 2,
                "training_hours": 24.5,
                "community_investment": 250000
            },
            "governance": {
                "board_independence": 75.0,
                "board_diversity": 35.5,
                "ethics_violations": 0,
                "data_breaches": 1
            }
        })
    }

    #[test]
    fn test_valid_batch_parses() {
        let parsed = parse_snapshot_batch(&json!({"esg_data": [entry(1), entry(2)]})).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].environmental.co2_emissions, Some(1200.5));
        assert_eq!(parsed[0].environmental.water_usage, None);
        assert_eq!(parsed[0].social.employee_count, Some(5000));
        assert_eq!(parsed[1].company_id, 2);
        assert_eq!(parsed[0].risks, RiskAssessment::default());
    }

    #[test]
    fn test_missing_metric_rejects_whole_batch_with_index() {
        let mut broken = entry(1);
        broken["social"].as_object_mut().unwrap().remove("training_hours");

        let err = parse_snapshot_batch(&json!({"esg_data": [entry(1), broken, entry(1)]}))
            .unwrap_err();
        match err {
            EsgError::Validation(msg) => {
                assert_eq!(msg, "esg_data[1]: missing required field social.training_hours")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_group_is_rejected() {
        let mut broken = entry(1);
        broken.as_object_mut().unwrap().remove("governance");

        let err = parse_snapshot_batch(&json!({"esg_data": [broken]})).unwrap_err();
        assert!(err.to_string().contains("missing required group governance"));
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        let mut broken = entry(1);
        broken["environmental"]["co2_emissions"] = json!("lots");
        let err = parse_snapshot_batch(&json!({"esg_data": [broken]})).unwrap_err();
        assert!(err.to_string().contains("environmental.co2_emissions must be a number"));

        let mut fractional = entry(1);
        fractional["social"]["safety_incidents"] = json!(1.5);
        let err = parse_snapshot_batch(&json!({"esg_data": [fractional]})).unwrap_err();
        assert!(err.to_string().contains("social.safety_incidents must be an integer"));
    }

    #[test]
    fn test_out_of_range_integer_is_rejected() {
        let mut huge = entry(1);
        huge["social"]["employee_count"] = json!(1e30);
        let err = parse_snapshot_batch(&json!({"esg_data": [huge]})).unwrap_err();
        assert!(err.to_string().contains("social.employee_count must be an integer"));

        let mut negative = entry(1);
        negative["governance"]["data_breaches"] = json!(-1e19);
        assert!(parse_snapshot_batch(&json!({"esg_data": [negative]})).is_err());

        let mut whole_float = entry(1);
        whole_float["social"]["employee_count"] = json!(1200.0);
        let parsed = parse_snapshot_batch(&json!({"esg_data": [whole_float]})).unwrap();
        assert_eq!(parsed[0].social.employee_count, Some(1200));
    }

    #[test]
    fn test_esg_data_must_be_an_array() {
        assert!(matches!(
            parse_snapshot_batch(&json!({"esg_data": {}})),
            Err(EsgError::Validation(_))
        ));
        assert!(matches!(parse_snapshot_batch(&json!({})), Err(EsgError::Validation(_))));
    }

    #[test]
    fn test_optional_qualitative_fields() {
        let mut with_risks = entry(1);
        with_risks["governance"]["ethics_policy"] = json!("Code of conduct v3");
        with_risks["risks"] = json!({"social": "Supply chain labour"});

        let parsed = parse_snapshot_batch(&json!({"esg_data": [with_risks]})).unwrap();
        assert_eq!(parsed[0].governance.ethics_policy.as_deref(), Some("Code of conduct v3"));
        assert_eq!(parsed[0].risks.social.as_deref(), Some("Supply chain labour"));
        assert_eq!(parsed[0].risks.environmental, None);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-15"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15T00:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15 00:00:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15T02:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("15/01/2024"), None);
    }

    #[test]
    fn test_create_company_requires_name() {
        assert!(matches!(
            CreateCompanyRequest::default().validate(),
            Err(EsgError::Validation(_))
        ));

        let request = CreateCompanyRequest {
            name: Some("  Acme  ".into()),
            country: Some("USA".into()),
            ..Default::default()
        };
        let company = request.validate().unwrap();
        assert_eq!(company.name, "Acme");
        assert_eq!(company.country.as_deref(), Some("USA"));
    }

    #[test]
    fn test_create_company_enforces_column_widths() {
        let long_name = CreateCompanyRequest {
            name: Some("N".repeat(NAME_MAX_CHARS + 1)),
            ..Default::default()
        };
        let err = long_name.validate().unwrap_err();
        assert!(matches!(err, EsgError::Validation(_)));
        assert!(err.to_string().contains("name must be at most 100 characters"));

        let long_industry = CreateCompanyRequest {
            name: Some("Acme".into()),
            industry: Some("i".repeat(INDUSTRY_MAX_CHARS + 1)),
            ..Default::default()
        };
        let err = long_industry.validate().unwrap_err();
        assert!(err.to_string().contains("industry must be at most 50 characters"));

        let long_size = CreateCompanyRequest {
            name: Some("Acme".into()),
            size: Some("s".repeat(SIZE_MAX_CHARS + 1)),
            ..Default::default()
        };
        assert!(long_size.validate().is_err());
    }

    #[test]
    fn test_column_widths_count_characters_not_bytes() {
        // 100 two-byte characters fit; surrounding whitespace is trimmed first.
        let request = CreateCompanyRequest {
            name: Some(format!("  {}  ", "é".repeat(NAME_MAX_CHARS))),
            country: Some("Ö".repeat(COUNTRY_MAX_CHARS)),
            ..Default::default()
        };
        let company = request.validate().unwrap();
        assert_eq!(company.name.chars().count(), NAME_MAX_CHARS);
    }
}
