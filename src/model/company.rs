//! Company records and their partial updates.

use serde::{Deserialize, Deserializer, Serialize};

/// Store-assigned company identifier.
pub type CompanyId = i64;

/// A company tracked by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Store-assigned identifier.
    pub id: CompanyId,
    /// Display name (required).
    pub name: String,
    /// Industry classification.
    pub industry: Option<String>,
    /// Size class, e.g. "Small", "Medium", "Large".
    pub size: Option<String>,
    /// Country of registration.
    pub country: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Environmental narrative.
    pub environmental_highlight: Option<String>,
    /// Social narrative.
    pub social_highlight: Option<String>,
    /// Governance narrative.
    pub governance_highlight: Option<String>,
}

/// A company that has not been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompany {
    /// Display name (required, non-empty).
    pub name: String,
    /// Industry classification.
    pub industry: Option<String>,
    /// Size class.
    pub size: Option<String>,
    /// Country of registration.
    pub country: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Environmental narrative.
    pub environmental_highlight: Option<String>,
    /// Social narrative.
    pub social_highlight: Option<String>,
    /// Governance narrative.
    pub governance_highlight: Option<String>,
}

impl NewCompany {
    /// Create a company with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attach the store-assigned id.
    pub fn into_company(self, id: CompanyId) -> Company {
        Company {
            id,
            name: self.name,
            industry: self.industry,
            size: self.size,
            country: self.country,
            description: self.description,
            environmental_highlight: self.environmental_highlight,
            social_highlight: self.social_highlight,
            governance_highlight: self.governance_highlight,
        }
    }
}

/// A field patch: `None` leaves the stored value alone, `Some(v)` overwrites it
/// (`Some(None)` clears it).
pub type Patch<T> = Option<Option<T>>;

/// Deserialize a present field as `Some(..)`, so a JSON `null` becomes `Some(None)`.
/// Absent fields fall back to `#[serde(default)]`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A partial update of a company's description and highlights.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyUpdate {
    /// Target company.
    pub id: CompanyId,
    /// New description.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Patch<String>,
    /// New environmental highlight.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub environmental_highlight: Patch<String>,
    /// New social highlight.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub social_highlight: Patch<String>,
    /// New governance highlight.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub governance_highlight: Patch<String>,
}

impl CompanyUpdate {
    /// Start an update that changes nothing.
    pub fn for_company(id: CompanyId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Set the description.
    pub fn description(mut self, value: impl Into<String>) -> Self {
        self.description = Some(Some(value.into()));
        self
    }

    /// Set the environmental highlight.
    pub fn environmental_highlight(mut self, value: impl Into<String>) -> Self {
        self.environmental_highlight = Some(Some(value.into()));
        self
    }

    /// Set the social highlight.
    pub fn social_highlight(mut self, value: impl Into<String>) -> Self {
        self.social_highlight = Some(Some(value.into()));
        self
    }

    /// Set the governance highlight.
    pub fn governance_highlight(mut self, value: impl Into<String>) -> Self {
        self.governance_highlight = Some(Some(value.into()));
        self
    }

    /// Overwrite every provided field of `company`.
    pub fn apply_to(&self, company: &mut Company) {
        fn merge(slot: &mut Option<String>, patch: &Patch<String>) {
            if let Some(value) = patch {
                *slot = value.clone();
            }
        }

        merge(&mut company.description, &self.description);
        merge(&mut company.environmental_highlight, &self.environmental_highlight);
        merge(&mut company.social_highlight, &self.social_highlight);
        merge(&mut company.governance_highlight, &self.governance_highlight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> Company {
        let mut company = NewCompany::named("Acme").into_company(1);
        company.description = Some("old".into());
        company.social_highlight = Some("kept".into());
        company
    }

    #[test]
    fn test_omitted_fields_are_unchanged() {
        let mut company = stored();
        CompanyUpdate::for_company(1).description("new").apply_to(&mut company);

        assert_eq!(company.description.as_deref(), Some("new"));
        assert_eq!(company.social_highlight.as_deref(), Some("kept"));
    }

    #[test]
    fn test_explicit_null_clears_field() {
        let update: CompanyUpdate =
            serde_json::from_str(r#"{"id": 1, "social_highlight": null}"#).unwrap();
        assert_eq!(update.social_highlight, Some(None));
        assert_eq!(update.description, None);

        let mut company = stored();
        update.apply_to(&mut company);
        assert_eq!(company.social_highlight, None);
        assert_eq!(company.description.as_deref(), Some("old"));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let update = CompanyUpdate::for_company(1)
            .description("A")
            .governance_highlight("B");

        let mut once = stored();
        update.apply_to(&mut once);
        let mut twice = once.clone();
        update.apply_to(&mut twice);

        assert_eq!(once, twice);
    }
}
