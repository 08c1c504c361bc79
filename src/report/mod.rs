//! Report generation.
//!
//! ## Pipeline
//!
//! ```text
//! ReportRequest ─► ReportFormat::parse ─► store lookups ─► SectionPlan
//!                                                            │
//!                         ┌──────────────────────────────────┴─────┐
//!                         ▼                                        ▼
//!               DocumentLayout ─► render_pdf             TabularRecord ─► to_xlsx
//!                         └───────────────► ReportArtifact ◄───────┘
//! ```
//!
//! The format is validated before the store is touched, and nothing is
//! written anywhere until rendering has fully succeeded.

pub mod format;
pub mod layout;
pub mod pdf;
pub mod sections;
pub mod spool;
pub mod tabular;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EsgError, EsgResult};
use crate::model::{Company, CompanyId, EsgSnapshot};
use crate::store::{store_error, EsgStore};

pub use layout::DocumentLayout;
pub use sections::{PlannedSection, Section, SectionConfig, SectionPlan};
pub use spool::{ReportSpool, SpooledReport};
pub use tabular::{Cell, TabularRecord};

/// Rendering failure inside a PDF or xlsx backend.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// printpdf failure.
    #[error("PDF rendering failed: {0}")]
    Pdf(#[from] printpdf::Error),
    /// rust_xlsxwriter failure.
    #[error("Spreadsheet rendering failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    /// Text the built-in PDF fonts cannot show.
    #[error("PDF fonts cannot show {ch:?} in {text:?}")]
    UnsupportedText {
        /// First unsupported character.
        ch: char,
        /// The text run it appears in.
        text: String,
    },
}

impl From<RenderError> for EsgError {
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::UnsupportedText { .. } => {
                EsgError::Validation(format!("{e}; request format=xlsx instead"))
            }
            other => EsgError::internal(other),
        }
    }
}

/// Output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Paginated PDF (default).
    Pdf,
    /// Single-row Excel workbook.
    Xlsx,
}

impl ReportFormat {
    /// Parse the requested format. Missing or blank means PDF.
    ///
    /// Accepts `pdf`, `excel` and `xlsx`, case-insensitively.
    pub fn parse(requested: Option<&str>) -> EsgResult<Self> {
        let Some(raw) = requested.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Self::Pdf);
        };
        match raw.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "excel" | "xlsx" => Ok(Self::Xlsx),
            _ => Err(EsgError::InvalidFormat(raw.to_string())),
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Xlsx => "xlsx",
        }
    }

    /// MIME type of the download.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    /// Download file name, e.g. `ESG_Report_2024-05-07.pdf`.
    pub fn download_name(self, generated_at: DateTime<Utc>) -> String {
        format!(
            "ESG_Report_{}.{}",
            generated_at.format("%Y-%m-%d"),
            self.extension()
        )
    }
}

/// A report generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    /// Company to report on (required).
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    /// `pdf` (default), `excel` or `xlsx`.
    #[serde(default)]
    pub format: Option<String>,
    /// Sections to include.
    #[serde(default)]
    pub sections: SectionConfig,
}

/// A rendered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    /// Document bytes.
    pub bytes: Vec<u8>,
    /// Output format.
    pub format: ReportFormat,
    /// Suggested download name.
    pub download_name: String,
}

/// Render a report for a resolved company and snapshot.
///
/// Pure with respect to the store: everything it needs is passed in.
pub fn render(
    company: &Company,
    snapshot: &EsgSnapshot,
    sections: &SectionConfig,
    format: ReportFormat,
    generated_at: DateTime<Utc>,
) -> Result<ReportArtifact, RenderError> {
    let bytes = match format {
        ReportFormat::Pdf => {
            let plan = SectionPlan::resolve(sections, SectionPlan::PDF_BASE_PAGE);
            let layout = DocumentLayout::build(company, snapshot, &plan, generated_at);
            debug!(pages = layout.page_count(), sections = plan.len(), "PDF laid out");
            pdf::render_pdf(&layout)?
        }
        ReportFormat::Xlsx => {
            let plan = SectionPlan::resolve(sections, 1);
            TabularRecord::build(company, snapshot, &plan, generated_at).to_xlsx()?
        }
    };

    Ok(ReportArtifact {
        bytes,
        format,
        download_name: format.download_name(generated_at),
    })
}

/// Resolves report requests against a store and renders them.
pub struct ReportGenerator<S: EsgStore> {
    store: Arc<S>,
}

impl<S: EsgStore + 'static> ReportGenerator<S> {
    /// Create a generator over a store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Generate a report.
    ///
    /// # Errors
    /// - [`EsgError::InvalidFormat`] for an unsupported format (checked first)
    /// - [`EsgError::Validation`] when `company_id` is missing
    /// - [`EsgError::NotFound`] for an unknown company or one without snapshots
    /// - [`EsgError::Validation`] when the PDF fonts cannot show the company's text
    /// - [`EsgError::Internal`] for store or rendering failures
    pub async fn generate(
        &self,
        request: &ReportRequest,
        generated_at: DateTime<Utc>,
    ) -> EsgResult<ReportArtifact> {
        let start = Instant::now();
        let format = ReportFormat::parse(request.format.as_deref())?;
        let company_id = request
            .company_id
            .ok_or_else(|| EsgError::Validation("company_id is required".to_string()))?;

        let company = self
            .store
            .get_company(company_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| EsgError::NotFound(format!("No company found with id {company_id}")))?;

        let snapshot = self
            .store
            .latest_snapshot(company_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| {
                EsgError::NotFound(format!("No ESG data found for company {}", company.name))
            })?;

        let artifact = render(&company, &snapshot, &request.sections, format, generated_at)?;

        info!(
            company_id,
            snapshot_id = snapshot.id,
            format = format.extension(),
            bytes = artifact.bytes.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Report generated"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse_defaults_to_pdf() {
        assert_eq!(ReportFormat::parse(None).unwrap(), ReportFormat::Pdf);
        assert_eq!(ReportFormat::parse(Some("")).unwrap(), ReportFormat::Pdf);
        assert_eq!(ReportFormat::parse(Some("  ")).unwrap(), ReportFormat::Pdf);
    }

    #[test]
    fn test_unsupported_text_is_a_validation_error() {
        let err = EsgError::from(RenderError::UnsupportedText {
            ch: '東',
            text: "東京".into(),
        });
        match err {
            EsgError::Validation(message) => assert!(message.contains("format=xlsx")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_format_parse_accepts_aliases() {
        assert_eq!(ReportFormat::parse(Some("PDF")).unwrap(), ReportFormat::Pdf);
        assert_eq!(ReportFormat::parse(Some("Excel")).unwrap(), ReportFormat::Xlsx);
        assert_eq!(ReportFormat::parse(Some("xlsx")).unwrap(), ReportFormat::Xlsx);
    }

    #[test]
    fn test_format_parse_rejects_unknown() {
        let err = ReportFormat::parse(Some("docx")).unwrap_err();
        assert!(matches!(err, EsgError::InvalidFormat(ref f) if f == "docx"));
    }

    #[test]
    fn test_download_name() {
        use chrono::TimeZone;
        let at = Utc.with_ymd_and_hms(2024, 5, 7, 23, 59, 0).unwrap();
        assert_eq!(ReportFormat::Xlsx.download_name(at), "ESG_Report_2024-05-07.xlsx");
        assert_eq!(ReportFormat::Pdf.download_name(at), "ESG_Report_2024-05-07.pdf");
    }

    #[test]
    fn test_request_sections_default_to_none() {
        let request: ReportRequest = serde_json::from_str(r#"{"company_id": 3}"#).unwrap();
        assert_eq!(request.company_id, Some(3));
        assert_eq!(request.sections, SectionConfig::default());
        assert_eq!(request.format, None);
    }
}
