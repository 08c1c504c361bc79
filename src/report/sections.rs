//! Section selection and table-of-contents numbering.
//!
//! Sections always appear in canonical order and are numbered 1..N over the
//! enabled subset only. Each enabled section is counted as exactly one page
//! in the table of contents, even when its content overflows onto more.

use serde::{Deserialize, Serialize};

/// One report section, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    /// Company description and identity table.
    Overview,
    /// Environmental metrics.
    Environmental,
    /// Social metrics.
    Social,
    /// Governance metrics.
    Governance,
    /// Qualitative risk assessment.
    Risks,
}

impl Section {
    /// All sections in canonical order.
    pub const ALL: [Section; 5] = [
        Section::Overview,
        Section::Environmental,
        Section::Social,
        Section::Governance,
        Section::Risks,
    ];

    /// Heading shown in the document and the table of contents.
    pub fn title(self) -> &'static str {
        match self {
            Section::Overview => "Company Overview",
            Section::Environmental => "Environmental Metrics",
            Section::Social => "Social Metrics",
            Section::Governance => "Governance Metrics",
            Section::Risks => "Risk Assessment",
        }
    }

    /// Configuration key.
    pub fn key(self) -> &'static str {
        match self {
            Section::Overview => "overview",
            Section::Environmental => "environmental",
            Section::Social => "social",
            Section::Governance => "governance",
            Section::Risks => "risks",
        }
    }
}

/// Caller-supplied section flags. Absent flags are off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionConfig {
    /// Include the overview section.
    pub overview: bool,
    /// Include environmental metrics.
    pub environmental: bool,
    /// Include social metrics.
    pub social: bool,
    /// Include governance metrics.
    pub governance: bool,
    /// Include the risk assessment.
    pub risks: bool,
}

impl SectionConfig {
    /// Every section enabled.
    pub fn all() -> Self {
        Self {
            overview: true,
            environmental: true,
            social: true,
            governance: true,
            risks: true,
        }
    }

    /// Only the given sections enabled.
    pub fn only(sections: &[Section]) -> Self {
        let mut config = Self::default();
        for section in sections {
            config.set(*section, true);
        }
        config
    }

    /// Whether a section is enabled.
    pub fn is_enabled(&self, section: Section) -> bool {
        match section {
            Section::Overview => self.overview,
            Section::Environmental => self.environmental,
            Section::Social => self.social,
            Section::Governance => self.governance,
            Section::Risks => self.risks,
        }
    }

    /// Enable or disable a section.
    pub fn set(&mut self, section: Section, enabled: bool) {
        let slot = match section {
            Section::Overview => &mut self.overview,
            Section::Environmental => &mut self.environmental,
            Section::Social => &mut self.social,
            Section::Governance => &mut self.governance,
            Section::Risks => &mut self.risks,
        };
        *slot = enabled;
    }
}

/// An enabled section with its number and table-of-contents page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedSection {
    /// 1-based position among enabled sections.
    pub number: usize,
    /// The section.
    pub section: Section,
    /// Page listed in the table of contents.
    pub page: usize,
}

impl PlannedSection {
    /// Heading, e.g. `"2. Social Metrics"`.
    pub fn heading(&self) -> String {
        format!("{}. {}", self.number, self.section.title())
    }

    /// Table-of-contents line: heading, dot leader padded to 40 columns, page.
    pub fn toc_line(&self) -> String {
        let heading = self.heading();
        let dots = ".".repeat(TOC_LEADER_WIDTH.saturating_sub(heading.chars().count()));
        format!("{heading} {dots} {}", self.page)
    }
}

const TOC_LEADER_WIDTH: usize = 40;

/// Ordered plan of the sections to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionPlan {
    sections: Vec<PlannedSection>,
}

impl SectionPlan {
    /// First section page of the PDF: after the cover and the contents page.
    pub const PDF_BASE_PAGE: usize = 3;

    /// Resolve flags into numbered sections starting at `base_page`.
    pub fn resolve(config: &SectionConfig, base_page: usize) -> Self {
        let sections = Section::ALL
            .into_iter()
            .filter(|s| config.is_enabled(*s))
            .enumerate()
            .map(|(i, section)| PlannedSection {
                number: i + 1,
                section,
                page: base_page + i,
            })
            .collect();
        Self { sections }
    }

    /// Enabled sections in canonical order.
    pub fn sections(&self) -> &[PlannedSection] {
        &self.sections
    }

    /// Whether a section is part of the plan.
    pub fn contains(&self, section: Section) -> bool {
        self.sections.iter().any(|p| p.section == section)
    }

    /// Number of enabled sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether no section is enabled.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
