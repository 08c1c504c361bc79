//! Deterministic page layout for the PDF report.
//!
//! Layout produces plain [`DrawOp`]s per page in millimetres measured from the
//! top-left corner. Nothing here touches a PDF library; [`super::pdf`] turns a
//! finished [`DocumentLayout`] into bytes.
//!
//! ## Page sequence
//!
//! ```text
//! 1  cover
//! 2  table of contents
//! 3+ one page per enabled section, canonical order
//! ```
//!
//! A section whose content overflows the bottom margin continues on a new
//! page. The table of contents still counts one page per section.

use chrono::{DateTime, Datelike, Utc};

use crate::model::{Company, EsgSnapshot};
use super::format;
use super::sections::{PlannedSection, Section, SectionPlan};

/// A4 width.
pub const PAGE_WIDTH_MM: f32 = 210.0;
/// A4 height.
pub const PAGE_HEIGHT_MM: f32 = 297.0;

const MARGIN_LEFT: f32 = 10.0;
const MARGIN_TOP: f32 = 10.0;
const MARGIN_BOTTOM: f32 = 15.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_LEFT;

const LABEL_WIDTH: f32 = 90.0;
const VALUE_WIDTH: f32 = 100.0;
const ROW_HEIGHT: f32 = 8.0;
const CELL_PADDING: f32 = 2.0;

const PT_TO_MM: f32 = 0.3528;
/// Average Helvetica glyph advance as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.5;

const ACCENT: Rgb = Rgb(43, 75, 128);
const NOTICE_FILL: Rgb = Rgb(243, 243, 243);
const ROW_SHADE: Rgb = Rgb(240, 248, 255);
const ROW_PLAIN: Rgb = Rgb(255, 255, 255);

const REPORT_TITLE: &str = "ESG Analytics Report";
const BOILERPLATE: &str = "Prepared with the ESG Reporting Service";
const CONFIDENTIAL_NOTICE: &str = "This document contains confidential information. \
    Unauthorized disclosure or reproduction is strictly prohibited and may result in legal action.";

/// 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Built-in font face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontStyle {
    /// Helvetica.
    Regular,
    /// Helvetica-Bold.
    Bold,
    /// Helvetica-Oblique.
    Italic,
}

/// Horizontal alignment inside a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// Flush left with padding.
    Left,
    /// Centred on the cell.
    Center,
}

/// One drawing instruction. Coordinates are millimetres from the top-left.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Text with its baseline at `y`.
    Text {
        /// Left edge.
        x: f32,
        /// Baseline.
        y: f32,
        /// Font size in points.
        size: f32,
        /// Face.
        style: FontStyle,
        /// Content.
        text: String,
    },
    /// Rectangle with top-left corner at (`x`, `y`).
    Rect {
        /// Left edge.
        x: f32,
        /// Top edge.
        y: f32,
        /// Width.
        width: f32,
        /// Height.
        height: f32,
        /// Fill colour, if filled.
        fill: Option<Rgb>,
        /// Whether to stroke a black border.
        border: bool,
    },
    /// Straight line.
    Line {
        /// Start x.
        x1: f32,
        /// Start y.
        y1: f32,
        /// End x.
        x2: f32,
        /// End y.
        y2: f32,
        /// Stroke colour.
        color: Rgb,
        /// Stroke width in points.
        thickness: f32,
    },
}

/// One page of drawing instructions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Instructions in paint order.
    pub ops: Vec<DrawOp>,
}

impl Page {
    /// Every text run on the page, in paint order.
    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// A fully laid out report.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    /// Document title metadata.
    pub title: String,
    /// Pages in order.
    pub pages: Vec<Page>,
    /// Actual 1-based start page of each rendered section.
    pub section_starts: Vec<(Section, usize)>,
}

impl DocumentLayout {
    /// Lay out the full report.
    pub fn build(
        company: &Company,
        snapshot: &EsgSnapshot,
        plan: &SectionPlan,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut writer = LayoutWriter::default();
        let mut section_starts = Vec::with_capacity(plan.len());

        cover_page(&mut writer, company, generated_at);
        contents_page(&mut writer, plan);

        for planned in plan.sections() {
            writer.new_page();
            section_starts.push((planned.section, writer.pages.len()));
            section_page(&mut writer, planned, company, snapshot);
        }

        Self {
            title: format!("ESG Report - {}", company.name),
            pages: writer.pages,
            section_starts,
        }
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Whether any page has a text run equal to `needle`.
    pub fn contains_text(&self, needle: &str) -> bool {
        self.pages.iter().any(|p| p.texts().contains(&needle))
    }

    /// Actual start page of a section, if rendered.
    pub fn section_start(&self, section: Section) -> Option<usize> {
        self.section_starts
            .iter()
            .find(|(s, _)| *s == section)
            .map(|(_, page)| *page)
    }
}

fn cover_page(w: &mut LayoutWriter, company: &Company, generated_at: DateTime<Utc>) {
    let year = generated_at.year();
    w.new_page();

    w.ln(45.0);
    w.cell(CONTENT_WIDTH, 15.0, REPORT_TITLE, 28.0, FontStyle::Bold, Align::Center);
    w.ln(8.0);
    w.cell(
        CONTENT_WIDTH,
        15.0,
        &format!("Annual Assessment {year}"),
        20.0,
        FontStyle::Bold,
        Align::Center,
    );

    w.ln(20.0);
    if text_width_mm(&company.name, 28.0) <= CONTENT_WIDTH {
        w.cell(CONTENT_WIDTH, 15.0, &company.name, 28.0, FontStyle::Bold, Align::Center);
    } else {
        w.paragraph(&company.name, 28.0, FontStyle::Bold, 12.0, Align::Center);
    }
    w.ln(8.0);
    w.hline(30.0, 180.0, ACCENT, 0.5);

    w.ln(20.0);
    for line in [
        format!("Industry: {}", format::text(company.industry.as_deref())),
        format!("Location: {}", format::text(company.country.as_deref())),
        format!("Report Period: FY {year}"),
    ] {
        w.cell(CONTENT_WIDTH, 8.0, &line, 12.0, FontStyle::Bold, Align::Center);
        w.ln(5.0);
    }

    w.ln(15.0);
    w.cell(
        CONTENT_WIDTH,
        8.0,
        &format!("Generated on {}", generated_at.format("%B %d, %Y")),
        11.0,
        FontStyle::Italic,
        Align::Center,
    );
    w.cell(CONTENT_WIDTH, 8.0, BOILERPLATE, 11.0, FontStyle::Italic, Align::Center);

    w.ln(15.0);
    w.fill_rect(25.0, w.y, 160.0, 25.0, NOTICE_FILL);
    w.ln(5.0);
    w.cell(CONTENT_WIDTH, 5.0, "CONFIDENTIAL", 10.0, FontStyle::Bold, Align::Center);
    w.paragraph(CONFIDENTIAL_NOTICE, 9.0, FontStyle::Regular, 4.0, Align::Center);
}

fn contents_page(w: &mut LayoutWriter, plan: &SectionPlan) {
    w.new_page();
    w.cell(CONTENT_WIDTH, 10.0, "Table of Contents", 16.0, FontStyle::Bold, Align::Left);
    w.ln(10.0);
    for planned in plan.sections() {
        w.cell(CONTENT_WIDTH, 8.0, &planned.toc_line(), 12.0, FontStyle::Regular, Align::Left);
    }
}

fn section_page(
    w: &mut LayoutWriter,
    planned: &PlannedSection,
    company: &Company,
    snapshot: &EsgSnapshot,
) {
    w.cell(CONTENT_WIDTH, 15.0, &planned.heading(), 16.0, FontStyle::Bold, Align::Left);
    w.ln(5.0);

    let (rows, highlight) = match planned.section {
        Section::Overview => {
            if let Some(description) = non_blank(company.description.as_deref()) {
                w.paragraph(description, 12.0, FontStyle::Regular, 8.0, Align::Left);
                w.ln(10.0);
            }
            (overview_rows(company), None)
        }
        Section::Environmental => (
            environmental_rows(snapshot),
            Some(("Environmental Highlight:", company.environmental_highlight.as_deref())),
        ),
        Section::Social => (
            social_rows(snapshot),
            Some(("Social Highlight:", company.social_highlight.as_deref())),
        ),
        Section::Governance => (
            governance_rows(snapshot),
            Some(("Governance Highlight:", company.governance_highlight.as_deref())),
        ),
        Section::Risks => (risk_rows(snapshot), None),
    };

    w.metric_table(&rows);

    if let Some((label, Some(text))) = highlight.map(|(l, t)| (l, non_blank(t))) {
        w.ln(10.0);
        w.ensure_space(8.0 * 2.0);
        w.cell(CONTENT_WIDTH, 8.0, label, 12.0, FontStyle::Bold, Align::Left);
        w.paragraph(text, 12.0, FontStyle::Regular, 8.0, Align::Left);
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// Label/value rows of the overview table.
pub fn overview_rows(company: &Company) -> Vec<(&'static str, String)> {
    vec![
        ("Company Name", company.name.clone()),
        ("Industry", format::text(company.industry.as_deref())),
        ("Size", format::text(company.size.as_deref())),
        ("Country", format::text(company.country.as_deref())),
    ]
}

/// Label/value rows of the environmental table.
pub fn environmental_rows(snapshot: &EsgSnapshot) -> Vec<(&'static str, String)> {
    let env = &snapshot.environmental;
    vec![
        ("CO2 Emissions", format::quantity(env.co2_emissions, "tonnes")),
        ("Energy Consumption", format::quantity(env.energy_consumption, "MWh")),
        ("Renewable Energy", format::percent(env.renewable_energy_percent)),
        ("Water Usage", format::quantity(env.water_usage, "m³")),
        ("Waste Generated", format::quantity(env.waste_generated, "tonnes")),
    ]
}

/// Label/value rows of the social table.
pub fn social_rows(snapshot: &EsgSnapshot) -> Vec<(&'static str, String)> {
    let social = &snapshot.social;
    vec![
        ("Employee Count", format::thousands(social.employee_count.map(|v| v as f64))),
        ("Diversity Ratio", format::percent(social.diversity_ratio)),
        ("Safety Incidents", format::count(social.safety_incidents)),
        ("Training Hours", format::thousands_with_unit(social.training_hours, "hours")),
        ("Community Investment", format::number(social.community_investment)),
    ]
}

/// Label/value rows of the governance table.
pub fn governance_rows(snapshot: &EsgSnapshot) -> Vec<(&'static str, String)> {
    let gov = &snapshot.governance;
    vec![
        ("Board Independence", format::percent(gov.board_independence)),
        ("Board Diversity", format::percent(gov.board_diversity)),
        ("Ethics Policy", format::text(gov.ethics_policy.as_deref())),
        ("Data Breaches", format::count(gov.data_breaches)),
        ("Ethics Violations", format::count(gov.ethics_violations)),
    ]
}

/// Label/value rows of the risk table.
pub fn risk_rows(snapshot: &EsgSnapshot) -> Vec<(&'static str, String)> {
    let risks = &snapshot.risks;
    vec![
        ("Environmental Risks", format::text(risks.environmental.as_deref())),
        ("Social Risks", format::text(risks.social.as_deref())),
        ("Governance Risks", format::text(risks.governance.as_deref())),
    ]
}

/// Approximate rendered width of `text`.
///
/// Built-in PDF fonts carry no metrics here, so this uses an average advance.
pub fn text_width_mm(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_EM * PT_TO_MM
}

/// Greedy word wrap to at most `max_chars` per line.
///
/// Explicit newlines start a new line; words longer than a line are split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let word: String = word.into_iter().collect();
            let needed = if line.is_empty() {
                word.chars().count()
            } else {
                line.chars().count() + 1 + word.chars().count()
            };
            if needed > max_chars && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }
    lines
}

/// Cursor-based writer, modelled on a flowing text layout.
#[derive(Debug, Default)]
struct LayoutWriter {
    pages: Vec<Page>,
    /// Cursor position from the top of the current page.
    y: f32,
}

impl LayoutWriter {
    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.y = MARGIN_TOP;
    }

    fn push(&mut self, op: DrawOp) {
        if self.pages.is_empty() {
            self.new_page();
        }
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    fn ln(&mut self, height: f32) {
        self.y += height;
    }

    /// Continue on a fresh page if `height` does not fit above the bottom margin.
    fn ensure_space(&mut self, height: f32) {
        if self.y + height > PAGE_HEIGHT_MM - MARGIN_BOTTOM {
            self.new_page();
        }
    }

    fn text_at(&mut self, x: f32, top: f32, height: f32, size: f32, style: FontStyle, text: &str) {
        let baseline = top + height / 2.0 + size * PT_TO_MM * 0.35;
        self.push(DrawOp::Text {
            x,
            y: baseline,
            size,
            style,
            text: text.to_string(),
        });
    }

    /// One line of text spanning `width` from the left margin; advances the cursor.
    fn cell(&mut self, width: f32, height: f32, text: &str, size: f32, style: FontStyle, align: Align) {
        self.ensure_space(height);
        let x = match align {
            Align::Left => MARGIN_LEFT,
            Align::Center => MARGIN_LEFT + ((width - text_width_mm(text, size)) / 2.0).max(0.0),
        };
        self.text_at(x, self.y, height, size, style, text);
        self.y += height;
    }

    /// Wrapped text across the content width.
    fn paragraph(&mut self, text: &str, size: f32, style: FontStyle, line_height: f32, align: Align) {
        let max_chars = (CONTENT_WIDTH / (size * AVG_GLYPH_EM * PT_TO_MM)) as usize;
        for line in wrap_text(text, max_chars) {
            self.cell(CONTENT_WIDTH, line_height, &line, size, style, align);
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        self.push(DrawOp::Rect {
            x,
            y,
            width,
            height,
            fill: Some(color),
            border: false,
        });
    }

    fn hline(&mut self, x1: f32, x2: f32, color: Rgb, thickness: f32) {
        let y = self.y;
        self.push(DrawOp::Line {
            x1,
            y1: y,
            x2,
            y2: y,
            color,
            thickness,
        });
    }

    /// Two-column bordered table with alternating row shading.
    fn metric_table(&mut self, rows: &[(&str, String)]) {
        const SIZE: f32 = 10.0;
        let value_chars = ((VALUE_WIDTH - 2.0 * CELL_PADDING) / (SIZE * AVG_GLYPH_EM * PT_TO_MM)) as usize;

        for (i, (label, value)) in rows.iter().enumerate() {
            self.ensure_space(ROW_HEIGHT);
            let fill = if i % 2 == 1 { ROW_SHADE } else { ROW_PLAIN };
            let top = self.y;

            for (x, width) in [(MARGIN_LEFT, LABEL_WIDTH), (MARGIN_LEFT + LABEL_WIDTH, VALUE_WIDTH)] {
                self.push(DrawOp::Rect {
                    x,
                    y: top,
                    width,
                    height: ROW_HEIGHT,
                    fill: Some(fill),
                    border: true,
                });
            }

            let value = truncate(value, value_chars);
            self.text_at(MARGIN_LEFT + CELL_PADDING, top, ROW_HEIGHT, SIZE, FontStyle::Regular, label);
            self.text_at(
                MARGIN_LEFT + LABEL_WIDTH + CELL_PADDING,
                top,
                ROW_HEIGHT,
                SIZE,
                FontStyle::Regular,
                &value,
            );
            self.y += ROW_HEIGHT;
        }
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let kept: String = value.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewCompany, NewSnapshot};
    use crate::report::sections::SectionConfig;
    use chrono::TimeZone;

    fn company() -> Company {
        let mut company = NewCompany::named("Acme Corp").into_company(1);
        company.industry = Some("Technology".into());
        company.size = Some("Large".into());
        company.country = Some("USA".into());
        company.description = Some("A leading technology company.".into());
        company.environmental_highlight = Some("Carbon neutral since 2023".into());
        company
    }

    fn snapshot() -> EsgSnapshot {
        let mut snapshot = NewSnapshot::empty(1, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .into_snapshot(1);
        snapshot.social.employee_count = Some(12345);
        snapshot.social.diversity_ratio = Some(41.0);
        snapshot.governance.board_independence = Some(75.0);
        snapshot
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 7, 12, 0, 0).unwrap()
    }

    fn build(config: SectionConfig) -> DocumentLayout {
        let plan = SectionPlan::resolve(&config, SectionPlan::PDF_BASE_PAGE);
        DocumentLayout::build(&company(), &snapshot(), &plan, now())
    }

    #[test]
    fn test_page_sequence_matches_enabled_sections() {
        let layout = build(SectionConfig::only(&[Section::Overview, Section::Social]));

        assert_eq!(layout.page_count(), 4);
        assert_eq!(layout.pages[2].texts()[0], "1. Company Overview");
        assert_eq!(layout.pages[3].texts()[0], "2. Social Metrics");
        assert_eq!(layout.title, "ESG Report - Acme Corp");
    }

    #[test]
    fn test_cover_page_carries_company_identity() {
        let layout = build(SectionConfig::default());
        let cover = layout.pages[0].texts();

        assert!(cover.contains(&"ESG Analytics Report"));
        assert!(cover.contains(&"Annual Assessment 2024"));
        assert!(cover.contains(&"Acme Corp"));
        assert!(cover.contains(&"Industry: Technology"));
        assert!(cover.contains(&"Location: USA"));
        assert!(cover.contains(&"Generated on May 07, 2024"));
        assert!(cover.contains(&"CONFIDENTIAL"));
        assert_eq!(layout.page_count(), 2);
    }

    #[test]
    fn test_long_company_name_wraps_within_cover() {
        let mut company = company();
        company.name =
            "International Consolidated Renewable Infrastructure Holdings and Partners".into();
        let plan = SectionPlan::resolve(&SectionConfig::default(), SectionPlan::PDF_BASE_PAGE);
        let layout = DocumentLayout::build(&company, &snapshot(), &plan, now());

        let runs: Vec<(f32, f32, String)> = layout.pages[0]
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { x, size, text, .. } if *size == 28.0 => {
                    Some((*x, text_width_mm(text, *size), text.clone()))
                }
                _ => None,
            })
            .collect();

        // Report title plus at least two lines of the name.
        assert!(runs.len() >= 3, "name was not wrapped: {runs:?}");
        for (x, width, text) in &runs {
            assert!(*width <= CONTENT_WIDTH, "{text:?} is {width}mm wide");
            assert!(*x >= MARGIN_LEFT && x + width <= MARGIN_LEFT + CONTENT_WIDTH);
        }
        let name_words: Vec<&str> = runs[1..].iter().flat_map(|(_, _, t)| t.split(' ')).collect();
        assert_eq!(name_words.join(" "), company.name);
        assert_eq!(layout.page_count(), 2);
    }

    #[test]
    fn test_contents_lists_enabled_sections_with_pages() {
        let layout = build(SectionConfig::only(&[Section::Environmental, Section::Risks]));
        let toc = layout.pages[1].texts();

        assert_eq!(toc[0], "Table of Contents");
        assert!(toc[1].starts_with("1. Environmental Metrics ...") && toc[1].ends_with(" 3"));
        assert!(toc[2].starts_with("2. Risk Assessment ...") && toc[2].ends_with(" 4"));
    }

    #[test]
    fn test_metric_rows_are_formatted() {
        let layout = build(SectionConfig::only(&[Section::Social, Section::Governance]));

        assert!(layout.contains_text("12,345"));
        assert!(layout.contains_text("41.00%"));
        assert!(layout.contains_text("75.00%"));
        // Unset fields fall back to the placeholder.
        assert!(layout.contains_text("N/A"));
    }

    #[test]
    fn test_highlight_rendered_only_when_present() {
        let layout = build(SectionConfig::only(&[Section::Environmental, Section::Social]));

        assert!(layout.contains_text("Environmental Highlight:"));
        assert!(layout.contains_text("Carbon neutral since 2023"));
        assert!(!layout.contains_text("Social Highlight:"));
    }

    #[test]
    fn test_rows_alternate_shading() {
        let layout = build(SectionConfig::only(&[Section::Risks]));
        let fills: Vec<_> = layout.pages[2]
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Rect { fill: Some(fill), border: true, .. } => Some(*fill),
                _ => None,
            })
            .collect();

        // Two cells per row, three rows.
        assert_eq!(fills, vec![ROW_PLAIN, ROW_PLAIN, ROW_SHADE, ROW_SHADE, ROW_PLAIN, ROW_PLAIN]);
    }

    #[test]
    fn test_overflowing_section_continues_but_contents_keep_one_page_each() {
        let mut long = company();
        long.description = Some("word ".repeat(4000));
        let plan = SectionPlan::resolve(
            &SectionConfig::only(&[Section::Overview, Section::Environmental]),
            SectionPlan::PDF_BASE_PAGE,
        );
        let layout = DocumentLayout::build(&long, &snapshot(), &plan, now());

        assert_eq!(plan.sections()[1].page, 4);
        assert!(layout.section_start(Section::Environmental).unwrap() > 4);
        assert!(layout.page_count() > 4);
    }

    #[test]
    fn test_all_ops_stay_on_the_page() {
        let mut long = company();
        long.description = Some("lorem ipsum ".repeat(800));
        let plan = SectionPlan::resolve(&SectionConfig::all(), SectionPlan::PDF_BASE_PAGE);
        let layout = DocumentLayout::build(&long, &snapshot(), &plan, now());

        for page in &layout.pages {
            for op in &page.ops {
                if let DrawOp::Text { y, .. } = op {
                    assert!(*y > 0.0 && *y < PAGE_HEIGHT_MM);
                }
            }
        }
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("aa bb cc", 5), vec!["aa bb", "cc"]);
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_text("one\n\ntwo", 10), vec!["one", "", "two"]);
    }
}
