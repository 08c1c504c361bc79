//! Single-row spreadsheet export.
//!
//! The record is built as plain data first ([`TabularRecord`]) and only then
//! written to an xlsx workbook, so column selection can be checked without
//! unpacking a workbook.

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook};

use crate::model::{Company, EsgSnapshot};
use super::sections::{Section, SectionPlan};
use super::RenderError;

/// Identity columns present in every export.
pub const IDENTITY_COLUMNS: [&str; 5] = ["Company Name", "Industry", "Size", "Country", "Report Date"];

/// One spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Text cell.
    Text(String),
    /// Numeric cell.
    Number(f64),
    /// Empty cell for unset values.
    Empty,
}

impl Cell {
    fn text(value: Option<&str>) -> Self {
        value.map_or(Cell::Empty, |s| Cell::Text(s.to_string()))
    }

    fn number(value: Option<f64>) -> Self {
        value.map_or(Cell::Empty, Cell::Number)
    }

    fn integer(value: Option<i64>) -> Self {
        value.map_or(Cell::Empty, |v| Cell::Number(v as f64))
    }
}

/// Header/value pairs of the exported row, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularRecord {
    columns: Vec<(String, Cell)>,
}

impl TabularRecord {
    /// Build the record for the planned sections.
    pub fn build(
        company: &Company,
        snapshot: &EsgSnapshot,
        plan: &SectionPlan,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut record = Self { columns: Vec::new() };

        record.push("Company Name", Cell::Text(company.name.clone()));
        record.push("Industry", Cell::text(company.industry.as_deref()));
        record.push("Size", Cell::text(company.size.as_deref()));
        record.push("Country", Cell::text(company.country.as_deref()));
        record.push(
            "Report Date",
            Cell::Text(generated_at.format("%Y-%m-%d %H:%M:%S").to_string()),
        );

        for planned in plan.sections() {
            record.push_section(planned.section, company, snapshot);
        }
        record
    }

    fn push(&mut self, header: &str, cell: Cell) {
        self.columns.push((header.to_string(), cell));
    }

    fn push_section(&mut self, section: Section, company: &Company, snapshot: &EsgSnapshot) {
        match section {
            Section::Overview => {
                self.push("Description", Cell::text(company.description.as_deref()));
                self.push(
                    "Environmental Highlight",
                    Cell::text(company.environmental_highlight.as_deref()),
                );
                self.push("Social Highlight", Cell::text(company.social_highlight.as_deref()));
                self.push(
                    "Governance Highlight",
                    Cell::text(company.governance_highlight.as_deref()),
                );
            }
            Section::Environmental => {
                let env = &snapshot.environmental;
                self.push("CO2 Emissions (tonnes)", Cell::number(env.co2_emissions));
                self.push("Energy Consumption (MWh)", Cell::number(env.energy_consumption));
                self.push("Renewable Energy (%)", Cell::number(env.renewable_energy_percent));
                self.push("Water Usage (m³)", Cell::number(env.water_usage));
            }
            Section::Social => {
                let social = &snapshot.social;
                self.push("Employee Count", Cell::integer(social.employee_count));
                self.push("Diversity Ratio (%)", Cell::number(social.diversity_ratio));
                self.push("Safety Incidents", Cell::integer(social.safety_incidents));
                self.push("Training Hours (hours/employee)", Cell::number(social.training_hours));
            }
            Section::Governance => {
                let gov = &snapshot.governance;
                self.push("Board Independence (%)", Cell::number(gov.board_independence));
                self.push("Board Diversity (%)", Cell::number(gov.board_diversity));
                self.push("Ethics Violations", Cell::integer(gov.ethics_violations));
                self.push("Data Breaches", Cell::integer(gov.data_breaches));
            }
            Section::Risks => {
                let risks = &snapshot.risks;
                self.push("Environmental Risks", Cell::text(risks.environmental.as_deref()));
                self.push("Social Risks", Cell::text(risks.social.as_deref()));
                self.push("Governance Risks", Cell::text(risks.governance.as_deref()));
            }
        }
    }

    /// Column headers in order.
    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|(h, _)| h.as_str()).collect()
    }

    /// Cell under a header.
    pub fn cell(&self, header: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, c)| c)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false: identity columns are always present.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Write the record as a header row plus one data row.
    pub fn to_xlsx(&self) -> Result<Vec<u8>, RenderError> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("ESG Report")?;

        for (col, (header, cell)) in self.columns.iter().enumerate() {
            let col = col as u16;
            worksheet.write_string_with_format(0, col, header.as_str(), &header_format)?;
            match cell {
                Cell::Text(value) => {
                    worksheet.write_string(1, col, value.as_str())?;
                }
                Cell::Number(value) => {
                    worksheet.write_number(1, col, *value)?;
                }
                Cell::Empty => {}
            }
            let width = header.chars().count().max(12) as f64 + 2.0;
            worksheet.set_column_width(col, width)?;
        }

        Ok(workbook.save_to_buffer()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewCompany, NewSnapshot};
    use crate::report::sections::SectionConfig;
    use chrono::TimeZone;

    fn fixture() -> (Company, EsgSnapshot, DateTime<Utc>) {
        let mut company = NewCompany::named("Acme").into_company(1);
        company.industry = Some("Technology".into());
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let mut snapshot = NewSnapshot::empty(1, at).into_snapshot(7);
        snapshot.environmental.co2_emissions = Some(1200.5);
        snapshot.social.employee_count = Some(5000);
        (company, snapshot, at)
    }

    #[test]
    fn test_environmental_only_columns() {
        let (company, snapshot, at) = fixture();
        let plan = SectionPlan::resolve(&SectionConfig::only(&[Section::Environmental]), 1);
        let record = TabularRecord::build(&company, &snapshot, &plan, at);

        assert_eq!(
            record.headers(),
            vec![
                "Company Name",
                "Industry",
                "Size",
                "Country",
                "Report Date",
                "CO2 Emissions (tonnes)",
                "Energy Consumption (MWh)",
                "Renewable Energy (%)",
                "Water Usage (m³)",
            ]
        );
    }

    #[test]
    fn test_no_sections_keeps_identity_columns() {
        let (company, snapshot, at) = fixture();
        let plan = SectionPlan::resolve(&SectionConfig::default(), 1);
        let record = TabularRecord::build(&company, &snapshot, &plan, at);

        assert_eq!(record.headers(), IDENTITY_COLUMNS.to_vec());
        assert_eq!(
            record.cell("Report Date"),
            Some(&Cell::Text("2024-03-01 09:30:00".into()))
        );
    }

    #[test]
    fn test_unset_values_are_empty_cells() {
        let (company, snapshot, at) = fixture();
        let plan = SectionPlan::resolve(&SectionConfig::all(), 1);
        let record = TabularRecord::build(&company, &snapshot, &plan, at);

        assert_eq!(record.cell("Size"), Some(&Cell::Empty));
        assert_eq!(record.cell("Water Usage (m³)"), Some(&Cell::Empty));
        assert_eq!(record.cell("CO2 Emissions (tonnes)"), Some(&Cell::Number(1200.5)));
        assert_eq!(record.cell("Employee Count"), Some(&Cell::Number(5000.0)));
    }

    #[test]
    fn test_social_and_governance_columns_do_not_overlap() {
        let (company, snapshot, at) = fixture();
        let plan = SectionPlan::resolve(
            &SectionConfig::only(&[Section::Social, Section::Governance]),
            1,
        );
        let record = TabularRecord::build(&company, &snapshot, &plan, at);
        let headers = record.headers();

        let mut unique = headers.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), headers.len());
        assert_eq!(record.len(), IDENTITY_COLUMNS.len() + 8);
    }

    #[test]
    fn test_xlsx_output_is_a_zip_container() {
        let (company, snapshot, at) = fixture();
        let plan = SectionPlan::resolve(&SectionConfig::all(), 1);
        let bytes = TabularRecord::build(&company, &snapshot, &plan, at)
            .to_xlsx()
            .unwrap();

        assert_eq!(&bytes[..2], b"PK");
    }
}
