//! The output spreadsheet: written at the end of a run, read back at the
//! start of the next one. The contacts sheet name and its nine columns are
//! the contract between runs.

use crate::contact::{Contact, DedupState, Organization};
use anyhow::{Context, Result};
use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::Local;
use rust_xlsxwriter::{Format, Workbook};
use std::collections::HashSet;
use std::path::Path;

pub const CONTACTS_SHEET: &str = "IT CS Recruiting Contacts";
pub const OVERVIEW_SHEET: &str = "Consultancies Overview";
pub const README_SHEET: &str = "README";

pub const CONTACT_COLUMNS: [&str; 9] = [
    "Consultancy",
    "First Name",
    "Last Name",
    "Email",
    "Job Title",
    "LinkedIn Profile URL",
    "Phone",
    "Source",
    "Notes",
];
const CONTACT_WIDTHS: [f64; 9] = [22.0, 15.0, 15.0, 35.0, 35.0, 45.0, 16.0, 12.0, 40.0];

const OVERVIEW_COLUMNS: [&str; 5] = ["Consultancy", "Domain", "Careers URL", "Contacts Found", "With Email"];
const OVERVIEW_WIDTHS: [f64; 5] = [22.0, 22.0, 50.0, 16.0, 14.0];

/// Contacts and dedup sets recovered from a previous run's output.
#[derive(Debug, Default)]
pub struct PriorRun {
    pub contacts: Vec<Contact>,
    pub seen: HashSet<String>,
    pub enriched: HashSet<String>,
}

impl PriorRun {
    pub fn from_contacts(contacts: Vec<Contact>) -> Self {
        let DedupState { seen, enriched } = DedupState::from_contacts(&contacts);
        Self {
            contacts,
            seen,
            enriched,
        }
    }

    pub fn with_email(&self) -> usize {
        self.contacts.iter().filter(|c| c.has_email()).count()
    }
}

/// Read the contacts sheet of a previous output file.
///
/// Never fails: a missing file, an unreadable workbook or a missing sheet
/// all mean "no prior data".
pub fn load_existing(path: &Path) -> PriorRun {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no previous output file");
        return PriorRun::default();
    }
    match read_contacts(path) {
        Ok(contacts) => PriorRun::from_contacts(contacts),
        Err(e) => {
            tracing::warn!(path = %path.display(), "could not read existing output: {:#}", e);
            PriorRun::default()
        }
    }
}

fn read_contacts(path: &Path) -> Result<Vec<Contact>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context("failed to open workbook")?;
    if !workbook.sheet_names().iter().any(|s| s == CONTACTS_SHEET) {
        anyhow::bail!("sheet '{}' not found", CONTACTS_SHEET);
    }
    let range = workbook
        .worksheet_range(CONTACTS_SHEET)
        .with_context(|| format!("failed to read sheet '{}'", CONTACTS_SHEET))?;

    // Row 1 is the header.
    let contacts = range.rows().skip(1).filter_map(row_to_contact).collect();
    Ok(contacts)
}

fn row_to_contact(row: &[Data]) -> Option<Contact> {
    let cell = |i: usize| -> String {
        row.get(i)
            .map(|c| c.to_string().trim().to_string())
            .unwrap_or_default()
    };
    let contact = Contact {
        organization: cell(0),
        first_name: cell(1),
        last_name: cell(2),
        email: cell(3),
        job_title: cell(4),
        linkedin_url: cell(5),
        phone: cell(6),
        source: cell(7),
        notes: cell(8),
    };
    let anonymous = contact.first_name.is_empty() && contact.last_name.is_empty() && contact.email.is_empty();
    if contact.organization.is_empty() || anonymous {
        return None;
    }
    Some(contact)
}

/// Write the contacts sheet plus an overview and README sheet.
pub fn write_workbook(path: &Path, contacts: &[Contact], organizations: &[Organization]) -> Result<()> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(CONTACTS_SHEET)?;
        for (col, (header, width)) in CONTACT_COLUMNS.iter().zip(CONTACT_WIDTHS).enumerate() {
            let col = col as u16;
            sheet.write_string_with_format(0, col, *header, &bold)?;
            sheet.set_column_width(col, width)?;
        }
        sheet.set_freeze_panes(1, 0)?;

        for (i, c) in contacts.iter().enumerate() {
            let row = i as u32 + 1;
            let values = [
                &c.organization,
                &c.first_name,
                &c.last_name,
                &c.email,
                &c.job_title,
                &c.linkedin_url,
                &c.phone,
                &c.source,
                &c.notes,
            ];
            for (col, value) in values.into_iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(row, col as u16, value.as_str())?;
                }
            }
        }
    }

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(OVERVIEW_SHEET)?;
        for (col, (header, width)) in OVERVIEW_COLUMNS.iter().zip(OVERVIEW_WIDTHS).enumerate() {
            let col = col as u16;
            sheet.write_string_with_format(0, col, *header, &bold)?;
            sheet.set_column_width(col, width)?;
        }
        sheet.set_freeze_panes(1, 0)?;

        for (i, org) in organizations.iter().enumerate() {
            let row = i as u32 + 1;
            let (found, with_email) = count_for(contacts, &org.name);
            sheet.write_string(row, 0, org.name.as_str())?;
            sheet.write_string(row, 1, org.domain.as_str())?;
            sheet.write_string(row, 2, org.careers_url.as_str())?;
            sheet.write_number(row, 3, found as f64)?;
            sheet.write_number(row, 4, with_email as f64)?;
        }
    }

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(README_SHEET)?;
        sheet.write_string_with_format(0, 0, "Item", &bold)?;
        sheet.write_string_with_format(0, 1, "Details", &bold)?;
        sheet.set_column_width(0, 25)?;
        sheet.set_column_width(1, 80)?;
        let firms = organizations.iter().map(|o| o.name.as_str()).collect::<Vec<_>>().join(", ");
        let generated = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let rows = [
            ("Generated at", generated.as_str()),
            ("Target firms", firms.as_str()),
            ("Sources", "Apollo.io people search, Hunter.io domain search"),
            ("Incremental", "Re-running skips already-found contacts and completed searches"),
            ("Fresh start", "Use --fresh to clear the search cache and start over"),
        ];
        for (i, (item, details)) in rows.iter().enumerate() {
            let row = i as u32 + 1;
            sheet.write_string(row, 0, *item)?;
            sheet.write_string(row, 1, *details)?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("failed to save workbook {}", path.display()))?;
    tracing::info!(path = %path.display(), contacts = contacts.len(), "workbook saved");
    Ok(())
}

/// (contacts, contacts with email) for one organization.
pub fn count_for(contacts: &[Contact], organization: &str) -> (usize, usize) {
    contacts
        .iter()
        .filter(|c| c.organization == organization)
        .fold((0, 0), |(n, e), c| (n + 1, e + usize::from(c.has_email())))
}
