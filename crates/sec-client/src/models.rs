//! EDGAR JSON payloads.

use serde::Deserialize;
use std::collections::HashMap;

/// `company_tickers.json`: index -> registrant
pub(crate) type CompanyTickers = HashMap<String, CompanyTickerEntry>;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CompanyTickerEntry {
    pub cik_str: u64,
    pub ticker: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Submissions {
    #[serde(default)]
    pub name: Option<String>,
    pub filings: SubmissionFilings,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionFilings {
    pub recent: RecentFilings,
}

/// Column-oriented list of recent filings, newest first.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecentFilings {
    #[serde(default)]
    pub accession_number: Vec<String>,
    #[serde(default)]
    pub filing_date: Vec<String>,
    #[serde(default)]
    pub form: Vec<String>,
    #[serde(default)]
    pub primary_document: Vec<String>,
}

/// One filing picked out of [`RecentFilings`].
#[derive(Debug, Clone, PartialEq)]
pub struct FilingRef {
    pub cik: u64,
    pub form: String,
    pub accession_number: String,
    pub filing_date: String,
    pub primary_document: String,
}

impl FilingRef {
    /// Archive URL of the primary document.
    pub fn document_url(&self, archive_base: &str) -> String {
        format!(
            "{}/Archives/edgar/data/{}/{}/{}",
            archive_base,
            self.cik,
            self.accession_number.replace('-', ""),
            self.primary_document
        )
    }
}

impl RecentFilings {
    /// Most recent annual report, falling back to the most recent quarterly one.
    pub fn latest_report(&self, cik: u64) -> Option<FilingRef> {
        ["10-K", "10-Q"].iter().find_map(|wanted| {
            let idx = self.form.iter().position(|form| form == wanted)?;
            Some(FilingRef {
                cik,
                form: self.form[idx].clone(),
                accession_number: self.accession_number.get(idx)?.clone(),
                filing_date: self.filing_date.get(idx).cloned().unwrap_or_default(),
                primary_document: self.primary_document.get(idx)?.clone(),
            })
        })
    }
}
