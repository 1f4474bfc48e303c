use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{award::FundingField, classifier::MatchMode, report::TableWidths};

pub const DEFAULT_API_BASE_URL: &str = "http://api.nsf.gov/services/v1/awards.json";

/// Upper bound on `page_size`; the public API serves at most 25 per page.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Runtime configuration; every field has a default so partial files work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Awards endpoint queried by the API source.
    pub api_base_url: String,
    /// Records per page (`rpp`); the public API caps this at 25.
    pub page_size: u32,
    /// Per-request timeout, humantime syntax (`30s`, `2m`).
    pub timeout: String,
    /// Directory holding `awards_<year>/` cache folders.
    pub cache_dir: PathBuf,
    pub funding_field: FundingField,
    pub match_mode: MatchMode,
    /// Rows in the ranked summary and PDF export.
    pub top_n: usize,
    pub awardee_width: usize,
    pub title_width: usize,
    /// Tier table to use instead of the built-in one.
    pub vocabulary: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: 25,
            timeout: "30s".to_string(),
            cache_dir: PathBuf::from("."),
            funding_field: FundingField::default(),
            match_mode: MatchMode::default(),
            top_n: 10,
            awardee_width: 20,
            title_width: 30,
            vocabulary: None,
        }
    }
}

impl AppSettings {
    pub fn timeout(&self) -> Result<Duration> {
        humantime::parse_duration(self.timeout.trim())
            .with_context(|| format!("invalid timeout `{}`", self.timeout))
    }

    pub fn table_widths(&self) -> TableWidths {
        TableWidths {
            awardee: self.awardee_width,
            title: self.title_width,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            bail!("api_base_url must not be empty");
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            bail!("page_size must be between 1 and {MAX_PAGE_SIZE}");
        }
        if self.timeout()?.is_zero() {
            bail!("timeout must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_public_api() {
        let settings = AppSettings::default();
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(settings.page_size, 25);
        assert_eq!(settings.timeout().unwrap(), Duration::from_secs(30));
        assert_eq!(settings.funding_field, FundingField::Obligated);
        assert_eq!(settings.match_mode, MatchMode::Substring);
        assert_eq!(settings.table_widths(), TableWidths::default());
        settings.validate().unwrap();
    }

    #[test]
    fn partial_documents_fill_defaults() {
        let settings: AppSettings = serde_json::from_str(
            r#"{"page_size": 10, "match_mode": "whole_word", "funding_field": "estimated"}"#,
        )
        .unwrap();
        assert_eq!(settings.page_size, 10);
        assert_eq!(settings.match_mode, MatchMode::WholeWord);
        assert_eq!(settings.funding_field, FundingField::Estimated);
        assert_eq!(settings.top_n, 10);
    }

    #[test]
    fn rejects_bad_timeouts_and_page_sizes() {
        let settings = AppSettings {
            timeout: "soon".into(),
            ..AppSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = AppSettings {
            page_size: 0,
            ..AppSettings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("page_size"));

        let settings = AppSettings {
            page_size: u32::MAX,
            ..AppSettings::default()
        };
        assert!(settings.validate().is_err());
        let settings = AppSettings {
            page_size: MAX_PAGE_SIZE,
            ..AppSettings::default()
        };
        settings.validate().unwrap();
    }
}
