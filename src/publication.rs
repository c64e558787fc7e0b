//! Per-publication extraction settings.
//!
//! Settings live in a JSON object keyed by publication name:
//!
//! ```json
//! {
//!   "daily_nation": {
//!     "folder_name": "Daily_Nation_first100",
//!     "agency_name": "Daily Nation",
//!     "ignore_keywords": ["DAILY NATION", "National News"],
//!     "header_delimiter": "〇〇〇",
//!     "header_placeholder": "〇〇〇"
//!   }
//! }
//! ```
//!
//! `date_pattern` is optional and falls back to [`DEFAULT_DATE_PATTERN`].

use crate::error::{PipelineError, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// English month-name date, optionally preceded by a weekday:
/// `Monday, March 3, 2020` or `MARCH 3 2020`. Day-first dates are not matched.
pub const DEFAULT_DATE_PATTERN: &str = concat!(
    r"(?:(?:Mon|Tues|Wednes|Thurs|Fri|Satur|Sun)day[,\s]*)?",
    r"(January|February|March|April|May|June|July|August|September|October|November|December)",
    r"[,\s]*([1-9]|[12]\d|3[01])[,\s]*",
    r"\d{4}",
);

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct PublicationEntry {
    folder_name: String,
    agency_name: String,
    ignore_keywords: Vec<String>,
    header_delimiter: String,
    header_placeholder: String,
    #[serde(default)]
    date_pattern: Option<String>,
}

/// Immutable extraction parameters for one publication.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    folder_name: String,
    agency_name: String,
    ignore_keywords: Vec<String>,
    header_delimiter: String,
    header_placeholder: String,
    date_regex: Regex,
}

impl ExtractionConfig {
    /// Builds a config, compiling `date_pattern` case-insensitively.
    /// `None` selects [`DEFAULT_DATE_PATTERN`].
    pub fn new(
        folder_name: impl Into<String>,
        agency_name: impl Into<String>,
        ignore_keywords: &[&str],
        header_delimiter: impl Into<String>,
        header_placeholder: impl Into<String>,
        date_pattern: Option<&str>,
    ) -> Result<Self> {
        let pattern = date_pattern.unwrap_or(DEFAULT_DATE_PATTERN);
        let date_regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("invalid date pattern: {e}")))?;

        let mut keywords: Vec<String> = Vec::with_capacity(ignore_keywords.len());
        for kw in ignore_keywords {
            let lowered = kw.to_lowercase();
            if lowered.is_empty() {
                return Err(PipelineError::Configuration(
                    "ignore keywords must not be empty".to_string(),
                ));
            }
            if !keywords.contains(&lowered) {
                keywords.push(lowered);
            }
        }

        Ok(Self {
            folder_name: folder_name.into(),
            agency_name: agency_name.into(),
            ignore_keywords: keywords,
            header_delimiter: header_delimiter.into(),
            header_placeholder: header_placeholder.into(),
            date_regex,
        })
    }

    fn from_entry(entry: &PublicationEntry) -> Result<Self> {
        let keywords: Vec<&str> = entry.ignore_keywords.iter().map(String::as_str).collect();
        Self::new(
            entry.folder_name.as_str(),
            entry.agency_name.as_str(),
            &keywords,
            entry.header_delimiter.as_str(),
            entry.header_placeholder.as_str(),
            entry.date_pattern.as_deref(),
        )
    }

    pub fn folder_name(&self) -> &str {
        &self.folder_name
    }

    pub fn agency_name(&self) -> &str {
        &self.agency_name
    }

    /// Lowercased, deduplicated, in configured order.
    pub fn ignore_keywords(&self) -> &[String] {
        &self.ignore_keywords
    }

    pub fn header_delimiter(&self) -> &str {
        &self.header_delimiter
    }

    pub fn header_placeholder(&self) -> &str {
        &self.header_placeholder
    }

    pub fn date_regex(&self) -> &Regex {
        &self.date_regex
    }

    /// True when `title` contains any ignore keyword, ignoring case.
    pub fn is_ignored(&self, title: &str) -> bool {
        if self.ignore_keywords.is_empty() {
            return false;
        }
        let lowered = title.to_lowercase();
        self.ignore_keywords
            .iter()
            .any(|kw| lowered.contains(kw.as_str()))
    }
}

/// Every publication known to a settings file.
#[derive(Debug, Default)]
pub struct Publications {
    entries: BTreeMap<String, PublicationEntry>,
}

impl Publications {
    pub fn load(path: &Path) -> Result<Self> {
        info!(config_path = ?path, "Loading publication settings");
        let json = fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let entries: BTreeMap<String, PublicationEntry> = serde_json::from_str(json)
            .map_err(|e| PipelineError::Configuration(format!("malformed settings: {e}")))?;
        debug!(publications = entries.len(), "Parsed publication settings");
        Ok(Self { entries })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn select(&self, name: &str) -> Result<ExtractionConfig> {
        let entry = self.entries.get(name).ok_or_else(|| {
            let known = self.names().collect::<Vec<_>>().join(", ");
            PipelineError::Configuration(format!(
                "unknown publication '{name}' (known: {known})"
            ))
        })?;
        let config = ExtractionConfig::from_entry(entry)?;
        info!(
            publication = name,
            agency = config.agency_name(),
            folder = config.folder_name(),
            "Selected publication"
        );
        Ok(config)
    }
}
