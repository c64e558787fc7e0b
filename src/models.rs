use crate::publication::ExtractionConfig;

/// Fields pulled from one document's markdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub date: Option<String>,
    pub headers: Vec<String>,
    pub body: String,
}

impl Extraction {
    pub fn is_incomplete(&self) -> bool {
        self.date.is_none() || self.headers.is_empty() || self.body.is_empty()
    }

    /// Names of the empty fields, for diagnostics.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.date.is_none() {
            missing.push("date");
        }
        if self.headers.is_empty() {
            missing.push("headers");
        }
        if self.body.is_empty() {
            missing.push("body");
        }
        missing
    }
}

/// One output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub file_name: String,
    pub agency: String,
    pub date: Option<String>,
    pub headers: Vec<String>,
    pub body: String,
}

impl Record {
    pub fn new(file_name: impl Into<String>, config: &ExtractionConfig, extraction: Extraction) -> Self {
        Self {
            file_name: file_name.into(),
            agency: config.agency_name().to_string(),
            date: extraction.date,
            headers: extraction.headers,
            body: extraction.body,
        }
    }

    /// Column values in output order; headers are joined with `delimiter`.
    pub fn to_row(&self, delimiter: &str) -> [String; 5] {
        [
            self.file_name.clone(),
            self.agency.clone(),
            self.date.clone().unwrap_or_default(),
            self.headers.join(delimiter),
            self.body.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_lists_each_empty_field() {
        let extraction = Extraction {
            date: None,
            headers: Vec::new(),
            body: "text".to_string(),
        };
        assert!(extraction.is_incomplete());
        assert_eq!(extraction.missing_fields(), ["date", "headers"]);
    }

    #[test]
    fn complete_extraction() {
        let extraction = Extraction {
            date: Some("March 3, 2020".to_string()),
            headers: vec!["City News".to_string()],
            body: "text".to_string(),
        };
        assert!(!extraction.is_incomplete());
        assert!(extraction.missing_fields().is_empty());
    }

    #[test]
    fn row_joins_headers_and_blanks_missing_date() {
        let config = ExtractionConfig::new("f", "Daily Nation", &[], "〇〇〇", "<H>", None).unwrap();
        let record = Record::new(
            "003DNC1812",
            &config,
            Extraction {
                date: None,
                headers: vec!["One".to_string(), "Two".to_string()],
                body: "body".to_string(),
            },
        );
        assert_eq!(
            record.to_row(config.header_delimiter()),
            ["003DNC1812", "Daily Nation", "", "One〇〇〇Two", "body"]
        );
    }
}
