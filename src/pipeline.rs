//! Sequential extraction run: documents → markdown → fields → CSV shards.

use crate::config::{MIN_ROWS_PER_SHARD, PROGRESS_INTERVAL};
use crate::content;
use crate::error::{PipelineError, Result};
use crate::models::Record;
use crate::publication::ExtractionConfig;
use crate::shard::{first_shard_for, ShardOptions, ShardWriter};
use crate::source::{document_name, DocumentConverter, DocumentSource};
use crate::stats::RunStats;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What to do when one document cannot be converted to markdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ConversionPolicy {
    /// Log the failure and continue with the next document.
    #[default]
    Skip,
    /// Stop the whole run.
    Abort,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    /// Shard base name; the publication's folder name when `None`.
    pub base_name: Option<String>,
    pub start_index: usize,
    pub max_rows_per_shard: usize,
    pub on_conversion_error: ConversionPolicy,
    pub show_progress: bool,
}

impl RunOptions {
    pub fn new(output_dir: impl Into<PathBuf>, max_rows_per_shard: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            base_name: None,
            start_index: 0,
            max_rows_per_shard,
            on_conversion_error: ConversionPolicy::default(),
            show_progress: false,
        }
    }

    /// Rejects offsets and shard sizes outside the document list.
    ///
    /// Shards must hold between [`MIN_ROWS_PER_SHARD`] and `total` rows; a
    /// list shorter than the minimum allows exactly `total`.
    pub fn validate(&self, total: usize) -> Result<()> {
        if total == 0 {
            return Err(PipelineError::InvalidArgument(
                "the document list is empty".to_string(),
            ));
        }
        if self.start_index >= total {
            return Err(PipelineError::InvalidArgument(format!(
                "start index {} is outside 0..={}",
                self.start_index,
                total - 1
            )));
        }
        let min_rows = MIN_ROWS_PER_SHARD.min(total);
        if !(min_rows..=total).contains(&self.max_rows_per_shard) {
            return Err(PipelineError::InvalidArgument(format!(
                "max rows per shard {} is outside {}..={}",
                self.max_rows_per_shard, min_rows, total
            )));
        }
        Ok(())
    }
}

/// Processes every document from `options.start_index` to the end of the
/// source's list, one at a time.
pub fn run_pipeline(
    config: &ExtractionConfig,
    source: &dyn DocumentSource,
    converter: &mut dyn DocumentConverter,
    options: &RunOptions,
) -> Result<RunStats> {
    let documents = source.documents()?;
    options.validate(documents.len())?;

    let base_name = options
        .base_name
        .clone()
        .unwrap_or_else(|| config.folder_name().to_string());
    let shard_options = ShardOptions {
        output_dir: options.output_dir.clone(),
        base_name,
        max_rows: options.max_rows_per_shard,
        first_shard: first_shard_for(options.start_index, options.max_rows_per_shard),
        overwrite: options.start_index == 0,
    };
    let mut writer = ShardWriter::create(shard_options, config.header_delimiter())?;

    let mut stats = RunStats::new(documents.len(), options.start_index);
    let remaining = documents.len() - options.start_index;
    let pb = make_progress_bar(remaining as u64, options.show_progress);

    info!(
        total = documents.len(),
        start_index = options.start_index,
        max_rows = options.max_rows_per_shard,
        first_shard = writer.shard_index(),
        "Starting extraction run"
    );

    for (index, path) in documents.iter().enumerate().skip(options.start_index) {
        let name = document_name(path);
        pb.set_message(name.clone());

        let markdown = match converter.to_markdown(path) {
            Ok(md) => md,
            Err(e) => match options.on_conversion_error {
                ConversionPolicy::Abort => {
                    pb.abandon();
                    return Err(e);
                }
                ConversionPolicy::Skip => {
                    warn!(index, document = %name, error = %e, "Skipping unconvertible document");
                    stats.record_skipped(index);
                    pb.inc(1);
                    continue;
                }
            },
        };

        let extraction = content::extract(&markdown, config);
        let incomplete = extraction.is_incomplete();
        if incomplete {
            warn!(
                index,
                document = %name,
                missing = ?extraction.missing_fields(),
                "Missing data"
            );
        }

        let record = Record::new(name, config, extraction);
        writer.write_record(&record)?;
        stats.record_processed(index, incomplete);
        debug!(
            index,
            document = %record.file_name,
            headers = record.headers.len(),
            shard = writer.shard_index(),
            "Processed document"
        );

        if stats.documents_seen() % PROGRESS_INTERVAL == 0 {
            info!(
                seen = stats.documents_seen(),
                remaining = remaining as u64 - stats.documents_seen(),
                resume_index = stats.resume_index(),
                "Progress"
            );
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    let summary = writer.finish()?;
    stats.shards_created = summary.shards_created;

    info!(
        processed = stats.documents_processed,
        missing = stats.missing_data,
        skipped = stats.documents_skipped,
        shards = stats.shards_created,
        last_shard = ?summary.last_shard,
        "Extraction run complete"
    );
    Ok(stats)
}

fn make_progress_bar(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use tempfile::TempDir;

    struct FixedSource(Vec<PathBuf>);

    impl DocumentSource for FixedSource {
        fn documents(&self) -> Result<Vec<PathBuf>> {
            Ok(self.0.clone())
        }
    }

    /// Serves canned markdown; documents without an entry fail to convert.
    #[derive(Default)]
    struct CannedConverter {
        pages: HashMap<PathBuf, String>,
        calls: Vec<PathBuf>,
    }

    impl DocumentConverter for CannedConverter {
        fn to_markdown(&mut self, path: &Path) -> Result<String> {
            self.calls.push(path.to_path_buf());
            self.pages
                .get(path)
                .cloned()
                .ok_or_else(|| PipelineError::Conversion {
                    path: path.to_path_buf(),
                    reason: "corrupt scan".to_string(),
                })
        }
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig::new("nation", "Daily Nation", &["daily nation"], "|", "<H>", None)
            .unwrap()
    }

    fn fixture(count: usize) -> (FixedSource, CannedConverter) {
        let mut converter = CannedConverter::default();
        let docs: Vec<PathBuf> = (0..count)
            .map(|i| PathBuf::from(format!("doc{i:04}.pdf")))
            .collect();
        for path in &docs {
            converter.pages.insert(
                path.clone(),
                "# DAILY NATION\n## Story\nText. March 3, 2020".to_string(),
            );
        }
        (FixedSource(docs), converter)
    }

    #[test]
    fn validate_bounds() {
        let mut opts = RunOptions::new("/out", 100);
        assert!(opts.validate(250).is_ok());
        assert!(opts.validate(0).is_err());

        opts.start_index = 249;
        assert!(opts.validate(250).is_ok());
        opts.start_index = 250;
        assert!(opts.validate(250).is_err());

        opts.start_index = 0;
        opts.max_rows_per_shard = 99;
        assert!(opts.validate(250).is_err());
        opts.max_rows_per_shard = 251;
        assert!(opts.validate(250).is_err());
        opts.max_rows_per_shard = 250;
        assert!(opts.validate(250).is_ok());
    }

    #[test]
    fn short_list_requires_single_shard() {
        let mut opts = RunOptions::new("/out", 5);
        assert!(opts.validate(5).is_ok());
        opts.max_rows_per_shard = 4;
        assert!(opts.validate(5).is_err());
    }

    #[test]
    fn invalid_options_create_no_shard() {
        let dir = TempDir::new().unwrap();
        let (source, mut converter) = fixture(120);
        let mut opts = RunOptions::new(dir.path().join("out"), 100);
        opts.start_index = 500;

        let err = run_pipeline(&config(), &source, &mut converter, &opts).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
        assert!(!dir.path().join("out").exists());
        assert!(converter.calls.is_empty());
    }

    #[test]
    fn skip_policy_continues_after_conversion_failure() {
        let dir = TempDir::new().unwrap();
        let (source, mut converter) = fixture(120);
        converter.pages.remove(&PathBuf::from("doc0005.pdf"));

        let opts = RunOptions::new(dir.path(), 100);
        let stats = run_pipeline(&config(), &source, &mut converter, &opts).unwrap();

        assert_eq!(stats.documents_processed, 119);
        assert_eq!(stats.documents_skipped, 1);
        assert_eq!(stats.missing_data, 0);
        assert_eq!(stats.shards_created, 2);
        assert_eq!(stats.resume_index(), 120);
    }

    #[test]
    fn abort_policy_stops_run() {
        let dir = TempDir::new().unwrap();
        let (source, mut converter) = fixture(120);
        converter.pages.remove(&PathBuf::from("doc0005.pdf"));

        let mut opts = RunOptions::new(dir.path(), 100);
        opts.on_conversion_error = ConversionPolicy::Abort;
        let err = run_pipeline(&config(), &source, &mut converter, &opts).unwrap_err();

        assert!(matches!(err, PipelineError::Conversion { .. }));
        assert_eq!(converter.calls.len(), 6);
    }

    #[test]
    fn resume_skips_earlier_documents() {
        let dir = TempDir::new().unwrap();
        let (source, mut converter) = fixture(120);
        let mut opts = RunOptions::new(dir.path(), 100);
        opts.start_index = 30;

        let stats = run_pipeline(&config(), &source, &mut converter, &opts).unwrap();

        assert_eq!(stats.documents_processed, 90);
        assert_eq!(converter.calls.len(), 90);
        assert_eq!(converter.calls[0], PathBuf::from("doc0030.pdf"));
        assert!(dir.path().join("nation_part2.csv").exists());
        assert!(!dir.path().join("nation.csv").exists());
    }

    #[test]
    fn incomplete_documents_are_counted_and_written() {
        let dir = TempDir::new().unwrap();
        let (source, mut converter) = fixture(100);
        converter
            .pages
            .insert(PathBuf::from("doc0001.pdf"), "no headers, no date".to_string());
        converter
            .pages
            .insert(PathBuf::from("doc0002.pdf"), String::new());

        let opts = RunOptions::new(dir.path(), 100);
        let stats = run_pipeline(&config(), &source, &mut converter, &opts).unwrap();

        assert_eq!(stats.documents_processed, 100);
        assert_eq!(stats.missing_data, 2);
        assert_eq!(stats.shards_created, 1);
    }

    #[test]
    fn base_name_override() {
        let dir = TempDir::new().unwrap();
        let (source, mut converter) = fixture(100);
        let mut opts = RunOptions::new(dir.path(), 100);
        opts.base_name = Some("nation_1990s".to_string());

        run_pipeline(&config(), &source, &mut converter, &opts).unwrap();
        assert!(dir.path().join("nation_1990s.csv").exists());
    }
}
