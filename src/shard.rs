//! Size-bounded CSV shards.
//!
//! A run writes `<base>.csv`, then `<base>_part2.csv`, `<base>_part3.csv`, …
//! Each shard starts with a UTF-8 byte-order mark and the header row, and
//! holds at most `max_rows` records. The current shard is flushed and closed
//! as soon as its budget is exhausted and another record arrives.

use crate::config::{CSV_BUFFER_SIZE, FIELDNAMES, SHARD_SUFFIX, UTF8_BOM};
use crate::error::{PipelineError, Result};
use crate::models::Record;
use csv::Writer;
use regex::Regex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Path of shard `index` (1-based); shard 1 carries no suffix.
pub fn shard_path(output_dir: &Path, base_name: &str, index: u32) -> PathBuf {
    if index <= 1 {
        output_dir.join(format!("{}.csv", base_name))
    } else {
        output_dir.join(format!("{}{}{}.csv", base_name, SHARD_SUFFIX, index))
    }
}

/// First shard a run starting at `start_index` may write without touching
/// shards an earlier run with the same `max_rows` produced for `[0, start_index)`.
pub fn first_shard_for(start_index: usize, max_rows: usize) -> u32 {
    let earlier = start_index.div_ceil(max_rows.max(1));
    u32::try_from(earlier).unwrap_or(u32::MAX - 1) + 1
}

#[derive(Debug, Clone)]
pub struct ShardOptions {
    pub output_dir: PathBuf,
    pub base_name: String,
    pub max_rows: usize,
    pub first_shard: u32,
    /// Truncate existing shard files instead of refusing to open them, and
    /// delete higher-numbered shards left by an earlier run.
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSummary {
    pub shards_created: u32,
    pub rows_written: u64,
    pub last_shard: PathBuf,
}

pub struct ShardWriter {
    options: ShardOptions,
    header_delimiter: String,
    shard_index: u32,
    row_count: usize,
    shards_created: u32,
    rows_written: u64,
    current_path: PathBuf,
    writer: Writer<BufWriter<File>>,
}

impl ShardWriter {
    /// Opens the first shard and writes its header row.
    pub fn create(options: ShardOptions, header_delimiter: &str) -> Result<Self> {
        if options.max_rows == 0 {
            return Err(PipelineError::InvalidArgument(
                "shards must hold at least one row".to_string(),
            ));
        }
        fs::create_dir_all(&options.output_dir)
            .map_err(|e| PipelineError::io(&options.output_dir, e))?;

        let shard_index = options.first_shard.max(1);
        if options.overwrite {
            let removed = remove_shards_above(&options.output_dir, &options.base_name, shard_index)?;
            if removed > 0 {
                info!(removed, base = %options.base_name, "Removed shards from an earlier run");
            }
        }
        let current_path = shard_path(&options.output_dir, &options.base_name, shard_index);
        let writer = open_shard(&current_path, options.overwrite)?;
        info!(path = ?current_path, max_rows = options.max_rows, "Opened shard");

        Ok(Self {
            options,
            header_delimiter: header_delimiter.to_string(),
            shard_index,
            row_count: 0,
            shards_created: 1,
            rows_written: 0,
            current_path,
            writer,
        })
    }

    pub fn shard_index(&self) -> u32 {
        self.shard_index
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    /// Rolls over to the next shard once the current one is full.
    pub fn ensure_capacity(&mut self) -> Result<()> {
        if self.row_count < self.options.max_rows {
            return Ok(());
        }

        self.writer
            .flush()
            .map_err(|e| PipelineError::io(&self.current_path, e))?;
        debug!(path = ?self.current_path, rows = self.row_count, "Closed full shard");

        self.shard_index += 1;
        self.row_count = 0;
        self.current_path = shard_path(
            &self.options.output_dir,
            &self.options.base_name,
            self.shard_index,
        );
        // Replacing the writer drops and closes the previous file.
        self.writer = open_shard(&self.current_path, self.options.overwrite)?;
        self.shards_created += 1;
        info!(path = ?self.current_path, shard = self.shard_index, "Opened shard");
        Ok(())
    }

    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        self.ensure_capacity()?;
        self.writer
            .write_record(record.to_row(&self.header_delimiter))?;
        self.row_count += 1;
        self.rows_written += 1;
        Ok(())
    }

    /// Flushes the open shard and reports what was written.
    pub fn finish(mut self) -> Result<ShardSummary> {
        self.writer
            .flush()
            .map_err(|e| PipelineError::io(&self.current_path, e))?;
        debug!(path = ?self.current_path, rows = self.row_count, "Closed final shard");
        Ok(ShardSummary {
            shards_created: self.shards_created,
            rows_written: self.rows_written,
            last_shard: self.current_path,
        })
    }
}

/// Deletes `<base>_partN.csv` files with `N > index`. Returns how many were removed.
pub fn remove_shards_above(output_dir: &Path, base_name: &str, index: u32) -> Result<u32> {
    let pattern = format!(
        r"^{}{}(\d+)\.csv$",
        regex::escape(base_name),
        regex::escape(SHARD_SUFFIX)
    );
    let shard_name = Regex::new(&pattern)
        .map_err(|e| PipelineError::InvalidArgument(format!("bad shard base name: {e}")))?;

    let entries = fs::read_dir(output_dir).map_err(|e| PipelineError::io(output_dir, e))?;
    let mut removed = 0;
    for entry in entries {
        let path = entry.map_err(|e| PipelineError::io(output_dir, e))?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let number = shard_name
            .captures(name)
            .and_then(|c| c[1].parse::<u32>().ok());
        if number.is_some_and(|n| n > index) {
            fs::remove_file(&path).map_err(|e| PipelineError::io(&path, e))?;
            debug!(path = ?path, "Removed stale shard");
            removed += 1;
        }
    }
    Ok(removed)
}

fn open_shard(path: &Path, overwrite: bool) -> Result<Writer<BufWriter<File>>> {
    let opened = if overwrite {
        File::create(path)
    } else {
        OpenOptions::new().write(true).create_new(true).open(path)
    };
    let file = opened.map_err(|e| {
        if e.kind() == ErrorKind::AlreadyExists {
            PipelineError::ShardExists {
                path: path.to_path_buf(),
            }
        } else {
            PipelineError::io(path, e)
        }
    })?;

    let mut buf = BufWriter::with_capacity(CSV_BUFFER_SIZE, file);
    buf.write_all(UTF8_BOM)
        .map_err(|e| PipelineError::io(path, e))?;

    let mut writer = Writer::from_writer(buf);
    writer.write_record(FIELDNAMES)?;
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str, body: &str) -> Record {
        Record {
            file_name: name.to_string(),
            agency: "Daily Nation".to_string(),
            date: Some("March 3, 2020".to_string()),
            headers: vec!["A".to_string(), "B".to_string()],
            body: body.to_string(),
        }
    }

    fn options(dir: &Path, max_rows: usize, first_shard: u32, overwrite: bool) -> ShardOptions {
        ShardOptions {
            output_dir: dir.to_path_buf(),
            base_name: "nation".to_string(),
            max_rows,
            first_shard,
            overwrite,
        }
    }

    fn read_rows(path: &Path) -> Vec<csv::StringRecord> {
        let bytes = fs::read(path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let mut reader = csv::Reader::from_reader(&bytes[UTF8_BOM.len()..]);
        assert_eq!(reader.headers().unwrap().iter().collect::<Vec<_>>(), FIELDNAMES);
        reader.records().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn shard_path_suffixes_after_first() {
        let dir = Path::new("/out");
        assert_eq!(shard_path(dir, "nation", 1), PathBuf::from("/out/nation.csv"));
        assert_eq!(shard_path(dir, "nation", 2), PathBuf::from("/out/nation_part2.csv"));
        assert_eq!(shard_path(dir, "nation", 11), PathBuf::from("/out/nation_part11.csv"));
    }

    #[test]
    fn first_shard_skips_earlier_output() {
        assert_eq!(first_shard_for(0, 100), 1);
        assert_eq!(first_shard_for(1, 100), 2);
        assert_eq!(first_shard_for(100, 100), 2);
        assert_eq!(first_shard_for(150, 100), 3);
        assert_eq!(first_shard_for(200, 100), 3);
    }

    #[test]
    fn rolls_over_when_full() {
        let dir = TempDir::new().unwrap();
        let mut writer = ShardWriter::create(options(dir.path(), 2, 1, true), "|").unwrap();
        for i in 0..5 {
            writer.write_record(&record(&format!("doc{i}"), "text")).unwrap();
        }
        let summary = writer.finish().unwrap();

        assert_eq!(summary.shards_created, 3);
        assert_eq!(summary.rows_written, 5);
        assert_eq!(summary.last_shard, dir.path().join("nation_part3.csv"));
        assert_eq!(read_rows(&dir.path().join("nation.csv")).len(), 2);
        assert_eq!(read_rows(&dir.path().join("nation_part2.csv")).len(), 2);
        assert_eq!(read_rows(&dir.path().join("nation_part3.csv")).len(), 1);
    }

    #[test]
    fn exact_multiple_does_not_open_empty_shard() {
        let dir = TempDir::new().unwrap();
        let mut writer = ShardWriter::create(options(dir.path(), 2, 1, true), "|").unwrap();
        for i in 0..4 {
            writer.write_record(&record(&format!("doc{i}"), "text")).unwrap();
        }
        assert_eq!(writer.finish().unwrap().shards_created, 2);
        assert!(!dir.path().join("nation_part3.csv").exists());
    }

    #[test]
    fn empty_run_leaves_header_only_shard() {
        let dir = TempDir::new().unwrap();
        let writer = ShardWriter::create(options(dir.path(), 2, 1, true), "|").unwrap();
        assert_eq!(writer.finish().unwrap().rows_written, 0);
        assert!(read_rows(&dir.path().join("nation.csv")).is_empty());
    }

    #[test]
    fn fields_are_quoted_and_unicode_preserved() {
        let dir = TempDir::new().unwrap();
        let mut writer = ShardWriter::create(options(dir.path(), 10, 1, true), "〇〇〇").unwrap();
        let body = "Line one, with comma\n\"Quoted\" — Kiswahili: Habari za leo";
        writer.write_record(&record("doc", body)).unwrap();
        writer.finish().unwrap();

        let rows = read_rows(&dir.path().join("nation.csv"));
        assert_eq!(&rows[0][0], "doc");
        assert_eq!(&rows[0][2], "March 3, 2020");
        assert_eq!(&rows[0][3], "A〇〇〇B");
        assert_eq!(&rows[0][4], body);
    }

    #[test]
    fn resume_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("nation_part2.csv"), "earlier run").unwrap();

        let result = ShardWriter::create(options(dir.path(), 2, 2, false), "|");
        assert!(matches!(result, Err(PipelineError::ShardExists { .. })));
        assert_eq!(
            fs::read_to_string(dir.path().join("nation_part2.csv")).unwrap(),
            "earlier run"
        );
    }

    #[test]
    fn resume_refuses_to_roll_into_existing_shard() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("nation_part3.csv"), "earlier run").unwrap();

        let mut writer = ShardWriter::create(options(dir.path(), 1, 2, false), "|").unwrap();
        writer.write_record(&record("a", "x")).unwrap();
        let err = writer.write_record(&record("b", "x")).unwrap_err();
        assert!(matches!(err, PipelineError::ShardExists { .. }));
    }

    #[test]
    fn restart_truncates_existing_shard() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("nation.csv"), "stale").unwrap();

        let mut writer = ShardWriter::create(options(dir.path(), 5, 1, true), "|").unwrap();
        writer.write_record(&record("fresh", "x")).unwrap();
        writer.finish().unwrap();

        let rows = read_rows(&dir.path().join("nation.csv"));
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "fresh");
    }

    #[test]
    fn restart_removes_higher_shards_from_earlier_run() {
        let dir = TempDir::new().unwrap();
        for name in ["nation_part2.csv", "nation_part3.csv", "nation_partial.csv", "other_part2.csv"] {
            fs::write(dir.path().join(name), "earlier run").unwrap();
        }

        let mut writer = ShardWriter::create(options(dir.path(), 5, 1, true), "|").unwrap();
        writer.write_record(&record("fresh", "x")).unwrap();
        assert_eq!(writer.finish().unwrap().shards_created, 1);

        assert!(dir.path().join("nation.csv").exists());
        assert!(!dir.path().join("nation_part2.csv").exists());
        assert!(!dir.path().join("nation_part3.csv").exists());
        assert!(dir.path().join("nation_partial.csv").exists());
        assert!(dir.path().join("other_part2.csv").exists());
    }

    #[test]
    fn remove_shards_above_keeps_lower_numbers() {
        let dir = TempDir::new().unwrap();
        for i in 2..=4 {
            fs::write(shard_path(dir.path(), "nation", i), "").unwrap();
        }
        assert_eq!(remove_shards_above(dir.path(), "nation", 3).unwrap(), 1);
        assert!(shard_path(dir.path(), "nation", 3).exists());
        assert!(!shard_path(dir.path(), "nation", 4).exists());
    }

    #[test]
    fn zero_row_budget_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = ShardWriter::create(options(dir.path(), 0, 1, true), "|");
        assert!(matches!(result, Err(PipelineError::InvalidArgument(_))));
    }
}
