//! Document enumeration and document-to-markdown conversion.
//!
//! Both collaborators sit behind traits so the pipeline can run against a
//! folder of scans, a folder of saved markdown, or an in-memory fixture.

use crate::config::MARKDOWN_EXTENSION;
use crate::error::{PipelineError, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Supplies the ordered list of documents for one run.
pub trait DocumentSource {
    /// Document paths sorted by file name.
    fn documents(&self) -> Result<Vec<PathBuf>>;
}

/// Turns one document into markdown text.
pub trait DocumentConverter {
    fn to_markdown(&mut self, path: &Path) -> Result<String>;
}

/// Document identifier written to the `file_name` column: the file name
/// without its final extension.
pub fn document_name(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Files with one extension directly inside a folder.
#[derive(Debug, Clone)]
pub struct FolderSource {
    folder: PathBuf,
    extension: String,
}

impl FolderSource {
    pub fn new(folder: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            folder: folder.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn not_found(&self, hint: String) -> PipelineError {
        PipelineError::SourceNotFound {
            path: self.folder.clone(),
            hint,
        }
    }
}

impl DocumentSource for FolderSource {
    fn documents(&self) -> Result<Vec<PathBuf>> {
        if !self.folder.is_dir() {
            return Err(self.not_found(format!(
                "Create the folder and copy the .{} files into it, or pass --input-root.",
                self.extension
            )));
        }

        let entries = fs::read_dir(&self.folder).map_err(|e| PipelineError::io(&self.folder, e))?;
        let mut documents = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| PipelineError::io(&self.folder, e))?.path();
            let matches = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension.as_str()));
            if matches && path.is_file() {
                documents.push(path);
            }
        }

        if documents.is_empty() {
            return Err(self.not_found(format!(
                "The folder exists but holds no .{} files.",
                self.extension
            )));
        }

        documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        info!(folder = ?self.folder, documents = documents.len(), "Listed documents");
        Ok(documents)
    }
}

/// Runs an external program with the document path as its last argument and
/// reads markdown from its stdout.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandConverter {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Splits a command line on whitespace: the first word is the program.
    /// Quotes and escapes are not interpreted, so an argument containing a
    /// space has to be added with [`CommandConverter::args`].
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut words = command.split_whitespace();
        let program = words.next().ok_or_else(|| {
            PipelineError::Configuration("converter command is empty".to_string())
        })?;
        Ok(Self::new(program).args(words))
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl DocumentConverter for CommandConverter {
    fn to_markdown(&mut self, path: &Path) -> Result<String> {
        let conversion_error = |reason: String| PipelineError::Conversion {
            path: path.to_path_buf(),
            reason,
        };

        debug!(program = ?self.program, document = ?path, "Running converter");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| conversion_error(format!("failed to start {:?}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(conversion_error(format!(
                "{:?} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Reads markdown saved by an earlier conversion: `<dir>/<name>.md`, or the
/// document itself when it already is markdown.
#[derive(Debug, Clone)]
pub struct MarkdownFileConverter {
    markdown_dir: Option<PathBuf>,
}

impl MarkdownFileConverter {
    /// Reads each document directly.
    pub fn new() -> Self {
        Self { markdown_dir: None }
    }

    /// Reads `<dir>/<document name>.md` for each document.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            markdown_dir: Some(dir.into()),
        }
    }

    pub fn markdown_path(&self, document: &Path) -> PathBuf {
        match &self.markdown_dir {
            Some(dir) => dir.join(format!("{}.{}", document_name(document), MARKDOWN_EXTENSION)),
            None => document.to_path_buf(),
        }
    }
}

impl Default for MarkdownFileConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentConverter for MarkdownFileConverter {
    fn to_markdown(&mut self, path: &Path) -> Result<String> {
        let md_path = self.markdown_path(path);
        let bytes = fs::read(&md_path).map_err(|e| PipelineError::Conversion {
            path: path.to_path_buf(),
            reason: format!("cannot read {}: {e}", md_path.display()),
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
