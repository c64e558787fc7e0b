use anyhow::{bail, Context, Result};
use broadsheet::config::{DEFAULT_DOCUMENT_EXTENSION, MARKDOWN_EXTENSION};
use broadsheet::content;
use broadsheet::pipeline::{self, ConversionPolicy, RunOptions};
use broadsheet::publication::{ExtractionConfig, Publications};
use broadsheet::source::{
    document_name, CommandConverter, DocumentConverter, DocumentSource, FolderSource,
    MarkdownFileConverter,
};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "broadsheet")]
#[command(about = "Extract dates, headers and body text from newspaper scans into CSV shards")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every document of a publication into CSV shards
    Run(RunArgs),
    /// Convert documents to markdown files and report the date found in each
    Convert(ConvertArgs),
    /// Report the date found in previously converted markdown files
    CheckDates(CheckDatesArgs),
    /// Show the fields extracted from one markdown file
    Inspect(InspectArgs),
    /// List the publications in a settings file
    List(SettingsArgs),
}

#[derive(Args)]
struct SettingsArgs {
    /// Publication settings file (JSON)
    #[arg(short, long, default_value = "publications.json")]
    config: PathBuf,
}

#[derive(Args)]
struct PublicationArgs {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Publication to process, as named in the settings file
    #[arg(short, long)]
    publication: String,
}

#[derive(Args)]
struct ConverterArgs {
    /// Command that prints a document's markdown to stdout; the document path is appended.
    /// Split on whitespace without quote handling
    #[arg(long)]
    converter_cmd: Option<String>,

    /// Extra converter argument passed as-is, after those of --converter-cmd (repeatable)
    #[arg(long, requires = "converter_cmd", allow_hyphen_values = true)]
    converter_arg: Vec<String>,

    /// Directory of markdown saved by `convert`, read instead of converting
    #[arg(long, conflicts_with = "converter_cmd")]
    markdown_dir: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    publication: PublicationArgs,

    #[command(flatten)]
    converter: ConverterArgs,

    /// Directory holding the publication's source folder
    #[arg(long, default_value = ".")]
    input_root: PathBuf,

    /// Extension of source documents
    #[arg(long, default_value = DEFAULT_DOCUMENT_EXTENSION)]
    extension: String,

    /// Output directory for CSV shards
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Shard file base name (defaults to the publication's folder name)
    #[arg(long)]
    base_name: Option<String>,

    /// Maximum records per CSV shard: at most the document count, and at least 100
    /// (or the document count when fewer than 100 documents are listed)
    #[arg(long)]
    max_rows: usize,

    /// Index of the first document to process; earlier documents are left alone
    #[arg(long, default_value_t = 0)]
    start_index: usize,

    /// What to do when a document cannot be converted
    #[arg(long, value_enum, default_value_t = ConversionPolicy::Skip)]
    on_conversion_error: ConversionPolicy,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args)]
struct ConvertArgs {
    #[command(flatten)]
    publication: PublicationArgs,

    /// Command that prints a document's markdown to stdout; the document path is appended.
    /// Split on whitespace without quote handling
    #[arg(long)]
    converter_cmd: String,

    /// Extra converter argument passed as-is, after those of --converter-cmd (repeatable)
    #[arg(long, allow_hyphen_values = true)]
    converter_arg: Vec<String>,

    /// Directory holding the publication's source folder
    #[arg(long, default_value = ".")]
    input_root: PathBuf,

    /// Extension of source documents
    #[arg(long, default_value = DEFAULT_DOCUMENT_EXTENSION)]
    extension: String,

    /// Where to save markdown (defaults to `<folder>_md`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only convert these documents (file names, with or without extension)
    #[arg(long)]
    only: Vec<String>,
}

#[derive(Args)]
struct CheckDatesArgs {
    #[command(flatten)]
    publication: PublicationArgs,

    /// Directory of saved markdown files
    #[arg(long)]
    markdown_dir: PathBuf,
}

#[derive(Args)]
struct InspectArgs {
    #[command(flatten)]
    publication: PublicationArgs,

    /// Markdown file to extract
    file: PathBuf,
}

fn load_publication(args: &PublicationArgs) -> Result<ExtractionConfig> {
    let publications = Publications::load(&args.settings.config)?;
    Ok(publications.select(&args.publication)?)
}

fn build_converter(args: &ConverterArgs, extension: &str) -> Result<Box<dyn DocumentConverter>> {
    if let Some(cmd) = &args.converter_cmd {
        let converter =
            CommandConverter::from_command_line(cmd)?.args(args.converter_arg.iter().cloned());
        return Ok(Box::new(converter));
    }
    if let Some(dir) = &args.markdown_dir {
        if !dir.is_dir() {
            bail!("markdown directory not found: {}", dir.display());
        }
        return Ok(Box::new(MarkdownFileConverter::from_dir(dir)));
    }
    if extension.eq_ignore_ascii_case(MARKDOWN_EXTENSION) {
        return Ok(Box::new(MarkdownFileConverter::new()));
    }
    bail!("no converter configured for .{extension} documents; pass --converter-cmd or --markdown-dir")
}

fn run_extract(args: RunArgs) -> Result<()> {
    let config = load_publication(&args.publication)?;
    let mut converter = build_converter(&args.converter, &args.extension)?;
    let source = FolderSource::new(args.input_root.join(config.folder_name()), &args.extension);

    let options = RunOptions {
        output_dir: args.output,
        base_name: args.base_name,
        start_index: args.start_index,
        max_rows_per_shard: args.max_rows,
        on_conversion_error: args.on_conversion_error,
        show_progress: !args.no_progress,
    };

    let start = Instant::now();
    let stats = pipeline::run_pipeline(&config, &source, converter.as_mut(), &options)?;
    let duration = start.elapsed();

    println!();
    println!("=== Summary ===");
    println!("Publication:         {}", config.agency_name());
    println!("Total time:          {:.2}s", duration.as_secs_f64());
    println!("Documents listed:    {}", stats.documents_total);
    println!("Started at index:    {}", stats.start_index);
    println!("Documents processed: {}", stats.documents_processed);
    println!("Missing data:        {}", stats.missing_data);
    println!("Skipped:             {}", stats.documents_skipped);
    println!("Shards created:      {}", stats.shards_created);
    println!("Next start index:    {}", stats.resume_index());

    Ok(())
}

fn matches_only(path: &Path, only: &[String]) -> bool {
    if only.is_empty() {
        return true;
    }
    let name = document_name(path);
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    only.iter().any(|o| *o == name || *o == file_name)
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    let config = load_publication(&args.publication)?;
    let mut converter = CommandConverter::from_command_line(&args.converter_cmd)?
        .args(args.converter_arg.iter().cloned());
    let source = FolderSource::new(args.input_root.join(config.folder_name()), &args.extension);
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{}_md", config.folder_name())));

    fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;

    let mut converted = 0u64;
    let mut failed = 0u64;
    for path in source.documents()? {
        if !matches_only(&path, &args.only) {
            continue;
        }
        let name = document_name(&path);
        let markdown = match converter.to_markdown(&path) {
            Ok(md) => md,
            Err(e) => {
                warn!(document = %name, error = %e, "Conversion failed");
                failed += 1;
                continue;
            }
        };

        let out_path = output.join(format!("{name}.{MARKDOWN_EXTENSION}"));
        fs::write(&out_path, markdown.as_bytes())
            .with_context(|| format!("Failed to write {}", out_path.display()))?;
        converted += 1;

        let date = content::extract_date(&markdown, &config);
        println!("{name}\t{}", date.as_deref().unwrap_or("-"));
    }

    info!(converted, failed, output = ?output, "Conversion complete");
    if converted == 0 && !args.only.is_empty() {
        bail!("none of the requested documents were found or converted");
    }
    Ok(())
}

fn run_check_dates(args: CheckDatesArgs) -> Result<()> {
    let config = load_publication(&args.publication)?;
    let source = FolderSource::new(&args.markdown_dir, MARKDOWN_EXTENSION);
    let mut reader = MarkdownFileConverter::new();

    let mut without_date = 0u64;
    let documents = source.documents()?;
    for path in &documents {
        let markdown = reader.to_markdown(path)?;
        let date = content::extract_date(&markdown, &config);
        if date.is_none() {
            without_date += 1;
        }
        println!("{}\t{}", document_name(path), date.as_deref().unwrap_or("-"));
    }

    println!();
    println!("Files checked:  {}", documents.len());
    println!("Without a date: {}", without_date);
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let config = load_publication(&args.publication)?;
    let markdown = MarkdownFileConverter::new().to_markdown(&args.file)?;
    let extraction = content::extract(&markdown, &config);

    println!("File:    {}", document_name(&args.file));
    println!("Date:    {}", extraction.date.as_deref().unwrap_or("-"));
    println!("Headers: {}", extraction.headers.len());
    for header in &extraction.headers {
        println!("  - {header}");
    }
    if extraction.is_incomplete() {
        println!("Missing: {}", extraction.missing_fields().join(", "));
    }
    println!();
    println!("{}", extraction.body);
    Ok(())
}

fn run_list(args: SettingsArgs) -> Result<()> {
    let publications = Publications::load(&args.config)?;
    for name in publications.names() {
        println!("{name}");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }

    let result = match cli.command {
        Commands::Run(args) => run_extract(args),
        Commands::Convert(args) => run_convert(args),
        Commands::CheckDates(args) => run_check_dates(args),
        Commands::Inspect(args) => run_inspect(args),
        Commands::List(args) => run_list(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
