use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_table_curator::app::{App, ProgressSink};
use kira_table_curator::config::ConfigLoader;
use kira_table_curator::error::CurateError;
use kira_table_curator::output::{JsonOutput, LogSink, OutputMode};
use kira_table_curator::source::{RecordSource, TsvRecordSource};

#[derive(Parser)]
#[command(name = "kira-tc")]
#[command(about = "Reconcile, merge and unify curated tab-separated biology tables")]
#[command(version, author)]
struct Cli {
    /// Path to the JSON config (defaults to ./kira-tc.json)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Forward progress events to the log
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Reshape one table to the configured schema")]
    Reconcile(ReconcileArgs),
    #[command(about = "Merge tables in priority order and deduplicate on the key")]
    Merge(MergeArgs),
    #[command(about = "Union candidate records from collaborator files into a table")]
    Enrich(EnrichArgs),
    #[command(about = "Fill blank provenance values in place")]
    Tag(TagArgs),
    #[command(about = "Unify the category files listed in the manifest")]
    Unify,
}

#[derive(Args)]
struct ReconcileArgs {
    input: Utf8PathBuf,

    #[arg(long, short)]
    output: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct MergeArgs {
    /// Input tables, highest priority first
    #[arg(required = true)]
    inputs: Vec<Utf8PathBuf>,

    #[arg(long, short)]
    output: Utf8PathBuf,

    #[arg(long)]
    label: Option<String>,
}

#[derive(Args)]
struct EnrichArgs {
    destination: Utf8PathBuf,

    /// Candidate record files, in priority order
    #[arg(long = "candidates", required = true)]
    candidates: Vec<Utf8PathBuf>,

    #[arg(long)]
    label: Option<String>,

    /// Log and skip candidate sources that fail instead of aborting
    #[arg(long)]
    skip_failed: bool,
}

#[derive(Args)]
struct TagArgs {
    path: Utf8PathBuf,

    #[arg(long)]
    label: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(curate) = report.downcast_ref::<CurateError>() {
            return ExitCode::from(map_exit_code(curate));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CurateError) -> u8 {
    match error {
        CurateError::MissingConfig
        | CurateError::ConfigRead(_)
        | CurateError::ConfigParse(_)
        | CurateError::InvalidConfig(_)
        | CurateError::AmbiguousMapping { .. }
        | CurateError::AmbiguousSource { .. }
        | CurateError::UnknownColumn { .. }
        | CurateError::EmptyManifest
        | CurateError::InvalidProvenanceLabel(_) => 2,
        CurateError::MissingInput(_) => 3,
        CurateError::Backup { .. }
        | CurateError::Filesystem(_)
        | CurateError::TsvRead { .. }
        | CurateError::TsvWrite(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.verbose {
        OutputMode::Verbose
    } else {
        OutputMode::Quiet
    };
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Verbose => &LogSink,
        OutputMode::Quiet => &JsonOutput,
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let app = App::new(config);

    match cli.command {
        Commands::Reconcile(args) => {
            let result = app.reconcile_file(&args.input, args.output.as_deref(), sink)?;
            JsonOutput::print_reconcile(&result).into_diagnostic()
        }
        Commands::Merge(args) => {
            let label = app.config().label(args.label.as_deref())?;
            let result = app.merge_files(&args.inputs, &args.output, &label, sink)?;
            JsonOutput::print_merge(&result).into_diagnostic()
        }
        Commands::Enrich(args) => {
            let label = app.config().label(args.label.as_deref())?;
            let sources = args
                .candidates
                .iter()
                .map(|path| TsvRecordSource::new(path))
                .collect::<Vec<_>>();
            let sources = sources
                .iter()
                .map(|source| source as &dyn RecordSource)
                .collect::<Vec<_>>();
            let result =
                app.enrich(&args.destination, &sources, &label, args.skip_failed, sink)?;
            JsonOutput::print_enrich(&result).into_diagnostic()
        }
        Commands::Tag(args) => {
            let label = app.config().label(args.label.as_deref())?;
            let result = app.tag_file(&args.path, &label, sink)?;
            JsonOutput::print_tag(&result).into_diagnostic()
        }
        Commands::Unify => {
            let result = app.unify(sink)?;
            JsonOutput::print_unify(&result).into_diagnostic()
        }
    }
}
