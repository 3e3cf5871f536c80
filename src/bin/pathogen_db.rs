use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use pathogen_db::app::{App, SelectInputs, SelectOptions};
use pathogen_db::config::{ConfigLoader, ResolvedConfig};
use pathogen_db::domain::TaxId;
use pathogen_db::error::PathogenError;
use pathogen_db::manifest;
use pathogen_db::ncbi::NcbiHttpClient;
use pathogen_db::output::{JsonOutput, OutputMode, TextOutput};
use pathogen_db::store::Store;
use pathogen_db::taxonomy::{TaxdumpTaxonomy, Taxonomy};

#[derive(Parser)]
#[command(name = "pathogen-db")]
#[command(about = "Builds a one-genome-per-species pathogen reference database from NCBI assemblies")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true, help = "Print results as JSON instead of a text summary")]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download the RefSeq and GenBank assembly summaries into the cache")]
    Catalogs(CatalogArgs),
    #[command(about = "Select one assembly per species and write the download manifest")]
    Select(SelectArgs),
    #[command(about = "Download, verify and tag manifest assets, then build the database")]
    Download(DownloadArgs),
    #[command(about = "Run select and download back to back")]
    Run(SelectArgs),
    #[command(about = "Compare the organisms of two manifests")]
    Diff(DiffArgs),
}

#[derive(Args, Clone, Default)]
struct LayoutArgs {
    #[arg(short, long, help = "Prefix for the manifest and report files")]
    output: Option<String>,

    #[arg(short, long, help = "Tag for the error log and database file names (default: MMYYYY)")]
    date: Option<String>,

    #[arg(long)]
    work_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    catalog_dir: Option<Utf8PathBuf>,
}

#[derive(Args, Clone)]
struct CatalogArgs {
    #[command(flatten)]
    layout: LayoutArgs,

    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Args, Clone)]
struct SelectArgs {
    #[arg(short, long, help = "PHI-base export with a Pathogen_species column")]
    phibase: Utf8PathBuf,

    #[arg(short, long, help = "Risk register export with Pest Name and Type of pest columns")]
    risk_register: Utf8PathBuf,

    #[arg(long)]
    taxdump_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    refresh_catalogs: bool,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args, Clone)]
struct DownloadArgs {
    #[arg(short, long, help = "Manifest to download (default: <output>download_input.json)")]
    manifest: Option<Utf8PathBuf>,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args, Clone)]
struct DiffArgs {
    old: Utf8PathBuf,
    new: Utf8PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<PathogenError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PathogenError) -> u8 {
    match error {
        PathogenError::MissingInput(_)
        | PathogenError::ConfigRead(_)
        | PathogenError::ConfigParse(_)
        | PathogenError::MissingTaxonomy
        | PathogenError::Registry { .. }
        | PathogenError::ManifestParse { .. }
        | PathogenError::TaxonomyLoad(_) => 2,
        PathogenError::NcbiHttp(_) | PathogenError::NcbiStatus { .. } => 3,
        PathogenError::CatalogIntegrity { .. } => 4,
        PathogenError::MissingColumn { table, .. } if table.contains("assembly_summary") => 4,
        PathogenError::MissingColumn { .. } => 2,
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
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Catalogs(args) => run_catalogs(args, config, output_mode),
        Commands::Select(args) => run_select(args, config, output_mode, false),
        Commands::Run(args) => run_select(args, config, output_mode, true),
        Commands::Download(args) => run_download(args, config, output_mode),
        Commands::Diff(args) => run_diff(args, output_mode),
    }
}

fn apply_layout(config: &mut ResolvedConfig, layout: LayoutArgs) {
    if let Some(output) = layout.output {
        config.output_prefix = output;
    }
    if let Some(date) = layout.date {
        config.date_tag = Some(date);
    }
    if layout.work_dir.is_some() {
        config.work_dir = layout.work_dir;
    }
    if layout.catalog_dir.is_some() {
        config.catalog_dir = layout.catalog_dir;
    }
}

fn build_store(config: &ResolvedConfig) -> Result<Store, PathogenError> {
    let tag = config
        .date_tag
        .clone()
        .unwrap_or_else(|| chrono::Local::now().format("%m%Y").to_string());
    Store::from_config(config, tag)
}

fn http_client(config: &ResolvedConfig) -> Result<NcbiHttpClient, PathogenError> {
    NcbiHttpClient::new(Duration::from_secs(config.request_timeout_secs))
}

fn run_catalogs(
    args: CatalogArgs,
    mut config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    apply_layout(&mut config, args.layout);
    if let Some(base_url) = args.base_url {
        config.catalog_base_url = base_url;
    }
    let store = build_store(&config)?;
    let app = App::new(store, http_client(&config)?, NopTaxonomy);
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.refresh_catalogs(&config.catalog_base_url, &JsonOutput)?;
            JsonOutput::print_catalogs(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.refresh_catalogs(&config.catalog_base_url, &TextOutput)?;
            TextOutput::print_catalogs(&result);
        }
    }
    Ok(())
}

fn run_select(
    args: SelectArgs,
    mut config: ResolvedConfig,
    output_mode: OutputMode,
    with_download: bool,
) -> miette::Result<()> {
    apply_layout(&mut config, args.layout);
    if args.taxdump_dir.is_some() {
        config.taxdump_dir = args.taxdump_dir;
    }
    let taxdump_dir = config
        .taxdump_dir
        .clone()
        .ok_or(PathogenError::MissingTaxonomy)?;
    for input in [&args.phibase, &args.risk_register] {
        if !input.as_std_path().exists() {
            return Err(PathogenError::MissingInput(input.as_std_path().to_path_buf()).into());
        }
    }

    let taxonomy = TaxdumpTaxonomy::load(&taxdump_dir)?;
    let store = build_store(&config)?;
    let app = App::new(store, http_client(&config)?, taxonomy);
    let inputs = SelectInputs {
        phibase: args.phibase,
        risk_register: args.risk_register,
    };
    let options = SelectOptions {
        refresh_catalogs: args.refresh_catalogs,
    };

    match (output_mode, with_download) {
        (OutputMode::NonInteractive, false) => {
            let result = app.select(&inputs, &config, options, &JsonOutput)?;
            JsonOutput::print_select(&result).into_diagnostic()?;
        }
        (OutputMode::NonInteractive, true) => {
            let result = app.run(&inputs, &config, options, &JsonOutput)?;
            JsonOutput::print_run(&result).into_diagnostic()?;
        }
        (OutputMode::Interactive, false) => {
            let result = app.select(&inputs, &config, options, &TextOutput)?;
            TextOutput::print_select(&result);
        }
        (OutputMode::Interactive, true) => {
            let result = app.run(&inputs, &config, options, &TextOutput)?;
            TextOutput::print_run(&result);
        }
    }
    Ok(())
}

fn run_download(
    args: DownloadArgs,
    mut config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    apply_layout(&mut config, args.layout);
    let store = build_store(&config)?;
    let manifest_path = args.manifest.unwrap_or_else(|| store.manifest_path());
    let app = App::new(store, http_client(&config)?, NopTaxonomy);
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.download(&manifest_path, &JsonOutput)?;
            JsonOutput::print_download(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.download(&manifest_path, &TextOutput)?;
            TextOutput::print_download(&result);
        }
    }
    Ok(())
}

fn run_diff(args: DiffArgs, output_mode: OutputMode) -> miette::Result<()> {
    let old = manifest::read_manifest(&args.old)?;
    let new = manifest::read_manifest(&args.new)?;
    let diff = manifest::diff_manifests(&old, &new);
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_diff(&diff).into_diagnostic()?,
        OutputMode::Interactive => TextOutput::print_diff(&diff),
    }
    Ok(())
}

struct NopTaxonomy;

impl Taxonomy for NopTaxonomy {
    fn lookup_name(&self, _name: &str) -> Result<Option<TaxId>, PathogenError> {
        Ok(None)
    }

    fn descendants(&self, _taxid: TaxId) -> Result<Vec<TaxId>, PathogenError> {
        Ok(Vec::new())
    }
}
