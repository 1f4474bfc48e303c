use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use grant_flag_core::{
    export::write_pdf, load_or_builtin, render_report, AnalysisContext, AnalysisError,
    AppSettings, AwardSource, CachedSource, ExportError, FileAwardSource, FundingField, MatchMode,
    NsfApiSource, OutputFormat, Report, Selection, SelectionError, Vocabulary,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "grant-flag",
    author,
    version,
    about = "Red-flag keyword analysis of NSF award abstracts"
)]
struct Cli {
    /// Settings file (TOML, YAML or JSON)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Tier table to use instead of the built-in one (YAML or JSON5)
    #[arg(long, value_name = "FILE", global = true)]
    vocabulary: Option<PathBuf>,

    /// Directory holding the per-year award cache
    #[arg(long = "cache-dir", value_name = "DIR", global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the keyword tiers and their phrases
    Tiers {
        /// Emit the vocabulary as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
    /// Download award years into the cache
    Fetch {
        /// Award year to download (repeatable)
        #[arg(long = "year", value_name = "YEAR", required = true)]
        years: Vec<u16>,
        /// Ignore cached data and download again
        #[arg(long)]
        refresh: bool,
    },
    /// Scan award abstracts for the selected tiers and report funding totals
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Award year, loaded through the cache
    #[arg(long, value_name = "YEAR", required_unless_present = "input", conflicts_with = "input")]
    year: Option<u16>,

    /// CSV or JSON file of awards
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Tier to scan for (repeatable)
    #[arg(long = "tier", value_name = "NAME")]
    tiers: Vec<String>,

    /// Single vocabulary phrase to scan for (repeatable)
    #[arg(long = "phrase", value_name = "PHRASE")]
    phrases: Vec<String>,

    /// Comma-separated ad hoc keywords
    #[arg(long, value_name = "LIST")]
    keywords: Option<String>,

    /// Scan for every tier of the vocabulary
    #[arg(long)]
    all_tiers: bool,

    /// Only count phrases that stand as whole words
    #[arg(long)]
    whole_word: bool,

    /// Amount column used as the award's funding
    #[arg(long, value_name = "FIELD")]
    funding: Option<FundingField>,

    #[arg(long, value_enum, default_value_t = FormatArg::Human)]
    format: FormatArg,

    /// Append the N most-funded matches
    #[arg(long, value_name = "N")]
    top: Option<usize>,

    /// Ignore cached data for --year and download again
    #[arg(long)]
    refresh: bool,

    /// Also write the report as a PDF
    #[arg(long, value_name = "PATH")]
    pdf: Option<PathBuf>,

    /// Report title
    #[arg(long)]
    title: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Human,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Human => OutputFormat::Human,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    match cli.command {
        Commands::Tiers { json } => {
            list_tiers(&settings, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Fetch { years, refresh } => {
            fetch_years(&settings, &years, refresh).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Analyze(args) => analyze(&settings, args).await,
    }
}

fn load_settings(cli: &Cli) -> Result<AppSettings> {
    let mut builder = config::Config::builder();
    if let Some(path) = &cli.config {
        builder = builder.add_source(config::File::from(path.as_path()).required(true));
    }
    builder = builder.add_source(config::Environment::with_prefix("GRANT_FLAG").try_parsing(true));
    let mut settings: AppSettings = builder
        .build()
        .and_then(|cfg| cfg.try_deserialize())
        .with_context(|| match &cli.config {
            Some(path) => format!("failed to load settings from {}", path.display()),
            None => "failed to load settings from environment".to_string(),
        })?;

    if let Some(path) = &cli.vocabulary {
        settings.vocabulary = Some(path.clone());
    }
    if let Some(dir) = &cli.cache_dir {
        settings.cache_dir = dir.clone();
    }
    settings.validate()?;
    Ok(settings)
}

fn load_vocabulary(settings: &AppSettings) -> Result<Vocabulary> {
    load_or_builtin(settings.vocabulary.as_deref())
}

fn list_tiers(settings: &AppSettings, json: bool) -> Result<()> {
    let vocabulary = load_vocabulary(settings)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&vocabulary)?);
        return Ok(());
    }

    println!("{} tier(s) loaded", vocabulary.len());
    for tier in vocabulary.all() {
        println!("- {} ({} phrase(s))", tier.name, tier.phrases.len());
        for phrase in &tier.phrases {
            println!("    {phrase}");
        }
    }
    Ok(())
}

fn api_source(settings: &AppSettings, refresh: bool) -> Result<CachedSource<NsfApiSource>> {
    let api = NsfApiSource::from_settings(settings)?;
    Ok(CachedSource::new(api, &settings.cache_dir).refreshing(refresh))
}

async fn fetch_years(settings: &AppSettings, years: &[u16], refresh: bool) -> Result<()> {
    let source = api_source(settings, refresh)?;
    for &year in years {
        let awards = source
            .load(year)
            .await
            .with_context(|| format!("failed to fetch awards for {year}"))?;
        if awards.is_empty() {
            println!("{year}: no awards found");
        } else {
            println!(
                "{year}: {} award(s) in {}",
                awards.len(),
                source.folder(year).display()
            );
        }
    }
    Ok(())
}

async fn analyze(settings: &AppSettings, args: AnalyzeArgs) -> Result<ExitCode> {
    let selection = selection_from(&args);
    if selection.is_empty() {
        notice(&AnalysisError::from(SelectionError::NothingSelected));
        return Ok(ExitCode::from(2));
    }

    let vocabulary = load_vocabulary(settings)?;
    let raws = match (&args.input, args.year) {
        (Some(path), _) => FileAwardSource::new(path).load(0).await?,
        (None, Some(year)) => api_source(settings, args.refresh)?
            .load(year)
            .await
            .with_context(|| format!("failed to load awards for {year}"))?,
        (None, None) => bail!("pass --year or --input to choose the awards to analyze"),
    };

    let mode = if args.whole_word {
        MatchMode::WholeWord
    } else {
        settings.match_mode
    };
    let funding = args.funding.unwrap_or(settings.funding_field);
    let context = AnalysisContext::from_raw(raws, funding, vocabulary, mode);
    let analysis = match context.run(&selection) {
        Ok(analysis) => analysis,
        Err(err) => {
            notice(&err);
            return Ok(ExitCode::from(2));
        }
    };

    let mut report = Report::assemble(&analysis);
    if let Some(title) = args.title {
        report = report.with_title(title);
    }
    let widths = settings.table_widths();
    let shown = match args.top {
        Some(n) => report.clone().with_top(&analysis, n),
        None => report.clone(),
    };
    print!("{}", render_report(&shown, args.format.into(), widths)?);

    if let Some(path) = args.pdf {
        let exported = if shown.top.is_empty() {
            report.with_top(&analysis, settings.top_n)
        } else {
            shown
        };
        export(&exported, &path, settings)?;
    }
    Ok(ExitCode::SUCCESS)
}

fn selection_from(args: &AnalyzeArgs) -> Selection {
    let mut selection = if args.all_tiers {
        Selection::all()
    } else {
        Selection::default()
    };
    for tier in &args.tiers {
        selection = selection.with_tier(tier.as_str());
    }
    for phrase in &args.phrases {
        selection = selection.with_phrase(phrase.as_str());
    }
    if let Some(list) = &args.keywords {
        selection = selection.with_keywords(list);
    }
    selection
}

fn export(report: &Report, path: &Path, settings: &AppSettings) -> Result<()> {
    match write_pdf(report, path, settings.table_widths()) {
        Ok(()) => {
            info!(path = %path.display(), "PDF written");
            eprintln!("PDF report written to {}", path.display());
            Ok(())
        }
        Err(ExportError::Empty) => {
            warn!("no results to export");
            eprintln!("notice: {}", ExportError::Empty);
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("failed to export {}", path.display())),
    }
}

fn notice(err: &AnalysisError) {
    eprintln!("notice: {err}");
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
