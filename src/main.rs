use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

mod aggregate;
mod chart;
mod config;
mod ingest;
mod models;
mod normalize;
mod pdf;
mod report;
mod summarizer;

use chart::FigureRenderer;
use config::{CommentMode, ReportConfig, ReportProfile, SummarizerConfig};
use models::Criterion;
use report::{ReportComposer, ReportDocument};
use summarizer::{OllamaSummarizer, Summarizer};

const COMBINED_FILE: &str = "reporte_completo.pdf";

#[derive(Parser)]
#[command(name = "evaluation-reports")]
#[command(about = "Teacher evaluation survey reports as PDF", long_about = None)]
struct Cli {
    /// Minimum level written to the terminal and the log file
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,
    /// Also append log records to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate PDF reports, one per teacher or one combined file
    Report(ReportArgs),
    /// Export the aggregated rating counts as CSV
    Summary {
        #[arg(long)]
        input: PathBuf,
        /// Defaults to stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List teachers with their subjects and response counts
    Teachers {
        #[arg(long)]
        input: PathBuf,
    },
}

#[derive(Args)]
struct ReportArgs {
    /// Survey export (.xlsx, .xls, .ods or .csv)
    #[arg(long)]
    input: PathBuf,
    /// Only report on this teacher
    #[arg(long)]
    teacher: Option<String>,
    #[arg(long, default_value = "reports")]
    out_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = ReportProfile::Full)]
    profile: ReportProfile,
    /// Overrides the profile's comment handling
    #[arg(long, value_enum)]
    comments: Option<CommentMode>,
    /// Write every teacher into a single PDF
    #[arg(long)]
    combined: bool,
    /// Generation endpoint, falls back to SUMMARY_ENDPOINT
    #[arg(long)]
    endpoint: Option<String>,
    /// Generation model, falls back to SUMMARY_MODEL
    #[arg(long)]
    model: Option<String>,
    /// HTTP timeout for the generation endpoint, 0 disables it
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
    /// Root for temporary chart images, defaults to the system temp dir
    #[arg(long)]
    chart_dir: Option<PathBuf>,
    /// Directory holding images/ and signature/
    #[arg(long, default_value = ".")]
    assets_dir: PathBuf,
}

fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> anyhow::Result<()> {
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        let file = File::options()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        loggers.push(WriteLogger::new(level, config, file));
    }

    CombinedLogger::init(loggers).context("failed to initialise logging")
}

fn report_path(out_dir: &Path, docente: &str) -> PathBuf {
    let name: String = docente
        .chars()
        .map(|ch| if matches!(ch, '/' | '\\') { '_' } else { ch })
        .collect();
    out_dir.join(format!("{name}_report.pdf"))
}

fn write_pdf(path: &Path, documents: &[ReportDocument]) -> anyhow::Result<()> {
    let bytes = pdf::render_pdf(documents)?;
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

async fn write_each<S: Summarizer>(
    composer: &ReportComposer<'_, S>,
    teachers: &[String],
    out_dir: &Path,
) -> usize {
    let mut failed = 0;
    for docente in teachers {
        let path = report_path(out_dir, docente);
        let outcome = composer
            .compose(docente)
            .await
            .and_then(|document| write_pdf(&path, std::slice::from_ref(&document)));
        match outcome {
            Ok(()) => {
                log::info!("report for {docente} written");
                println!("Report written to {}.", path.display());
            }
            Err(err) => {
                failed += 1;
                log::error!("report for {docente} abandoned: {err:#}");
            }
        }
    }
    failed
}

async fn write_combined<S: Summarizer>(
    composer: &ReportComposer<'_, S>,
    teachers: &[String],
    out_dir: &Path,
) -> anyhow::Result<usize> {
    let mut failed = 0;
    let mut documents = Vec::with_capacity(teachers.len());
    for docente in teachers {
        match composer.compose(docente).await {
            Ok(document) => documents.push(document),
            Err(err) => {
                failed += 1;
                log::error!("report for {docente} abandoned: {err:#}");
            }
        }
    }
    if documents.is_empty() {
        bail!("no teacher report could be composed");
    }

    let path = out_dir.join(COMBINED_FILE);
    write_pdf(&path, &documents)?;
    log::info!("combined report with {} teacher(s) written", documents.len());
    println!("Report written to {}.", path.display());
    Ok(failed)
}

async fn run_report(args: ReportArgs) -> anyhow::Result<()> {
    let data = ingest::load_survey(&args.input)?;
    let summary = aggregate::summarize(&data, &Criterion::ALL);

    let teachers = match args.teacher {
        Some(docente) => {
            if summary.subjects_for(&docente).next().is_none() {
                bail!("teacher {docente} does not appear in {}", args.input.display());
            }
            vec![docente]
        }
        None => summary.teachers(),
    };
    if teachers.is_empty() {
        bail!("{} contains no survey responses", args.input.display());
    }

    let config = ReportConfig::new(args.profile, args.comments, &args.assets_dir);
    let summarizer = OllamaSummarizer::new(SummarizerConfig::resolve(
        args.endpoint,
        args.model,
        Some(args.timeout_secs),
    ))?;
    let chart_root = args
        .chart_dir
        .unwrap_or_else(|| std::env::temp_dir().join("evaluation-charts"));
    let figures = FigureRenderer::for_run(&chart_root);
    log::debug!("charts for this run go to {}", figures.dir().display());

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let composer = ReportComposer::new(&data, &summary, &config, &figures, &summarizer);
    let outcome = if args.combined {
        write_combined(&composer, &teachers, &args.out_dir).await
    } else {
        Ok(write_each(&composer, &teachers, &args.out_dir).await)
    };

    if let Err(err) = figures.cleanup() {
        log::warn!("{err:#}");
    }

    let failed = outcome?;
    if failed > 0 {
        bail!("{failed} of {} teacher report(s) failed", teachers.len());
    }
    Ok(())
}

fn run_summary(input: &Path, out: Option<&Path>) -> anyhow::Result<()> {
    let data = ingest::load_survey(input)?;
    let summary = aggregate::summarize(&data, &Criterion::ALL);

    match out {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
            aggregate::write_summary_csv(&summary, file)?;
            println!("Summary written to {}.", path.display());
        }
        None => aggregate::write_summary_csv(&summary, std::io::stdout().lock())?,
    }
    Ok(())
}

fn run_teachers(input: &Path) -> anyhow::Result<()> {
    let data = ingest::load_survey(input)?;
    let summary = aggregate::summarize(&data, &[]);

    let teachers = summary.teachers();
    if teachers.is_empty() {
        println!("No survey responses found.");
        return Ok(());
    }

    for docente in &teachers {
        println!("{docente}");
        for subject in summary.subjects_for(docente) {
            println!("- {} ({} responses)", subject.asignatura, subject.respondents);
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Report(args) => run_report(args).await?,
        Commands::Summary { input, out } => run_summary(&input, out.as_deref())?,
        Commands::Teachers { input } => run_teachers(&input)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn report_flags_parse_with_defaults() {
        let cli = Cli::parse_from(["evaluation-reports", "report", "--input", "encuesta.xlsx"]);
        let Commands::Report(args) = cli.command else {
            panic!("expected the report subcommand");
        };
        assert_eq!(args.out_dir, PathBuf::from("reports"));
        assert_eq!(args.profile, ReportProfile::Full);
        assert_eq!(args.comments, None);
        assert_eq!(args.timeout_secs, 120);
        assert!(!args.combined);
        assert_eq!(cli.log_level, LevelFilter::Info);
    }

    #[test]
    fn report_files_are_named_after_the_teacher() {
        let path = report_path(Path::new("reports"), "Arce Lopez");
        assert_eq!(path, PathBuf::from("reports/Arce Lopez_report.pdf"));
        let path = report_path(Path::new("reports"), "A/B");
        assert_eq!(path, PathBuf::from("reports/A_B_report.pdf"));
    }
}
