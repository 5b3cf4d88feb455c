//! Contract file segmentation CLI
//!
//! Runs one pipeline stage per invocation and writes a run log for it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use segment_core::{
    BatchSummary, EventSink, NullSink, Pipeline, PipelineConfig, Progress, RunLogger, Stage,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "legajo")]
#[command(
    version,
    about = "Split scanned employment contract files into their sections"
)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Process the documents of a batch in parallel
    #[arg(long, global = true)]
    parallel: bool,

    /// Do not write a run log file
    #[arg(long, global = true)]
    no_log: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rename the PDFs of a folder to the person's name
    Normalize {
        folder: PathBuf,

        /// Only count what would be renamed
        #[arg(long)]
        preview: bool,
    },

    /// Detect the sections of every PDF in a folder and write diagnostic artifacts
    Diagnose { folder: PathBuf },

    /// Cut the sections described by a diagnostic artifact or batch manifest into PDFs
    Extract {
        artifact: PathBuf,

        /// Folder holding the source PDFs
        source_folder: PathBuf,
    },
}

impl Command {
    fn stage(&self) -> Stage {
        match self {
            Command::Normalize { .. } => Stage::Normalize,
            Command::Diagnose { .. } => Stage::Diagnose,
            Command::Extract { .. } => Stage::Extract,
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if args.parallel {
        config.parallel = true;
    }
    if args.no_log {
        config.logging.enabled = false;
    }
    Ok(config)
}

fn print_progress(progress: &Progress) {
    eprintln!("[{}/{}] {}", progress.current, progress.total, progress.message);
}

fn print_summary(stage: Stage, summary: &BatchSummary, log: Option<&Path>) {
    println!("{}: {}", stage.title(), summary);
    if let Some(path) = log {
        println!("Run log: {}", path.display());
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = load_config(&args)?;
    let stage = args.command.stage();

    let dry_run = matches!(args.command, Command::Normalize { preview: true, .. });
    let logger = if config.logging.enabled && !dry_run {
        Some(
            RunLogger::create(&config.logging.log_root, &config.logging.workflow, stage)
                .context("creating run log")?,
        )
    } else {
        None
    };
    let sink: &dyn EventSink = match &logger {
        Some(logger) => logger as &dyn EventSink,
        None => &NullSink,
    };
    let log_path = logger.as_ref().map(RunLogger::path);

    let pipeline = Pipeline::new(config)?.with_sink(sink);
    tracing::debug!(stage = stage.log_prefix(), "starting");

    let summary = match &args.command {
        Command::Normalize {
            folder,
            preview: true,
        } => {
            let preview = pipeline.preview_normalization(folder)?;
            println!(
                "{} PDF(s): {} to rename, {} already normalized",
                preview.total, preview.to_rename, preview.already_normalized
            );
            return Ok(());
        }
        Command::Normalize { folder, .. } => {
            let report = pipeline.normalize(folder, &print_progress)?;
            println!(
                "Renamed {}, unchanged {}, conflicts {}",
                report.renamed(),
                report.unchanged(),
                report.conflicts()
            );
            report.summary
        }
        Command::Diagnose { folder } => {
            let report = pipeline.diagnose(folder, &print_progress)?;
            print!("{}", report.stats.render());
            if let Some(manifest) = &report.manifest {
                println!("Manifest: {}", manifest.display());
            }
            report.summary
        }
        Command::Extract {
            artifact,
            source_folder,
        } => {
            let report = pipeline.extract(artifact, source_folder, &print_progress)?;
            println!(
                "Written {}, collisions {}",
                report.written().count(),
                report.collisions()
            );
            report.summary
        }
    };

    print_summary(stage, &summary, log_path);
    if summary.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}
