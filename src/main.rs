use crate::options::{Args, Subcommands};
use anyhow::Context;
use clap::Parser;
use stayrecon::Side;
use std::path::{Path, PathBuf};

mod options {
    use std::path::PathBuf;

    #[derive(Debug, clap::Parser)]
    #[clap(name = "stayrecon", about = "Reconcile the hotel stays of a loyalty program export with an operations export")]
    pub struct Args {
        #[clap(flatten)]
        pub verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,
        #[clap(subcommand)]
        pub cmd: Subcommands,
    }

    #[derive(Debug, clap::Subcommand)]
    pub enum Subcommands {
        /// Match both exports by join key and write a report with one CSV file per section.
        ///
        /// Exports that aren't given are looked up in the input directory, picking the most recent CSV file
        /// with 'loyalty' or 'operation' in its name.
        Reconcile {
            /// The loyalty program CSV exports.
            #[clap(long, short = 'l')]
            loyalty: Vec<PathBuf>,
            /// The operations CSV exports.
            #[clap(long, short = 'o')]
            operations: Vec<PathBuf>,
            /// The directory to look for exports that weren't given explicitly.
            #[clap(long, short = 'i', default_value = ".")]
            input_dir: PathBuf,
            /// Amounts that differ by no more than this are considered equal, overriding the configuration.
            #[clap(long, short = 't')]
            tolerance: Option<rust_decimal::Decimal>,
            /// A RON file with the export layouts and the tolerance.
            #[clap(long, short = 'c')]
            config: Option<PathBuf>,
            /// The directory below which a numbered report directory is created.
            #[clap(long, default_value = ".")]
            out_dir: PathBuf,
        },
        /// Print the normalized identifier and join key of card or account numbers.
        JoinKey {
            /// The raw identifiers as they appear in an export.
            identifier: Vec<String>,
        },
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbosity.tracing_level_filter());
    match args.cmd {
        Subcommands::Reconcile {
            loyalty,
            operations,
            input_dir,
            tolerance,
            config,
            out_dir,
        } => {
            let mut config = config
                .map(|path| {
                    stayrecon::Config::from_path(&path)
                        .with_context(|| format!("Could not read configuration at '{}'", path.display()))
                })
                .transpose()?
                .unwrap_or_default();
            if let Some(tolerance) = tolerance {
                config.tolerance = tolerance;
            }

            let loyalty = resolve_inputs(loyalty, Side::Loyalty, &input_dir, &["loyalty"])?;
            let operations = resolve_inputs(operations, Side::Operations, &input_dir, &["operation"])?;
            let loyalty = stayrecon::ingest(Side::Loyalty, into_read(loyalty)?, &config.loyalty)?;
            let operations = stayrecon::ingest(Side::Operations, into_read(operations)?, &config.operations)?;

            let result = stayrecon::reconcile(&loyalty, &operations, config.reconcile_options())?;
            let dir = stayrecon::next_output_dir(&out_dir, 31)?;
            stayrecon::write_report(&result, &dir)
                .with_context(|| format!("Could not write report to '{}'", dir.display()))?;

            for (section, rows) in result.summary() {
                println!("{section}\t{rows}");
            }
            println!("Report written to '{}'", dir.display());
        }
        Subcommands::JoinKey { identifier } => {
            for raw in identifier {
                let normalized = stayrecon::normalize::normalize_identifier(&raw);
                let key = stayrecon::normalize::extract_join_key(&normalized);
                println!("{raw}\t{normalized}\t{key}");
            }
        }
    };
    Ok(())
}

/// Log to stderr at `level`, unless `RUST_LOG` says otherwise.
fn init_logging(level: tracing_subscriber::filter::LevelFilter) {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn resolve_inputs(paths: Vec<PathBuf>, side: Side, input_dir: &Path, keywords: &[&str]) -> anyhow::Result<Vec<PathBuf>> {
    if !paths.is_empty() {
        return Ok(paths);
    }
    let path = stayrecon::find_latest(side, input_dir, keywords)?;
    tracing::info!(%side, path = %path.display(), "discovered export");
    Ok(vec![path])
}

fn into_read(file_paths: Vec<PathBuf>) -> anyhow::Result<impl Iterator<Item = impl std::io::Read>> {
    Ok(file_paths
        .iter()
        .map(|p| {
            std::fs::read(p)
                .with_context(|| format!("Could not read from CSV file at '{}'", p.display()))
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(std::io::Cursor::new))
}
