use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use sv_forge::pipeline::SvCallerPipeline;
use sv_forge::source::{InMemoryReference, NoReference, TsvAlignmentSource};
use sv_forge::utils::configuration::CallerConfig;
use sv_forge::SvType;

#[derive(Parser)]
#[command(name = "sv-forge", version, about = "Structural variant discovery from aligned reads")]
struct Cli {
    /// Configuration file (JSON or TOML); built-in defaults otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose (debug-level) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call structural variants from a tab-separated alignment dump
    Call {
        /// Alignment records, one per line
        #[arg(short, long)]
        input: PathBuf,

        /// Optional reference sequences as `chrom<TAB>sequence` lines,
        /// used for breakpoint refinement
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Output path for JSON-lines variant calls (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the minimum supporting-event count per call
        #[arg(long)]
        min_support: Option<usize>,

        /// Estimate the insert-size model from the input instead of using
        /// the configured one
        #[arg(long)]
        auto_insert_size: bool,
    },
    /// Write the default configuration to a file and exit
    InitConfig {
        #[arg(short, long, default_value = "sv-forge.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_level))
        .init();

    match cli.command {
        Commands::Call {
            input,
            reference,
            output,
            min_support,
            auto_insert_size,
        } => {
            let mut config = CallerConfig::load(cli.config.as_deref())?;
            if let Some(min_support) = min_support {
                config.cluster.min_support = min_support;
                config.validate()?;
            }

            let source = TsvAlignmentSource::from_path(&input)?;
            if auto_insert_size {
                if let Some(model) = sample_insert_size(&source)? {
                    config.extract.insert_size = model;
                }
            }
            let pipeline = SvCallerPipeline::new(config);
            let regions = SvCallerPipeline::default_regions(&source);

            let run = match reference {
                Some(path) => {
                    let reference = load_reference(&path)?;
                    pipeline.run(&source, &reference, &regions)?
                }
                None => pipeline.run(&source, &NoReference, &regions)?,
            };

            write_calls(&run.calls, output.as_deref())?;
            print_summary(&run);
        }
        Commands::InitConfig { output } => {
            let path = CallerConfig::default().write_template(&output)?;
            println!("wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

/// Bootstrap the insert-size model from the largest chromosome's records.
fn sample_insert_size(
    source: &TsvAlignmentSource,
) -> Result<Option<sv_forge::utils::configuration::InsertSizeModel>> {
    use sv_forge::extract::estimate_insert_size;
    use sv_forge::source::AlignmentSource;

    let chroms = source.chromosomes();
    let Some((chrom, extent)) = chroms.iter().max_by_key(|(_, extent)| *extent) else {
        return Ok(None);
    };
    let records = source.fetch(chrom, 0, extent + 1)?;
    Ok(estimate_insert_size(records, 100_000))
}

fn load_reference(path: &std::path::Path) -> Result<InMemoryReference> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read reference file {}", path.display()))?;
    let mut reference = InMemoryReference::new();
    for line in body.lines() {
        if let Some((chrom, sequence)) = line.split_once('\t') {
            reference = reference.with_sequence(chrom.trim(), sequence.trim().as_bytes());
        }
    }
    Ok(reference)
}

fn write_calls(calls: &[sv_forge::VariantCall], output: Option<&std::path::Path>) -> Result<()> {
    let mut sink: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("cannot create output file {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    for call in calls {
        serde_json::to_writer(&mut sink, call)?;
        writeln!(sink)?;
    }
    sink.flush()?;
    Ok(())
}

fn print_summary(run: &sv_forge::RunOutput) {
    let count_of = |t: SvType| run.calls.iter().filter(|c| c.sv_type == t).count();

    eprintln!(
        "\n{} {} calls from {} regions ({} aborted)",
        "done:".bright_green(),
        run.stats.calls_emitted.to_string().bright_white(),
        run.stats.regions_processed,
        run.stats.regions_aborted
    );
    eprintln!(
        "   DEL {}  INS {}  INV {}  DUP {}  BND {}",
        count_of(SvType::Deletion),
        count_of(SvType::Insertion),
        count_of(SvType::Inversion),
        count_of(SvType::Duplication),
        count_of(SvType::Translocation),
    );
    eprintln!(
        "   records {}  (malformed {}, sub-mapq {})  events {}",
        run.stats.extract.records_seen,
        run.stats.extract.records_malformed,
        run.stats.extract.records_below_mapq,
        run.stats.extract.events_emitted,
    );
    for region in &run.aborted_regions {
        eprintln!("   {} {}", "aborted:".bright_red(), region);
    }
}
