use clap::{Parser, Subcommand};
use ltsweep::config::{Config, NamingConvention};
use ltsweep::error::LtsweepError;
use ltsweep::rawfile::{ChannelSelection, WaveformExtractor};
use ltsweep::schematic;
use ltsweep::script;
use ltsweep::simulator::WineRunner;
use ltsweep::stats::Stats;
use ltsweep::sweep::{Sweep, SweepDriver, SweepReport};
use std::path::{Path, PathBuf};

/// Batch LTspice parameter sweeps and raw file extraction
#[derive(Parser)]
#[command(name = "ltsweep", version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "ltsweep.toml")]
    config: PathBuf,

    /// Override `output_dir` from the configuration
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Override `naming` from the configuration
    #[arg(long, global = true, value_enum)]
    naming: Option<NamingConvention>,

    /// Print sweep stats to stderr
    #[arg(long, global = true)]
    stats: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate once with the schematic's values, or sweep one parameter
    Run {
        /// Parameter to sweep
        #[arg(long, requires = "values")]
        param: Option<String>,

        /// Values for the swept parameter
        #[arg(long, num_args = 1.., requires = "param")]
        values: Vec<String>,

        /// First output number
        #[arg(long, default_value_t = 0)]
        start: usize,
    },
    /// Execute a sweep script of `set` and `run` lines
    Script {
        file: PathBuf,

        /// First output number
        #[arg(long, default_value_t = 0)]
        start: usize,
    },
    /// Extract the configured channels from a raw file into a table
    Extract {
        raw: PathBuf,
        output: PathBuf,

        /// First line of the table (default: parameters of the schematic)
        #[arg(long)]
        header: Option<String>,
    },
    /// List the `.param` declarations of a schematic
    Params { schematic: PathBuf },
    /// Set one parameter in a schematic
    Set {
        schematic: PathBuf,
        name: String,
        value: String,

        /// Replace the schematic instead of writing `<name>_generated.asc`
        #[arg(long)]
        overwrite: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut stats = if cli.stats { Some(Stats::new()) } else { None };

    match &cli.command {
        Commands::Run {
            param,
            values,
            start,
        } => {
            let config = load_config(&cli);
            let runner = WineRunner::from_config(&config);
            let driver = SweepDriver::new(config, &runner).unwrap_or_else(|e| fail("Config", e));
            let sweep = param.as_ref().map(|p| Sweep::new(p.clone(), values.as_slice()));
            let report = driver
                .run_sweep(sweep.as_ref(), *start, stats.as_mut())
                .unwrap_or_else(|e| fail("Sweep", e));
            print_report(&report);
        }
        Commands::Script { file, start } => {
            let operations = script::parse_file(file).unwrap_or_else(|e| fail("Script", e));
            let config = load_config(&cli);
            let runner = WineRunner::from_config(&config);
            let driver = SweepDriver::new(config, &runner).unwrap_or_else(|e| fail("Config", e));
            let report = driver
                .run_script(&operations, *start, stats.as_mut())
                .unwrap_or_else(|e| fail("Sweep", e));
            print_report(&report);
        }
        Commands::Extract {
            raw,
            output,
            header,
        } => {
            let config = load_config(&cli);
            let runner = WineRunner::from_config(&config);
            let selection =
                ChannelSelection::for_table(&config).unwrap_or_else(|e| fail("Config", e));
            let header = header.clone().unwrap_or_else(|| default_header(&config.schematic));
            let extractor = WaveformExtractor::new(selection, &runner);
            let path = extractor
                .extract(raw, &header, output)
                .unwrap_or_else(|e| fail("Extract", e));
            println!("{}", path.display());
        }
        Commands::Params { schematic } => {
            let params =
                schematic::get_parameters(schematic).unwrap_or_else(|e| fail("Schematic", e));
            for param in params {
                println!("{}", param);
            }
        }
        Commands::Set {
            schematic,
            name,
            value,
            overwrite,
        } => {
            let path = schematic::set_parameter(schematic, name, value, *overwrite)
                .unwrap_or_else(|e| fail("Schematic", e));
            println!("{}", path.display());
        }
    }

    if let Some(ref stats) = stats {
        stats.display();
    }
}

fn load_config(cli: &Cli) -> Config {
    let mut config = Config::load(&cli.config).unwrap_or_else(|e| fail("Config", e));
    if let Some(ref dir) = cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(naming) = cli.naming {
        config.naming = naming;
    }
    config
}

fn default_header(schematic: &Path) -> String {
    schematic::parameter_header(schematic).unwrap_or_else(|e| {
        tracing::warn!("No parameters read from {}: {}", schematic.display(), e);
        "SPICE simulation result.".to_string()
    })
}

fn print_report(report: &SweepReport) {
    for record in &report.records {
        println!("{}", record.output.display());
    }
    let failed: Vec<&str> = report.failures().map(|r| r.label.as_str()).collect();
    if !failed.is_empty() {
        eprintln!(
            "{} of {} runs produced no output: {}",
            failed.len(),
            report.records.len(),
            failed.join(", ")
        );
    }
}

fn fail(stage: &str, e: LtsweepError) -> ! {
    eprintln!("{} error: {}", stage, e);
    std::process::exit(1);
}
