// junc CLI
// Enumerate compacted de Bruijn graph junctions over FASTA inputs

mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use junc_core::{EnumeratorConfig, VertexEnumerator};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "junc")]
#[command(version, about = "Compacted de Bruijn graph junction enumerator", long_about = None)]
struct Cli {
    /// Input FASTA files (plain or gzipped)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// log2 of the edge filter size
    #[arg(short = 'f', long = "filter-bits", default_value_t = 34)]
    filter_bits: u32,

    /// Number of worker threads
    #[arg(short = 't', long = "threads", default_value_t = num_cpus::get())]
    threads: usize,

    /// K-mer (vertex) length
    #[arg(short = 'k', long = "kmer-length", default_value_t = 25)]
    kmer_length: usize,

    /// Number of rolling hash functions
    #[arg(short = 'q', long = "hash-functions", default_value_t = 5)]
    hash_functions: usize,

    /// Output junction stream
    #[arg(short = 'o', long = "output", default_value = "junctions.bin")]
    output: PathBuf,

    /// Temp directory for per-round candidate masks
    #[arg(long = "tmpdir", default_value = ".")]
    tmp_dir: PathBuf,

    /// Number of enumeration rounds
    #[arg(long = "rounds", default_value_t = 1)]
    rounds: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = std::fs::create_dir_all(&cli.tmp_dir) {
        eprintln!("junc: can't create the temp directory: {e}");
        return ExitCode::FAILURE;
    }
    let log_file = cli.tmp_dir.join("junc.log");
    if let Err(e) = logging::init(Some(&log_file)) {
        eprintln!("junc: can't initialise logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = EnumeratorConfig {
        input: cli.inputs,
        k: cli.kmer_length,
        filter_bits: cli.filter_bits,
        hash_functions: cli.hash_functions,
        rounds: cli.rounds,
        threads: cli.threads,
        tmp_dir: cli.tmp_dir,
        output: cli.output,
    };

    let enumerator =
        VertexEnumerator::enumerate(&config).context("junction enumeration failed")?;
    log::info!(
        "done: {} distinct junctions, output written to {}",
        enumerator.vertices_count(),
        config.output.display()
    );
    Ok(())
}
