//! harchain CLI: turn a HAR capture into a Postman collection.
//!
//! Usage:
//!   harchain --file capture.har [--vars vars.yaml] [--output collection.json]

use clap::Parser;
use harchain::chain::load_declarations;
use harchain::{
    read_har, Assembly, CollectionWriter, DeclaredVariable, Pipeline, PipelineConfig, PostmanWriter, StabilizerMode,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "harchain",
    version,
    about = "Generate a chained replay collection from an HTTP capture"
)]
struct Cli {
    /// HAR file to read
    #[arg(long)]
    file: PathBuf,

    /// YAML or JSON list of declared variables
    #[arg(long)]
    vars: Option<PathBuf>,

    /// Where to write the collection
    #[arg(long, default_value = "collection.json")]
    output: PathBuf,

    /// Configuration file (defaults to <config dir>/harchain/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Text oracle command and its arguments
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    oracle_cmd: Option<Vec<String>>,

    /// How origin locators are stabilized
    #[arg(long, value_enum)]
    stabilizer: Option<StabilizerMode>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<PipelineConfig, String> {
    let mut config = PipelineConfig::resolve(cli.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(command) = &cli.oracle_cmd {
        config.collaborators.command = command.clone();
    }
    if let Some(mode) = cli.stabilizer {
        config.stabilizer.mode = mode;
    }
    Ok(config)
}

fn print_summary(assembly: &Assembly, output: &Path) {
    for diagnostic in assembly.diagnostics.iter() {
        eprintln!("warning: {}", diagnostic);
    }
    println!(
        "Wrote {} ({} items, {} variables, {} extractions, {} diagnostics)",
        output.display(),
        assembly.collection.items.len(),
        assembly.collection.variables.len(),
        assembly.collection.extraction_count(),
        assembly.diagnostics.len()
    );
}

fn run(cli: Cli) -> i32 {
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let interactions = match read_har(&cli.file) {
        Ok(interactions) => interactions,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let declared: Vec<DeclaredVariable> = match cli.vars.as_deref().map(load_declarations).transpose() {
        Ok(declared) => declared.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return 1;
        }
    };
    let pipeline = Pipeline::from_config(config);
    let assembly = runtime.block_on(pipeline.run(interactions, &declared));

    if let Err(e) = PostmanWriter::new(&cli.output).write(&assembly.collection) {
        eprintln!("Error: {}", e);
        return 1;
    }
    print_summary(&assembly, &cli.output);
    0
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    std::process::exit(run(cli));
}
