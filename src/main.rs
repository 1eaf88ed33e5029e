use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use log::info;

use qgate::config::CodecConfig;
use qgate::ParseOptions;

mod cli;

const QGATE_VERSION: &str = env!("CARGO_PKG_VERSION");
const QGATE_AUTHOR: &str = "Rayan (@planetryan on GitHub)";

#[derive(Parser, Debug)]
#[command(name = "qgate", author = QGATE_AUTHOR, version = QGATE_VERSION,
    about = format!("qgate - parser and printer for quantum gate assembly.\n\
             Version: {QGATE_VERSION}\n\n\
             Use 'qgate help <command>' for more information on a specific command, e.g., 'qgate help check'."),
    long_about = None)]
struct Cli {
    /// JSON config with parse options and extra instruction kinds.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Accept rotation instructions without a parameter (overrides the config).
    #[arg(long, global = true)]
    allow_missing_rotation: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Prints source files in canonical form.
    Fmt {
        /// Source file paths
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Only report files that are not already canonical.
        #[arg(long)]
        check: bool,
    },
    /// Parses source files and reports every error found.
    Check {
        /// Source file paths
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Dumps a parsed source file as JSON.
    Json {
        /// Source file path
        source: PathBuf,
        /// Output .json file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Parses a single type and prints its canonical form.
    Type {
        /// Type text, e.g. 'cgate<2, gate1>'
        text: String,
    },
    /// Lists the known instruction kinds.
    Ops,
    /// Prints the qgate version.
    Version,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match CodecConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(2);
            }
        },
        None => CodecConfig::default(),
    };
    if cli.allow_missing_rotation {
        config.options = ParseOptions {
            allow_missing_rotation: true,
        };
    }
    let codec = match config.into_codec() {
        Ok(codec) => codec,
        Err(e) => {
            eprintln!("error: {}", qgate::Error::from(e));
            process::exit(2);
        }
    };
    info!("{} instruction kinds available", codec.catalog().len());

    let result = match &cli.command {
        Commands::Fmt { files, check } => cli::fmt(&codec, files, *check),
        Commands::Check { files } => cli::check(&codec, files),
        Commands::Json { source, output } => cli::json(&codec, source, output.as_deref()),
        Commands::Type { text } => cli::type_(&codec, text),
        Commands::Ops => cli::ops(&codec),
        Commands::Version => {
            println!("qgate version {}", QGATE_VERSION);
            Ok(true)
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    }
}
