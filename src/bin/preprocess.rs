//! Compile a JSON rule document into a REX bytecode artifact.
//!
//! Usage: `preprocess <input.json> [--out bytecode.bin] [--log LEVEL] [--log-output console|file]`

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rex::compile_document;

#[derive(Parser, Debug)]
#[command(name = "preprocess")]
#[command(about = "Compile a JSON rule document into REX bytecode")]
struct Args {
    /// Path to the input JSON rule document
    input: PathBuf,

    /// Output path for the binary artifact
    #[arg(long = "out", default_value = "bytecode.bin")]
    out: PathBuf,

    /// Log level: trace, debug, info, warn, error
    #[arg(long = "log", default_value = "info")]
    log: String,

    /// Log destination
    #[arg(long = "log-output", value_enum, default_value = "console")]
    log_output: LogOutput,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogOutput {
    Console,
    File,
}

fn main() {
    let args = Args::parse();
    init_logging(&args.log, args.log_output);

    let json = match fs::read_to_string(&args.input) {
        Ok(json) => json,
        Err(err) => {
            error!(path = %args.input.display(), %err, "failed to read input file");
            process::exit(1);
        }
    };

    let unit = match compile_document(&json) {
        Ok(unit) => unit,
        Err(err) => {
            error!(%err, "failed to compile rules");
            process::exit(1);
        }
    };

    if let Err(err) = fs::write(&args.out, &unit.bytecode) {
        error!(path = %args.out.display(), %err, "failed to write bytecode");
        process::exit(1);
    }

    info!(
        path = %args.out.display(),
        bytes = unit.bytecode.len(),
        facts = unit.context.len(),
        "wrote bytecode artifact"
    );
}

fn init_logging(level: &str, output: LogOutput) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|err| {
        eprintln!("invalid log level '{level}': {err}");
        process::exit(1);
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match output {
        LogOutput::Console => builder.with_writer(std::io::stderr).init(),
        LogOutput::File => {
            let file = fs::File::create("rex.log").unwrap_or_else(|err| {
                eprintln!("failed to create rex.log: {err}");
                process::exit(1);
            });
            builder.with_writer(std::sync::Mutex::new(file)).init();
        }
    }
}
