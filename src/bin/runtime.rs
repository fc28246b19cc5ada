//! Execute a REX bytecode artifact against an initially empty fact store.
//!
//! Usage: `runtime <bytecode.bin> [--log LEVEL]`
//!
//! Hosts that need preloaded facts embed the library and call
//! [`Vm::set_fact`] before running; this driver exercises the artifact
//! as-is and reports the final fact store.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rex::{MessageSink, Vm};

#[derive(Parser, Debug)]
#[command(name = "runtime")]
#[command(about = "Execute a REX bytecode artifact")]
struct Args {
    /// Path to the bytecode artifact
    bytecode: PathBuf,

    /// Log level: trace, debug, info, warn, error
    #[arg(long = "log", default_value = "info")]
    log: String,
}

/// Dispatches `sendMessage` payloads to the log.
struct LogSink;

impl MessageSink for LogSink {
    fn send(&mut self, target: &str, payload: &str) {
        info!(to = %target, payload = %payload, "message dispatched");
    }
}

fn main() {
    let args = Args::parse();
    let filter = EnvFilter::try_new(args.log.as_str()).unwrap_or_else(|err| {
        eprintln!("invalid log level '{}': {err}", args.log);
        process::exit(1);
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let bytes = match fs::read(&args.bytecode) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(path = %args.bytecode.display(), %err, "failed to read bytecode file");
            process::exit(1);
        }
    };

    let mut vm = match Vm::new(Arc::from(bytes.into_boxed_slice()), Vec::new()) {
        Ok(vm) => vm,
        Err(err) => {
            error!(%err, "failed to load bytecode");
            process::exit(1);
        }
    };

    if let Err(err) = vm.run(&mut LogSink) {
        error!(%err, "bytecode execution failed");
        process::exit(1);
    }

    info!(facts = vm.facts().len(), "bytecode execution completed");
}
