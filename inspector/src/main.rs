//! Slipstream Inspector CLI

use clap::{Arg, ArgAction, ArgMatches, Command};
use slipstream_inspector::Inspector;
use slipstream_runtime::{footer::MAGIC_LENGTH, transport::DEFAULT_CHUNK_SIZE};
use std::{num::NonZeroUsize, path::PathBuf, process::ExitCode};
use tracing::{debug, error, Level};
use tracing_subscriber::EnvFilter;

/// Returns the version of the crate.
pub const fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Flag for verbose output
const VERBOSE_FLAG: &str = "verbose";

/// Subcommand that prints the footer record of a file
const FOOTER_CMD: &str = "footer";

/// Subcommand that prints the records within a byte range of a file
const DUMP_CMD: &str = "dump";

/// Magic bytes expected at the end of a file when none are provided
const DEFAULT_MAGIC: &str = "SLIP";

fn parse_magic(value: &str) -> Result<[u8; MAGIC_LENGTH], String> {
    value
        .as_bytes()
        .try_into()
        .map_err(|_| format!("magic must be exactly {MAGIC_LENGTH} bytes"))
}

fn file_arg() -> Arg {
    Arg::new("file")
        .long("file")
        .required(true)
        .help("Path to the file to inspect")
        .value_parser(clap::value_parser!(PathBuf))
}

fn chunk_size_arg() -> Arg {
    Arg::new("chunk-size")
        .long("chunk-size")
        .help("Maximum bytes read from the file at a time (must be >= 1, defaults to 1 MiB)")
        .value_parser(clap::value_parser!(NonZeroUsize))
}

fn chunk_size(matches: &ArgMatches) -> NonZeroUsize {
    matches
        .get_one::<NonZeroUsize>("chunk-size")
        .copied()
        .unwrap_or(DEFAULT_CHUNK_SIZE)
}

fn run(matches: &ArgMatches) -> Result<String, slipstream_inspector::Error> {
    match matches.subcommand() {
        Some((FOOTER_CMD, matches)) => {
            let (Some(path), Some(magic)) = (
                matches.get_one::<PathBuf>("file"),
                matches.get_one::<[u8; MAGIC_LENGTH]>("magic"),
            ) else {
                unreachable!("argument is required or has a default");
            };
            Inspector::new(chunk_size(matches)).footer(path, *magic)
        }
        Some((DUMP_CMD, matches)) => {
            let (Some(path), Some(offset)) = (
                matches.get_one::<PathBuf>("file"),
                matches.get_one::<u64>("offset"),
            ) else {
                unreachable!("argument is required or has a default");
            };
            let length = matches.get_one::<u64>("length").copied();
            let inspector = Inspector::new(chunk_size(matches));
            let out = inspector.dump(path, *offset, length, matches.get_flag("message"))?;
            let metrics = inspector.metrics()?;
            debug!(%metrics, "buffer pool");
            Ok(out)
        }
        _ => unreachable!("subcommand is required"),
    }
}

/// Entrypoint for the Slipstream Inspector CLI
fn main() -> ExitCode {
    // Define application
    let matches = Command::new("slipstream-inspector")
        .version(crate_version())
        .about("Decode and print compact-encoded records stored in files.")
        .subcommand_required(true)
        .arg(
            Arg::new(VERBOSE_FLAG)
                .short('v')
                .long(VERBOSE_FLAG)
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new(FOOTER_CMD)
                .about("Print the record located by the length and magic at the end of a file.")
                .arg(file_arg())
                .arg(
                    Arg::new("magic")
                        .long("magic")
                        .default_value(DEFAULT_MAGIC)
                        .help("Magic bytes terminating the file")
                        .value_parser(parse_magic),
                )
                .arg(chunk_size_arg()),
        )
        .subcommand(
            Command::new(DUMP_CMD)
                .about("Print every record stored back to back within a byte range of a file.")
                .arg(file_arg())
                .arg(
                    Arg::new("offset")
                        .long("offset")
                        .default_value("0")
                        .help("Offset of the first record")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("length")
                        .long("length")
                        .help("Number of bytes to decode (defaults to the rest of the file)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("message")
                        .long("message")
                        .help("Expect a message header before each record")
                        .action(ArgAction::SetTrue),
                )
                .arg(chunk_size_arg()),
        )
        .get_matches();

    // Create logger
    let level = if matches.get_flag(VERBOSE_FLAG) {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    // Run subcommand
    match run(&matches) {
        Ok(out) => {
            print!("{out}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error=?e, "failed to inspect file");
            ExitCode::FAILURE
        }
    }
}
