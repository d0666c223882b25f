//! swflow CLI Entry Point
//!
//! Decodes and validates workflow documents from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Validate a workflow
//! swflow order.sw.yaml
//!
//! # Validate several documents, searching extra directories for references
//! swflow a.json b.yaml --include-path ./shared --include-path /etc/swflow
//!
//! # Print the normalized document as JSON
//! swflow order.sw.yaml --encode json
//! ```
//!
//! Exit status is 0 when every document decodes and validates cleanly, 1
//! when any document has violations and 2 when a document fails to decode.

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colored::Colorize;
use log::{debug, info};

use swflow::decode::document::DocumentFormat;
use swflow::{
    encode_json_pretty, encode_yaml, Decoder, DecoderConfig, Report, Validator, APP_NAME, VERSION,
};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    documents: Vec<PathBuf>,
    include_paths: Vec<PathBuf>,
    encode: Option<DocumentFormat>,
    skip_validation: bool,
    verbose: bool,
}

/// Outcome of checking one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Outcome {
    Valid,
    Violations,
    DecodeFailed,
}

impl Outcome {
    fn exit_code(self) -> ExitCode {
        match self {
            Self::Valid => ExitCode::SUCCESS,
            Self::Violations => ExitCode::from(1),
            Self::DecodeFailed => ExitCode::from(2),
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: swflow [OPTIONS] <DOCUMENT>...");
    println!();
    println!("Arguments:");
    println!("  <DOCUMENT>           Workflow definition (.json, .yaml or .yml)");
    println!();
    println!("Options:");
    println!("  --include-path DIR   Extra directory searched for file references (repeatable)");
    println!("  --encode FORMAT      Print the canonical document (json or yaml) when valid");
    println!("  --no-validate        Decode only");
    println!("  --verbose            Enable debug logging");
    println!("  --help               Show this help message");
    println!("  --version            Show version information");
    println!();
    println!("Examples:");
    println!("  swflow order.sw.yaml");
    println!("  swflow order.sw.json --include-path ./shared --encode yaml");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--no-validate" => {
                config.skip_validation = true;
            }
            "--include-path" | "-I" => {
                i += 1;
                if i >= args.len() {
                    return Err("--include-path requires a directory argument".to_string());
                }
                config.include_paths.push(PathBuf::from(&args[i]));
            }
            "--encode" => {
                i += 1;
                if i >= args.len() {
                    return Err("--encode requires a format argument".to_string());
                }
                config.encode = Some(match args[i].as_str() {
                    "json" => DocumentFormat::Json,
                    "yaml" | "yml" => DocumentFormat::Yaml,
                    other => return Err(format!("Invalid encode format: {}", other)),
                });
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => config.documents.push(PathBuf::from(arg)),
        }
        i += 1;
    }

    if config.documents.is_empty() {
        return Err("At least one workflow document is required".to_string());
    }
    Ok(config)
}

/// Makes include paths absolute, with the working directory searched last.
fn resolve_include_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let current = env::current_dir()?;
    let mut resolved = Vec::with_capacity(paths.len() + 1);

    for path in paths {
        let absolute = current.join(path);
        if !absolute.is_dir() {
            return Err(format!("Include path is not a directory: {}", path.display()).into());
        }
        resolved.push(absolute);
    }
    resolved.push(current);

    debug!("Include paths: {:?}", resolved);
    Ok(resolved)
}

fn print_report(document: &Path, report: &Report) {
    if report.is_ok() {
        println!("{} {}", "ok".green().bold(), document.display());
        return;
    }

    println!(
        "{} {} ({} violations)",
        "invalid".red().bold(),
        document.display(),
        report.len()
    );
    for violation in report {
        println!(
            "  {} {} {}",
            format!("[{}]", violation.rule).yellow(),
            violation.path.bold(),
            violation.message
        );
    }
}

/// Decodes and validates one document, re-encoding it when clean.
fn check_document(
    decoder: &Decoder,
    validator: &Validator,
    document: &Path,
    config: &Config,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    info!("Loading workflow: {}", document.display());
    let workflow = match decoder.decode_file(document) {
        Ok(workflow) => workflow,
        Err(e) => {
            debug!("Decode of {} failed: {:?}", document.display(), e);
            println!("{} {}: {}", "error".red().bold(), document.display(), e);
            return Ok(Outcome::DecodeFailed);
        }
    };

    if !config.skip_validation {
        let report = validator.report(&workflow);
        print_report(document, &report);
        if !report.is_ok() {
            return Ok(Outcome::Violations);
        }
    }

    match config.encode {
        Some(DocumentFormat::Json) => println!("{}", encode_json_pretty(&workflow)?),
        Some(DocumentFormat::Yaml) => print!("{}", encode_yaml(&workflow)?),
        None => {}
    }
    Ok(Outcome::Valid)
}

/// Main application entry point.
fn run() -> Result<Outcome, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);

    let decoder = Decoder::with_config(DecoderConfig {
        include_paths: resolve_include_paths(&config.include_paths)?,
        ..DecoderConfig::default()
    })?;
    let validator = Validator::new();

    let mut worst = Outcome::Valid;
    for document in &config.documents {
        let outcome = check_document(&decoder, &validator, document, &config)?;
        worst = worst.max(outcome);
    }

    info!("Checked {} documents", config.documents.len());
    Ok(worst)
}

fn main() -> ExitCode {
    match run() {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}
