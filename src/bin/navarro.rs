//! Navarro - username presence checker
//!
//! ```text
//! navarro johndoe                           Check a single username
//! navarro -l users.txt                      Check every username in a file
//! navarro johndoe -p github,reddit          Only check some platforms
//! navarro johndoe -q -e results.json        Found profiles only, plus JSON export
//! navarro --list-platforms                  Show available platforms
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use env_logger::Env;
use navarro_rs::{
    DetectorRegistry, HandleReport, Navarro, NavarroError, NavarroResult, VERSION, export_csv,
    export_json, normalize_handle, render_table, validate_handle,
};

#[derive(Parser, Debug)]
#[command(name = "navarro")]
#[command(version, about = "Navarro - username presence checker", long_about = None)]
struct Cli {
    /// Username to search
    username: Option<String>,

    /// File containing usernames, one per line
    #[arg(short = 'l', long = "list", value_name = "FILE")]
    list_file: Option<PathBuf>,

    /// Export results to a JSON file
    #[arg(short, long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Export results to a CSV file
    #[arg(long, value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Only show found profiles
    #[arg(short, long)]
    quiet: bool,

    /// Comma-separated platforms to check (e.g. github,reddit,telegram)
    #[arg(short, long, value_delimiter = ',')]
    platforms: Vec<String>,

    /// Request timeout in seconds
    #[arg(short, long, default_value_t = 8, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// List available platforms and exit
    #[arg(long)]
    list_platforms: bool,

    /// Rate limit state file (also: NAVARRO_STATE_FILE)
    #[arg(long, value_name = "PATH")]
    state_file: Option<PathBuf>,

    /// Keep rate limit state in memory only
    #[arg(long)]
    no_persist: bool,

    /// Platforms checked in parallel
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    jobs: u16,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .try_init();
}

fn list_platforms() {
    let registry = DetectorRegistry::builtin();
    let mut names = registry.names();
    names.sort_by_key(|name| name.to_lowercase());
    println!("Available platforms ({}):", names.len());
    for name in names {
        println!("  - {name}");
    }
}

/// Reads one handle per line, skipping blanks.
fn load_handles(path: &Path) -> io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| normalize_handle(line).to_string())
        .collect())
}

async fn run(cli: Cli) -> NavarroResult<ExitCode> {
    if cli.list_platforms {
        list_platforms();
        return Ok(ExitCode::SUCCESS);
    }

    let handles = match (&cli.list_file, &cli.username) {
        (Some(path), _) => match load_handles(path) {
            Ok(handles) => {
                if !cli.quiet {
                    println!("Loaded {} username(s) from {}", handles.len(), path.display());
                }
                handles
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                eprintln!("Error: file '{}' not found", path.display());
                return Ok(ExitCode::FAILURE);
            }
            Err(err) => return Err(err.into()),
        },
        (None, Some(username)) => vec![normalize_handle(username).to_string()],
        (None, None) => {
            let _ = Cli::command().print_help();
            return Ok(ExitCode::FAILURE);
        }
    };

    for handle in &handles {
        if let Err(err) = validate_handle(handle) {
            eprintln!("Invalid username '{handle}': {err}");
            return Ok(ExitCode::FAILURE);
        }
    }

    let mut builder = Navarro::builder()
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_max_parallel_targets(usize::from(cli.jobs));
    builder = match &cli.state_file {
        Some(path) => builder.with_state_path(path),
        None => builder.with_default_state_path(),
    };
    if cli.no_persist {
        builder = builder.without_persistence();
    }
    let navarro = builder.build()?;

    if let Err(err) = navarro.registry().select(&cli.platforms) {
        eprintln!("{err}");
        eprintln!("Use --list-platforms to see available options");
        return Ok(ExitCode::FAILURE);
    }

    if !cli.quiet {
        println!("\nNavarro v{VERSION} - username presence checker");
    }

    let quiet = cli.quiet;
    let reports: Vec<HandleReport> = navarro
        .check_handles_with(&handles, &cli.platforms, |report| {
            print!("{}", render_table(report, quiet));
        })
        .await?;
    navarro.close();

    if let Some(path) = &cli.export {
        export_json(&reports, path)?;
        println!("Results exported to {}", path.display());
    }
    if let Some(path) = &cli.csv {
        export_csv(&reports, path)?;
        println!("Results exported to {}", path.display());
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(NavarroError::UnknownTargets(targets)) => {
            eprintln!("Unknown platforms: {}", targets.join(", "));
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
