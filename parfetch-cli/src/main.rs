mod config;
mod get;
mod http;
mod interrupt;
mod progress;
mod retry;

use crate::config::{AppConfig, LoadedConfig};
use crate::get::{GetArgs, resolve_download_config};
use crate::http::DEFAULT_USER_AGENT;
use crate::retry::total_retry_sleep_seconds;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const DEFAULT_MAX_ATTEMPTS: usize = 3;
const VERSION_SUMMARY: &str = concat!(
    "parfetch-cli: ",
    env!("CARGO_PKG_VERSION"),
    "\nRust: ",
    env!("PARFETCH_CLI_RUSTC_VERSION"),
    "\nOS/Arch: ",
    env!("PARFETCH_CLI_TARGET_OS"),
    "/",
    env!("PARFETCH_CLI_TARGET_ARCH"),
    "\nCommit: ",
    env!("PARFETCH_CLI_GIT_COMMIT"),
    "\nBuilt: ",
    env!("PARFETCH_CLI_BUILD_TIME")
);

#[derive(Parser)]
#[command(
    name = "parfetch-cli",
    version = env!("CARGO_PKG_VERSION"),
    about = "Download files over HTTP using parallel byte ranges",
    disable_version_flag = true
)]
struct Cli {
    /// Path to custom configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override maximum download attempts
    #[arg(long, global = true)]
    retries: Option<usize>,
    /// Log more (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Display the currently configured defaults
    Config,
    /// Download a URL to a local file
    Get {
        /// URL to fetch; http:// is assumed without a scheme
        #[arg(long)]
        url: String,
        /// Output file (defaults to the last URL path segment)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Maximum number of parallel connections
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        threads: Option<u16>,
        /// Bytes each connection should handle before another is added
        #[arg(long)]
        per_thread: Option<u64>,
        /// Read buffer size in bytes
        #[arg(long)]
        buffer: Option<u64>,
        /// Overall timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Extra request header, e.g. -H 'Authorization: Bearer x'
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,
        /// Request body
        #[arg(long)]
        data: Option<String>,
        /// Hide the progress bar and summary
        #[arg(long, short, default_value_t = false)]
        quiet: bool,
    },
    /// Interactive configuration helper
    Setup,
    /// Display parfetch-cli version information
    Version,
}

fn main() -> Result<()> {
    let Cli {
        config,
        retries,
        verbose,
        command,
    } = Cli::parse();
    init_tracing(verbose);
    interrupt::install_signal_handler();

    let loaded_config = config::load_config(config.as_deref())?;
    let app_config = &loaded_config.data;
    let max_attempts = resolve_attempts(retries, app_config);

    match command {
        Command::Config => show_config(&loaded_config, config.as_deref()),
        Command::Get {
            url,
            out,
            threads,
            per_thread,
            buffer,
            timeout,
            headers,
            method,
            data,
            quiet,
        } => {
            let args = GetArgs {
                url,
                out,
                threads: threads.map(usize::from),
                per_thread,
                buffer,
                timeout_secs: timeout,
                headers,
                method,
                data,
                quiet,
            };
            get::get(&args, app_config, max_attempts)
        }
        Command::Setup => run_setup(config.as_deref(), app_config),
        Command::Version => {
            println!("{VERSION_SUMMARY}");
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn resolve_attempts(retry_arg: Option<usize>, config: &AppConfig) -> usize {
    retry_arg
        .filter(|value| *value > 0)
        .or_else(|| {
            config
                .max_attempts
                .filter(|value| *value > 0)
                .map(|value| value as usize)
        })
        .unwrap_or(DEFAULT_MAX_ATTEMPTS)
}

fn run_setup(path_override: Option<&Path>, current: &AppConfig) -> Result<()> {
    let max_threads = prompt_optional_number("Max parallel connections", current.max_threads)?;
    let max_bytes_per_thread = prompt_optional_number(
        "Bytes per connection before another is opened",
        current.max_bytes_per_thread,
    )?;
    let buffer_size = prompt_optional_number("Read buffer size in bytes", current.buffer_size)?;
    let timeout_secs = prompt_optional_number("Timeout in seconds", current.timeout_secs)?;
    let user_agent = prompt_optional("User-Agent", current.user_agent.as_deref())?;
    let max_attempts = prompt_optional_number("Max download attempts", current.max_attempts)?;

    let new_config = AppConfig {
        buffer_size,
        max_threads,
        max_bytes_per_thread,
        timeout_secs,
        user_agent,
        max_attempts,
        headers: current.headers.clone(),
    };

    let saved_path = config::save_config(path_override, &new_config)?;
    println!();
    println!("Saved configuration to {}", saved_path.display());
    println!("Tip: add a [headers] table to the file for headers sent with every request.");
    Ok(())
}

fn read_answer() -> Result<String> {
    io::stdout().flush().context("failed to flush stdout")?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("failed to read input")?;
    Ok(input.trim().to_string())
}

fn prompt_optional(prompt: &str, current: Option<&str>) -> Result<Option<String>> {
    match current {
        Some(existing) if !existing.is_empty() => {
            print!("{} [{}] (blank to keep, '-' to clear): ", prompt, existing)
        }
        _ => print!("{} (blank to skip): ", prompt),
    }
    let value = read_answer()?;
    if value.is_empty() {
        return Ok(current.map(|s| s.to_string()));
    }
    if value == "-" {
        return Ok(None);
    }
    Ok(Some(value))
}

fn prompt_optional_number<T>(prompt: &str, current: Option<T>) -> Result<Option<T>>
where
    T: Copy + std::fmt::Display + std::str::FromStr + PartialOrd + Default,
{
    loop {
        match current {
            Some(existing) => print!("{} [{}] (blank to keep, '-' to clear): ", prompt, existing),
            None => print!("{} (blank to skip): ", prompt),
        }
        let value = read_answer()?;
        if value.is_empty() {
            return Ok(current);
        }
        if value == "-" {
            return Ok(None);
        }
        match value.parse::<T>() {
            Ok(parsed) if parsed > T::default() => return Ok(Some(parsed)),
            _ => println!("Please enter a positive integer."),
        }
    }
}

fn show_config(loaded: &LoadedConfig, override_path: Option<&Path>) -> Result<()> {
    let effective = resolve_download_config(&GetArgs::default(), &loaded.data);

    if let Some(path) = override_path {
        println!("--config arg     : {}", path.display());
    }

    match &loaded.source {
        Some(path) if loaded.existed => println!("Config file      : {} (loaded)", path.display()),
        Some(path) => println!(
            "Config file      : {} (missing, using defaults)",
            path.display()
        ),
        None => println!("Config file      : <none> (built-in defaults)"),
    }

    println!("Buffer size      : {} bytes", effective.buffer_size());
    println!("Max connections  : {}", effective.max_threads());
    println!(
        "Bytes/connection : {}",
        effective.max_bytes_per_thread()
    );
    println!("Timeout          : {}s", effective.timeout().as_secs());
    println!(
        "User-Agent       : {}",
        loaded
            .data
            .user_agent
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_USER_AGENT)
    );
    for (name, value) in &loaded.data.headers {
        println!("Header           : {}: {}", name, value);
    }
    let attempts = resolve_attempts(None, &loaded.data);
    let sleep_secs = total_retry_sleep_seconds(attempts);
    println!("Max attempts     : {} (max sleep ~{}s)", attempts, sleep_secs);
    Ok(())
}
