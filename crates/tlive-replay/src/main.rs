use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tlive_coordinator::CoordinatorConfig;
use tracing_subscriber::EnvFilter;

mod recording;
mod runner;
mod scenario;

use runner::{report_json, run_scenario, ReplayOptions};

const LOG_STDERR_ENV: &str = "TLIVE_LOG_STDERR";

#[derive(Parser, Debug)]
#[command(name = "tlive-replay")]
#[command(about = "Replay a thread-live scenario against a recording backend", long_about = None)]
struct Args {
    /// NDJSON scenario, one step per line.
    scenario: PathBuf,
    /// Override the self-detach window (defaults to TLIVE_SELF_DETACH_MS or 10s).
    #[arg(long)]
    self_detach_ms: Option<u64>,
    /// Delay applied to every backend call.
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,
    /// Do not publish attached/detached notifications from the backend.
    #[arg(long, default_value_t = false)]
    no_echo: bool,
    #[arg(long, default_value_t = false)]
    json: bool,
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn options(&self) -> ReplayOptions {
        let config = match self.self_detach_ms.filter(|ms| *ms > 0) {
            Some(ms) => CoordinatorConfig::default().with_self_detach_window(Duration::from_millis(ms)),
            None => CoordinatorConfig::from_env(),
        };
        ReplayOptions {
            config,
            latency: Duration::from_millis(self.latency_ms),
            echo: !self.no_echo,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let steps = scenario::load_scenario(&args.scenario)?;
    let report = run_scenario(&steps, args.options()).await;

    if args.json {
        let value = report_json(&report).context("failed to serialize report")?;
        let rendered =
            serde_json::to_string_pretty(&value).context("failed to render report")?;
        println!("{rendered}");
    } else {
        println!("{report}");
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_enabled = verbose
        || std::env::var(LOG_STDERR_ENV)
            .ok()
            .and_then(|value| parse_bool_flag(&value))
            .unwrap_or(false);
    if stderr_enabled {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
}

fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
