use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use captable::api::{
    CalculateRequest, ExitSimulationRequest, ServerConfig, calculate_request_from_json,
    run_calculation, run_exit_simulation, run_http_server,
};
use captable::core::{
    EQUITY_SUM_TOLERANCE, EngineConfig, INITIAL_SHARES, SAFE_FALLBACK_VALUATION,
};

#[derive(Parser, Debug)]
#[command(
    name = "captable",
    about = "Startup cap table simulator (priced rounds, SAFEs, ESOP top-ups, exits)"
)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct EngineArgs {
    #[arg(
        long,
        global = true,
        default_value_t = INITIAL_SHARES,
        help = "Share count the initial table is built on"
    )]
    initial_shares: i64,
    #[arg(
        long,
        global = true,
        default_value_t = SAFE_FALLBACK_VALUATION,
        help = "Conversion valuation for SAFEs without a cap"
    )]
    safe_fallback_valuation: f64,
    #[arg(
        long,
        global = true,
        default_value_t = EQUITY_SUM_TOLERANCE,
        help = "Allowed distance, in percentage points, of total equity from 100"
    )]
    equity_tolerance: f64,
}

impl EngineArgs {
    fn to_config(&self) -> EngineConfig {
        EngineConfig {
            initial_shares: self.initial_shares,
            safe_fallback_valuation: self.safe_fallback_valuation,
            equity_sum_tolerance: self.equity_tolerance,
            ..EngineConfig::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: IpAddr,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Replay a calculate request file and print the result.
    Calculate {
        #[arg(help = "JSON file with `scenario` and `fundingRounds`")]
        input: PathBuf,
    },
    /// Calculate, then distribute an exit over the final cap table.
    Exit {
        #[arg(help = "JSON file with `scenario` and `fundingRounds`")]
        input: PathBuf,
        #[arg(long, help = "Exit valuation in currency units")]
        valuation: f64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let engine = cli.engine.to_config();

    match cli.command {
        Command::Serve { host, port } => {
            run_http_server(ServerConfig { host, port, engine })
                .await
                .context("HTTP server failed")?;
        }
        Command::Calculate { input } => {
            let request = read_request(&input)?;
            let result = run_calculation(&engine, &request)?;
            print_json(&result)?;
        }
        Command::Exit { input, valuation } => {
            let request = read_request(&input)?;
            let result = run_calculation(&engine, &request)?;
            if result.validation_errors.iter().any(|issue| issue.is_fatal()) {
                bail!("cap table calculation failed: {}", result.error_messages().join("; "));
            }
            let exit = run_exit_simulation(
                &engine,
                &ExitSimulationRequest {
                    cap_table: result.cap_table,
                    exit_valuation: valuation,
                },
            )?;
            print_json(&exit)?;
        }
    }

    Ok(())
}

fn read_request(path: &Path) -> Result<CalculateRequest> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    calculate_request_from_json(&json).map_err(anyhow::Error::msg)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}
